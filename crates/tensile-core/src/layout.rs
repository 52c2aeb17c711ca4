use crate::bail;
use crate::error::{Error, Result};
use crate::iter::{Order, PointerIter};
use crate::shape::Shape;

// Layout — logical index → physical storage offset
//
// A Layout is an offset plus one signed stride per dimension:
//
//   physical = offset + Σ index[d] * stride[d]
//
// Every view operation below (transpose, select, slice, flip, broadcast)
// only rewrites these numbers and never touches storage, which is what lets
// many arrays alias one buffer:
//
//   transpose  — swap strides and extents
//   select     — drop a dimension, offset += index * stride
//   slice      — offset += start * stride, stride *= step, extent shrinks
//   flip       — offset moves to the last element, stride negated
//   broadcast  — stride 0 on every expanded dimension
//
// A layout is *dense* when it matches the canonical C-order (last dimension
// fastest) or F-order (first dimension fastest) strides of its shape; dense
// layouts address one gap-free run of storage and can be walked sequentially.

/// Canonical memory order of a dense layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MemoryOrder {
    /// C order: the last dimension is contiguous.
    #[default]
    RowMajor,
    /// Fortran order: the first dimension is contiguous.
    ColumnMajor,
}

/// Layout describes how an array's logical shape maps to flat storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    shape: Shape,
    strides: Vec<isize>,
    /// Physical index of logical index zero.
    offset: usize,
}

#[inline]
fn shift(offset: usize, delta: isize) -> usize {
    (offset as isize + delta) as usize
}

impl Layout {
    /// Dense row-major layout starting at offset 0.
    pub fn contiguous(shape: Shape) -> Self {
        Self::dense(shape, MemoryOrder::RowMajor)
    }

    /// Dense layout in the requested memory order, starting at offset 0.
    pub fn dense(shape: Shape, order: MemoryOrder) -> Self {
        let strides = match order {
            MemoryOrder::RowMajor => shape.stride_contiguous(),
            MemoryOrder::ColumnMajor => shape.stride_fortran(),
        };
        Layout {
            shape,
            strides,
            offset: 0,
        }
    }

    /// Layout with explicit strides and offset, checked for one stride per
    /// dimension. Use [`Layout::fits`] to check it against a storage length.
    pub fn from_parts(shape: Shape, strides: Vec<isize>, offset: usize) -> Result<Self> {
        if strides.len() != shape.rank() {
            bail!(
                "layout of rank {} given {} strides",
                shape.rank(),
                strides.len()
            );
        }
        Ok(Self::new(shape, strides, offset))
    }

    pub(crate) fn new(shape: Shape, strides: Vec<isize>, offset: usize) -> Self {
        debug_assert_eq!(shape.rank(), strides.len());
        Layout {
            shape,
            strides,
            offset,
        }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn rank(&self) -> usize {
        self.shape.rank()
    }

    pub fn dims(&self) -> &[usize] {
        self.shape.dims()
    }

    pub fn elem_count(&self) -> usize {
        self.shape.elem_count()
    }

    fn matches_strides(&self, canonical: &[isize]) -> bool {
        self.dims()
            .iter()
            .zip(self.strides.iter().zip(canonical))
            .all(|(&d, (&s, &c))| d <= 1 || s == c)
    }

    /// Strides follow C order (extent-1 dimensions are ignored).
    pub fn is_c_dense(&self) -> bool {
        self.matches_strides(&self.shape.stride_contiguous())
    }

    /// Strides follow F order (extent-1 dimensions are ignored).
    pub fn is_f_dense(&self) -> bool {
        self.matches_strides(&self.shape.stride_fortran())
    }

    /// The layout covers one gap-free run of storage starting at `offset`.
    pub fn is_dense(&self) -> bool {
        self.elem_count() == 0 || self.is_c_dense() || self.is_f_dense()
    }

    /// Dense row-major starting at storage index 0: the storage buffer can
    /// be used as-is in logical order.
    pub fn is_contiguous(&self) -> bool {
        self.offset == 0 && self.is_c_dense()
    }

    /// Smallest and largest physical index as signed values, or `None` on
    /// overflow. Only meaningful for a non-empty layout.
    fn bounds(&self) -> Option<(isize, isize)> {
        let mut lo = isize::try_from(self.offset).ok()?;
        let mut hi = lo;
        for (&d, &s) in self.dims().iter().zip(&self.strides) {
            let reach = (isize::try_from(d).ok()? - 1).checked_mul(s)?;
            if reach < 0 {
                lo = lo.checked_add(reach)?;
            } else {
                hi = hi.checked_add(reach)?;
            }
        }
        Some((lo, hi))
    }

    /// Smallest and largest physical index touched, or `None` when empty.
    ///
    /// Assumes the layout [`fits`](Layout::fits) its storage.
    pub fn span(&self) -> Option<(usize, usize)> {
        if self.elem_count() == 0 {
            return None;
        }
        self.bounds().map(|(lo, hi)| (lo as usize, hi as usize))
    }

    /// Whether every logical index addresses a slot of a storage of `len`.
    pub fn fits(&self, len: usize) -> bool {
        if self.strides.len() != self.rank() {
            return false;
        }
        if self.elem_count() == 0 {
            return true;
        }
        match self.bounds() {
            Some((lo, hi)) => lo >= 0 && (hi as usize) < len,
            None => false,
        }
    }

    fn check_dim(&self, dim: usize) -> Result<()> {
        if dim >= self.rank() {
            return Err(Error::DimOutOfRange {
                dim,
                rank: self.rank(),
            });
        }
        Ok(())
    }

    /// Physical index for a logical index. Indices are not bounds-checked.
    #[inline]
    pub fn flat_index(&self, index: &[usize]) -> usize {
        let delta: isize = index
            .iter()
            .zip(&self.strides)
            .map(|(&i, &s)| i as isize * s)
            .sum();
        shift(self.offset, delta)
    }

    /// Bounds-checked [`Layout::flat_index`].
    pub fn offset_of(&self, index: &[usize]) -> Result<usize> {
        if index.len() != self.rank() {
            return Err(Error::msg(format!(
                "index of rank {} used on layout of rank {}",
                index.len(),
                self.rank()
            )));
        }
        for (dim, (&i, &extent)) in index.iter().zip(self.dims()).enumerate() {
            if i >= extent {
                return Err(Error::IndexOutOfRange {
                    dim,
                    index: i,
                    extent,
                });
            }
        }
        Ok(self.flat_index(index))
    }

    /// Row `i` of the outermost dimension. `i` must be below `dims()[0]`.
    pub(crate) fn outer_row(&self, i: usize) -> Layout {
        Layout::new(
            Shape::new(self.dims()[1..].to_vec()),
            self.strides[1..].to_vec(),
            shift(self.offset, i as isize * self.strides[0]),
        )
    }

    /// Fresh pointer iterator over this layout in the requested order.
    pub fn offsets(&self, order: Order) -> PointerIter {
        PointerIter::new(self, order)
    }

    // View transforms. None of these touch storage.

    /// Swap two dimensions.
    ///
    /// [2, 3, 4] strides [12, 4, 1] → transpose(0, 2) → [4, 3, 2] strides [1, 4, 12]
    pub fn transpose(&self, dim0: usize, dim1: usize) -> Result<Layout> {
        self.check_dim(dim0.max(dim1))?;
        let mut dims = self.dims().to_vec();
        let mut strides = self.strides.clone();
        dims.swap(dim0, dim1);
        strides.swap(dim0, dim1);
        Ok(Layout::new(Shape::new(dims), strides, self.offset))
    }

    /// Reorder all dimensions: output dim `i` is input dim `perm[i]`.
    pub fn permute(&self, perm: &[usize]) -> Result<Layout> {
        let rank = self.rank();
        if perm.len() != rank {
            return Err(Error::msg(format!(
                "permutation {:?} does not match rank {}",
                perm, rank
            )));
        }
        let mut seen = vec![false; rank];
        for &p in perm {
            self.check_dim(p)?;
            if std::mem::replace(&mut seen[p], true) {
                return Err(Error::msg(format!("permutation {:?} repeats dim {}", perm, p)));
            }
        }
        let dims = perm.iter().map(|&p| self.dims()[p]).collect();
        let strides = perm.iter().map(|&p| self.strides[p]).collect();
        Ok(Layout::new(Shape::new(dims), strides, self.offset))
    }

    /// Fix `dim` at `index`, reducing rank by one.
    pub fn select(&self, dim: usize, index: usize) -> Result<Layout> {
        self.check_dim(dim)?;
        let extent = self.dims()[dim];
        if index >= extent {
            return Err(Error::IndexOutOfRange { dim, index, extent });
        }
        let mut dims = self.dims().to_vec();
        let mut strides = self.strides.clone();
        dims.remove(dim);
        let stride = strides.remove(dim);
        Ok(Layout::new(
            Shape::new(dims),
            strides,
            shift(self.offset, index as isize * stride),
        ))
    }

    /// Keep indices `start, start + step, ...` below `end` along `dim`.
    pub fn slice(&self, dim: usize, start: usize, end: usize, step: usize) -> Result<Layout> {
        self.check_dim(dim)?;
        if step == 0 {
            return Err(Error::msg("slice step must be at least 1"));
        }
        let extent = self.dims()[dim];
        if end > extent {
            return Err(Error::IndexOutOfRange {
                dim,
                index: end,
                extent,
            });
        }
        if start > end {
            return Err(Error::IndexOutOfRange {
                dim,
                index: start,
                extent: end,
            });
        }
        let len = (end - start).div_ceil(step);
        let mut dims = self.dims().to_vec();
        let mut strides = self.strides.clone();
        let offset = if len == 0 {
            self.offset
        } else {
            shift(self.offset, start as isize * strides[dim])
        };
        dims[dim] = len;
        strides[dim] *= step as isize;
        Ok(Layout::new(Shape::new(dims), strides, offset))
    }

    /// Reverse the order of `dim` (negative stride).
    pub fn flip(&self, dim: usize) -> Result<Layout> {
        self.check_dim(dim)?;
        let extent = self.dims()[dim];
        let mut strides = self.strides.clone();
        let offset = if extent == 0 {
            self.offset
        } else {
            shift(self.offset, (extent as isize - 1) * strides[dim])
        };
        strides[dim] = -strides[dim];
        Ok(Layout::new(self.shape.clone(), strides, offset))
    }

    /// Insert an extent-1 dimension at `dim`.
    pub fn unsqueeze(&self, dim: usize) -> Result<Layout> {
        if dim > self.rank() {
            return Err(Error::DimOutOfRange {
                dim,
                rank: self.rank(),
            });
        }
        let mut dims = self.dims().to_vec();
        let mut strides = self.strides.clone();
        dims.insert(dim, 1);
        strides.insert(dim, 0);
        Ok(Layout::new(Shape::new(dims), strides, self.offset))
    }

    /// Remove an extent-1 dimension.
    pub fn squeeze(&self, dim: usize) -> Result<Layout> {
        self.check_dim(dim)?;
        if self.dims()[dim] != 1 {
            return Err(Error::msg(format!(
                "cannot squeeze dim {} with extent {}",
                dim,
                self.dims()[dim]
            )));
        }
        self.select(dim, 0)
    }

    /// Repeat an extent-1 dimension `n` times through a zero stride.
    pub fn stretch(&self, dim: usize, n: usize) -> Result<Layout> {
        self.check_dim(dim)?;
        if self.dims()[dim] != 1 {
            let mut target = self.dims().to_vec();
            target[dim] = n;
            return Err(Error::shape_mismatch(
                "stretch",
                &self.shape,
                &Shape::new(target),
            ));
        }
        let mut dims = self.dims().to_vec();
        let mut strides = self.strides.clone();
        dims[dim] = n;
        strides[dim] = 0;
        Ok(Layout::new(Shape::new(dims), strides, self.offset))
    }

    /// View this layout with shape `target`, using stride 0 on every
    /// broadcast dimension (leading or extent-1).
    pub fn broadcast_to(&self, target: &Shape) -> Result<Layout> {
        let src = self.dims();
        let dst = target.dims();
        if dst.len() < src.len() {
            return Err(Error::shape_mismatch("broadcast_to", &self.shape, target));
        }
        let lead = dst.len() - src.len();
        let mut strides = vec![0isize; dst.len()];
        for (i, (&d, &s)) in src.iter().zip(&self.strides).enumerate() {
            let t = dst[lead + i];
            if d == t {
                strides[lead + i] = s;
            } else if d != 1 {
                return Err(Error::shape_mismatch("broadcast_to", &self.shape, target));
            }
        }
        Ok(Layout::new(target.clone(), strides, self.offset))
    }

    /// Reinterpret a C-dense layout with a new shape of equal element count.
    ///
    /// Returns `None` when the layout is not C-dense; the data must then be
    /// copied before it can take the new shape.
    pub fn reshape(&self, target: &Shape) -> Result<Option<Layout>> {
        if target.elem_count() != self.elem_count() {
            return Err(Error::ElementCountMismatch {
                shape: target.clone(),
                expected: target.elem_count(),
                got: self.elem_count(),
            });
        }
        if !self.is_c_dense() {
            return Ok(None);
        }
        Ok(Some(Layout::new(
            target.clone(),
            target.stride_contiguous(),
            self.offset,
        )))
    }
}
