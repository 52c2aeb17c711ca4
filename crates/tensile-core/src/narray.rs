use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform};

use crate::backend::{self, BinaryOp, CmpOp, ReduceOp, UnaryOp};
use crate::dtype::{DType, WithDType};
use crate::error::{Error, Result};
use crate::iter::{IndexIter, Order, PointerIter};
use crate::layout::{Layout, MemoryOrder};
use crate::shape::Shape;
use crate::storage::{ElementAccess, Storage, TypedStorage};
use crate::{bail, with_dtype, with_storage};

// NArray — a typed view over shared storage
//
// An NArray is {storage handle, layout, dtype}. The storage handle is an
// `Arc<RwLock<Storage>>`: cloning an NArray or taking a view only clones the
// Arc, so many arrays can address one buffer.
//
// VIEW vs COPY
//
//   Views (select, slice, transpose, permute, flip, broadcast_to, stretch,
//   unsqueeze, squeeze, and reshape of a C-dense array) return an NArray
//   over the *same* storage. Writing through a view (set, fill, assign,
//   `*_assign`) is visible through every alias of the overlapping region.
//
//   Everything else (arithmetic, reductions, matmul, copy, to_dtype, and
//   reshape of a non-dense array) allocates fresh dense row-major storage.
//
// Binary operations broadcast their operands and promote mixed dtypes
// (float beats int, wider beats narrower) before calling into the kernels.

/// An n-dimensional array over shared typed storage.
#[derive(Clone)]
pub struct NArray {
    storage: Arc<RwLock<Storage>>,
    layout: Layout,
    dtype: DType,
}

impl std::fmt::Debug for NArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "NArray(shape={}, dtype={}, strides={:?}, offset={})",
            self.layout.shape(),
            self.dtype,
            self.layout.strides(),
            self.layout.offset()
        )
    }
}

impl NArray {
    // Internal constructors

    pub(crate) fn from_storage(storage: Storage, layout: Layout) -> Self {
        NArray {
            dtype: storage.dtype(),
            storage: Arc::new(RwLock::new(storage)),
            layout,
        }
    }

    fn dense(storage: Storage, shape: Shape) -> Self {
        Self::from_storage(storage, Layout::contiguous(shape))
    }

    fn view(&self, layout: Layout) -> Self {
        NArray {
            storage: Arc::clone(&self.storage),
            layout,
            dtype: self.dtype,
        }
    }

    pub(crate) fn read_storage(&self) -> Result<RwLockReadGuard<'_, Storage>> {
        self.storage
            .read()
            .map_err(|_| Error::msg("storage lock poisoned"))
    }

    fn write_storage(&self) -> Result<RwLockWriteGuard<'_, Storage>> {
        self.storage
            .write()
            .map_err(|_| Error::msg("storage lock poisoned"))
    }

    /// Run `f` on the storage of `self` and `other` under read locks,
    /// taking a single lock when they share a buffer.
    fn with_pair<R>(&self, other: &Self, f: impl FnOnce(&Storage, &Storage) -> Result<R>) -> Result<R> {
        let a = self.read_storage()?;
        if self.shares_storage(other) {
            return f(&a, &a);
        }
        let b = other.read_storage()?;
        f(&a, &b)
    }

    // Creation

    /// Dense row-major array taking ownership of `data`.
    pub fn from_vec<T: WithDType>(data: Vec<T>, shape: impl Into<Shape>) -> Result<Self> {
        let shape = shape.into();
        if data.len() != shape.elem_count() {
            return Err(Error::ElementCountMismatch {
                expected: shape.elem_count(),
                got: data.len(),
                shape,
            });
        }
        Ok(Self::dense(Storage::from_vec(data), shape))
    }

    pub fn from_slice<T: WithDType>(data: &[T], shape: impl Into<Shape>) -> Result<Self> {
        Self::from_vec(data.to_vec(), shape)
    }

    /// Dense array of `dtype` from f64 values (cast per element).
    pub fn from_f64_slice(data: &[f64], shape: impl Into<Shape>, dtype: DType) -> Result<Self> {
        with_dtype!(dtype, T => {
            Self::from_vec(data.iter().map(|&v| T::from_f64(v)).collect::<Vec<T>>(), shape)
        })
    }

    /// Rank-0 array holding `value`.
    pub fn scalar<T: WithDType>(value: T) -> Self {
        Self::dense(Storage::from_vec(vec![value]), Shape::scalar())
    }

    pub fn full(shape: impl Into<Shape>, value: f64, dtype: DType) -> Self {
        let shape = shape.into();
        let n = shape.elem_count();
        let storage = with_dtype!(dtype, T => Storage::from_vec(vec![T::from_f64(value); n]));
        Self::dense(storage, shape)
    }

    pub fn zeros(shape: impl Into<Shape>, dtype: DType) -> Self {
        let shape = shape.into();
        Self::dense(Storage::zeros(shape.elem_count(), dtype), shape)
    }

    pub fn ones(shape: impl Into<Shape>, dtype: DType) -> Self {
        Self::full(shape, 1.0, dtype)
    }

    pub fn zeros_like(&self) -> Self {
        Self::zeros(self.shape().clone(), self.dtype)
    }

    pub fn ones_like(&self) -> Self {
        Self::ones(self.shape().clone(), self.dtype)
    }

    pub fn full_like(&self, value: f64) -> Self {
        Self::full(self.shape().clone(), value, self.dtype)
    }

    /// Array whose element at each logical index is `f(index)`, generated in
    /// row-major order.
    pub fn from_fn(shape: impl Into<Shape>, dtype: DType, mut f: impl FnMut(&[usize]) -> f64) -> Self {
        let shape = shape.into();
        let storage = with_dtype!(dtype, T => {
            let mut data = Vec::with_capacity(shape.elem_count());
            let mut indices = IndexIter::new(&shape);
            while let Some(index) = indices.next_index() {
                data.push(T::from_f64(f(index)));
            }
            T::into_storage(TypedStorage::new(data))
        });
        Self::dense(storage, shape)
    }

    /// `[start, start + step, ...]` up to but excluding `end`.
    pub fn arange(start: f64, end: f64, step: f64, dtype: DType) -> Result<Self> {
        if step == 0.0 || !step.is_finite() {
            bail!("arange: step must be finite and non-zero, got {}", step);
        }
        if !start.is_finite() || !end.is_finite() {
            bail!("arange: bounds must be finite, got [{}, {})", start, end);
        }
        let n = ((end - start) / step).ceil().max(0.0) as usize;
        Ok(Self::from_fn(n, dtype, |i| start + i[0] as f64 * step))
    }

    /// `n`×`n` identity matrix.
    pub fn eye(n: usize, dtype: DType) -> Self {
        Self::from_fn((n, n), dtype, |i| if i[0] == i[1] { 1.0 } else { 0.0 })
    }

    /// Samples from U[low, high) drawn from the given generator.
    pub fn rand_uniform<R: Rng + ?Sized>(
        shape: impl Into<Shape>,
        low: f64,
        high: f64,
        dtype: DType,
        rng: &mut R,
    ) -> Result<Self> {
        if !(low < high) {
            bail!("rand_uniform: empty range [{}, {})", low, high);
        }
        let shape = shape.into();
        let dist = Uniform::new(low, high);
        let data: Vec<f64> = (0..shape.elem_count()).map(|_| dist.sample(rng)).collect();
        Self::from_f64_slice(&data, shape, dtype)
    }

    /// Samples from N(mean, std²) drawn from the given generator.
    pub fn rand_normal<R: Rng + ?Sized>(
        shape: impl Into<Shape>,
        mean: f64,
        std: f64,
        dtype: DType,
        rng: &mut R,
    ) -> Result<Self> {
        let dist = Normal::new(mean, std).map_err(|e| Error::msg(format!("rand_normal: {e}")))?;
        let shape = shape.into();
        let data: Vec<f64> = (0..shape.elem_count()).map(|_| dist.sample(rng)).collect();
        Self::from_f64_slice(&data, shape, dtype)
    }

    /// View of this array's storage through an arbitrary layout.
    ///
    /// Fails unless every logical index of `layout` addresses a slot of the
    /// underlying buffer.
    pub fn as_strided(&self, layout: Layout) -> Result<Self> {
        let len = self.read_storage()?.len();
        if !layout.fits(len) {
            bail!(
                "layout {:?}+{} with shape {} overruns storage of {} elements",
                layout.strides(),
                layout.offset(),
                layout.shape(),
                len
            );
        }
        Ok(self.view(layout))
    }

    // Accessors

    pub fn shape(&self) -> &Shape {
        self.layout.shape()
    }

    pub fn dims(&self) -> &[usize] {
        self.layout.dims()
    }

    pub fn rank(&self) -> usize {
        self.layout.rank()
    }

    pub fn elem_count(&self) -> usize {
        self.layout.elem_count()
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn is_contiguous(&self) -> bool {
        self.layout.is_contiguous()
    }

    /// Whether both arrays are views of the same storage buffer.
    pub fn shares_storage(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage)
    }

    /// Fresh pointer iterator over this array's physical offsets.
    pub fn offsets(&self, order: Order) -> PointerIter {
        self.layout.offsets(order)
    }

    // Element access

    /// Element at a logical index, converted to `T`.
    pub fn get<T: WithDType>(&self, index: &[usize]) -> Result<T> {
        let offset = self.layout.offset_of(index)?;
        self.read_storage()?.get(offset)
    }

    /// Write `value` at a logical index. Visible through every alias.
    pub fn set<T: WithDType>(&self, index: &[usize], value: T) -> Result<()> {
        let offset = self.layout.offset_of(index)?;
        self.write_storage()?.set(offset, value)
    }

    /// Logical contents in row-major order, converted to `T`.
    pub fn to_vec<T: WithDType>(&self) -> Result<Vec<T>> {
        let guard = self.read_storage()?;
        Ok(with_storage!(&*guard, s, _S => {
            let src = s.as_slice();
            backend::walk(&self.layout, MemoryOrder::RowMajor)
                .map(|off| src[off].cast::<T>())
                .collect()
        }))
    }

    pub fn to_f64_vec(&self) -> Result<Vec<f64>> {
        Ok(backend::to_f64_vec(&*self.read_storage()?, &self.layout))
    }

    /// The single element of a rank-0 or one-element array.
    pub fn to_scalar<T: WithDType>(&self) -> Result<T> {
        if self.elem_count() != 1 {
            return Err(Error::ElementCountMismatch {
                shape: self.shape().clone(),
                expected: 1,
                got: self.elem_count(),
            });
        }
        self.read_storage()?.get(self.layout.offset())
    }

    // Elementwise

    fn broadcast_with(&self, rhs: &Self, op: &'static str) -> Result<Shape> {
        Shape::broadcast_shape(self.shape(), rhs.shape())
            .map_err(|_| Error::shape_mismatch(op, self.shape(), rhs.shape()))
    }

    fn binary_op(&self, rhs: &Self, op: BinaryOp) -> Result<Self> {
        let shape = self.broadcast_with(rhs, op.name())?;
        let dtype = self.dtype.promote(rhs.dtype);
        let (lhs, rhs) = (self.to_dtype(dtype)?, rhs.to_dtype(dtype)?);
        let (ll, rl) = (lhs.layout.broadcast_to(&shape)?, rhs.layout.broadcast_to(&shape)?);
        let storage = lhs.with_pair(&rhs, |a, b| backend::binary(op, a, &ll, b, &rl))?;
        Ok(Self::dense(storage, shape))
    }

    fn cmp_op(&self, rhs: &Self, op: CmpOp) -> Result<Self> {
        let shape = self.broadcast_with(rhs, "cmp")?;
        let dtype = self.dtype.promote(rhs.dtype);
        let (lhs, rhs) = (self.to_dtype(dtype)?, rhs.to_dtype(dtype)?);
        let (ll, rl) = (lhs.layout.broadcast_to(&shape)?, rhs.layout.broadcast_to(&shape)?);
        let storage = lhs.with_pair(&rhs, |a, b| backend::cmp(op, a, &ll, b, &rl))?;
        Ok(Self::dense(storage, shape))
    }

    fn unary_op(&self, op: UnaryOp) -> Result<Self> {
        let storage = backend::unary(op, &*self.read_storage()?, &self.layout)?;
        Ok(Self::dense(storage, self.shape().clone()))
    }

    pub fn add(&self, rhs: &Self) -> Result<Self> {
        self.binary_op(rhs, BinaryOp::Add)
    }

    pub fn sub(&self, rhs: &Self) -> Result<Self> {
        self.binary_op(rhs, BinaryOp::Sub)
    }

    pub fn mul(&self, rhs: &Self) -> Result<Self> {
        self.binary_op(rhs, BinaryOp::Mul)
    }

    /// Float-only; integer operands give `UnsupportedElementType`.
    pub fn div(&self, rhs: &Self) -> Result<Self> {
        self.binary_op(rhs, BinaryOp::Div)
    }

    pub fn maximum(&self, rhs: &Self) -> Result<Self> {
        self.binary_op(rhs, BinaryOp::Maximum)
    }

    pub fn minimum(&self, rhs: &Self) -> Result<Self> {
        self.binary_op(rhs, BinaryOp::Minimum)
    }

    pub fn eq(&self, rhs: &Self) -> Result<Self> {
        self.cmp_op(rhs, CmpOp::Eq)
    }

    pub fn ne(&self, rhs: &Self) -> Result<Self> {
        self.cmp_op(rhs, CmpOp::Ne)
    }

    pub fn gt(&self, rhs: &Self) -> Result<Self> {
        self.cmp_op(rhs, CmpOp::Gt)
    }

    pub fn ge(&self, rhs: &Self) -> Result<Self> {
        self.cmp_op(rhs, CmpOp::Ge)
    }

    pub fn lt(&self, rhs: &Self) -> Result<Self> {
        self.cmp_op(rhs, CmpOp::Lt)
    }

    pub fn le(&self, rhs: &Self) -> Result<Self> {
        self.cmp_op(rhs, CmpOp::Le)
    }

    pub fn neg(&self) -> Result<Self> {
        self.unary_op(UnaryOp::Neg)
    }

    pub fn abs(&self) -> Result<Self> {
        self.unary_op(UnaryOp::Abs)
    }

    pub fn square(&self) -> Result<Self> {
        self.unary_op(UnaryOp::Square)
    }

    pub fn relu(&self) -> Result<Self> {
        self.unary_op(UnaryOp::Relu)
    }

    pub fn exp(&self) -> Result<Self> {
        self.unary_op(UnaryOp::Exp)
    }

    /// Natural logarithm.
    pub fn log(&self) -> Result<Self> {
        self.unary_op(UnaryOp::Log)
    }

    pub fn sqrt(&self) -> Result<Self> {
        self.unary_op(UnaryOp::Sqrt)
    }

    pub fn sigmoid(&self) -> Result<Self> {
        self.unary_op(UnaryOp::Sigmoid)
    }

    pub fn tanh(&self) -> Result<Self> {
        self.unary_op(UnaryOp::Tanh)
    }

    pub fn sin(&self) -> Result<Self> {
        self.unary_op(UnaryOp::Sin)
    }

    pub fn cos(&self) -> Result<Self> {
        self.unary_op(UnaryOp::Cos)
    }

    /// `self * mul + add`, computed in f64 per element.
    pub fn affine(&self, mul: f64, add: f64) -> Result<Self> {
        let storage = backend::affine(&*self.read_storage()?, &self.layout, mul, add)?;
        Ok(Self::dense(storage, self.shape().clone()))
    }

    pub fn powf(&self, exponent: f64) -> Result<Self> {
        let storage = backend::powf(&*self.read_storage()?, &self.layout, exponent)?;
        Ok(Self::dense(storage, self.shape().clone()))
    }

    /// Value-converted copy; a cheap clone when the dtype already matches.
    pub fn to_dtype(&self, dtype: DType) -> Result<Self> {
        if dtype == self.dtype {
            return Ok(self.clone());
        }
        let storage = backend::cast(&*self.read_storage()?, &self.layout, dtype);
        Ok(Self::dense(storage, self.shape().clone()))
    }

    // In-place. The receiver's shape must already be the broadcast shape.

    /// `src` checked against the receiver's shape and materialised first
    /// when it aliases the receiver's storage.
    fn inplace_operand(&self, src: &Self, op: &'static str) -> Result<Self> {
        let shape = self.broadcast_with(src, op)?;
        if &shape != self.shape() {
            return Err(Error::shape_mismatch(op, self.shape(), src.shape()));
        }
        if self.shares_storage(src) {
            src.copy()
        } else {
            Ok(src.clone())
        }
    }

    fn binary_assign(&self, rhs: &Self, op: BinaryOp) -> Result<()> {
        let src = self.inplace_operand(rhs, op.name())?.to_dtype(self.dtype)?;
        let layout = src.layout.broadcast_to(self.shape())?;
        let read = src.read_storage()?;
        backend::binary_into(op, &mut *self.write_storage()?, &self.layout, &read, &layout)
    }

    /// `self += rhs` through the storage `inc` primitive; `rhs` keeps its
    /// own dtype and is converted per element.
    pub fn add_assign(&self, rhs: &Self) -> Result<()> {
        let src = self.inplace_operand(rhs, "add_assign")?;
        let layout = src.layout.broadcast_to(self.shape())?;
        let read = src.read_storage()?;
        backend::inc_into(&mut *self.write_storage()?, &self.layout, &read, &layout)
    }

    pub fn sub_assign(&self, rhs: &Self) -> Result<()> {
        self.binary_assign(rhs, BinaryOp::Sub)
    }

    pub fn mul_assign(&self, rhs: &Self) -> Result<()> {
        self.binary_assign(rhs, BinaryOp::Mul)
    }

    pub fn div_assign(&self, rhs: &Self) -> Result<()> {
        self.binary_assign(rhs, BinaryOp::Div)
    }

    /// Copy `src` (broadcast to this shape) into the elements of this view.
    pub fn assign(&self, src: &Self) -> Result<()> {
        let src = self.inplace_operand(src, "assign")?;
        let layout = src.layout.broadcast_to(self.shape())?;
        let read = src.read_storage()?;
        backend::assign_into(&mut *self.write_storage()?, &self.layout, &read, &layout)
    }

    /// Set every element of this view to `value`.
    pub fn fill(&self, value: f64) -> Result<()> {
        backend::fill_into(&mut *self.write_storage()?, &self.layout, value)
    }

    // Reductions

    fn check_axes(&self, axes: &[usize]) -> Result<Vec<usize>> {
        let mut axes = axes.to_vec();
        for &a in &axes {
            if a >= self.rank() {
                return Err(Error::DimOutOfRange {
                    dim: a,
                    rank: self.rank(),
                });
            }
        }
        axes.sort_unstable();
        axes.dedup();
        Ok(axes)
    }

    fn reduce_op(&self, op: ReduceOp, axes: &[usize], keepdim: bool) -> Result<Self> {
        let axes = self.check_axes(axes)?;
        let storage = backend::reduce(op, &*self.read_storage()?, &self.layout, &axes)?;
        let dims = self
            .dims()
            .iter()
            .enumerate()
            .filter_map(|(i, &d)| {
                if axes.contains(&i) {
                    keepdim.then_some(1)
                } else {
                    Some(d)
                }
            })
            .collect();
        Ok(Self::dense(storage, Shape::new(dims)))
    }

    fn all_axes(&self) -> Vec<usize> {
        (0..self.rank()).collect()
    }

    /// Sum of every element as a rank-0 array.
    ///
    /// Float arrays keep their dtype. Integer arrays, including U8 masks
    /// from the comparison ops, sum to I64.
    pub fn sum_all(&self) -> Result<Self> {
        self.reduce_op(ReduceOp::Sum, &self.all_axes(), false)
    }

    pub fn sum(&self, dim: usize, keepdim: bool) -> Result<Self> {
        self.reduce_op(ReduceOp::Sum, &[dim], keepdim)
    }

    pub fn sum_axes(&self, dims: &[usize], keepdim: bool) -> Result<Self> {
        self.reduce_op(ReduceOp::Sum, dims, keepdim)
    }

    pub fn mean_all(&self) -> Result<Self> {
        self.reduce_op(ReduceOp::Mean, &self.all_axes(), false)
    }

    pub fn mean(&self, dim: usize, keepdim: bool) -> Result<Self> {
        self.reduce_op(ReduceOp::Mean, &[dim], keepdim)
    }

    pub fn max_all(&self) -> Result<Self> {
        self.reduce_op(ReduceOp::Max, &self.all_axes(), false)
    }

    pub fn max(&self, dim: usize, keepdim: bool) -> Result<Self> {
        self.reduce_op(ReduceOp::Max, &[dim], keepdim)
    }

    pub fn min_all(&self) -> Result<Self> {
        self.reduce_op(ReduceOp::Min, &self.all_axes(), false)
    }

    pub fn min(&self, dim: usize, keepdim: bool) -> Result<Self> {
        self.reduce_op(ReduceOp::Min, &[dim], keepdim)
    }

    /// Row-major flat index of the first maximum, as an I64 scalar.
    pub fn argmax_all(&self) -> Result<Self> {
        self.reduce_op(ReduceOp::ArgMax, &self.all_axes(), false)
    }

    /// Index along `dim` of the first maximum in each lane (I64).
    pub fn argmax(&self, dim: usize, keepdim: bool) -> Result<Self> {
        self.reduce_op(ReduceOp::ArgMax, &[dim], keepdim)
    }

    pub fn argmin_all(&self) -> Result<Self> {
        self.reduce_op(ReduceOp::ArgMin, &self.all_axes(), false)
    }

    pub fn argmin(&self, dim: usize, keepdim: bool) -> Result<Self> {
        self.reduce_op(ReduceOp::ArgMin, &[dim], keepdim)
    }

    /// Sum over every axis that broadcasting `target` up to this shape
    /// created, giving an array of shape `target`.
    ///
    ///   [2, 3, 4] → sum_to_shape([3, 1]) sums axes 0 and 2
    pub fn sum_to_shape(&self, target: &Shape) -> Result<Self> {
        if target == self.shape() {
            return Ok(self.clone());
        }
        if !target.broadcasts_to(self.shape()) {
            return Err(Error::shape_mismatch("sum_to_shape", self.shape(), target));
        }
        let (mut axes, stretched) = target.broadcast_axes(self.shape());
        axes.extend(stretched);
        self.sum_axes(&axes, false)?.reshape(target.clone())
    }

    // Linear algebra

    /// Matrix product of `[..., m, k]` and `[..., k, n]` with identical
    /// leading batch dims.
    pub fn matmul(&self, rhs: &Self) -> Result<Self> {
        let (l, r) = (self.dims(), rhs.dims());
        let rank = l.len();
        if rank < 2 || r.len() != rank || l[..rank - 2] != r[..rank - 2] || l[rank - 1] != r[rank - 2]
        {
            return Err(Error::shape_mismatch("matmul", self.shape(), rhs.shape()));
        }
        let dtype = self.dtype.promote(rhs.dtype);
        let (a, b) = (self.to_dtype(dtype)?, rhs.to_dtype(dtype)?);
        let storage = a.with_pair(&b, |sa, sb| backend::matmul(sa, &a.layout, sb, &b.layout))?;
        let mut dims = l[..rank - 1].to_vec();
        dims.push(r[rank - 1]);
        Ok(Self::dense(storage, Shape::new(dims)))
    }

    // Views. All of these alias the storage of `self`.

    pub fn select(&self, dim: usize, index: usize) -> Result<Self> {
        Ok(self.view(self.layout.select(dim, index)?))
    }

    pub fn slice(&self, dim: usize, start: usize, end: usize, step: usize) -> Result<Self> {
        Ok(self.view(self.layout.slice(dim, start, end, step)?))
    }

    /// `slice` with step 1.
    pub fn narrow(&self, dim: usize, start: usize, len: usize) -> Result<Self> {
        self.slice(dim, start, start.saturating_add(len), 1)
    }

    pub fn transpose(&self, dim0: usize, dim1: usize) -> Result<Self> {
        Ok(self.view(self.layout.transpose(dim0, dim1)?))
    }

    /// Swap the last two dimensions.
    pub fn t(&self) -> Result<Self> {
        let rank = self.rank();
        if rank < 2 {
            return Err(Error::DimOutOfRange { dim: 1, rank });
        }
        self.transpose(rank - 2, rank - 1)
    }

    pub fn permute(&self, perm: &[usize]) -> Result<Self> {
        Ok(self.view(self.layout.permute(perm)?))
    }

    pub fn flip(&self, dim: usize) -> Result<Self> {
        Ok(self.view(self.layout.flip(dim)?))
    }

    pub fn broadcast_to(&self, shape: impl Into<Shape>) -> Result<Self> {
        Ok(self.view(self.layout.broadcast_to(&shape.into())?))
    }

    /// Alias of [`NArray::broadcast_to`].
    pub fn expand(&self, shape: impl Into<Shape>) -> Result<Self> {
        self.broadcast_to(shape)
    }

    /// Repeat an extent-1 dimension `n` times without copying.
    pub fn stretch(&self, dim: usize, n: usize) -> Result<Self> {
        Ok(self.view(self.layout.stretch(dim, n)?))
    }

    pub fn unsqueeze(&self, dim: usize) -> Result<Self> {
        Ok(self.view(self.layout.unsqueeze(dim)?))
    }

    pub fn squeeze(&self, dim: usize) -> Result<Self> {
        Ok(self.view(self.layout.squeeze(dim)?))
    }

    /// New shape with the same element count. A view when this array is
    /// C-dense; otherwise the data is copied first.
    pub fn reshape(&self, shape: impl Into<Shape>) -> Result<Self> {
        let shape = shape.into();
        match self.layout.reshape(&shape)? {
            Some(layout) => Ok(self.view(layout)),
            None => self.copy()?.reshape(shape),
        }
    }

    // Copies

    /// Fresh row-major storage holding the logical contents of this view.
    pub fn copy(&self) -> Result<Self> {
        self.copy_in(MemoryOrder::RowMajor)
    }

    /// Fresh storage in the given memory order.
    pub fn copy_in(&self, order: MemoryOrder) -> Result<Self> {
        let storage = backend::copy(&*self.read_storage()?, &self.layout, order);
        Ok(Self::from_storage(
            storage,
            Layout::dense(self.shape().clone(), order),
        ))
    }

    /// `self` if already row-major from offset 0, otherwise a copy.
    pub fn contiguous(&self) -> Result<Self> {
        if self.is_contiguous() {
            return Ok(self.clone());
        }
        self.copy()
    }
}
