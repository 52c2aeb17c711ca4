use std::fmt;

use crate::error::{Error, Result};

// Shape — N-dimensional extents
//
// A Shape is the immutable list of extents of an array:
//   - Scalar: Shape([])          — rank 0, 1 element
//   - Vector: Shape([5])         — rank 1, 5 elements
//   - Matrix: Shape([3, 4])      — rank 2, 12 elements
//   - Empty:  Shape([3, 0])      — rank 2, 0 elements
//
// The shape determines the element count, the canonical dense strides in
// either memory order, and broadcast compatibility with other shapes.

/// N-dimensional shape of an array.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shape(Vec<usize>);

impl Shape {
    /// Create a new shape from a vector of extents.
    pub fn new(dims: Vec<usize>) -> Self {
        Shape(dims)
    }

    /// The rank-0 shape.
    pub fn scalar() -> Self {
        Shape(Vec::new())
    }

    /// The extents as a slice.
    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    /// Number of dimensions (0 for scalar, 1 for vector, 2 for matrix, etc.).
    pub fn rank(&self) -> usize {
        self.0.len()
    }

    /// Extent of dimension `d`.
    pub fn extent(&self, d: usize) -> Result<usize> {
        self.0.get(d).copied().ok_or(Error::DimOutOfRange {
            dim: d,
            rank: self.rank(),
        })
    }

    /// Total number of elements (product of all extents).
    /// A scalar shape [] has 1 element; any zero extent gives 0.
    pub fn elem_count(&self) -> usize {
        self.0.iter().product()
    }

    pub fn is_scalar(&self) -> bool {
        self.0.is_empty()
    }

    /// Row-major (C-order) strides: the last dimension is contiguous.
    ///
    /// For shape [2, 3, 4], strides are [12, 4, 1].
    pub fn stride_contiguous(&self) -> Vec<isize> {
        let mut strides = vec![0isize; self.rank()];
        let mut acc = 1isize;
        for (s, &d) in strides.iter_mut().zip(self.0.iter()).rev() {
            *s = acc;
            acc *= d.max(1) as isize;
        }
        strides
    }

    /// Column-major (F-order) strides: the first dimension is contiguous.
    ///
    /// For shape [2, 3, 4], strides are [1, 2, 6].
    pub fn stride_fortran(&self) -> Vec<isize> {
        let mut strides = vec![0isize; self.rank()];
        let mut acc = 1isize;
        for (s, &d) in strides.iter_mut().zip(self.0.iter()) {
            *s = acc;
            acc *= d.max(1) as isize;
        }
        strides
    }

    // Broadcasting

    /// Compute the broadcast output shape from two input shapes.
    ///
    /// Shapes are aligned from the trailing dimension; each pair of extents
    /// must be equal or one of them must be 1. Missing leading dimensions
    /// count as 1.
    ///
    ///   [3, 4] and [4]       → [3, 4]
    ///   [2, 1] and [1, 3]    → [2, 3]
    ///   [3] and [4]          → ShapeMismatch
    pub fn broadcast_shape(lhs: &Shape, rhs: &Shape) -> Result<Shape> {
        let l = lhs.dims();
        let r = rhs.dims();
        let max_rank = l.len().max(r.len());
        let mut result = Vec::with_capacity(max_rank);

        for i in 0..max_rank {
            let ld = if i < l.len() { l[l.len() - 1 - i] } else { 1 };
            let rd = if i < r.len() { r[r.len() - 1 - i] } else { 1 };

            if ld == rd || rd == 1 {
                result.push(ld);
            } else if ld == 1 {
                result.push(rd);
            } else {
                return Err(Error::shape_mismatch("broadcast", lhs, rhs));
            }
        }

        result.reverse();
        Ok(Shape::new(result))
    }

    /// Whether this shape can be broadcast (expanded) to `target` without
    /// changing `target`.
    pub fn broadcasts_to(&self, target: &Shape) -> bool {
        Shape::broadcast_shape(self, target).is_ok_and(|s| &s == target)
    }

    /// Axes of `target` that were created by broadcasting this shape up to it.
    ///
    /// Returns `(leading, stretched)`: `leading` are the axes `target` has in
    /// front of this shape, `stretched` are axes (in `target` numbering) where
    /// this shape has extent 1 but `target` does not.
    pub fn broadcast_axes(&self, target: &Shape) -> (Vec<usize>, Vec<usize>) {
        let lead = target.rank().saturating_sub(self.rank());
        let leading = (0..lead).collect();
        let stretched = self
            .0
            .iter()
            .enumerate()
            .filter(|&(i, &d)| d == 1 && target.0[lead + i] != 1)
            .map(|(i, _)| lead + i)
            .collect();
        (leading, stretched)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", d)?;
        }
        write!(f, "]")
    }
}

// These let you write: Shape::from((3, 4)) instead of Shape::new(vec![3, 4])

impl From<()> for Shape {
    fn from(_: ()) -> Self {
        Shape(vec![])
    }
}

impl From<usize> for Shape {
    fn from(d: usize) -> Self {
        Shape(vec![d])
    }
}

impl From<(usize,)> for Shape {
    fn from((d0,): (usize,)) -> Self {
        Shape(vec![d0])
    }
}

impl From<(usize, usize)> for Shape {
    fn from((d0, d1): (usize, usize)) -> Self {
        Shape(vec![d0, d1])
    }
}

impl From<(usize, usize, usize)> for Shape {
    fn from((d0, d1, d2): (usize, usize, usize)) -> Self {
        Shape(vec![d0, d1, d2])
    }
}

impl From<(usize, usize, usize, usize)> for Shape {
    fn from((d0, d1, d2, d3): (usize, usize, usize, usize)) -> Self {
        Shape(vec![d0, d1, d2, d3])
    }
}

impl From<Vec<usize>> for Shape {
    fn from(v: Vec<usize>) -> Self {
        Shape(v)
    }
}

impl From<&[usize]> for Shape {
    fn from(s: &[usize]) -> Self {
        Shape(s.to_vec())
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(s: [usize; N]) -> Self {
        Shape(s.to_vec())
    }
}

impl From<&Shape> for Shape {
    fn from(s: &Shape) -> Self {
        s.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_scalar_shape() {
        let s = Shape::from(());
        assert_eq!(s.rank(), 0);
        assert_eq!(s.elem_count(), 1);
        assert!(s.stride_contiguous().is_empty());
    }

    #[test]
    fn test_empty_extent() {
        let s = Shape::from((3, 0));
        assert_eq!(s.elem_count(), 0);
        assert_eq!(s.stride_contiguous(), vec![1, 1]);
    }

    #[test]
    fn test_3d_strides() {
        let s = Shape::from((2, 3, 4));
        assert_eq!(s.stride_contiguous(), vec![12, 4, 1]);
        assert_eq!(s.stride_fortran(), vec![1, 2, 6]);
        assert_eq!(s.elem_count(), 24);
    }

    #[test]
    fn test_extent_out_of_range() {
        let s = Shape::from((2, 3));
        assert_eq!(s.extent(1), Ok(3));
        assert_eq!(s.extent(2), Err(Error::DimOutOfRange { dim: 2, rank: 2 }));
    }

    #[test]
    fn test_broadcast_shape() {
        let a = Shape::from((5, 3, 1));
        let b = Shape::from((3, 4));
        assert_eq!(Shape::broadcast_shape(&a, &b).unwrap().dims(), &[5, 3, 4]);
        let c = Shape::from(3);
        let d = Shape::from(4);
        assert!(matches!(
            Shape::broadcast_shape(&c, &d),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_broadcast_axes() {
        let small = Shape::from((3, 1));
        let big = Shape::from((2, 3, 4));
        let (leading, stretched) = small.broadcast_axes(&big);
        assert_eq!(leading, vec![0]);
        assert_eq!(stretched, vec![2]);
        assert!(small.broadcasts_to(&big));
        assert!(!big.broadcasts_to(&small));
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Shape::from((3, 4))), "[3, 4]");
    }

    fn small_shape() -> impl Strategy<Value = Shape> {
        prop::collection::vec(prop_oneof![Just(1usize), 1usize..5], 0..4).prop_map(Shape::new)
    }

    proptest! {
        #[test]
        fn broadcast_is_symmetric(a in small_shape(), b in small_shape()) {
            let ab = Shape::broadcast_shape(&a, &b);
            let ba = Shape::broadcast_shape(&b, &a);
            prop_assert_eq!(ab.is_ok(), ba.is_ok());
            if let (Ok(ab), Ok(ba)) = (ab, ba) {
                prop_assert_eq!(ab, ba);
            }
        }
    }
}
