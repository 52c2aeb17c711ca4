use crate::error::{Error, Result};
use crate::layout::Layout;
use crate::shape::Shape;

// PointerIter — physical offsets of a Layout in a chosen traversal order
//
// Every algorithm over arrays walks storage through one of these instead of
// computing `offset + Σ index * stride` per element. The iterator keeps an
// odometer over the dimensions and updates the running offset incrementally:
// stepping dimension k adds stride[k]; wrapping it subtracts
// stride[k] * extent[k] and carries into the next slower dimension.
//
// The order only changes the sequence, never the set: each logical element
// is visited exactly once. A rank-0 layout yields its offset exactly once.

/// Traversal order requested from a [`PointerIter`].
///
/// `StridedC` and `StridedF` are logical orders: two iterators with the same
/// order over layouts of the same shape visit corresponding logical elements
/// in lock-step, whatever their strides. `Dense` and `Default` follow
/// physical memory instead and are only lock-step safe on identical layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Order {
    /// Sequential run `offset, offset + 1, ...` for dense layouts; falls
    /// back to `StridedC` when the layout is not dense.
    Dense,
    /// Logical row-major: last dimension varies fastest.
    StridedC,
    /// Logical column-major: first dimension varies fastest.
    StridedF,
    /// Let the iterator choose: `Dense` when possible, otherwise the
    /// dimension with the smallest |stride| varies fastest.
    #[default]
    Default,
}

enum Walk {
    Sequential {
        next: usize,
    },
    Strided {
        /// Extents, slowest-varying first.
        dims: Vec<usize>,
        /// Strides matching `dims`.
        strides: Vec<isize>,
        index: Vec<usize>,
        offset: isize,
    },
}

/// Single-pass cursor over the physical offsets of a layout.
///
/// Not restartable: build a fresh iterator (via [`Layout::offsets`]) for each
/// traversal.
pub struct PointerIter {
    walk: Walk,
    remaining: usize,
}

impl PointerIter {
    pub fn new(layout: &Layout, order: Order) -> Self {
        let remaining = layout.elem_count();
        let rank = layout.rank();
        let dense = layout.is_dense();

        let axes: Vec<usize> = match order {
            Order::Dense | Order::Default if dense => {
                return PointerIter {
                    walk: Walk::Sequential {
                        next: layout.span().map_or(layout.offset(), |(lo, _)| lo),
                    },
                    remaining,
                };
            }
            Order::Dense | Order::StridedC => (0..rank).collect(),
            Order::StridedF => (0..rank).rev().collect(),
            Order::Default => {
                let mut axes: Vec<usize> = (0..rank).collect();
                // Stable: equal strides keep row-major order.
                axes.sort_by_key(|&a| std::cmp::Reverse(layout.strides()[a].unsigned_abs()));
                axes
            }
        };

        PointerIter {
            walk: Walk::Strided {
                dims: axes.iter().map(|&a| layout.dims()[a]).collect(),
                strides: axes.iter().map(|&a| layout.strides()[a]).collect(),
                index: vec![0; rank],
                offset: layout.offset() as isize,
            },
            remaining,
        }
    }

    /// Whether another offset is available.
    pub fn has_next(&self) -> bool {
        self.remaining > 0
    }

    /// The next offset, or [`Error::OutOfElements`] once exhausted.
    pub fn next_offset(&mut self) -> Result<usize> {
        self.next().ok_or(Error::OutOfElements)
    }
}

impl Iterator for PointerIter {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        match &mut self.walk {
            Walk::Sequential { next } => {
                let current = *next;
                *next += 1;
                Some(current)
            }
            Walk::Strided {
                dims,
                strides,
                index,
                offset,
            } => {
                let current = *offset as usize;
                if self.remaining > 0 {
                    for k in (0..dims.len()).rev() {
                        index[k] += 1;
                        *offset += strides[k];
                        if index[k] < dims[k] {
                            break;
                        }
                        *offset -= strides[k] * dims[k] as isize;
                        index[k] = 0;
                    }
                }
                Some(current)
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for PointerIter {}

/// Row-major walk over the logical indices of a shape.
///
/// Lends each index as a slice instead of allocating per element.
pub struct IndexIter {
    dims: Vec<usize>,
    index: Vec<usize>,
    remaining: usize,
    started: bool,
}

impl IndexIter {
    pub fn new(shape: &Shape) -> Self {
        IndexIter {
            dims: shape.dims().to_vec(),
            index: vec![0; shape.rank()],
            remaining: shape.elem_count(),
            started: false,
        }
    }

    pub fn next_index(&mut self) -> Option<&[usize]> {
        if self.remaining == 0 {
            return None;
        }
        if self.started {
            for k in (0..self.dims.len()).rev() {
                self.index[k] += 1;
                if self.index[k] < self.dims[k] {
                    break;
                }
                self.index[k] = 0;
            }
        }
        self.started = true;
        self.remaining -= 1;
        Some(&self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::MemoryOrder;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn test_contiguous_offsets() {
        let layout = Layout::contiguous(Shape::from((2, 3)));
        let c: Vec<usize> = layout.offsets(Order::StridedC).collect();
        assert_eq!(c, vec![0, 1, 2, 3, 4, 5]);
        let d: Vec<usize> = layout.offsets(Order::Dense).collect();
        assert_eq!(d, c);
    }

    #[test]
    fn test_transpose_offsets() {
        // Original [2,3]:            Transposed [3,2]:
        //   [[0, 1, 2],                [[0, 3],
        //    [3, 4, 5]]                 [1, 4],
        //                               [2, 5]]
        let layout = Layout::contiguous(Shape::from((2, 3)));
        let t = layout.transpose(0, 1).unwrap();
        let c: Vec<usize> = t.offsets(Order::StridedC).collect();
        assert_eq!(c, vec![0, 3, 1, 4, 2, 5]);
        let f: Vec<usize> = t.offsets(Order::StridedF).collect();
        assert_eq!(f, vec![0, 1, 2, 3, 4, 5]);
        // The transpose is F-dense, so Default walks memory sequentially.
        let d: Vec<usize> = t.offsets(Order::Default).collect();
        assert_eq!(d, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_scalar_yields_once() {
        let layout = Layout::new(Shape::scalar(), vec![], 7);
        for order in [Order::Dense, Order::StridedC, Order::StridedF, Order::Default] {
            let all: Vec<usize> = layout.offsets(order).collect();
            assert_eq!(all, vec![7]);
        }
    }

    #[test]
    fn test_exhaustion_protocol() {
        let layout = Layout::contiguous(Shape::from(2));
        let mut it = layout.offsets(Order::StridedC);
        assert!(it.has_next());
        assert_eq!(it.next_offset(), Ok(0));
        assert_eq!(it.next_offset(), Ok(1));
        assert!(!it.has_next());
        assert_eq!(it.next_offset(), Err(Error::OutOfElements));
    }

    #[test]
    fn test_broadcast_offsets_repeat() {
        let layout = Layout::contiguous(Shape::from(3))
            .broadcast_to(&Shape::from((2, 3)))
            .unwrap();
        let c: Vec<usize> = layout.offsets(Order::StridedC).collect();
        assert_eq!(c, vec![0, 1, 2, 0, 1, 2]);
        // Default puts the zero-stride dimension innermost.
        let d: Vec<usize> = layout.offsets(Order::Default).collect();
        assert_eq!(d, vec![0, 0, 1, 1, 2, 2]);
    }

    #[test]
    fn test_flipped_offsets() {
        let layout = Layout::contiguous(Shape::from(4)).flip(0).unwrap();
        let c: Vec<usize> = layout.offsets(Order::Dense).collect();
        assert_eq!(c, vec![3, 2, 1, 0]);
    }

    #[test]
    fn test_empty_layout() {
        let layout = Layout::contiguous(Shape::from((3, 0)));
        assert_eq!(layout.offsets(Order::Default).count(), 0);
    }

    #[test]
    fn test_index_iter() {
        let mut it = IndexIter::new(&Shape::from((2, 2)));
        let mut seen = Vec::new();
        while let Some(idx) = it.next_index() {
            seen.push(idx.to_vec());
        }
        assert_eq!(seen, vec![vec![0, 0], vec![0, 1], vec![1, 0], vec![1, 1]]);
    }

    fn arbitrary_view() -> impl Strategy<Value = Layout> {
        (prop::collection::vec(1usize..4, 1..4), any::<bool>(), any::<u8>()).prop_map(
            |(dims, fortran, twist)| {
                let order = if fortran {
                    MemoryOrder::ColumnMajor
                } else {
                    MemoryOrder::RowMajor
                };
                let mut layout = Layout::dense(Shape::new(dims), order);
                let rank = layout.rank();
                if twist & 1 == 1 {
                    layout = layout.flip(0).unwrap();
                }
                if twist & 2 == 2 && rank > 1 {
                    layout = layout.transpose(0, rank - 1).unwrap();
                }
                if twist & 4 == 4 && layout.dims()[rank - 1] > 1 {
                    let end = layout.dims()[rank - 1];
                    layout = layout.slice(rank - 1, 1, end, 1).unwrap();
                }
                layout
            },
        )
    }

    proptest! {
        #[test]
        fn every_order_visits_each_element_once(layout in arbitrary_view()) {
            let n = layout.elem_count();
            let reference: HashSet<usize> = layout.offsets(Order::StridedC).collect();
            prop_assert_eq!(reference.len(), n);
            for order in [Order::Dense, Order::StridedF, Order::Default] {
                let offsets: Vec<usize> = layout.offsets(order).collect();
                prop_assert_eq!(offsets.len(), n);
                let set: HashSet<usize> = offsets.into_iter().collect();
                prop_assert_eq!(&set, &reference);
            }
        }
    }
}
