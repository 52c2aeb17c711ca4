// Op — recorded backward edges
//
// Every differentiable operation records, for each operand that requires a
// gradient, one Edge: the operand's NodeId plus a function mapping the
// result's gradient to that operand's gradient contribution.
//
// Example: c = a * b
//   c.edges = [ Edge(a, g ↦ g * b), Edge(b, g ↦ g * a) ]
//
// Edges hold NodeIds and captured NArray values, never Tensor handles, so a
// node can be referenced by any number of consumers without ownership cycles.
// A leaf has no edges.

use std::fmt;

use crate::error::Result;
use crate::narray::NArray;

/// Index of a node in its graph's arena.
///
/// Ids grow with creation order, and every edge points from a larger id to a
/// smaller one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Gradient contribution for one operand, given the result's gradient.
pub type GradFn = Box<dyn Fn(&NArray) -> Result<NArray>>;

/// One backward edge: result → `parent`.
pub struct Edge {
    pub(crate) parent: NodeId,
    pub(crate) backward: GradFn,
}

impl Edge {
    pub fn new(parent: NodeId, backward: impl Fn(&NArray) -> Result<NArray> + 'static) -> Self {
        Edge {
            parent,
            backward: Box::new(backward),
        }
    }

    pub fn parent(&self) -> NodeId {
        self.parent
    }
}

impl fmt::Debug for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Edge(→{})", self.parent.0)
    }
}
