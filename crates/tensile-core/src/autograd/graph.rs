use std::cell::{Ref, RefCell, RefMut};

use crate::autograd::op::{Edge, NodeId};
use crate::autograd::tensor::Tensor;
use crate::error::{Error, Result};
use crate::narray::NArray;

// Graph — an arena of autograd nodes for one forward pass
//
// Every Tensor handle is a (graph, NodeId) pair; the graph owns all node
// state. Build a fresh Graph per forward pass and drop it when done: there
// is no global registry, and two graphs never share nodes.
//
// NODE LIFECYCLE
//
//   Created        value set, grad = None
//   GradAllocated  first backward contribution arrived: grad allocated as
//                  zeros, then accumulated into
//
// zero_grad() fills allocated grads with 0 in place, so their storage is
// reused across iterations.
//
// A Graph is single-threaded (RefCell). Kernels inside an op may still use
// the rayon pool.

pub(crate) struct Node {
    pub(crate) value: NArray,
    pub(crate) grad: Option<NArray>,
    /// Explicit seed from `set_grad`, kept apart from the accumulator and
    /// copied into `grad` whenever backward starts here.
    pub(crate) seed: Option<NArray>,
    pub(crate) requires_grad: bool,
    pub(crate) edges: Vec<Edge>,
    pub(crate) op: &'static str,
}

/// Arena of autograd nodes.
#[derive(Default)]
pub struct Graph {
    nodes: RefCell<Vec<Node>>,
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Graph(nodes={})", self.len())
    }
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes recorded so far.
    pub fn len(&self) -> usize {
        self.nodes.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Input node. With `requires_grad` the value must have a float dtype.
    pub fn leaf(&self, value: NArray, requires_grad: bool) -> Result<Tensor<'_>> {
        if requires_grad && !value.dtype().is_float() {
            return Err(Error::UnsupportedElementType {
                op: "requires_grad",
                dtype: value.dtype(),
            });
        }
        Ok(self.push(Node {
            value,
            grad: None,
            seed: None,
            requires_grad,
            edges: Vec::new(),
            op: "leaf",
        }))
    }

    /// Input node that never receives a gradient.
    pub fn constant(&self, value: NArray) -> Tensor<'_> {
        self.push(Node {
            value,
            grad: None,
            seed: None,
            requires_grad: false,
            edges: Vec::new(),
            op: "constant",
        })
    }

    /// Result node of `op`. It requires a gradient iff any edge was recorded.
    pub(crate) fn record(&self, op: &'static str, value: NArray, edges: Vec<Edge>) -> Tensor<'_> {
        self.push(Node {
            value,
            grad: None,
            seed: None,
            requires_grad: !edges.is_empty(),
            edges,
            op,
        })
    }

    fn push(&self, node: Node) -> Tensor<'_> {
        let mut nodes = self.nodes.borrow_mut();
        let id = NodeId(nodes.len());
        nodes.push(node);
        Tensor::new(self, id)
    }

    pub(crate) fn node(&self, id: NodeId) -> Ref<'_, Node> {
        Ref::map(self.nodes.borrow(), |nodes| &nodes[id.0])
    }

    pub(crate) fn nodes_mut(&self) -> Result<RefMut<'_, Vec<Node>>> {
        self.nodes
            .try_borrow_mut()
            .map_err(|_| Error::msg("graph is borrowed elsewhere"))
    }

    /// Reset the grads of the given tensors to zero, keeping their storage.
    pub fn zero_grad_params(&self, params: &[Tensor<'_>]) -> Result<()> {
        let nodes = self.nodes_mut()?;
        for p in params {
            if !std::ptr::eq(p.graph(), self) {
                return Err(Error::ForeignTensor);
            }
            if let Some(grad) = &nodes[p.id().0].grad {
                grad.fill(0.0)?;
            }
        }
        tracing::debug!(params = params.len(), "zero_grad_params");
        Ok(())
    }
}

/// Mark every node reachable from `root` through edges.
///
/// Edges always point to smaller ids, so one descending sweep suffices.
pub(crate) fn reachable(nodes: &[Node], root: NodeId) -> Vec<bool> {
    let mut seen = vec![false; root.0 + 1];
    seen[root.0] = true;
    for id in (0..=root.0).rev() {
        if seen[id] {
            for edge in &nodes[id].edges {
                seen[edge.parent.0] = true;
            }
        }
    }
    seen
}
