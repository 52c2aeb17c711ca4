// Backpropagation — reverse-mode traversal of one Graph
//
// HOW IT WORKS:
//
//   1. The root's grad is reset to its seed: the one kept by set_grad(),
//      or the implicit 1 when the root is a scalar. Seeds live apart from
//      the accumulator, so neither zero_grad() nor a pass from another
//      root can change what the next pass starts from.
//
//   2. Mark every node reachable from the root through edges, and clear
//      the grads of reachable interior nodes. Repeated passes accumulate
//      into leaves only.
//
//   3. Visit reachable nodes in decreasing NodeId. Arena order is creation
//      order, and a node is always created after its operands, so when a
//      node is visited every consumer has already pushed its contribution:
//      its grad is final and its edges can fire exactly once.
//
//   4. Each edge maps the node's grad to a contribution for its parent. The
//      parent's grad is allocated as zeros on first contact and the
//      contribution is accumulated with add_assign (storage inc).
//
// ACCUMULATION: a node consumed twice receives the SUM of both
// contributions. For c = a * a, grad_a = g * a + g * a = 2 * a * g.
//
// The helpers at the bottom implement gradient rules shared by several ops
// in tensor.rs.

use crate::autograd::graph::{reachable, Graph};
use crate::autograd::op::NodeId;
use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::narray::NArray;
use crate::shape::Shape;

/// Run backward from `root`, accumulating into every reachable grad.
pub(crate) fn backward(graph: &Graph, root: NodeId) -> Result<()> {
    let mut nodes = graph.nodes_mut()?;

    {
        let node = &mut nodes[root.0];
        if !node.requires_grad {
            return Err(Error::ungraded(format!(
                "backward from node {} ({}) which does not require grad",
                root.0, node.op
            )));
        }
        let seed = match node.seed.clone() {
            Some(seed) => seed,
            None if node.value.elem_count() == 1 => node.value.ones_like(),
            None => {
                return Err(Error::ungraded(format!(
                    "backward from non-scalar node {} with shape {} needs a seeded gradient",
                    root.0,
                    node.value.shape()
                )));
            }
        };
        match &node.grad {
            Some(grad) => grad.assign(&seed)?,
            None => node.grad = Some(seed.copy()?),
        }
    }

    let live = reachable(&nodes, root);
    // Interior grads hold only this pass's contributions; leaves accumulate.
    for id in 0..root.0 {
        if live[id] && !nodes[id].edges.is_empty() {
            if let Some(grad) = &nodes[id].grad {
                grad.fill(0.0)?;
            }
        }
    }
    tracing::debug!(
        root = root.0,
        reachable = live.iter().filter(|&&r| r).count(),
        "backward start"
    );

    let mut fired = 0usize;
    for id in (0..=root.0).rev() {
        if !live[id] || nodes[id].edges.is_empty() {
            continue;
        }
        let grad = match &nodes[id].grad {
            Some(g) => g.clone(),
            None => continue,
        };
        let mut contributions = Vec::with_capacity(nodes[id].edges.len());
        for edge in &nodes[id].edges {
            tracing::trace!(node = id, op = nodes[id].op, parent = edge.parent.0, "edge");
            contributions.push((edge.parent, (edge.backward)(&grad)?));
        }
        fired += contributions.len();
        for (parent, contribution) in contributions {
            let node = &mut nodes[parent.0];
            if node.grad.is_none() {
                node.grad = Some(node.value.zeros_like());
            }
            if let Some(acc) = &node.grad {
                acc.add_assign(&contribution)?;
            }
        }
    }

    tracing::debug!(root = root.0, edges = fired, "backward done");
    Ok(())
}

/// Fill every allocated grad reachable from `root` with zeros.
pub(crate) fn zero_grad(graph: &Graph, root: NodeId) -> Result<()> {
    let nodes = graph.nodes_mut()?;
    let live = reachable(&nodes, root);
    let mut cleared = 0usize;
    for (node, _) in nodes.iter().zip(&live).filter(|(_, live)| **live) {
        if let Some(grad) = &node.grad {
            grad.fill(0.0)?;
            cleared += 1;
        }
    }
    tracing::debug!(root = root.0, cleared, "zero_grad");
    Ok(())
}

// Shared gradient rules

/// Grad of a reduction over `dim`: re-insert the axis if it was dropped and
/// broadcast back to the input shape.
pub(crate) fn expand_reduced(g: &NArray, dim: usize, keepdim: bool, input: &Shape) -> Result<NArray> {
    let g = if keepdim { g.clone() } else { g.unsqueeze(dim)? };
    g.broadcast_to(input.clone())
}

/// Place `g` into a zero array of `input` shape through the same view that
/// produced the forward result.
pub(crate) fn scatter_into_zeros(
    g: &NArray,
    input: &Shape,
    view: impl Fn(&NArray) -> Result<NArray>,
) -> Result<NArray> {
    let out = NArray::zeros(input.clone(), g.dtype());
    view(&out)?.assign(g)?;
    Ok(out)
}

/// Route the gradient of a `max` along `dim` to the element that won each
/// lane. `winners` holds the argmax with `dim` kept at extent 1, and `g` is
/// the output grad with the same shape.
pub(crate) fn route_to_winners(g: &NArray, winners: &NArray, dim: usize, input: &Shape) -> Result<NArray> {
    let g = g.to_f64_vec()?;
    let winners = winners.to_vec::<i64>()?;
    let mut lane_dims = input.dims().to_vec();
    lane_dims[dim] = 1;
    let lane_strides = Shape::new(lane_dims).stride_contiguous();
    Ok(NArray::from_fn(input.clone(), DType::F64, |index| {
        let lane: isize = index
            .iter()
            .zip(&lane_strides)
            .enumerate()
            .map(|(d, (&i, &s))| if d == dim { 0 } else { i as isize * s })
            .sum();
        let lane = lane as usize;
        if winners[lane] == index[dim] as i64 {
            g[lane]
        } else {
            0.0
        }
    }))
}

/// Gradient of `max_all`: all of `g` goes to row-major position `winner`.
pub(crate) fn route_to_winner(g: &NArray, winner: usize, input: &Shape) -> Result<NArray> {
    let g = g.to_scalar::<f64>()?;
    let mut position = 0usize;
    Ok(NArray::from_fn(input.clone(), DType::F64, |_| {
        let v = if position == winner { g } else { 0.0 };
        position += 1;
        v
    }))
}

/// Permutation undoing `perm`.
pub(crate) fn invert_permutation(perm: &[usize]) -> Vec<usize> {
    let mut inverse = vec![0; perm.len()];
    for (i, &p) in perm.iter().enumerate() {
        inverse[p] = i;
    }
    inverse
}
