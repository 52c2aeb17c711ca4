//! Reverse-mode automatic differentiation over [`NArray`](crate::NArray).
//!
//! A [`Graph`] is an arena that records one forward pass. [`Tensor`] handles
//! point into it; every differentiable op on them records backward edges,
//! and [`Tensor::backward`] walks those edges from a root to accumulate
//! gradients.
//!
//! ```
//! use tensile_core::{Graph, NArray};
//!
//! let graph = Graph::new();
//! let x = graph.leaf(NArray::from_slice(&[1.0f64, 2.0, 3.0], 3)?, true)?;
//! let y = x.mul(x)?.sum_all()?;
//! y.backward()?;
//! assert_eq!(x.grad()?.to_vec::<f64>()?, vec![2.0, 4.0, 6.0]);
//! # Ok::<(), tensile_core::Error>(())
//! ```

mod backprop;
mod graph;
mod op;
mod tensor;

pub use graph::Graph;
pub use op::{Edge, GradFn, NodeId};
pub use tensor::Tensor;
