//! # Tensile
//!
//! N-dimensional arrays with aliasing views and reverse-mode autograd.
//!
//! This is the top-level facade crate that re-exports everything you need.
//!
//! ## Usage
//!
//! ```rust
//! use tensile::prelude::*;
//!
//! let a = NArray::from_slice(&[1.0f64, 1.0, 0.0, 1.0], (2, 2))?;
//! let b = NArray::from_slice(&[-2.0f64, 2.0], (1, 2))?;
//! assert_eq!(b.matmul(&a)?.to_vec::<f64>()?, vec![-2.0, 0.0]);
//!
//! let graph = Graph::new();
//! let x = graph.leaf(a, true)?;
//! x.square()?.sum_all()?.backward()?;
//! assert_eq!(x.grad()?.to_vec::<f64>()?, vec![2.0, 2.0, 0.0, 2.0]);
//! # Ok::<(), tensile::Error>(())
//! ```
//!
//! ## Layers
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `shape`, `layout` | extents, signed strides, view transforms |
//! | `storage`, `dtype` | typed buffers with cross-type element access |
//! | `iter` | pointer iterators over physical offsets |
//! | `narray` | elementwise, broadcast, reduce, matmul, views |
//! | `autograd` | graph arena, tensor handles, backward |
//! | `config` | rayon thresholds |

pub use tensile_core::*;

/// Commonly used types.
pub mod prelude {
    pub use tensile_core::{
        DType, ElementAccess, Error, ExecConfig, Graph, Layout, MemoryOrder, NArray, Order,
        Result, Shape, Tensor, WithDType,
    };
}
