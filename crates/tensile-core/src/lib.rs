//! # tensile-core
//!
//! N-dimensional arrays over shared typed storage, plus reverse-mode
//! autograd.
//!
//! This crate provides:
//! - [`Shape`] / [`Layout`]: extents, signed strides and offset
//! - [`DType`] / [`WithDType`]: supported element types and casts
//! - [`Storage`] / [`ElementAccess`]: flat typed buffers with cross-type
//!   get/set/inc/fill
//! - [`PointerIter`]: physical offsets of a layout in a chosen [`Order`]
//! - [`NArray`]: elementwise, broadcast, reduction, matmul and view ops
//! - [`Graph`] / [`Tensor`]: the autograd arena and its node handles
//! - [`ExecConfig`]: when kernels run on the rayon pool

pub mod autograd;
pub mod backend;
pub mod config;
pub mod dtype;
pub mod error;
pub mod iter;
pub mod layout;
pub mod narray;
pub mod shape;
pub mod storage;

pub use autograd::{Graph, NodeId, Tensor};
pub use backend::{BinaryOp, CmpOp, ReduceOp, UnaryOp};
pub use config::ExecConfig;
pub use dtype::{DType, FloatDType, WithDType};
pub use error::{Error, Result};
pub use iter::{IndexIter, Order, PointerIter};
pub use layout::{Layout, MemoryOrder};
pub use narray::NArray;
pub use shape::Shape;
pub use storage::{ElementAccess, Storage, TypedStorage};
