//! # Contraction Runtime
//!
//! Execution of a compiled plan: scratch memory, task partitioning and the
//! parallel loop walk.
//!
//! - **[`arena`]:** Double-ended bump allocator for packing buffers.
//! - **[`iter_space`]:** Splits the parallel loops across tasks.
//! - **[`engine`]:** Walks the nest, fires touch kernels and the micro-kernel.

pub mod arena;
pub mod iter_space;
pub mod engine;
