#![allow(unused_unsafe)]
#![allow(unsafe_op_in_unsafe_fn)]

//! contracta — a compiler and runtime for binary tensor contractions.
//!
//! One contraction `out[C,M,N] (+)= f(left[C,M,K], right[C,N,K])` is
//! described by per-dimension integer ids, compiled into a blocked loop nest
//! with an inner micro-kernel and optional input packing, and executed in
//! parallel with first-touch / last-touch kernels fused around the reduction.

pub mod core;
pub mod optimizer;
pub mod runtime;
pub mod kernels;
pub mod contraction;

pub use crate::contraction::{BinaryContraction, PlanState};
pub use crate::core::spec::ContractionSpec;
pub use crate::core::types::{
    ContractionError, DataType, DimId, DimKind, ExecKind, KernelKind, TouchKind,
};
pub use crate::optimizer::nest::{KernelSpec, LoopDesc, LoopPlan};
