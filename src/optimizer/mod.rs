//! # Contraction Planner
//!
//! Compile-time analysis of a binary contraction: dimension classification,
//! stride derivation, loop-nest optimization and the packing decision. All
//! output descriptors are pure data consumed by the runtime.
//!
//! - **[`classifier`]:** Assigns every dimension its C/M/N/K role.
//! - **[`strides`]:** Derives per-tensor element strides from storage extents.
//! - **[`nest`]:** Orders the loops, carves out the primitive block and places
//!   the first/last-touch marker.
//! - **[`packing`]:** Decides which input sides are repacked into arena tiles.

pub mod classifier;
pub mod strides;
pub mod nest;
pub mod packing;
