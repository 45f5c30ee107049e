//! # Core Vocabulary
//!
//! Domain types shared by the planner and the runtime.
//!
//! - **[`types`]:** Dimension kinds, data types, kernel kinds and the error taxonomy.
//! - **[`spec`]:** The user-facing description of one binary contraction.

pub mod types;
pub mod spec;
