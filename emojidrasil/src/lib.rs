//! Helpers shared by the IR and backend of the color font compiler.

pub mod disjoint_set;
pub mod error;
pub mod fixed;
pub mod transform;
pub mod types;
