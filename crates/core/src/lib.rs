//! Domain logic for the labelq annotation work-distribution engine.
//!
//! This crate has zero internal dependencies so it can be used by the
//! persistence layer, the dispatch engine, and any future CLI tooling.
//! Everything here is pure: no I/O, no clocks beyond explicit `chrono`
//! arguments, no database types.

pub mod agreement;
pub mod error;
pub mod lease;
pub mod overlap;
pub mod policy;
pub mod types;
