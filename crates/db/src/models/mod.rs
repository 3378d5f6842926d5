//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - A `Deserialize` create DTO for inserts

pub mod annotation;
pub mod draft;
pub mod prediction;
pub mod project;
pub mod task;
pub mod task_lock;
