//! Task dispatch engine for the labelq work-distribution system (PRD-40).
//!
//! Given a worker and a project, hand out the next task to label while
//! never exceeding a task's required redundancy (overlap), never
//! re-offering finished work, and letting projects choose among
//! sequential, uniform-random, and uncertainty (active learning)
//! sampling.
//!
//! The engine is stateless: each [`orchestrator::Dispatcher::dispatch`]
//! call runs to completion against the shared PostgreSQL store, and
//! cross-process mutual exclusion rests entirely on row-level
//! `FOR UPDATE SKIP LOCKED` claims (see `labelq_db`'s lock repository).
//! There is no coordinator process and no background loop.

pub mod candidates;
pub mod config;
pub mod error;
pub mod lock;
pub mod orchestrator;
pub mod strategy;
pub mod trace;

pub use config::DispatchConfig;
pub use error::DispatchError;
pub use orchestrator::{DispatchRequest, DispatchedTask, Dispatcher};
pub use trace::{SelectionTrace, Tier};
