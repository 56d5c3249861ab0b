//! Chaos-State: result persistence for the chaos control plane
//!
//! This crate owns the durable side of an experiment's life: the result
//! record written when an experiment terminates, and the store it lives in.
//!
//! ## Key Components
//!
//! - `ResultStore`: append-only result persistence (backend-agnostic)
//! - `MemoryResultStore`: in-process implementation
//! - `RetentionPolicy`: explicit, operator-invoked eviction rules

mod error;
pub mod memory;
pub mod retention;
pub mod storage_traits;

pub use error::StorageError;
pub use memory::MemoryResultStore;
pub use retention::{RetentionPolicy, RetentionReport};
pub use storage_traits::{
    ExperimentId, ExperimentResult, Outcome, ResultId, ResultMetrics, ResultStore, StorageResult,
};
