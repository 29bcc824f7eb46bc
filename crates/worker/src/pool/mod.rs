//! Worker pool -- owns the worker threads, the shared queue and shutdown.
//!
//! Split into focused submodules:
//! - `builder`: fluent construction
//! - `core`: WorkerPool struct, admission and accessor methods
//! - `execution`: job dispatch and the worker thread loop
//! - `shutdown`: scoped, idempotent stop with termination polling

mod builder;
mod core;
mod execution;
mod shutdown;

pub use self::builder::WorkerPoolBuilder;
pub use self::core::WorkerPool;
pub use self::shutdown::Termination;
