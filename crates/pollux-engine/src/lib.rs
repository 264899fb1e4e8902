//! Pollux Polling Engine
//!
//! Drives a [`WorkUnit`](pollux_hal::WorkUnit) through a
//! [`Backend`](pollux_hal::Backend): submit, poll with exponential backoff
//! until a terminal status, fetch the result, and record exactly one
//! [`ResultEntry`] in a write-once [`ResultStore`].
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use pollux_engine::{MemoryResultStore, PollPolicy, PollingEngine};
//! use pollux_hal::WorkUnit;
//! use pollux_adapter_sim::SimulatorBackend;
//!
//! let engine = PollingEngine::new(Arc::new(MemoryResultStore::new()));
//! let backend = SimulatorBackend::completing_after(3, "4");
//! let unit = WorkUnit::builder("2+2").id("w1").build()?;
//!
//! let entry = engine.run(&unit, &backend, &PollPolicy::default()).await?;
//! assert!(entry.outcome.is_success());
//! ```
//!
//! # Outcomes versus errors
//!
//! Timeouts, cancellation, backend-reported failures and lost results are
//! expected operating conditions and are recorded as [`Outcome::Failure`].
//! `run` only returns `Err` when nothing could be submitted or recorded.

pub mod engine;
pub mod error;
pub mod outcome;
pub mod policy;
pub mod store;

pub use engine::{CANCEL_GRACE, PollingEngine};
pub use error::{EngineError, EngineResult};
pub use outcome::{Outcome, ResultEntry};
pub use policy::{Backoff, PollPolicy};
pub use store::{JsonResultStore, MemoryResultStore, ResultStore};

pub use pollux_hal::ErrorKind;
