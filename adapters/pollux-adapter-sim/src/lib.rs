//! Pollux Simulated Backend
//!
//! A local, deterministic [`Backend`](pollux_hal::Backend) for tests and
//! dry runs. Every behavior the polling engine has to cope with can be
//! scripted:
//!
//! - **Status scripts**: a fixed sequence of statuses, one per status query
//!   (the last one repeats)
//! - **Delayed completion**: `Running` until a wall-clock delay has passed
//! - **Faults**: rejected submissions, backend-reported failures, purged
//!   results, expiring handles, refused cancellation
//! - **Call counters**: how many times each backend operation was invoked
//!
//! Results are either a canned payload or an echo of the submitted payload.
//!
//! # Example
//!
//! ```ignore
//! use pollux_adapter_sim::SimulatorBackend;
//! use pollux_hal::{Backend, WorkUnit};
//!
//! let backend = SimulatorBackend::completing_after(3, "4");
//! let unit = WorkUnit::builder("2+2").id("w1").build()?;
//! let mut handle = backend.submit(&unit).await?;
//!
//! while !backend.query_status(&mut handle).await?.is_terminal() {}
//! assert_eq!(backend.fetch_result(&handle).await?.as_str(), Some("4"));
//! assert_eq!(backend.calls().status_queries, 4);
//! ```

mod simulator;

pub use simulator::{CallCounts, Rejection, SimulatorBackend};
