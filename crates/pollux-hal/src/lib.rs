//! Pollux Backend Abstraction Layer
//!
//! This crate provides the vocabulary shared by every part of Pollux: the
//! immutable [`WorkUnit`] handed to an executor, the [`JobHandle`] tracking a
//! submitted job through the [`JobStatus`] state machine, and the
//! [`Backend`] trait that simulators and remote services implement.
//!
//! # Overview
//!
//! - [`WorkUnit`] — validated payload plus primitive execution parameters
//! - [`Backend`] — `submit` / `status` / `fetch_result` / `cancel`
//! - [`JobHandle`] — monotonic view of a job's lifecycle
//! - [`BackendRegistry`] — create backends by name from [`BackendConfig`]
//! - [`HalError`] / [`ErrorKind`] — error values and the outcome taxonomy
//!
//! # Implementing a Custom Backend
//!
//! ```ignore
//! use pollux_hal::{
//!     Backend, BackendKind, HalResult, JobHandle, JobStatus, Payload, WorkUnit,
//! };
//! use async_trait::async_trait;
//!
//! struct MyBackend;
//!
//! #[async_trait]
//! impl Backend for MyBackend {
//!     fn name(&self) -> &str { "my_backend" }
//!
//!     fn kind(&self) -> BackendKind { BackendKind::Remote }
//!
//!     async fn submit(&self, work_unit: &WorkUnit) -> HalResult<JobHandle> {
//!         // Hand the payload to the executor
//!         # todo!()
//!     }
//!
//!     async fn status(&self, handle: &JobHandle) -> HalResult<JobStatus> {
//!         // Map the executor's native status onto JobStatus
//!         # todo!()
//!     }
//!
//!     async fn fetch_result(&self, handle: &JobHandle) -> HalResult<Payload> {
//!         # todo!()
//!     }
//!
//!     async fn cancel(&self, handle: &JobHandle) -> HalResult<bool> {
//!         # todo!()
//!     }
//! }
//! ```

pub mod backend;
pub mod error;
pub mod job;
pub mod registry;
pub mod work;

pub use backend::{Backend, BackendConfig, BackendFactory, BackendKind};
pub use error::{ErrorKind, HalError, HalResult};
pub use job::{JobHandle, JobId, JobStatus};
pub use registry::BackendRegistry;
pub use work::{ParamValue, Parameters, Payload, WorkUnit, WorkUnitBuilder, WorkUnitId};
