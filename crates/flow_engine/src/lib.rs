//! flow_engine - Turns inbound chat messages into flow transitions
//!
//! A [`FlowRegistry`] maps each flow name to its ordered steps. For every
//! inbound message the [`Dispatcher`] checks out the user's session, runs the
//! global [`Interceptor`]s, resolves the current step (resetting to the main
//! menu when the stored position is invalid), runs it and saves the result.

pub mod audit;
pub mod dispatcher;
pub mod error;
pub mod interceptor;
pub mod registry;
pub mod step;
pub mod turn;

pub use audit::{AuditReport, AuditSink, ChannelAudit, FailureStage, LogAudit};
pub use dispatcher::{DispatchOutcome, Dispatcher, DEFAULT_FAILURE_NOTICE};
pub use error::{FlowError, RegistryError};
pub use interceptor::{CancelInterceptor, CaptureInterceptor, Interceptor};
pub use registry::{FlowDef, FlowRegistration, FlowRegistry, FlowRegistryBuilder};
pub use step::{Step, StepFn, StepFuture};
pub use turn::{Turn, MAX_HOPS};

// Used by `register_flow!` in downstream crates.
#[doc(hidden)]
pub use inventory;
