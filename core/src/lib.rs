//! Event detection and recording orchestration for the SDR disaster node.
//!
//! Beacon advertisements and the dashboard emergency flag are merged into one
//! trigger stream. The coordinator debounces that stream and drives the
//! capture/upload/transfer pipeline one run at a time, while the periodic
//! publisher feeds hazard summaries to the same dashboard on its own schedule.

pub mod advertisement;
pub mod coordinator;
pub mod dashboard;
pub mod listener;
pub mod pipeline;
pub mod poller;
pub mod prelude;
pub mod publisher;
pub mod shutdown;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod testing;

pub use coordinator::{Coordinator, CoordinatorState, CoordinatorStatus};
pub use prelude::{DashboardParameters, PipelineResult, StageKind, TriggerEvent, TriggerSource};
pub use shutdown::Shutdown;
