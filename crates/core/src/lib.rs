//! The core controller (spec §4.4-§4.5): the feedback-loop control
//! application, its three allocators, telemetry collection, and the
//! northbound `LocalToGlobal`/`GlobalToLocal` gRPC plumbing.

mod allocator;
mod connection_manager;
mod control_app;
mod local_link;
mod telemetry;
mod types;

pub use allocator::{
    DynamicLeftoverAllocator, DynamicVanillaAllocator, JobRates, IOPS_THRESHOLD,
    SKIP_ENFORCEMENT,
};
pub use connection_manager::{CoreConnectionManager, TonicLocalLink};
pub use control_app::{CoreControlApplication, DEFAULT_CYCLE_SLEEP_MICROS};
pub use local_link::{EnvRates, GlobalStats, LocalLink, StageIdentity};
pub use telemetry::TelemetryStore;
pub use types::{ControlType, JobLocationTracker};
