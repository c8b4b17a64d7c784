//! Radar data management core.
//!
//! A single producer (normally the sensor FIFO interrupt) fills a staging
//! buffer; once a configurable fill level is reached every subscriber is woken
//! and reads the same window in place. The window is reclaimed only after all
//! subscribers acknowledge it.

pub mod buffer;
pub mod frame;
pub mod manager;
pub mod math;
pub mod prelude;
pub mod registry;
pub mod telemetry;
pub mod wake;

pub use manager::{CyclePhase, IngestAnomaly, ManagerState, RadarDataManager, RunReport};
pub use prelude::{ManagerConfig, Producer, RdmError, RdmResult, MAX_SUBSCRIBERS};
pub use registry::SubscriberId;
pub use wake::{CallbackWaker, ConsumerHandle, Delivery, TaskNotifier, Wake, WakeContext};
