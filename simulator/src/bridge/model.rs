use crate::workflow::runner::{ConsumerSummary, SimulationResult};
use rdmcore::telemetry::MetricsSnapshot;
use rdmcore::ManagerState;
use serde::Serialize;

/// Payload served on `GET /status`.
#[derive(Debug, Clone, Serialize, Default)]
pub struct StatusModel {
    pub status: String,
    pub frames_emitted: usize,
    pub frames_dropped: usize,
    pub consumers: Vec<ConsumerSummary>,
    pub metrics: MetricsSnapshot,
    pub manager: Option<ManagerState>,
    pub rate_switches: usize,
}

impl StatusModel {
    pub fn from_result(result: &SimulationResult) -> Self {
        Self {
            status: "complete".into(),
            frames_emitted: result.frames_emitted,
            frames_dropped: result.frames_dropped,
            consumers: result.consumers.clone(),
            metrics: result.metrics.clone(),
            manager: Some(result.final_state.clone()),
            rate_switches: result.rate_switches,
        }
    }
}
