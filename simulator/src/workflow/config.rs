use crate::generator::SensorConfig;
use crate::optimizer::PresenceMode;
use anyhow::Context;
use rdmcore::frame::FrameGeometry;
use rdmcore::ManagerConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub geometry: FrameGeometry,
    /// Staging buffer size, in frames.
    pub buffer_frames: usize,
    /// Frames buffered before subscribers are woken.
    pub fill_frames: usize,
    pub max_subscribers: usize,
    /// Frames the sensor interrupt fires for.
    pub frames: usize,
    pub consumers: usize,
    pub seed: u64,
    pub noise: f32,
    pub activity_period: usize,
    /// Window RMS above which the activity gate reports macro presence.
    pub activity_threshold: f32,
    pub mode: PresenceMode,
    pub low_rate_interval_ms: u64,
    pub high_rate_interval_ms: u64,
    /// Grace period for consumers to catch up after the last interrupt.
    pub drain_ms: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            geometry: FrameGeometry::default(),
            buffer_frames: 3,
            fill_frames: 1,
            max_subscribers: rdmcore::MAX_SUBSCRIBERS,
            frames: 64,
            consumers: 2,
            seed: 0,
            noise: 4.0,
            activity_period: 8,
            activity_threshold: 100.0,
            mode: PresenceMode::MicroIfMacro,
            low_rate_interval_ms: 100,
            high_rate_interval_ms: 5,
            drain_ms: 50,
        }
    }
}

impl SimulationConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading simulation config {}", path_ref.display()))?;
        let config: SimulationConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing simulation config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn from_args(frames: usize, consumers: usize, seed: u64, mode: PresenceMode) -> Self {
        Self {
            frames,
            consumers,
            seed,
            mode,
            ..Default::default()
        }
    }

    pub fn to_manager_config(&self) -> ManagerConfig {
        let frame_bytes = self.geometry.frame_bytes();
        ManagerConfig {
            buffer_size: frame_bytes * self.buffer_frames,
            fill_level: frame_bytes * self.fill_frames,
            max_subscribers: self.max_subscribers,
        }
    }

    pub fn to_sensor_config(&self) -> SensorConfig {
        SensorConfig {
            geometry: self.geometry,
            noise: self.noise,
            activity_period: self.activity_period,
            seed: self.seed,
            ..Default::default()
        }
    }
}
