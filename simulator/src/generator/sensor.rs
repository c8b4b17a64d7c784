use rand::{rngs::StdRng, Rng, SeedableRng};
use rdmcore::frame::{encode_sample, FrameGeometry, BYTES_PER_SAMPLE};
use rdmcore::{Producer, RdmResult};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// ADC midpoint for 12-bit samples.
const ADC_BIAS: f32 = 2048.0;

/// Configuration for the synthetic sensor FIFO.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub geometry: FrameGeometry,
    pub frequency: f32,
    pub noise: f32,
    pub quiet_amplitude: f32,
    pub active_amplitude: f32,
    /// Frames per quiet/active phase; 0 keeps the sensor quiet.
    pub activity_period: usize,
    pub seed: u64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            geometry: FrameGeometry::default(),
            frequency: 8.0,
            noise: 4.0,
            quiet_amplitude: 10.0,
            active_amplitude: 400.0,
            activity_period: 8,
            seed: 0,
        }
    }
}

/// Stand-in for the radar FIFO: every read delivers one whole frame.
pub struct SyntheticSensor {
    config: SensorConfig,
    rng: StdRng,
    emitted: usize,
    dropped: usize,
}

impl SyntheticSensor {
    pub fn new(config: SensorConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            rng,
            emitted: 0,
            dropped: 0,
        }
    }

    pub fn frame_bytes(&self) -> usize {
        self.config.geometry.frame_bytes()
    }

    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Frames flushed because the manager had no room for them.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    fn amplitude(&self, frame_index: usize) -> f32 {
        let period = self.config.activity_period;
        if period > 0 && (frame_index / period) % 2 == 1 {
            self.config.active_amplitude
        } else {
            self.config.quiet_amplitude
        }
    }

    fn write_frame(&mut self, dst: &mut [u8]) -> RdmResult<()> {
        let samples = self.config.geometry.samples_per_frame();
        let amplitude = self.amplitude(self.emitted + self.dropped);
        let noise = self.config.noise;

        for (idx, slot) in dst.chunks_exact_mut(BYTES_PER_SAMPLE).take(samples).enumerate() {
            let phase = (idx as f32 / samples as f32) * 2.0 * PI * self.config.frequency;
            let jitter = if noise > 0.0 {
                self.rng.gen_range(-noise..noise)
            } else {
                0.0
            };
            let value = (ADC_BIAS + phase.sin() * amplitude + jitter).clamp(0.0, 4095.0);
            encode_sample(value as u16, slot)?;
        }
        Ok(())
    }
}

impl Producer for SyntheticSensor {
    fn read(&mut self, dst: &mut [u8]) -> RdmResult<usize> {
        let frame_bytes = self.frame_bytes();
        if dst.len() < frame_bytes {
            // No room for a whole frame: flush the FIFO rather than split it.
            self.dropped += 1;
            return Ok(0);
        }
        self.write_frame(&mut dst[..frame_bytes])?;
        self.emitted += 1;
        Ok(frame_bytes)
    }
}
