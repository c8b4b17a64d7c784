use serde::{Deserialize, Serialize};

use crate::prelude::{RdmError, RdmResult};

/// Bytes per raw ADC sample as delivered by the sensor FIFO.
pub const BYTES_PER_SAMPLE: usize = 2;

/// Shape of one radar frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameGeometry {
    pub samples_per_chirp: usize,
    pub chirps_per_frame: usize,
    pub rx_antennas: usize,
}

impl Default for FrameGeometry {
    fn default() -> Self {
        Self {
            samples_per_chirp: 128,
            chirps_per_frame: 16,
            rx_antennas: 1,
        }
    }
}

impl FrameGeometry {
    pub fn samples_per_frame(&self) -> usize {
        self.samples_per_chirp * self.chirps_per_frame * self.rx_antennas
    }

    pub fn frame_bytes(&self) -> usize {
        self.samples_per_frame() * BYTES_PER_SAMPLE
    }
}

/// Decodes little-endian 16-bit samples. A trailing odd byte is ignored.
pub fn decode_samples(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(BYTES_PER_SAMPLE)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Inverse of [`decode_samples`] for a single sample, written into `dst`.
pub fn encode_sample(sample: u16, dst: &mut [u8]) -> RdmResult<()> {
    let dst_len = dst.len();
    let slot = dst.get_mut(..BYTES_PER_SAMPLE).ok_or_else(|| {
        RdmError::InvalidParam(format!(
            "sample needs {} bytes, got {}",
            BYTES_PER_SAMPLE,
            dst_len
        ))
    })?;
    slot.copy_from_slice(&sample.to_le_bytes());
    Ok(())
}
