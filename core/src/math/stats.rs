pub struct StatsHelper;

impl StatsHelper {
    pub fn mean(samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        samples.iter().sum::<f32>() / samples.len() as f32
    }

    pub fn rms(samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        let sum_sq: f32 = samples.iter().map(|&v| v * v).sum();
        (sum_sq / samples.len() as f32).sqrt()
    }

    /// RMS of raw ADC samples after removing their DC offset.
    pub fn ac_rms(samples: &[u16]) -> f32 {
        let values: Vec<f32> = samples.iter().map(|&s| s as f32).collect();
        let mean = Self::mean(&values);
        let centered: Vec<f32> = values.iter().map(|&v| v - mean).collect();
        Self::rms(&centered)
    }
}
