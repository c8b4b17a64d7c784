use serde::{Deserialize, Serialize};

/// Upper bound on concurrently registered consumers unless configured otherwise.
pub const MAX_SUBSCRIBERS: usize = 4;

/// Sizing for a single manager instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerConfig {
    pub buffer_size: usize,
    pub fill_level: usize,
    #[serde(default = "default_max_subscribers")]
    pub max_subscribers: usize,
}

fn default_max_subscribers() -> usize {
    MAX_SUBSCRIBERS
}

impl ManagerConfig {
    pub fn new(buffer_size: usize, fill_level: usize) -> Self {
        Self {
            buffer_size,
            fill_level,
            max_subscribers: MAX_SUBSCRIBERS,
        }
    }

    pub fn validate(&self) -> RdmResult<()> {
        if self.buffer_size == 0 {
            return Err(RdmError::InvalidParam("buffer size must be non-zero".into()));
        }
        if self.fill_level == 0 || self.fill_level > self.buffer_size {
            return Err(RdmError::InvalidParam(format!(
                "fill level {} outside 1..={}",
                self.fill_level, self.buffer_size
            )));
        }
        if self.max_subscribers == 0 {
            return Err(RdmError::InvalidParam(
                "at least one subscriber slot is required".into(),
            ));
        }
        Ok(())
    }
}

/// Common error type for every manager operation.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RdmError {
    #[error("invalid parameter: {0}")]
    InvalidParam(String),
    #[error("subscriber capacity exceeded ({0} slots)")]
    CapacityExceeded(usize),
    #[error("failed to allocate {0} byte staging buffer")]
    AllocationFailed(usize),
    #[error("operation blocked: {0}")]
    OperationBlocked(String),
    #[error("data not ready: {0}")]
    NotReady(String),
    #[error("producer failure: {0}")]
    Producer(String),
}

pub type RdmResult<T> = Result<T, RdmError>;

/// Source of raw sensor bytes, normally backed by the radar FIFO.
///
/// `dst.len()` is the most the manager can accept on this call. The returned
/// count is the number of bytes written to the front of `dst`; reporting more
/// than `dst.len()` is treated as an ingestion anomaly and the bytes are dropped.
pub trait Producer: Send {
    fn read(&mut self, dst: &mut [u8]) -> RdmResult<usize>;
}

impl<F> Producer for F
where
    F: FnMut(&mut [u8]) -> RdmResult<usize> + Send,
{
    fn read(&mut self, dst: &mut [u8]) -> RdmResult<usize> {
        self(dst)
    }
}
