use crate::prelude::{RdmError, RdmResult};

/// Platform hook for obtaining and returning the staging buffer memory.
pub trait BufferAllocator: Send {
    /// Returns a zero-filled buffer of exactly `size` bytes.
    fn allocate(&mut self, size: usize) -> RdmResult<Vec<u8>>;
    fn release(&mut self, buffer: Vec<u8>);
}

/// Global-heap allocator. Allocation failure is reported instead of aborting.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAllocator;

impl BufferAllocator for SystemAllocator {
    fn allocate(&mut self, size: usize) -> RdmResult<Vec<u8>> {
        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(size)
            .map_err(|_| RdmError::AllocationFailed(size))?;
        buffer.resize(size, 0);
        Ok(buffer)
    }

    fn release(&mut self, buffer: Vec<u8>) {
        drop(buffer);
    }
}

/// Allocator bounded by a fixed heap budget, for constrained targets.
#[derive(Debug)]
pub struct BoundedAllocator {
    budget: usize,
    in_use: usize,
}

impl BoundedAllocator {
    pub fn with_budget(budget: usize) -> Self {
        Self { budget, in_use: 0 }
    }

    pub fn in_use(&self) -> usize {
        self.in_use
    }

    pub fn available(&self) -> usize {
        self.budget - self.in_use
    }
}

impl BufferAllocator for BoundedAllocator {
    fn allocate(&mut self, size: usize) -> RdmResult<Vec<u8>> {
        if size > self.available() {
            return Err(RdmError::AllocationFailed(size));
        }
        let buffer = SystemAllocator.allocate(size)?;
        self.in_use += size;
        Ok(buffer)
    }

    fn release(&mut self, buffer: Vec<u8>) {
        self.in_use = self.in_use.saturating_sub(buffer.len());
    }
}
