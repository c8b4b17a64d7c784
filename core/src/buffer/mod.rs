pub mod allocator;
pub mod staging;

pub use allocator::{BoundedAllocator, BufferAllocator, SystemAllocator};
pub use staging::StagingBuffer;
