pub mod velocity;

mod allocator;

pub use self::allocator::{
    Allocation, AllocationKind, AllocatorError, IDLE, VoiceAllocator,
};
