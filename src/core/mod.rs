pub mod clock;
pub mod frame_slot;
pub mod gpu_context;

pub use clock::FrameClock;
pub use frame_slot::FrameSlot;
pub use gpu_context::GpuContext;
