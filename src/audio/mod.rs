//! Audio subsystem module

pub mod bridge;
pub mod buffer;
pub mod frame;

#[cfg(feature = "device")]
pub mod device;

pub use bridge::{DeviceBridge, DeviceHandle};
pub use buffer::RingBuffer;
pub use frame::Frame;

#[cfg(feature = "device")]
pub use device::CpalBridge;
