//! Network device management for VM networking
//!
//! Provides:
//! - A generic device capability (up/down, addressing, DNS, routes)
//! - Bridge interfaces that enroll other devices as ports
//! - TAP interfaces handed to virtual machines

pub mod bridge;
pub mod device;
pub mod tap;

pub use bridge::Bridge;
pub use device::{NetDevice, NetworkDevice, Toolchain};
pub use tap::TapDevice;
