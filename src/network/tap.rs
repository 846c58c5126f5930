//! TAP interface management
//!
//! TAP devices are handed to a virtual machine. The owner and multi-queue
//! flag are fixed when the device is created.

use crate::error::{Error, Result};
use crate::network::device::{NetDevice, NetworkDevice, Toolchain};

/// A TAP interface
#[derive(Debug, Clone)]
pub struct TapDevice<'a> {
    device: NetDevice<'a>,
    /// User or service account owning the device
    owner: String,
    /// Create with IFF_MULTI_QUEUE
    multi_queue: bool,
}

impl<'a> TapDevice<'a> {
    pub fn new(
        name: impl Into<String>,
        owner: impl Into<String>,
        multi_queue: bool,
        toolchain: Toolchain<'a>,
    ) -> Self {
        Self {
            device: NetDevice::new(name, toolchain),
            owner: owner.into(),
            multi_queue,
        }
    }

    /// Create the TAP interface
    pub fn create(&self) -> Result<()> {
        if self.exists()? {
            return Err(Error::AlreadyExists(self.name().to_string()));
        }

        let dev = &self.device;
        let mut args = vec![
            "tuntap",
            "add",
            "dev",
            dev.name(),
            "mode",
            "tap",
            "user",
            self.owner.as_str(),
        ];
        if self.multi_queue {
            args.push("multi_queue");
            println!("Creating tap {} (owner: {}, multi-queue)", dev.name(), self.owner);
        } else {
            println!("Creating tap {} (owner: {})", dev.name(), self.owner);
        }

        dev.exec("create tap", &dev.tools().link, args)
    }
}

impl NetworkDevice for TapDevice<'_> {
    fn device(&self) -> &NetDevice<'_> {
        &self.device
    }
}
