//! Bridge interface management
//!
//! Provides:
//! - Creation of bridge interfaces
//! - Enrolling other interfaces as bridge ports

use crate::error::{Error, Result};
use crate::network::device::{NetDevice, NetworkDevice, Toolchain};

/// A bridge interface
#[derive(Debug, Clone)]
pub struct Bridge<'a> {
    device: NetDevice<'a>,
}

impl<'a> Bridge<'a> {
    pub fn new(name: impl Into<String>, toolchain: Toolchain<'a>) -> Self {
        Self {
            device: NetDevice::new(name, toolchain),
        }
    }

    /// Create the bridge interface
    ///
    /// The bridge is left administratively down.
    pub fn create(&self) -> Result<()> {
        if self.exists()? {
            return Err(Error::AlreadyExists(self.name().to_string()));
        }

        let dev = &self.device;
        println!("Creating bridge {}", dev.name());
        dev.exec(
            "create bridge",
            &dev.tools().link,
            ["link", "add", "name", dev.name(), "type", "bridge"],
        )
    }

    /// Enroll `slave` as a port of this bridge
    ///
    /// Both interfaces must exist; otherwise the link tool rejects the call.
    pub fn add_slave(&self, slave: &dyn NetworkDevice) -> Result<()> {
        println!("Adding {} to bridge {}", slave.name(), self.name());
        slave.device().exec(
            &format!("enroll into bridge {}", self.name()),
            &self.device.tools().link,
            ["link", "set", "dev", slave.name(), "master", self.name()],
        )
    }
}

impl NetworkDevice for Bridge<'_> {
    fn device(&self) -> &NetDevice<'_> {
        &self.device
    }
}
