//! Generic network device capability
//!
//! A device is nothing more than an interface name plus the toolchain used to
//! act on it. Existence is always re-read from the kernel; nothing here
//! remembers what was created.

use crate::error::{Error, Result};
use crate::exec::{CommandOutput, CommandRunner, Invocation};
use crate::manifest::ToolsConfig;

/// Runner and tool table shared by every device of a run
#[derive(Clone, Copy)]
pub struct Toolchain<'a> {
    runner: &'a dyn CommandRunner,
    tools: &'a ToolsConfig,
}

impl<'a> Toolchain<'a> {
    pub fn new(runner: &'a dyn CommandRunner, tools: &'a ToolsConfig) -> Self {
        Self { runner, tools }
    }

    pub fn tools(&self) -> &'a ToolsConfig {
        self.tools
    }

    pub fn link_exists(&self, name: &str) -> Result<bool> {
        self.runner.link_exists(name)
    }

    /// Run an invocation on behalf of `device`, turning spawn failures and
    /// non-zero exits into [`Error::CommandFailed`]
    pub fn exec(&self, device: &str, operation: &str, invocation: Invocation) -> Result<CommandOutput> {
        let failed = |stderr: String| Error::CommandFailed {
            device: device.to_string(),
            operation: operation.to_string(),
            command: invocation.to_string(),
            stderr,
        };

        let output = self
            .runner
            .run(&invocation)
            .map_err(|e| failed(format!("failed to execute {}: {}", invocation.program, e)))?;

        if !output.success() {
            let stderr = if output.stderr.is_empty() {
                match output.code {
                    Some(code) => format!("exited with status {}", code),
                    None => "terminated by signal".to_string(),
                }
            } else {
                output.stderr.clone()
            };
            return Err(failed(stderr));
        }

        Ok(output)
    }
}

/// A kernel network interface, existing or to be created
#[derive(Clone)]
pub struct NetDevice<'a> {
    name: String,
    toolchain: Toolchain<'a>,
}

impl<'a> NetDevice<'a> {
    pub fn new(name: impl Into<String>, toolchain: Toolchain<'a>) -> Self {
        Self {
            name: name.into(),
            toolchain,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn toolchain(&self) -> Toolchain<'a> {
        self.toolchain
    }

    pub fn tools(&self) -> &'a ToolsConfig {
        self.toolchain.tools()
    }

    /// Run `program args..` as `operation` on this device
    pub fn exec<I, S>(&self, operation: &str, program: &str, args: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.toolchain
            .exec(&self.name, operation, Invocation::new(program, args))
            .map(|_| ())
    }
}

impl std::fmt::Debug for NetDevice<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetDevice").field("name", &self.name).finish()
    }
}

/// Operations shared by every kind of network device
///
/// Bridges and TAP devices hold a [`NetDevice`] and expose it through
/// [`NetworkDevice::device`]; all state changes are issued through the
/// configured tools.
pub trait NetworkDevice {
    fn device(&self) -> &NetDevice<'_>;

    fn name(&self) -> &str {
        self.device().name()
    }

    /// True iff the kernel currently exposes an interface with this name
    fn exists(&self) -> Result<bool> {
        let dev = self.device();
        dev.toolchain().link_exists(dev.name())
    }

    /// Bring the device administratively up
    fn up(&self) -> Result<()> {
        let dev = self.device();
        println!("Setting {} up", dev.name());
        dev.exec("bring up", &dev.tools().link, ["link", "set", "dev", dev.name(), "up"])
    }

    /// Bring the device administratively down
    fn down(&self) -> Result<()> {
        let dev = self.device();
        println!("Setting {} down", dev.name());
        dev.exec("bring down", &dev.tools().link, ["link", "set", "dev", dev.name(), "down"])
    }

    /// Assign an address (e.g. "10.0.0.1/24"); the tool validates its syntax
    fn set_ip(&self, address: &str) -> Result<()> {
        let dev = self.device();
        println!("Adding address {} to {}", address, dev.name());
        dev.exec(
            "set address",
            &dev.tools().link,
            ["addr", "add", address, "dev", dev.name()],
        )
    }

    /// Run the DHCP client on this device and wait for it to exit
    ///
    /// A zero exit status is the only success criterion; whether a lease was
    /// actually obtained is up to the client.
    fn request_ip(&self) -> Result<()> {
        let dev = self.device();
        println!("Requesting DHCP lease on {}", dev.name());
        dev.exec("request DHCP lease", &dev.tools().dhcp_client, [dev.name()])
    }

    /// Associate a DNS resolver with this device
    fn set_dns(&self, server: &str) -> Result<()> {
        let dev = self.device();
        println!("Setting DNS server {} on {}", server, dev.name());
        dev.exec("set DNS server", &dev.tools().resolver, ["dns", dev.name(), server])
    }

    /// Remove every address bound to this device
    fn flush(&self) -> Result<()> {
        let dev = self.device();
        println!("Flushing addresses on {}", dev.name());
        dev.exec("flush addresses", &dev.tools().link, ["addr", "flush", "dev", dev.name()])
    }

    /// Install a default route via `gateway` out of this device
    fn add_default_route(&self, gateway: &str) -> Result<()> {
        let dev = self.device();
        println!("Adding default route via {} on {}", gateway, dev.name());
        dev.exec(
            "add default route",
            &dev.tools().route,
            ["route", "add", "default", "via", gateway, "dev", dev.name()],
        )
    }
}

impl NetworkDevice for NetDevice<'_> {
    fn device(&self) -> &NetDevice<'_> {
        self
    }
}
