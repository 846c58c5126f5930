//! External command execution
//!
//! Every mutation of the host's network stack goes through a [`CommandRunner`],
//! so the provisioning sequence can be replayed against a recording fake
//! instead of the real kernel.

use crate::error::{Error, Result};
use nix::errno::Errno;
use std::fmt;
use std::process::Command;

/// A single external tool invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Program to execute (looked up in PATH)
    pub program: String,
    /// Arguments, passed without shell interpretation
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Captured result of an invocation
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Exit code, `None` if the process was killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Executes external tools and looks up the kernel interface table
pub trait CommandRunner {
    /// Run an invocation to completion. Spawn failures are `Err`; a non-zero
    /// exit is reported through the returned output.
    fn run(&self, invocation: &Invocation) -> std::io::Result<CommandOutput>;

    /// Check whether the kernel currently has an interface with this name
    fn link_exists(&self, name: &str) -> Result<bool>;
}

/// Runs commands on the local host
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> std::io::Result<CommandOutput> {
        tracing::debug!(command = %invocation, "Running");

        let output = Command::new(&invocation.program)
            .args(&invocation.args)
            .output()?;

        let result = CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        };

        if result.success() {
            tracing::debug!(command = %invocation, stdout = %result.stdout.trim(), "Command succeeded");
        } else {
            tracing::warn!(command = %invocation, code = ?result.code, stderr = %result.stderr, "Command failed");
        }

        Ok(result)
    }

    fn link_exists(&self, name: &str) -> Result<bool> {
        // Use native if_nametoindex(3) instead of spawning `ip link show`
        match nix::net::if_::if_nametoindex(name) {
            Ok(_) => Ok(true),
            Err(Errno::ENODEV) | Err(Errno::ENXIO) => Ok(false),
            Err(e) => Err(Error::Io(e.into())),
        }
    }
}

/// Prints invocations instead of executing them
///
/// Existence checks still reach the kernel so the precondition check reports
/// the real state of the host.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunRunner;

impl CommandRunner for DryRunRunner {
    fn run(&self, invocation: &Invocation) -> std::io::Result<CommandOutput> {
        println!("  [DRY RUN] {}", invocation);
        Ok(CommandOutput {
            code: Some(0),
            ..Default::default()
        })
    }

    fn link_exists(&self, name: &str) -> Result<bool> {
        SystemRunner.link_exists(name)
    }
}
