//! Provisioning intent
//!
//! The full argument set of a run, checked once before any device is touched
//! and never modified afterwards.

use crate::error::{Error, Result};
use serde::Serialize;

/// How the bridge gets its address
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Addressing {
    /// Run the DHCP client on the bridge
    Dhcp,
    /// Assign a literal address, optionally with a default route
    Static {
        address: String,
        route: Option<String>,
    },
}

impl Addressing {
    /// Build the addressing mode from the raw flags
    ///
    /// Exactly one of `dhcp` and `address` must be given, and a route target
    /// only makes sense with a static address.
    pub fn from_flags(dhcp: bool, address: Option<String>, route: Option<String>) -> Result<Self> {
        let address = address.filter(|a| !a.trim().is_empty());

        match (dhcp, address) {
            (true, Some(_)) => Err(Error::Validation(
                "--dhcp and --ip are mutually exclusive".into(),
            )),
            (false, None) => Err(Error::Validation(
                "one of --dhcp or --ip is required".into(),
            )),
            (true, None) => {
                if route.is_some() {
                    return Err(Error::Validation(
                        "--route requires a static --ip".into(),
                    ));
                }
                Ok(Addressing::Dhcp)
            }
            (false, Some(address)) => Ok(Addressing::Static { address, route }),
        }
    }

    pub fn is_dhcp(&self) -> bool {
        matches!(self, Addressing::Dhcp)
    }
}

/// Everything a provisioning run needs to know
#[derive(Debug, Clone, Serialize)]
pub struct ProvisionIntent {
    /// Bridge interface to create
    pub bridge: String,
    /// TAP interface to create and enroll in the bridge
    pub tap: String,
    /// Existing uplink to enslave to the bridge
    pub wan: Option<String>,
    pub addressing: Addressing,
    /// DNS server assigned to the bridge in either addressing mode
    pub dns: Option<String>,
    /// Owner of the TAP device
    pub tap_owner: String,
    pub multi_queue: bool,
}

impl ProvisionIntent {
    /// Create an intent with a root-owned single-queue TAP and no uplink
    pub fn new(bridge: impl Into<String>, tap: impl Into<String>, addressing: Addressing) -> Self {
        Self {
            bridge: bridge.into(),
            tap: tap.into(),
            wan: None,
            addressing,
            dns: None,
            tap_owner: "root".to_string(),
            multi_queue: false,
        }
    }

    pub fn with_wan(mut self, wan: impl Into<String>) -> Self {
        self.wan = Some(wan.into());
        self
    }

    pub fn with_dns(mut self, server: impl Into<String>) -> Self {
        self.dns = Some(server.into());
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.tap_owner = owner.into();
        self
    }

    pub fn with_multi_queue(mut self, multi_queue: bool) -> Self {
        self.multi_queue = multi_queue;
        self
    }

    /// Check argument constraints
    ///
    /// Interface name syntax is left to the link tool.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("bridge name", &self.bridge),
            ("tap name", &self.tap),
            ("tap owner", &self.tap_owner),
        ];
        for (what, value) in required {
            if value.trim().is_empty() {
                return Err(Error::Validation(format!("{} must not be empty", what)));
            }
        }

        if self.bridge == self.tap {
            return Err(Error::Validation(format!(
                "bridge and tap must be different interfaces (both '{}')",
                self.bridge
            )));
        }

        if let Some(wan) = &self.wan {
            if wan.trim().is_empty() {
                return Err(Error::Validation("WAN interface name must not be empty".into()));
            }
            if wan == &self.bridge || wan == &self.tap {
                return Err(Error::Validation(format!(
                    "WAN interface '{}' cannot be the bridge or the tap",
                    wan
                )));
            }
        }

        if let Some(dns) = &self.dns {
            if dns.trim().is_empty() {
                return Err(Error::Validation("DNS server must not be empty".into()));
            }
        }

        if let Addressing::Static { address, route } = &self.addressing {
            if address.trim().is_empty() {
                return Err(Error::Validation("static address must not be empty".into()));
            }
            if route.as_ref().is_some_and(|r| r.trim().is_empty()) {
                return Err(Error::Validation("route target must not be empty".into()));
            }
        }

        Ok(())
    }
}
