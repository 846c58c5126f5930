//! Bridge + TAP provisioning
//!
//! Runs the fixed sequence: create and raise the bridge, enslave the optional
//! WAN uplink, address the bridge, set DNS, then create the TAP device and
//! enroll it. The only all-or-nothing guarantee is the initial name check;
//! after that the first failure stops the run and nothing is rolled back.

pub mod intent;
pub mod state;

pub use intent::{Addressing, ProvisionIntent};
pub use state::{Progress, Stage};

use crate::error::{Error, Result};
use crate::network::{Bridge, NetDevice, NetworkDevice, TapDevice, Toolchain};
use serde::Serialize;

/// Existence of the interfaces named by an intent
#[derive(Debug, Clone, Serialize)]
pub struct Preflight {
    pub bridge: String,
    pub bridge_exists: bool,
    pub tap: String,
    pub tap_exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wan: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wan_exists: Option<bool>,
}

impl Preflight {
    /// True when neither target name is taken
    pub fn is_clear(&self) -> bool {
        !self.bridge_exists && !self.tap_exists
    }

    /// The first target name that is already taken
    pub fn conflict(&self) -> Option<&str> {
        if self.bridge_exists {
            Some(self.bridge.as_str())
        } else if self.tap_exists {
            Some(self.tap.as_str())
        } else {
            None
        }
    }
}

/// Outcome of a successful run
#[derive(Debug, Clone, Default)]
pub struct ProvisionReport {
    /// Steps performed, in order
    pub steps: Vec<String>,
    /// Informational notices that did not stop the run
    pub notices: Vec<String>,
}

/// Sequences bridge and TAP creation against a toolchain
pub struct Provisioner<'a> {
    toolchain: Toolchain<'a>,
}

impl<'a> Provisioner<'a> {
    pub fn new(toolchain: Toolchain<'a>) -> Self {
        Self { toolchain }
    }

    /// Check which of the intent's interfaces already exist
    ///
    /// Never mutates anything.
    pub fn preflight(&self, intent: &ProvisionIntent) -> Result<Preflight> {
        let bridge_exists = self.toolchain.link_exists(&intent.bridge)?;
        let tap_exists = self.toolchain.link_exists(&intent.tap)?;
        let wan_exists = match &intent.wan {
            Some(wan) => Some(self.toolchain.link_exists(wan)?),
            None => None,
        };

        Ok(Preflight {
            bridge: intent.bridge.clone(),
            bridge_exists,
            tap: intent.tap.clone(),
            tap_exists,
            wan: intent.wan.clone(),
            wan_exists,
        })
    }

    /// Provision the bridge and TAP described by `intent`
    ///
    /// Failures before the first mutation come back unchanged. Once the host
    /// has been touched, the error is wrapped in [`Error::Aborted`] carrying
    /// the steps that were applied, so the operator knows what to unwind.
    pub fn run(&self, intent: &ProvisionIntent) -> Result<ProvisionReport> {
        let mut progress = Progress::new();
        let mut report = ProvisionReport::default();

        match self.apply(intent, &mut progress, &mut report) {
            Ok(()) => {
                tracing::info!(bridge = %intent.bridge, tap = %intent.tap, stage = %progress.stage(), "Provisioning complete");
                Ok(report)
            }
            Err(e) => {
                let reached = progress.stage();
                if let Err(fail_err) = progress.fail() {
                    tracing::warn!(stage = %reached, error = %fail_err, "Could not record failure");
                }
                let stage = progress.stage();
                tracing::warn!(%stage, %reached, steps = report.steps.len(), error = %e, "Provisioning aborted");

                if report.steps.is_empty() {
                    return Err(e);
                }
                Err(Error::Aborted {
                    stage,
                    reached,
                    completed: report.steps,
                    source: Box::new(e),
                })
            }
        }
    }

    fn apply(
        &self,
        intent: &ProvisionIntent,
        progress: &mut Progress,
        report: &mut ProvisionReport,
    ) -> Result<()> {
        // Validating: arguments first, then both names must be free
        intent.validate()?;

        let preflight = self.preflight(intent)?;
        if let Some(name) = preflight.conflict() {
            return Err(Error::AlreadyExists(name.to_string()));
        }

        let bridge = Bridge::new(&intent.bridge, self.toolchain);
        let tap = TapDevice::new(&intent.tap, &intent.tap_owner, intent.multi_queue, self.toolchain);

        bridge.create()?;
        report.steps.push(format!("create bridge {}", bridge.name()));
        bridge.up()?;
        report.steps.push(format!("bring up {}", bridge.name()));
        progress.bridged()?;

        match &intent.wan {
            Some(wan) => {
                let uplink = NetDevice::new(wan, self.toolchain);
                uplink.up()?;
                report.steps.push(format!("bring up {}", wan));
                bridge.add_slave(&uplink)?;
                report.steps.push(format!("enroll {} into {}", wan, bridge.name()));
                // Addresses held as a standalone interface would clash with the bridge
                uplink.flush()?;
                report.steps.push(format!("flush {}", wan));
                progress.uplinked()?;
            }
            None => {
                let notice = format!(
                    "No WAN interface given; {} will have no path to outside networks",
                    intent.tap
                );
                eprintln!("Note: {}", notice);
                report.notices.push(notice);
            }
        }

        match &intent.addressing {
            Addressing::Static { address, route } => {
                bridge.set_ip(address)?;
                report.steps.push(format!("add address {} to {}", address, bridge.name()));
                if let Some(via) = route {
                    bridge.add_default_route(via)?;
                    report
                        .steps
                        .push(format!("add default route via {} on {}", via, bridge.name()));
                }
            }
            Addressing::Dhcp => {
                bridge.request_ip()?;
                report.steps.push(format!("request DHCP lease on {}", bridge.name()));
            }
        }

        if let Some(server) = &intent.dns {
            bridge.set_dns(server)?;
            report.steps.push(format!("set DNS {} on {}", server, bridge.name()));
        }
        progress.addressed()?;

        tap.create()?;
        report.steps.push(format!("create tap {}", tap.name()));
        bridge.add_slave(&tap)?;
        report.steps.push(format!("enroll {} into {}", tap.name(), bridge.name()));
        progress.tapped()?;

        progress.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::testing::RecordingRunner;
    use crate::exec::{CommandRunner, DryRunRunner};
    use crate::manifest::ToolsConfig;

    fn static_intent() -> ProvisionIntent {
        ProvisionIntent::new(
            "br0",
            "tap0",
            Addressing::Static {
                address: "10.0.0.1/24".into(),
                route: Some("10.0.0.254".into()),
            },
        )
        .with_wan("eth0")
    }

    fn run(runner: &RecordingRunner, intent: &ProvisionIntent) -> Result<ProvisionReport> {
        let tools = ToolsConfig::default();
        Provisioner::new(Toolchain::new(runner, &tools)).run(intent)
    }

    #[test]
    fn test_full_run_with_wan() {
        let runner = RecordingRunner::new().with_link("eth0");
        let report = run(&runner, &static_intent()).unwrap();

        assert!(report.notices.is_empty());
        assert_eq!(
            runner.calls(),
            vec![
                "ip link add name br0 type bridge",
                "ip link set dev br0 up",
                "ip link set dev eth0 up",
                "ip link set dev eth0 master br0",
                "ip addr flush dev eth0",
                "ip addr add 10.0.0.1/24 dev br0",
                "ip route add default via 10.0.0.254 dev br0",
                "ip tuntap add dev tap0 mode tap user root",
                "ip link set dev tap0 master br0",
            ]
        );
        assert_eq!(report.steps.len(), runner.calls().len());
    }

    #[test]
    fn test_rerun_fails_without_mutation() {
        let runner = RecordingRunner::new().with_link("eth0");
        run(&runner, &static_intent()).unwrap();
        let first_run = runner.calls().len();

        let err = run(&runner, &static_intent()).unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(ref n) if n == "br0"));
        assert_eq!(runner.calls().len(), first_run);
    }

    #[test]
    fn test_existing_tap_blocks_run() {
        let runner = RecordingRunner::new().with_link("tap0");
        let intent = ProvisionIntent::new("br0", "tap0", Addressing::Dhcp);

        let err = run(&runner, &intent).unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(ref n) if n == "tap0"));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_invalid_intent_touches_nothing() {
        let runner = RecordingRunner::new();
        let intent = ProvisionIntent::new("br0", "br0", Addressing::Dhcp);

        assert!(matches!(run(&runner, &intent), Err(Error::Validation(_))));
        assert!(runner.calls().is_empty());
        assert!(runner.lookups().is_empty());
    }

    #[test]
    fn test_no_wan_emits_notice() {
        let runner = RecordingRunner::new();
        let intent = ProvisionIntent::new("br0", "tap0", Addressing::Dhcp);

        let report = run(&runner, &intent).unwrap();
        assert_eq!(report.notices.len(), 1);
        assert!(report.notices[0].contains("no path to outside networks"));

        let calls = runner.calls();
        assert!(!calls.iter().any(|c| c.contains("flush")));
        assert_eq!(
            calls,
            vec![
                "ip link add name br0 type bridge",
                "ip link set dev br0 up",
                "dhclient br0",
                "ip tuntap add dev tap0 mode tap user root",
                "ip link set dev tap0 master br0",
            ]
        );
    }

    #[test]
    fn test_dhcp_skips_static_address() {
        let runner = RecordingRunner::new().with_link("eth0");
        let intent = ProvisionIntent::new("br0", "tap0", Addressing::Dhcp).with_wan("eth0");

        run(&runner, &intent).unwrap();
        let calls = runner.calls();
        assert!(calls.contains(&"dhclient br0".to_string()));
        assert!(!calls.iter().any(|c| c.contains("addr add")));
        assert!(!calls.iter().any(|c| c.contains("route add")));
    }

    #[test]
    fn test_static_without_route() {
        let runner = RecordingRunner::new();
        let intent = ProvisionIntent::new(
            "br0",
            "tap0",
            Addressing::Static {
                address: "192.168.50.1/24".into(),
                route: None,
            },
        );

        run(&runner, &intent).unwrap();
        let calls = runner.calls();
        assert!(calls.contains(&"ip addr add 192.168.50.1/24 dev br0".to_string()));
        assert!(!calls.iter().any(|c| c.contains("route")));
        assert!(!calls.iter().any(|c| c.starts_with("dhclient")));
    }

    #[test]
    fn test_dns_set_once_in_either_mode() {
        for addressing in [
            Addressing::Dhcp,
            Addressing::Static {
                address: "10.0.0.1/24".into(),
                route: None,
            },
        ] {
            let runner = RecordingRunner::new();
            let intent = ProvisionIntent::new("br0", "tap0", addressing).with_dns("9.9.9.9");

            run(&runner, &intent).unwrap();
            let dns_calls: Vec<_> = runner
                .calls()
                .into_iter()
                .filter(|c| c.starts_with("resolvectl"))
                .collect();
            assert_eq!(dns_calls, vec!["resolvectl dns br0 9.9.9.9"]);
        }
    }

    #[test]
    fn test_no_dns_without_override() {
        let runner = RecordingRunner::new();
        run(&runner, &ProvisionIntent::new("br0", "tap0", Addressing::Dhcp)).unwrap();
        assert!(!runner.calls().iter().any(|c| c.starts_with("resolvectl")));
    }

    #[test]
    fn test_tap_owner_and_multi_queue() {
        let runner = RecordingRunner::new();
        let intent = ProvisionIntent::new("br0", "tap0", Addressing::Dhcp)
            .with_owner("qemu")
            .with_multi_queue(true);

        run(&runner, &intent).unwrap();
        assert!(runner
            .calls()
            .contains(&"ip tuntap add dev tap0 mode tap user qemu multi_queue".to_string()));
    }

    #[test]
    fn test_failure_stops_sequence() {
        let runner = RecordingRunner::new()
            .with_link("eth0")
            .fail_on("dev eth0 master", "RTNETLINK answers: Device or resource busy");

        let err = run(&runner, &static_intent()).unwrap_err();
        let Error::Aborted { source, .. } = &err else {
            panic!("unexpected error: {err:?}");
        };
        match source.as_ref() {
            Error::CommandFailed {
                device, operation, stderr, ..
            } => {
                assert_eq!(device, "eth0");
                assert_eq!(operation, "enroll into bridge br0");
                assert!(stderr.contains("busy"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // Nothing after the failing enrollment was attempted
        assert_eq!(
            runner.calls(),
            vec![
                "ip link add name br0 type bridge",
                "ip link set dev br0 up",
                "ip link set dev eth0 up",
                "ip link set dev eth0 master br0",
            ]
        );
    }

    #[test]
    fn test_dhcp_failure_leaves_bridge_in_place() {
        let runner = RecordingRunner::new().fail_on("dhclient", "");
        let intent = ProvisionIntent::new("br0", "tap0", Addressing::Dhcp);

        let err = run(&runner, &intent).unwrap_err();
        assert_eq!(err.device(), Some("br0"));
        match &err {
            Error::Aborted {
                stage,
                reached,
                completed,
                source,
            } => {
                assert_eq!(*stage, Stage::Failed);
                assert_eq!(*reached, Stage::BridgeCreated);
                assert_eq!(completed, &vec!["create bridge br0", "bring up br0"]);
                assert!(matches!(source.as_ref(), Error::CommandFailed { operation, .. } if operation == "request DHCP lease"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!runner.calls().iter().any(|c| c.contains("tuntap")));
        // No rollback: the bridge is still there
        assert!(runner.link_exists("br0").unwrap());
    }

    #[test]
    fn test_failure_on_first_mutation_has_nothing_to_unwind() {
        let runner = RecordingRunner::new().fail_on("type bridge", "Operation not permitted");
        let intent = ProvisionIntent::new("br0", "tap0", Addressing::Dhcp);

        let err = run(&runner, &intent).unwrap_err();
        assert!(matches!(err, Error::CommandFailed { ref operation, .. } if operation == "create bridge"));
    }

    #[test]
    fn test_dry_run_completes_without_touching_host() {
        let tools = ToolsConfig::default();
        let provisioner = Provisioner::new(Toolchain::new(&DryRunRunner, &tools));
        let intent = ProvisionIntent::new(
            "tbdry0",
            "tbdry1",
            Addressing::Static {
                address: "10.99.0.1/24".into(),
                route: Some("10.99.0.254".into()),
            },
        )
        .with_dns("10.99.0.53");

        // A successful run has passed the final transition to Done
        let report = provisioner.run(&intent).unwrap();
        assert_eq!(
            report.steps,
            vec![
                "create bridge tbdry0",
                "bring up tbdry0",
                "add address 10.99.0.1/24 to tbdry0",
                "add default route via 10.99.0.254 on tbdry0",
                "set DNS 10.99.0.53 on tbdry0",
                "create tap tbdry1",
                "enroll tbdry1 into tbdry0",
            ]
        );
        assert_eq!(report.notices.len(), 1);

        // Nothing was created on the real host
        assert!(!DryRunRunner.link_exists("tbdry0").unwrap());
        assert!(!DryRunRunner.link_exists("tbdry1").unwrap());
    }

    #[test]
    fn test_preflight_reports_existing_links() {
        let runner = RecordingRunner::new().with_link("br0").with_link("eth0");
        let tools = ToolsConfig::default();
        let provisioner = Provisioner::new(Toolchain::new(&runner, &tools));
        let intent = ProvisionIntent::new("br0", "tap0", Addressing::Dhcp).with_wan("eth0");

        let preflight = provisioner.preflight(&intent).unwrap();
        assert!(preflight.bridge_exists);
        assert!(!preflight.tap_exists);
        assert_eq!(preflight.wan_exists, Some(true));
        assert!(!preflight.is_clear());
        assert_eq!(preflight.conflict(), Some("br0"));
        assert!(runner.calls().is_empty());
    }
}
