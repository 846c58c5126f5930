//! Provisioning state machine
//!
//! Tracks how far a run got using the state-machines crate in dynamic mode.
//! The sequence is linear; the only branch is the optional uplink step.

use crate::error::{self, Error};
use state_machines::state_machine;

state_machine! {
    name: ProvisionMachine,
    dynamic: true,
    initial: Validating,
    states: [Validating, BridgeCreated, UplinkEnrolled, BridgeAddressed, TapCreated, Done, Failed],
    events {
        bridged {
            transition: { from: Validating, to: BridgeCreated }
        }
        uplinked {
            transition: { from: BridgeCreated, to: UplinkEnrolled }
        }
        addressed {
            transition: { from: [BridgeCreated, UplinkEnrolled], to: BridgeAddressed }
        }
        tapped {
            transition: { from: BridgeAddressed, to: TapCreated }
        }
        finish {
            transition: { from: TapCreated, to: Done }
        }
        fail {
            transition: { from: [Validating, BridgeCreated, UplinkEnrolled, BridgeAddressed, TapCreated], to: Failed }
        }
    }
}

/// Stage reached by a provisioning run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validating,
    BridgeCreated,
    UplinkEnrolled,
    BridgeAddressed,
    TapCreated,
    Done,
    Failed,
}

impl Stage {
    fn from_name(s: &str) -> Self {
        match s {
            "Validating" => Stage::Validating,
            "BridgeCreated" => Stage::BridgeCreated,
            "UplinkEnrolled" => Stage::UplinkEnrolled,
            "BridgeAddressed" => Stage::BridgeAddressed,
            "TapCreated" => Stage::TapCreated,
            "Done" => Stage::Done,
            _ => Stage::Failed,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Validating => "validating",
            Stage::BridgeCreated => "bridge created",
            Stage::UplinkEnrolled => "uplink enrolled",
            Stage::BridgeAddressed => "bridge addressed",
            Stage::TapCreated => "tap created",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Progress of one run
pub struct Progress {
    machine: DynamicProvisionMachine<()>,
}

impl Progress {
    pub fn new() -> Self {
        Self {
            machine: ProvisionMachine::new(()).into_dynamic(),
        }
    }

    pub fn stage(&self) -> Stage {
        Stage::from_name(self.machine.current_state())
    }

    fn handle(&mut self, event: ProvisionMachineEvent) -> error::Result<()> {
        let from = self.stage();
        self.machine
            .handle(event)
            .map_err(|e| Error::InvalidTransition(format!("from {}: {:?}", from, e)))
    }

    pub fn bridged(&mut self) -> error::Result<()> {
        self.handle(ProvisionMachineEvent::Bridged)
    }

    pub fn uplinked(&mut self) -> error::Result<()> {
        self.handle(ProvisionMachineEvent::Uplinked)
    }

    pub fn addressed(&mut self) -> error::Result<()> {
        self.handle(ProvisionMachineEvent::Addressed)
    }

    pub fn tapped(&mut self) -> error::Result<()> {
        self.handle(ProvisionMachineEvent::Tapped)
    }

    pub fn finish(&mut self) -> error::Result<()> {
        self.handle(ProvisionMachineEvent::Finish)
    }

    pub fn fail(&mut self) -> error::Result<()> {
        self.handle(ProvisionMachineEvent::Fail)
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::new()
    }
}
