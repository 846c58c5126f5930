//! tapbridge - bridge and TAP provisioning for virtual machines
//!
//! Creates a Linux bridge, optionally enslaves a WAN uplink, addresses the
//! bridge and enrolls a TAP device that a VM can attach to.

mod cli;
mod error;
mod exec;
mod manifest;
mod network;
mod provision;

use cli::{Cli, Commands};
use error::{Error, Result};
use exec::{CommandRunner, DryRunRunner, SystemRunner};
use network::Toolchain;
use provision::{Addressing, ProvisionIntent, Provisioner};

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        if let Error::Aborted {
            reached, completed, ..
        } = &e
        {
            eprintln!(
                "\nStopped after stage '{}'. These steps were applied and not rolled back:",
                reached
            );
            for step in completed {
                eprintln!("  - {}", step);
            }
            if let Some(device) = e.device() {
                eprintln!("Inspect '{}' and clean up before re-running.", device);
            }
        }
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> Result<()> {
    let cli = Cli::parse_args();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Completion { shell } => {
            Cli::generate_completion(shell);
        }

        Commands::Check {
            bridge,
            tap,
            wan,
            json,
        } => {
            let config = manifest::load_or_default(cli.config.as_deref())?;
            let mut intent = ProvisionIntent::new(bridge, tap, Addressing::Dhcp);
            if let Some(wan) = wan {
                intent = intent.with_wan(wan);
            }

            let runner = SystemRunner;
            let preflight =
                Provisioner::new(Toolchain::new(&runner, &config.tools)).preflight(&intent)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&preflight)?);
            } else {
                let status = |exists: bool| if exists { "exists" } else { "free" };
                println!("  {:<16} {}", preflight.bridge, status(preflight.bridge_exists));
                println!("  {:<16} {}", preflight.tap, status(preflight.tap_exists));
                if let (Some(wan), Some(exists)) = (&preflight.wan, preflight.wan_exists) {
                    let state = if exists { "present" } else { "missing" };
                    println!("  {:<16} {} (uplink)", wan, state);
                }
            }

            if !preflight.is_clear() {
                std::process::exit(1);
            }
        }

        Commands::Provision {
            bridge,
            tap,
            dhcp,
            ip,
            route,
            dns,
            wan,
            user,
            multi_queue,
            no_multi_queue,
            dry_run,
        } => {
            let config = manifest::load_or_default(cli.config.as_deref())?;

            let addressing = Addressing::from_flags(dhcp, ip, route)?;
            let mut intent = ProvisionIntent::new(bridge, tap, addressing)
                .with_owner(user.unwrap_or_else(|| config.defaults.tap_owner.clone()))
                .with_multi_queue(
                    cli::multi_queue_flag(multi_queue, no_multi_queue)
                        .unwrap_or(config.defaults.multi_queue),
                );
            if let Some(wan) = wan {
                intent = intent.with_wan(wan);
            }
            if let Some(dns) = dns {
                intent = intent.with_dns(dns);
            }

            let runner: &dyn CommandRunner = if dry_run {
                println!("=== DRY RUN - No changes will be made ===\n");
                &DryRunRunner
            } else {
                &SystemRunner
            };

            let report = Provisioner::new(Toolchain::new(runner, &config.tools)).run(&intent)?;

            println!();
            let mode = if intent.addressing.is_dhcp() { "DHCP" } else { "static" };
            println!(
                "Provisioned tap '{}' on bridge '{}' ({} addressing, {} steps)",
                intent.tap,
                intent.bridge,
                mode,
                report.steps.len()
            );
            if cli.verbose {
                for step in &report.steps {
                    println!("  - {}", step);
                }
            }
        }
    }

    Ok(())
}
