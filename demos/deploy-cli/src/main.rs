//! Demo CLI whose command surface lives in `commands/*.json`
//!
//! ```text
//! cargo run -- ship production -n 3 --dry
//! cargo run -- --status
//! cargo run -- -v
//! RUST_LOG=cogs_host=debug cargo run -- nope
//! ```

use cogs::{exec_fn, listener_fn, Cli, CommandRegistry, EventPayload, ListenerRegistry, RegistryConfig};
use std::path::Path;
use std::sync::Arc;

fn registries() -> anyhow::Result<(CommandRegistry, ListenerRegistry)> {
    let root = Path::new(env!("CARGO_MANIFEST_DIR"));
    let commands = CommandRegistry::new(RegistryConfig::for_commands().directory(root.join("commands")))
        .with_alias_replacement(cogs::Regex::new("^-+")?);
    let listeners = ListenerRegistry::new(RegistryConfig::for_listeners().directory(root.join("listeners")));
    Ok((commands, listeners))
}

fn define_commands(commands: &mut CommandRegistry, version: String) {
    commands
        .define(
            "ship",
            Arc::new(exec_fn(|data| async move {
                if data.answer("confirm").and_then(|v| v.as_bool()) == Some(false) {
                    println!("Aborted");
                    return Ok(());
                }
                let target = data.arg("target").and_then(|v| v.as_str()).unwrap_or("staging");
                let replicas = data.flag("replicas").and_then(|v| v.as_f64()).unwrap_or(1.0);
                let dry_run = data.flag("dry-run").and_then(|v| v.as_bool()).unwrap_or(false);
                anyhow::ensure!(target != "moon", "no route to {}", target);

                let mode = if dry_run { " (dry run)" } else { "" };
                println!("Shipping to {} with {} replicas{}", target, replicas, mode);
                Ok(())
            })),
        )
        .define(
            "status",
            Arc::new(exec_fn(|_| async {
                println!("staging: 1.4.2, production: 1.4.1");
                Ok(())
            })),
        )
        .define(
            "version",
            Arc::new(exec_fn(move |_| {
                let version = version.clone();
                async move {
                    println!("{}", version);
                    Ok(())
                }
            })),
        );
}

fn define_listeners(listeners: &mut ListenerRegistry) {
    listeners
        .define(
            "report",
            Arc::new(listener_fn(|payload| {
                if let EventPayload::Error { error, command, .. } = payload {
                    eprintln!("{} failed: {}", command.id, error);
                }
                Ok(())
            })),
        )
        .define(
            "unknown",
            Arc::new(listener_fn(|payload| {
                if let EventPayload::InvalidCommand { argv } = payload {
                    eprintln!("Unknown command: {}", argv.join(" "));
                }
                Ok(())
            })),
        )
        .define(
            "summary",
            Arc::new(listener_fn(|payload| {
                if let EventPayload::End { successful: false } = payload {
                    eprintln!("Try: ship, status, --version");
                }
                Ok(())
            })),
        );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cogs::tracing_support::init_subscriber();

    let (commands, listeners) = registries()?;
    let mut cli = Cli::with_registries("deploy", commands, listeners)
        .with_package(cogs::package_info!());

    let version = cli.version().unwrap_or("unknown").to_string();
    define_commands(cli.commands_mut(), version);
    define_listeners(cli.listeners_mut());
    cli.load_all()?;

    let successful = cli.run_env().await;
    std::process::exit(Cli::exit_code(successful));
}
