use std::time::Duration;

use anyhow::{Context, Result};
use clap::Subcommand;
use mledger::{CancellationToken, LedgerError};

use crate::context::RunContext;
use crate::examples::ExampleGroup;
use crate::output::{OutputManager, Tone};

pub const EXAMPLES: &[ExampleGroup] = &[
    ExampleGroup {
        title: "Inspect",
        commands: &["mledger lock status                      # Is a runner holding the lock?"],
    },
    ExampleGroup {
        title: "Coordinate",
        commands: &[
            "mledger lock acquire --hold-secs 30      # Wait for the lock, hold it, release it",
            "mledger --lock-key billing lock acquire  # Use a separate lock key",
        ],
    },
    ExampleGroup {
        title: "Recovery",
        commands: &["mledger lock force-release --yes         # Clear a lock left by a crashed runner"],
    },
];

#[derive(Subcommand)]
pub enum LockCommands {
    /// Wait for the lock, hold it, then release it
    Acquire {
        /// Seconds to hold the lock once acquired
        #[arg(long, default_value_t = 0)]
        hold_secs: u64,
    },

    /// Show whether the lock is held
    Status,

    /// Delete the lock item regardless of the holder
    ForceRelease {
        /// Confirm removal of a lock another runner may hold
        #[arg(long)]
        yes: bool,
    },
}

pub async fn handle_lock_commands(ctx: &RunContext, command: LockCommands, output: &OutputManager) -> Result<()> {
    match command {
        LockCommands::Acquire { hold_secs } => handle_acquire(ctx, hold_secs, output).await,
        LockCommands::Status => handle_status(ctx, output).await,
        LockCommands::ForceRelease { yes } => handle_force_release(ctx, yes, output).await,
    }
}

async fn handle_acquire(ctx: &RunContext, hold_secs: u64, output: &OutputManager) -> Result<()> {
    let ledger = ctx.connect().await?;
    let config = ledger.config();

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    output.waiting(&format!("Waiting for lock '{}/{}'", config.lock_table_name, config.lock_key));
    let guard = match ledger.acquire(&cancel).await {
        Ok(guard) => guard,
        Err(LedgerError::Cancelled) => {
            output.done_waiting();
            output.say(Tone::Warning, "Interrupted before the lock was acquired");
            anyhow::bail!("Lock not acquired");
        }
        Err(err) => {
            output.done_waiting();
            return Err(err).context("Failed to acquire the lock");
        }
    };
    output.done_waiting();
    output.say(Tone::Held, &format!("Holding '{}/{}'", guard.lock_table_name(), guard.lock_key()));

    if hold_secs > 0 {
        output.say(Tone::Detail, &format!("Releasing in {hold_secs}s (Ctrl-C releases early)"));
        tokio::select! {
            _ = cancel.cancelled() => output.say(Tone::Note, "Interrupted, releasing early"),
            _ = tokio::time::sleep(Duration::from_secs(hold_secs)) => {}
        }
    }

    guard.release().await.context("Failed to release the lock")?;
    output.say(Tone::Freed, "Released");
    Ok(())
}

async fn handle_status(ctx: &RunContext, output: &OutputManager) -> Result<()> {
    let ledger = ctx.connect().await?;
    let config = ledger.config();
    let locked = ledger.is_locked().await.context("Failed to read the lock table")?;

    output.heading("Lock Status");
    output.field("Lock", &format!("{}/{}", config.lock_table_name, config.lock_key));
    if locked {
        output.say(Tone::Held, "Held");
    } else {
        output.say(Tone::Freed, "Free");
    }
    Ok(())
}

async fn handle_force_release(ctx: &RunContext, yes: bool, output: &OutputManager) -> Result<()> {
    let config = ctx.ledger_config();
    output.heading("Force Release");

    if !yes {
        output.say(Tone::Warning, &format!(
            "Another runner may still hold '{}/{}'. Removing it lets a second runner in.",
            config.lock_table_name, config.lock_key
        ));
        output.say(Tone::Note, "Re-run with --yes to confirm.");
        anyhow::bail!("Force release not confirmed");
    }

    let ledger = ctx.connect().await?;
    ledger.force_release().await.context("Failed to force release the lock")?;
    output.say(Tone::Freed, &format!("Removed '{}/{}'", config.lock_table_name, config.lock_key));
    Ok(())
}
