use anyhow::{Context, Result};
use clap::Args;

use crate::context::RunContext;
use crate::examples::ExampleGroup;
use crate::output::{OutputManager, Tone};

pub const PROVISION_EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Provision",
    commands: &[
        "mledger provision                          # Create _migrations and _migrations-lock",
        "mledger --table app_migrations provision   # Use a custom ledger table",
    ],
}];

pub const DEPROVISION_EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Tear Down",
    commands: &["mledger deprovision --yes                  # Drop both tables and every record"],
}];

#[derive(Args)]
pub struct DeprovisionArgs {
    /// Confirm deletion of the ledger and lock tables
    #[arg(long)]
    yes: bool,
}

pub async fn handle_provision(ctx: &RunContext, output: &OutputManager) -> Result<()> {
    let config = ctx.ledger_config();
    output.heading("Provision");

    output.waiting("Connecting to Redis");
    let ledger = ctx.connect().await?;
    output.done_waiting();

    ledger.provision().await.context("Provisioning failed")?;

    output.say(Tone::Success, "Tables ready");
    output.item(&format!("Ledger table: {}", config.table_name));
    output.item(&format!("Lock table:   {}", config.lock_table_name));
    Ok(())
}

pub async fn handle_deprovision(ctx: &RunContext, args: DeprovisionArgs, output: &OutputManager) -> Result<()> {
    let config = ctx.ledger_config();
    output.heading("Deprovision");

    if !args.yes {
        output.say(Tone::Warning, &format!(
            "This drops '{}' and '{}' with every record in them.",
            config.table_name, config.lock_table_name
        ));
        output.say(Tone::Note, "Re-run with --yes to confirm.");
        anyhow::bail!("Deprovision not confirmed");
    }

    let ledger = ctx.connect().await?;
    ledger.deprovision().await.context("Deprovisioning failed")?;

    output.say(Tone::Success, &format!(
        "Deleted '{}' and '{}'",
        config.table_name, config.lock_table_name
    ));
    Ok(())
}
