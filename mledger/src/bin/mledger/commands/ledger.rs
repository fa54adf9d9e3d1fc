use anyhow::{Context, Result};
use clap::Subcommand;
use comfy_table::{Cell, Color as TableColor, Table};
use mledger::{LedgerError, MigrationRecord};
use serde::Serialize;

use crate::context::RunContext;
use crate::examples::ExampleGroup;
use crate::output::{OutputManager, Report, Tone};

pub const STATUS_EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Inspect",
    commands: &[
        "mledger status                  # Current migration and done list",
        "mledger --output json status    # Machine-readable report",
    ],
}];

pub const MARK_EXAMPLES: &[ExampleGroup] = &[
    ExampleGroup {
        title: "Record Progress",
        commands: &[
            "mledger mark add 20240101_init       # Record a migration as started (dirty)",
            "mledger mark finish 20240101_init    # Confirm it applied cleanly",
        ],
    },
    ExampleGroup {
        title: "Recovery",
        commands: &[
            "mledger mark finish 20240102_users   # Accept an interrupted migration as applied",
            "mledger mark remove 20240102_users   # Forget an interrupted migration",
            "mledger mark start 20240101_init     # Flag a finished migration for re-run",
        ],
    },
];

#[derive(Subcommand)]
pub enum MarkCommands {
    /// Record a new migration as started (dirty)
    Add { id: String },
    /// Delete a migration record
    Remove { id: String },
    /// Mark an existing migration dirty
    Start { id: String },
    /// Mark an existing migration finished
    Finish { id: String },
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LedgerState {
    Empty,
    Clean,
    Dirty,
}

/// Snapshot of the ledger shown by `status`
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub state: LedgerState,
    pub current: Option<String>,
    pub records: Vec<MigrationRecord>,
}

impl StatusReport {
    fn dirty_ids(&self) -> impl Iterator<Item = &str> {
        self.records
            .iter()
            .filter(|record| record.dirty)
            .map(|record| record.id.as_str())
    }
}

impl Report for StatusReport {
    fn table(&self, output: &OutputManager) -> Table {
        let mut table = output.table(&["Migration", "State"]);

        for record in &self.records {
            let (label, color) = if record.dirty {
                ("dirty", TableColor::Yellow)
            } else {
                ("done", TableColor::Green)
            };
            let state = if output.options.no_color {
                Cell::new(label)
            } else {
                Cell::new(label).fg(color)
            };
            table.add_row(vec![Cell::new(&record.id), state]);
        }

        if self.records.is_empty() {
            table.add_row(vec![Cell::new("(no migrations recorded)"), Cell::new("")]);
        }
        table
    }

    fn summary(&self) -> String {
        match self.state {
            LedgerState::Empty => "empty".to_string(),
            LedgerState::Clean => format!("clean current={}", self.current.as_deref().unwrap_or("-")),
            LedgerState::Dirty => format!("dirty ids={}", self.dirty_ids().collect::<Vec<_>>().join(",")),
        }
    }
}

pub async fn handle_status(ctx: &RunContext, output: &OutputManager) -> Result<()> {
    let ledger = ctx.connect().await?;

    let records = ledger.records().await.context("Failed to read the ledger")?;
    let (state, current) = match ledger.current().await {
        Ok(current) => (LedgerState::Clean, Some(current)),
        Err(LedgerError::NoCurrentMigration) => (LedgerState::Empty, None),
        Err(LedgerError::DirtyState) => (LedgerState::Dirty, None),
        Err(err) => return Err(err).context("Failed to read the current migration"),
    };
    let report = StatusReport {
        state,
        current,
        records,
    };

    output.heading("Ledger Status");
    output.field("Table", &ctx.ledger_config().table_name);
    match report.state {
        LedgerState::Empty => output.say(Tone::Note, "No finished migrations"),
        LedgerState::Clean => output.field("Current", report.current.as_deref().unwrap_or_default()),
        LedgerState::Dirty => {
            output.say(Tone::Warning, "The ledger is dirty: a migration started and never finished.");
            for id in report.dirty_ids() {
                output.item(id);
            }
            output.say(Tone::Note, "Verify the target by hand, then 'mledger mark finish <id>' or 'mledger mark remove <id>'.");
        }
    }
    output.render(&report)
}

pub async fn handle_mark_commands(ctx: &RunContext, command: MarkCommands, output: &OutputManager) -> Result<()> {
    let ledger = ctx.connect().await?;

    let (id, result, done) = match command {
        MarkCommands::Add { id } => {
            let result = ledger.add(&id).await;
            (id, result, "recorded as started")
        }
        MarkCommands::Remove { id } => {
            let result = ledger.remove(&id).await;
            (id, result, "removed")
        }
        MarkCommands::Start { id } => {
            let result = ledger.start_migration(&id).await;
            (id, result, "marked dirty")
        }
        MarkCommands::Finish { id } => {
            let result = ledger.finish_migration(&id).await;
            (id, result, "marked finished")
        }
    };

    match result {
        Ok(()) => {
            output.say(Tone::Success, &format!("Migration '{id}' {done}"));
            Ok(())
        }
        Err(err) if err.is_expected() => {
            output.say(Tone::Failure, &err.to_string());
            anyhow::bail!("Ledger left unchanged")
        }
        Err(err) => Err(err.into()),
    }
}
