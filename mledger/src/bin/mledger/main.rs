mod commands;
mod context;
mod examples;
mod output;

use anyhow::Result;
use clap::{
    ColorChoice, Command, CommandFactory, FromArgMatches, Parser, Subcommand,
    builder::{Styles, styling::AnsiColor},
};
use colored::control::ShouldColorize;

use commands::{
    ledger::{MarkCommands, handle_mark_commands, handle_status},
    lock::{LockCommands, handle_lock_commands},
    tables::{DeprovisionArgs, handle_deprovision, handle_provision},
};
use context::{Overrides, RunContext};
use examples::{command_examples, render_environment, render_examples};
use output::{GlobalOptions, OutputFormat, OutputManager, Tone};

const ENVIRONMENT_VARIABLES: &[(&str, &str)] = &[
    ("REDIS_URL", "Redis connection URL (default for --redis-url and the config file)"),
    ("RUST_LOG", "Log filter for library diagnostics, e.g. mledger=debug"),
];

#[derive(Parser)]
#[command(name = "mledger")]
#[command(version)]
#[command(
    about = "Migration ledger and advisory lock on Redis",
    long_about = r#"Bookkeeping for schema migration runners:

• Records which migrations ran, with a dirty flag for interrupted runs
• Serialises runners with a polling lock on one well-known key
• Keeps both in two tables under a Redis namespace

Commands:
  provision    Create the ledger and lock tables
  deprovision  Drop both tables
  status       Show the current migration and any dirty records
  mark         Edit ledger records by hand
  lock         Inspect or manage the migration lock
"#
)]
#[command(subcommand_required = true, arg_required_else_help = true)]
struct Cli {
    /// Output format
    #[arg(long, value_enum, default_value = "table", global = true)]
    output: OutputFormat,

    /// Suppress output (only errors will be shown)
    #[arg(short = 'q', long, global = true)]
    quiet: bool,

    /// Enable verbose output
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Redis connection URL (overrides .mledger.toml)
    #[arg(long, env = "REDIS_URL", global = true)]
    redis_url: Option<String>,

    /// Key prefix for every table
    #[arg(long, global = true)]
    namespace: Option<String>,

    /// Ledger table name
    #[arg(long, global = true)]
    table: Option<String>,

    /// Lock table name
    #[arg(long, global = true)]
    lock_table: Option<String>,

    /// Key of the lock item
    #[arg(long, global = true)]
    lock_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

fn help_styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default().bold())
        .usage(AnsiColor::BrightBlue.on_default().bold())
        .literal(AnsiColor::Magenta.on_default())
        .placeholder(AnsiColor::BrightBlack.on_default())
        .valid(AnsiColor::Green.on_default())
        .invalid(AnsiColor::Yellow.on_default())
        .error(AnsiColor::Red.on_default().bold())
}

/// The clap command with styles and the example appendices attached.
fn build_cli_command(use_color: bool) -> Command {
    let mut command = Cli::command()
        .styles(help_styles())
        .color(if use_color { ColorChoice::Auto } else { ColorChoice::Never })
        .after_long_help(render_environment(ENVIRONMENT_VARIABLES, use_color));

    for example in command_examples() {
        if let Some(subcommand) = command.find_subcommand_mut(example.name) {
            *subcommand = subcommand
                .clone()
                .after_long_help(render_examples(example.groups, use_color));
        }
    }
    command
}

fn parse_cli() -> Cli {
    let use_color = ShouldColorize::from_env().should_colorize();
    let matches = build_cli_command(use_color).get_matches();
    Cli::from_arg_matches(&matches).unwrap_or_else(|err| err.exit())
}

#[derive(Subcommand)]
enum Commands {
    /// Create the ledger and lock tables if missing
    Provision,

    /// Delete the ledger and lock tables
    Deprovision(DeprovisionArgs),

    /// Show the current migration and the ledger contents
    Status,

    /// Edit ledger records by hand
    #[command(subcommand)]
    Mark(MarkCommands),

    /// Inspect or manage the migration lock
    #[command(subcommand)]
    Lock(LockCommands),
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let cli = parse_cli();
    if let Err(err) = execute(cli).await {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

async fn execute(cli: Cli) -> Result<()> {
    let global_options = GlobalOptions {
        output_format: cli.output,
        quiet: cli.quiet,
        verbose: cli.verbose,
        no_color: cli.no_color,
    };
    if global_options.no_color {
        colored::control::set_override(false);
    }

    let output = OutputManager::new(global_options);

    let overrides = Overrides {
        redis_url: cli.redis_url,
        namespace: cli.namespace,
        table: cli.table,
        lock_table: cli.lock_table,
        lock_key: cli.lock_key,
    };
    let ctx = RunContext::find(overrides)?;
    match &ctx.config_path {
        Some(path) => output.say(Tone::Detail, &format!("Using config {}", path.display())),
        None => output.say(Tone::Detail, "No .mledger.toml found, using defaults"),
    }
    output.say(Tone::Detail, &format!("Namespace: {}", ctx.namespace()));

    match cli.command {
        Commands::Provision => {
            handle_provision(&ctx, &output).await?;
        }
        Commands::Deprovision(args) => {
            handle_deprovision(&ctx, args, &output).await?;
        }
        Commands::Status => {
            handle_status(&ctx, &output).await?;
        }
        Commands::Mark(mark_cmd) => {
            handle_mark_commands(&ctx, mark_cmd, &output).await?;
        }
        Commands::Lock(lock_cmd) => {
            handle_lock_commands(&ctx, lock_cmd, &output).await?;
        }
    }

    Ok(())
}
