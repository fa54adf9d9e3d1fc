use std::io::Write;

use anyhow::Result;
use clap::ValueEnum;
use colored::{Color, Colorize};
use comfy_table::{Attribute, Cell, Table, presets};
use serde::Serialize;

/// How reports are printed
#[derive(Clone, Debug, ValueEnum, Default, PartialEq)]
pub enum OutputFormat {
    /// Human-readable table (default)
    #[default]
    Table,
    /// Pretty-printed JSON
    Json,
    /// One line per report
    Compact,
}

#[derive(Clone, Debug, Default)]
pub struct GlobalOptions {
    pub output_format: OutputFormat,
    pub quiet: bool,
    pub verbose: bool,
    pub no_color: bool,
}

/// Kind of status line; picks the icon, the color and the stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tone {
    Success,
    Failure,
    Warning,
    Note,
    Held,
    Freed,
    Detail,
}

impl Tone {
    fn icon(self) -> &'static str {
        match self {
            Tone::Success => "✓",
            Tone::Failure => "✗",
            Tone::Warning => "⚠",
            Tone::Note => "ℹ",
            Tone::Held => "🔒",
            Tone::Freed => "🔓",
            Tone::Detail => "→",
        }
    }

    fn color(self) -> Color {
        match self {
            Tone::Success => Color::Green,
            Tone::Failure => Color::Red,
            Tone::Warning => Color::Yellow,
            Tone::Note => Color::Blue,
            Tone::Held | Tone::Freed => Color::Cyan,
            Tone::Detail => Color::BrightBlack,
        }
    }

    fn on_stderr(self) -> bool {
        matches!(self, Tone::Failure | Tone::Detail)
    }
}

/// A command result that can be printed in every [`OutputFormat`].
pub trait Report: Serialize {
    fn table(&self, output: &OutputManager) -> Table;
    fn summary(&self) -> String;
}

pub struct OutputManager {
    pub options: GlobalOptions,
}

impl OutputManager {
    pub fn new(options: GlobalOptions) -> Self {
        Self { options }
    }

    /// Status lines are for people; JSON mode keeps stdout parseable.
    fn chatty(&self) -> bool {
        !self.options.quiet && self.options.output_format != OutputFormat::Json
    }

    fn paint(&self, text: &str, color: Color) -> String {
        if self.options.no_color {
            text.to_string()
        } else {
            text.color(color).to_string()
        }
    }

    pub(crate) fn format_line(&self, tone: Tone, message: &str) -> String {
        format!("{} {}", self.paint(tone.icon(), tone.color()), self.paint(message, tone.color()))
    }

    /// Prints one status line. Failures always print, details only with `--verbose`.
    pub fn say(&self, tone: Tone, message: &str) {
        let visible = match tone {
            Tone::Failure => true,
            Tone::Detail => self.options.verbose && !self.options.quiet,
            _ => self.chatty(),
        };
        if !visible {
            return;
        }
        let line = self.format_line(tone, message);
        if tone.on_stderr() {
            eprintln!("{line}");
        } else {
            println!("{line}");
        }
    }

    pub fn heading(&self, text: &str) {
        if !self.chatty() {
            return;
        }
        if self.options.no_color {
            println!("\n{text}\n{}", "-".repeat(text.chars().count()));
        } else {
            println!("\n{}", text.bright_blue().bold());
        }
    }

    pub fn field(&self, name: &str, value: &str) {
        if self.chatty() {
            println!("{}: {}", self.paint(name, Color::BrightCyan), value);
        }
    }

    pub fn item(&self, text: &str) {
        if self.chatty() {
            println!("  {} {text}", self.paint("•", Color::BrightBlack));
        }
    }

    /// Empty table with a bold header row, ASCII borders when color is off.
    pub fn table(&self, headers: &[&str]) -> Table {
        let mut table = Table::new();
        table.load_preset(if self.options.no_color {
            presets::ASCII_FULL
        } else {
            presets::UTF8_FULL_CONDENSED
        });
        table.set_header(headers.iter().map(|header| Cell::new(header).add_attribute(Attribute::Bold)));
        table
    }

    /// Transient "working" line; overwritten by [`OutputManager::done_waiting`].
    pub fn waiting(&self, message: &str) {
        if self.chatty() {
            print!("\r{}...", self.format_line(Tone::Detail, message));
            std::io::stdout().flush().ok();
        }
    }

    pub fn done_waiting(&self) {
        if self.chatty() {
            print!("\r\x1b[2K");
            std::io::stdout().flush().ok();
        }
    }

    pub fn render<R: Report>(&self, report: &R) -> Result<()> {
        if self.options.quiet {
            return Ok(());
        }
        match self.options.output_format {
            OutputFormat::Table => println!("{}", report.table(self)),
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
            OutputFormat::Compact => println!("{}", report.summary()),
        }
        Ok(())
    }
}
