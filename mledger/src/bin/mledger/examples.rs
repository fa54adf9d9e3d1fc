use colored::{Color, Colorize};

use crate::commands::{ledger, lock, tables};

#[derive(Clone, Copy)]
pub struct ExampleGroup {
    pub title: &'static str,
    pub commands: &'static [&'static str],
}

#[derive(Clone, Copy)]
pub struct CommandExample {
    pub name: &'static str,
    pub groups: &'static [ExampleGroup],
}

pub fn command_examples() -> &'static [CommandExample] {
    &[
        CommandExample {
            name: "provision",
            groups: tables::PROVISION_EXAMPLES,
        },
        CommandExample {
            name: "deprovision",
            groups: tables::DEPROVISION_EXAMPLES,
        },
        CommandExample {
            name: "status",
            groups: ledger::STATUS_EXAMPLES,
        },
        CommandExample {
            name: "mark",
            groups: ledger::MARK_EXAMPLES,
        },
        CommandExample {
            name: "lock",
            groups: lock::EXAMPLES,
        },
    ]
}

fn paint(text: &str, color: Color, use_color: bool) -> String {
    if use_color {
        text.color(color).bold().to_string()
    } else {
        text.to_string()
    }
}

/// Long-help appendix for one subcommand.
pub fn render_examples(groups: &[ExampleGroup], use_color: bool) -> String {
    let sections: Vec<String> = groups
        .iter()
        .map(|group| {
            let mut section = format!("  {}\n", paint(group.title, Color::BrightBlue, use_color));
            for command in group.commands {
                section.push_str(&format!("    $ {command}\n"));
            }
            section
        })
        .collect();
    format!("{}\n{}", paint("Examples:", Color::Cyan, use_color), sections.join("\n"))
}

/// Long-help appendix for the top-level command.
pub fn render_environment(variables: &[(&str, &str)], use_color: bool) -> String {
    let mut text = format!("{}\n", paint("Environment Variables:", Color::Cyan, use_color));
    for (name, description) in variables {
        text.push_str(&format!("  {:<10} {description}\n", paint(name, Color::BrightCyan, use_color)));
    }
    text.push_str("\nRun 'mledger <command> --help' for examples.\n");
    text
}
