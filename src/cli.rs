use anyhow::Result;
use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::commands::prompt::{ContentSource, PromptAction};
use crate::commands::save::{SaveOptions, SaveSource};
use crate::commands::settings::SettingsOptions;
use crate::commands::{self, CommandReport};

#[derive(Debug, Parser)]
#[command(
    name = "diary-studio",
    version,
    about = "Local-first diary studio: markdown index, day defaults and gated cloud sync"
)]
struct Cli {
    /// Print the command report as JSON.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Rebuild the index from the diary directory.
    Reindex,
    /// List indexed diaries, newest day first.
    List {
        #[arg(long, short)]
        query: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
    /// Show one diary with its content.
    Show { id: String },
    /// Overwrite one diary's content and refresh its index row.
    #[command(group(ArgGroup::new("source").required(true).args(["file", "content"])))]
    Save {
        id: String,
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long)]
        content: Option<String>,
    },
    /// Per-day diary counts and default selection.
    History,
    /// Pin a diary as the default for its day.
    SetDefault { id: String },
    /// Push a day-default diary to the remote service.
    Sync { id: String },
    /// Show or change sync settings.
    Settings {
        #[arg(long, value_enum)]
        cloud_sync: Option<Toggle>,
        #[arg(long)]
        api_key: Option<String>,
    },
    /// Manage prompt templates.
    Prompt {
        #[command(subcommand)]
        action: PromptCommand,
    },
    /// Paths, counts and the active prompt.
    Status,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
}

impl From<Toggle> for bool {
    fn from(t: Toggle) -> Self {
        matches!(t, Toggle::On)
    }
}

#[derive(Debug, Args)]
#[group(required = false, multiple = false)]
struct ContentArgs {
    #[arg(long)]
    content: Option<String>,
    #[arg(long = "content-file")]
    content_file: Option<PathBuf>,
}

impl ContentArgs {
    fn source(self) -> Option<ContentSource> {
        match (self.content_file, self.content) {
            (Some(path), _) => Some(ContentSource::File(path)),
            (None, Some(text)) => Some(ContentSource::Inline(text)),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Subcommand)]
enum PromptCommand {
    List,
    Show {
        id: String,
    },
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        id: Option<String>,
        #[arg(long, default_value = "")]
        description: String,
        #[command(flatten)]
        content: ContentArgs,
        #[arg(long)]
        disabled: bool,
    },
    Patch {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[command(flatten)]
        content: ContentArgs,
        #[arg(long, value_enum)]
        enabled: Option<Toggle>,
    },
    Delete {
        id: String,
    },
    Activate {
        id: String,
    },
}

impl PromptCommand {
    fn into_action(self) -> PromptAction {
        match self {
            Self::List => PromptAction::List,
            Self::Show { id } => PromptAction::Show { id },
            Self::Create {
                name,
                id,
                description,
                content,
                disabled,
            } => PromptAction::Create {
                id,
                name,
                description,
                content: content
                    .source()
                    .unwrap_or(ContentSource::Inline(String::new())),
                disabled,
            },
            Self::Patch {
                id,
                name,
                description,
                content,
                enabled,
            } => PromptAction::Patch {
                id,
                name,
                description,
                content: content.source(),
                enabled: enabled.map(bool::from),
            },
            Self::Delete { id } => PromptAction::Delete { id },
            Self::Activate { id } => PromptAction::Activate { id },
        }
    }
}

fn render(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    for line in &report.details {
        println!("{line}");
    }
    for issue in &report.issues {
        eprintln!("issue: {issue}");
    }
    Ok(())
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let report = match cli.command {
        Command::Reindex => commands::reindex::run()?,
        Command::List {
            query,
            limit,
            offset,
        } => commands::list::run(&commands::list::ListOptions {
            query,
            limit,
            offset,
        })?,
        Command::Show { id } => commands::show::run(&id)?,
        Command::Save { id, file, content } => {
            let source = match (file, content) {
                (Some(path), _) => SaveSource::File(path),
                (None, text) => SaveSource::Inline(text.unwrap_or_default()),
            };
            commands::save::run(&SaveOptions { id, source })?
        }
        Command::History => commands::history::run()?,
        Command::SetDefault { id } => commands::set_default::run(&id)?,
        Command::Sync { id } => commands::sync::run(&id)?,
        Command::Settings {
            cloud_sync,
            api_key,
        } => commands::settings::run(&SettingsOptions {
            cloud_sync: cloud_sync.map(bool::from),
            api_key,
        })?,
        Command::Prompt { action } => commands::prompt::run(&action.into_action())?,
        Command::Status => commands::status::run()?,
    };

    render(&report, cli.json)?;
    if !report.ok {
        std::process::exit(2);
    }
    Ok(())
}
