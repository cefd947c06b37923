use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

use crate::commands::CommandReport;
use crate::studio::Studio;
use crate::studio::prompts::{NewPrompt, PromptPatch, PromptTemplate};

#[derive(Debug, Clone)]
pub enum PromptAction {
    List,
    Show {
        id: String,
    },
    Create {
        id: Option<String>,
        name: String,
        description: String,
        content: ContentSource,
        disabled: bool,
    },
    Patch {
        id: String,
        name: Option<String>,
        description: Option<String>,
        content: Option<ContentSource>,
        enabled: Option<bool>,
    },
    Delete {
        id: String,
    },
    Activate {
        id: String,
    },
}

#[derive(Debug, Clone)]
pub enum ContentSource {
    File(PathBuf),
    Inline(String),
}

impl ContentSource {
    fn read(&self) -> Result<String> {
        match self {
            Self::File(path) => fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display())),
            Self::Inline(text) => Ok(text.clone()),
        }
    }
}

fn template_line(p: &PromptTemplate) -> String {
    format!(
        "{} name=\"{}\" enabled={} active={} builtin={}",
        p.id, p.name, p.enabled, p.active, p.builtin
    )
}

pub fn run(action: &PromptAction) -> Result<CommandReport> {
    let studio = Studio::open()?;
    let _lock = studio.writer_lock()?;
    let (prompts, bootstrap) = studio.prompts()?;
    let mut report = CommandReport::new("prompt");

    if bootstrap.migrated > 0 {
        report.detail(format!(
            "migrated {} legacy prompt(s) from {}",
            bootstrap.migrated,
            studio.paths.legacy_prompts.display()
        ));
    }

    match action {
        PromptAction::List => {
            let items = prompts.list()?;
            for p in &items {
                report.detail(format!(
                    "{} name=\"{}\" enabled={} active={} builtin={} updated_at={} length={}",
                    p.id, p.name, p.enabled, p.active, p.builtin, p.updated_at, p.content_length
                ));
            }
            report.set_data(&items)?;
        }
        PromptAction::Show { id } => {
            let prompt = prompts.get(id)?;
            report.detail(template_line(&prompt));
            report.detail(String::new());
            report.detail(prompt.content.clone());
            report.set_data(&prompt)?;
        }
        PromptAction::Create {
            id,
            name,
            description,
            content,
            disabled,
        } => {
            let created = prompts.create(NewPrompt {
                id: id.clone(),
                name: name.clone(),
                description: description.clone(),
                content: content.read()?,
                enabled: !disabled,
            })?;
            report.detail(format!("created {}", template_line(&created)));
            report.set_data(&created)?;
        }
        PromptAction::Patch {
            id,
            name,
            description,
            content,
            enabled,
        } => {
            let content = match content {
                Some(source) => Some(source.read()?),
                None => None,
            };
            let patched = prompts.patch(
                id,
                PromptPatch {
                    name: name.clone(),
                    description: description.clone(),
                    content,
                    enabled: *enabled,
                },
            )?;
            report.detail(format!("updated {}", template_line(&patched)));
            report.set_data(&patched)?;
        }
        PromptAction::Delete { id } => {
            prompts.delete(id)?;
            report.detail(format!("deleted {id}"));
            if let Some(active) = prompts.active()? {
                report.detail(format!("active={}", active.id));
            }
        }
        PromptAction::Activate { id } => {
            let activated = prompts.activate(id)?;
            report.detail(format!("activated {}", template_line(&activated)));
            report.set_data(&activated)?;
        }
    }
    Ok(report)
}
