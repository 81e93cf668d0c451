//! Memory commands: list, add, update, delete.

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use clap::Subcommand;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use uuid::Uuid;

use memora_types::memory::{CONVERSATION_SUMMARY_TAG, MemoryKind, MemoryPatch};

use super::{print_json, short_id, truncate};
use crate::state::AppState;

#[derive(Subcommand)]
pub enum MemoryCommand {
    /// List memories, most important first.
    #[command(alias = "ls")]
    List {
        user_id: Uuid,
    },

    /// Remember something by hand.
    Add {
        user_id: Uuid,

        content: String,

        /// conversation, personal, goal, reflection, relationship, milestone.
        #[arg(long, default_value = "personal")]
        kind: MemoryKind,
    },

    /// Change a memory's importance, tags, or summary.
    Update {
        user_id: Uuid,
        memory_id: Uuid,

        /// New importance (clamped to 1..=10).
        #[arg(long)]
        importance: Option<u8>,

        /// Replace the tags (comma-separated).
        #[arg(long, value_delimiter = ',')]
        tags: Option<Vec<String>>,

        #[arg(long)]
        summary: Option<String>,
    },

    /// Delete a memory.
    #[command(alias = "rm")]
    Delete {
        user_id: Uuid,
        memory_id: Uuid,
    },
}

pub async fn handle_memory_command(cmd: MemoryCommand, state: &AppState, json: bool) -> Result<()> {
    match cmd {
        MemoryCommand::List { user_id } => {
            let memories = state.memory_bank.list_memories(&user_id).await?;
            if json {
                return print_json(&memories);
            }
            if memories.is_empty() {
                println!();
                println!(
                    "  {} No memories yet. They are extracted as you chat.",
                    style("i").blue().bold()
                );
                println!();
                return Ok(());
            }

            let mut table = Table::new();
            table.load_preset(presets::UTF8_FULL_CONDENSED);
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec![
                Cell::new("ID").fg(Color::White),
                Cell::new("Summary").fg(Color::White),
                Cell::new("Kind").fg(Color::White),
                Cell::new("Importance").fg(Color::White),
                Cell::new("Tags").fg(Color::White),
            ]);
            for m in &memories {
                let summary = if m.has_tag(CONVERSATION_SUMMARY_TAG) {
                    Cell::new(truncate(&m.summary, 60)).fg(Color::Yellow)
                } else {
                    Cell::new(truncate(&m.summary, 60)).fg(Color::White)
                };
                let tags: Vec<&str> = m.tags.iter().map(String::as_str).collect();
                table.add_row(vec![
                    Cell::new(short_id(&m.id)).fg(Color::DarkGrey),
                    summary,
                    Cell::new(m.kind).fg(Color::Cyan),
                    Cell::new(format_importance(m.importance)).fg(Color::Yellow),
                    Cell::new(tags.join(", ")).fg(Color::DarkGrey),
                ]);
            }
            println!();
            println!("{table}");
            println!();
            println!(
                "  {} memor{}",
                style(memories.len()).bold(),
                if memories.len() == 1 { "y" } else { "ies" }
            );
            println!();
        }

        MemoryCommand::Add {
            user_id,
            content,
            kind,
        } => {
            state
                .accounts
                .get_user(&user_id)
                .await
                .with_context(|| format!("User {user_id} not found"))?;
            let memory = state.memory_bank.remember(user_id, kind, &content).await?;
            if json {
                return print_json(&memory);
            }
            println!(
                "  {} Remembered ({}, importance {})",
                style("✓").green().bold(),
                memory.kind,
                memory.importance
            );
        }

        MemoryCommand::Update {
            user_id,
            memory_id,
            importance,
            tags,
            summary,
        } => {
            let patch = MemoryPatch {
                importance,
                tags: tags.map(|t| {
                    t.into_iter()
                        .map(|s| s.trim().to_lowercase())
                        .filter(|s| !s.is_empty())
                        .collect::<BTreeSet<_>>()
                }),
                summary,
                ..MemoryPatch::default()
            };
            let memory = state
                .memory_bank
                .update_memory(&user_id, &memory_id, &patch)
                .await?;
            if json {
                return print_json(&memory);
            }
            println!(
                "  {} Memory updated (importance {})",
                style("✓").green().bold(),
                memory.importance
            );
        }

        MemoryCommand::Delete { user_id, memory_id } => {
            state.memory_bank.delete_memory(&user_id, &memory_id).await?;
            if json {
                return print_json(&serde_json::json!({ "deleted": memory_id }));
            }
            println!("  {} Memory deleted", style("✓").green().bold());
        }
    }
    Ok(())
}

fn format_importance(level: u8) -> String {
    let filled = usize::from(level.min(10)) / 2;
    format!("{}{} {level}", "●".repeat(filled), "○".repeat(5 - filled))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_importance() {
        assert_eq!(format_importance(10), "●●●●● 10");
        assert_eq!(format_importance(5), "●●○○○ 5");
        assert_eq!(format_importance(1), "○○○○○ 1");
    }
}
