//! Conversation commands: list, show, new, delete.

use anyhow::Result;
use clap::Subcommand;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use dialoguer::Confirm;
use uuid::Uuid;

use memora_types::conversation::ChatRole;

use super::{print_json, short_id, truncate};
use crate::state::AppState;

#[derive(Subcommand)]
pub enum ConversationCommand {
    /// List a user's conversations, most recently active first.
    #[command(alias = "ls")]
    List {
        user_id: Uuid,
    },

    /// Print a conversation's messages.
    Show {
        user_id: Uuid,
        conversation_id: Uuid,
    },

    /// Start a new conversation and make it the active one.
    New {
        user_id: Uuid,

        #[arg(long)]
        title: Option<String>,
    },

    /// Delete a conversation and the memories extracted from it.
    #[command(alias = "rm")]
    Delete {
        user_id: Uuid,
        conversation_id: Uuid,

        /// Skip confirmation prompt.
        #[arg(long)]
        force: bool,
    },
}

pub async fn handle_conversation_command(
    cmd: ConversationCommand,
    state: &AppState,
    json: bool,
) -> Result<()> {
    match cmd {
        ConversationCommand::List { user_id } => {
            let conversations = state.conversations.list_conversations(&user_id).await?;
            if json {
                return print_json(&conversations);
            }
            if conversations.is_empty() {
                println!();
                println!(
                    "  {} No conversations yet. Start one with `memora chat send`.",
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
                Cell::new("Title").fg(Color::White),
                Cell::new("Messages").fg(Color::White),
                Cell::new("Status").fg(Color::White),
                Cell::new("Updated").fg(Color::White),
            ]);
            for c in &conversations {
                let status = match c.superseded_by {
                    Some(next) => Cell::new(format!("→ {}", short_id(&next))).fg(Color::DarkGrey),
                    None => Cell::new("open").fg(Color::Green),
                };
                table.add_row(vec![
                    Cell::new(short_id(&c.id)).fg(Color::DarkGrey),
                    Cell::new(truncate(&c.title, 40)).fg(Color::Cyan),
                    Cell::new(c.message_count()),
                    status,
                    Cell::new(c.updated_at.format("%Y-%m-%d %H:%M")).fg(Color::DarkGrey),
                ]);
            }
            println!();
            println!("{table}");
            println!();
        }

        ConversationCommand::Show {
            user_id,
            conversation_id,
        } => {
            let conversation = state
                .conversations
                .get_conversation(&user_id, &conversation_id)
                .await?;
            if json {
                return print_json(&conversation);
            }
            println!();
            println!("  {}", style(&conversation.title).cyan().bold());
            println!("  {}", style("─".repeat(40)).dim());
            for message in &conversation.messages {
                let who = match message.role {
                    ChatRole::User => style("you").green().bold(),
                    ChatRole::Assistant => style("companion").magenta().bold(),
                };
                println!(
                    "  {} {}: {}",
                    style(message.timestamp.format("%H:%M")).dim(),
                    who,
                    message.content
                );
            }
            if let Some(next) = conversation.superseded_by {
                println!();
                println!("  {} Continued in {}", style("→").dim(), next);
            }
            println!();
        }

        ConversationCommand::New { user_id, title } => {
            let conversation = state
                .conversations
                .start_conversation(user_id, title.as_deref())
                .await?;
            if json {
                return print_json(&conversation);
            }
            println!(
                "  {} Started '{}' ({})",
                style("✓").green().bold(),
                style(&conversation.title).cyan(),
                conversation.id
            );
        }

        ConversationCommand::Delete {
            user_id,
            conversation_id,
            force,
        } => {
            if !force && !json {
                let confirmed = Confirm::new()
                    .with_prompt(format!(
                        "Delete conversation {} and the memories extracted from it?",
                        style(short_id(&conversation_id)).red().bold()
                    ))
                    .default(false)
                    .interact()?;
                if !confirmed {
                    println!("  Cancelled.");
                    return Ok(());
                }
            }
            state
                .conversations
                .delete_conversation(user_id, conversation_id)
                .await?;
            if json {
                return print_json(&serde_json::json!({ "deleted": conversation_id }));
            }
            println!("  {} Conversation deleted", style("✓").green().bold());
        }
    }
    Ok(())
}
