//! Chat commands: send a user message, record an assistant reply, and
//! inspect session state.
//!
//! Without `--conversation`, commands target the user's active
//! conversation. A send that triggers rollover is resubmitted once to the
//! successor, so the message always lands somewhere.

use anyhow::{Context, Result};
use clap::Subcommand;
use console::style;
use uuid::Uuid;

use memora_core::chat::governor::SendOutcome;
use memora_core::chat::session::SessionStatus;
use memora_types::conversation::SessionState;
use memora_types::error::ChatError;

use super::{print_json, short_id, truncate};
use crate::state::AppState;

#[derive(Subcommand)]
pub enum ChatCommand {
    /// Send a user message.
    Send {
        user_id: Uuid,

        message: String,

        /// Target conversation (defaults to the active one).
        #[arg(long)]
        conversation: Option<Uuid>,
    },

    /// Record an assistant reply.
    Reply {
        user_id: Uuid,

        message: String,

        #[arg(long)]
        conversation: Option<Uuid>,
    },

    /// Show message counts and thresholds.
    Status {
        user_id: Uuid,

        #[arg(long)]
        conversation: Option<Uuid>,
    },
}

pub async fn handle_chat_command(cmd: ChatCommand, state: &AppState, json: bool) -> Result<()> {
    match cmd {
        ChatCommand::Send {
            user_id,
            message,
            conversation,
        } => send(state, user_id, conversation, &message, json).await,

        ChatCommand::Reply {
            user_id,
            message,
            conversation,
        } => {
            let conversation_id = target(state, user_id, conversation).await?;
            let reply = state
                .governor
                .append_assistant_reply(user_id, conversation_id, &message)
                .await
                .map_err(explain)?;
            if json {
                return print_json(&serde_json::json!({
                    "conversation": reply.conversation,
                    "memory": reply.memory,
                }));
            }
            println!(
                "  {} Reply recorded ({} messages, memory importance {})",
                style("✓").green(),
                reply.conversation.message_count(),
                reply.memory.importance
            );
            Ok(())
        }

        ChatCommand::Status {
            user_id,
            conversation,
        } => {
            let conversation_id = target(state, user_id, conversation).await?;
            let status = state.governor.status(&user_id, &conversation_id).await?;
            if json {
                return print_json(&status);
            }
            print_status(&status);
            Ok(())
        }
    }
}

async fn target(state: &AppState, user_id: Uuid, explicit: Option<Uuid>) -> Result<Uuid> {
    match explicit {
        Some(id) => Ok(id),
        None => Ok(state
            .conversations
            .active_conversation(user_id)
            .await
            .context("Failed to resolve the active conversation")?
            .id),
    }
}

async fn send(
    state: &AppState,
    user_id: Uuid,
    conversation: Option<Uuid>,
    message: &str,
    json: bool,
) -> Result<()> {
    let conversation_id = target(state, user_id, conversation).await?;
    let mut outcome = state
        .governor
        .send_message(user_id, conversation_id, message)
        .await
        .map_err(explain)?;

    let mut rollover = None;
    if let SendOutcome::RolledOver {
        previous_id,
        conversation,
        summary_memory,
    } = &outcome
    {
        rollover = Some(serde_json::json!({
            "previous_conversation_id": previous_id,
            "conversation_id": conversation.id,
            "summary": summary_memory.content,
        }));
        if !json {
            println!();
            println!(
                "  {} Conversation {} reached {} messages; continuing in '{}'",
                style("↻").yellow().bold(),
                short_id(previous_id),
                state.governor.thresholds().hard(),
                style(&conversation.title).cyan()
            );
            println!("  {}", style(truncate(&summary_memory.content, 100)).dim());
        }
        let successor = conversation.id;
        outcome = state
            .governor
            .send_message(user_id, successor, message)
            .await
            .map_err(explain)?;
    }

    let SendOutcome::Appended {
        conversation,
        state: session_state,
        memory,
    } = outcome
    else {
        anyhow::bail!("conversation rolled over twice in a row");
    };

    if json {
        return print_json(&serde_json::json!({
            "conversation_id": conversation.id,
            "message_count": conversation.message_count(),
            "state": session_state,
            "memory": memory,
            "rollover": rollover,
        }));
    }

    println!();
    println!(
        "  {} Sent to '{}' ({} messages)",
        style("✓").green().bold(),
        style(&conversation.title).cyan(),
        conversation.message_count()
    );
    println!(
        "  Remembered: {} {}",
        style(truncate(&memory.summary, 60)).white(),
        style(format!("[importance {}]", memory.importance)).dim()
    );
    if session_state == SessionState::Warning {
        let remaining = state
            .governor
            .thresholds()
            .hard()
            .saturating_sub(conversation.message_count());
        println!(
            "  {} {} sends left before this conversation is summarized and continued",
            style("!").yellow().bold(),
            remaining
        );
    }
    println!();
    Ok(())
}

/// Add a hint to errors the user can act on.
fn explain(err: ChatError) -> anyhow::Error {
    if let ChatError::Superseded { successor, .. } = &err {
        let hint = format!("resubmit with --conversation {successor}");
        return anyhow::Error::new(err).context(hint);
    }
    anyhow::Error::new(err)
}

fn print_status(status: &SessionStatus) {
    let state_label = match status.state {
        SessionState::Normal => style("normal").green(),
        SessionState::Warning => style("warning").yellow(),
        SessionState::Critical => style("critical").red(),
    };
    println!();
    println!("  Conversation {}", style(status.conversation_id).bold());
    println!(
        "  Messages: {} (warn at {}, roll over at {})",
        style(status.message_count).bold(),
        status.soft_threshold,
        status.hard_threshold
    );
    println!("  State:    {state_label}");
    match status.superseded_by {
        Some(successor) => println!(
            "  {} Continued in {}",
            style("→").dim(),
            style(successor).cyan()
        ),
        None => println!("  Remaining sends: {}", status.remaining),
    }
    println!();
}
