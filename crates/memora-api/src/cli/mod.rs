//! CLI command definitions for the `memora` binary.
//!
//! Noun-verb layout (e.g., `memora chat send`, `memora backup export`).
//! Every handler takes the global `--json` flag and prints either styled
//! text or one pretty-printed JSON document.

pub mod account;
pub mod backup;
pub mod chat;
pub mod conversation;
pub mod memory;
pub mod status;
pub mod user;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Local-first companion memory: users, conversations, and what they remember.
#[derive(Parser)]
#[command(name = "memora", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true, env = "MEMORA_LOG_JSON")]
    pub log_json: bool,

    /// Export tracing spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true, env = "MEMORA_OTEL")]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage user profiles.
    User {
        #[command(subcommand)]
        action: user::UserCommand,
    },

    /// Send messages and check session state.
    Chat {
        #[command(subcommand)]
        action: chat::ChatCommand,
    },

    /// Browse, start, and delete conversations.
    #[command(alias = "conv")]
    Conversation {
        #[command(subcommand)]
        action: conversation::ConversationCommand,
    },

    /// Browse and curate memories.
    Memory {
        #[command(subcommand)]
        action: memory::MemoryCommand,
    },

    /// Encrypted backup of the whole store.
    Backup {
        #[command(subcommand)]
        action: backup::BackupCommand,
    },

    /// Per-user export, import, and deletion.
    Account {
        #[command(subcommand)]
        action: account::AccountCommand,
    },

    /// Store and configuration overview.
    Status,

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

/// Print a value as pretty JSON.
pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Shorten `text` to `max` characters, appending "..." when cut.
pub(crate) fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}

pub(crate) fn short_id(id: &uuid::Uuid) -> String {
    id.to_string()[..8].to_string()
}
