//! Account commands: export and import a user's envelope, delete a user.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use console::style;
use dialoguer::Confirm;
use uuid::Uuid;

use memora_types::backup::AccountExport;

use super::print_json;
use crate::state::AppState;

#[derive(Subcommand)]
pub enum AccountCommand {
    /// Export a user's profile together with an encrypted store backup.
    Export {
        user_id: Uuid,

        /// Destination file (stdout when omitted).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Restore the store from an account export file.
    Import {
        file: PathBuf,

        #[arg(long)]
        force: bool,
    },

    /// Delete a user with all their conversations and memories.
    Delete {
        user_id: Uuid,

        /// Where to write the pre-deletion backup
        /// (default: `<data_dir>/rollback-<user_id>.backup`).
        #[arg(long)]
        rollback_file: Option<PathBuf>,

        #[arg(long)]
        force: bool,
    },
}

pub async fn handle_account_command(cmd: AccountCommand, state: &AppState, json: bool) -> Result<()> {
    match cmd {
        AccountCommand::Export { user_id, output } => {
            let export = state.accounts.export_account(&user_id).await?;
            let document = serde_json::to_string_pretty(&export)?;
            match output {
                Some(path) => {
                    tokio::fs::write(&path, &document)
                        .await
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    if json {
                        return print_json(&serde_json::json!({ "path": path.display().to_string() }));
                    }
                    println!(
                        "  {} Account exported to {}",
                        style("✓").green().bold(),
                        style(path.display()).cyan()
                    );
                }
                None => println!("{document}"),
            }
        }

        AccountCommand::Import { file, force } => {
            let raw = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let export: AccountExport = serde_json::from_str(&raw)
                .with_context(|| format!("{} is not an account export", file.display()))?;

            if !force && !json {
                let confirmed = Confirm::new()
                    .with_prompt(format!(
                        "Import account '{}'? This replaces every record in the store.",
                        style(&export.user.display_name).cyan()
                    ))
                    .default(false)
                    .interact()?;
                if !confirmed {
                    println!("  Cancelled.");
                    return Ok(());
                }
            }

            let restored = state
                .accounts
                .import_account(&export)
                .await
                .context("Account import failed; the store was left unchanged")?;
            if json {
                return print_json(&serde_json::json!({ "restored": restored }));
            }
            println!(
                "  {} Restored {} records",
                style("✓").green().bold(),
                style(restored).bold()
            );
        }

        AccountCommand::Delete {
            user_id,
            rollback_file,
            force,
        } => {
            let user = state.accounts.get_user(&user_id).await?;
            if !force && !json {
                let confirmed = Confirm::new()
                    .with_prompt(format!(
                        "Permanently delete '{}' and all their conversations and memories?",
                        style(&user.display_name).red().bold()
                    ))
                    .default(false)
                    .interact()?;
                if !confirmed {
                    println!("  Cancelled.");
                    return Ok(());
                }
            }

            let rollback = state.accounts.delete_account(&user_id).await?;
            let path = rollback_file
                .unwrap_or_else(|| state.data_dir.join(format!("rollback-{user_id}.backup")));
            tokio::fs::write(&path, &rollback)
                .await
                .with_context(|| format!("Account deleted but rollback could not be written to {}", path.display()))?;

            if json {
                return print_json(&serde_json::json!({
                    "deleted": user_id,
                    "rollback": path.display().to_string(),
                }));
            }
            println!(
                "  {} Deleted '{}'",
                style("✓").green().bold(),
                style(&user.display_name).cyan()
            );
            println!(
                "  Undo with: memora backup import {}",
                style(path.display()).dim()
            );
        }
    }
    Ok(())
}
