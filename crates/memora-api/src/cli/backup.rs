//! Whole-store backup commands.
//!
//! The artifact is a single base64 line. `export` writes it to a file or
//! stdout; `import` replaces every record in the store with its contents.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use console::style;
use dialoguer::Confirm;

use super::print_json;
use crate::state::AppState;

#[derive(Subcommand)]
pub enum BackupCommand {
    /// Write an encrypted backup of every record.
    Export {
        /// Destination file (stdout when omitted).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Replace the store with the contents of a backup.
    Import {
        file: PathBuf,

        /// Skip confirmation prompt.
        #[arg(long)]
        force: bool,
    },
}

pub async fn handle_backup_command(cmd: BackupCommand, state: &AppState, json: bool) -> Result<()> {
    let codec = state.accounts.codec();
    match cmd {
        BackupCommand::Export { output } => {
            let artifact = codec.export().await.context("Backup export failed")?;
            match output {
                Some(path) => {
                    tokio::fs::write(&path, &artifact)
                        .await
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    if json {
                        return print_json(&serde_json::json!({
                            "path": path.display().to_string(),
                            "bytes": artifact.len(),
                        }));
                    }
                    println!(
                        "  {} Backup written to {}",
                        style("✓").green().bold(),
                        style(path.display()).cyan()
                    );
                }
                None if json => print_json(&serde_json::json!({ "backup": artifact }))?,
                None => println!("{artifact}"),
            }
        }

        BackupCommand::Import { file, force } => {
            let artifact = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;

            if !force && !json {
                let confirmed = Confirm::new()
                    .with_prompt(format!(
                        "Replace {} with this backup?",
                        style("every record in the store").red().bold()
                    ))
                    .default(false)
                    .interact()?;
                if !confirmed {
                    println!("  Cancelled.");
                    return Ok(());
                }
            }

            let restored = codec
                .import(&artifact)
                .await
                .context("Backup import failed; the store was left unchanged")?;
            if json {
                return print_json(&serde_json::json!({ "restored": restored }));
            }
            println!(
                "  {} Restored {} records",
                style("✓").green().bold(),
                style(restored).bold()
            );
        }
    }
    Ok(())
}
