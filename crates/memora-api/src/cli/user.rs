//! User profile commands: create, show, update.

use anyhow::{Context, Result};
use clap::Subcommand;
use console::style;
use uuid::Uuid;

use memora_types::user::{User, UserPatch};

use super::print_json;
use crate::state::AppState;

#[derive(Subcommand)]
pub enum UserCommand {
    /// Create a user.
    Create {
        /// Display name (1 to 100 characters).
        name: String,

        #[arg(long)]
        email: Option<String>,
    },

    /// Show a user's profile.
    Show {
        user_id: Uuid,
    },

    /// Change a user's display name or email.
    Update {
        user_id: Uuid,

        #[arg(long)]
        name: Option<String>,

        #[arg(long, conflicts_with = "clear_email")]
        email: Option<String>,

        /// Remove the stored email address.
        #[arg(long)]
        clear_email: bool,
    },
}

pub async fn handle_user_command(cmd: UserCommand, state: &AppState, json: bool) -> Result<()> {
    match cmd {
        UserCommand::Create { name, email } => {
            let user = state
                .accounts
                .create_user(&name, email)
                .await
                .context("Failed to create user")?;
            if json {
                return print_json(&user);
            }
            println!();
            println!(
                "  {} Created user '{}'",
                style("✓").green().bold(),
                style(&user.display_name).cyan()
            );
            println!("  ID: {}", style(user.id).bold());
            println!();
        }

        UserCommand::Show { user_id } => {
            let user = state.accounts.get_user(&user_id).await?;
            if json {
                return print_json(&user);
            }
            print_user(&user);
        }

        UserCommand::Update {
            user_id,
            name,
            email,
            clear_email,
        } => {
            let patch = UserPatch {
                display_name: name,
                email: if clear_email { Some(None) } else { email.map(Some) },
                ..UserPatch::default()
            };
            let user = state
                .accounts
                .update_user(&user_id, patch)
                .await
                .with_context(|| format!("Failed to update user {user_id}"))?;
            if json {
                return print_json(&user);
            }
            println!();
            println!("  {} Profile updated", style("✓").green().bold());
            print_user(&user);
        }
    }
    Ok(())
}

fn print_user(user: &User) {
    println!();
    println!("  {}", style(&user.display_name).cyan().bold());
    println!("  {}", style("─".repeat(40)).dim());
    println!("  ID:       {}", user.id);
    println!(
        "  Email:    {}",
        user.email.as_deref().unwrap_or("(none)")
    );
    match user.active_conversation_id() {
        Some(id) => println!("  Active:   {id}"),
        None => println!("  Active:   {}", style("(no conversation)").dim()),
    }
    println!(
        "  Created:  {}",
        style(user.created_at.format("%Y-%m-%d %H:%M")).dim()
    );
    println!();
}
