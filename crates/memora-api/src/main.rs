//! Memora CLI entry point.
//!
//! Binary name: `memora`
//!
//! Parses arguments, sets up tracing, opens the data directory, then
//! dispatches to the command handler.

mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;

use cli::{Cli, Commands};
use memora_observe::tracing_setup::{TracingOptions, init_tracing, shutdown_tracing};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut tracing_options = TracingOptions::from_verbosity(cli.verbose, cli.quiet);
    tracing_options.json = cli.log_json;
    tracing_options.otel = cli.otel;
    if let Err(e) = init_tracing(&tracing_options) {
        eprintln!("Warning: tracing setup failed: {e}");
    }

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "memora", &mut std::io::stdout());
        return Ok(());
    }

    let state = AppState::init().await?;
    let result = run(cli.command, &state, cli.json).await;

    shutdown_tracing();
    result
}

async fn run(command: Commands, state: &AppState, json: bool) -> anyhow::Result<()> {
    match command {
        Commands::User { action } => cli::user::handle_user_command(action, state, json).await,
        Commands::Chat { action } => cli::chat::handle_chat_command(action, state, json).await,
        Commands::Conversation { action } => {
            cli::conversation::handle_conversation_command(action, state, json).await
        }
        Commands::Memory { action } => cli::memory::handle_memory_command(action, state, json).await,
        Commands::Backup { action } => cli::backup::handle_backup_command(action, state, json).await,
        Commands::Account { action } => {
            cli::account::handle_account_command(action, state, json).await
        }
        Commands::Status => cli::status::status(state, json).await,
        Commands::Completions { .. } => Ok(()),
    }
}
