//! Store and configuration overview.

use anyhow::Result;
use console::style;

use memora_core::store::stats::StoreStats;

use crate::state::AppState;

pub async fn status(state: &AppState, json: bool) -> Result<()> {
    let stats = StoreStats::collect(state.store.as_ref()).await?;
    let thresholds = state.governor.thresholds();

    if json {
        let status = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "data_dir": state.data_dir.display().to_string(),
            "records": stats,
            "session": {
                "soft_threshold": thresholds.soft(),
                "hard_threshold": thresholds.hard(),
            },
            "provider": state.provider_name,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!();
    println!("  {} Memora v{}", style("◆").cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!();

    println!("  {}", style("── Records ──").dim());
    println!("  Users:         {}", style(stats.users).bold());
    println!("  Conversations: {}", style(stats.conversations).bold());
    println!("  Memories:      {}", style(stats.memories).bold());
    println!();

    println!("  {}", style("── Sessions ──").dim());
    println!("  Warn at:      {} messages", thresholds.soft());
    println!("  Roll over at: {} messages", thresholds.hard());
    println!();

    println!("  {}", style("── System ──").dim());
    match &state.provider_name {
        Some(name) => println!("  Provider: {}", style(name).green()),
        None => println!("  Provider: {}", style("rule-based (no LLM configured)").dim()),
    }
    println!("  Data dir: {}", style(state.data_dir.display()).dim());
    println!("  Database: {}", style("SQLite (WAL mode)").dim());
    println!();

    Ok(())
}
