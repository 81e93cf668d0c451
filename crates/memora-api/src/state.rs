//! Application state wiring all services together.
//!
//! Services are generic over the record store and snapshot cipher traits;
//! AppState pins them to the SQLite store and the AES-256-GCM vault.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use memora_core::account::AccountService;
use memora_core::chat::governor::SessionGovernor;
use memora_core::chat::service::ConversationService;
use memora_core::chat::session::SessionThresholds;
use memora_core::chat::summarizer::ConversationSummarizer;
use memora_core::memory::bank::MemoryBank;
use memora_core::memory::extractor::MemoryExtractor;
use memora_infra::config::{load_global_config, resolve_data_dir};
use memora_infra::crypto::vault::VaultCrypto;
use memora_infra::llm::provider_from_env;
use memora_infra::sqlite::pool::DatabasePool;
use memora_infra::sqlite::record::SqliteRecordStore;
use memora_types::config::GlobalConfig;

pub type ConcreteGovernor = SessionGovernor<SqliteRecordStore>;
pub type ConcreteConversationService = ConversationService<SqliteRecordStore>;
pub type ConcreteMemoryBank = MemoryBank<SqliteRecordStore>;
pub type ConcreteAccountService = AccountService<SqliteRecordStore, VaultCrypto>;

/// Shared application state holding all services.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SqliteRecordStore>,
    pub governor: Arc<ConcreteGovernor>,
    pub conversations: Arc<ConcreteConversationService>,
    pub memory_bank: Arc<ConcreteMemoryBank>,
    pub accounts: Arc<ConcreteAccountService>,
    pub config: GlobalConfig,
    /// Name of the text-generation provider, `None` in rule-based mode.
    pub provider_name: Option<String>,
    pub data_dir: PathBuf,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        Self::init_in(resolve_data_dir()).await
    }

    /// Initialize against an explicit data directory: load config, open
    /// the database, resolve the backup key, and wire services.
    pub async fn init_in(data_dir: PathBuf) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;

        let config = load_global_config(&data_dir).await;

        let pool = DatabasePool::open_in(&data_dir)
            .await
            .context("Failed to open the record store")?;
        let store = Arc::new(SqliteRecordStore::new(pool));

        let vault = VaultCrypto::from_config(&config.backup, &data_dir)
            .context("Failed to resolve the backup key")?;

        let provider = config
            .llm
            .as_ref()
            .and_then(|llm| provider_from_env(llm).map(|p| (Arc::new(p), llm)));

        let (extractor, summarizer, provider_name) = match provider {
            Some((provider, llm)) => {
                let timeout = Duration::from_secs(llm.timeout_secs);
                (
                    MemoryExtractor::with_provider(Arc::clone(&provider), &llm.model, timeout),
                    ConversationSummarizer::with_provider(Arc::clone(&provider), &llm.model, timeout),
                    Some(provider.name().to_string()),
                )
            }
            None => (
                MemoryExtractor::rule_based(),
                ConversationSummarizer::rule_based(),
                None,
            ),
        };

        let thresholds = SessionThresholds::from_config(&config.session);
        let governor = SessionGovernor::new(
            Arc::clone(&store),
            thresholds,
            extractor.clone(),
            summarizer,
        );

        let conversations =
            ConversationService::new(Arc::clone(&store)).with_locks(governor.locks().clone());

        Ok(Self {
            governor: Arc::new(governor),
            conversations: Arc::new(conversations),
            memory_bank: Arc::new(MemoryBank::new(Arc::clone(&store), extractor)),
            accounts: Arc::new(AccountService::new(Arc::clone(&store), Arc::new(vault))),
            store,
            config,
            provider_name,
            data_dir,
        })
    }
}
