//! Application state wiring all components together.
//!
//! Components are generic over the storage ports; AppState pins them to the
//! SQLite implementations and the stdout effect sink.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use ledgerbot_core::admin::AdminRegistry;
use ledgerbot_core::control::dispatcher::Dispatcher;
use ledgerbot_core::ledger::Ledger;
use ledgerbot_infra::config::load_config;
use ledgerbot_infra::sqlite::admin::SqliteAdminStore;
use ledgerbot_infra::sqlite::ledger::SqliteLedger;
use ledgerbot_infra::sqlite::pool::{DatabasePool, database_url};
use ledgerbot_types::admin::{Principal, Requester};
use ledgerbot_types::config::LedgerConfig;

use crate::sink::StdoutSink;

/// Concrete type alias for the dispatcher pinned to infra implementations.
pub type ConcreteDispatcher = Dispatcher<SqliteLedger, SqliteAdminStore, StdoutSink>;

/// Shared application state used by every CLI command.
pub struct AppState {
    pub dispatcher: Arc<ConcreteDispatcher>,
    pub config: LedgerConfig,
    pub data_dir: PathBuf,
    pub db_pool: DatabasePool,
}

impl AppState {
    /// Connect to the database, load config and wire the components.
    ///
    /// `primary_admin` overrides the configured primary admin when given.
    pub async fn init(data_dir: PathBuf, primary_admin: Option<Principal>) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

        let mut config = load_config(&data_dir).await;
        if let Some(primary) = primary_admin {
            config.primary_admin = primary;
        }

        let db_pool = DatabasePool::new(&database_url(&data_dir))
            .await
            .context("failed to open ledger database")?;

        let ledger = Arc::new(Ledger::new(SqliteLedger::new(db_pool.clone())));
        let admins = AdminRegistry::open(
            SqliteAdminStore::new(db_pool.clone()),
            config.primary_admin.clone(),
        )
        .await?;

        let dispatcher = Dispatcher::new(ledger, Arc::new(admins), StdoutSink::new(), config.clone());

        Ok(Self {
            dispatcher: Arc::new(dispatcher),
            config,
            data_dir,
            db_pool,
        })
    }

    /// The identity operator commands run as: the primary admin.
    pub fn operator(&self) -> Requester {
        match self.dispatcher.admins().primary() {
            Principal::Id(id) => Requester::new(*id),
            Principal::Handle(handle) => Requester::new(0).with_handle(handle.clone()),
        }
    }
}
