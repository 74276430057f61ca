pub mod block_processor;
mod blocks;
mod config;
mod diesel;
pub mod events;
pub mod felts;
mod listener;
pub mod notifications;
pub mod provider;
mod repos;
pub mod vault_manager;
mod vaults;

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

pub use blocks::{
    Block, BlockHeader, NewBlock, RawEvent, TransactionReceipt, UnsavedBlock, STATUS_MINED,
    STATUS_REVERTED,
};
pub use config::{Config, ConfigError};
pub use events::{Event, UnsavedEvent, VaultEventKind};
pub use felts::{Felt, FeltError};
pub use notifications::EngineNotification;
pub use provider::{JsonRpcProvider, Provider, ProviderError};
pub use repos::*;
pub use vault_manager::IndexingError;
pub use vaults::{UnsavedVaultRegistryEntry, VaultRegistryEntry};

use block_processor::ProcessorContext;
use notifications::Publisher;
use vault_manager::DeploymentFilter;

#[cfg(feature = "postgres")]
pub use repos::{PostgresRepo, PostgresRepoConn, PostgresRepoPool};

#[cfg(feature = "postgres")]
pub use repos::PostgresRepoAsyncConnection as VaultdexingRepoAsyncConnection;

#[cfg(feature = "postgres")]
pub type VaultdexingRepo = PostgresRepo;

#[cfg(feature = "postgres")]
pub type VaultdexingRepoPool = PostgresRepoPool;

#[cfg(feature = "postgres")]
pub type VaultdexingRepoConn<'a> = PostgresRepoConn<'a>;

pub enum EngineError {
    Config(ConfigError),
    Repo(RepoError),
    Indexing(IndexingError),
}

impl std::fmt::Debug for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Config(config_error) => {
                write!(f, "Config Error: {:?}", config_error)
            }
            EngineError::Repo(repo_error) => {
                write!(f, "Repo Error: {}", repo_error)
            }
            EngineError::Indexing(indexing_error) => {
                write!(f, "Indexing Error: {}", indexing_error)
            }
        }
    }
}

impl From<ConfigError> for EngineError {
    fn from(value: ConfigError) -> Self {
        EngineError::Config(value)
    }
}

impl From<RepoError> for EngineError {
    fn from(value: RepoError) -> Self {
        EngineError::Repo(value)
    }
}

impl From<IndexingError> for EngineError {
    fn from(value: IndexingError) -> Self {
        EngineError::Indexing(value)
    }
}

/// The in-memory cursor: a derived index over the store, rebuilt at startup
/// and refreshed whenever it goes stale. Never the source of truth.
pub struct EngineState {
    pub last_block: Option<Block>,
    pub vault_addresses: HashSet<String>,
}

struct EngineInner<P: Provider> {
    config: Config,
    pool: VaultdexingRepoPool,
    provider: Arc<P>,
    deployment_filter: DeploymentFilter,
    state: Mutex<EngineState>,
    notifications: Publisher,
}

/// One explicitly constructed engine instance, owned by the host. Both host
/// callbacks and the background listener serialize behind its single state
/// lock.
pub struct Engine<P: Provider> {
    inner: Arc<EngineInner<P>>,
}

impl<P: Provider> Clone for Engine<P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<P: Provider + 'static> Engine<P> {
    /// Host callback for a freshly mined block.
    pub async fn on_new_block(&self, block: &NewBlock) -> Result<(), IndexingError> {
        if block.header.block_number < self.inner.config.start_block_number {
            return Ok(());
        }

        let mut state = self.inner.state.lock().await;
        let mut conn = VaultdexingRepo::get_conn(&self.inner.pool).await?;

        block_processor::on_new_block(&self.processor_context(), &mut conn, &mut state, block)
            .await
    }

    /// Host callback for a reorged-out block.
    pub async fn on_revert_block(&self, block: &NewBlock) -> Result<(), IndexingError> {
        let mut state = self.inner.state.lock().await;
        let mut conn = VaultdexingRepo::get_conn(&self.inner.pool).await?;

        block_processor::on_revert_block(&self.processor_context(), &mut conn, &mut state, block)
            .await
    }

    pub async fn is_vault_address(&self, address: &str) -> bool {
        let Ok(address) = felts::normalize(address) else {
            return false;
        };

        let state = self.inner.state.lock().await;
        vault_manager::is_vault_address(&state, &address)
    }

    pub async fn get_vault_addresses(&self) -> Vec<String> {
        let state = self.inner.state.lock().await;
        vault_manager::get_vault_addresses(&state)
    }

    pub(crate) fn repo(&self) -> &VaultdexingRepo {
        &self.inner.config.repo
    }

    pub(crate) async fn handle_registration(
        &self,
        vault: &VaultRegistryEntry,
    ) -> Result<(), IndexingError> {
        let address = felts::normalize(&vault.address)
            .map_err(|_| IndexingError::InvalidVaultAddress(vault.address.clone()))?;

        let mut state = self.inner.state.lock().await;
        if vault_manager::is_vault_address(&state, &address) {
            // The engine registered this vault itself while processing its
            // deployment block; the notification is an echo.
            return Ok(());
        }

        let mut conn = VaultdexingRepo::get_conn(&self.inner.pool).await?;
        vault_manager::initialize_vault(
            &mut conn,
            &self.inner.provider,
            &self.inner.deployment_filter,
            &mut state,
            vault,
        )
        .await?;

        self.inner
            .notifications
            .publish(EngineNotification::VaultRegistered { address })
            .await;

        Ok(())
    }

    fn processor_context(&self) -> ProcessorContext<'_, P> {
        ProcessorContext {
            provider: &self.inner.provider,
            filter: &self.inner.deployment_filter,
            start_block_number: self.inner.config.start_block_number,
            blocks_per_window: self.inner.config.blocks_per_window,
            max_concurrent_block_fetches: self.inner.config.max_concurrent_block_fetches,
            notifications: &self.inner.notifications,
        }
    }

    /// Startup reconciliation: every registered vault that is not caught up
    /// to the recorded head gets a catchup pass; rows that never saw their
    /// deployment processed get full initialization.
    async fn catchup_registered_vaults(&self) -> Result<(), IndexingError> {
        let mut state = self.inner.state.lock().await;
        let Some(head) = state.last_block.clone() else {
            return Ok(());
        };

        let mut conn = VaultdexingRepo::get_conn(&self.inner.pool).await?;
        let vaults = VaultdexingRepo::get_all_vaults(&mut conn).await?;

        for vault in &vaults {
            match &vault.last_block_indexed {
                None => {
                    vault_manager::initialize_vault(
                        &mut conn,
                        &self.inner.provider,
                        &self.inner.deployment_filter,
                        &mut state,
                        vault,
                    )
                    .await?;
                }
                Some(last_indexed) if *last_indexed != head.block_hash => {
                    let address = felts::normalize(&vault.address)
                        .map_err(|_| IndexingError::InvalidVaultAddress(vault.address.clone()))?;
                    vault_manager::catchup_vault(
                        &mut conn,
                        &self.inner.provider,
                        &address,
                        head.number(),
                    )
                    .await?;
                }
                _ => {}
            }
        }

        Ok(())
    }
}

/// Builds and starts an engine against the configured JSON-RPC endpoint.
pub async fn start(
    config: Config,
) -> Result<(Engine<JsonRpcProvider>, mpsc::Receiver<EngineNotification>), EngineError> {
    let provider = provider::get(&config.json_rpc_url);

    start_with_provider(config, provider).await
}

/// Like [`start`] but with a caller-supplied chain client.
pub async fn start_with_provider<P: Provider + 'static>(
    config: Config,
    provider: Arc<P>,
) -> Result<(Engine<P>, mpsc::Receiver<EngineNotification>), EngineError> {
    config.validate()?;
    let deployment_filter = DeploymentFilter::new(&config)?;

    let pool = config.repo.get_pool().await;
    {
        let mut conn = VaultdexingRepo::get_conn(&pool).await?;
        VaultdexingRepo::migrate(&mut conn, VaultdexingRepo::get_internal_migrations()).await?;
    }

    let mut conn = VaultdexingRepo::get_conn(&pool).await?;
    let last_block = VaultdexingRepo::get_last_mined_block(&mut conn).await?;
    let vaults = VaultdexingRepo::get_all_vaults(&mut conn).await?;
    drop(conn);

    let mut vault_addresses = HashSet::new();
    for vault in &vaults {
        let address = felts::normalize(&vault.address)
            .map_err(|_| IndexingError::InvalidVaultAddress(vault.address.clone()))?;
        vault_addresses.insert(address);
    }

    let (publisher, receiver) = Publisher::new(
        config.notification_channel_size,
        config.notification_timeout,
    );

    let engine = Engine {
        inner: Arc::new(EngineInner {
            config,
            pool,
            provider,
            deployment_filter,
            state: Mutex::new(EngineState {
                last_block,
                vault_addresses,
            }),
            notifications: publisher,
        }),
    };

    engine.catchup_registered_vaults().await?;
    listener::start(engine.clone()).await?;

    Ok((engine, receiver))
}
