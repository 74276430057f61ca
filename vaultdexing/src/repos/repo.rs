use derive_more::Display;

use futures_core::future::BoxFuture;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::blocks::{Block, UnsavedBlock};
use crate::events::{Event, UnsavedEvent};
use crate::vaults::{UnsavedVaultRegistryEntry, VaultRegistryEntry};

/// Postgres NOTIFY channel carrying newly registered vault rows as JSON.
pub const NEW_VAULT_CHANNEL: &str = "new_vault";

#[derive(Debug, Display)]
pub enum RepoError {
    NotConnected,
    #[display("repo error: {_0}")]
    Unknown(String),
}

impl From<diesel::result::Error> for RepoError {
    fn from(error: diesel::result::Error) -> Self {
        RepoError::Unknown(error.to_string())
    }
}

#[cfg(feature = "postgres")]
impl From<tokio_postgres::Error> for RepoError {
    fn from(error: tokio_postgres::Error) -> Self {
        RepoError::Unknown(error.to_string())
    }
}

#[async_trait::async_trait]
pub trait Repo: Sync + Send + Clone {
    type Pool;
    type Conn<'a>: Send;

    async fn new(url: &str) -> Result<Self, RepoError>
    where
        Self: Sized;

    async fn get_pool(&self) -> Self::Pool;
    async fn get_conn<'a>(pool: &'a Self::Pool) -> Result<Self::Conn<'a>, RepoError>;

    async fn run_in_transaction<'a, F>(
        conn: &mut Self::Conn<'a>,
        repo_ops: F,
    ) -> Result<(), RepoError>
    where
        F: for<'b> FnOnce(&'b mut Self::Conn<'a>) -> BoxFuture<'b, Result<(), RepoError>>
            + Send
            + Sync
            + 'a;

    async fn execute_raw_query<'a>(conn: &mut Self::Conn<'a>, query: &str)
        -> Result<(), RepoError>;

    async fn create_block<'a>(
        conn: &mut Self::Conn<'a>,
        block: &UnsavedBlock,
    ) -> Result<(), RepoError>;
    async fn create_blocks<'a>(
        conn: &mut Self::Conn<'a>,
        blocks: &[UnsavedBlock],
    ) -> Result<(), RepoError>;
    async fn mark_block_reverted<'a>(
        conn: &mut Self::Conn<'a>,
        block_number: i64,
        block_hash: &str,
    ) -> Result<(), RepoError>;
    async fn get_last_mined_block<'a>(
        conn: &mut Self::Conn<'a>,
    ) -> Result<Option<Block>, RepoError>;
    async fn get_block_by_hash<'a>(
        conn: &mut Self::Conn<'a>,
        block_hash: &str,
    ) -> Result<Option<Block>, RepoError>;
    /// Follows the persisted chain's successor link: the MINED block whose
    /// parent hash is the given hash.
    async fn get_next_block_by_parent_hash<'a>(
        conn: &mut Self::Conn<'a>,
        parent_hash: &str,
    ) -> Result<Option<Block>, RepoError>;

    async fn create_vault<'a>(
        conn: &mut Self::Conn<'a>,
        vault: &UnsavedVaultRegistryEntry,
    ) -> Result<(), RepoError>;
    async fn get_all_vaults<'a>(
        conn: &mut Self::Conn<'a>,
    ) -> Result<Vec<VaultRegistryEntry>, RepoError>;
    async fn get_vault_by_address<'a>(
        conn: &mut Self::Conn<'a>,
        address: &str,
    ) -> Result<Option<VaultRegistryEntry>, RepoError>;
    async fn update_vault_last_indexed<'a>(
        conn: &mut Self::Conn<'a>,
        address: &str,
        block_hash: &str,
    ) -> Result<(), RepoError>;
    /// Reorg unwind: every vault whose progress points at the reverted block
    /// is moved back to its parent.
    async fn rewind_vaults_last_indexed<'a>(
        conn: &mut Self::Conn<'a>,
        reverted_hash: &str,
        parent_hash: &str,
    ) -> Result<(), RepoError>;

    /// Appends an event, assigning the next per-vault `event_count` inside
    /// the statement itself.
    async fn append_event<'a>(
        conn: &mut Self::Conn<'a>,
        event: &UnsavedEvent,
    ) -> Result<(), RepoError>;
    async fn get_all_events<'a>(conn: &mut Self::Conn<'a>) -> Result<Vec<Event>, RepoError>;
    async fn get_events_for_vault<'a>(
        conn: &mut Self::Conn<'a>,
        address: &str,
    ) -> Result<Vec<Event>, RepoError>;
    async fn delete_events_at_block<'a>(
        conn: &mut Self::Conn<'a>,
        block_number: i64,
    ) -> Result<(), RepoError>;
}

/// Subscription side of the registration pub/sub primitive. The store emits
/// one message per vault_registry insert.
#[async_trait::async_trait]
pub trait NotifiesNewVaults {
    async fn subscribe_to_new_vaults(
        &self,
    ) -> Result<UnboundedReceiver<VaultRegistryEntry>, RepoError>;
}

#[async_trait::async_trait]
pub trait Migratable: Repo {
    async fn migrate<'a>(
        conn: &mut Self::Conn<'a>,
        migrations: Vec<impl AsRef<str> + Send + Sync + 'a>,
    ) -> Result<(), RepoError>
    where
        Self: Sized,
    {
        for migration in migrations {
            Self::execute_raw_query(conn, migration.as_ref()).await?;
        }

        Ok(())
    }
}

pub trait RepoMigrations: Migratable {
    fn create_blocks_migration() -> &'static [&'static str];
    fn create_vault_registry_migration() -> &'static [&'static str];
    fn create_events_migration() -> &'static [&'static str];
    fn create_new_vault_channel_migration() -> &'static [&'static str];

    fn get_internal_migrations() -> Vec<&'static str> {
        [
            Self::create_blocks_migration(),
            Self::create_vault_registry_migration(),
            Self::create_events_migration(),
            Self::create_new_vault_channel_migration(),
        ]
        .concat()
    }
}

pub struct SQLikeMigrations;

impl SQLikeMigrations {
    pub fn create_blocks() -> &'static [&'static str] {
        &[
            "CREATE TABLE IF NOT EXISTS blocks (
                id SERIAL PRIMARY KEY,
                block_number BIGINT NOT NULL,
                block_hash VARCHAR NOT NULL,
                parent_hash VARCHAR NOT NULL,
                block_timestamp BIGINT NOT NULL,
                status VARCHAR NOT NULL
            )",
            "CREATE UNIQUE INDEX IF NOT EXISTS blocks_block_hash_index
            ON blocks(block_hash)",
            "CREATE INDEX IF NOT EXISTS blocks_block_number_index
            ON blocks(block_number)",
            "CREATE INDEX IF NOT EXISTS blocks_parent_hash_index
            ON blocks(parent_hash)",
        ]
    }

    pub fn create_vault_registry() -> &'static [&'static str] {
        &[
            "CREATE TABLE IF NOT EXISTS vault_registry (
                id SERIAL PRIMARY KEY,
                address VARCHAR NOT NULL,
                deployed_at VARCHAR NOT NULL,
                last_block_indexed VARCHAR,
                last_block_processed VARCHAR
            )",
            "CREATE UNIQUE INDEX IF NOT EXISTS vault_registry_address_index
            ON vault_registry(address)",
        ]
    }

    pub fn create_events() -> &'static [&'static str] {
        &[
            "CREATE TABLE IF NOT EXISTS events (
                id SERIAL PRIMARY KEY,
                transaction_hash VARCHAR NOT NULL,
                vault_address VARCHAR NOT NULL,
                block_number BIGINT NOT NULL,
                event_name VARCHAR NOT NULL,
                event_keys JSON NOT NULL,
                event_data JSON NOT NULL,
                event_count BIGINT NOT NULL,
                inserted_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )",
            "CREATE UNIQUE INDEX IF NOT EXISTS events_vault_sequence_index
            ON events(vault_address, event_count)",
            "CREATE INDEX IF NOT EXISTS events_vault_block_index
            ON events(vault_address, block_number)",
        ]
    }

    pub fn create_new_vault_channel() -> &'static [&'static str] {
        &[
            "CREATE OR REPLACE FUNCTION notify_new_vault() RETURNS trigger AS $$
            BEGIN
                PERFORM pg_notify('new_vault', row_to_json(NEW)::text);
                RETURN NEW;
            END;
            $$ LANGUAGE plpgsql",
            "DROP TRIGGER IF EXISTS vault_registry_notify_new_vault ON vault_registry",
            "CREATE TRIGGER vault_registry_notify_new_vault
            AFTER INSERT ON vault_registry
            FOR EACH ROW EXECUTE FUNCTION notify_new_vault()",
        ]
    }
}
