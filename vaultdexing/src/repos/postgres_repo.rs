use diesel::OptionalExtension;
use diesel::{sql_query, ExpressionMethods, QueryDsl};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use futures_core::future::BoxFuture;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_postgres::{AsyncMessage, NoTls};

use crate::blocks::{Block, UnsavedBlock, STATUS_MINED, STATUS_REVERTED};
use crate::events::{Event, UnsavedEvent};
use crate::vaults::{UnsavedVaultRegistryEntry, VaultRegistryEntry};

use super::repo::{
    Migratable, NotifiesNewVaults, Repo, RepoError, RepoMigrations, SQLikeMigrations,
    NEW_VAULT_CHANNEL,
};

pub type Conn<'a> = bb8::PooledConnection<'a, AsyncDieselConnectionManager<AsyncPgConnection>>;
pub type Pool = bb8::Pool<AsyncDieselConnectionManager<AsyncPgConnection>>;

#[derive(Clone)]
pub struct PostgresRepo {
    url: String,
    pool: Pool,
}

#[async_trait::async_trait]
impl Repo for PostgresRepo {
    type Pool = Pool;
    type Conn<'a> = Conn<'a>;

    async fn new(url: &str) -> Result<Self, RepoError> {
        let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(url);
        let pool = bb8::Pool::builder()
            .build(manager)
            .await
            .map_err(|_| RepoError::NotConnected)?;

        Ok(Self {
            url: url.to_string(),
            pool,
        })
    }

    async fn get_pool(&self) -> Pool {
        self.pool.clone()
    }

    async fn get_conn<'a>(pool: &'a Pool) -> Result<Conn<'a>, RepoError> {
        pool.get().await.map_err(|_| RepoError::NotConnected)
    }

    async fn run_in_transaction<'a, F>(conn: &mut Conn<'a>, repo_ops: F) -> Result<(), RepoError>
    where
        F: for<'b> FnOnce(&'b mut Conn<'a>) -> BoxFuture<'b, Result<(), RepoError>>
            + Send
            + Sync
            + 'a,
    {
        conn.transaction::<(), RepoError, _>(|transaction_conn| {
            async move { (repo_ops)(transaction_conn).await }.scope_boxed()
        })
        .await
    }

    async fn execute_raw_query<'a>(conn: &mut Conn<'a>, query: &str) -> Result<(), RepoError> {
        sql_query(query).execute(conn).await?;

        Ok(())
    }

    async fn create_block<'a>(conn: &mut Conn<'a>, block: &UnsavedBlock) -> Result<(), RepoError> {
        use crate::diesel::schema::blocks::dsl::blocks;

        diesel::insert_into(blocks).values(block).execute(conn).await?;

        Ok(())
    }

    async fn create_blocks<'a>(
        conn: &mut Conn<'a>,
        block_batch: &[UnsavedBlock],
    ) -> Result<(), RepoError> {
        use crate::diesel::schema::blocks::dsl::blocks;

        diesel::insert_into(blocks).values(block_batch).execute(conn).await?;

        Ok(())
    }

    async fn mark_block_reverted<'a>(
        conn: &mut Conn<'a>,
        block_number_: i64,
        block_hash_: &str,
    ) -> Result<(), RepoError> {
        use crate::diesel::schema::blocks::dsl::{block_hash, block_number, blocks, status};

        diesel::update(blocks.filter(block_number.eq(block_number_)).filter(block_hash.eq(block_hash_)))
            .set(status.eq(STATUS_REVERTED))
            .execute(conn)
            .await?;

        Ok(())
    }

    async fn get_last_mined_block<'a>(conn: &mut Conn<'a>) -> Result<Option<Block>, RepoError> {
        use crate::diesel::schema::blocks::dsl::{block_number, blocks, status};

        let block = blocks
            .filter(status.eq(STATUS_MINED))
            .order(block_number.desc())
            .first::<Block>(conn)
            .await
            .optional()?;

        Ok(block)
    }

    async fn get_block_by_hash<'a>(
        conn: &mut Conn<'a>,
        block_hash_: &str,
    ) -> Result<Option<Block>, RepoError> {
        use crate::diesel::schema::blocks::dsl::{block_hash, blocks};

        let block = blocks.filter(block_hash.eq(block_hash_)).first::<Block>(conn).await.optional()?;

        Ok(block)
    }

    async fn get_next_block_by_parent_hash<'a>(
        conn: &mut Conn<'a>,
        parent_hash_: &str,
    ) -> Result<Option<Block>, RepoError> {
        use crate::diesel::schema::blocks::dsl::{blocks, parent_hash, status};

        let block = blocks
            .filter(parent_hash.eq(parent_hash_))
            .filter(status.eq(STATUS_MINED))
            .first::<Block>(conn)
            .await
            .optional()?;

        Ok(block)
    }

    async fn create_vault<'a>(
        conn: &mut Conn<'a>,
        vault: &UnsavedVaultRegistryEntry,
    ) -> Result<(), RepoError> {
        use crate::diesel::schema::vault_registry::dsl::{address, vault_registry};

        diesel::insert_into(vault_registry)
            .values(vault)
            .on_conflict(address)
            .do_nothing()
            .execute(conn)
            .await?;

        Ok(())
    }

    async fn get_all_vaults<'a>(conn: &mut Conn<'a>) -> Result<Vec<VaultRegistryEntry>, RepoError> {
        use crate::diesel::schema::vault_registry::dsl::{id, vault_registry};

        let vaults = vault_registry.order(id.asc()).load::<VaultRegistryEntry>(conn).await?;

        Ok(vaults)
    }

    async fn get_vault_by_address<'a>(
        conn: &mut Conn<'a>,
        address_: &str,
    ) -> Result<Option<VaultRegistryEntry>, RepoError> {
        use crate::diesel::schema::vault_registry::dsl::{address, vault_registry};

        let vault = vault_registry
            .filter(address.eq(address_))
            .first::<VaultRegistryEntry>(conn)
            .await
            .optional()?;

        Ok(vault)
    }

    async fn update_vault_last_indexed<'a>(
        conn: &mut Conn<'a>,
        address_: &str,
        block_hash: &str,
    ) -> Result<(), RepoError> {
        use crate::diesel::schema::vault_registry::dsl::{
            address, last_block_indexed, vault_registry,
        };

        diesel::update(vault_registry.filter(address.eq(address_)))
            .set(last_block_indexed.eq(block_hash))
            .execute(conn)
            .await?;

        Ok(())
    }

    async fn rewind_vaults_last_indexed<'a>(
        conn: &mut Conn<'a>,
        reverted_hash: &str,
        parent_hash: &str,
    ) -> Result<(), RepoError> {
        use crate::diesel::schema::vault_registry::dsl::{last_block_indexed, vault_registry};

        diesel::update(vault_registry.filter(last_block_indexed.eq(reverted_hash)))
            .set(last_block_indexed.eq(parent_hash))
            .execute(conn)
            .await?;

        Ok(())
    }

    async fn append_event<'a>(conn: &mut Conn<'a>, event: &UnsavedEvent) -> Result<(), RepoError> {
        use diesel::sql_types::{BigInt, Json, Text};

        sql_query(
            "INSERT INTO events
            (transaction_hash, vault_address, block_number, event_name, event_keys, event_data, event_count)
            SELECT $1, $2, $3, $4, $5, $6, COALESCE(MAX(event_count), 0) + 1
            FROM events WHERE vault_address = $2",
        )
        .bind::<Text, _>(&event.transaction_hash)
        .bind::<Text, _>(&event.vault_address)
        .bind::<BigInt, _>(event.block_number)
        .bind::<Text, _>(&event.event_name)
        .bind::<Json, _>(&event.event_keys)
        .bind::<Json, _>(&event.event_data)
        .execute(conn)
        .await?;

        Ok(())
    }

    async fn get_all_events<'a>(conn: &mut Conn<'a>) -> Result<Vec<Event>, RepoError> {
        use crate::diesel::schema::events::dsl::{block_number, events, id};

        let all_events =
            events.order((block_number.asc(), id.asc())).load::<Event>(conn).await?;

        Ok(all_events)
    }

    async fn get_events_for_vault<'a>(
        conn: &mut Conn<'a>,
        address: &str,
    ) -> Result<Vec<Event>, RepoError> {
        use crate::diesel::schema::events::dsl::{event_count, events, vault_address};

        let vault_events = events
            .filter(vault_address.eq(address))
            .order(event_count.asc())
            .load::<Event>(conn)
            .await?;

        Ok(vault_events)
    }

    async fn delete_events_at_block<'a>(
        conn: &mut Conn<'a>,
        block_number_: i64,
    ) -> Result<(), RepoError> {
        use crate::diesel::schema::events::dsl::{block_number, events};

        diesel::delete(events.filter(block_number.eq(block_number_))).execute(conn).await?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl NotifiesNewVaults for PostgresRepo {
    async fn subscribe_to_new_vaults(
        &self,
    ) -> Result<mpsc::UnboundedReceiver<VaultRegistryEntry>, RepoError> {
        let (client, mut connection) = tokio_postgres::connect(&self.url, NoTls).await?;
        let (sender, receiver) = mpsc::unbounded_channel();

        let forwarder = sender.clone();
        tokio::spawn(async move {
            let mut messages =
                futures_util::stream::poll_fn(move |cx| connection.poll_message(cx));

            while let Some(message) = messages.next().await {
                match message {
                    Ok(AsyncMessage::Notification(notification))
                        if notification.channel() == NEW_VAULT_CHANNEL =>
                    {
                        match serde_json::from_str::<VaultRegistryEntry>(notification.payload()) {
                            Ok(vault) => {
                                if forwarder.send(vault).is_err() {
                                    break;
                                }
                            }
                            Err(error) => {
                                tracing::warn!("discarding malformed new-vault payload: {error}")
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(error) => {
                        tracing::error!("new-vault subscription connection failed: {error}");
                        break;
                    }
                }
            }
        });

        client.batch_execute(&format!("LISTEN {NEW_VAULT_CHANNEL}")).await?;

        // The session's LISTEN lives exactly as long as this client; park it
        // until every receiver is gone.
        tokio::spawn(async move {
            sender.closed().await;
            drop(client);
        });

        Ok(receiver)
    }
}

impl Migratable for PostgresRepo {}

impl RepoMigrations for PostgresRepo {
    fn create_blocks_migration() -> &'static [&'static str] {
        SQLikeMigrations::create_blocks()
    }

    fn create_vault_registry_migration() -> &'static [&'static str] {
        SQLikeMigrations::create_vault_registry()
    }

    fn create_events_migration() -> &'static [&'static str] {
        SQLikeMigrations::create_events()
    }

    fn create_new_vault_channel_migration() -> &'static [&'static str] {
        SQLikeMigrations::create_new_vault_channel()
    }
}
