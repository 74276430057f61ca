#[cfg(feature = "postgres")]
mod postgres_repo;
mod repo;

#[cfg(feature = "postgres")]
pub use diesel_async::AsyncConnection as PostgresRepoAsyncConnection;
#[cfg(feature = "postgres")]
pub use postgres_repo::{Conn as PostgresRepoConn, Pool as PostgresRepoPool, PostgresRepo};
pub use repo::{
    Migratable, NotifiesNewVaults, Repo, RepoError, RepoMigrations, SQLikeMigrations,
    NEW_VAULT_CHANNEL,
};
