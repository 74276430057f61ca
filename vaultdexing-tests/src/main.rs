use vaultdexing::{Migratable, Repo, RepoMigrations, VaultdexingRepo};
use vaultdexing_tests::db;

#[tokio::main]
async fn main() {
    db::setup();

    let repo = VaultdexingRepo::new(db::database_url().as_str()).await.unwrap();
    let pool = repo.get_pool().await;
    let mut conn = VaultdexingRepo::get_conn(&pool).await.unwrap();

    VaultdexingRepo::migrate(&mut conn, VaultdexingRepo::get_internal_migrations()).await.unwrap();
}
