use crate::db;
use crate::factory::{DEPLOYER_ADDRESS, FACTORY_ADDRESS, VAULT_CLASS_HASH};
use dotenvy::dotenv;
use std::env;
use std::future::Future;
use vaultdexing::{
    Config, Migratable, Repo, RepoMigrations, VaultdexingRepo, VaultdexingRepoAsyncConnection,
    VaultdexingRepoConn, VaultdexingRepoPool,
};

pub async fn get_pool() -> VaultdexingRepoPool {
    new_repo().await.get_pool().await
}

pub async fn run_test<'a, TestFn, Fut>(pool: &'a VaultdexingRepoPool, test_fn: TestFn)
where
    TestFn: Fn(VaultdexingRepoConn<'a>) -> Fut,
    Fut: Future<Output = ()>,
{
    let mut conn = VaultdexingRepo::get_conn(pool).await.unwrap();

    if should_setup_test_db() {
        db::setup();

        VaultdexingRepo::migrate(&mut conn, VaultdexingRepo::get_internal_migrations())
            .await
            .unwrap();
    }

    conn.begin_test_transaction().await.unwrap();

    test_fn(conn).await;
}

pub async fn new_repo() -> VaultdexingRepo {
    VaultdexingRepo::new(db::database_url().as_str()).await.unwrap()
}

pub async fn test_config() -> Config {
    Config::new(
        new_repo().await,
        "http://localhost:5050",
        FACTORY_ADDRESS,
        VAULT_CLASS_HASH,
        DEPLOYER_ADDRESS,
    )
}

fn should_setup_test_db() -> bool {
    dotenv().ok();

    env::var("SETUP_TEST_DB").is_ok()
}
