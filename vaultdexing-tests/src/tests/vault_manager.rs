#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use crate::factory::{
        block_hash, block_header, deployment_event, deposit_event, emitted, new_block, receipt,
        StubProvider, DEPLOYER_ADDRESS, VAULT_ADDRESS, VAULT_CLASS_HASH,
    };
    use crate::test_runner;
    use vaultdexing::vault_manager::{self, DeploymentFilter, IndexingError};
    use vaultdexing::{
        felts, EngineState, Repo, UnsavedBlock, UnsavedVaultRegistryEntry, VaultdexingRepo,
    };

    #[tokio::test]
    pub async fn skips_deployments_with_a_wrong_class_hash() {
        let config = test_runner::test_config().await;
        let filter = DeploymentFilter::new(&config).unwrap();

        let block = new_block(
            10,
            vec![receipt(
                1,
                vec![deployment_event(VAULT_ADDRESS, DEPLOYER_ADDRESS, "0xdead")],
            )],
        );
        let collected = vault_manager::collect_block_events(&filter, &HashSet::new(), &block);

        assert!(collected.new_vaults.is_empty());
        assert!(collected.events.is_empty());
    }

    #[tokio::test]
    pub async fn skips_deployments_from_a_wrong_deployer() {
        let config = test_runner::test_config().await;
        let filter = DeploymentFilter::new(&config).unwrap();

        let block = new_block(
            10,
            vec![receipt(
                1,
                vec![deployment_event(VAULT_ADDRESS, "0xbeef", VAULT_CLASS_HASH)],
            )],
        );
        let collected = vault_manager::collect_block_events(&filter, &HashSet::new(), &block);

        assert!(collected.new_vaults.is_empty());
    }

    #[tokio::test]
    pub async fn collects_deployments_passing_the_filters() {
        let config = test_runner::test_config().await;
        let filter = DeploymentFilter::new(&config).unwrap();

        let block = new_block(
            10,
            vec![receipt(
                1,
                vec![deployment_event(
                    VAULT_ADDRESS,
                    DEPLOYER_ADDRESS,
                    VAULT_CLASS_HASH,
                )],
            )],
        );
        let collected = vault_manager::collect_block_events(&filter, &HashSet::new(), &block);

        assert_eq!(collected.new_addresses, vec![VAULT_ADDRESS.to_string()]);
        assert_eq!(collected.events.len(), 1);
        assert_eq!(collected.events[0].event_name, "ContractDeployed");
    }

    #[tokio::test]
    pub async fn initializes_externally_registered_vaults() {
        let pool = test_runner::get_pool().await;

        test_runner::run_test(&pool, |mut conn| async move {
            let config = test_runner::test_config().await;
            let filter = DeploymentFilter::new(&config).unwrap();

            let deploy_block = 42;
            let entry = UnsavedVaultRegistryEntry {
                address: VAULT_ADDRESS.to_string(),
                deployed_at: felts::to_hex(&block_hash(deploy_block)),
                last_block_indexed: None,
            };
            VaultdexingRepo::create_vault(&mut conn, &entry).await.unwrap();
            let vault = VaultdexingRepo::get_vault_by_address(&mut conn, VAULT_ADDRESS)
                .await
                .unwrap()
                .unwrap();

            let provider = Arc::new(StubProvider::new().with_chain(40, 45).with_events(vec![
                emitted(
                    &deployment_event(VAULT_ADDRESS, DEPLOYER_ADDRESS, VAULT_CLASS_HASH),
                    deploy_block,
                    9,
                ),
            ]));

            let mut state = EngineState {
                last_block: None,
                vault_addresses: HashSet::new(),
            };
            vault_manager::initialize_vault(&mut conn, &provider, &filter, &mut state, &vault)
                .await
                .unwrap();

            assert!(state.vault_addresses.contains(VAULT_ADDRESS));

            let events = VaultdexingRepo::get_events_for_vault(&mut conn, VAULT_ADDRESS)
                .await
                .unwrap();
            assert_eq!(events.len(), 1);
            assert_eq!(events[0].event_name, "ContractDeployed");
            assert_eq!(events[0].event_count, 1);

            let vault = VaultdexingRepo::get_vault_by_address(&mut conn, VAULT_ADDRESS)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(
                vault.last_block_indexed,
                Some(felts::to_hex(&block_hash(deploy_block)))
            );
        })
        .await;
    }

    #[tokio::test]
    pub async fn rejects_spurious_registrations() {
        let pool = test_runner::get_pool().await;

        test_runner::run_test(&pool, |mut conn| async move {
            let config = test_runner::test_config().await;
            let filter = DeploymentFilter::new(&config).unwrap();

            let deploy_block = 42;
            let entry = UnsavedVaultRegistryEntry {
                address: VAULT_ADDRESS.to_string(),
                deployed_at: felts::to_hex(&block_hash(deploy_block)),
                last_block_indexed: None,
            };
            VaultdexingRepo::create_vault(&mut conn, &entry).await.unwrap();
            let vault = VaultdexingRepo::get_vault_by_address(&mut conn, VAULT_ADDRESS)
                .await
                .unwrap()
                .unwrap();

            // The factory deployed something, but not the registered address.
            let provider = Arc::new(StubProvider::new().with_chain(40, 45).with_events(vec![
                emitted(
                    &deployment_event("0xfeed", DEPLOYER_ADDRESS, VAULT_CLASS_HASH),
                    deploy_block,
                    9,
                ),
            ]));

            let mut state = EngineState {
                last_block: None,
                vault_addresses: HashSet::new(),
            };
            let error =
                vault_manager::initialize_vault(&mut conn, &provider, &filter, &mut state, &vault)
                    .await
                    .unwrap_err();

            assert!(matches!(
                error,
                IndexingError::DeploymentAddressMismatch { .. }
            ));
            assert!(state.vault_addresses.is_empty());
            assert!(VaultdexingRepo::get_events_for_vault(&mut conn, VAULT_ADDRESS)
                .await
                .unwrap()
                .is_empty());
        })
        .await;
    }

    #[tokio::test]
    pub async fn catchup_is_idempotent_at_the_head() {
        let pool = test_runner::get_pool().await;

        test_runner::run_test(&pool, |mut conn| async move {
            let headers: Vec<UnsavedBlock> =
                (50..=60).map(|number| UnsavedBlock::mined(&block_header(number))).collect();
            VaultdexingRepo::create_blocks(&mut conn, &headers).await.unwrap();

            let entry = UnsavedVaultRegistryEntry {
                address: VAULT_ADDRESS.to_string(),
                deployed_at: felts::to_hex(&block_hash(50)),
                last_block_indexed: Some(felts::to_hex(&block_hash(50))),
            };
            VaultdexingRepo::create_vault(&mut conn, &entry).await.unwrap();

            // Page size 1 forces the continuation-token path.
            let provider = Arc::new(
                StubProvider::new()
                    .with_chain(50, 60)
                    .with_page_size(1)
                    .with_events(vec![
                        emitted(&deposit_event(VAULT_ADDRESS), 51, 1),
                        emitted(&deposit_event(VAULT_ADDRESS), 55, 2),
                    ]),
            );

            vault_manager::catchup_vault(&mut conn, &provider, VAULT_ADDRESS, 60).await.unwrap();

            let events = VaultdexingRepo::get_events_for_vault(&mut conn, VAULT_ADDRESS)
                .await
                .unwrap();
            assert_eq!(events.len(), 2);
            assert_eq!(
                events.iter().map(|event| event.event_count).collect::<Vec<_>>(),
                vec![1, 2]
            );

            let vault = VaultdexingRepo::get_vault_by_address(&mut conn, VAULT_ADDRESS)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(vault.last_block_indexed, Some(felts::to_hex(&block_hash(60))));

            // Re-invoking after reaching the head produces no new rows and no
            // error.
            vault_manager::catchup_vault(&mut conn, &provider, VAULT_ADDRESS, 60).await.unwrap();

            let events = VaultdexingRepo::get_events_for_vault(&mut conn, VAULT_ADDRESS)
                .await
                .unwrap();
            assert_eq!(events.len(), 2);
        })
        .await;
    }
}
