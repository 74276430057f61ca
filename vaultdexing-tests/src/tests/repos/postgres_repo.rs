#[cfg(test)]
mod tests {
    use crate::factory::{
        block_header, deposit_event, transaction_hash, withdraw_event, VAULT_ADDRESS,
    };
    use crate::test_runner;
    use vaultdexing::{
        felts, Repo, UnsavedBlock, UnsavedEvent, UnsavedVaultRegistryEntry, VaultEventKind,
        VaultdexingRepo,
    };

    const OTHER_VAULT_ADDRESS: &str =
        "0x6b749c8f1bbbee5a52de1a0e2311eb25bb1a2f68368cf255b4d3b2e8b48b27a";

    fn unsaved_deposit(vault_address: &str, block_number: u64, nonce: u64) -> UnsavedEvent {
        let event = deposit_event(vault_address);

        UnsavedEvent::new(
            VaultEventKind::Deposit,
            &transaction_hash(nonce),
            vault_address,
            block_number,
            &event.keys,
            &event.data,
        )
    }

    fn unsaved_withdraw(vault_address: &str, block_number: u64, nonce: u64) -> UnsavedEvent {
        let event = withdraw_event(vault_address);

        UnsavedEvent::new(
            VaultEventKind::Withdraw,
            &transaction_hash(nonce),
            vault_address,
            block_number,
            &event.keys,
            &event.data,
        )
    }

    #[tokio::test]
    pub async fn assigns_independent_event_sequences_per_vault() {
        let pool = test_runner::get_pool().await;

        test_runner::run_test(&pool, |mut conn| async move {
            VaultdexingRepo::append_event(&mut conn, &unsaved_deposit(VAULT_ADDRESS, 10, 1))
                .await
                .unwrap();
            VaultdexingRepo::append_event(&mut conn, &unsaved_deposit(OTHER_VAULT_ADDRESS, 10, 2))
                .await
                .unwrap();
            VaultdexingRepo::append_event(&mut conn, &unsaved_withdraw(VAULT_ADDRESS, 11, 3))
                .await
                .unwrap();
            VaultdexingRepo::append_event(&mut conn, &unsaved_withdraw(OTHER_VAULT_ADDRESS, 12, 4))
                .await
                .unwrap();

            let events = VaultdexingRepo::get_events_for_vault(&mut conn, VAULT_ADDRESS)
                .await
                .unwrap();
            assert_eq!(
                events.iter().map(|event| event.event_count).collect::<Vec<_>>(),
                vec![1, 2]
            );

            let events = VaultdexingRepo::get_events_for_vault(&mut conn, OTHER_VAULT_ADDRESS)
                .await
                .unwrap();
            assert_eq!(
                events.iter().map(|event| event.event_count).collect::<Vec<_>>(),
                vec![1, 2]
            );
        })
        .await;
    }

    #[tokio::test]
    pub async fn creating_a_vault_is_idempotent_per_address() {
        let pool = test_runner::get_pool().await;

        test_runner::run_test(&pool, |mut conn| async move {
            let entry = UnsavedVaultRegistryEntry {
                address: VAULT_ADDRESS.to_string(),
                deployed_at: felts::to_hex(&block_header(10).block_hash),
                last_block_indexed: None,
            };

            VaultdexingRepo::create_vault(&mut conn, &entry).await.unwrap();
            VaultdexingRepo::create_vault(&mut conn, &entry).await.unwrap();

            let vaults = VaultdexingRepo::get_all_vaults(&mut conn).await.unwrap();
            let tracked: Vec<_> =
                vaults.iter().filter(|vault| vault.address == VAULT_ADDRESS).collect();
            assert_eq!(tracked.len(), 1);
        })
        .await;
    }

    #[tokio::test]
    pub async fn follows_the_mined_chain_only() {
        let pool = test_runner::get_pool().await;

        test_runner::run_test(&pool, |mut conn| async move {
            let blocks = [
                UnsavedBlock::mined(&block_header(7)),
                UnsavedBlock::mined(&block_header(8)),
            ];
            VaultdexingRepo::create_blocks(&mut conn, &blocks).await.unwrap();

            let parent = block_header(7).hash_hex();
            let next = VaultdexingRepo::get_next_block_by_parent_hash(&mut conn, &parent)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(next.number(), 8);

            VaultdexingRepo::mark_block_reverted(&mut conn, 8, &block_header(8).hash_hex())
                .await
                .unwrap();

            assert!(VaultdexingRepo::get_next_block_by_parent_hash(&mut conn, &parent)
                .await
                .unwrap()
                .is_none());
        })
        .await;
    }

    #[tokio::test]
    pub async fn last_mined_block_ignores_reverted_rows() {
        let pool = test_runner::get_pool().await;

        test_runner::run_test(&pool, |mut conn| async move {
            let blocks = [
                UnsavedBlock::mined(&block_header(5)),
                UnsavedBlock::mined(&block_header(6)),
            ];
            VaultdexingRepo::create_blocks(&mut conn, &blocks).await.unwrap();

            VaultdexingRepo::mark_block_reverted(&mut conn, 6, &block_header(6).hash_hex())
                .await
                .unwrap();

            let last_block =
                VaultdexingRepo::get_last_mined_block(&mut conn).await.unwrap().unwrap();
            assert_eq!(last_block.number(), 5);
        })
        .await;
    }
}
