use std::cmp::min;
use std::sync::Arc;

use futures_util::FutureExt;

use crate::blocks::{NewBlock, UnsavedBlock};
use crate::notifications::{EngineNotification, Publisher};
use crate::provider::{self, Provider};
use crate::repos::Repo;
use crate::vault_manager::{self, DeploymentFilter, IndexingError};
use crate::{EngineState, VaultdexingRepo, VaultdexingRepoConn};

/// Everything the top-level driver needs besides the connection and the
/// locked engine state.
pub struct ProcessorContext<'e, P: Provider> {
    pub provider: &'e Arc<P>,
    pub filter: &'e DeploymentFilter,
    pub start_block_number: u64,
    pub blocks_per_window: u64,
    pub max_concurrent_block_fetches: usize,
    pub notifications: &'e Publisher,
}

/// Ingests one host-delivered block: fills any backlog first, then persists
/// the block row and its tracked-vault events in a single transaction. A
/// failure rolls the whole transaction back and leaves the cursor untouched,
/// so the host's retry reprocesses the same block.
pub async fn on_new_block<'a, P: Provider>(
    ctx: &ProcessorContext<'_, P>,
    conn: &mut VaultdexingRepoConn<'a>,
    state: &mut EngineState,
    block: &NewBlock,
) -> Result<(), IndexingError> {
    let incoming = block.header.block_number;
    if incoming < ctx.start_block_number {
        return Ok(());
    }

    if state.last_block.is_none() {
        state.last_block = VaultdexingRepo::get_last_mined_block(conn).await?;
    }
    if let Some(last_block) = &state.last_block {
        if incoming <= last_block.number() {
            tracing::warn!(
                block_number = incoming,
                indexed_head = last_block.number(),
                "block at or below the indexed head; ignoring replay"
            );
            return Ok(());
        }
    }

    let gap_start = state
        .last_block
        .as_ref()
        .map(|last_block| last_block.number() + 1)
        .unwrap_or(ctx.start_block_number);
    if gap_start < incoming {
        catchup_blocks(ctx, conn, state, incoming).await?;
    }

    tracing::info!(block_number = incoming, "processing new block");

    let collected = vault_manager::collect_block_events(ctx.filter, &state.vault_addresses, block);
    let block_hash = block.header.hash_hex();

    {
        let unsaved_block = UnsavedBlock::mined(&block.header);
        let new_vaults = collected.new_vaults.clone();
        let events = collected.events.clone();
        let touched_addresses = collected.touched_addresses.clone();
        let block_hash = block_hash.clone();

        VaultdexingRepo::run_in_transaction(conn, move |conn| {
            async move {
                for vault in &new_vaults {
                    VaultdexingRepo::create_vault(conn, vault).await?;
                }
                for event in &events {
                    VaultdexingRepo::append_event(conn, event).await?;
                }
                for address in &touched_addresses {
                    VaultdexingRepo::update_vault_last_indexed(conn, address, &block_hash).await?;
                }
                VaultdexingRepo::create_block(conn, &unsaved_block).await?;

                Ok(())
            }
            .boxed()
        })
        .await?;
    }

    state.last_block = VaultdexingRepo::get_block_by_hash(conn, &block_hash).await?;
    for address in collected.new_addresses {
        state.vault_addresses.insert(address);
    }

    ctx.notifications
        .publish(EngineNotification::BlockIndexed {
            block_number: incoming,
            block_hash,
        })
        .await;

    Ok(())
}

/// Fills the gap between the persisted head and `target` (exclusive) in
/// windows of at most `blocks_per_window` blocks. Each window persists its
/// headers in one transaction, then catches every tracked vault up to the
/// window end, so `last_block_indexed` always lands on a persisted block and
/// per-vault progress never outruns the chain it depends on.
pub async fn catchup_blocks<'a, P: Provider>(
    ctx: &ProcessorContext<'_, P>,
    conn: &mut VaultdexingRepoConn<'a>,
    state: &mut EngineState,
    target: u64,
) -> Result<(), IndexingError> {
    loop {
        // The in-memory cursor is a derived index; each window recomputes the
        // gap from the store so interrupted passes resume where they stopped.
        let last_block = VaultdexingRepo::get_last_mined_block(conn).await?;
        let window_start = last_block
            .as_ref()
            .map(|block| block.number() + 1)
            .unwrap_or(ctx.start_block_number);
        if window_start >= target {
            state.last_block = last_block;
            break;
        }

        let window_end = min(window_start + ctx.blocks_per_window - 1, target - 1);
        tracing::info!(window_start, window_end, "catching up blocks");

        let headers = provider::fetch_blocks(
            ctx.provider,
            window_start,
            window_end,
            ctx.max_concurrent_block_fetches,
        )
        .await?;

        let unsaved_blocks: Vec<UnsavedBlock> = headers.iter().map(UnsavedBlock::mined).collect();
        VaultdexingRepo::run_in_transaction(conn, move |conn| {
            async move {
                VaultdexingRepo::create_blocks(conn, &unsaved_blocks).await?;

                Ok(())
            }
            .boxed()
        })
        .await?;

        let addresses = vault_manager::get_vault_addresses(state);
        for address in &addresses {
            vault_manager::catchup_vault(conn, ctx.provider, address, window_end).await?;
        }

        ctx.notifications
            .publish(EngineNotification::CatchupWindow {
                from_block: window_start,
                to_block: window_end,
            })
            .await;
    }

    Ok(())
}

/// Marks the block REVERTED and unwinds dependent vault state in the same
/// transaction: that block's events are retracted and every vault whose
/// progress pointed at the reverted hash is rewound to the parent.
pub async fn on_revert_block<'a, P: Provider>(
    ctx: &ProcessorContext<'_, P>,
    conn: &mut VaultdexingRepoConn<'a>,
    state: &mut EngineState,
    block: &NewBlock,
) -> Result<(), IndexingError> {
    let block_number = block.header.block_number;
    let block_hash = block.header.hash_hex();
    let parent_hash = block.header.parent_hash_hex();

    {
        let block_hash = block_hash.clone();
        VaultdexingRepo::run_in_transaction(conn, move |conn| {
            async move {
                VaultdexingRepo::mark_block_reverted(conn, block_number as i64, &block_hash)
                    .await?;
                VaultdexingRepo::delete_events_at_block(conn, block_number as i64).await?;
                VaultdexingRepo::rewind_vaults_last_indexed(conn, &block_hash, &parent_hash)
                    .await?;

                Ok(())
            }
            .boxed()
        })
        .await?;
    }

    state.last_block = VaultdexingRepo::get_last_mined_block(conn).await?;

    tracing::info!(block_number, block_hash = %block_hash, "block reverted");
    ctx.notifications
        .publish(EngineNotification::BlockReverted {
            block_number,
            block_hash,
        })
        .await;

    Ok(())
}
