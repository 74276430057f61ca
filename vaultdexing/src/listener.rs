use tokio::task::JoinHandle;

use crate::provider::Provider;
use crate::repos::{NotifiesNewVaults, RepoError};
use crate::Engine;

/// Spawns the background consumer of the new-vault channel. Every delivered
/// registry row is initialized under the engine lock, concurrently with
/// block processing. A failing row is logged and skipped; the loop survives.
pub(crate) async fn start<P: Provider + 'static>(
    engine: Engine<P>,
) -> Result<JoinHandle<()>, RepoError> {
    let mut registrations = engine.repo().subscribe_to_new_vaults().await?;

    Ok(tokio::spawn(async move {
        while let Some(vault) = registrations.recv().await {
            tracing::info!(address = %vault.address, "received vault registration");

            if let Err(error) = engine.handle_registration(&vault).await {
                tracing::error!(address = %vault.address, "failed to initialize vault: {error}");
            }
        }
    }))
}
