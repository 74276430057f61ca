use std::collections::HashSet;
use std::sync::Arc;

use derive_more::Display;
use futures_util::FutureExt;

use crate::blocks::NewBlock;
use crate::config::{Config, ConfigError};
use crate::events::{decoder, UnsavedEvent, VaultEventKind};
use crate::felts::{self, Felt};
use crate::provider::{self, Provider, ProviderError};
use crate::repos::{Repo, RepoError};
use crate::vaults::UnsavedVaultRegistryEntry;
use crate::VaultRegistryEntry;
use crate::{EngineState, VaultdexingRepo, VaultdexingRepoConn};

#[derive(Debug, Display)]
pub enum IndexingError {
    Repo(RepoError),
    Provider(ProviderError),
    #[display("vault {_0} is not registered")]
    UnknownVault(String),
    #[display("vault address {_0} is not valid hex text")]
    InvalidVaultAddress(String),
    #[display("no deployment event found in the recorded deployment block of vault {address}")]
    MissingDeployment { address: String },
    #[display("deployment event announces {actual} but the registry says {expected}")]
    DeploymentAddressMismatch { expected: String, actual: String },
}

impl From<RepoError> for IndexingError {
    fn from(value: RepoError) -> Self {
        IndexingError::Repo(value)
    }
}

impl From<ProviderError> for IndexingError {
    fn from(value: ProviderError) -> Self {
        IndexingError::Provider(value)
    }
}

/// The configured filters a factory deployment event must pass before the
/// deployed contract is tracked as a vault.
pub struct DeploymentFilter {
    pub factory_address: Felt,
    pub vault_class_hash: Felt,
    pub deployer_address: Felt,
}

impl DeploymentFilter {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            factory_address: felts::from_hex(&config.factory_address)
                .map_err(|_| ConfigError::InvalidFactoryAddress)?,
            vault_class_hash: felts::from_hex(&config.vault_class_hash)
                .map_err(|_| ConfigError::InvalidVaultClassHash)?,
            deployer_address: felts::from_hex(&config.deployer_address)
                .map_err(|_| ConfigError::InvalidDeployerAddress)?,
        })
    }
}

/// Payload of a factory deployment event.
/// Data layout: [deployed address, deployer, salt, class hash, ...].
struct Deployment {
    address: Felt,
    deployer: Felt,
    class_hash: Felt,
}

impl Deployment {
    fn parse(data: &[Felt]) -> Option<Self> {
        if data.len() < 4 {
            return None;
        }

        Some(Self {
            address: data[0],
            deployer: data[1],
            class_hash: data[3],
        })
    }

    fn passes(&self, filter: &DeploymentFilter) -> bool {
        self.class_hash == filter.vault_class_hash && self.deployer == filter.deployer_address
    }
}

/// Everything a single host block contributes, computed outside any
/// transaction so the caller can persist it atomically.
pub struct BlockEvents {
    pub new_vaults: Vec<UnsavedVaultRegistryEntry>,
    pub events: Vec<UnsavedEvent>,
    /// Vaults whose `last_block_indexed` advances to this block.
    pub touched_addresses: HashSet<String>,
    /// Addresses to add to the tracked set once the block commits.
    pub new_addresses: Vec<String>,
}

/// The per-block decode pass: detect factory deployments passing the
/// configured filters, then decode every event whose source is a tracked (or
/// just-deployed) vault. Unrecognized selectors are skipped silently.
pub fn collect_block_events(
    filter: &DeploymentFilter,
    tracked_addresses: &HashSet<String>,
    block: &NewBlock,
) -> BlockEvents {
    let block_hash = block.header.hash_hex();
    let block_number = block.header.block_number;

    let mut new_vaults = Vec::new();
    let mut new_addresses: Vec<String> = Vec::new();
    let mut events = Vec::new();
    let mut touched_addresses = HashSet::new();

    for receipt in &block.receipts {
        for event in &receipt.events {
            if event.from_address != filter.factory_address {
                continue;
            }
            if event.keys.first().and_then(decoder::decode) != Some(VaultEventKind::Deployment) {
                continue;
            }
            let Some(deployment) = Deployment::parse(&event.data) else {
                continue;
            };
            if !deployment.passes(filter) {
                continue;
            }

            let address = felts::to_hex(&deployment.address);
            if tracked_addresses.contains(&address) || new_addresses.contains(&address) {
                continue;
            }

            events.push(UnsavedEvent::new(
                VaultEventKind::Deployment,
                &receipt.transaction_hash,
                &address,
                block_number,
                &event.keys,
                &event.data,
            ));
            new_vaults.push(UnsavedVaultRegistryEntry::deployed_in(&address, &block_hash));
            touched_addresses.insert(address.clone());
            new_addresses.push(address);
        }
    }

    for receipt in &block.receipts {
        for event in &receipt.events {
            let from_address = felts::to_hex(&event.from_address);
            if !tracked_addresses.contains(&from_address)
                && !new_addresses.contains(&from_address)
            {
                continue;
            }

            let Some(kind) = event.keys.first().and_then(decoder::decode) else {
                continue;
            };

            events.push(UnsavedEvent::new(
                kind,
                &receipt.transaction_hash,
                &from_address,
                block_number,
                &event.keys,
                &event.data,
            ));
            touched_addresses.insert(from_address);
        }
    }

    BlockEvents {
        new_vaults,
        events,
        touched_addresses,
        new_addresses,
    }
}

/// Brings one vault's event history up to `to_block`.
///
/// The starting point is recomputed from persisted state on every call, so a
/// retry after any failure is idempotent, and the successor is resolved by
/// following the persisted chain's parent-hash link so a reorg between
/// passes is reflected.
pub async fn catchup_vault<'a, P: Provider>(
    conn: &mut VaultdexingRepoConn<'a>,
    provider: &Arc<P>,
    address: &str,
    to_block: u64,
) -> Result<(), IndexingError> {
    let vault = VaultdexingRepo::get_vault_by_address(conn, address)
        .await?
        .ok_or_else(|| IndexingError::UnknownVault(address.to_string()))?;

    let from_block = match &vault.last_block_indexed {
        // First pass: start one past the deployment block.
        None => {
            let deploy_block = provider.get_block_by_hash(&vault.deployed_at).await?;
            deploy_block.block_number + 1
        }
        Some(last_indexed_hash) => {
            match VaultdexingRepo::get_next_block_by_parent_hash(conn, last_indexed_hash).await? {
                Some(next_block) => next_block.number(),
                // A vault deployed before the start cursor has no persisted
                // deployment block; its successor only resolves over RPC.
                None if *last_indexed_hash == vault.deployed_at => {
                    let deploy_block = provider.get_block_by_hash(last_indexed_hash).await?;
                    deploy_block.block_number + 1
                }
                // Successor not persisted yet; a later pass picks it up.
                None => return Ok(()),
            }
        }
    };

    if from_block > to_block {
        return Ok(());
    }

    let mut events = provider::fetch_events(provider, from_block, to_block, Some(address)).await?;
    events.sort_by_key(|event| event.block_number);
    let to_header = provider.get_block_by_number(to_block).await?;

    tracing::info!(
        address,
        from_block,
        to_block,
        fetched = events.len(),
        "catching up vault"
    );

    let address = address.to_string();
    let to_block_hash = to_header.hash_hex();
    VaultdexingRepo::run_in_transaction(conn, move |conn| {
        async move {
            for event in &events {
                let Some(selector) = event.keys.first() else {
                    continue;
                };
                let Some(kind) = decoder::decode(selector) else {
                    continue;
                };

                let unsaved = UnsavedEvent::new(
                    kind,
                    &event.transaction_hash,
                    &address,
                    event.block_number,
                    &event.keys,
                    &event.data,
                );
                VaultdexingRepo::append_event(conn, &unsaved).await?;
            }

            VaultdexingRepo::update_vault_last_indexed(conn, &address, &to_block_hash).await?;

            Ok(())
        }
        .boxed()
    })
    .await?;

    Ok(())
}

/// Processes an externally registered vault: resolves its deployment block,
/// verifies the factory really deployed the registered address there,
/// persists the deployment event, then catches the vault up to the persisted
/// head.
pub async fn initialize_vault<'a, P: Provider>(
    conn: &mut VaultdexingRepoConn<'a>,
    provider: &Arc<P>,
    filter: &DeploymentFilter,
    state: &mut EngineState,
    vault: &VaultRegistryEntry,
) -> Result<(), IndexingError> {
    let vault_address = felts::normalize(&vault.address)
        .map_err(|_| IndexingError::InvalidVaultAddress(vault.address.clone()))?;

    let deploy_block = provider.get_block_by_hash(&vault.deployed_at).await?;
    let factory_address = felts::to_hex(&filter.factory_address);
    let deploy_events = provider::fetch_events(
        provider,
        deploy_block.block_number,
        deploy_block.block_number,
        Some(&factory_address),
    )
    .await?;

    let deployments: Vec<_> = deploy_events
        .iter()
        .filter(|event| {
            event.keys.first().and_then(decoder::decode) == Some(VaultEventKind::Deployment)
        })
        .collect();

    let deployment = deployments.iter().find(|event| {
        Deployment::parse(&event.data)
            .is_some_and(|deployment| felts::to_hex(&deployment.address) == vault_address)
    });

    let Some(deployment) = deployment else {
        // A spurious notification can name a block that deployed something
        // else, or nothing at all.
        if let Some(other) = deployments.first() {
            let actual = Deployment::parse(&other.data)
                .map(|deployment| felts::to_hex(&deployment.address))
                .unwrap_or_default();
            tracing::error!(expected = %vault_address, %actual, "deployment address mismatch");
            return Err(IndexingError::DeploymentAddressMismatch {
                expected: vault_address,
                actual,
            });
        }

        tracing::error!(
            address = %vault_address,
            block_hash = %vault.deployed_at,
            "registered deployment block holds no deployment event"
        );
        return Err(IndexingError::MissingDeployment {
            address: vault_address,
        });
    };

    let deployment_event = UnsavedEvent::new(
        VaultEventKind::Deployment,
        &deployment.transaction_hash,
        &vault_address,
        deployment.block_number,
        &deployment.keys,
        &deployment.data,
    );
    let deploy_block_hash = deploy_block.hash_hex();

    {
        let address = vault_address.clone();
        VaultdexingRepo::run_in_transaction(conn, move |conn| {
            async move {
                VaultdexingRepo::append_event(conn, &deployment_event).await?;
                VaultdexingRepo::update_vault_last_indexed(conn, &address, &deploy_block_hash)
                    .await?;

                Ok(())
            }
            .boxed()
        })
        .await?;
    }

    state.vault_addresses.insert(vault_address.clone());
    tracing::info!(address = %vault_address, "vault initialized");

    if let Some(head) = VaultdexingRepo::get_last_mined_block(conn).await? {
        if head.number() > deploy_block.block_number {
            catchup_vault(conn, provider, &vault_address, head.number()).await?;
        }
    }

    Ok(())
}

pub fn is_vault_address(state: &EngineState, address: &str) -> bool {
    state.vault_addresses.contains(address)
}

pub fn get_vault_addresses(state: &EngineState) -> Vec<String> {
    state.vault_addresses.iter().cloned().collect()
}
