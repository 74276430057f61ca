use std::time::Duration;

use crate::felts;
use crate::VaultdexingRepo;

pub enum ConfigError {
    InvalidFactoryAddress,
    InvalidVaultClassHash,
    InvalidDeployerAddress,
    ZeroBlocksPerWindow,
}

impl std::fmt::Debug for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidFactoryAddress => {
                write!(f, "Factory address is not valid hex text")
            }
            ConfigError::InvalidVaultClassHash => {
                write!(f, "Vault class hash is not valid hex text")
            }
            ConfigError::InvalidDeployerAddress => {
                write!(f, "Deployer address is not valid hex text")
            }
            ConfigError::ZeroBlocksPerWindow => {
                write!(f, "At least one block per catchup window is required")
            }
        }
    }
}

#[derive(Clone)]
pub struct Config {
    pub repo: VaultdexingRepo,
    pub json_rpc_url: String,
    /// The factory contract whose deployment events announce new vaults.
    pub factory_address: String,
    /// Deployments are tracked only when their class hash matches.
    pub vault_class_hash: String,
    /// Deployments are tracked only when their deployer matches.
    pub deployer_address: String,
    /// Blocks below this number are ignored entirely.
    pub start_block_number: u64,
    pub blocks_per_window: u64,
    pub max_concurrent_block_fetches: usize,
    pub notification_timeout: Duration,
    pub notification_channel_size: usize,
}

impl Config {
    pub fn new(
        repo: VaultdexingRepo,
        json_rpc_url: &str,
        factory_address: &str,
        vault_class_hash: &str,
        deployer_address: &str,
    ) -> Self {
        Self {
            repo,
            json_rpc_url: json_rpc_url.to_string(),
            factory_address: factory_address.to_string(),
            vault_class_hash: vault_class_hash.to_string(),
            deployer_address: deployer_address.to_string(),
            start_block_number: 0,
            blocks_per_window: 1_000,
            max_concurrent_block_fetches: 100,
            notification_timeout: Duration::from_secs(5),
            notification_channel_size: 100,
        }
    }

    pub fn with_start_block_number(mut self, start_block_number: u64) -> Self {
        self.start_block_number = start_block_number;

        self
    }

    pub fn with_blocks_per_window(mut self, blocks_per_window: u64) -> Self {
        self.blocks_per_window = blocks_per_window;

        self
    }

    pub fn with_max_concurrent_block_fetches(mut self, max_concurrent_block_fetches: usize) -> Self {
        self.max_concurrent_block_fetches = max_concurrent_block_fetches;

        self
    }

    pub fn with_notification_timeout(mut self, notification_timeout: Duration) -> Self {
        self.notification_timeout = notification_timeout;

        self
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        felts::from_hex(&self.factory_address).map_err(|_| ConfigError::InvalidFactoryAddress)?;
        felts::from_hex(&self.vault_class_hash).map_err(|_| ConfigError::InvalidVaultClassHash)?;
        felts::from_hex(&self.deployer_address).map_err(|_| ConfigError::InvalidDeployerAddress)?;

        if self.blocks_per_window == 0 {
            return Err(ConfigError::ZeroBlocksPerWindow);
        }

        Ok(())
    }
}
