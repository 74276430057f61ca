use diesel::{Identifiable, Insertable, Queryable};
use serde::Deserialize;

use crate::diesel::schema::vault_registry;

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = vault_registry)]
pub struct UnsavedVaultRegistryEntry {
    pub address: String,
    pub deployed_at: String,
    pub last_block_indexed: Option<String>,
}

impl UnsavedVaultRegistryEntry {
    /// A vault whose deployment block is being processed right now: its
    /// deployment event lands in the same transaction, so the entry starts
    /// already indexed up to the deployment block.
    pub fn deployed_in(address: &str, block_hash: &str) -> Self {
        Self {
            address: address.to_string(),
            deployed_at: block_hash.to_string(),
            last_block_indexed: Some(block_hash.to_string()),
        }
    }
}

/// N/B: The field order has to match ./diesel.rs to stop diesel from mixing
/// up fields. `Deserialize` covers the NOTIFY payload, which is the row
/// serialized as JSON.
#[derive(Debug, Clone, PartialEq, Queryable, Identifiable, Deserialize)]
#[diesel(table_name = vault_registry)]
#[diesel(primary_key(id))]
pub struct VaultRegistryEntry {
    pub id: i32,
    pub address: String,
    pub deployed_at: String,
    pub last_block_indexed: Option<String>,
    /// Cursor owned by downstream consumers of the notification channel.
    /// Never written by the engine.
    pub last_block_processed: Option<String>,
}
