use diesel::{Identifiable, Queryable};

use crate::diesel::schema::events;
use crate::events::decoder::VaultEventKind;
use crate::felts::{self, Felt};

/// An event about to be appended. `event_count` is assigned by the store at
/// insert, which is why this is not a diesel `Insertable`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsavedEvent {
    pub transaction_hash: String,
    pub vault_address: String,
    pub block_number: i64,
    pub event_name: String,
    pub event_keys: serde_json::Value,
    pub event_data: serde_json::Value,
}

impl UnsavedEvent {
    pub fn new(
        kind: VaultEventKind,
        transaction_hash: &Felt,
        vault_address: &str,
        block_number: u64,
        keys: &[Felt],
        data: &[Felt],
    ) -> Self {
        Self {
            transaction_hash: felts::to_hex(transaction_hash),
            vault_address: vault_address.to_string(),
            block_number: block_number as i64,
            event_name: kind.name().to_string(),
            event_keys: felts_to_json(keys),
            event_data: felts_to_json(data),
        }
    }
}

fn felts_to_json(felts: &[Felt]) -> serde_json::Value {
    serde_json::Value::Array(
        felts.iter().map(|felt| serde_json::Value::String(felts::to_hex(felt))).collect(),
    )
}

/// N/B: The field order has to match ./diesel.rs to stop diesel from mixing
/// up fields
#[derive(Debug, Clone, PartialEq, Queryable, Identifiable)]
#[diesel(table_name = events)]
#[diesel(primary_key(id))]
pub struct Event {
    pub id: i32,
    pub transaction_hash: String,
    pub vault_address: String,
    pub block_number: i64,
    pub event_name: String,
    event_keys: serde_json::Value,
    event_data: serde_json::Value,
    pub event_count: i64,
    inserted_at: chrono::NaiveDateTime,
}

impl Event {
    pub fn get_block_number(&self) -> u64 {
        self.block_number as u64
    }

    pub fn get_keys(&self) -> Vec<String> {
        json_to_strings(&self.event_keys)
    }

    pub fn get_data(&self) -> Vec<String> {
        json_to_strings(&self.event_data)
    }
}

fn json_to_strings(value: &serde_json::Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items.iter().filter_map(|item| item.as_str()).map(str::to_string).collect()
        })
        .unwrap_or_default()
}
