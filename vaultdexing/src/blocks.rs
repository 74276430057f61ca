use diesel::{Identifiable, Insertable, Queryable};
use serde::Deserialize;

use crate::diesel::schema::blocks;
use crate::felts::{self, Felt};

pub const STATUS_MINED: &str = "MINED";
pub const STATUS_REVERTED: &str = "REVERTED";

/// A block header as delivered by the host callback or the chain RPC.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BlockHeader {
    pub block_number: u64,
    pub block_hash: Felt,
    pub parent_hash: Felt,
    pub timestamp: u64,
}

impl BlockHeader {
    pub fn hash_hex(&self) -> String {
        felts::to_hex(&self.block_hash)
    }

    pub fn parent_hash_hex(&self) -> String {
        felts::to_hex(&self.parent_hash)
    }
}

/// One event as emitted by a contract, before any decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub from_address: Felt,
    pub keys: Vec<Felt>,
    pub data: Vec<Felt>,
}

/// The events a single transaction emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionReceipt {
    pub transaction_hash: Felt,
    pub events: Vec<RawEvent>,
}

/// The host-facing shape of a freshly mined block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBlock {
    pub header: BlockHeader,
    pub receipts: Vec<TransactionReceipt>,
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = blocks)]
pub struct UnsavedBlock {
    pub block_number: i64,
    pub block_hash: String,
    pub parent_hash: String,
    pub block_timestamp: i64,
    status: String,
}

impl UnsavedBlock {
    pub fn mined(header: &BlockHeader) -> Self {
        Self {
            block_number: header.block_number as i64,
            block_hash: header.hash_hex(),
            parent_hash: header.parent_hash_hex(),
            block_timestamp: header.timestamp as i64,
            status: STATUS_MINED.to_string(),
        }
    }
}

/// N/B: The field order has to match ./diesel.rs to stop diesel from mixing
/// up fields
#[derive(Debug, Clone, PartialEq, Queryable, Identifiable)]
#[diesel(table_name = blocks)]
#[diesel(primary_key(id))]
pub struct Block {
    pub id: i32,
    pub block_number: i64,
    pub block_hash: String,
    pub parent_hash: String,
    pub block_timestamp: i64,
    pub status: String,
}

impl Block {
    pub fn number(&self) -> u64 {
        self.block_number as u64
    }

    pub fn is_mined(&self) -> bool {
        self.status == STATUS_MINED
    }
}
