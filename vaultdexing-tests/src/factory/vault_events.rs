use vaultdexing::felts::{self, Felt};
use vaultdexing::provider::EmittedEvent;
use vaultdexing::{BlockHeader, NewBlock, RawEvent, TransactionReceipt, VaultEventKind};

pub const FACTORY_ADDRESS: &str =
    "0x41a78e741e5af2fec34b695679bc6891742439f7afb8484ecd7766661ad02bf";
pub const VAULT_CLASS_HASH: &str =
    "0x5c478ee27f2112411f86f207605b2e2c58cdb647bac0df27f660ef2252359c6";
pub const DEPLOYER_ADDRESS: &str =
    "0x2c2b8f559e1221468140ad7b2352b1a5be32660d0bf1a3ae3a054a4ec5254e4";
pub const VAULT_ADDRESS: &str =
    "0x127021a1b5a52e3f1a7fb852bb5b5e4826c8b4d4e19ac6c1cd0e3bfa9d74f89";

pub fn felt(text: &str) -> Felt {
    felts::from_hex(text).unwrap()
}

/// Deterministic per-height hash for stub chains.
pub fn block_hash(block_number: u64) -> Felt {
    Felt::from(0xb10c_0000_0000u64 + block_number)
}

pub fn block_header(block_number: u64) -> BlockHeader {
    BlockHeader {
        block_number,
        block_hash: block_hash(block_number),
        parent_hash: if block_number == 0 {
            Felt::zero()
        } else {
            block_hash(block_number - 1)
        },
        timestamp: 1_700_000_000 + block_number,
    }
}

/// A competing header at the same height, for reorg scenarios.
pub fn forked_block_header(block_number: u64, parent_hash: Felt) -> BlockHeader {
    BlockHeader {
        block_number,
        block_hash: Felt::from(0xf04c_0000_0000u64 + block_number),
        parent_hash,
        timestamp: 1_700_000_000 + block_number,
    }
}

pub fn transaction_hash(nonce: u64) -> Felt {
    Felt::from(0x7a50_0000_0000u64 + nonce)
}

pub fn receipt(nonce: u64, events: Vec<RawEvent>) -> TransactionReceipt {
    TransactionReceipt {
        transaction_hash: transaction_hash(nonce),
        events,
    }
}

pub fn new_block(block_number: u64, receipts: Vec<TransactionReceipt>) -> NewBlock {
    NewBlock {
        header: block_header(block_number),
        receipts,
    }
}

pub fn deposit_event(vault_address: &str) -> RawEvent {
    RawEvent {
        from_address: felt(vault_address),
        keys: vec![VaultEventKind::Deposit.selector(), Felt::from(1u64)],
        data: vec![Felt::from(250u64), Felt::from(1_250u64)],
    }
}

pub fn withdraw_event(vault_address: &str) -> RawEvent {
    RawEvent {
        from_address: felt(vault_address),
        keys: vec![VaultEventKind::Withdraw.selector(), Felt::from(1u64)],
        data: vec![Felt::from(100u64), Felt::from(1_150u64)],
    }
}

pub fn unrecognized_event(vault_address: &str) -> RawEvent {
    RawEvent {
        from_address: felt(vault_address),
        keys: vec![felts::event_selector("NotAVaultEvent")],
        data: vec![Felt::from(1u64)],
    }
}

/// A factory deployment event. Data layout mirrors the factory contract:
/// [deployed address, deployer, salt, class hash].
pub fn deployment_event(deployed_address: &str, deployer: &str, class_hash: &str) -> RawEvent {
    RawEvent {
        from_address: felt(FACTORY_ADDRESS),
        keys: vec![VaultEventKind::Deployment.selector()],
        data: vec![
            felt(deployed_address),
            felt(deployer),
            Felt::from(7u64),
            felt(class_hash),
        ],
    }
}

pub fn emitted(event: &RawEvent, block_number: u64, nonce: u64) -> EmittedEvent {
    EmittedEvent {
        from_address: event.from_address,
        keys: event.keys.clone(),
        data: event.data.clone(),
        block_number,
        block_hash: block_hash(block_number),
        transaction_hash: transaction_hash(nonce),
    }
}
