use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::felts::{self, Felt};

/// Every event kind the engine recognizes, keyed by the selector of its
/// name. Anything else is unrecognized and silently skipped by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VaultEventKind {
    Deployment,
    Deposit,
    Withdraw,
    WithdrawalQueued,
    StashWithdrawn,
    AuctionStarted,
    AuctionEnded,
    BidPlaced,
    BidUpdated,
    UnusedBidsRefunded,
    OptionsMinted,
    OptionsExercised,
    OptionRoundDeployed,
    OptionRoundSettled,
}

impl VaultEventKind {
    pub const ALL: [VaultEventKind; 14] = [
        VaultEventKind::Deployment,
        VaultEventKind::Deposit,
        VaultEventKind::Withdraw,
        VaultEventKind::WithdrawalQueued,
        VaultEventKind::StashWithdrawn,
        VaultEventKind::AuctionStarted,
        VaultEventKind::AuctionEnded,
        VaultEventKind::BidPlaced,
        VaultEventKind::BidUpdated,
        VaultEventKind::UnusedBidsRefunded,
        VaultEventKind::OptionsMinted,
        VaultEventKind::OptionsExercised,
        VaultEventKind::OptionRoundDeployed,
        VaultEventKind::OptionRoundSettled,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            VaultEventKind::Deployment => "ContractDeployed",
            VaultEventKind::Deposit => "Deposit",
            VaultEventKind::Withdraw => "Withdraw",
            VaultEventKind::WithdrawalQueued => "WithdrawalQueued",
            VaultEventKind::StashWithdrawn => "StashWithdrawn",
            VaultEventKind::AuctionStarted => "AuctionStarted",
            VaultEventKind::AuctionEnded => "AuctionEnded",
            VaultEventKind::BidPlaced => "BidPlaced",
            VaultEventKind::BidUpdated => "BidUpdated",
            VaultEventKind::UnusedBidsRefunded => "UnusedBidsRefunded",
            VaultEventKind::OptionsMinted => "OptionsMinted",
            VaultEventKind::OptionsExercised => "OptionsExercised",
            VaultEventKind::OptionRoundDeployed => "OptionRoundDeployed",
            VaultEventKind::OptionRoundSettled => "OptionRoundSettled",
        }
    }

    pub fn selector(&self) -> Felt {
        felts::event_selector(self.name())
    }
}

static KINDS_BY_SELECTOR: Lazy<HashMap<Felt, VaultEventKind>> =
    Lazy::new(|| VaultEventKind::ALL.iter().map(|kind| (kind.selector(), *kind)).collect());

/// Maps an event's selector (its first key) to the kind it announces.
/// Unknown selectors yield `None`, never an error.
pub fn decode(selector: &Felt) -> Option<VaultEventKind> {
    KINDS_BY_SELECTOR.get(selector).copied()
}
