use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

/// Completion notifications published after each committed state change.
/// Delivery is best-effort: a dropped notification never implies lost state,
/// so consumers keep their own reconciliation cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineNotification {
    BlockIndexed { block_number: u64, block_hash: String },
    BlockReverted { block_number: u64, block_hash: String },
    CatchupWindow { from_block: u64, to_block: u64 },
    VaultRegistered { address: String },
}

#[derive(Clone)]
pub struct Publisher {
    sender: mpsc::Sender<EngineNotification>,
    send_timeout: Duration,
}

impl Publisher {
    pub fn new(
        channel_size: usize,
        send_timeout: Duration,
    ) -> (Self, mpsc::Receiver<EngineNotification>) {
        let (sender, receiver) = mpsc::channel(channel_size);

        (
            Self {
                sender,
                send_timeout,
            },
            receiver,
        )
    }

    /// Waits up to the configured timeout for channel space. The underlying
    /// state change is already committed, so saturation only costs the live
    /// notification.
    pub async fn publish(&self, notification: EngineNotification) {
        match timeout(self.send_timeout, self.sender.send(notification)).await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                tracing::warn!("notification consumer is gone; dropping {:?}", error.0)
            }
            Err(_) => tracing::warn!(
                "timed out after {:?} publishing a notification; state is committed, only the notification is lost",
                self.send_timeout
            ),
        }
    }
}
