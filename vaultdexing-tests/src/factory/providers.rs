use vaultdexing::felts;
use vaultdexing::provider::{EmittedEvent, EventPage, Provider, ProviderError};
use vaultdexing::BlockHeader;

use super::block_header;

/// A chain stub serving a fixed set of headers and events. Everything is
/// returned in a single page; a missing block surfaces as an RPC error, the
/// same way a real node answers.
#[derive(Clone, Default)]
pub struct StubProvider {
    headers: Vec<BlockHeader>,
    events: Vec<EmittedEvent>,
    page_size: Option<usize>,
}

impl StubProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Splits event responses into pages of `page_size`, handing back
    /// continuation tokens the way a real node does.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);

        self
    }

    /// Serves the deterministic factory chain for `from..=to`.
    pub fn with_chain(mut self, from_block: u64, to_block: u64) -> Self {
        self.headers.extend((from_block..=to_block).map(block_header));

        self
    }

    pub fn with_headers(mut self, headers: Vec<BlockHeader>) -> Self {
        self.headers.extend(headers);

        self
    }

    pub fn with_events(mut self, events: Vec<EmittedEvent>) -> Self {
        self.events.extend(events);

        self
    }
}

fn block_not_found(context: String) -> ProviderError {
    ProviderError::Rpc {
        code: 24,
        message: format!("Block not found: {context}"),
    }
}

#[async_trait::async_trait]
impl Provider for StubProvider {
    async fn get_block_by_number(&self, block_number: u64) -> Result<BlockHeader, ProviderError> {
        self.headers
            .iter()
            .find(|header| header.block_number == block_number)
            .cloned()
            .ok_or_else(|| block_not_found(block_number.to_string()))
    }

    async fn get_block_by_hash(&self, block_hash: &str) -> Result<BlockHeader, ProviderError> {
        let wanted = felts::normalize(block_hash)
            .map_err(|_| block_not_found(block_hash.to_string()))?;

        self.headers
            .iter()
            .find(|header| header.hash_hex() == wanted)
            .cloned()
            .ok_or_else(|| block_not_found(block_hash.to_string()))
    }

    async fn get_events(
        &self,
        from_block: u64,
        to_block: u64,
        address: Option<&str>,
        continuation_token: Option<&str>,
    ) -> Result<EventPage, ProviderError> {
        let wanted_address = match address {
            Some(address) => Some(
                felts::normalize(address)
                    .map_err(|_| block_not_found(address.to_string()))?,
            ),
            None => None,
        };

        let mut events: Vec<EmittedEvent> = self
            .events
            .iter()
            .filter(|event| {
                (from_block..=to_block).contains(&event.block_number)
                    && wanted_address
                        .as_ref()
                        .map_or(true, |wanted| felts::to_hex(&event.from_address) == *wanted)
            })
            .cloned()
            .collect();
        events.sort_by_key(|event| event.block_number);

        let Some(page_size) = self.page_size else {
            return Ok(EventPage {
                events,
                continuation_token: None,
            });
        };

        let offset = continuation_token.map_or(0, |token| token.parse().unwrap_or(0));
        let next_offset = (offset + page_size).min(events.len());
        let continuation_token =
            (next_offset < events.len()).then(|| next_offset.to_string());

        Ok(EventPage {
            events: events[offset.min(events.len())..next_offset].to_vec(),
            continuation_token,
        })
    }
}
