use std::sync::Arc;

use derive_more::Display;
use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::blocks::BlockHeader;
use crate::felts::Felt;

/// Page size requested per `get_events` call. The node may return fewer and
/// hand back a continuation token.
const EVENT_CHUNK_SIZE: u64 = 1024;

#[derive(Debug, Display)]
pub enum ProviderError {
    #[display("transport error: {_0}")]
    Transport(String),
    #[display("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        ProviderError::Transport(error.to_string())
    }
}

/// One event as returned by the chain RPC, with its block/transaction
/// context attached.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EmittedEvent {
    pub from_address: Felt,
    pub keys: Vec<Felt>,
    pub data: Vec<Felt>,
    pub block_number: u64,
    pub block_hash: Felt,
    pub transaction_hash: Felt,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventPage {
    pub events: Vec<EmittedEvent>,
    pub continuation_token: Option<String>,
}

#[async_trait::async_trait]
pub trait Provider: Clone + Sync + Send {
    async fn get_block_by_number(&self, block_number: u64) -> Result<BlockHeader, ProviderError>;
    async fn get_block_by_hash(&self, block_hash: &str) -> Result<BlockHeader, ProviderError>;
    async fn get_events(
        &self,
        from_block: u64,
        to_block: u64,
        address: Option<&str>,
        continuation_token: Option<&str>,
    ) -> Result<EventPage, ProviderError>;
}

#[derive(Clone)]
pub struct JsonRpcProvider {
    http: reqwest::Client,
    url: String,
}

#[derive(Deserialize)]
struct JsonRpcResponse<R> {
    result: Option<R>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

impl JsonRpcProvider {
    pub fn new(json_rpc_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: json_rpc_url.to_string(),
        }
    }

    async fn call<R: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<R, ProviderError> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response: JsonRpcResponse<R> =
            self.http.post(&self.url).json(&body).send().await?.json().await?;

        match (response.result, response.error) {
            (Some(result), _) => Ok(result),
            (None, Some(error)) => Err(ProviderError::Rpc {
                code: error.code,
                message: error.message,
            }),
            (None, None) => Err(ProviderError::Rpc {
                code: 0,
                message: "response carried neither result nor error".to_string(),
            }),
        }
    }
}

#[async_trait::async_trait]
impl Provider for JsonRpcProvider {
    async fn get_block_by_number(&self, block_number: u64) -> Result<BlockHeader, ProviderError> {
        self.call(
            "starknet_getBlockWithTxHashes",
            serde_json::json!([{ "block_number": block_number }]),
        )
        .await
    }

    async fn get_block_by_hash(&self, block_hash: &str) -> Result<BlockHeader, ProviderError> {
        self.call(
            "starknet_getBlockWithTxHashes",
            serde_json::json!([{ "block_hash": block_hash }]),
        )
        .await
    }

    async fn get_events(
        &self,
        from_block: u64,
        to_block: u64,
        address: Option<&str>,
        continuation_token: Option<&str>,
    ) -> Result<EventPage, ProviderError> {
        let mut filter = serde_json::json!({
            "from_block": { "block_number": from_block },
            "to_block": { "block_number": to_block },
            "chunk_size": EVENT_CHUNK_SIZE,
        });
        if let Some(address) = address {
            filter["address"] = serde_json::json!(address);
        }
        if let Some(token) = continuation_token {
            filter["continuation_token"] = serde_json::json!(token);
        }

        self.call("starknet_getEvents", serde_json::json!([filter])).await
    }
}

pub fn get(json_rpc_url: &str) -> Arc<JsonRpcProvider> {
    Arc::new(JsonRpcProvider::new(json_rpc_url))
}

/// Fetches `from_block..=to_block` headers with bounded parallelism into a
/// pre-sized slot array indexed by block offset, so out-of-order completion
/// cannot corrupt ordering. Any single failure fails the whole batch.
pub async fn fetch_blocks<P: Provider>(
    provider: &Arc<P>,
    from_block: u64,
    to_block: u64,
    max_concurrent: usize,
) -> Result<Vec<BlockHeader>, ProviderError> {
    let count = (to_block - from_block + 1) as usize;
    let mut slots: Vec<Option<BlockHeader>> = vec![None; count];

    let mut fetches = futures_util::stream::iter((from_block..=to_block).enumerate().map(
        |(slot, block_number)| {
            let provider = provider.clone();
            async move { (slot, provider.get_block_by_number(block_number).await) }
        },
    ))
    .buffer_unordered(max_concurrent);

    while let Some((slot, fetched)) = fetches.next().await {
        slots[slot] = Some(fetched?);
    }
    drop(fetches);

    let headers = slots
        .into_iter()
        .map(|slot| slot.expect("the join above fills every slot"))
        .collect();

    Ok(headers)
}

/// Fetches every event in `from_block..=to_block`, optionally filtered to one
/// address, driving continuation tokens until the node reports exhaustion.
pub async fn fetch_events<P: Provider>(
    provider: &Arc<P>,
    from_block: u64,
    to_block: u64,
    address: Option<&str>,
) -> Result<Vec<EmittedEvent>, ProviderError> {
    let mut events = Vec::new();
    let mut continuation_token: Option<String> = None;

    loop {
        let page = provider
            .get_events(from_block, to_block, address, continuation_token.as_deref())
            .await?;

        events.extend(page.events);

        match page.continuation_token {
            Some(token) => continuation_token = Some(token),
            None => break,
        }
    }

    Ok(events)
}
