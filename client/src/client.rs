//! JSON-RPC client for a full node.

use crate::{
    ledger::{EventCursor, EventPage, Ledger, LedgerEvent},
    tx::Transaction,
    Error, Result,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::{Rng, RngCore};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};
use suu_types::Address;
use tracing::{debug, warn};
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const TRANSACTION_NOT_FOUND: &str = "Could not find the referenced transaction";

/// Retry behavior for HTTP requests.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Retry requests that may have side effects.
    pub retry_non_idempotent: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(2),
            retry_non_idempotent: false,
        }
    }
}

fn jittered_backoff(rng: &mut impl RngCore, backoff: Duration) -> Duration {
    let backoff_ms = backoff.as_millis() as u64;
    if backoff_ms <= 1 {
        return backoff;
    }

    // "Equal jitter": delay is in [backoff/2, backoff].
    let half_ms = backoff_ms / 2;
    let jitter_ms = rng.gen_range(0..=half_ms);
    Duration::from_millis(half_ms.saturating_add(jitter_ms))
}

fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DevInspectResults {
    #[serde(default)]
    effects: Option<InspectEffects>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    results: Option<Vec<ExecutionResult>>,
}

#[derive(Deserialize)]
struct InspectEffects {
    status: ExecutionStatus,
}

#[derive(Deserialize)]
struct ExecutionStatus {
    status: String,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecutionResult {
    #[serde(default)]
    return_values: Vec<(Vec<u8>, String)>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcEvent {
    id: EventCursor,
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    parsed_json: Value,
    #[serde(default)]
    timestamp_ms: Option<String>,
}

impl From<RpcEvent> for LedgerEvent {
    fn from(event: RpcEvent) -> Self {
        Self {
            event_type: event.event_type,
            parsed: event.parsed_json,
            timestamp_ms: event.timestamp_ms.and_then(|ms| ms.parse().ok()),
            cursor: Some(event.id),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcEventPage {
    data: Vec<RpcEvent>,
    #[serde(default)]
    next_cursor: Option<EventCursor>,
    #[serde(default)]
    has_next_page: bool,
}

#[derive(Deserialize)]
struct RpcTransactionBlock {
    #[serde(default)]
    events: Option<Vec<RpcEvent>>,
}

/// Client for a full node's JSON-RPC endpoint.
pub struct Client {
    pub base_url: Url,
    pub http_client: reqwest::Client,
    retry_policy: RetryPolicy,
    inspect_sender: Address,
    request_id: AtomicU64,
}

impl Client {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)?;
        match base_url.scheme() {
            "http" | "https" => {}
            scheme => return Err(Error::InvalidScheme(scheme.to_string())),
        }
        let http_client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            base_url,
            http_client,
            retry_policy: RetryPolicy::default(),
            inspect_sender: Address::ZERO,
            request_id: AtomicU64::new(1),
        })
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Sender used for read-only inspection calls.
    pub fn with_inspect_sender(mut self, sender: Address) -> Self {
        self.inspect_sender = sender;
        self
    }

    /// POSTs a JSON body, retrying transient failures when the request is idempotent (or when
    /// the policy allows retrying non-idempotent requests).
    pub async fn post_json_with_retry(
        &self,
        url: Url,
        body: &Value,
        idempotent: bool,
    ) -> Result<reqwest::Response> {
        let attempts = if idempotent || self.retry_policy.retry_non_idempotent {
            self.retry_policy.max_attempts.max(1)
        } else {
            1
        };
        let mut backoff = self.retry_policy.initial_backoff;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let retry = match self.http_client.post(url.clone()).json(body).send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status();
                    if attempt >= attempts || !is_retryable_status(status) {
                        let text = response.text().await.unwrap_or_default();
                        return Err(Error::FailedWithBody {
                            status,
                            body: format!("POST {url}: {text}"),
                        });
                    }
                    warn!(%url, attempt, %status, "retrying request");
                    true
                }
                Err(err) => {
                    if attempt >= attempts || !(err.is_timeout() || err.is_connect()) {
                        return Err(err.into());
                    }
                    warn!(%url, attempt, error = %err, "retrying request");
                    true
                }
            };
            if retry {
                let delay = jittered_backoff(&mut rand::thread_rng(), backoff);
                tokio::time::sleep(delay).await;
                backoff = backoff
                    .saturating_mul(2)
                    .min(self.retry_policy.max_backoff);
            }
        }
    }

    /// Issues one JSON-RPC call and returns its `result`.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.request_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        debug!(method, id, "rpc request");
        let response = self
            .post_json_with_retry(self.base_url.clone(), &body, true)
            .await?;
        let response: RpcResponse = response.json().await?;
        if let Some(error) = response.error {
            debug!(method, id, code = error.code, "rpc error");
            return Err(Error::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        response.result.ok_or(Error::UnexpectedResponse)
    }

    /// Initial version of a shared object, needed to reference it from a transaction.
    pub async fn initial_shared_version(&self, id: &Address) -> Result<u64> {
        let result = self
            .call("sui_getObject", json!([id.to_string(), { "showOwner": true }]))
            .await?;
        let version = result
            .pointer("/data/owner/Shared/initial_shared_version")
            .ok_or(Error::UnexpectedResponse)?;
        match version {
            Value::Number(number) => number.as_u64(),
            Value::String(text) => text.parse().ok(),
            _ => None,
        }
        .ok_or(Error::UnexpectedResponse)
    }
}

impl Ledger for Client {
    async fn query(&self, call: &Transaction) -> Result<Vec<Vec<u8>>> {
        let tx_bytes = BASE64.encode(call.to_kind_bytes());
        let result = self
            .call(
                "sui_devInspectTransactionBlock",
                json!([self.inspect_sender.to_string(), tx_bytes, null, null]),
            )
            .await?;
        let inspected: DevInspectResults = serde_json::from_value(result)?;
        if let Some(error) = inspected.error {
            return Err(Error::Query(error));
        }
        if let Some(effects) = inspected.effects {
            if effects.status.status != "success" {
                return Err(Error::Query(
                    effects.status.error.unwrap_or(effects.status.status),
                ));
            }
        }
        let last = inspected
            .results
            .and_then(|results| results.into_iter().last())
            .ok_or(Error::UnexpectedResponse)?;
        Ok(last
            .return_values
            .into_iter()
            .map(|(bytes, _)| bytes)
            .collect())
    }

    async fn query_events(
        &self,
        event_type: &str,
        cursor: Option<EventCursor>,
        limit: usize,
        descending: bool,
    ) -> Result<EventPage> {
        let result = self
            .call(
                "suix_queryEvents",
                json!([{ "MoveEventType": event_type }, cursor, limit, descending]),
            )
            .await?;
        let page: RpcEventPage = serde_json::from_value(result)?;
        Ok(EventPage {
            data: page.data.into_iter().map(LedgerEvent::from).collect(),
            next_cursor: page.next_cursor,
            has_next_page: page.has_next_page,
        })
    }

    async fn transaction_events(&self, digest: &str) -> Result<Option<Vec<LedgerEvent>>> {
        let result = self
            .call(
                "sui_getTransactionBlock",
                json!([digest, { "showEvents": true }]),
            )
            .await;
        let block: RpcTransactionBlock = match result {
            Ok(result) => serde_json::from_value(result)?,
            Err(Error::Rpc { message, .. }) if message.contains(TRANSACTION_NOT_FOUND) => {
                return Ok(None)
            }
            Err(err) => return Err(err),
        };
        Ok(Some(
            block
                .events
                .unwrap_or_default()
                .into_iter()
                .map(LedgerEvent::from)
                .collect(),
        ))
    }

    async fn object_fields(&self, id: &Address) -> Result<Option<Value>> {
        let result = self
            .call(
                "sui_getObject",
                json!([id.to_string(), { "showContent": true }]),
            )
            .await?;
        if result.get("error").is_some_and(|error| !error.is_null()) {
            return Ok(None);
        }
        Ok(result.pointer("/data/content/fields").cloned())
    }
}
