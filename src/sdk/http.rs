//! [`LedgerApi`] over a Fetch.ai node's HTTP/JSON API.

use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

use super::codec::Address;
use super::error::{ClientError, Result};
use super::ledger::LedgerApi;
use super::tx::{Transaction, TxDigest};

const BOOTSTRAP_URL: &str = "https://bootstrap.fetch.ai/endpoints/";
const TX_CONTENT_TYPE: &str = "application/vnd+fetch.transaction+json";
const TX_WIRE_VERSION: &str = "1.3";

/// Blocks a transaction stays valid for after the current height.
pub const DEFAULT_VALIDITY_PERIOD: u64 = 100;

const SYNC_POLL_INTERVAL: Duration = Duration::from_secs(1);
const SYNC_MAX_POLLS: u32 = 120;

/// Where a transaction is in its life, as reported by `/api/status/tx`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxProgress {
    Pending,
    Executed,
    Failed(String),
}

impl TxProgress {
    pub fn classify(status: &str) -> Self {
        match status {
            "Executed" => Self::Executed,
            "Unknown" | "Pending" | "Submitted" | "Mined" => Self::Pending,
            other => Self::Failed(other.to_string()),
        }
    }
}

/// Pull the height out of a `/api/status/chain?size=1` response.
pub fn parse_block_number(chain: &Value) -> Result<u64> {
    chain
        .get("chain")
        .and_then(|c| c.get(0))
        .and_then(|b| b.get("blockNumber"))
        .and_then(Value::as_u64)
        .ok_or_else(|| ClientError::Ledger(format!("unexpected chain status response: {chain}")))
}

/// Decode a JSON response body, keeping the status and raw text when it is not
/// JSON at all.
pub fn parse_json_body(status: StatusCode, body: &str) -> Result<Value> {
    serde_json::from_str(body).map_err(|e| {
        ClientError::Codec(format!("node answered {status} with a non-JSON body ({e}): {body}"))
    })
}

#[derive(Debug, Clone)]
pub struct HttpLedger {
    client: Client,
    base_url: String,
}

impl HttpLedger {
    /// Connect to `host:port` and check the node answers.
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let base_url = if host.starts_with("http://") || host.starts_with("https://") {
            format!("{}:{port}", host.trim_end_matches('/'))
        } else {
            format!("http://{host}:{port}")
        };
        Self::at(base_url).await
    }

    /// Resolve a named network through the bootstrap service, then connect.
    pub async fn connect_network(network: &str) -> Result<Self> {
        let client = Client::new();
        let endpoints: Value = client
            .get(BOOTSTRAP_URL)
            .query(&[("network", network)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let address = endpoints
            .as_array()
            .and_then(|list| list.iter().find_map(|e| e.get("address")?.as_str()))
            .ok_or_else(|| {
                ClientError::Connection(format!("no endpoints published for network {network}"))
            })?;
        Self::at(address.trim_end_matches('/').to_string()).await
    }

    async fn at(base_url: String) -> Result<Self> {
        let client = Client::new();
        client
            .get(format!("{base_url}/api/status"))
            .send()
            .await
            .map_err(|e| ClientError::Connection(format!("{base_url}: {e}")))?
            .error_for_status()
            .map_err(|e| ClientError::Connection(format!("{base_url}: {e}")))?;
        log::debug!("node at {base_url} is up");
        Ok(Self { client, base_url })
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<(bool, Value)> {
        let resp = self
            .client
            .post(format!("{}{path}", self.base_url))
            .json(body)
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;
        Ok((status.is_success(), parse_json_body(status, &body)?))
    }

    async fn block_number(&self) -> Result<u64> {
        let chain: Value = self
            .client
            .get(format!("{}/api/status/chain", self.base_url))
            .query(&[("size", "1")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        parse_block_number(&chain)
    }

    async fn tx_progress(&self, digest: &TxDigest) -> Result<TxProgress> {
        let status: Value = self
            .client
            .get(format!("{}/api/status/tx/{digest}", self.base_url))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let text = status.get("status").and_then(Value::as_str).unwrap_or("Unknown");
        Ok(TxProgress::classify(text))
    }
}

#[async_trait]
impl LedgerApi for HttpLedger {
    async fn balance(&self, address: &Address) -> Result<u64> {
        let (ok, payload) = self
            .post_json(
                "/api/contract/fetch/token/balance",
                &json!({ "address": address.to_string() }),
            )
            .await?;
        if !ok {
            return Err(ClientError::Ledger(format!(
                "balance query for {address} failed: {payload}"
            )));
        }
        payload
            .get("balance")
            .and_then(Value::as_u64)
            .ok_or_else(|| ClientError::Ledger(format!("malformed balance response: {payload}")))
    }

    async fn query_contract(&self, contract: &Address, method: &str) -> Result<(bool, Value)> {
        self.post_json(&format!("/api/contract/{contract}/{method}"), &json!({}))
            .await
    }

    async fn query_deed(&self, address: &Address) -> Result<Value> {
        let (ok, payload) = self
            .post_json(
                "/api/contract/fetch/token/queryDeed",
                &json!({ "address": address.to_string() }),
            )
            .await?;
        if !ok {
            return Err(ClientError::Ledger(format!(
                "failed to query deed for the {address} address"
            )));
        }
        Ok(payload)
    }

    async fn set_validity_period(&self, tx: &mut Transaction) -> Result<()> {
        let height = self.block_number().await?;
        tx.set_validity_window(height, height.saturating_add(DEFAULT_VALIDITY_PERIOD))
    }

    async fn submit_signed_tx(&self, tx: &Transaction) -> Result<TxDigest> {
        let local = tx.digest();
        let body = json!({
            "ver": TX_WIRE_VERSION,
            "data": STANDARD.encode(tx.to_wire_bytes()),
        });
        let resp = self
            .client
            .post(format!("{}/api/contract/submit", self.base_url))
            .header(reqwest::header::CONTENT_TYPE, TX_CONTENT_TYPE)
            .body(body.to_string())
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(ClientError::Ledger(format!(
                "node rejected transaction ({status}): {text}"
            )));
        }
        let reply: Value = resp.json().await?;
        match reply
            .get("txs")
            .and_then(|t| t.get(0))
            .and_then(Value::as_str)
            .map(str::parse::<TxDigest>)
        {
            Some(Ok(remote)) if remote != local => {
                log::warn!("node reports digest {remote}, computed {local}");
                Ok(remote)
            }
            _ => Ok(local),
        }
    }

    async fn sync(&self, digests: &[TxDigest]) -> Result<()> {
        for digest in digests {
            let mut polls = 0;
            loop {
                match self.tx_progress(digest).await? {
                    TxProgress::Executed => break,
                    TxProgress::Failed(status) => {
                        return Err(ClientError::Ledger(format!(
                            "transaction {digest} failed: {status}"
                        )));
                    }
                    TxProgress::Pending => {
                        polls += 1;
                        if polls >= SYNC_MAX_POLLS {
                            return Err(ClientError::Ledger(format!(
                                "transaction {digest} not executed after {SYNC_MAX_POLLS} polls"
                            )));
                        }
                        tokio::time::sleep(SYNC_POLL_INTERVAL).await;
                    }
                }
            }
            log::debug!("transaction {digest} executed");
        }
        Ok(())
    }
}
