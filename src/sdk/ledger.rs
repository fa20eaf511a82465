//! The boundary to a ledger node, plus the helpers built on top of it.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::codec::Address;
use super::error::{ClientError, Result};
use super::prompt::Prompter;
use super::tx::{Transaction, TxDigest};

/// Operations the client needs from a ledger node.
#[async_trait]
pub trait LedgerApi: Send + Sync {
    /// Token balance of `address` in canonical units.
    async fn balance(&self, address: &Address) -> Result<u64>;

    /// Run a read-only contract query. Returns the transport-level success
    /// flag and the raw JSON payload.
    async fn query_contract(&self, contract: &Address, method: &str) -> Result<(bool, Value)>;

    /// The deed currently governing `address`, as the node reports it.
    async fn query_deed(&self, address: &Address) -> Result<Value>;

    /// Fill in the validity window from the current chain height.
    async fn set_validity_period(&self, tx: &mut Transaction) -> Result<()>;

    /// Hand a fully signed transaction to the node.
    async fn submit_signed_tx(&self, tx: &Transaction) -> Result<TxDigest>;

    /// Wait until every digest is executed.
    async fn sync(&self, digests: &[TxDigest]) -> Result<()>;
}

/// Submit `tx` after checking that every declared signer has signed.
pub async fn submit<L: LedgerApi + ?Sized>(ledger: &L, tx: &Transaction) -> Result<TxDigest> {
    tx.ensure_submittable()?;
    let digest = ledger.submit_signed_tx(tx).await?;
    log::info!("submitted {} ({})", digest, tx.action());
    Ok(digest)
}

/// Balance change observed across a tracked operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CostReport {
    pub before: u64,
    pub after: u64,
}

impl CostReport {
    /// `after - before`; negative when the operation cost tokens.
    pub fn delta(&self) -> i128 {
        i128::from(self.after) - i128::from(self.before)
    }
}

/// Run `op` and report through `prompter` how the balance of `address`
/// moved across it.
///
/// Errors from `op` propagate untouched and nothing is reported. The balance
/// reads are observational: when either one fails the outcome of `op` still
/// stands and the report is `None`. The figure is only as accurate as the
/// absence of unrelated traffic on `address`.
pub async fn track_cost<L, P, F, T>(
    ledger: &L,
    prompter: &mut P,
    address: &Address,
    message: &str,
    op: F,
) -> Result<(T, Option<CostReport>)>
where
    L: LedgerApi + ?Sized,
    P: Prompter + ?Sized,
    F: Future<Output = Result<T>>,
{
    let before = match ledger.balance(address).await {
        Ok(before) => Some(before),
        Err(e) => {
            log::warn!("balance of {address} unavailable, cost not tracked: {e}");
            None
        }
    };
    let value = op.await?;
    let Some(before) = before else {
        return Ok((value, None));
    };
    let report = match ledger.balance(address).await {
        Ok(after) => CostReport { before, after },
        Err(e) => {
            log::warn!("balance of {address} unavailable after the operation: {e}");
            return Ok((value, None));
        }
    };
    prompter.notify(&format!("{message}{} TOK", report.delta()));
    Ok((value, Some(report)))
}

/// How hard to try reaching a node before giving up.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 200,
            delay: Duration::from_secs(5),
        }
    }
}

/// Call `connect` until it succeeds or the policy is exhausted.
///
/// This waits for a node that is still starting; the last error is returned
/// as a [`ClientError::Connection`].
pub async fn connect_with_retry<T, F, Fut>(
    policy: RetryPolicy,
    label: &str,
    mut connect: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_err = String::from("no connection attempt made");
    for attempt in 1..=policy.attempts {
        log::info!("Connecting to {label} ...");
        match connect().await {
            Ok(client) => return Ok(client),
            Err(e) => {
                log::error!(
                    "Unable to connect to {label} (attempt {attempt}/{}): {e}",
                    policy.attempts
                );
                last_err = e.to_string();
                if attempt < policy.attempts {
                    tokio::time::sleep(policy.delay).await;
                }
            }
        }
    }
    Err(ClientError::Connection(format!(
        "{label} unreachable after {} attempts: {last_err}",
        policy.attempts
    )))
}
