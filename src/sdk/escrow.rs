//! Escrow contract actions: picking the recipe for an operator intent and
//! driving it from unsigned transaction to executed digest.

use std::fmt;

use serde_json::Value;

use super::codec::{Address, decode_u64};
use super::error::{ClientError, Result};
use super::ledger::{LedgerApi, submit, track_cost};
use super::prompt::Prompter;
use super::signatories::{SignatorySet, collect_signatories};
use super::status::{ContractStatus, decode_status_response};
use super::tx::{Transaction, TxDigest, build_action_tx, sign_all};

/// Default charge limit for an escrow action.
pub const DEFAULT_ACTION_FEE: u64 = 10_000;

/// What the operator wants the escrow contract to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscrowAction {
    /// Lock `amount` tokens in the contract; the transfer rides in the same tx.
    Deposit(u64),
    Accept,
    Cancel,
    Kill,
    /// Recover tokens above the escrowed amount. Sent from the contract's
    /// own escrow address.
    WithdrawExcess,
}

impl EscrowAction {
    /// Entry point name the contract exposes for this action.
    pub fn on_chain_name(&self) -> &'static str {
        match self {
            Self::Deposit(_) => "deposit",
            Self::Accept => "accept",
            Self::Cancel => "cancel",
            Self::Kill => "kill",
            Self::WithdrawExcess => "withdrawExcessBalance",
        }
    }
}

impl fmt::Display for EscrowAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deposit(amount) => write!(f, "deposit {amount}"),
            Self::WithdrawExcess => f.write_str("withdraw-excess"),
            other => f.write_str(other.on_chain_name()),
        }
    }
}

/// Query and decode the contract's `status`.
///
/// A failed query is [`ClientError::MissingState`]; a malformed answer is a
/// codec error.
pub async fn query_status<L: LedgerApi + ?Sized>(
    ledger: &L,
    contract: &Address,
) -> Result<ContractStatus> {
    let (success, payload) = ledger.query_contract(contract, "status").await?;
    decode_status_response(success, &payload)?.ok_or_else(|| {
        ClientError::MissingState(format!("status query on {contract} failed: {payload}"))
    })
}

/// Query how many tokens the contract holds as deposits.
pub async fn query_deposited_balance<L: LedgerApi + ?Sized>(
    ledger: &L,
    contract: &Address,
) -> Result<u64> {
    let (success, payload) = ledger.query_contract(contract, "deposited_balance").await?;
    if !success || payload.get("status").and_then(Value::as_str) != Some("success") {
        return Err(ClientError::MissingState(format!(
            "deposited balance query on {contract} failed: {payload}"
        )));
    }
    match payload.get("result") {
        Some(Value::String(encoded)) => decode_u64(encoded),
        Some(Value::Number(n)) => n
            .as_u64()
            .ok_or_else(|| ClientError::Codec(format!("deposited balance {n} is not a u64"))),
        other => Err(ClientError::Codec(format!(
            "unexpected deposited balance result: {other:?}"
        ))),
    }
}

/// Work out which address the action is sent from.
///
/// `withdraw-excess` ignores `from` and uses the `escrow` address found in
/// the contract's status; every other action needs `from`.
pub async fn resolve_sender<L: LedgerApi + ?Sized>(
    ledger: &L,
    contract: &Address,
    action: EscrowAction,
    from: Option<Address>,
) -> Result<Address> {
    if action == EscrowAction::WithdrawExcess {
        let status = query_status(ledger, contract).await?;
        return status.escrow.ok_or_else(|| {
            ClientError::MissingState(format!("contract {contract} reports no escrow address"))
        });
    }
    from.ok_or_else(|| {
        ClientError::InvalidConfig(format!("`{action}` needs a from address"))
    })
}

/// Build the unsigned transaction for `action`.
pub fn build_escrow_tx(
    action: EscrowAction,
    sender: Address,
    contract: Address,
    fee: u64,
    signatories: &SignatorySet,
) -> Result<Transaction> {
    let mut tx = build_action_tx(
        sender,
        contract,
        action.on_chain_name(),
        fee,
        signatories,
        &[],
    )?;
    if let EscrowAction::Deposit(amount) = action {
        tx.add_transfer(contract, amount)?;
    }
    Ok(tx)
}

/// Validity window, signatures, submission and sync for a built transaction.
///
/// An empty signatory set fails before the node is contacted.
pub async fn sign_submit_sync<L: LedgerApi + ?Sized>(
    ledger: &L,
    mut tx: Transaction,
    signatories: &SignatorySet,
) -> Result<TxDigest> {
    if signatories.is_empty() {
        return Err(ClientError::Signing(format!(
            "no signatories collected for {}",
            tx.action()
        )));
    }
    ledger.set_validity_period(&mut tx).await?;
    sign_all(&mut tx, signatories)?;
    log::debug!("signed transaction:\n{tx}");
    let digest = submit(ledger, &tx).await?;
    ledger.sync(&[digest]).await?;
    Ok(digest)
}

/// Run an escrow action end to end and report what it cost the sender.
pub async fn run_action<L, P>(
    ledger: &L,
    prompter: &mut P,
    contract: Address,
    from: Option<Address>,
    action: EscrowAction,
    fee: u64,
    fallback_key: Option<&str>,
) -> Result<TxDigest>
where
    L: LedgerApi + ?Sized,
    P: Prompter + ?Sized,
{
    let sender = resolve_sender(ledger, &contract, action, from).await?;
    prompter.notify(&format!("{action} on {contract} from {sender}"));

    let signatories = collect_signatories(prompter, None, fallback_key)?;
    let tx = build_escrow_tx(action, sender, contract, fee, &signatories)?;

    let (digest, _) = track_cost(
        ledger,
        prompter,
        &sender,
        &format!("Cost of {action} action Tx: "),
        sign_submit_sync(ledger, tx, &signatories),
    )
    .await?;
    log::info!("{action} executed as {digest}");
    Ok(digest)
}
