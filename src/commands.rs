//! Command layer behind `escrow-cli`.
//!
//! Each command takes the ledger and the prompter as parameters so it can be
//! driven against an in-memory ledger and scripted answers.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};
use serde_json::json;

use crate::config::Config;
use crate::sdk::codec::Address;
use crate::sdk::contract::Contract;
use crate::sdk::deed::{Deed, Operation, SigneeWeight};
use crate::sdk::entity::Entity;
use crate::sdk::error::{ClientError, Result};
use crate::sdk::escrow::{
    DEFAULT_ACTION_FEE, EscrowAction, query_deposited_balance, query_status, run_action,
    sign_submit_sync,
};
use crate::sdk::http::HttpLedger;
use crate::sdk::ledger::{LedgerApi, connect_with_retry, track_cost};
use crate::sdk::prompt::Prompter;
use crate::sdk::signatories::collect_signatories;
use crate::sdk::tx::{Transfer, build_deed_tx, build_deploy_tx, parse_amount};

pub const DEFAULT_DEPLOY_FEE: u64 = 600_000;
pub const DEFAULT_DEED_FEE: u64 = 10_000;
pub const DEFAULT_PORT: u16 = 8000;
const DEFAULT_HOST: &str = "127.0.0.1";

/// How a command ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    /// The operator declined a gate; nothing was submitted.
    Aborted,
}

impl Outcome {
    /// Fold an operator abort into [`Outcome::Aborted`].
    pub fn from_result<T>(result: Result<T>) -> Result<Self> {
        match result {
            Ok(_) => Ok(Self::Completed),
            Err(ClientError::UserAborted) => Ok(Self::Aborted),
            Err(e) => Err(e),
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Deploy an Etch contract
    Deploy(DeployArgs),
    /// Query a deployed escrow contract
    Query(QueryArgs),
    /// Send an escrow action
    Action(ActionArgs),
    /// Show or amend the deed of an address
    Deed(DeedArgs),
    /// Key utilities
    #[command(subcommand)]
    Keys(KeysCommand),
}

#[derive(Debug, Args)]
pub struct DeployArgs {
    /// Etch source file
    pub contract_file: PathBuf,
    /// Address that owns the contract and pays for its creation
    pub owner: Address,
    /// Deployment nonce (defaults to ETCH_CONTRACT_NONCE)
    pub nonce: Option<String>,
    #[arg(long, default_value_t = DEFAULT_DEPLOY_FEE)]
    pub fee: u64,
    /// Transfers executed with the deployment, as ADDRESS,AMOUNT
    #[arg(long, num_args = 1..)]
    pub transfers: Vec<Transfer>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum QueryKind {
    Status,
    Balance,
}

#[derive(Debug, Args)]
pub struct QueryArgs {
    pub contract: Address,
    #[arg(value_enum)]
    pub kind: QueryKind,
}

#[derive(Debug, Args)]
pub struct ActionArgs {
    pub contract: Address,
    /// Sender address; not needed for withdraw-excess
    pub from: Option<Address>,
    #[arg(long, default_value_t = DEFAULT_ACTION_FEE)]
    pub fee: u64,
    #[command(subcommand)]
    pub action: ActionKind,
}

#[derive(Debug, Clone, Copy, Subcommand)]
pub enum ActionKind {
    /// Lock AMOUNT canonical units in the contract
    Deposit {
        #[arg(value_parser = parse_amount)]
        amount: u64,
    },
    Accept,
    Cancel,
    Kill,
    /// Recover tokens above the escrowed amount
    WithdrawExcess,
}

impl From<ActionKind> for EscrowAction {
    fn from(kind: ActionKind) -> Self {
        match kind {
            ActionKind::Deposit { amount } => Self::Deposit(amount),
            ActionKind::Accept => Self::Accept,
            ActionKind::Cancel => Self::Cancel,
            ActionKind::Kill => Self::Kill,
            ActionKind::WithdrawExcess => Self::WithdrawExcess,
        }
    }
}

#[derive(Debug, Args)]
pub struct DeedArgs {
    pub address: Address,
    #[command(subcommand)]
    pub command: DeedCommand,
}

#[derive(Debug, Subcommand)]
pub enum DeedCommand {
    Show,
    Set(DeedSetArgs),
}

#[derive(Debug, Args)]
pub struct DeedSetArgs {
    /// Signee and voting weight, as ADDRESS:WEIGHT
    #[arg(long = "signee", required = true, num_args = 1..)]
    pub signees: Vec<SigneeWeight>,
    #[arg(long)]
    pub amend: u64,
    #[arg(long)]
    pub transfer: Option<u64>,
    #[arg(long)]
    pub execute: Option<u64>,
    #[arg(long, default_value_t = DEFAULT_DEED_FEE)]
    pub fee: u64,
}

impl DeedSetArgs {
    pub fn to_deed(&self) -> Deed {
        let mut deed = self
            .signees
            .iter()
            .fold(Deed::new(), |deed, s| deed.signee(s.address, s.weight))
            .threshold(Operation::Amend, self.amend);
        if let Some(n) = self.transfer {
            deed = deed.threshold(Operation::Transfer, n);
        }
        if let Some(n) = self.execute {
            deed = deed.threshold(Operation::Execute, n);
        }
        deed
    }
}

#[derive(Debug, Clone, Copy, Subcommand)]
pub enum KeysCommand {
    /// Print a fresh random key and its address
    Generate,
}

/// Where to find the ledger node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Host { host: String, port: u16 },
    Network(String),
}

impl Endpoint {
    /// `--network` wins over `--hostname`, which wins over `FETCH_LEDGER_HOST`.
    pub fn resolve(
        hostname: Option<&str>,
        port: u16,
        network: Option<&str>,
        config: &Config,
    ) -> Self {
        if let Some(name) = network {
            return Self::Network(name.to_string());
        }
        let host = hostname
            .or(config.ledger_host.as_deref())
            .unwrap_or(DEFAULT_HOST);
        Self::Host {
            host: host.to_string(),
            port,
        }
    }
}

/// Connect to the node, retrying per the configured policy.
pub async fn connect(endpoint: &Endpoint, config: &Config) -> Result<HttpLedger> {
    match endpoint {
        Endpoint::Host { host, port } => {
            let label = format!("{host}:{port}");
            connect_with_retry(config.retry_policy(), &label, || {
                HttpLedger::connect(host, *port)
            })
            .await
        }
        Endpoint::Network(name) => {
            connect_with_retry(config.retry_policy(), name, || {
                HttpLedger::connect_network(name)
            })
            .await
        }
    }
}

/// Run a command against `ledger`.
pub async fn dispatch<L: LedgerApi + ?Sized>(
    ledger: &L,
    prompter: &mut dyn Prompter,
    config: &Config,
    command: &Command,
    json: bool,
) -> Result<Outcome> {
    match command {
        Command::Deploy(args) => deploy(ledger, prompter, config, args).await,
        Command::Query(args) => query(ledger, prompter, args, json).await,
        Command::Action(args) => action(ledger, prompter, config, args).await,
        Command::Deed(args) => match &args.command {
            DeedCommand::Show => deed_show(ledger, prompter, &args.address, json).await,
            DeedCommand::Set(set) => deed_set(ledger, prompter, config, &args.address, set).await,
        },
        Command::Keys(KeysCommand::Generate) => Ok(keys_generate(prompter)),
    }
}

pub async fn deploy<L: LedgerApi + ?Sized>(
    ledger: &L,
    prompter: &mut dyn Prompter,
    config: &Config,
    args: &DeployArgs,
) -> Result<Outcome> {
    let source = std::fs::read_to_string(&args.contract_file)?;
    let nonce = args.nonce.as_deref().unwrap_or(config.contract_nonce.as_str());
    let contract = Contract::new(source, args.owner, nonce.as_bytes());

    prompter.notify(&format!("Contract address: {}", contract.address()));
    prompter.notify(&format!("Owner:            {}", contract.owner()));
    prompter.notify(&format!("Nonce:            {nonce}"));
    prompter.notify(&format!("Source digest:    {}", hex::encode(contract.digest())));
    prompter.notify(&format!("Fee limit:        {}", args.fee));
    if !prompter.confirm("\nDeploy the contract with the details above?")? {
        prompter.notify("Deployment aborted.");
        return Ok(Outcome::Aborted);
    }

    if !args.transfers.is_empty() {
        prompter.notify("Transfers executed with the deployment:");
        for (i, t) in args.transfers.iter().enumerate() {
            prompter.notify(&format!("  [{i}] {} -> {}", t.amount, t.destination));
        }
        if !prompter.confirm("\nExecute the transfers above?")? {
            prompter.notify("Deployment aborted.");
            return Ok(Outcome::Aborted);
        }
    }

    let result: Result<_> = async {
        let signatories = collect_signatories(&mut *prompter, None, config.fallback_key())?;
        if !signatories.contains(&contract.owner()) {
            log::warn!("owner {} is not among the signatories", contract.owner());
        }
        let tx = build_deploy_tx(&contract, args.fee, &signatories, &args.transfers)?;
        track_cost(
            ledger,
            &mut *prompter,
            &contract.owner(),
            "Cost of creation: ",
            sign_submit_sync(ledger, tx, &signatories),
        )
        .await
    }
    .await;

    let outcome = Outcome::from_result(result)?;
    if outcome == Outcome::Completed {
        prompter.notify(&format!("Contract deployed at {}", contract.address()));
    }
    Ok(outcome)
}

pub async fn query<L: LedgerApi + ?Sized>(
    ledger: &L,
    prompter: &mut dyn Prompter,
    args: &QueryArgs,
    json: bool,
) -> Result<Outcome> {
    match args.kind {
        QueryKind::Status => {
            let status = query_status(ledger, &args.contract).await?;
            if json {
                prompter.notify(&serde_json::to_string_pretty(&status.to_fields())?);
            } else {
                prompter.notify(&format!("Status of {}:\n{status}", args.contract));
            }
        }
        QueryKind::Balance => {
            let balance = query_deposited_balance(ledger, &args.contract).await?;
            if json {
                prompter.notify(&json!({ "deposited_balance": balance }).to_string());
            } else {
                prompter.notify(&format!("Deposited balance: {balance} [Canonical FET]"));
            }
        }
    }
    Ok(Outcome::Completed)
}

pub async fn action<L: LedgerApi + ?Sized>(
    ledger: &L,
    prompter: &mut dyn Prompter,
    config: &Config,
    args: &ActionArgs,
) -> Result<Outcome> {
    let result = run_action(
        ledger,
        prompter,
        args.contract,
        args.from,
        args.action.into(),
        args.fee,
        config.fallback_key(),
    )
    .await;
    Outcome::from_result(result)
}

pub async fn deed_show<L: LedgerApi + ?Sized>(
    ledger: &L,
    prompter: &mut dyn Prompter,
    address: &Address,
    json: bool,
) -> Result<Outcome> {
    let deed = ledger.query_deed(address).await?;
    if json {
        prompter.notify(&deed.to_string());
    } else {
        prompter.notify(&format!(
            "Deed of {address}:\n{}",
            serde_json::to_string_pretty(&deed)?
        ));
    }
    Ok(Outcome::Completed)
}

pub async fn deed_set<L: LedgerApi + ?Sized>(
    ledger: &L,
    prompter: &mut dyn Prompter,
    config: &Config,
    address: &Address,
    args: &DeedSetArgs,
) -> Result<Outcome> {
    let deed = args.to_deed();
    deed.validate()?;

    prompter.notify(&format!("New deed for {address}:"));
    for (signee, weight) in &deed.signees {
        prompter.notify(&format!("  signee {signee} weight {weight}"));
    }
    for (op, threshold) in &deed.thresholds {
        prompter.notify(&format!("  {op} threshold {threshold}"));
    }
    if !prompter.confirm("\nAmend the deed?")? {
        prompter.notify("Deed amendment aborted.");
        return Ok(Outcome::Aborted);
    }

    let result: Result<_> = async {
        let signatories = collect_signatories(&mut *prompter, None, config.fallback_key())?;
        let tx = build_deed_tx(*address, &deed, args.fee, &signatories)?;
        track_cost(
            ledger,
            &mut *prompter,
            address,
            "Cost of deed amendment: ",
            sign_submit_sync(ledger, tx, &signatories),
        )
        .await
    }
    .await;
    Outcome::from_result(result)
}

pub fn keys_generate(prompter: &mut dyn Prompter) -> Outcome {
    let entity = Entity::generate();
    prompter.notify(&format!("Address:     {}", entity.address()));
    prompter.notify(&format!("Private key: {}", entity.secret_hex().as_str()));
    Outcome::Completed
}
