//! `escrow-cli`: deploy and operate an Etch escrow contract on a Fetch.ai ledger.
//!
//! ```bash
//! escrow-cli deploy escrow.etch <OWNER> --transfers <SELLER>,10 <BUYER>,5
//! escrow-cli query <CONTRACT> status
//! escrow-cli action <CONTRACT> <FROM> deposit 1000
//! escrow-cli action <CONTRACT> withdraw-excess
//! ```

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use etch_escrow_client::commands::{
    Command, DEFAULT_PORT, Endpoint, KeysCommand, Outcome, connect, dispatch, keys_generate,
};
use etch_escrow_client::config::Config;
use etch_escrow_client::sdk::TerminalPrompter;

#[derive(Debug, Parser)]
#[command(name = "escrow-cli", version, about = "Etch escrow contract client")]
struct Cli {
    /// Ledger node host (defaults to FETCH_LEDGER_HOST, then 127.0.0.1)
    #[arg(long, global = true)]
    hostname: Option<String>,
    #[arg(long, global = true, default_value_t = DEFAULT_PORT)]
    port: u16,
    /// Named network resolved through the bootstrap service
    #[arg(long, global = true)]
    network: Option<String>,
    /// Machine-readable output for queries
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

async fn run(cli: Cli, config: Config) -> anyhow::Result<Outcome> {
    let mut prompter = TerminalPrompter;

    if let Command::Keys(KeysCommand::Generate) = cli.command {
        return Ok(keys_generate(&mut prompter));
    }

    let endpoint = Endpoint::resolve(
        cli.hostname.as_deref(),
        cli.port,
        cli.network.as_deref(),
        &config,
    );
    log::debug!("ledger endpoint: {endpoint:?}");
    let ledger = connect(&endpoint, &config)
        .await
        .context("connecting to the ledger")?;

    let outcome = dispatch(&ledger, &mut prompter, &config, &cli.command, cli.json).await?;
    Ok(outcome)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = Config::from_env();
    log::debug!("{config:?}");

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli, config)) {
        Ok(Outcome::Completed) => ExitCode::SUCCESS,
        Ok(Outcome::Aborted) => {
            log::info!("aborted by operator");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
