//! Process configuration, read once from the environment at startup.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use zeroize::Zeroizing;

use crate::sdk::ledger::RetryPolicy;

pub const ENV_LEDGER_HOST: &str = "FETCH_LEDGER_HOST";
pub const ENV_SERVICE_ACCOUNT_KEY: &str = "FETCH_SERVICE_ACCOUNT_KEY";
pub const ENV_CONTRACT_NONCE: &str = "ETCH_CONTRACT_NONCE";

pub const DEFAULT_CONTRACT_NONCE: &str = "ioufqiubviq";

#[derive(Clone)]
pub struct Config {
    /// Ledger host used when `--hostname` and `--network` are both absent.
    pub ledger_host: Option<String>,
    /// Key used when the operator submits an empty key entry.
    pub service_account_key: Option<Zeroizing<String>>,
    /// Nonce for `deploy` when none is given on the command line.
    pub contract_nonce: String,
    pub connect_attempts: u32,
    pub connect_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            ledger_host: None,
            service_account_key: None,
            contract_nonce: DEFAULT_CONTRACT_NONCE.to_string(),
            connect_attempts: retry.attempts,
            connect_delay: retry.delay,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Build from explicit `(name, value)` pairs. Empty values count as unset.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(_, v)| !v.trim().is_empty())
            .collect();

        Self {
            ledger_host: vars.remove(ENV_LEDGER_HOST),
            service_account_key: vars.remove(ENV_SERVICE_ACCOUNT_KEY).map(Zeroizing::new),
            contract_nonce: vars
                .remove(ENV_CONTRACT_NONCE)
                .unwrap_or_else(|| DEFAULT_CONTRACT_NONCE.to_string()),
            ..Self::default()
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.connect_attempts,
            delay: self.connect_delay,
        }
    }

    pub fn fallback_key(&self) -> Option<&str> {
        self.service_account_key.as_ref().map(|k| k.as_str())
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("ledger_host", &self.ledger_host)
            .field(
                "service_account_key",
                &self.service_account_key.as_ref().map(|_| "<redacted>"),
            )
            .field("contract_nonce", &self.contract_nonce)
            .field("connect_attempts", &self.connect_attempts)
            .field("connect_delay", &self.connect_delay)
            .finish()
    }
}
