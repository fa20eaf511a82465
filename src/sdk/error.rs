use thiserror::Error;

/// Everything that can go wrong between an operator intent and a finalized transaction.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The node stayed unreachable for the whole retry budget.
    #[error("connection error: {0}")]
    Connection(String),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("missing on-chain state: {0}")]
    MissingState(String),

    /// The operator declined a confirmation gate or a key re-entry.
    #[error("aborted by operator")]
    UserAborted,

    #[error("signing error: {0}")]
    Signing(String),

    #[error("ledger error: {0}")]
    Ledger(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() {
            Self::Connection(format!("{e}"))
        } else {
            Self::Ledger(format!("{e}"))
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        Self::Codec(format!("{e}"))
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
