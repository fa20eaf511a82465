pub mod codec;
pub mod contract;
pub mod deed;
pub mod entity;
pub mod error;
pub mod escrow;
pub mod http;
pub mod ledger;
pub mod prompt;
pub mod signatories;
pub mod status;
pub mod tx;

pub use codec::Address;
pub use contract::Contract;
pub use deed::{Deed, Operation};
pub use entity::Entity;
pub use error::{ClientError, Result};
pub use escrow::EscrowAction;
pub use http::HttpLedger;
pub use ledger::{CostReport, LedgerApi, RetryPolicy};
pub use prompt::{Prompter, ScriptedPrompter, TerminalPrompter};
pub use signatories::SignatorySet;
pub use status::ContractStatus;
pub use tx::{Transaction, Transfer, TxDigest};
