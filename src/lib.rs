//! Client for deploying and operating a two-party Etch escrow contract on a
//! Fetch.ai ledger.
//!
//! The [`sdk`] module holds the protocol pieces: address and value codecs,
//! signing keys, transaction building and signing, the contract status codec
//! and the [`LedgerApi`](sdk::LedgerApi) boundary. [`commands`] drives them
//! for the `escrow-cli` binary.

pub mod commands;
pub mod config;
pub mod sdk;

pub use commands::Outcome;
pub use config::Config;
pub use sdk::{Address, ClientError, Entity, EscrowAction, LedgerApi, Transaction};
