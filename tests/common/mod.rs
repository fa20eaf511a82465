//! In-memory ledger shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Value, json};

use etch_escrow_client::sdk::error::{ClientError, Result};
use etch_escrow_client::sdk::{Address, Entity, LedgerApi, Transaction, TxDigest};

pub const KEY_A: &str = "dbc95564f5671769f150faf93701a2514bfc496b387bfa9af675ba9f5510fe94";
pub const KEY_B: &str = "1111111111111111111111111111111111111111111111111111111111111111";
pub const KEY_C: &str = "2222222222222222222222222222222222222222222222222222222222222222";

pub fn address_of(hex_key: &str) -> Address {
    Entity::from_hex(hex_key).unwrap().address()
}

pub fn addr(b: u8) -> Address {
    Address::from_raw([b; 32])
}

/// Records every submission and moves balances like a very forgiving node:
/// the sender pays `charge` per transaction and transfers are applied as-is.
pub struct MockLedger {
    pub height: u64,
    pub charge: u64,
    balances: Mutex<HashMap<Address, u64>>,
    queries: Mutex<HashMap<(Address, String), (bool, Value)>>,
    deeds: Mutex<HashMap<Address, Value>>,
    submitted: Mutex<Vec<Transaction>>,
    synced: Mutex<Vec<TxDigest>>,
    validity_requests: Mutex<u32>,
    balance_reads: Mutex<u32>,
    balance_read_limit: Option<u32>,
    reject_submissions: bool,
}

impl Default for MockLedger {
    fn default() -> Self {
        Self {
            height: 500,
            charge: 7,
            balances: Mutex::new(HashMap::new()),
            queries: Mutex::new(HashMap::new()),
            deeds: Mutex::new(HashMap::new()),
            submitted: Mutex::new(Vec::new()),
            synced: Mutex::new(Vec::new()),
            validity_requests: Mutex::new(0),
            balance_reads: Mutex::new(0),
            balance_read_limit: None,
            reject_submissions: false,
        }
    }
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting() -> Self {
        Self {
            reject_submissions: true,
            ..Self::default()
        }
    }

    /// Balance reads beyond the first `reads` fail with a connection error.
    pub fn with_balance_reads_failing_after(self, reads: u32) -> Self {
        Self {
            balance_read_limit: Some(reads),
            ..self
        }
    }

    pub fn with_balance(self, address: Address, amount: u64) -> Self {
        self.balances.lock().unwrap().insert(address, amount);
        self
    }

    pub fn with_query(self, contract: Address, method: &str, success: bool, payload: Value) -> Self {
        self.queries
            .lock()
            .unwrap()
            .insert((contract, method.to_string()), (success, payload));
        self
    }

    pub fn with_status(self, contract: Address, fields: Value) -> Self {
        self.with_query(
            contract,
            "status",
            true,
            json!({"status": "success", "result": fields}),
        )
    }

    pub fn with_deed(self, address: Address, deed: Value) -> Self {
        self.deeds.lock().unwrap().insert(address, deed);
        self
    }

    pub fn balance_of(&self, address: &Address) -> u64 {
        self.balances.lock().unwrap().get(address).copied().unwrap_or(0)
    }

    pub fn submitted(&self) -> Vec<Transaction> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn synced(&self) -> Vec<TxDigest> {
        self.synced.lock().unwrap().clone()
    }

    pub fn validity_requests(&self) -> u32 {
        *self.validity_requests.lock().unwrap()
    }
}

#[async_trait]
impl LedgerApi for MockLedger {
    async fn balance(&self, address: &Address) -> Result<u64> {
        let mut reads = self.balance_reads.lock().unwrap();
        *reads += 1;
        if let Some(limit) = self.balance_read_limit
            && *reads > limit
        {
            return Err(ClientError::Connection("balance endpoint timed out".into()));
        }
        Ok(self.balance_of(address))
    }

    async fn query_contract(&self, contract: &Address, method: &str) -> Result<(bool, Value)> {
        Ok(self
            .queries
            .lock()
            .unwrap()
            .get(&(*contract, method.to_string()))
            .cloned()
            .unwrap_or((false, Value::Null)))
    }

    async fn query_deed(&self, address: &Address) -> Result<Value> {
        self.deeds
            .lock()
            .unwrap()
            .get(address)
            .cloned()
            .ok_or_else(|| ClientError::Ledger(format!("no deed for {address}")))
    }

    async fn set_validity_period(&self, tx: &mut Transaction) -> Result<()> {
        *self.validity_requests.lock().unwrap() += 1;
        tx.set_validity_window(self.height, self.height + 100)
    }

    async fn submit_signed_tx(&self, tx: &Transaction) -> Result<TxDigest> {
        if self.reject_submissions {
            return Err(ClientError::Ledger("insufficient funds".into()));
        }
        if !tx.verify_signatures() {
            return Err(ClientError::Ledger("bad signature".into()));
        }
        {
            let mut balances = self.balances.lock().unwrap();
            let sender = balances.entry(tx.from()).or_insert(0);
            *sender = sender.saturating_sub(self.charge);
            for t in tx.transfers() {
                let sender = balances.entry(tx.from()).or_insert(0);
                *sender = sender.saturating_sub(t.amount);
                *balances.entry(t.destination).or_insert(0) += t.amount;
            }
        }
        self.submitted.lock().unwrap().push(tx.clone());
        Ok(tx.digest())
    }

    async fn sync(&self, digests: &[TxDigest]) -> Result<()> {
        let known: Vec<TxDigest> = self.submitted().iter().map(Transaction::digest).collect();
        for d in digests {
            if !known.contains(d) {
                return Err(ClientError::Ledger(format!("unknown transaction {d}")));
            }
        }
        self.synced.lock().unwrap().extend_from_slice(digests);
        Ok(())
    }
}
