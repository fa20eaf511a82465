use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::codec::Address;
use super::error::{ClientError, Result};

/// Operations a deed can put a signature threshold on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Amend,
    Transfer,
    Execute,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Amend => "amend",
            Self::Transfer => "transfer",
            Self::Execute => "execute",
        })
    }
}

/// Multi-signature policy for an address: who may sign, with what weight,
/// and how much combined weight each operation needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deed {
    pub signees: BTreeMap<Address, u64>,
    pub thresholds: BTreeMap<Operation, u64>,
}

impl Deed {
    pub fn new() -> Self {
        Self {
            signees: BTreeMap::new(),
            thresholds: BTreeMap::new(),
        }
    }

    pub fn signee(mut self, address: Address, weight: u64) -> Self {
        self.signees.insert(address, weight);
        self
    }

    pub fn threshold(mut self, operation: Operation, weight: u64) -> Self {
        self.thresholds.insert(operation, weight);
        self
    }

    pub fn total_weight(&self) -> u64 {
        self.signees.values().fold(0u64, |acc, w| acc.saturating_add(*w))
    }

    /// Reject deeds the ledger would refuse, or that would lock the address.
    pub fn validate(&self) -> Result<()> {
        if self.signees.is_empty() {
            return Err(ClientError::InvalidConfig("deed needs at least one signee".into()));
        }
        if let Some((addr, _)) = self.signees.iter().find(|(_, w)| **w == 0) {
            return Err(ClientError::InvalidConfig(format!(
                "signee {addr} has zero voting weight"
            )));
        }
        if !self.thresholds.contains_key(&Operation::Amend) {
            return Err(ClientError::InvalidConfig(
                "deed must define an amend threshold".into(),
            ));
        }
        let total = self.total_weight();
        for (op, threshold) in &self.thresholds {
            if *threshold == 0 {
                return Err(ClientError::InvalidConfig(format!(
                    "{op} threshold must be > 0"
                )));
            }
            if *threshold > total {
                return Err(ClientError::InvalidConfig(format!(
                    "{op} threshold {threshold} exceeds total signee weight {total}"
                )));
            }
        }
        Ok(())
    }
}

impl Default for Deed {
    fn default() -> Self {
        Self::new()
    }
}

/// A `ADDRESS:WEIGHT` signee entry as given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigneeWeight {
    pub address: Address,
    pub weight: u64,
}

impl FromStr for SigneeWeight {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        let (addr, weight) = s.split_once(':').ok_or_else(|| {
            ClientError::InvalidConfig(format!("signee \"{s}\" must look like ADDRESS:WEIGHT"))
        })?;
        let weight = weight
            .trim()
            .parse::<u64>()
            .map_err(|e| ClientError::InvalidConfig(format!("signee weight \"{weight}\": {e}")))?;
        Ok(Self {
            address: addr.trim().parse()?,
            weight,
        })
    }
}
