use sha2::{Digest, Sha256};

use super::codec::Address;

/// Etch contract source bound to an owner and a deployment nonce.
///
/// The contract address is a pure function of `(owner, source, nonce)`, so it
/// is known (and shown to the operator) before anything is signed.
#[derive(Debug, Clone)]
pub struct Contract {
    owner: Address,
    source: String,
    nonce: Vec<u8>,
    digest: [u8; 32],
    address: Address,
}

impl Contract {
    pub fn new(source: impl Into<String>, owner: Address, nonce: &[u8]) -> Self {
        let source = source.into();
        let digest: [u8; 32] = Sha256::digest(source.as_bytes()).into();

        let mut hasher = Sha256::new();
        hasher.update(owner.as_bytes());
        hasher.update(digest);
        hasher.update(nonce);
        let address = Address::from_raw(hasher.finalize().into());

        Self {
            owner,
            source,
            nonce: nonce.to_vec(),
            digest,
            address,
        }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn nonce(&self) -> &[u8] {
        &self.nonce
    }

    /// SHA-256 of the source text.
    pub fn digest(&self) -> &[u8; 32] {
        &self.digest
    }

    pub fn address(&self) -> Address {
        self.address
    }
}
