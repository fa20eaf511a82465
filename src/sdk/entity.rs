use std::fmt;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use rand::thread_rng;
use secp256k1::{Message, PublicKey, SECP256K1, SecretKey, ecdsa::Signature};
use zeroize::Zeroizing;

use super::codec::Address;
use super::error::{ClientError, Result};

/// Length of a compact ECDSA signature.
pub const SIGNATURE_LEN: usize = 64;

/// A secp256k1 signing key together with the address it controls.
///
/// The secret is erased when the entity is dropped; entities are meant to
/// live no longer than the command that collected them.
pub struct Entity {
    secret: SecretKey,
    public: PublicKey,
    address: Address,
}

impl Entity {
    pub fn generate() -> Self {
        Self::from_secret(SecretKey::new(&mut thread_rng()))
    }

    fn from_secret(secret: SecretKey) -> Self {
        let public = PublicKey::from_secret_key(SECP256K1, &secret);
        let address = Address::from_public_key(&public);
        Self {
            secret,
            public,
            address,
        }
    }

    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self> {
        let secret = SecretKey::from_slice(bytes)
            .map_err(|e| ClientError::InvalidKey(format!("not a secp256k1 private key: {e}")))?;
        Ok(Self::from_secret(secret))
    }

    pub fn from_hex(value: &str) -> Result<Self> {
        let bytes = Zeroizing::new(
            hex::decode(value.trim())
                .map_err(|e| ClientError::InvalidKey(format!("not hex: {e}")))?,
        );
        Self::from_secret_bytes(&bytes)
    }

    pub fn from_base64(value: &str) -> Result<Self> {
        let bytes = Zeroizing::new(
            STANDARD
                .decode(value.trim())
                .map_err(|e| ClientError::InvalidKey(format!("not base64: {e}")))?,
        );
        Self::from_secret_bytes(&bytes)
    }

    /// Parse operator-supplied key material, trying hex first and base64 second.
    pub fn parse(value: &str) -> Result<Self> {
        Self::from_hex(value)
            .or_else(|_| Self::from_base64(value))
            .map_err(|_| ClientError::InvalidKey("unable to parse the key as hex or base64".into()))
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Compact ECDSA signature over a 32-byte digest.
    pub fn sign_digest(&self, digest: &[u8; 32]) -> [u8; SIGNATURE_LEN] {
        let msg = Message::from_digest(*digest);
        SECP256K1.sign_ecdsa(&msg, &self.secret).serialize_compact()
    }

    /// Hex form of the secret, for `keys generate` only.
    pub fn secret_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(self.secret.secret_bytes()))
    }
}

impl Drop for Entity {
    fn drop(&mut self) {
        self.secret.non_secure_erase();
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Check a compact signature produced by [`Entity::sign_digest`].
pub fn verify_signature(public: &PublicKey, digest: &[u8; 32], signature: &[u8]) -> bool {
    let Ok(sig) = Signature::from_compact(signature) else {
        return false;
    };
    SECP256K1
        .verify_ecdsa(&Message::from_digest(*digest), &sig, public)
        .is_ok()
}
