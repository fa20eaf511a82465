//! Canonical text encodings for the values that cross the contract query boundary.
//!
//! Unsigned integers travel as base64 of their minimal big-endian bytes,
//! booleans as lowercase words and addresses in their base58 display form.
//! Zero is encoded as the empty byte string, and decoding accepts the empty
//! string (and any run of leading zero bytes) as zero.

use std::fmt;
use std::str::FromStr;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use sha2::{Digest, Sha256};

use super::error::{ClientError, Result};

/// Length of the raw address digest.
pub const ADDRESS_LEN: usize = 32;
const CHECKSUM_LEN: usize = 4;

/// A ledger account or contract address.
///
/// Holds the 32-byte digest; the canonical string form is
/// `base58(raw || sha256(raw)[..4])`. Equality, ordering and hashing are all
/// over the raw bytes, which map one-to-one to the canonical string.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    pub fn from_raw(raw: [u8; ADDRESS_LEN]) -> Self {
        Self(raw)
    }

    /// Address of a secp256k1 public key: sha256 of the 64-byte uncompressed point.
    pub fn from_public_key(pk: &secp256k1::PublicKey) -> Self {
        let uncompressed = pk.serialize_uncompressed();
        Self(Sha256::digest(&uncompressed[1..]).into())
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    fn checksum(raw: &[u8]) -> [u8; CHECKSUM_LEN] {
        let digest = Sha256::digest(raw);
        let mut out = [0u8; CHECKSUM_LEN];
        out.copy_from_slice(&digest[..CHECKSUM_LEN]);
        out
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = Vec::with_capacity(ADDRESS_LEN + CHECKSUM_LEN);
        buf.extend_from_slice(&self.0);
        buf.extend_from_slice(&Self::checksum(&self.0));
        f.write_str(&bs58::encode(buf).into_string())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        decode_address(s)
    }
}

impl serde::Serialize for Address {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for Address {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        decode_address(&s).map_err(serde::de::Error::custom)
    }
}

/// Encode an unsigned integer as base64 of its minimal big-endian bytes.
pub fn encode_uint(value: u128) -> String {
    let bytes = value.to_be_bytes();
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    STANDARD.encode(&bytes[first..])
}

/// Decode a base64 big-endian unsigned integer.
pub fn decode_uint(value: &str) -> Result<u128> {
    let bytes = STANDARD
        .decode(value)
        .map_err(|e| ClientError::Codec(format!("\"{value}\" is not valid base64: {e}")))?;
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    let significant = &bytes[first..];
    if significant.len() > 16 {
        return Err(ClientError::Codec(format!(
            "\"{value}\" encodes a {}-byte integer, wider than 128 bits",
            significant.len()
        )));
    }
    Ok(significant
        .iter()
        .fold(0u128, |acc, b| (acc << 8) | u128::from(*b)))
}

/// [`decode_uint`] narrowed to `u64`.
pub fn decode_u64(value: &str) -> Result<u64> {
    let wide = decode_uint(value)?;
    u64::try_from(wide)
        .map_err(|_| ClientError::Codec(format!("\"{value}\" decodes to {wide}, which overflows u64")))
}

pub fn encode_bool(value: bool) -> String {
    if value { "true" } else { "false" }.to_string()
}

pub fn decode_bool(value: &str) -> Result<bool> {
    if value.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if value.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(ClientError::Codec(format!(
            "value \"{value}\" can not be converted to boolean type"
        )))
    }
}

pub fn encode_address(address: &Address) -> String {
    address.to_string()
}

pub fn decode_address(value: &str) -> Result<Address> {
    if value.is_empty() {
        return Err(ClientError::Codec("address is empty".into()));
    }
    let bytes = bs58::decode(value)
        .into_vec()
        .map_err(|e| ClientError::Codec(format!("address \"{value}\" is not base58: {e}")))?;
    if bytes.len() != ADDRESS_LEN + CHECKSUM_LEN {
        return Err(ClientError::Codec(format!(
            "address \"{value}\" decodes to {} bytes, expected {}",
            bytes.len(),
            ADDRESS_LEN + CHECKSUM_LEN
        )));
    }
    let (raw, checksum) = bytes.split_at(ADDRESS_LEN);
    if checksum != Address::checksum(raw) {
        return Err(ClientError::Codec(format!(
            "address \"{value}\" has an invalid checksum"
        )));
    }
    let mut out = [0u8; ADDRESS_LEN];
    out.copy_from_slice(raw);
    Ok(Address(out))
}
