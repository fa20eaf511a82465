//! Typed snapshot of the escrow contract's `status` query.
//!
//! The contract answers with `{"status": "success", "result": {field: value}}`
//! where values are strings in one of the [`codec`](super::codec) encodings.
//! Numeric fields may also arrive as plain JSON numbers, and an empty address
//! string means the party is not set. Decoding walks a static table keyed by field name, so the set of
//! understood fields and their codecs is visible in one place.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use super::codec::{
    Address, decode_address, decode_bool, decode_u64, encode_address, encode_bool, encode_uint,
};
use super::error::{ClientError, Result};

/// `settledSinceBlock` value meaning "not settled yet".
pub const UNSET: u64 = u64::MAX;

/// Point-in-time view of an escrow contract. Field order defines `Ord`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ContractStatus {
    pub buyer: Option<Address>,
    pub seller: Option<Address>,
    pub escrow: Option<Address>,
    pub balance: u64,
    pub start: u64,
    pub settled_since_block: u64,
    pub seller_ok: bool,
    pub buyer_ok: bool,
}

impl Default for ContractStatus {
    fn default() -> Self {
        Self {
            buyer: None,
            seller: None,
            escrow: None,
            balance: 0,
            start: 0,
            settled_since_block: UNSET,
            seller_ok: false,
            buyer_ok: false,
        }
    }
}

type Decoder = fn(&mut ContractStatus, &Value) -> Result<()>;
type Encoder = fn(&ContractStatus) -> Option<String>;

fn encoded_str(v: &Value) -> Result<&str> {
    v.as_str()
        .ok_or_else(|| ClientError::Codec(format!("expected an encoded string, got {v}")))
}

/// An empty string is how the contract says "nobody yet".
fn optional_address(v: &Value) -> Result<Option<Address>> {
    match encoded_str(v)? {
        "" => Ok(None),
        raw => decode_address(raw).map(Some),
    }
}

/// Encoded uint string, or a plain JSON number from older nodes.
fn number(v: &Value) -> Result<u64> {
    match v {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| ClientError::Codec(format!("`{n}` is not a u64"))),
        _ => decode_u64(encoded_str(v)?),
    }
}

fn flag(v: &Value) -> Result<bool> {
    match v {
        Value::Bool(b) => Ok(*b),
        _ => decode_bool(encoded_str(v)?),
    }
}

fn decode_buyer(s: &mut ContractStatus, v: &Value) -> Result<()> {
    s.buyer = optional_address(v)?;
    Ok(())
}

fn decode_seller(s: &mut ContractStatus, v: &Value) -> Result<()> {
    s.seller = optional_address(v)?;
    Ok(())
}

fn decode_escrow(s: &mut ContractStatus, v: &Value) -> Result<()> {
    s.escrow = optional_address(v)?;
    Ok(())
}

fn decode_balance(s: &mut ContractStatus, v: &Value) -> Result<()> {
    s.balance = number(v)?;
    Ok(())
}

fn decode_start(s: &mut ContractStatus, v: &Value) -> Result<()> {
    s.start = number(v)?;
    Ok(())
}

fn decode_settled(s: &mut ContractStatus, v: &Value) -> Result<()> {
    s.settled_since_block = number(v)?;
    Ok(())
}

fn decode_seller_ok(s: &mut ContractStatus, v: &Value) -> Result<()> {
    s.seller_ok = flag(v)?;
    Ok(())
}

fn decode_buyer_ok(s: &mut ContractStatus, v: &Value) -> Result<()> {
    s.buyer_ok = flag(v)?;
    Ok(())
}

fn encode_buyer(s: &ContractStatus) -> Option<String> {
    s.buyer.as_ref().map(encode_address)
}

fn encode_seller(s: &ContractStatus) -> Option<String> {
    s.seller.as_ref().map(encode_address)
}

fn encode_escrow(s: &ContractStatus) -> Option<String> {
    s.escrow.as_ref().map(encode_address)
}

fn encode_balance(s: &ContractStatus) -> Option<String> {
    Some(encode_uint(s.balance.into()))
}

fn encode_start(s: &ContractStatus) -> Option<String> {
    Some(encode_uint(s.start.into()))
}

fn encode_settled(s: &ContractStatus) -> Option<String> {
    Some(encode_uint(s.settled_since_block.into()))
}

fn encode_seller_ok(s: &ContractStatus) -> Option<String> {
    Some(encode_bool(s.seller_ok))
}

fn encode_buyer_ok(s: &ContractStatus) -> Option<String> {
    Some(encode_bool(s.buyer_ok))
}

/// Wire name, decoder and encoder for every understood field.
const FIELDS: &[(&str, Decoder, Encoder)] = &[
    ("buyer", decode_buyer, encode_buyer),
    ("seller", decode_seller, encode_seller),
    ("escrow", decode_escrow, encode_escrow),
    ("balance", decode_balance, encode_balance),
    ("start", decode_start, encode_start),
    ("settledSinceBlock", decode_settled, encode_settled),
    ("sellerOk", decode_seller_ok, encode_seller_ok),
    ("buyerOk", decode_buyer_ok, encode_buyer_ok),
];

impl ContractStatus {
    /// Decode from raw field values. Missing fields keep their defaults,
    /// unknown fields are ignored, malformed ones fail the whole decode.
    pub fn from_fields<'a, I>(fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a Value)>,
    {
        let mut status = Self::default();
        for (name, raw) in fields {
            match FIELDS.iter().find(|(field, _, _)| *field == name) {
                Some((_, decode, _)) => decode(&mut status, raw)
                    .map_err(|e| ClientError::Codec(format!("field `{name}`: {e}")))?,
                None => log::debug!("ignoring unknown status field `{name}`"),
            }
        }
        Ok(status)
    }

    /// Encode back to wire field strings. Absent addresses are omitted.
    pub fn to_fields(&self) -> BTreeMap<&'static str, String> {
        FIELDS
            .iter()
            .filter_map(|(name, _, encode)| encode(self).map(|v| (*name, v)))
            .collect()
    }

    pub fn is_settled(&self) -> bool {
        self.settled_since_block != UNSET
    }
}

/// Decode a `status` query response.
///
/// Returns `Ok(None)` when the node or the contract reports failure, and an
/// error when the contract answered but a field does not decode.
pub fn decode_status_response(success: bool, payload: &Value) -> Result<Option<ContractStatus>> {
    if !success || payload.get("status").and_then(Value::as_str) != Some("success") {
        return Ok(None);
    }
    let Some(result) = payload.get("result").and_then(Value::as_object) else {
        return Ok(None);
    };
    ContractStatus::from_fields(result.iter().map(|(name, value)| (name.as_str(), value)))
        .map(Some)
}

fn show_address(address: &Option<Address>) -> String {
    address.map_or_else(|| "-".to_string(), |a| a.to_string())
}

impl fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  buyer:             {}", show_address(&self.buyer))?;
        writeln!(f, "  seller:            {}", show_address(&self.seller))?;
        writeln!(f, "  escrow:            {}", show_address(&self.escrow))?;
        writeln!(f, "  balance:           {} [Canonical FET]", self.balance)?;
        writeln!(f, "  start:             {}", self.start)?;
        if self.is_settled() {
            writeln!(f, "  settledSinceBlock: {}", self.settled_since_block)?;
        } else {
            writeln!(f, "  settledSinceBlock: unset")?;
        }
        writeln!(f, "  sellerOk:          {}", self.seller_ok)?;
        write!(f, "  buyerOk:           {}", self.buyer_ok)
    }
}
