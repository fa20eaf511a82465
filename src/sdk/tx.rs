use std::fmt;
use std::str::FromStr;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use secp256k1::PublicKey;
use serde_json::json;
use sha2::{Digest, Sha256};

use super::codec::Address;
use super::contract::Contract;
use super::deed::Deed;
use super::entity::{Entity, SIGNATURE_LEN, verify_signature};
use super::error::{ClientError, Result};
use super::signatories::SignatorySet;

/// Chain code that creates contracts.
pub const CONTRACT_CHAIN_CODE: &str = "fetch.contract";
/// Chain code that owns balances and deeds.
pub const TOKEN_CHAIN_CODE: &str = "fetch.token";

const PAYLOAD_MAGIC: u8 = 0xa1;
const PAYLOAD_VERSION: u8 = 1;
const TARGET_CONTRACT: u8 = 0x01;
const TARGET_CHAIN_CODE: u8 = 0x02;

/// What a transaction is addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A deployed smart contract.
    Contract(Address),
    /// Built-in chain code such as [`TOKEN_CHAIN_CODE`].
    ChainCode(String),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Contract(addr) => write!(f, "contract {addr}"),
            Self::ChainCode(id) => write!(f, "chain code {id}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transfer {
    pub destination: Address,
    pub amount: u64,
}

impl Transfer {
    pub fn new(destination: Address, amount: u64) -> Result<Self> {
        if amount == 0 {
            return Err(ClientError::InvalidAmount(format!(
                "transfer to {destination} must be > 0"
            )));
        }
        Ok(Self {
            destination,
            amount,
        })
    }
}

/// Parse `DEST_ADDR,AMOUNT` as given on the command line.
impl FromStr for Transfer {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        let (addr, amount) = s.split_once(',').ok_or_else(|| {
            ClientError::InvalidAmount(format!("transfer \"{s}\" must look like ADDRESS,AMOUNT"))
        })?;
        Transfer::new(addr.trim().parse()?, parse_amount(amount)?)
    }
}

/// Parse a positive amount in canonical units.
pub fn parse_amount(value: &str) -> Result<u64> {
    let amount: i128 = value
        .trim()
        .parse()
        .map_err(|_| ClientError::InvalidAmount(format!("\"{value}\" is not an integer")))?;
    if amount <= 0 {
        return Err(ClientError::InvalidAmount(format!("{amount} must be > 0")));
    }
    u64::try_from(amount)
        .map_err(|_| ClientError::InvalidAmount(format!("{amount} exceeds {}", u64::MAX)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxSignature {
    pub signer: Address,
    pub signature: [u8; SIGNATURE_LEN],
}

/// SHA-256 of a transaction's full signed wire bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxDigest([u8; 32]);

impl fmt::Display for TxDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for TxDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxDigest({self})")
    }
}

impl FromStr for TxDigest {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim_start_matches("0x"))
            .map_err(|e| ClientError::Codec(format!("tx digest \"{s}\": {e}")))?;
        let raw: [u8; 32] = bytes
            .try_into()
            .map_err(|_| ClientError::Codec(format!("tx digest \"{s}\" must be 32 bytes")))?;
        Ok(Self(raw))
    }
}

/// A ledger transaction, assembled unsigned and then signed in signer order.
///
/// Everything except the signatures is covered by the signed payload, so the
/// validity window, transfers and signer list are frozen by the first
/// signature.
#[derive(Debug, Clone)]
pub struct Transaction {
    from: Address,
    target: Target,
    action: String,
    data: Vec<u8>,
    fee: u64,
    valid_from: u64,
    valid_until: u64,
    transfers: Vec<Transfer>,
    signers: Vec<PublicKey>,
    signatures: Vec<TxSignature>,
}

impl Transaction {
    pub fn new(
        from: Address,
        target: Target,
        action: impl Into<String>,
        data: Vec<u8>,
        fee: u64,
    ) -> Result<Self> {
        let action = action.into();
        if action.is_empty() || action.len() > usize::from(u16::MAX) {
            return Err(ClientError::InvalidConfig(format!(
                "action name must be 1..={} bytes",
                u16::MAX
            )));
        }
        if let Target::ChainCode(id) = &target
            && (id.is_empty() || id.len() > usize::from(u16::MAX))
        {
            return Err(ClientError::InvalidConfig(format!(
                "chain code identifier must be 1..={} bytes",
                u16::MAX
            )));
        }
        if u32::try_from(data.len()).is_err() {
            return Err(ClientError::InvalidConfig(format!(
                "transaction data of {} bytes is too large",
                data.len()
            )));
        }
        if fee == 0 {
            return Err(ClientError::InvalidAmount("fee must be > 0".into()));
        }
        Ok(Self {
            from,
            target,
            action,
            data,
            fee,
            valid_from: 0,
            valid_until: 0,
            transfers: Vec::new(),
            signers: Vec::new(),
            signatures: Vec::new(),
        })
    }

    pub fn from(&self) -> Address {
        self.from
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn fee(&self) -> u64 {
        self.fee
    }

    pub fn validity_window(&self) -> (u64, u64) {
        (self.valid_from, self.valid_until)
    }

    pub fn transfers(&self) -> &[Transfer] {
        &self.transfers
    }

    pub fn signatures(&self) -> &[TxSignature] {
        &self.signatures
    }

    pub fn signer_addresses(&self) -> Vec<Address> {
        self.signers.iter().map(Address::from_public_key).collect()
    }

    fn ensure_unsigned(&self, what: &str) -> Result<()> {
        if self.signatures.is_empty() {
            Ok(())
        } else {
            Err(ClientError::Signing(format!(
                "cannot {what} after signing has started"
            )))
        }
    }

    /// Declare a signer. Declaration order is signing order.
    pub fn add_signer(&mut self, public: PublicKey) -> Result<()> {
        self.ensure_unsigned("add a signer")?;
        if self.signers.contains(&public) {
            return Ok(());
        }
        if self.signers.len() == usize::from(u16::MAX) {
            return Err(ClientError::Signing("too many signers".into()));
        }
        self.signers.push(public);
        Ok(())
    }

    pub fn set_validity_window(&mut self, valid_from: u64, valid_until: u64) -> Result<()> {
        self.ensure_unsigned("change the validity window")?;
        if valid_until < valid_from {
            return Err(ClientError::Ledger(format!(
                "validity window [{valid_from}, {valid_until}] is empty"
            )));
        }
        self.valid_from = valid_from;
        self.valid_until = valid_until;
        Ok(())
    }

    pub fn add_transfer(&mut self, destination: Address, amount: u64) -> Result<()> {
        let transfer = Transfer::new(destination, amount)?;
        self.ensure_unsigned("add a transfer")?;
        if self.transfers.len() == usize::from(u16::MAX) {
            return Err(ClientError::InvalidAmount("too many transfers".into()));
        }
        self.transfers.push(transfer);
        Ok(())
    }

    /// Canonical bytes covered by every signature.
    pub fn payload_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(128 + self.data.len());
        buf.push(PAYLOAD_MAGIC);
        buf.push(PAYLOAD_VERSION);
        buf.extend_from_slice(self.from.as_bytes());
        match &self.target {
            Target::Contract(addr) => {
                buf.push(TARGET_CONTRACT);
                buf.extend_from_slice(addr.as_bytes());
            }
            Target::ChainCode(id) => {
                buf.push(TARGET_CHAIN_CODE);
                put_short_bytes(&mut buf, id.as_bytes());
            }
        }
        put_short_bytes(&mut buf, self.action.as_bytes());
        // lengths were bounded when the fields were set
        buf.extend_from_slice(&(self.data.len() as u32).to_be_bytes());
        buf.extend_from_slice(&self.data);
        buf.extend_from_slice(&self.fee.to_be_bytes());
        buf.extend_from_slice(&self.valid_from.to_be_bytes());
        buf.extend_from_slice(&self.valid_until.to_be_bytes());
        buf.extend_from_slice(&(self.transfers.len() as u16).to_be_bytes());
        for t in &self.transfers {
            buf.extend_from_slice(t.destination.as_bytes());
            buf.extend_from_slice(&t.amount.to_be_bytes());
        }
        buf.extend_from_slice(&(self.signers.len() as u16).to_be_bytes());
        for pk in &self.signers {
            buf.extend_from_slice(&pk.serialize());
        }
        buf
    }

    pub fn payload_digest(&self) -> [u8; 32] {
        Sha256::digest(self.payload_bytes()).into()
    }

    /// Sign as the next declared signer.
    pub fn sign(&mut self, entity: &Entity) -> Result<()> {
        let address = entity.address();
        let next = self.signatures.len();
        let Some(expected) = self.signers.get(next).map(Address::from_public_key) else {
            return Err(ClientError::Signing(format!(
                "{address} cannot sign: all {} declared signers have signed",
                self.signers.len()
            )));
        };
        if expected != address {
            return Err(if self.signer_addresses().contains(&address) {
                ClientError::Signing(format!(
                    "{address} signs out of order: signer #{next} is {expected}"
                ))
            } else {
                ClientError::Signing(format!("{address} is not a declared signer"))
            });
        }
        let signature = entity.sign_digest(&self.payload_digest());
        self.signatures.push(TxSignature {
            signer: address,
            signature,
        });
        Ok(())
    }

    pub fn is_fully_signed(&self) -> bool {
        !self.signers.is_empty() && self.signatures.len() == self.signers.len()
    }

    /// Fail unless every declared signer has signed.
    pub fn ensure_submittable(&self) -> Result<()> {
        if self.signers.is_empty() {
            return Err(ClientError::Signing("transaction declares no signers".into()));
        }
        if !self.is_fully_signed() {
            return Err(ClientError::Signing(format!(
                "only {} of {} declared signers have signed",
                self.signatures.len(),
                self.signers.len()
            )));
        }
        Ok(())
    }

    /// Check every signature against its declared signer.
    pub fn verify_signatures(&self) -> bool {
        let digest = self.payload_digest();
        self.signatures.len() <= self.signers.len()
            && self
                .signatures
                .iter()
                .zip(&self.signers)
                .all(|(sig, pk)| verify_signature(pk, &digest, &sig.signature))
    }

    /// Payload followed by the signatures in signing order.
    pub fn to_wire_bytes(&self) -> Vec<u8> {
        let mut buf = self.payload_bytes();
        buf.extend_from_slice(&(self.signatures.len() as u16).to_be_bytes());
        for sig in &self.signatures {
            buf.extend_from_slice(&sig.signature);
        }
        buf
    }

    pub fn digest(&self) -> TxDigest {
        TxDigest(Sha256::digest(self.to_wire_bytes()).into())
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "from:     {}", self.from)?;
        writeln!(f, "target:   {}", self.target)?;
        writeln!(f, "action:   {}", self.action)?;
        writeln!(f, "fee:      {}", self.fee)?;
        writeln!(f, "validity: [{}, {}]", self.valid_from, self.valid_until)?;
        for t in &self.transfers {
            writeln!(f, "transfer: {} -> {}", t.amount, t.destination)?;
        }
        for addr in self.signer_addresses() {
            writeln!(f, "signer:   {addr}")?;
        }
        write!(
            f,
            "signed:   {}/{}",
            self.signatures.len(),
            self.signers.len()
        )
    }
}

fn put_short_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
    buf.extend_from_slice(bytes);
}

fn declare_signers(tx: &mut Transaction, signatories: &SignatorySet) -> Result<()> {
    for entity in signatories.iter() {
        tx.add_signer(*entity.public_key())?;
    }
    Ok(())
}

/// Build an unsigned call of `action` on a deployed contract.
///
/// Extra arguments travel as a JSON array of strings in the data field.
pub fn build_action_tx(
    sender: Address,
    contract: Address,
    action: &str,
    fee: u64,
    signatories: &SignatorySet,
    args: &[String],
) -> Result<Transaction> {
    let data = if args.is_empty() {
        Vec::new()
    } else {
        serde_json::to_vec(args)?
    };
    let mut tx = Transaction::new(sender, Target::Contract(contract), action, data, fee)?;
    declare_signers(&mut tx, signatories)?;
    Ok(tx)
}

/// Build an unsigned contract-creation transaction sent by the contract owner.
pub fn build_deploy_tx(
    contract: &Contract,
    fee: u64,
    signatories: &SignatorySet,
    transfers: &[Transfer],
) -> Result<Transaction> {
    let data = json!({
        "nonce": STANDARD.encode(contract.nonce()),
        "text": STANDARD.encode(contract.source()),
        "digest": STANDARD.encode(contract.digest()),
    });
    let mut tx = Transaction::new(
        contract.owner(),
        Target::ChainCode(CONTRACT_CHAIN_CODE.into()),
        "create",
        serde_json::to_vec(&data)?,
        fee,
    )?;
    for t in transfers {
        tx.add_transfer(t.destination, t.amount)?;
    }
    declare_signers(&mut tx, signatories)?;
    Ok(tx)
}

/// Build an unsigned deed amendment for `address`.
pub fn build_deed_tx(
    address: Address,
    deed: &Deed,
    fee: u64,
    signatories: &SignatorySet,
) -> Result<Transaction> {
    deed.validate()?;
    let mut tx = Transaction::new(
        address,
        Target::ChainCode(TOKEN_CHAIN_CODE.into()),
        "deed",
        serde_json::to_vec(deed)?,
        fee,
    )?;
    declare_signers(&mut tx, signatories)?;
    Ok(tx)
}

/// Sign with every signatory, in the order they were collected.
pub fn sign_all(tx: &mut Transaction, signatories: &SignatorySet) -> Result<()> {
    for entity in signatories.iter() {
        tx.sign(entity)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> Address {
        Address::from_raw([b; 32])
    }

    fn two_signers() -> SignatorySet {
        [Entity::generate(), Entity::generate()].into_iter().collect()
    }

    #[test]
    fn zero_amount_transfer_is_rejected() {
        let mut tx =
            build_action_tx(addr(1), addr(2), "deposit", 10, &SignatorySet::new(), &[]).unwrap();
        assert!(matches!(
            tx.add_transfer(addr(2), 0),
            Err(ClientError::InvalidAmount(_))
        ));
    }

    #[test]
    fn parse_amount_rejects_non_positive() {
        assert_eq!(parse_amount("15").unwrap(), 15);
        for bad in ["0", "-3", "abc", "1.5", "99999999999999999999999"] {
            assert!(matches!(parse_amount(bad), Err(ClientError::InvalidAmount(_))), "{bad}");
        }
    }

    #[test]
    fn transfer_parses_from_cli_form() {
        let text = format!("{},25", addr(3));
        let t: Transfer = text.parse().unwrap();
        assert_eq!(t, Transfer::new(addr(3), 25).unwrap());
        assert!(format!("{},0", addr(3)).parse::<Transfer>().is_err());
        assert!("missing-comma".parse::<Transfer>().is_err());
    }

    #[test]
    fn signing_follows_declaration_order() {
        let signers = two_signers();
        let mut tx = build_action_tx(addr(1), addr(2), "accept", 10, &signers, &[]).unwrap();
        tx.set_validity_window(100, 200).unwrap();
        sign_all(&mut tx, &signers).unwrap();
        assert!(tx.is_fully_signed());
        assert!(tx.verify_signatures());
        let order: Vec<Address> = tx.signatures().iter().map(|s| s.signer).collect();
        assert_eq!(order, signers.addresses());
    }

    #[test]
    fn out_of_order_signer_is_rejected() {
        let signers = two_signers();
        let mut tx = build_action_tx(addr(1), addr(2), "accept", 10, &signers, &[]).unwrap();
        let second = signers.iter().nth(1).unwrap();
        let err = tx.sign(second).unwrap_err();
        assert!(err.to_string().contains("out of order"));
    }

    #[test]
    fn undeclared_signer_is_rejected() {
        let signers = two_signers();
        let mut tx = build_action_tx(addr(1), addr(2), "accept", 10, &signers, &[]).unwrap();
        let stranger = Entity::generate();
        assert!(tx.sign(&stranger).unwrap_err().to_string().contains("not a declared"));
    }

    #[test]
    fn payload_is_frozen_once_signed() {
        let signers: SignatorySet = [Entity::generate()].into_iter().collect();
        let mut tx = build_action_tx(addr(1), addr(2), "deposit", 10, &signers, &[]).unwrap();
        sign_all(&mut tx, &signers).unwrap();
        assert!(tx.add_transfer(addr(2), 5).is_err());
        assert!(tx.set_validity_window(1, 2).is_err());
    }

    #[test]
    fn validity_window_is_part_of_the_signed_payload() {
        let signers: SignatorySet = [Entity::generate()].into_iter().collect();
        let mut a = build_action_tx(addr(1), addr(2), "kill", 10, &signers, &[]).unwrap();
        let mut b = a.clone();
        a.set_validity_window(1, 101).unwrap();
        b.set_validity_window(2, 102).unwrap();
        assert_ne!(a.payload_digest(), b.payload_digest());
    }

    #[test]
    fn partially_signed_tx_is_not_submittable() {
        let signers = two_signers();
        let mut tx = build_action_tx(addr(1), addr(2), "cancel", 10, &signers, &[]).unwrap();
        tx.sign(signers.iter().next().unwrap()).unwrap();
        assert!(tx.ensure_submittable().unwrap_err().to_string().contains("1 of 2"));
    }

    #[test]
    fn unsigned_tx_without_signers_is_not_submittable() {
        let tx =
            build_action_tx(addr(1), addr(2), "cancel", 10, &SignatorySet::new(), &[]).unwrap();
        assert!(tx.ensure_submittable().is_err());
    }

    #[test]
    fn deploy_tx_carries_transfers_in_order() {
        let owner = Entity::generate();
        let contract = Contract::new("source", owner.address(), b"nonce");
        let signers: SignatorySet = [owner].into_iter().collect();
        let transfers = [
            Transfer::new(addr(7), 10).unwrap(),
            Transfer::new(addr(8), 5).unwrap(),
        ];
        let tx = build_deploy_tx(&contract, 600_000, &signers, &transfers).unwrap();
        assert_eq!(tx.transfers(), &transfers);
        assert_eq!(tx.action(), "create");
        assert_eq!(tx.from(), contract.owner());
        let data: serde_json::Value = serde_json::from_slice(tx.data()).unwrap();
        assert_eq!(data["text"], STANDARD.encode("source"));
    }

    #[test]
    fn action_args_are_json_encoded() {
        let args = vec!["42".to_string()];
        let tx =
            build_action_tx(addr(1), addr(2), "refund", 10, &SignatorySet::new(), &args).unwrap();
        assert_eq!(tx.data(), br#"["42"]"#);
    }

    #[test]
    fn zero_fee_is_rejected() {
        assert!(build_action_tx(addr(1), addr(2), "accept", 0, &SignatorySet::new(), &[]).is_err());
    }

    #[test]
    fn digest_round_trips_through_hex() {
        let signers: SignatorySet = [Entity::generate()].into_iter().collect();
        let mut tx = build_action_tx(addr(1), addr(2), "accept", 10, &signers, &[]).unwrap();
        sign_all(&mut tx, &signers).unwrap();
        let digest = tx.digest();
        assert_eq!(digest.to_string().parse::<TxDigest>().unwrap(), digest);
    }
}
