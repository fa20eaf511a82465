use super::codec::Address;
use super::entity::Entity;
use super::error::{ClientError, Result};
use super::prompt::Prompter;

/// Insertion-ordered signing keys for one transaction, unique by address.
///
/// The order of insertion is the order in which signers are declared on the
/// transaction and the order in which they sign it.
#[derive(Debug, Default)]
pub struct SignatorySet {
    entries: Vec<Entity>,
}

impl SignatorySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `entity` unless a key for the same address is already present.
    /// Returns whether it was added.
    pub fn insert(&mut self, entity: Entity) -> bool {
        if self.contains(&entity.address()) {
            return false;
        }
        self.entries.push(entity);
        true
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.entries.iter().any(|e| e.address() == *address)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entries.iter()
    }

    pub fn addresses(&self) -> Vec<Address> {
        self.entries.iter().map(Entity::address).collect()
    }
}

impl FromIterator<Entity> for SignatorySet {
    fn from_iter<I: IntoIterator<Item = Entity>>(iter: I) -> Self {
        let mut set = Self::new();
        for entity in iter {
            set.insert(entity);
        }
        set
    }
}

/// Prompt until the operator supplies a usable key, or gives up.
///
/// With `expected`, a key deriving any other address is refused. An empty
/// entry falls back to `fallback_key` when one is configured.
pub fn collect_single_signatory<P: Prompter + ?Sized>(
    prompter: &mut P,
    expected: Option<&Address>,
    fallback_key: Option<&str>,
) -> Result<Entity> {
    let message = match expected {
        Some(addr) => format!("Private key for {{{addr}}} signee (hex or base64): "),
        None => "Private key for signee (hex or base64): ".to_string(),
    };

    loop {
        let input = prompter.read_secret(&message)?;
        let material = match (input.trim().is_empty(), fallback_key) {
            (true, Some(key)) => {
                prompter.notify("Using the configured service account key.");
                key
            }
            _ => input.as_str(),
        };

        match Entity::parse(material) {
            Ok(entity) => match expected {
                Some(addr) if entity.address() != *addr => prompter.notify(&format!(
                    "Invalid key: it derives {} but {addr} was requested.",
                    entity.address()
                )),
                _ => return Ok(entity),
            },
            Err(e) => prompter.notify(&format!("Invalid key: {e}.")),
        }

        if !prompter.confirm("\nWant to re-enter the key again?")? {
            return Err(ClientError::UserAborted);
        }
    }
}

/// Collect signing keys one at a time.
///
/// Without `expected` the operator is asked after every key whether to
/// continue; with it, collection also stops once every listed signee has
/// been visited. Never fails for having too few keys: whether the set is
/// sufficient is the ledger's call at submission.
pub fn collect_signatories<P: Prompter + ?Sized>(
    prompter: &mut P,
    expected: Option<&[Address]>,
    fallback_key: Option<&str>,
) -> Result<SignatorySet> {
    let mut set = SignatorySet::new();
    let mut pending = expected.map(|list| list.iter());

    loop {
        let signee = match pending.as_mut() {
            Some(list) => match list.next() {
                Some(addr) => Some(*addr),
                None => break,
            },
            None => None,
        };

        let entity = collect_single_signatory(prompter, signee.as_ref(), fallback_key)?;
        let address = entity.address();
        if set.insert(entity) {
            prompter.notify(&format!(
                "Added new signatory[{}] with address {address}",
                set.len() - 1
            ));
        } else {
            prompter.notify(&format!(
                "The {address} signatory already exists => omitting."
            ));
        }

        if !prompter.confirm("\nContinue with next key?")? {
            break;
        }
    }

    log::debug!("collected {} signatories", set.len());
    Ok(set)
}
