//! Peer registry: operator-approved addresses with short display labels.
//! Index 0 is always the implicit broadcast entry; it cannot be removed and is not listed.

use serde::{Deserialize, Serialize};

use crate::address::Address;

/// Maximum label width in characters (and bytes in the persisted layout).
pub const LABEL_WIDTH: usize = 4;

const BROADCAST_LABEL: &str = "**";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerEntry {
    pub address: Address,
    pub initials: String,
}

impl PeerEntry {
    fn broadcast() -> Self {
        Self {
            address: Address::BROADCAST,
            initials: BROADCAST_LABEL.to_string(),
        }
    }
}

/// Result of [`PeerRegistry::add_peer`]. Adding a known address is not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddPeer {
    Added(PeerEntry),
    AlreadyPeer(PeerEntry),
}

impl AddPeer {
    pub fn entry(&self) -> &PeerEntry {
        match self {
            AddPeer::Added(e) | AddPeer::AlreadyPeer(e) => e,
        }
    }

    pub fn is_added(&self) -> bool {
        matches!(self, AddPeer::Added(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("the broadcast entry cannot be removed")]
    ProtectedEntry,
    #[error("no peer at index {index} (registry has {len} entries)")]
    OutOfRange { index: usize, len: usize },
    #[error("invalid label {0:?}: use 1-{LABEL_WIDTH} letters or digits")]
    InvalidLabel(String),
}

#[derive(Debug, Clone)]
pub struct PeerRegistry {
    entries: Vec<PeerEntry>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self {
            entries: vec![PeerEntry::broadcast()],
        }
    }

    /// Rebuild from stored entries (broadcast entry excluded). Duplicate addresses are dropped.
    pub fn from_entries(stored: impl IntoIterator<Item = PeerEntry>) -> Self {
        let mut reg = Self::new();
        for e in stored {
            if !reg.is_peer(&e.address) {
                reg.entries.push(e);
            }
        }
        reg
    }

    pub fn is_peer(&self, address: &Address) -> bool {
        self.entries.iter().any(|e| e.address == *address)
    }

    /// Add a peer. Empty `initials` derives a label from the address.
    pub fn add_peer(&mut self, address: Address, initials: &str) -> Result<AddPeer, RegistryError> {
        if let Some(existing) = self.get(&address) {
            return Ok(AddPeer::AlreadyPeer(existing.clone()));
        }
        let initials = if initials.trim().is_empty() {
            address.short_label()
        } else {
            normalize_label(initials)?
        };
        let entry = PeerEntry { address, initials };
        self.entries.push(entry.clone());
        Ok(AddPeer::Added(entry))
    }

    /// Remove by position. Index 0 (broadcast) is protected.
    pub fn remove_peer(&mut self, index: usize) -> Result<PeerEntry, RegistryError> {
        if index == 0 {
            return Err(RegistryError::ProtectedEntry);
        }
        if index >= self.entries.len() {
            return Err(RegistryError::OutOfRange {
                index,
                len: self.entries.len(),
            });
        }
        Ok(self.entries.remove(index))
    }

    /// Back to just the broadcast entry.
    pub fn clear_all(&mut self) {
        self.entries.truncate(1);
    }

    /// Stored label for a peer, else the address-derived label.
    pub fn mac_to_initials(&self, address: &Address) -> String {
        self.get(address)
            .map(|e| e.initials.clone())
            .unwrap_or_else(|| address.short_label())
    }

    pub fn get(&self, address: &Address) -> Option<&PeerEntry> {
        self.entries.iter().find(|e| e.address == *address)
    }

    /// All entries, broadcast entry first.
    pub fn entries(&self) -> &[PeerEntry] {
        &self.entries
    }

    /// Entries shown to the operator (broadcast entry excluded). Position `i` here is index `i + 1`.
    pub fn displayed(&self) -> &[PeerEntry] {
        &self.entries[1..]
    }

    pub fn peer_count(&self) -> usize {
        self.entries.len() - 1
    }
}

impl Default for PeerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Uppercase and validate a label: 1..=LABEL_WIDTH ASCII letters or digits.
pub fn normalize_label(raw: &str) -> Result<String, RegistryError> {
    let label = raw.trim();
    let ok = !label.is_empty()
        && label.len() <= LABEL_WIDTH
        && label.chars().all(|c| c.is_ascii_alphanumeric());
    if !ok {
        return Err(RegistryError::InvalidLabel(raw.to_string()));
    }
    Ok(label.to_ascii_uppercase())
}
