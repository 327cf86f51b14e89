//! Persisted state: independent named blobs with flat fixed-size layouts.
//!
//! - `address`: this device's 6-byte address, written once on first boot.
//! - `inbox`: 7-byte records, same layout as the wire.
//! - `inbox_mins`: little-endian `u16` per inbox record, index-aligned.
//! - `peers`: 6 address bytes + `LABEL_WIDTH` label bytes (zero padded). The broadcast
//!   entry is implicit and never stored.
//!
//! A blob whose length is not a multiple of its record size loads as empty.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::{info, warn};

use crate::address::{Address, ADDRESS_LEN};
use crate::inbox::InboxEntry;
use crate::registry::{PeerEntry, LABEL_WIDTH};
use crate::wire::{self, RECORD_SIZE};

pub const PEER_RECORD_SIZE: usize = ADDRESS_LEN + LABEL_WIDTH;
const MINUTE_SIZE: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlobKind {
    DeviceAddress,
    Inbox,
    InboxMinutes,
    Peers,
}

impl BlobKind {
    /// Key under which the blob is stored.
    pub fn name(self) -> &'static str {
        match self {
            BlobKind::DeviceAddress => "address",
            BlobKind::Inbox => "inbox",
            BlobKind::InboxMinutes => "inbox_mins",
            BlobKind::Peers => "peers",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Key-value blob storage that survives power loss.
pub trait BlobStore: Send + Sync {
    /// `Ok(None)` when the blob was never written.
    fn load(&self, kind: BlobKind) -> Result<Option<Vec<u8>>, StoreError>;
    fn save(&self, kind: BlobKind, bytes: &[u8]) -> Result<(), StoreError>;
}

/// In-memory store for tests and hosts without persistent storage.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: Mutex<HashMap<BlobKind, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for MemoryStore {
    fn load(&self, kind: BlobKind) -> Result<Option<Vec<u8>>, StoreError> {
        let blobs = self
            .blobs
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store poisoned".into()))?;
        Ok(blobs.get(&kind).cloned())
    }

    fn save(&self, kind: BlobKind, bytes: &[u8]) -> Result<(), StoreError> {
        let mut blobs = self
            .blobs
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store poisoned".into()))?;
        blobs.insert(kind, bytes.to_vec());
        Ok(())
    }
}

/// Stored device address. When none is stored (or the blob is not a unicast address)
/// a random one is generated and written back, so later boots keep the same identity.
pub fn load_or_create_address(store: &dyn BlobStore) -> Result<Address, StoreError> {
    if let Some(bytes) = store.load(BlobKind::DeviceAddress)? {
        match Address::from_slice(&bytes) {
            Some(a) if !a.is_broadcast() => return Ok(a),
            _ => warn!(len = bytes.len(), "stored address unusable, generating a new one"),
        }
    }
    let address = Address::random_local();
    store.save(BlobKind::DeviceAddress, address.as_bytes())?;
    info!(%address, "generated device address");
    Ok(address)
}

pub fn encode_inbox(entries: &[InboxEntry]) -> (Vec<u8>, Vec<u8>) {
    let mut records = Vec::with_capacity(entries.len() * RECORD_SIZE);
    let mut minutes = Vec::with_capacity(entries.len() * MINUTE_SIZE);
    for e in entries {
        wire::encode_record(&e.record, &mut records);
        minutes.extend_from_slice(&e.updated_min.to_le_bytes());
    }
    (records, minutes)
}

/// Misaligned blobs, or blobs that disagree on entry count, load as an empty inbox.
pub fn decode_inbox(records: &[u8], minutes: &[u8]) -> Vec<InboxEntry> {
    if records.len() % RECORD_SIZE != 0 || minutes.len() % MINUTE_SIZE != 0 {
        return Vec::new();
    }
    if records.len() / RECORD_SIZE != minutes.len() / MINUTE_SIZE {
        return Vec::new();
    }
    records
        .chunks_exact(RECORD_SIZE)
        .zip(minutes.chunks_exact(MINUTE_SIZE))
        .map(|(r, m)| InboxEntry {
            record: wire::decode_record(r),
            updated_min: u16::from_le_bytes([m[0], m[1]]),
        })
        .collect()
}

/// Entries other than the broadcast entry, in registry order.
pub fn encode_peers<'a>(entries: impl IntoIterator<Item = &'a PeerEntry>) -> Vec<u8> {
    let mut out = Vec::new();
    for e in entries.into_iter().filter(|e| !e.address.is_broadcast()) {
        out.extend_from_slice(e.address.as_bytes());
        let mut label = [0u8; LABEL_WIDTH];
        for (slot, b) in label.iter_mut().zip(e.initials.bytes()) {
            *slot = b;
        }
        out.extend_from_slice(&label);
    }
    out
}

pub fn decode_peers(bytes: &[u8]) -> Vec<PeerEntry> {
    if bytes.len() % PEER_RECORD_SIZE != 0 {
        return Vec::new();
    }
    bytes
        .chunks_exact(PEER_RECORD_SIZE)
        .filter_map(|chunk| {
            let address = Address::from_slice(&chunk[..ADDRESS_LEN])?;
            let raw = &chunk[ADDRESS_LEN..];
            let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
            let initials = match std::str::from_utf8(&raw[..end]) {
                Ok(s) if !s.is_empty() => s.to_string(),
                _ => address.short_label(),
            };
            Some(PeerEntry { address, initials })
        })
        .collect()
}
