//! HikeBoard status relay.
//! Host-driven: no I/O; host passes received payloads and operator commands, and performs
//! the returned actions (broadcasts, blob writes).

pub mod address;
pub mod carry;
pub mod core;
pub mod inbox;
pub mod pairing;
pub mod registry;
pub mod status;
pub mod store;
pub mod wire;

pub use address::{Address, ParseAddressError};
pub use carry::{CarryBuffer, CARRY_LIMIT};
pub use crate::core::{CommandError, CoreConfig, HikeCore, OutboundAction};
pub use inbox::{format_age, Inbox, InboxEntry, InboxPolicy};
pub use pairing::{PairingPhase, PairingState};
pub use registry::{PeerEntry, PeerRegistry, RegistryError};
pub use status::{StatusCode, StatusRecord};
pub use store::{load_or_create_address, BlobKind, BlobStore, MemoryStore, StoreError};
pub use wire::{decode, encode, DecodeError, RECORD_SIZE};
