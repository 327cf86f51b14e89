//! Host-driven API: HikeCore owns all relay state. The host feeds it received payloads,
//! clock updates and operator commands, and performs the returned actions (broadcasts,
//! persistence writes) outside any lock it holds around the core.

use std::time::Duration;

use tracing::{debug, info, trace, warn};

use crate::address::Address;
use crate::carry::{CarryBuffer, Upsert, CARRY_LIMIT};
use crate::inbox::{Inbox, InboxPolicy, InboxUpdate};
use crate::pairing::{self, PairingEffect, PairingEvent, PairingPhase, PairingState};
use crate::registry::{PeerEntry, PeerRegistry, RegistryError};
use crate::status::{StatusCode, StatusRecord};
use crate::store::{self, BlobKind, BlobStore, StoreError};
use crate::wire;

/// Core tunables.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub carry_capacity: usize,
    pub inbox_policy: InboxPolicy,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            carry_capacity: CARRY_LIMIT,
            inbox_policy: InboxPolicy::default(),
        }
    }
}

/// Action for host to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundAction {
    /// Send this payload to every device in range.
    Broadcast(Vec<u8>),
    /// Overwrite a persisted blob.
    Persist { blob: BlobKind, bytes: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("status {0} is reserved for pairing")]
    ReservedStatus(u8),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Main coordinator. Single owner of registry, carry buffer, inbox and pairing state.
pub struct HikeCore {
    address: Address,
    local_status: StatusCode,
    registry: PeerRegistry,
    carry: CarryBuffer,
    inbox: Inbox,
    pairing: PairingState,
    now_min: u16,
    /// A peer list has been stored, even an empty one. Bootstrap peers are skipped then.
    peers_stored: bool,
}

impl HikeCore {
    pub fn new(address: Address) -> Self {
        Self::with_config(address, CoreConfig::default())
    }

    pub fn with_config(address: Address, config: CoreConfig) -> Self {
        Self {
            address,
            local_status: StatusCode::NEUTRAL,
            registry: PeerRegistry::new(),
            carry: CarryBuffer::with_capacity(config.carry_capacity),
            inbox: Inbox::new(config.inbox_policy),
            pairing: PairingState::Idle,
            now_min: 0,
            peers_stored: false,
        }
    }

    /// Build a core from persisted blobs. An unavailable store yields empty state.
    pub fn restore(address: Address, config: CoreConfig, store: &dyn BlobStore) -> Self {
        let policy = config.inbox_policy;
        let mut core = Self::with_config(address, config);
        let blobs = match load_blobs(store) {
            Ok(b) => b,
            Err(e) => {
                warn!(error = %e, "persistent store unavailable, starting empty");
                return core;
            }
        };
        let [inbox, minutes, peers] = blobs;
        if let Some(peers) = peers {
            core.registry = PeerRegistry::from_entries(store::decode_peers(&peers));
            core.peers_stored = true;
        }
        let entries = store::decode_inbox(&inbox.unwrap_or_default(), &minutes.unwrap_or_default())
            .into_iter()
            .filter(|e| core.registry.is_peer(&e.record.sender))
            .collect();
        core.inbox = Inbox::from_entries(policy, entries);
        info!(
            peers = core.registry.peer_count(),
            inbox = core.inbox.len(),
            "restored persisted state"
        );
        core
    }

    /// Add default peers on a device that has never stored a peer list. A list the
    /// operator emptied stays empty.
    pub fn seed_peers(&mut self, peers: &[PeerEntry]) -> Vec<OutboundAction> {
        if self.peers_stored || peers.is_empty() {
            return vec![];
        }
        let mut added = false;
        for p in peers {
            match self.registry.add_peer(p.address, &p.initials) {
                Ok(r) => added |= r.is_added(),
                Err(e) => warn!(peer = %p.address, error = %e, "skipping bootstrap peer"),
            }
        }
        if added {
            vec![self.persist_peers()]
        } else {
            vec![]
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn local_status(&self) -> StatusCode {
        self.local_status
    }

    /// Set the operator's own status. Leaves pairing mode if it was active.
    pub fn set_local_status(&mut self, code: StatusCode) -> Result<(), CommandError> {
        if code.is_pairing() {
            return Err(CommandError::ReservedStatus(code.0));
        }
        if self.pairing.is_pairing() {
            self.cancel_pairing();
        }
        self.local_status = code;
        Ok(())
    }

    /// Update the minute clock used to stamp inbox entries.
    pub fn set_uptime(&mut self, uptime: Duration) {
        // Pins at u16::MAX (about 45 days) rather than wrapping back under older stamps.
        self.now_min = u16::try_from(uptime.as_secs() / 60).unwrap_or(u16::MAX);
    }

    pub fn now_minutes(&self) -> u16 {
        self.now_min
    }

    /// Payload for the next broadcast: own status first, then carried records.
    pub fn build_outgoing(&self) -> Vec<u8> {
        let mut records = Vec::with_capacity(1 + self.carry.len());
        records.push(StatusRecord::new(self.address, self.local_status));
        records.extend(self.carry.iter().copied());
        wire::encode(&records)
    }

    /// Periodic tick: advance the clock and produce this cycle's broadcast.
    pub fn tick(&mut self, uptime: Duration) -> Vec<OutboundAction> {
        self.set_uptime(uptime);
        vec![OutboundAction::Broadcast(self.build_outgoing())]
    }

    /// Process a payload from the transport. Malformed or empty payloads are dropped.
    pub fn on_receive(&mut self, bytes: &[u8]) -> Vec<OutboundAction> {
        let records = match wire::decode(bytes) {
            Ok(r) => r,
            Err(e) => {
                debug!(error = %e, "discarding malformed payload");
                return vec![];
            }
        };
        let Some(&own) = records.first() else {
            trace!("discarding empty payload");
            return vec![];
        };
        if own.sender == self.address {
            trace!("ignoring own broadcast echo");
            return vec![];
        }

        // Record 0 is always the sender's own status, never a relayed one.
        if own.code.is_pairing() {
            let before = self.pairing.candidate();
            let already_peer = self.registry.is_peer(&own.sender);
            self.step_pairing(PairingEvent::Signal {
                sender: own.sender,
                already_peer,
            });
            if self.pairing.candidate() != before {
                info!(candidate = %own.sender, "pairing request pending");
            }
        } else {
            match self.carry.upsert(own) {
                Upsert::Evicted(old) => {
                    debug!(sender = %own.sender, evicted = %old, "carry buffer full, evicted oldest")
                }
                Upsert::Inserted => trace!(sender = %own.sender, "carrying new sender"),
                Upsert::Updated | Upsert::Ignored => {}
            }
        }

        let mut inbox_changed = false;
        for r in &records {
            if r.code.is_pairing() || r.sender == self.address || !self.registry.is_peer(&r.sender)
            {
                continue;
            }
            match self.inbox.upsert(*r, self.now_min) {
                InboxUpdate::Ignored => {}
                InboxUpdate::Refreshed => inbox_changed = true,
                update => {
                    debug!(sender = %r.sender, code = %r.code, ?update, "inbox updated");
                    inbox_changed = true;
                }
            }
        }
        if inbox_changed {
            self.persist_inbox()
        } else {
            vec![]
        }
    }

    /// Start broadcasting the pairing sentinel. No-op while already pairing.
    pub fn enter_pairing_mode(&mut self) {
        self.step_pairing(PairingEvent::Enter {
            current: self.local_status,
        });
    }

    pub fn accept_pending_candidate(&mut self) {
        self.step_pairing(PairingEvent::Accept);
    }

    pub fn decline_pending_candidate(&mut self) {
        if let Some(c) = self.pairing.candidate() {
            info!(candidate = %c, "pairing request declined");
        }
        self.step_pairing(PairingEvent::Decline);
    }

    /// Finish pairing: the accepted candidate becomes a peer with `label`.
    /// No-op unless a candidate has been accepted.
    pub fn confirm_candidate_label(
        &mut self,
        label: &str,
    ) -> Result<Vec<OutboundAction>, CommandError> {
        if self.pairing.phase() != PairingPhase::ConfirmingIdentity {
            return Ok(vec![]);
        }
        let label = pairing::pair_label(label)?;
        Ok(self.step_pairing(PairingEvent::ConfirmLabel(label)))
    }

    /// Leave pairing mode from any pairing state and restore the previous status.
    pub fn cancel_pairing(&mut self) {
        self.step_pairing(PairingEvent::Cancel);
    }

    /// Add a peer outside the handshake. Empty `label` derives one from the address.
    pub fn add_peer_manually(
        &mut self,
        address: Address,
        label: &str,
    ) -> Result<Vec<OutboundAction>, CommandError> {
        let added = self.registry.add_peer(address, label)?;
        if !added.is_added() {
            return Ok(vec![]);
        }
        info!(peer = %address, initials = %added.entry().initials, "peer added");
        self.step_pairing(PairingEvent::PeerAdded(address));
        Ok(vec![self.persist_peers()])
    }

    /// Remove the peer at registry `index` (index 0 is the broadcast entry) and its inbox entries.
    pub fn remove_peer(&mut self, index: usize) -> Result<Vec<OutboundAction>, CommandError> {
        let removed = self.registry.remove_peer(index)?;
        info!(peer = %removed.address, "peer removed");
        let mut actions = vec![self.persist_peers()];
        let registry = &self.registry;
        if self.inbox.retain_senders(|a| registry.is_peer(a)) > 0 {
            actions.extend(self.persist_inbox());
        }
        Ok(actions)
    }

    pub fn clear_all_peers(&mut self) -> Vec<OutboundAction> {
        self.registry.clear_all();
        info!("peer list cleared");
        let mut actions = vec![self.persist_peers()];
        if !self.inbox.is_empty() {
            self.inbox.clear();
            actions.extend(self.persist_inbox());
        }
        actions
    }

    /// Display label for any sender.
    pub fn label_for(&self, address: &Address) -> String {
        self.registry.mac_to_initials(address)
    }

    pub fn inbox(&self) -> &Inbox {
        &self.inbox
    }

    pub fn carry(&self) -> &CarryBuffer {
        &self.carry
    }

    pub fn peers(&self) -> &PeerRegistry {
        &self.registry
    }

    pub fn pairing(&self) -> &PairingState {
        &self.pairing
    }

    fn step_pairing(&mut self, event: PairingEvent) -> Vec<OutboundAction> {
        let state = std::mem::take(&mut self.pairing);
        let from = state.phase();
        let (next, effects) = state.step(event);
        if next.phase() != from {
            debug!(?from, to = ?next.phase(), "pairing transition");
        }
        self.pairing = next;
        let mut actions = Vec::new();
        for effect in effects {
            match effect {
                PairingEffect::SetStatus(code) => self.local_status = code,
                PairingEffect::AddPeer { address, initials } => {
                    match self.registry.add_peer(address, &initials) {
                        Ok(r) if r.is_added() => {
                            info!(peer = %address, %initials, "paired");
                            actions.push(self.persist_peers());
                        }
                        Ok(_) => {}
                        Err(e) => warn!(peer = %address, error = %e, "pairing label rejected"),
                    }
                }
            }
        }
        actions
    }

    fn persist_peers(&mut self) -> OutboundAction {
        self.peers_stored = true;
        OutboundAction::Persist {
            blob: BlobKind::Peers,
            bytes: store::encode_peers(self.registry.entries()),
        }
    }

    fn persist_inbox(&self) -> Vec<OutboundAction> {
        let (records, minutes) = store::encode_inbox(self.inbox.entries());
        vec![
            OutboundAction::Persist {
                blob: BlobKind::Inbox,
                bytes: records,
            },
            OutboundAction::Persist {
                blob: BlobKind::InboxMinutes,
                bytes: minutes,
            },
        ]
    }
}

/// Inbox, inbox minutes and peers blobs; `None` for any never written.
fn load_blobs(store: &dyn BlobStore) -> Result<[Option<Vec<u8>>; 3], StoreError> {
    Ok([
        store.load(BlobKind::Inbox)?,
        store.load(BlobKind::InboxMinutes)?,
        store.load(BlobKind::Peers)?,
    ])
}
