//! Pairing handshake. While pairing, the local status is the pairing sentinel; pairing
//! signals from unknown devices become candidates the operator accepts or declines.
//!
//! Transitions are a pure function of `(state, event)`; the caller applies the returned
//! effects (status changes, registry additions).

use std::collections::BTreeSet;

use crate::address::Address;
use crate::registry::{normalize_label, RegistryError};
use crate::status::StatusCode;

/// Length of a label entered while confirming a candidate.
pub const PAIR_LABEL_LEN: usize = 2;

static NO_DECLINES: BTreeSet<Address> = BTreeSet::new();

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PairingState {
    #[default]
    Idle,
    /// Local status is the sentinel; waiting for another device's request.
    Broadcasting {
        saved: StatusCode,
        declined: BTreeSet<Address>,
    },
    /// A non-peer asked to pair; awaiting operator accept/decline.
    RequestPending {
        saved: StatusCode,
        candidate: Address,
        declined: BTreeSet<Address>,
    },
    /// Accepted; awaiting the candidate's label.
    ConfirmingIdentity {
        saved: StatusCode,
        candidate: Address,
        declined: BTreeSet<Address>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingEvent {
    Enter { current: StatusCode },
    /// Record 0 of a received payload carried the sentinel.
    Signal { sender: Address, already_peer: bool },
    Accept,
    Decline,
    /// Label already validated by [`pair_label`].
    ConfirmLabel(String),
    /// A peer was added outside the handshake.
    PeerAdded(Address),
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingEffect {
    SetStatus(StatusCode),
    AddPeer { address: Address, initials: String },
}

/// Coarse phase, for display and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingPhase {
    Idle,
    Broadcasting,
    RequestPending,
    ConfirmingIdentity,
}

impl PairingState {
    pub fn step(self, event: PairingEvent) -> (PairingState, Vec<PairingEffect>) {
        use PairingEvent as E;
        use PairingState as S;

        match (self, event) {
            (S::Idle, E::Enter { current }) => (
                S::Broadcasting {
                    saved: current,
                    declined: BTreeSet::new(),
                },
                vec![PairingEffect::SetStatus(StatusCode::PAIRING)],
            ),
            (
                S::Broadcasting { saved, declined },
                E::Signal {
                    sender,
                    already_peer,
                },
            ) if !already_peer && !declined.contains(&sender) => (
                S::RequestPending {
                    saved,
                    candidate: sender,
                    declined,
                },
                vec![],
            ),
            (
                S::RequestPending {
                    saved,
                    candidate,
                    mut declined,
                },
                E::Decline,
            ) => {
                declined.insert(candidate);
                (S::Broadcasting { saved, declined }, vec![])
            }
            (
                S::RequestPending {
                    saved,
                    candidate,
                    declined,
                },
                E::Accept,
            ) => (
                S::ConfirmingIdentity {
                    saved,
                    candidate,
                    declined,
                },
                vec![],
            ),
            (S::ConfirmingIdentity { saved, candidate, .. }, E::ConfirmLabel(initials)) => (
                S::Idle,
                vec![
                    PairingEffect::AddPeer {
                        address: candidate,
                        initials,
                    },
                    PairingEffect::SetStatus(saved),
                ],
            ),
            (
                S::RequestPending { saved, declined, .. }
                | S::ConfirmingIdentity { saved, declined, .. },
                E::PeerAdded(_),
            ) => (S::Broadcasting { saved, declined }, vec![]),
            (
                S::Broadcasting { saved, .. }
                | S::RequestPending { saved, .. }
                | S::ConfirmingIdentity { saved, .. },
                E::Cancel,
            ) => (S::Idle, vec![PairingEffect::SetStatus(saved)]),
            (state, _) => (state, vec![]),
        }
    }

    pub fn phase(&self) -> PairingPhase {
        match self {
            PairingState::Idle => PairingPhase::Idle,
            PairingState::Broadcasting { .. } => PairingPhase::Broadcasting,
            PairingState::RequestPending { .. } => PairingPhase::RequestPending,
            PairingState::ConfirmingIdentity { .. } => PairingPhase::ConfirmingIdentity,
        }
    }

    pub fn is_pairing(&self) -> bool {
        !matches!(self, PairingState::Idle)
    }

    pub fn candidate(&self) -> Option<Address> {
        match self {
            PairingState::RequestPending { candidate, .. }
            | PairingState::ConfirmingIdentity { candidate, .. } => Some(*candidate),
            _ => None,
        }
    }

    pub fn declined(&self) -> &BTreeSet<Address> {
        match self {
            PairingState::Idle => &NO_DECLINES,
            PairingState::Broadcasting { declined, .. }
            | PairingState::RequestPending { declined, .. }
            | PairingState::ConfirmingIdentity { declined, .. } => declined,
        }
    }
}

/// Validate a confirmation label: exactly two letters or digits, uppercased.
pub fn pair_label(raw: &str) -> Result<String, RegistryError> {
    let label = normalize_label(raw)?;
    if label.len() != PAIR_LABEL_LEN {
        return Err(RegistryError::InvalidLabel(raw.to_string()));
    }
    Ok(label)
}
