//! Status codes and the status record carried on the wire.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::address::Address;

/// One-byte status value. Codes without a label are still relayed and stored.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusCode(pub u8);

impl StatusCode {
    pub const NEUTRAL: StatusCode = StatusCode(0);
    pub const WAIT: StatusCode = StatusCode(1);
    pub const GO_ON: StatusCode = StatusCode(2);
    pub const RETREAT: StatusCode = StatusCode(3);
    pub const INJURED: StatusCode = StatusCode(4);
    pub const LEFT: StatusCode = StatusCode(5);
    pub const RIGHT: StatusCode = StatusCode(6);
    pub const SOS: StatusCode = StatusCode(7);
    pub const GOODBYE: StatusCode = StatusCode(8);
    pub const CONFIRMED: StatusCode = StatusCode(9);

    /// Reserved: "I wish to pair". Never relayed, never stored in the inbox.
    pub const PAIRING: StatusCode = StatusCode(99);

    /// Codes an operator can pick as their own status.
    pub const SELECTABLE: std::ops::RangeInclusive<u8> = 0..=7;

    pub fn is_pairing(self) -> bool {
        self == Self::PAIRING
    }

    pub fn is_selectable(self) -> bool {
        Self::SELECTABLE.contains(&self.0)
    }

    /// Human-readable label; empty for unassigned codes.
    pub fn label(self) -> &'static str {
        match self.0 {
            0 => "NEUTRAL",
            1 => "WAIT",
            2 => "GO ON",
            3 => "RETREAT",
            4 => "INJURED",
            5 => "LEFT",
            6 => "RIGHT",
            7 => "SOS",
            8 => "GOODBYE",
            9 => "CONFIRMED",
            99 => "PAIRING",
            _ => "",
        }
    }
}

impl From<u8> for StatusCode {
    fn from(v: u8) -> Self {
        StatusCode(v)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.label() {
            "" => write!(f, "#{}", self.0),
            label => f.write_str(label),
        }
    }
}

/// A sender's status as it travels through the mesh.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct StatusRecord {
    pub sender: Address,
    pub code: StatusCode,
}

impl StatusRecord {
    pub fn new(sender: Address, code: impl Into<StatusCode>) -> Self {
        Self {
            sender,
            code: code.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels() {
        assert_eq!(StatusCode::GO_ON.label(), "GO ON");
        assert_eq!(StatusCode::SOS.to_string(), "SOS");
        assert_eq!(StatusCode(42).label(), "");
        assert_eq!(StatusCode(42).to_string(), "#42");
    }

    #[test]
    fn selectable_range_excludes_sentinel() {
        assert!(StatusCode::NEUTRAL.is_selectable());
        assert!(StatusCode::SOS.is_selectable());
        assert!(!StatusCode::GOODBYE.is_selectable());
        assert!(!StatusCode::PAIRING.is_selectable());
        assert!(StatusCode::PAIRING.is_pairing());
    }
}
