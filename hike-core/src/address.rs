//! Device address: 6-byte MAC-like identity used as the key for peers, carry and inbox.

use std::fmt;
use std::str::FromStr;

use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Size of an address on the wire.
pub const ADDRESS_LEN: usize = 6;

/// Opaque 6-byte device identity. Compared byte-for-byte.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    /// Wildcard address. Always present in the peer registry at index 0.
    pub const BROADCAST: Address = Address([0xFF; ADDRESS_LEN]);

    pub const fn new(bytes: [u8; ADDRESS_LEN]) -> Self {
        Address(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// Build from a slice of exactly 6 bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; ADDRESS_LEN] = bytes.try_into().ok()?;
        Some(Address(arr))
    }

    /// Random locally administered unicast address, for hosts without a radio MAC.
    pub fn random_local() -> Self {
        let mut bytes = [0u8; ADDRESS_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        bytes[0] = (bytes[0] | 0x02) & 0xFE;
        Address(bytes)
    }

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    /// Last two bytes as uppercase hex, e.g. `CED0`. Fallback label for unnamed senders.
    pub fn short_label(&self) -> String {
        format!("{:02X}{:02X}", self.0[4], self.0[5])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid address {0:?}: expected six colon-separated hex bytes")]
pub struct ParseAddressError(String);

impl FromStr for Address {
    type Err = ParseAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseAddressError(s.to_string());
        let mut bytes = [0u8; ADDRESS_LEN];
        let mut parts = s.trim().split(|c| c == ':' || c == '-');
        for slot in bytes.iter_mut() {
            let part = parts.next().ok_or_else(err)?;
            if part.len() != 2 {
                return Err(err());
            }
            *slot = u8::from_str_radix(part, 16).map_err(|_| err())?;
        }
        if parts.next().is_some() {
            return Err(err());
        }
        Ok(Address(bytes))
    }
}

// Text form in config files and snapshots.
impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_parse() {
        let a = Address::new([0x30, 0xED, 0xA0, 0xA8, 0xCE, 0xD0]);
        let s = a.to_string();
        assert_eq!(s, "30:ED:A0:A8:CE:D0");
        assert_eq!(s.parse::<Address>().unwrap(), a);
        assert_eq!("30-ed-a0-a8-ce-d0".parse::<Address>().unwrap(), a);
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!("30:ED:A0:A8:CE".parse::<Address>().is_err());
        assert!("30:ED:A0:A8:CE:D0:11".parse::<Address>().is_err());
        assert!("30:ED:A0:A8:CE:ZZ".parse::<Address>().is_err());
        assert!("3:ED:A0:A8:CE:D0".parse::<Address>().is_err());
    }

    #[test]
    fn short_label_uses_last_two_bytes() {
        let a = Address::new([0x48, 0x27, 0xE2, 0x1E, 0x05, 0xB0]);
        assert_eq!(a.short_label(), "05B0");
    }

    #[test]
    fn random_local_is_unicast_and_local() {
        let a = Address::random_local();
        assert_eq!(a.as_bytes()[0] & 0x01, 0);
        assert_eq!(a.as_bytes()[0] & 0x02, 0x02);
        assert!(!a.is_broadcast());
    }

    #[test]
    fn from_slice_checks_length() {
        assert!(Address::from_slice(&[1, 2, 3, 4, 5]).is_none());
        assert_eq!(
            Address::from_slice(&[1, 2, 3, 4, 5, 6]),
            Some(Address::new([1, 2, 3, 4, 5, 6]))
        );
    }
}
