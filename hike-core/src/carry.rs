//! Carry buffer: overheard statuses this device relays in its own broadcasts.
//! One record per sender, updated in place; a new sender at capacity evicts the oldest.

use std::collections::VecDeque;

use crate::address::Address;
use crate::status::StatusRecord;

/// Default number of relayed records per broadcast.
pub const CARRY_LIMIT: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Updated,
    Inserted,
    /// Inserted after dropping the oldest sender.
    Evicted(Address),
    /// Pairing requests never relay.
    Ignored,
}

#[derive(Debug, Clone)]
pub struct CarryBuffer {
    records: VecDeque<StatusRecord>,
    capacity: usize,
}

impl CarryBuffer {
    pub fn new() -> Self {
        Self::with_capacity(CARRY_LIMIT)
    }

    /// A zero capacity is treated as 1.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn upsert(&mut self, record: StatusRecord) -> Upsert {
        if record.code.is_pairing() {
            return Upsert::Ignored;
        }
        if let Some(slot) = self.records.iter_mut().find(|r| r.sender == record.sender) {
            *slot = record;
            return Upsert::Updated;
        }
        let evicted = if self.records.len() >= self.capacity {
            self.records.pop_front().map(|r| r.sender)
        } else {
            None
        };
        self.records.push_back(record);
        match evicted {
            Some(sender) => Upsert::Evicted(sender),
            None => Upsert::Inserted,
        }
    }

    pub fn get(&self, sender: &Address) -> Option<&StatusRecord> {
        self.records.iter().find(|r| r.sender == *sender)
    }

    /// Oldest-inserted first.
    pub fn iter(&self) -> impl Iterator<Item = &StatusRecord> {
        self.records.iter()
    }

    pub fn contents(&self) -> Vec<StatusRecord> {
        self.records.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for CarryBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::StatusCode;

    fn sender(i: u8) -> Address {
        Address::new([0x10, 0, 0, 0, 0, i])
    }

    #[test]
    fn update_in_place_keeps_position() {
        let mut buf = CarryBuffer::new();
        buf.upsert(StatusRecord::new(sender(1), 1));
        buf.upsert(StatusRecord::new(sender(2), 1));
        assert_eq!(buf.upsert(StatusRecord::new(sender(1), 4)), Upsert::Updated);
        let c = buf.contents();
        assert_eq!(c.len(), 2);
        assert_eq!(c[0], StatusRecord::new(sender(1), 4));
    }

    #[test]
    fn new_sender_at_capacity_evicts_oldest() {
        let mut buf = CarryBuffer::new();
        for i in 1..=15 {
            buf.upsert(StatusRecord::new(sender(i), 0));
        }
        assert_eq!(buf.len(), 15);
        assert_eq!(
            buf.upsert(StatusRecord::new(sender(16), 0)),
            Upsert::Evicted(sender(1))
        );
        assert_eq!(buf.len(), 15);
        assert!(buf.get(&sender(1)).is_none());
        assert_eq!(buf.contents()[0].sender, sender(2));
        assert_eq!(buf.contents()[14].sender, sender(16));
    }

    #[test]
    fn update_at_capacity_never_evicts() {
        let mut buf = CarryBuffer::with_capacity(2);
        buf.upsert(StatusRecord::new(sender(1), 0));
        buf.upsert(StatusRecord::new(sender(2), 0));
        assert_eq!(buf.upsert(StatusRecord::new(sender(1), 3)), Upsert::Updated);
        assert!(buf.get(&sender(1)).is_some());
        assert!(buf.get(&sender(2)).is_some());
    }

    #[test]
    fn pairing_sentinel_not_carried() {
        let mut buf = CarryBuffer::new();
        assert_eq!(
            buf.upsert(StatusRecord::new(sender(1), StatusCode::PAIRING)),
            Upsert::Ignored
        );
        assert!(buf.is_empty());
    }
}
