//! Inbox: statuses received from paired peers, with the minute each entry was last refreshed.

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::status::StatusRecord;

/// How a new record from a sender that already has an entry is folded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InboxPolicy {
    /// One entry per (sender, code). A different code from a known sender appends.
    #[default]
    SenderAndCode,
    /// One entry per sender, overwritten by its latest code.
    Sender,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboxEntry {
    pub record: StatusRecord,
    /// Minutes since boot when the entry was last refreshed.
    pub updated_min: u16,
}

impl InboxEntry {
    /// Minutes since the last refresh. Entries stamped after `now` (restored from a
    /// previous boot) read as zero.
    pub fn age_minutes(&self, now_min: u16) -> u16 {
        now_min.saturating_sub(self.updated_min)
    }
}

/// Render an age as the device screen does: `"12m ago"` below an hour, `"3h ago"` above.
pub fn format_age(minutes: u16) -> String {
    if minutes < 60 {
        format!("{}m ago", minutes)
    } else {
        format!("{}h ago", minutes / 60)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboxUpdate {
    /// Same record seen again; timestamp refreshed.
    Refreshed,
    /// Sender's previous status overwritten (`InboxPolicy::Sender` only).
    Replaced,
    Appended,
    Ignored,
}

#[derive(Debug, Clone, Default)]
pub struct Inbox {
    entries: Vec<InboxEntry>,
    policy: InboxPolicy,
}

impl Inbox {
    pub fn new(policy: InboxPolicy) -> Self {
        Self {
            entries: Vec::new(),
            policy,
        }
    }

    pub fn from_entries(policy: InboxPolicy, entries: Vec<InboxEntry>) -> Self {
        let entries = entries
            .into_iter()
            .filter(|e| !e.record.code.is_pairing())
            .collect();
        Self { entries, policy }
    }

    /// Fold in a record. The caller has already checked the sender is a peer.
    pub fn upsert(&mut self, record: StatusRecord, now_min: u16) -> InboxUpdate {
        if record.code.is_pairing() {
            return InboxUpdate::Ignored;
        }
        let existing = match self.policy {
            InboxPolicy::SenderAndCode => self.entries.iter_mut().find(|e| e.record == record),
            InboxPolicy::Sender => self
                .entries
                .iter_mut()
                .find(|e| e.record.sender == record.sender),
        };
        match existing {
            Some(entry) => {
                let replaced = entry.record != record;
                entry.record = record;
                entry.updated_min = now_min;
                if replaced {
                    InboxUpdate::Replaced
                } else {
                    InboxUpdate::Refreshed
                }
            }
            None => {
                self.entries.push(InboxEntry {
                    record,
                    updated_min: now_min,
                });
                InboxUpdate::Appended
            }
        }
    }

    /// Drop entries whose sender fails `keep`. Returns how many were dropped.
    pub fn retain_senders(&mut self, mut keep: impl FnMut(&Address) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| keep(&e.record.sender));
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[InboxEntry] {
        &self.entries
    }

    /// All entries from one sender, oldest first.
    pub fn from_sender<'a>(&'a self, sender: &'a Address) -> impl Iterator<Item = &'a InboxEntry> {
        self.entries.iter().filter(move |e| e.record.sender == *sender)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::StatusCode;

    fn peer() -> Address {
        Address::new([0x30, 0xED, 0xA0, 0xA8, 0xCE, 0xD0])
    }

    #[test]
    fn same_record_refreshes_timestamp() {
        let mut inbox = Inbox::new(InboxPolicy::SenderAndCode);
        assert_eq!(inbox.upsert(StatusRecord::new(peer(), 2), 3), InboxUpdate::Appended);
        assert_eq!(inbox.upsert(StatusRecord::new(peer(), 2), 9), InboxUpdate::Refreshed);
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox.entries()[0].updated_min, 9);
    }

    #[test]
    fn sender_and_code_keeps_history() {
        let mut inbox = Inbox::new(InboxPolicy::SenderAndCode);
        inbox.upsert(StatusRecord::new(peer(), 1), 0);
        assert_eq!(inbox.upsert(StatusRecord::new(peer(), 4), 5), InboxUpdate::Appended);
        let codes: Vec<u8> = inbox.from_sender(&peer()).map(|e| e.record.code.0).collect();
        assert_eq!(codes, vec![1, 4]);
        assert_eq!(inbox.entries()[0].updated_min, 0);
    }

    #[test]
    fn sender_policy_overwrites() {
        let mut inbox = Inbox::new(InboxPolicy::Sender);
        inbox.upsert(StatusRecord::new(peer(), 1), 0);
        assert_eq!(inbox.upsert(StatusRecord::new(peer(), 4), 5), InboxUpdate::Replaced);
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox.entries()[0].record.code, StatusCode::INJURED);
        assert_eq!(inbox.entries()[0].updated_min, 5);
    }

    #[test]
    fn sentinel_never_stored() {
        let mut inbox = Inbox::new(InboxPolicy::SenderAndCode);
        assert_eq!(
            inbox.upsert(StatusRecord::new(peer(), StatusCode::PAIRING), 0),
            InboxUpdate::Ignored
        );
        assert!(inbox.is_empty());
    }

    #[test]
    fn age_and_format() {
        let e = InboxEntry {
            record: StatusRecord::new(peer(), 0),
            updated_min: 10,
        };
        assert_eq!(e.age_minutes(25), 15);
        assert_eq!(e.age_minutes(4), 0);
        assert_eq!(format_age(15), "15m ago");
        assert_eq!(format_age(59), "59m ago");
        assert_eq!(format_age(125), "2h ago");
    }

    #[test]
    fn retain_drops_removed_senders() {
        let mut inbox = Inbox::new(InboxPolicy::SenderAndCode);
        let other = Address::new([1, 2, 3, 4, 5, 6]);
        inbox.upsert(StatusRecord::new(peer(), 1), 0);
        inbox.upsert(StatusRecord::new(other, 1), 0);
        assert_eq!(inbox.retain_senders(|a| *a != other), 1);
        assert_eq!(inbox.len(), 1);
    }
}
