//! End-to-end relay scenarios across one or more cores.

use std::time::Duration;

use hike_core::{
    wire, Address, BlobKind, BlobStore, CoreConfig, HikeCore, MemoryStore, OutboundAction,
    PairingPhase, PairingState, StatusCode, StatusRecord,
};

fn addr(last: u8) -> Address {
    Address::new([0x48, 0x27, 0xE2, 0x1E, 0x55, last])
}

fn apply(store: &MemoryStore, actions: Vec<OutboundAction>) {
    for action in actions {
        if let OutboundAction::Persist { blob, bytes } = action {
            store.save(blob, &bytes).unwrap();
        }
    }
}

#[test]
fn fresh_device_broadcasts_only_itself() {
    let mut core = HikeCore::new(addr(0xA0));
    core.set_local_status(StatusCode(2)).unwrap();
    let records = wire::decode(&core.build_outgoing()).unwrap();
    assert_eq!(records, vec![StatusRecord::new(addr(0xA0), 2)]);
}

#[test]
fn sixteenth_sender_evicts_first() {
    let mut core = HikeCore::new(addr(0xA0));
    for i in 1..=15 {
        core.on_receive(&wire::encode(&[StatusRecord::new(addr(i), 1)]));
    }
    core.on_receive(&wire::encode(&[StatusRecord::new(addr(16), 3)]));
    assert_eq!(core.carry().len(), 15);
    assert!(core.carry().get(&addr(1)).is_none());
    for i in 2..=16 {
        assert!(core.carry().get(&addr(i)).is_some());
    }
}

#[test]
fn pairing_request_from_existing_peer_is_not_surfaced() {
    let mut core = HikeCore::new(addr(0xA0));
    core.add_peer_manually(addr(1), "PP").unwrap();
    core.enter_pairing_mode();
    core.on_receive(&wire::encode(&[StatusRecord::new(addr(1), StatusCode::PAIRING)]));
    assert_eq!(core.pairing().phase(), PairingPhase::Broadcasting);
    assert!(core.inbox().is_empty());
    assert!(core.carry().is_empty());
}

#[test]
fn accept_and_label_candidate() {
    let mut core = HikeCore::new(addr(0xA0));
    core.set_local_status(StatusCode::WAIT).unwrap();
    core.enter_pairing_mode();
    core.on_receive(&wire::encode(&[StatusRecord::new(addr(9), StatusCode::PAIRING)]));
    assert_eq!(core.pairing().candidate(), Some(addr(9)));
    core.accept_pending_candidate();
    core.confirm_candidate_label("RR").unwrap();
    assert_eq!(core.peers().get(&addr(9)).map(|p| p.initials.as_str()), Some("RR"));
    assert_eq!(core.pairing(), &PairingState::Idle);
    assert_eq!(core.local_status(), StatusCode::WAIT);
}

#[test]
fn corrupt_peer_blob_loads_broadcast_only() {
    let store = MemoryStore::new();
    store.save(BlobKind::Peers, &[1, 2, 3, 4, 5, 6, 7]).unwrap();
    let core = HikeCore::restore(addr(0xA0), CoreConfig::default(), &store);
    assert_eq!(core.peers().entries().len(), 1);
    assert!(core.peers().entries()[0].address.is_broadcast());
    assert_eq!(core.peers().peer_count(), 0);
}

#[test]
fn two_devices_pair_with_each_other() {
    let mut a = HikeCore::new(addr(0xA0));
    let mut b = HikeCore::new(addr(0xB0));
    a.enter_pairing_mode();
    b.enter_pairing_mode();
    a.on_receive(&b.build_outgoing());
    b.on_receive(&a.build_outgoing());
    a.accept_pending_candidate();
    b.accept_pending_candidate();
    a.confirm_candidate_label("BB").unwrap();
    b.confirm_candidate_label("AA").unwrap();
    assert_eq!(a.label_for(&addr(0xB0)), "BB");
    assert_eq!(b.label_for(&addr(0xA0)), "AA");
    assert!(!a.pairing().is_pairing());

    b.set_local_status(StatusCode::SOS).unwrap();
    a.on_receive(&b.build_outgoing());
    let latest = a.inbox().entries().last().copied().unwrap();
    assert_eq!(latest.record, StatusRecord::new(addr(0xB0), StatusCode::SOS));
}

#[test]
fn status_hops_through_relay() {
    // a and c are never in range of each other; b carries a's status to c.
    let mut a = HikeCore::new(addr(0xA0));
    let mut b = HikeCore::new(addr(0xB0));
    let mut c = HikeCore::new(addr(0xC0));
    c.add_peer_manually(addr(0xA0), "AA").unwrap();
    a.set_local_status(StatusCode::INJURED).unwrap();

    b.on_receive(&a.build_outgoing());
    c.set_uptime(Duration::from_secs(3 * 60));
    c.on_receive(&b.build_outgoing());

    let entries = c.inbox().entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].record, StatusRecord::new(addr(0xA0), StatusCode::INJURED));
    assert_eq!(entries[0].updated_min, 3);
    // One hop only: c does not re-carry a's status, only b's own.
    let carried: Vec<Address> = c.carry().iter().map(|r| r.sender).collect();
    assert_eq!(carried, vec![addr(0xB0)]);
}

#[test]
fn state_survives_restart() {
    let store = MemoryStore::new();
    let mut a = HikeCore::restore(addr(0xA0), CoreConfig::default(), &store);
    apply(&store, a.add_peer_manually(addr(1), "XY").unwrap());
    apply(&store, a.on_receive(&wire::encode(&[StatusRecord::new(addr(1), 6)])));

    let restarted = HikeCore::restore(addr(0xA0), CoreConfig::default(), &store);
    assert_eq!(restarted.label_for(&addr(1)), "XY");
    assert_eq!(restarted.inbox().len(), 1);
    // Carry buffer is volatile.
    assert!(restarted.carry().is_empty());
}
