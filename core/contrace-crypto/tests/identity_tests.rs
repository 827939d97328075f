use contrace_crypto::{derive_ephemeral_id, new_stable_id, Identity, IdentityCell};
use contrace_types::{Timestamp, UserId, EPHEMERAL_ID_LEN};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::Arc;

fn fixed_user() -> UserId {
    UserId::parse("6f1c2c1e-9a53-4c0e-8a4f-2d7f3b1e5a90").unwrap()
}

// ── new_stable_id ────────────────────────────────────────────────

#[test]
fn stable_ids_are_unique() {
    let ids: HashSet<_> = (0..10_000).map(|_| new_stable_id()).collect();
    assert_eq!(ids.len(), 10_000);
}

#[test]
fn stable_ids_are_random_uuids() {
    assert_eq!(new_stable_id().get_version_num(), 4);
}

#[test]
fn generated_identity_keeps_user_and_device_apart() {
    let identity = Identity::generate();
    assert_ne!(identity.user_id.as_uuid(), identity.device_id.as_uuid());
}

#[test]
fn identity_debug_redacts_ids() {
    let identity = Identity::generate();
    let debug = format!("{identity:?}");
    assert!(debug.contains("REDACTED"));
    assert!(!debug.contains(&identity.user_id.to_string()));
}

// ── derive_ephemeral_id ──────────────────────────────────────────

#[test]
fn ephemeral_id_is_sixteen_hex_chars() {
    let id = derive_ephemeral_id(&fixed_user(), Timestamp::from_millis(1_700_000_000_000));
    assert_eq!(id.as_str().len(), EPHEMERAL_ID_LEN);
    assert!(id.as_str().bytes().all(|b| b.is_ascii_hexdigit()));
}

#[test]
fn ephemeral_id_is_prefix_of_sha256_hex() {
    let user = fixed_user();
    let t = Timestamp::from_millis(1_700_000_000_000);
    let digest = hex::encode(Sha256::digest(format!("{user}-1700000000000").as_bytes()));

    assert_eq!(
        derive_ephemeral_id(&user, t).as_str(),
        &digest[..EPHEMERAL_ID_LEN]
    );
}

#[test]
fn ephemeral_id_is_deterministic_within_epoch() {
    let t = Timestamp::from_millis(1_700_000_000_000);
    assert_eq!(
        derive_ephemeral_id(&fixed_user(), t),
        derive_ephemeral_id(&fixed_user(), t)
    );
}

#[test]
fn ephemeral_id_changes_across_epochs() {
    let t1 = Timestamp::from_millis(1_700_000_000_000);
    let t2 = Timestamp::from_millis(1_700_000_900_000);
    assert_ne!(
        derive_ephemeral_id(&fixed_user(), t1),
        derive_ephemeral_id(&fixed_user(), t2)
    );
}

#[test]
fn ephemeral_id_differs_between_users() {
    let t = Timestamp::from_millis(1_700_000_000_000);
    let other = UserId::from_uuid(new_stable_id());
    assert_ne!(derive_ephemeral_id(&fixed_user(), t), derive_ephemeral_id(&other, t));
}

#[test]
fn ephemeral_id_does_not_leak_user_id() {
    let user = fixed_user();
    let id = derive_ephemeral_id(&user, Timestamp::from_millis(0));
    let simple = user.as_uuid().simple().to_string();
    assert!(!simple.contains(id.as_str()));
}

// ── IdentityCell ─────────────────────────────────────────────────

#[test]
fn cell_starts_at_given_epoch() {
    let identity = Identity::generate();
    let start = Timestamp::from_millis(10_000);
    let cell = IdentityCell::new(identity, start);

    let snap = cell.snapshot();
    assert_eq!(snap.rotated_at, start);
    assert_eq!(snap.ephemeral_id, identity.ephemeral_id(start));
    assert_eq!(snap.user_id(), identity.user_id);
}

#[test]
fn rotate_swaps_id_and_time_together() {
    let identity = Identity::generate();
    let cell = IdentityCell::new(identity, Timestamp::from_millis(0));
    let before = cell.snapshot();

    let next = cell.rotate(Timestamp::from_millis(900_000));
    assert_ne!(before.ephemeral_id, next.ephemeral_id);
    assert_eq!(cell.snapshot().rotated_at.as_millis(), 900_000);
    assert_eq!(cell.snapshot().ephemeral_id, identity.ephemeral_id(next.rotated_at));
    // Old snapshots stay intact for readers that still hold them.
    assert_eq!(before.rotated_at.as_millis(), 0);
}

#[test]
fn concurrent_readers_never_see_torn_snapshots() {
    let identity = Identity::generate();
    let cell = Arc::new(IdentityCell::new(identity, Timestamp::from_millis(0)));

    let writer = {
        let cell = Arc::clone(&cell);
        std::thread::spawn(move || {
            for i in 1..=500u64 {
                cell.rotate(Timestamp::from_millis(i * 1_000));
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let cell = Arc::clone(&cell);
            std::thread::spawn(move || {
                for _ in 0..500 {
                    let snap = cell.snapshot();
                    assert_eq!(snap.ephemeral_id, identity.ephemeral_id(snap.rotated_at));
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for r in readers {
        r.join().unwrap();
    }
}
