// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ocr_core::GuidKind;

fn db_guid(home: u64, n: u64) -> Guid {
    Guid::pack(GuidKind::Db, Location(home), n)
}

fn edt_guid(n: u64) -> Guid {
    Guid::pack(GuidKind::Edt, Location(0), n)
}

fn grant(res: Result<(LocalAcquire, Vec<Action>), RuntimeError>) -> Arc<RwLock<Vec<u8>>> {
    match res {
        Ok((LocalAcquire::Granted { data }, _)) => data,
        Ok((LocalAcquire::Deferred, _)) => panic!("expected grant, got deferral"),
        Err(e) => panic!("expected grant, got {e:?}"),
    }
}

fn deferred(res: Result<(LocalAcquire, Vec<Action>), RuntimeError>) -> Vec<Action> {
    match res {
        Ok((LocalAcquire::Deferred, actions)) => actions,
        Ok((LocalAcquire::Granted { .. }, _)) => panic!("expected deferral, got grant"),
        Err(e) => panic!("expected deferral, got {e:?}"),
    }
}

#[test]
fn create_acquire_write_release_destroy() {
    let db = DataBlock::master(db_guid(0, 1), 8, false, &Hints::new());
    let data = grant(db.acquire_local(edt_guid(1), 0, AccessMode::Rw));
    data.write()[0] = 42;
    let actions = db.release_local().unwrap();
    assert!(actions.is_empty());
    let actions = db.destroy().unwrap();
    assert!(matches!(actions.as_slice(), [Action::DestroyGuid(_)]));
}

#[test]
fn double_destroy_is_refused() {
    let db = DataBlock::master(db_guid(0, 1), 8, false, &Hints::new());
    db.destroy().unwrap();
    assert_eq!(db.destroy(), Err(RuntimeError::Perm));
}

#[test]
fn release_underflow_is_refused() {
    let db = DataBlock::master(db_guid(0, 1), 8, false, &Hints::new());
    assert_eq!(db.release_local().unwrap_err(), RuntimeError::Inval);
}

#[test]
fn readers_coexist_writer_waits() {
    let db = DataBlock::master(db_guid(0, 1), 8, false, &Hints::new());
    let _r1 = grant(db.acquire_local(edt_guid(1), 0, AccessMode::Ro));
    let _r2 = grant(db.acquire_local(edt_guid(2), 0, AccessMode::Const));
    let actions = deferred(db.acquire_local(edt_guid(3), 0, AccessMode::Ew));
    assert!(actions.is_empty());

    // Writer drains once both readers are out.
    assert!(db.release_local().unwrap().is_empty());
    let actions = db.release_local().unwrap();
    assert!(matches!(
        actions.as_slice(),
        [Action::AcquireGranted { slot: 0, .. }]
    ));
}

#[test]
fn writer_priority_over_const_on_drain() {
    let db = DataBlock::master(db_guid(0, 1), 8, false, &Hints::new());
    let _w = grant(db.acquire_local(edt_guid(1), 0, AccessMode::Ew));
    deferred(db.acquire_local(edt_guid(2), 0, AccessMode::Const));
    deferred(db.acquire_local(edt_guid(3), 1, AccessMode::Rw));

    let actions = db.release_local().unwrap();
    // RW queue drains ahead of CONST; the two cannot coexist so the
    // const reader stays parked.
    assert_eq!(actions.len(), 1);
    assert!(matches!(
        actions[0],
        Action::AcquireGranted { edt, slot: 1, .. } if edt == edt_guid(3)
    ));
}

#[test]
fn single_assignment_second_writer_is_refused() {
    let db = DataBlock::master(db_guid(0, 1), 8, true, &Hints::new());
    let _w = grant(db.acquire_local(edt_guid(1), 0, AccessMode::Rw));
    db.release_local().unwrap();
    assert_eq!(
        db.acquire_local(edt_guid(2), 0, AccessMode::Ew).unwrap_err(),
        RuntimeError::Perm
    );
    // Readers are still welcome.
    let _r = grant(db.acquire_local(edt_guid(3), 0, AccessMode::Ro));
}

#[test]
fn eager_refuses_writers() {
    let mut hints = Hints::new();
    hints.set(HintKey::DbEager, 1);
    let db = DataBlock::master(db_guid(0, 1), 8, false, &hints);
    assert_eq!(
        db.acquire_local(edt_guid(1), 0, AccessMode::Rw).unwrap_err(),
        RuntimeError::Perm
    );
}

#[test]
fn slave_shell_pulls_once() {
    let db = DataBlock::shell(db_guid(0, 7), Location(0));
    let actions = deferred(db.acquire_local(edt_guid(1), 0, AccessMode::Ew));
    assert!(matches!(
        actions.as_slice(),
        [Action::Send { dest: Location(0), body: MessageBody::DbAcquire { .. }, want_response: true }]
    ));
    // Second acquire while fetching queues silently.
    let actions = deferred(db.acquire_local(edt_guid(2), 0, AccessMode::Ro));
    assert!(actions.is_empty());
}

#[test]
fn slave_grant_after_clone_install() {
    let db = DataBlock::shell(db_guid(0, 7), Location(0));
    deferred(db.acquire_local(edt_guid(1), 0, AccessMode::Ew));

    // First contact: clone carries the payload, grant follows empty.
    let actions = db.install_clone(4, false, &Hints::new(), vec![1, 2, 3, 4]);
    assert!(actions.is_empty());
    let actions = db.on_acquire_response(None, true, AccessMode::Ew);
    assert_eq!(actions.len(), 1);
    assert!(matches!(actions[0], Action::AcquireGranted { slot: 0, .. }));
    assert_eq!(db.size(), Some(4));
}

#[test]
fn slave_grant_races_ahead_of_clone() {
    let db = DataBlock::shell(db_guid(0, 7), Location(0));
    deferred(db.acquire_local(edt_guid(1), 0, AccessMode::Ro));

    // Grant first: parked until the payload lands.
    let actions = db.on_acquire_response(None, false, AccessMode::Ro);
    assert!(actions.is_empty());
    let actions = db.install_clone(2, false, &Hints::new(), vec![9, 9]);
    assert_eq!(actions.len(), 1);
    assert!(matches!(actions[0], Action::AcquireGranted { .. }));
}

#[test]
fn slave_release_ships_write_back() {
    let db = DataBlock::shell(db_guid(0, 7), Location(0));
    deferred(db.acquire_local(edt_guid(1), 0, AccessMode::Rw));
    db.install_clone(2, false, &Hints::new(), vec![0, 0]);
    let actions = db.on_acquire_response(None, true, AccessMode::Rw);
    assert_eq!(actions.len(), 1);

    db.payload_arc().write()[0] = 7;
    let actions = db.release_local().unwrap();
    match actions.as_slice() {
        [Action::Send { dest, body: MessageBody::DbRelease { payload: Some(p), .. }, want_response: true }] => {
            assert_eq!(*dest, Location(0));
            assert_eq!(p[0], 7);
        }
        other => panic!("unexpected actions: {other:?}"),
    }
}

#[test]
fn master_remote_acquire_first_contact_sends_clone() {
    let db = DataBlock::master(db_guid(0, 1), 4, false, &Hints::new());
    let (outcome, actions) =
        db.remote_acquire_msg(Location(1), 55, edt_guid(1), 0, AccessMode::Ew).unwrap();
    match outcome {
        RemoteOutcome::Done { payload: None, write_back: true } => {}
        _ => panic!("expected payload-free first-contact grant"),
    }
    assert!(matches!(
        actions.as_slice(),
        [Action::Send { dest: Location(1), body: MessageBody::MetadataComm { op: MetadataOp::Clone { .. }, .. }, .. }]
    ));
}

#[test]
fn master_repeat_remote_acquire_carries_payload() {
    let db = DataBlock::master(db_guid(0, 1), 4, false, &Hints::new());
    let (_, _) = db.remote_acquire_msg(Location(1), 1, edt_guid(1), 0, AccessMode::Ro).unwrap();
    db.remote_release_msg(Location(1), None).unwrap();
    let (outcome, actions) =
        db.remote_acquire_msg(Location(1), 2, edt_guid(1), 0, AccessMode::Ro).unwrap();
    assert!(actions.is_empty());
    match outcome {
        RemoteOutcome::Done { payload: Some(p), write_back: false } => assert_eq!(p.len(), 4),
        _ => panic!("expected payload on repeat grant"),
    }
}

#[test]
fn master_defers_remote_writer_behind_local_reader() {
    let db = DataBlock::master(db_guid(0, 1), 4, false, &Hints::new());
    let _r = grant(db.acquire_local(edt_guid(1), 0, AccessMode::Const));
    let (outcome, _) =
        db.remote_acquire_msg(Location(1), 9, edt_guid(2), 0, AccessMode::Rw).unwrap();
    assert!(matches!(outcome, RemoteOutcome::Queued));

    // Local release answers the parked peer.
    let actions = db.release_local().unwrap();
    assert!(actions.iter().any(|a| matches!(
        a,
        Action::Respond { dest: Location(1), msg_id: 9, body: MessageBody::DbAcquire { .. }, .. }
    )));
}

#[test]
fn remote_write_back_replaces_master_payload() {
    let db = DataBlock::master(db_guid(0, 1), 4, false, &Hints::new());
    db.remote_acquire_msg(Location(1), 1, edt_guid(1), 0, AccessMode::Ew).unwrap();
    db.remote_release_msg(Location(1), Some(vec![4, 3, 2, 1])).unwrap();
    assert_eq!(db.payload_arc().read().as_slice(), &[4, 3, 2, 1]);
}

#[test]
fn single_assignment_remote_second_writer_refused() {
    let db = DataBlock::master(db_guid(0, 1), 4, true, &Hints::new());
    db.remote_acquire_msg(Location(1), 1, edt_guid(1), 0, AccessMode::Ew).unwrap();
    db.remote_release_msg(Location(1), None).unwrap();
    assert!(db.remote_acquire_msg(Location(2), 2, edt_guid(2), 0, AccessMode::Rw).is_err());
}

#[test]
fn master_destroy_broadcasts_to_clones() {
    let db = DataBlock::master(db_guid(0, 1), 4, false, &Hints::new());
    db.remote_acquire_msg(Location(1), 1, edt_guid(1), 0, AccessMode::Ro).unwrap();
    db.remote_acquire_msg(Location(2), 2, edt_guid(2), 0, AccessMode::Ro).unwrap();
    db.remote_release_msg(Location(1), None).unwrap();
    db.remote_release_msg(Location(2), None).unwrap();

    let actions = db.destroy().unwrap();
    let dels: Vec<_> = actions
        .iter()
        .filter(|a| matches!(a, Action::Send { body: MessageBody::MetadataComm { op: MetadataOp::Del, .. }, .. }))
        .collect();
    assert_eq!(dels.len(), 2);
    // Not freed until both clones acknowledge.
    assert!(!actions.iter().any(|a| matches!(a, Action::DestroyGuid(_))));

    assert!(db.on_del_acked().is_empty());
    let actions = db.on_del_acked();
    assert!(matches!(actions.as_slice(), [Action::DestroyGuid(_)]));
}

#[test]
fn slave_del_waits_for_users() {
    let db = DataBlock::shell(db_guid(0, 7), Location(0));
    deferred(db.acquire_local(edt_guid(1), 0, AccessMode::Ro));
    db.install_clone(1, false, &Hints::new(), vec![0]);
    let actions = db.on_acquire_response(None, false, AccessMode::Ro);
    assert_eq!(actions.len(), 1);

    let (outcome, actions) = db.del_clone_msg(Location(0), 88).unwrap();
    assert!(matches!(outcome, RemoteOutcome::Queued));
    assert!(actions.is_empty());

    let actions = db.release_local().unwrap();
    assert!(actions.iter().any(|a| matches!(a, Action::Respond { msg_id: 88, .. })));
    assert!(actions.iter().any(|a| matches!(a, Action::DestroyGuid(_))));
}

#[test]
fn invalidate_under_users_is_queued_not_applied() {
    let db = DataBlock::shell(db_guid(0, 7), Location(0));
    deferred(db.acquire_local(edt_guid(1), 0, AccessMode::Ro));
    db.install_clone(1, false, &Hints::new(), vec![5]);
    db.on_acquire_response(None, false, AccessMode::Ro);

    let (outcome, _) = db.invalidate_clone_msg(Location(0), 13).unwrap();
    assert!(matches!(outcome, RemoteOutcome::Queued));
    // Payload untouched while the reader is live.
    assert_eq!(db.payload_arc().read().as_slice(), &[5]);

    let actions = db.release_local().unwrap();
    assert!(actions.iter().any(|a| matches!(
        a,
        Action::Respond { msg_id: 13, body: MessageBody::MetadataComm { op: MetadataOp::Invalidate { .. }, .. }, .. }
    )));
}

#[test]
fn lazy_clone_lingers_after_release() {
    let db = DataBlock::shell(db_guid(0, 7), Location(0));
    deferred(db.acquire_local(edt_guid(1), 0, AccessMode::Ro));
    let mut hints = Hints::new();
    hints.set(HintKey::DbLazy, 1);
    db.install_clone(1, false, &hints, vec![5]);
    db.on_acquire_response(None, false, AccessMode::Ro);

    // No release message goes home; the clone stays warm.
    let actions = db.release_local().unwrap();
    assert!(actions.is_empty());
    // A fresh local read grants straight from the lingering clone.
    let _r = grant(db.acquire_local(edt_guid(2), 0, AccessMode::Ro));
}

#[test]
fn lazy_master_forwards_ownership() {
    let mut hints = Hints::new();
    hints.set(HintKey::DbLazy, 1);
    let db = DataBlock::master(db_guid(0, 1), 2, false, &hints);

    // Two lazy readers exist, then location 2 wants to write.
    db.remote_acquire_msg(Location(1), 1, edt_guid(1), 0, AccessMode::Ro).unwrap();
    db.remote_acquire_msg(Location(2), 2, edt_guid(2), 0, AccessMode::Ro).unwrap();
    db.remote_release_msg(Location(1), None).unwrap();
    db.remote_release_msg(Location(2), None).unwrap();

    let (outcome, actions) =
        db.invalidate_request_msg(Location(2), 77, AccessMode::Rw).unwrap();
    assert!(matches!(outcome, RemoteOutcome::Queued));
    // Location 1 must drop its clone; location 2 is exempt.
    assert!(matches!(
        actions.as_slice(),
        [Action::Send { dest: Location(1), body: MessageBody::MetadataComm { op: MetadataOp::Invalidate { .. }, .. }, want_response: true }]
    ));

    // The ack releases ownership to the requester with the payload.
    let actions = db.on_invalidate_acked(None);
    assert!(matches!(
        actions.as_slice(),
        [Action::Respond { dest: Location(2), msg_id: 77, body: MessageBody::MetadataComm { op: MetadataOp::Invalidate { payload: Some(_), .. }, .. }, .. }]
    ));
}

#[test]
fn eager_install_grants_parked_reader() {
    let db = DataBlock::shell(db_guid(0, 7), Location(0));
    // Mark eager before any acquire, as the satisfy path does.
    let actions = db.install_eager(vec![1, 2, 3]);
    assert!(actions.is_empty());
    let _r = grant(db.acquire_local(edt_guid(1), 0, AccessMode::Ro));
    assert_eq!(db.size(), Some(3));
}

#[test]
fn eager_parked_reader_granted_on_push() {
    let db = DataBlock::shell(db_guid(0, 7), Location(0));
    {
        let mut inner = db.inner.lock();
        inner.is_eager = true;
    }
    // Satisfy not here yet: no pull may be issued.
    let actions = deferred(db.acquire_local(edt_guid(1), 0, AccessMode::Ro));
    assert!(actions.is_empty());
    let actions = db.install_eager(vec![9; 4]);
    assert_eq!(actions.len(), 1);
    assert!(matches!(actions[0], Action::AcquireGranted { .. }));
}
