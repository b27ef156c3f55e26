// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Two-domain runs: remote EDT placement and remote datablock pulls.

use crate::prelude::*;

#[test]
fn remote_edt_observes_its_parameters() {
    let functions = FnRegistry::new();
    let seen = Arc::new(AtomicU64::new(0));

    let consumer = {
        let seen = Arc::clone(&seen);
        functions.register(move |ctx: &mut TaskContext<'_>| {
            assert_eq!(ctx.paramv(), &[333, 555]);
            seen.store(ctx.current_affinity().home().as_u64(), Ordering::SeqCst);
            ctx.shutdown(0);
            NULL_GUID
        })
    };
    let main = functions.register(move |ctx: &mut TaskContext<'_>| {
        let tpl = ctx.edt_template_create(consumer, 2, 0).expect("template");
        let affinities = ctx.affinity_get();
        let target = *affinities.last().expect("affinity");
        let hints = ctx.affinity_hints(target);
        ctx.edt_create(tpl, &[333, 555], &hints, false).expect("remote edt");
        NULL_GUID
    });

    let code = run(RuntimeConfig::with_pds(2), functions, main);
    assert_eq!(code, 0);
    assert_eq!(seen.load(Ordering::SeqCst), 1, "consumer must run on the second domain");
}

#[test]
fn remote_ew_acquire_pulls_the_payload() {
    let functions = FnRegistry::new();
    let verified = Arc::new(AtomicBool::new(false));

    let consumer = {
        let verified = Arc::clone(&verified);
        functions.register(move |ctx: &mut TaskContext<'_>| {
            let values = ctx.depv()[0].as_u64s();
            assert_eq!(values.len(), 200);
            for (i, v) in values.iter().enumerate() {
                assert_eq!(*v, i as u64 + 1);
            }
            verified.store(true, Ordering::SeqCst);
            ctx.shutdown(0);
            NULL_GUID
        })
    };
    let main = functions.register(move |ctx: &mut TaskContext<'_>| {
        let (db, data) = ctx.db_create(200 * 8, &Hints::new()).expect("db");
        fill_u64s(&mut data.write(), |i| i as u64 + 1);
        ctx.db_release(db).expect("release");

        let tpl = ctx.edt_template_create(consumer, 0, 1).expect("template");
        let affinities = ctx.affinity_get();
        let hints = ctx.affinity_hints(*affinities.last().expect("affinity"));
        let (edt, _) = ctx.edt_create(tpl, &[], &hints, false).expect("edt");
        ctx.add_dependence(db, edt, 0, AccessMode::Ew).expect("dependence");
        NULL_GUID
    });

    let code = run(RuntimeConfig::with_pds(2), functions, main);
    assert_eq!(code, 0);
    assert!(verified.load(Ordering::SeqCst));
}

#[test]
fn shutdown_initiated_remotely_propagates_everywhere() {
    let functions = FnRegistry::new();
    let consumer = functions.register(move |ctx: &mut TaskContext<'_>| {
        ctx.shutdown(42);
        NULL_GUID
    });
    let main = functions.register(move |ctx: &mut TaskContext<'_>| {
        let tpl = ctx.edt_template_create(consumer, 0, 0).expect("template");
        let affinities = ctx.affinity_get();
        let hints = ctx.affinity_hints(*affinities.last().expect("affinity"));
        ctx.edt_create(tpl, &[], &hints, false).expect("edt");
        NULL_GUID
    });

    // The code travels with the tear-down notification back to the
    // blessed domain.
    let code = run(RuntimeConfig::with_pds(3), functions, main);
    assert_eq!(code, 42);
}
