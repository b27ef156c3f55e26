// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Datablock lifecycle scenarios.

use crate::prelude::*;

#[test]
fn size_query_travels_with_the_handle() {
    let functions = FnRegistry::new();
    let consumer = functions.register(move |ctx: &mut TaskContext<'_>| {
        let db = ctx.depv()[0].guid;
        let size = ctx.db_get_size(db).expect("size");
        assert_eq!(size, 12345);
        ctx.shutdown(0);
        NULL_GUID
    });
    let main = functions.register(move |ctx: &mut TaskContext<'_>| {
        let (db, _) = ctx.db_create(12345, &Hints::new()).expect("db");
        ctx.db_release(db).expect("release");
        let tpl = ctx.edt_template_create(consumer, 0, 1).expect("template");
        let (edt, _) = ctx.edt_create(tpl, &[], &Hints::new(), false).expect("edt");
        ctx.add_dependence(db, edt, 0, AccessMode::Ro).expect("dependence");
        NULL_GUID
    });

    assert_eq!(run(RuntimeConfig::default(), functions, main), 0);
}

#[test]
fn create_write_release_destroy_round() {
    let functions = FnRegistry::new();
    let main = functions.register(move |ctx: &mut TaskContext<'_>| {
        let (db, data) = ctx.db_create(64, &Hints::new()).expect("db");
        fill_u64s(&mut data.write(), |i| i as u64 * 3);
        ctx.db_release(db).expect("release");
        ctx.db_destroy(db).expect("destroy");
        // A second destroy is a user error.
        assert!(ctx.db_destroy(db).is_err());
        ctx.shutdown(0);
        NULL_GUID
    });

    assert_eq!(run(RuntimeConfig::default(), functions, main), 0);
}

#[test]
fn readers_on_both_domains_share_the_block() {
    let functions = FnRegistry::new();
    let done = Arc::new(AtomicU64::new(0));

    let reader = {
        let done = Arc::clone(&done);
        functions.register(move |ctx: &mut TaskContext<'_>| {
            let values = ctx.depv()[0].as_u64s();
            assert_eq!(values[0], 99);
            if done.fetch_add(1, Ordering::SeqCst) == 1 {
                ctx.shutdown(0);
            }
            NULL_GUID
        })
    };
    let main = functions.register(move |ctx: &mut TaskContext<'_>| {
        let (db, data) = ctx.db_create(8, &Hints::new()).expect("db");
        fill_u64s(&mut data.write(), |_| 99);
        ctx.db_release(db).expect("release");

        let tpl = ctx.edt_template_create(reader, 0, 1).expect("template");
        let affinities = ctx.affinity_get();
        for affinity in affinities {
            let hints = ctx.affinity_hints(affinity);
            let (edt, _) = ctx.edt_create(tpl, &[], &hints, false).expect("edt");
            ctx.add_dependence(db, edt, 0, AccessMode::Const).expect("dependence");
        }
        NULL_GUID
    });

    assert_eq!(run(RuntimeConfig::with_pds(2), functions, main), 0);
    assert_eq!(done.load(Ordering::SeqCst), 2);
}
