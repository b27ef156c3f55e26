// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Channel, eager-push and collective scenarios.

use crate::prelude::*;
use ocr_core::{ChannelParams, CollectiveParams, HintKey};

#[test]
fn eager_datablock_rides_the_channel_satisfy() {
    let functions = FnRegistry::new();
    let verified = Arc::new(AtomicBool::new(false));

    let consumer = {
        let verified = Arc::clone(&verified);
        functions.register(move |ctx: &mut TaskContext<'_>| {
            let values = ctx.depv()[0].as_u64s();
            assert_eq!(values.len(), 100);
            for (i, v) in values.iter().enumerate() {
                assert_eq!(*v, i as u64);
            }
            verified.store(true, Ordering::SeqCst);
            ctx.shutdown(0);
            NULL_GUID
        })
    };
    let main = functions.register(move |ctx: &mut TaskContext<'_>| {
        let channel = ctx
            .event_create_params(
                EventKind::Channel,
                EventParams::Channel(ChannelParams { max_gen: 1, nb_sat: 1, nb_deps: 1 }),
            )
            .expect("channel");

        let mut db_hints = Hints::new();
        db_hints.set(HintKey::DbEager, 1);
        let (db, data) = ctx.db_create(100 * 8, &db_hints).expect("db");
        fill_u64s(&mut data.write(), |i| i as u64);
        ctx.db_release(db).expect("release");

        let tpl = ctx.edt_template_create(consumer, 0, 1).expect("template");
        let affinities = ctx.affinity_get();
        let hints = ctx.affinity_hints(*affinities.last().expect("affinity"));
        let (edt, _) = ctx.edt_create(tpl, &[], &hints, false).expect("edt");
        ctx.add_dependence(channel, edt, 0, AccessMode::Ro).expect("dependence");
        ctx.event_satisfy(channel, db).expect("satisfy");
        NULL_GUID
    });

    let code = run(RuntimeConfig::with_pds(2), functions, main);
    assert_eq!(code, 0);
    assert!(verified.load(Ordering::SeqCst));
}

#[test]
fn collective_reduce_reaches_every_generation() {
    const PDS: u64 = 2;
    const CONTRIBS_PD: u64 = 2;
    const GENS: u64 = 2;
    let total_contribs = PDS * CONTRIBS_PD;

    let functions = FnRegistry::new();
    let generations_seen = Arc::new(AtomicU64::new(0));

    // Consumers hang off a channel event the collective feeds, one
    // consumer EDT per generation.
    let consumer = {
        let generations_seen = Arc::clone(&generations_seen);
        functions.register(move |ctx: &mut TaskContext<'_>| {
            let values = ctx.depv()[0].as_u64s();
            assert_eq!(values, vec![total_contribs]);
            if generations_seen.fetch_add(1, Ordering::SeqCst) + 1 == GENS {
                ctx.shutdown(0);
            }
            NULL_GUID
        })
    };

    // One contributor per domain feeds its slots every generation.
    let contributor = functions.register(move |ctx: &mut TaskContext<'_>| {
        let event = Guid(ctx.paramv()[0]);
        let first_slot = ctx.paramv()[1];
        for _gen in 0..GENS {
            for s in 0..CONTRIBS_PD {
                ctx.collective_satisfy_slot(event, &[1], first_slot + s).expect("contribute");
            }
        }
        NULL_GUID
    });

    let main = functions.register(move |ctx: &mut TaskContext<'_>| {
        let collective = ctx
            .event_create_params(
                EventKind::Collective,
                EventParams::Collective(CollectiveParams {
                    max_gen: GENS,
                    nb_contribs: total_contribs,
                    nb_contribs_pd: CONTRIBS_PD,
                    nb_datum: 1,
                }),
            )
            .expect("collective");
        let feed = ctx
            .event_create_params(
                EventKind::Channel,
                EventParams::Channel(ChannelParams {
                    max_gen: GENS,
                    nb_sat: GENS,
                    nb_deps: GENS,
                }),
            )
            .expect("feed");
        // The channel is the collective's registered consumer; each
        // generation's result pairs with one consumer EDT.
        ctx.add_dependence(collective, feed, 0, AccessMode::Ro).expect("chain");

        let cons_tpl = ctx.edt_template_create(consumer, 0, 1).expect("template");
        for _ in 0..GENS {
            let (edt, _) = ctx.edt_create(cons_tpl, &[], &Hints::new(), false).expect("edt");
            ctx.add_dependence(feed, edt, 0, AccessMode::Ro).expect("dependence");
        }

        let contrib_tpl = ctx.edt_template_create(contributor, 2, 0).expect("template");
        for (i, affinity) in ctx.affinity_get().into_iter().enumerate() {
            let hints = ctx.affinity_hints(affinity);
            let first_slot = i as u64 * CONTRIBS_PD;
            ctx.edt_create(contrib_tpl, &[collective.as_u64(), first_slot], &hints, false)
                .expect("contributor");
        }
        NULL_GUID
    });

    let code = run(RuntimeConfig::with_pds(PDS), functions, main);
    assert_eq!(code, 0);
    assert_eq!(generations_seen.load(Ordering::SeqCst), GENS);
}
