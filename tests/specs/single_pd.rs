// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-domain runs: event-triggered EDTs and the shutdown path.

use crate::prelude::*;

#[test]
fn once_event_triggers_edt_exactly_once() {
    let functions = FnRegistry::new();
    let runs = Arc::new(AtomicU64::new(0));

    let consumer = {
        let runs = Arc::clone(&runs);
        functions.register(move |ctx: &mut TaskContext<'_>| {
            runs.fetch_add(1, Ordering::SeqCst);
            ctx.shutdown(0);
            NULL_GUID
        })
    };
    let main = functions.register(move |ctx: &mut TaskContext<'_>| {
        let event = ctx.event_create(EventKind::Once).expect("event");
        let tpl = ctx.edt_template_create(consumer, 0, 1).expect("template");
        let (edt, _) = ctx.edt_create(tpl, &[], &Hints::new(), false).expect("edt");
        ctx.add_dependence(event, edt, 0, AccessMode::Ro).expect("dependence");
        ctx.event_satisfy(event, NULL_GUID).expect("satisfy");
        NULL_GUID
    });

    let code = run(RuntimeConfig::default(), functions, main);
    assert_eq!(code, 0);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn sticky_event_chains_through_output_event() {
    let functions = FnRegistry::new();
    let saw_chain = Arc::new(AtomicBool::new(false));

    // Producer returns its own guid chain value; the consumer hangs
    // off the producer's output event.
    let producer = functions.register(move |_ctx: &mut TaskContext<'_>| NULL_GUID);
    let consumer = {
        let saw_chain = Arc::clone(&saw_chain);
        functions.register(move |ctx: &mut TaskContext<'_>| {
            saw_chain.store(true, Ordering::SeqCst);
            ctx.shutdown(0);
            NULL_GUID
        })
    };
    let main = functions.register(move |ctx: &mut TaskContext<'_>| {
        let prod_tpl = ctx.edt_template_create(producer, 0, 1).expect("template");
        let cons_tpl = ctx.edt_template_create(consumer, 0, 1).expect("template");

        let gate = ctx.event_create(EventKind::Sticky).expect("gate");
        let (prod, out) = ctx.edt_create(prod_tpl, &[], &Hints::new(), true).expect("producer");
        assert!(!out.is_null());
        let (cons, _) = ctx.edt_create(cons_tpl, &[], &Hints::new(), false).expect("consumer");

        ctx.add_dependence(out, cons, 0, AccessMode::Ro).expect("chain");
        ctx.add_dependence(gate, prod, 0, AccessMode::Ro).expect("gate dep");
        ctx.event_satisfy(gate, NULL_GUID).expect("open gate");
        NULL_GUID
    });

    let code = run(RuntimeConfig::default(), functions, main);
    assert_eq!(code, 0);
    assert!(saw_chain.load(Ordering::SeqCst));
}

#[test]
fn latch_event_gates_on_counted_decrements() {
    let functions = FnRegistry::new();
    let fired = Arc::new(AtomicBool::new(false));

    let consumer = {
        let fired = Arc::clone(&fired);
        functions.register(move |ctx: &mut TaskContext<'_>| {
            fired.store(true, Ordering::SeqCst);
            ctx.shutdown(0);
            NULL_GUID
        })
    };
    let main = functions.register(move |ctx: &mut TaskContext<'_>| {
        let latch = ctx
            .event_create_params(
                EventKind::Latch,
                EventParams::Latch(ocr_core::LatchParams { init_count: 2 }),
            )
            .expect("latch");
        let tpl = ctx.edt_template_create(consumer, 0, 1).expect("template");
        let (edt, _) = ctx.edt_create(tpl, &[], &Hints::new(), false).expect("edt");
        ctx.add_dependence(latch, edt, 0, AccessMode::Ro).expect("dependence");

        // Two decrements bring the counter to zero and fire the latch.
        ctx.event_satisfy_slot(latch, NULL_GUID, 1).expect("decr");
        ctx.event_satisfy_slot(latch, NULL_GUID, 1).expect("decr");
        NULL_GUID
    });

    let code = run(RuntimeConfig::default(), functions, main);
    assert_eq!(code, 0);
    assert!(fired.load(Ordering::SeqCst));
}
