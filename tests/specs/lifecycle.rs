// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bring-up, argv packing, exit codes.

use crate::prelude::*;

#[test]
fn argv_block_decodes_program_arguments() {
    let functions = FnRegistry::new();
    let main = functions.register(move |ctx: &mut TaskContext<'_>| {
        let argv = &ctx.depv()[0];
        let data = argv.data().expect("argv datablock");
        assert_eq!(ocr_core::arg_count(&data).expect("argc"), 4);
        assert_eq!(ocr_core::arg_at(&data, 0).expect("argv0"), "prog");
        assert_eq!(ocr_core::arg_at(&data, 1).expect("argv1"), "2");
        assert_eq!(ocr_core::arg_at(&data, 2).expect("argv2"), "4");
        assert_eq!(ocr_core::arg_at(&data, 3).expect("argv3"), "abcd");
        ctx.shutdown(0);
        NULL_GUID
    });

    let cfg = RuntimeConfig {
        args: vec!["prog".into(), "2".into(), "4".into(), "abcd".into()],
        ..RuntimeConfig::default()
    };
    assert_eq!(run(cfg, functions, main), 0);
}

#[test]
fn exit_code_returns_from_the_blessed_domain() {
    let functions = FnRegistry::new();
    let main = functions.register(move |ctx: &mut TaskContext<'_>| {
        ctx.shutdown(17);
        NULL_GUID
    });
    assert_eq!(run(RuntimeConfig::default(), functions, main), 17);
}

#[test]
fn finish_scope_holds_the_output_until_children_complete() {
    let functions = FnRegistry::new();
    let order = Arc::new(AtomicU64::new(0));

    let child = {
        let order = Arc::clone(&order);
        functions.register(move |_ctx: &mut TaskContext<'_>| {
            order.fetch_add(1, Ordering::SeqCst);
            NULL_GUID
        })
    };
    let after = {
        let order = Arc::clone(&order);
        functions.register(move |ctx: &mut TaskContext<'_>| {
            // Both children must have completed before the finish
            // scope's output fires.
            assert_eq!(order.load(Ordering::SeqCst), 2);
            ctx.shutdown(0);
            NULL_GUID
        })
    };
    let scope = {
        functions.register(move |ctx: &mut TaskContext<'_>| {
            let tpl = ctx.edt_template_create(child, 0, 0).expect("template");
            ctx.edt_create(tpl, &[], &Hints::new(), false).expect("child 1");
            ctx.edt_create(tpl, &[], &Hints::new(), false).expect("child 2");
            NULL_GUID
        })
    };
    let main = functions.register(move |ctx: &mut TaskContext<'_>| {
        let scope_tpl = ctx.edt_template_create(scope, 0, 0).expect("template");
        let after_tpl = ctx.edt_template_create(after, 0, 1).expect("template");

        let (_, out) = ctx
            .edt_create_ext(scope_tpl, &[], None, &Hints::new(), true, true)
            .expect("finish scope");
        let (waiter, _) = ctx.edt_create(after_tpl, &[], &Hints::new(), false).expect("after");
        ctx.add_dependence(out, waiter, 0, AccessMode::Ro).expect("dependence");
        NULL_GUID
    });

    assert_eq!(run(RuntimeConfig::default(), functions, main), 0);
}
