//! SSA conversion and cross-submit deduplication.

mod common;

use braid_compile::Compiler;
use braid_ir::Access;
use common::{shared_trace, tracing_body, TestRt};

#[test]
fn conversion_to_ssa() {
    let rt = TestRt::new();
    let trace = shared_trace();

    // Two writes and a read, all against the same declared buffer.
    // The second write retargets to the first write's value; the read
    // retargets to the second. Submitting the buffer releases only the
    // write chain, so the side-effect-only read is dropped.
    let a = rt.make_pass("a", &[Access::TransferWrite], &[1], tracing_body(&trace, "a"));
    let b = rt.make_pass("b", &[Access::TransferWrite], &[1], tracing_body(&trace, "b"));
    let c = rt.make_pass("c", &[Access::TransferRead], &[], tracing_body(&trace, "c"));

    let decl = rt.declare_buf("_a", 16);
    rt.apply(&a, "a", &[&decl]);
    rt.apply(&b, "b", &[&decl]);
    rt.apply(&c, "c", &[&decl]);

    let mut compiler = Compiler::new();
    rt.submit(&mut compiler, &decl).unwrap();

    assert_eq!(*trace.borrow(), "ab");
}

#[test]
fn minimal_graph_is_submitted() {
    let rt = TestRt::new();
    let trace = shared_trace();

    let pass_a = rt.make_pass("a", &[Access::TransferWrite], &[1], tracing_body(&trace, "a"));
    let pass_b = rt.make_pass("b", &[Access::TransferWrite], &[1], tracing_body(&trace, "b"));
    let binary = rt.make_pass(
        "d",
        &[Access::TransferRead, Access::TransferWrite],
        &[1],
        tracing_body(&trace, "d"),
    );
    let pass_e = rt.make_pass("e", &[Access::TransferWrite], &[1], tracing_body(&trace, "e"));

    let decl_a = rt.declare_buf("_a", 16);
    let decl_b = rt.declare_buf("_b", 16);
    let a = rt.apply(&pass_a, "a", &[&decl_a]).remove(0);
    let b = rt.apply(&pass_b, "b", &[&decl_b]).remove(0);
    let _d = rt.apply(&binary, "d", &[&a, &b]).remove(0);
    let e = rt.apply(&pass_e, "e", &[&a]).remove(0);

    // Only e's closure runs; d and b are not reachable from it.
    let mut compiler = Compiler::new();
    rt.submit(&mut compiler, &e).unwrap();
    assert_eq!(*trace.borrow(), "ae");
}

#[test]
fn computation_is_never_duplicated() {
    let rt = TestRt::new();
    let trace = shared_trace();

    let pass_a = rt.make_pass("a", &[Access::TransferWrite], &[1], tracing_body(&trace, "a"));
    let pass_b = rt.make_pass("b", &[Access::TransferWrite], &[1], tracing_body(&trace, "b"));
    let binary = rt.make_pass(
        "d",
        &[Access::TransferRead, Access::TransferWrite],
        &[1],
        tracing_body(&trace, "d"),
    );
    let pass_e = rt.make_pass("e", &[Access::TransferWrite], &[1], tracing_body(&trace, "e"));

    let a = rt
        .apply(&pass_a, "a", &[&rt.declare_buf("_a", 16)])
        .remove(0);
    let b = rt
        .apply(&pass_b, "b", &[&rt.declare_buf("_b", 16)])
        .remove(0);
    let d = rt.apply(&binary, "d", &[&a, &b]).remove(0);
    let e = rt.apply(&pass_e, "e", &[&a]).remove(0);

    let mut compiler = Compiler::new();
    rt.submit(&mut compiler, &e).unwrap();
    // The second submit reuses a's already-computed value through its
    // armed seam instead of re-running a.
    rt.submit(&mut compiler, &d).unwrap();

    assert_eq!(*trace.borrow(), "aebd");
}

#[test]
fn repeated_submit_executes_once() {
    let rt = TestRt::new();
    let trace = shared_trace();

    let pass_a = rt.make_pass("a", &[Access::TransferWrite], &[1], tracing_body(&trace, "a"));
    let pass_b = rt.make_pass("b", &[Access::TransferWrite], &[1], tracing_body(&trace, "b"));
    let binary = rt.make_pass(
        "d",
        &[Access::TransferRead, Access::TransferWrite],
        &[1],
        tracing_body(&trace, "d"),
    );

    let a = rt
        .apply(&pass_a, "a", &[&rt.declare_buf("_a", 16)])
        .remove(0);
    let b = rt
        .apply(&pass_b, "b", &[&rt.declare_buf("_b", 16)])
        .remove(0);
    let d = rt.apply(&binary, "d", &[&a, &b]).remove(0);

    let mut compiler = Compiler::new();
    rt.submit(&mut compiler, &d).unwrap();
    let after_first = trace.borrow().clone();
    rt.submit(&mut compiler, &d).unwrap();

    assert_eq!(after_first.matches('d').count(), 1);
    // Nothing new runs on the second submit.
    assert_eq!(*trace.borrow(), after_first);
}

#[test]
fn graph_is_cleaned_up_after_submit() {
    let rt = TestRt::new();
    let trace = shared_trace();

    let pass_a = rt.make_pass("a", &[Access::TransferWrite], &[1], tracing_body(&trace, "a"));
    let pass_e = rt.make_pass("e", &[Access::TransferWrite], &[1], tracing_body(&trace, "e"));

    let a = rt
        .apply(&pass_a, "a", &[&rt.declare_buf("_a", 16)])
        .remove(0);
    let e = rt.apply(&pass_e, "e", &[&a]).remove(0);

    let mut compiler = Compiler::new();
    rt.submit(&mut compiler, &e).unwrap();
    let before = rt.module.borrow().op_arena.len();

    // Release every external reference, then sweep.
    drop(compiler);
    drop(a);
    drop(e);
    rt.module.borrow_mut().collect_garbage();

    let after = rt.module.borrow().op_arena.len();
    assert!(
        after < before,
        "sweep did not reclaim anything ({before} -> {after})"
    );
}
