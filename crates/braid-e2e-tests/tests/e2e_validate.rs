//! Graph-structural error reporting end to end.

mod common;

use braid_compile::Compiler;
use braid_ir::{Access, BufferHandle};
use common::{shared_trace, tracing_body, TestRt};

#[test]
fn read_before_write_is_an_error() {
    let rt = TestRt::new();
    let trace = shared_trace();

    let read = rt.make_pass("read", &[Access::TransferRead], &[1], tracing_body(&trace, "r"));
    let decl = rt.declare_buf("src0", 16);
    let r = rt.apply(&read, "read", &[&decl]).remove(0);

    let mut compiler = Compiler::new();
    let err = rt.submit(&mut compiler, &r).unwrap_err();
    assert!(err.to_string().contains("never written"));
    // Nothing ran.
    assert!(trace.borrow().is_empty());
}

#[test]
fn duplicated_resource_acquisition_is_an_error() {
    let rt = TestRt::new();
    let trace = shared_trace();

    let write2 = rt.make_pass(
        "write2",
        &[Access::TransferWrite, Access::TransferWrite],
        &[1],
        tracing_body(&trace, "w"),
    );

    // Two declarations over the same concrete buffer.
    let a = rt.declare_buf_raw("a", BufferHandle(7), 16);
    let b = rt.declare_buf_raw("b", BufferHandle(7), 16);
    let v = rt.apply(&write2, "write2", &[&a, &b]).remove(0);

    let mut compiler = Compiler::new();
    let err = rt.submit(&mut compiler, &v).unwrap_err();
    assert!(err.to_string().contains("already known"));
    assert!(trace.borrow().is_empty());
}

#[test]
fn distinct_resources_are_accepted() {
    let rt = TestRt::new();
    let trace = shared_trace();

    let write2 = rt.make_pass(
        "write2",
        &[Access::TransferWrite, Access::TransferWrite],
        &[1],
        tracing_body(&trace, "w"),
    );

    let a = rt.declare_buf("a", 16);
    let b = rt.declare_buf("b", 16);
    let v = rt.apply(&write2, "write2", &[&a, &b]).remove(0);

    let mut compiler = Compiler::new();
    rt.submit(&mut compiler, &v).unwrap();
    assert_eq!(*trace.borrow(), "w");
}
