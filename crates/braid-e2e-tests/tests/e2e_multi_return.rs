//! Multi-result passes and repeated application of one pass.

mod common;

use braid_compile::Compiler;
use braid_ir::Access;
use common::{shared_trace, tracing_body, TestRt};

#[test]
fn multi_return_pass_fills_three_buffers() {
    let rt = TestRt::new();

    let fills = rt.make_pass(
        "fills",
        &[
            Access::TransferWrite,
            Access::TransferWrite,
            Access::TransferWrite,
        ],
        &[1, 2, 3],
        |ctx| {
            ctx.fill_buffer(1, 0xfc);
            ctx.fill_buffer(2, 0xfd);
            ctx.fill_buffer(3, 0xfe);
        },
    );

    let b0 = rt.declare_buf("src0", 16);
    let b1 = rt.declare_buf("src1", 16);
    let b2 = rt.declare_buf("src2", 16);
    let mut filled = rt.apply(&fills, "fills", &[&b0, &b1, &b2]);
    let b2p = filled.remove(2);
    let b1p = filled.remove(1);
    let b0p = filled.remove(0);

    let mut compiler = Compiler::new();
    rt.submit(&mut compiler, &b0p).unwrap();

    assert_eq!(rt.download_buffer(&compiler, &b0p), vec![0xfc; 16]);
    assert_eq!(rt.download_buffer(&compiler, &b1p), vec![0xfd; 16]);
    assert_eq!(rt.download_buffer(&compiler, &b2p), vec![0xfe; 16]);
}

#[test]
fn one_pass_applied_twice_runs_twice() {
    let rt = TestRt::new();
    let trace = shared_trace();

    let p = rt.make_pass("p", &[Access::TransferWrite], &[1], tracing_body(&trace, "p"));

    let b0 = rt.declare_buf("src0", 16);
    let once = rt.apply(&p, "p0", &[&b0]).remove(0);
    let twice = rt.apply(&p, "p1", &[&once]).remove(0);

    let mut compiler = Compiler::new();
    rt.submit(&mut compiler, &twice).unwrap();
    assert_eq!(*trace.borrow(), "pp");
}
