use super::expr::{BoundExpr, MinMaxKind, ValueNode, BinaryOp};
use super::loops::{LoopId, LoopNest};
use super::trip::TripCount;
use super::*;

/// `for (i = init; i <pred> bound; i += step) {}` with the compare in the
/// header. Returns the function and the parameter `%n`.
fn counted(init: Operand, pred: Predicate, bound: Option<Operand>, step: i64) -> (Function, ValueId) {
    let mut b = FunctionBuilder::kernel("k");
    let n = b.param("n", Type::Int(32));
    let entry = b.block("entry");
    let header = b.block("header");
    let body = b.block("body");
    let exit = b.block("exit");
    b.br(header);

    b.switch_to(header);
    let i = b.phi("i", Type::Int(32), vec![(init, entry)]);
    let bound = bound.unwrap_or(Operand::Value(n));
    let c = b.icmp("c", pred, Operand::Value(i), bound);
    b.cond_br(Operand::Value(c), body, exit);

    b.switch_to(body);
    let next = b.binary("i.next", Opcode::Add, Type::Int(32), Operand::Value(i), Operand::Int(step));
    b.br(header);
    b.add_incoming(i, Operand::Value(next), body);

    b.switch_to(exit);
    b.ret();
    (b.finish(), n)
}

#[test]
fn test_builder_numbers_params_before_results() {
    let (f, n) = counted(Operand::Int(0), Predicate::Slt, None, 1);
    assert_eq!(n, ValueId(0));
    assert_eq!(f.value_name(ValueId(1)), "i");
    assert_eq!(f.value(ValueId(1)).def, ValueDef::Inst { block: BlockId(1), index: 0 });
    assert_eq!(f.instruction_count(), 7);
}

#[test]
fn test_successors_and_predecessors() {
    let (f, _) = counted(Operand::Int(0), Predicate::Slt, None, 1);
    assert_eq!(f.successors(BlockId(1)), &[BlockId(2), BlockId(3)]);
    assert_eq!(f.predecessors(BlockId(1)), vec![BlockId(0), BlockId(2)]);
    assert!(f.successors(BlockId(3)).is_empty());
}

#[test]
fn test_addr_space_numbering() {
    assert_eq!(AddrSpace::from_index(0), AddrSpace::Generic);
    assert_eq!(AddrSpace::from_index(1), AddrSpace::Global);
    assert_eq!(AddrSpace::from_index(3), AddrSpace::Local);
    assert_eq!(AddrSpace::from_index(4), AddrSpace::Constant);
    assert_eq!(AddrSpace::from_index(5), AddrSpace::Private);
    assert_eq!(AddrSpace::from_index(42), AddrSpace::Generic);
}

#[test]
fn test_opcode_names_round_trip() {
    for &op in Opcode::ALL {
        assert_eq!(Opcode::from_name(op.name()), Some(op));
    }
    assert_eq!(Opcode::from_name("frobnicate"), None);
}

#[test]
fn test_predicate_inverse_and_swap() {
    assert_eq!(Predicate::Slt.inverse(), Predicate::Sge);
    assert_eq!(Predicate::Ule.swapped(), Predicate::Uge);
    assert_eq!(Predicate::Eq.swapped(), Predicate::Eq);
}

#[test]
fn test_value_node_views() {
    let mut b = FunctionBuilder::kernel("k");
    let n = b.param("n", Type::Int(32));
    b.block("entry");
    let s = b.binary("s", Opcode::Shl, Type::Int(32), Operand::Value(n), Operand::Int(2));
    let m = b.binary("m", Opcode::Mul, Type::Int(32), Operand::Value(n), Operand::Int(2));
    b.ret();
    let f = b.finish();

    assert_eq!(f.value_node(Operand::Int(7)), ValueNode::Const(7));
    assert_eq!(
        f.value_node(Operand::Value(s)),
        ValueNode::Binary { op: BinaryOp::Shl, lhs: Operand::Value(n), rhs: Operand::Int(2) }
    );
    assert_eq!(f.value_node(Operand::Value(m)), ValueNode::Unsupported(Operand::Value(m)));
    assert_eq!(f.value_node(Operand::Value(n)), ValueNode::Unsupported(Operand::Value(n)));
    assert_eq!(f.describe(Operand::Value(s)), "%s = shl %n, 2");
}

#[test]
fn test_single_loop_detected() {
    let (f, _) = counted(Operand::Int(0), Predicate::Slt, None, 1);
    let nest = LoopNest::analyze(&f);
    assert_eq!(nest.len(), 1);
    let lp = nest.get(LoopId(0));
    assert_eq!(lp.header, BlockId(1));
    assert_eq!(lp.latches, vec![BlockId(2)]);
    assert_eq!(lp.depth, 1);
    assert!(lp.contains(BlockId(2)));
    assert!(!lp.contains(BlockId(3)));
    assert_eq!(lp.exiting_blocks(&f), vec![BlockId(1)]);
}

#[test]
fn test_symbolic_trip_count_from_zero() {
    let (f, n) = counted(Operand::Int(0), Predicate::Slt, None, 1);
    let nest = LoopNest::analyze(&f);
    let trip = &nest.get(LoopId(0)).trip;
    assert_eq!(trip.constant, None);
    assert_eq!(trip.expr, BoundExpr::Value(Operand::Value(n)));
    assert_eq!(trip.expr.display(&f).to_string(), "%n");
}

#[test]
fn test_inclusive_bound_adds_one() {
    let (f, n) = counted(Operand::Int(2), Predicate::Sle, None, 1);
    let nest = LoopNest::analyze(&f);
    assert_eq!(
        nest.get(LoopId(0)).trip.expr,
        BoundExpr::Add(vec![BoundExpr::Const(-1), BoundExpr::Value(Operand::Value(n))])
    );
}

#[test]
fn test_strided_trip_count_divides() {
    let (f, n) = counted(Operand::Int(0), Predicate::Slt, None, 4);
    let nest = LoopNest::analyze(&f);
    assert_eq!(
        nest.get(LoopId(0)).trip.expr,
        BoundExpr::UDiv(
            Box::new(BoundExpr::Value(Operand::Value(n))),
            Box::new(BoundExpr::Const(4))
        )
    );
}

#[test]
fn test_constant_trip_count() {
    let (f, _) = counted(Operand::Int(0), Predicate::Slt, Some(Operand::Int(10)), 3);
    let nest = LoopNest::analyze(&f);
    let trip = &nest.get(LoopId(0)).trip;
    assert_eq!(trip.constant, Some(4));
    assert_eq!(trip.max, Some(4));
}

#[test]
fn test_unrecognised_loop_keeps_max_hint() {
    // The exit test compares against a value computed inside the loop.
    let mut b = FunctionBuilder::kernel("k");
    let p = b.param("p", Type::Ptr(AddrSpace::Global));
    let entry = b.block("entry");
    let header = b.block("header");
    let exit = b.block("exit");
    b.br(header);
    b.switch_to(header);
    b.set_max_trip(header, 64);
    let x = b.load("x", Type::Int(32), AddrSpace::Global, Operand::Value(p));
    let c = b.icmp("c", Predicate::Ne, Operand::Value(x), Operand::Int(0));
    b.cond_br(Operand::Value(c), header, exit);
    b.switch_to(exit);
    b.ret();
    let _ = entry;
    let f = b.finish();

    let nest = LoopNest::analyze(&f);
    let trip = &nest.get(LoopId(0)).trip;
    assert_eq!(trip.expr, BoundExpr::CouldNotCompute);
    assert_eq!(trip.max, Some(64));
}

#[test]
fn test_nested_loops_preorder_and_depth() {
    // outer: for i < n { inner: for j < i {} }
    let mut b = FunctionBuilder::kernel("k");
    let n = b.param("n", Type::Int(32));
    let entry = b.block("entry");
    let oh = b.block("outer");
    let ih = b.block("inner");
    let ib = b.block("inner.body");
    let ol = b.block("outer.latch");
    let exit = b.block("exit");
    b.br(oh);

    b.switch_to(oh);
    let i = b.phi("i", Type::Int(32), vec![(Operand::Int(0), entry)]);
    let ci = b.icmp("ci", Predicate::Slt, Operand::Value(i), Operand::Value(n));
    b.cond_br(Operand::Value(ci), ih, exit);

    b.switch_to(ih);
    let j = b.phi("j", Type::Int(32), vec![(Operand::Int(0), oh)]);
    let cj = b.icmp("cj", Predicate::Slt, Operand::Value(j), Operand::Value(i));
    b.cond_br(Operand::Value(cj), ib, ol);

    b.switch_to(ib);
    let jn = b.binary("j.next", Opcode::Add, Type::Int(32), Operand::Value(j), Operand::Int(1));
    b.br(ih);
    b.add_incoming(j, Operand::Value(jn), ib);

    b.switch_to(ol);
    let inext = b.binary("i.next", Opcode::Add, Type::Int(32), Operand::Value(i), Operand::Int(1));
    b.br(oh);
    b.add_incoming(i, Operand::Value(inext), ol);

    b.switch_to(exit);
    b.ret();
    let f = b.finish();

    let nest = LoopNest::analyze(&f);
    assert_eq!(nest.len(), 2);
    let outer = nest.get(LoopId(0));
    let inner = nest.get(LoopId(1));
    assert_eq!(outer.header, oh);
    assert_eq!(outer.depth, 1);
    assert_eq!(outer.children, vec![LoopId(1)]);
    assert_eq!(inner.header, ih);
    assert_eq!(inner.depth, 2);
    assert_eq!(inner.parent, Some(LoopId(0)));
    assert_eq!(nest.innermost_containing(ib).map(|l| l.id), Some(LoopId(1)));
    assert_eq!(nest.top_level().count(), 1);

    // The inner bound is the outer induction variable.
    assert_eq!(
        inner.trip.expr,
        BoundExpr::Recurrence {
            start: Box::new(BoundExpr::Const(0)),
            step: Box::new(BoundExpr::Const(1)),
        }
    );
    assert_eq!(inner.trip.expr.display(&f).to_string(), "{0,+,1}");
}

#[test]
fn test_min_max_select_bound() {
    let mut b = FunctionBuilder::kernel("k");
    let n = b.param("n", Type::Int(32));
    let m = b.param("m", Type::Int(32));
    let entry = b.block("entry");
    let header = b.block("header");
    let body = b.block("body");
    let exit = b.block("exit");
    let lt = b.icmp("lt", Predicate::Slt, Operand::Value(n), Operand::Value(m));
    let lo = b.select("lo", Type::Int(32), Operand::Value(lt), Operand::Value(n), Operand::Value(m));
    let wide = b.cast("wide", Opcode::ZExt, Operand::Value(lo), Type::Int(64));
    b.br(header);

    b.switch_to(header);
    let i = b.phi("i", Type::Int(64), vec![(Operand::Int(0), entry)]);
    let c = b.icmp("c", Predicate::Ult, Operand::Value(i), Operand::Value(wide));
    b.cond_br(Operand::Value(c), body, exit);
    b.switch_to(body);
    let next = b.binary("i.next", Opcode::Add, Type::Int(64), Operand::Value(i), Operand::Int(1));
    b.br(header);
    b.add_incoming(i, Operand::Value(next), body);
    b.switch_to(exit);
    b.ret();
    let f = b.finish();

    let nest = LoopNest::analyze(&f);
    assert_eq!(
        nest.get(LoopId(0)).trip.expr,
        BoundExpr::ZeroExtend(Box::new(BoundExpr::MinMax(
            MinMaxKind::SMin,
            vec![BoundExpr::Value(Operand::Value(n)), BoundExpr::Value(Operand::Value(m))]
        )))
    );
}

#[test]
fn test_no_loops_in_straight_line_code() {
    let mut b = FunctionBuilder::kernel("k");
    b.block("entry");
    b.ret();
    let f = b.finish();
    assert!(LoopNest::analyze(&f).is_empty());
}

/// `i` counts up by one from `init` and the exit test compares `i` or
/// `i.next` against `bound`. With `tested_in_header` the test runs before
/// the body; otherwise the loop is a do-while whose latch holds the test.
fn shaped(init: i64, bound: Operand, compare_next: bool, tested_in_header: bool) -> Function {
    let mut b = FunctionBuilder::kernel("k");
    let n = b.param("n", Type::Int(64));
    let entry = b.block("entry");
    let header = b.block("header");
    let latch = b.block("latch");
    let exit = b.block("exit");
    let bound = match bound {
        Operand::Value(_) => Operand::Value(n),
        other => other,
    };
    b.br(header);

    b.switch_to(header);
    let i = b.phi("i", Type::Int(64), vec![(Operand::Int(init), entry)]);
    let next = b.binary("i.next", Opcode::Add, Type::Int(64), Operand::Value(i), Operand::Int(1));
    let tested = if compare_next { next } else { i };
    if tested_in_header {
        let c = b.icmp("c", Predicate::Slt, Operand::Value(tested), bound);
        b.cond_br(Operand::Value(c), latch, exit);
        b.switch_to(latch);
        b.br(header);
    } else {
        b.br(latch);
        b.switch_to(latch);
        let c = b.icmp("c", Predicate::Slt, Operand::Value(tested), bound);
        b.cond_br(Operand::Value(c), header, exit);
    }
    b.add_incoming(i, Operand::Value(next), latch);

    b.switch_to(exit);
    b.ret();
    b.finish()
}

fn trip_of(f: &Function) -> TripCount {
    LoopNest::analyze(f).get(LoopId(0)).trip.clone()
}

#[test]
fn test_trip_count_depends_on_exit_shape() {
    // (compare i.next, test in header, body executions for `i < 8` from 0)
    let cases = [
        (false, true, 8),
        (true, true, 7),
        (false, false, 9),
        (true, false, 8),
    ];
    for (compare_next, tested_in_header, expected) in cases {
        let f = shaped(0, Operand::Int(8), compare_next, tested_in_header);
        let trip = trip_of(&f);
        assert_eq!(
            trip.constant,
            Some(expected),
            "compare_next={} tested_in_header={}",
            compare_next,
            tested_in_header
        );
        assert_eq!(trip.expr, BoundExpr::Const(expected as i64));
    }
}

#[test]
fn test_do_while_runs_at_least_once() {
    let f = shaped(10, Operand::Int(8), true, false);
    assert_eq!(trip_of(&f).constant, Some(1));
    let f = shaped(10, Operand::Int(8), false, true);
    assert_eq!(trip_of(&f).constant, None);
    assert_eq!(trip_of(&f).expr, BoundExpr::Const(0));
}

#[test]
fn test_symbolic_trip_count_by_exit_shape() {
    let n = Operand::Value(ValueId(0));
    let f = shaped(0, n, false, true);
    assert_eq!(trip_of(&f).expr, BoundExpr::Value(n));

    let f = shaped(0, n, true, false);
    assert_eq!(trip_of(&f).expr, BoundExpr::Value(n));

    let f = shaped(0, n, false, false);
    assert_eq!(trip_of(&f).expr, BoundExpr::Add(vec![BoundExpr::Const(1), BoundExpr::Value(n)]));
    assert_eq!(trip_of(&f).expr.display(&f).to_string(), "(1 + %n)");

    let f = shaped(0, n, true, true);
    assert_eq!(trip_of(&f).expr, BoundExpr::Add(vec![BoundExpr::Const(-1), BoundExpr::Value(n)]));
}

#[test]
fn test_constant_trip_count_too_large_is_unknown() {
    let f = shaped(-i64::MAX, Operand::Int(i64::MAX), false, true);
    let trip = trip_of(&f);
    assert_eq!(trip.constant, None);
    assert_eq!(trip.expr, BoundExpr::CouldNotCompute);

    // The widest span that still fits.
    let f = shaped(0, Operand::Int(i64::MAX), false, true);
    assert_eq!(trip_of(&f).constant, Some(i64::MAX as u64));
}
