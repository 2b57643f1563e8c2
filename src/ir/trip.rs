//! Loop trip-count analysis.
//!
//! Recognises the canonical counted loop: a header phi
//! `%i = phi [init, preheader], [%i.next, latch]` with
//! `%i.next = add %i, step`, a single exiting block whose conditional branch
//! tests `%i` (or `%i.next`) against a loop-invariant bound. The result is
//! the number of times the loop body runs, as a constant when both ends are
//! literals and as a `BoundExpr` otherwise.

use tracing::{debug, trace};

use super::expr::{BoundExpr, MinMaxKind};
use super::loops::{LoopId, LoopNest};
use super::{Function, Opcode, Operand, Predicate, ValueId};

#[derive(Clone, Debug, PartialEq)]
pub struct TripCount {
    /// Statically known number of body executions.
    pub constant: Option<u64>,
    /// Symbolic count; `CouldNotCompute` when the loop is not recognised.
    pub expr: BoundExpr,
    /// Upper bound on the count, when one is known.
    pub max: Option<u64>,
}

impl TripCount {
    pub fn unknown() -> Self {
        Self {
            constant: None,
            expr: BoundExpr::CouldNotCompute,
            max: None,
        }
    }
}

/// An induction variable: `phi` starts at `init` and advances by `step`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Induction {
    pub phi: ValueId,
    pub init: Operand,
    pub step: i64,
    /// The operand examined was the incremented value rather than the phi.
    pub advanced: bool,
}

pub fn analyze(func: &Function, nest: &LoopNest, id: LoopId) -> TripCount {
    let lp = nest.get(id);
    let hint = func.block(lp.header).max_trip;
    let mut trip = match counted_loop(func, nest, id) {
        Some(trip) => trip,
        None => TripCount::unknown(),
    };
    trip.max = match (trip.constant, hint) {
        (Some(c), Some(h)) => Some(c.min(h)),
        (Some(c), None) => Some(c),
        (None, h) => h,
    };
    trace!(
        header = %func.block(lp.header).name,
        expr = %trip.expr.display(func),
        constant = ?trip.constant,
        max = ?trip.max,
        "trip count"
    );
    trip
}

fn counted_loop(func: &Function, nest: &LoopNest, id: LoopId) -> Option<TripCount> {
    let lp = nest.get(id);
    let exiting = lp.exiting_blocks(func);
    let [exit_block] = exiting.as_slice() else {
        return None;
    };
    let term = func.block(*exit_block).terminator()?;
    if term.opcode != Opcode::Br || term.targets.len() != 2 {
        return None;
    }
    let cond = term.operand(0)?.as_value()?;
    let cmp = func.defining_inst(cond)?;
    if cmp.opcode != Opcode::ICmp {
        return None;
    }
    let mut pred = cmp.predicate?;
    // Normalise to the condition under which the loop keeps running.
    if !lp.contains(term.targets[0]) {
        pred = pred.inverse();
    }

    let (lhs, rhs) = (cmp.operand(0)?, cmp.operand(1)?);
    let (iv, bound) = match (induction_of(func, nest, id, lhs), induction_of(func, nest, id, rhs)) {
        (Some(iv), None) => (iv, rhs),
        (None, Some(iv)) => {
            pred = pred.swapped();
            (iv, lhs)
        }
        _ => return None,
    };
    if !is_invariant(func, nest, id, bound) {
        return None;
    }

    let inclusive = match (iv.step > 0, pred) {
        (true, Predicate::Slt | Predicate::Ult | Predicate::Ne) => false,
        (true, Predicate::Sle | Predicate::Ule) => true,
        (false, Predicate::Sgt | Predicate::Ugt | Predicate::Ne) => false,
        (false, Predicate::Sge | Predicate::Uge) => true,
        _ => return None,
    };
    // A test in a header that is not also a latch runs before the body, so
    // the body runs once per passing test. A test after the body runs it
    // once more than that.
    let tested_after_body = *exit_block != lp.header || lp.latches.contains(exit_block);
    let adjust = i64::from(tested_after_body) - i64::from(iv.advanced);

    if let (Some(init), Some(end)) = (iv.init.as_int(), bound.as_int()) {
        return match constant_trips(init, end, iv.step, inclusive, iv.advanced, tested_after_body) {
            Some(count) => Some(TripCount {
                constant: u64::try_from(count).ok().filter(|&c| c > 0),
                expr: BoundExpr::Const(count),
                max: None,
            }),
            None => {
                debug!(header = %func.block(lp.header).name, "constant trip count overflows i64");
                None
            }
        };
    }

    let init = bound_of(func, nest, id, iv.init);
    let end = bound_of(func, nest, id, bound);
    let span = if iv.step > 0 {
        BoundExpr::sum(end, BoundExpr::negate(init))
    } else {
        BoundExpr::sum(init, BoundExpr::negate(end))
    };
    let span = if inclusive {
        BoundExpr::sum(BoundExpr::Const(1), span)
    } else {
        span
    };
    let step = i64::try_from(iv.step.unsigned_abs()).ok()?;
    let expr = if step == 1 {
        span
    } else {
        BoundExpr::UDiv(Box::new(span), Box::new(BoundExpr::Const(step)))
    };
    let expr = if adjust == 0 {
        expr
    } else {
        BoundExpr::sum(BoundExpr::Const(adjust), expr)
    };
    Some(TripCount {
        constant: None,
        expr,
        max: None,
    })
}

/// Body executions of a loop with literal bounds, or `None` when the count
/// does not fit an `i64`.
fn constant_trips(
    init: i64,
    end: i64,
    step: i64,
    inclusive: bool,
    advanced: bool,
    tested_after_body: bool,
) -> Option<i64> {
    let (init, end, step) = (i128::from(init), i128::from(end), i128::from(step));
    // First value the exit test sees.
    let first = if advanced { init + step } else { init };
    let span = if step > 0 { end - first } else { first - end };
    let span = if inclusive { span + 1 } else { span };
    let step = step.abs();
    let passing = if span <= 0 { 0 } else { (span + step - 1) / step };
    let count = if tested_after_body { passing + 1 } else { passing };
    i64::try_from(count).ok()
}

/// If `op` is the induction phi of loop `id`, or its incremented value,
/// describe the induction.
pub fn induction_of(func: &Function, nest: &LoopNest, id: LoopId, op: Operand) -> Option<Induction> {
    let v = op.as_value()?;
    let inst = func.defining_inst(v)?;
    let (phi, advanced) = match inst.opcode {
        Opcode::Phi => (v, false),
        Opcode::Add | Opcode::Sub => {
            let (a, b) = (inst.operand(0)?, inst.operand(1)?);
            let p = match (a.as_value(), b.as_value()) {
                (Some(p), _) if b.as_int().is_some() => p,
                (_, Some(p)) if a.as_int().is_some() && inst.opcode == Opcode::Add => p,
                _ => return None,
            };
            (p, true)
        }
        _ => return None,
    };
    let iv = header_phi_induction(func, nest, id, phi)?;
    // Only the increment that feeds the phi is the advanced induction value.
    if advanced && step_from(func, phi, op) != Some(iv.step) {
        return None;
    }
    Some(Induction { advanced, ..iv })
}

fn header_phi_induction(func: &Function, nest: &LoopNest, id: LoopId, phi: ValueId) -> Option<Induction> {
    let lp = nest.get(id);
    if func.defining_block(phi)? != lp.header {
        return None;
    }
    let inst = func.defining_inst(phi)?;
    if inst.opcode != Opcode::Phi {
        return None;
    }

    let mut init = None;
    let mut step = None;
    for &(value, from) in &inst.incoming {
        if lp.contains(from) {
            let s = step_from(func, phi, value)?;
            if step.is_some_and(|prev| prev != s) {
                return None;
            }
            step = Some(s);
        } else {
            if init.is_some_and(|prev| prev != value) {
                return None;
            }
            init = Some(value);
        }
    }
    match (init, step) {
        (Some(init), Some(step)) if step != 0 => Some(Induction {
            phi,
            init,
            step,
            advanced: false,
        }),
        _ => None,
    }
}

/// The constant step of `next = add phi, c` (or `sub phi, c`).
fn step_from(func: &Function, phi: ValueId, next: Operand) -> Option<i64> {
    let inst = func.defining_inst(next.as_value()?)?;
    let (a, b) = (inst.operand(0)?, inst.operand(1)?);
    match inst.opcode {
        Opcode::Add if a == Operand::Value(phi) => b.as_int(),
        Opcode::Add if b == Operand::Value(phi) => a.as_int(),
        Opcode::Sub if a == Operand::Value(phi) => b.as_int().and_then(i64::checked_neg),
        _ => None,
    }
}

fn is_invariant(func: &Function, nest: &LoopNest, id: LoopId, op: Operand) -> bool {
    match op {
        Operand::Value(v) => match func.defining_block(v) {
            Some(block) => !nest.get(id).contains(block),
            None => true,
        },
        _ => true,
    }
}

/// Symbolic form of a loop-invariant operand, looking through casts,
/// min/max selects and the induction variables of enclosing loops.
fn bound_of(func: &Function, nest: &LoopNest, id: LoopId, op: Operand) -> BoundExpr {
    let v = match op {
        Operand::Int(n) => return BoundExpr::Const(n),
        Operand::Float(_) => return BoundExpr::CouldNotCompute,
        Operand::Value(v) => v,
    };
    let Some(inst) = func.defining_inst(v) else {
        return BoundExpr::Value(op);
    };
    let inner = |i: usize| match inst.operand(i) {
        Some(o) => bound_of(func, nest, id, o),
        None => BoundExpr::CouldNotCompute,
    };
    match inst.opcode {
        Opcode::ZExt => BoundExpr::ZeroExtend(Box::new(inner(0))),
        Opcode::SExt => BoundExpr::SignExtend(Box::new(inner(0))),
        Opcode::Trunc => BoundExpr::Truncate(Box::new(inner(0))),
        Opcode::Select => match min_max_kind(func, inst.operand(0), inst.operand(1), inst.operand(2)) {
            Some(kind) => BoundExpr::MinMax(kind, vec![inner(1), inner(2)]),
            None => BoundExpr::Value(op),
        },
        Opcode::Phi => match enclosing_induction(func, nest, id, v) {
            Some(iv) => BoundExpr::Recurrence {
                start: Box::new(bound_of(func, nest, id, iv.init)),
                step: Box::new(BoundExpr::Const(iv.step)),
            },
            None => BoundExpr::Value(op),
        },
        _ => BoundExpr::Value(op),
    }
}

fn enclosing_induction(func: &Function, nest: &LoopNest, id: LoopId, phi: ValueId) -> Option<Induction> {
    nest.ancestors(id)
        .skip(1)
        .find_map(|outer| header_phi_induction(func, nest, outer.id, phi))
}

/// `select (icmp p a b), a, b` is a min or max of `a` and `b`.
fn min_max_kind(
    func: &Function,
    cond: Option<Operand>,
    a: Option<Operand>,
    b: Option<Operand>,
) -> Option<MinMaxKind> {
    let cmp = func.defining_inst(cond?.as_value()?)?;
    if cmp.opcode != Opcode::ICmp {
        return None;
    }
    let (a, b) = (a?, b?);
    let (x, y) = (cmp.operand(0)?, cmp.operand(1)?);
    let pred = if (x, y) == (a, b) {
        cmp.predicate?
    } else if (x, y) == (b, a) {
        cmp.predicate?.swapped()
    } else {
        return None;
    };
    match pred {
        Predicate::Ugt | Predicate::Uge => Some(MinMaxKind::UMax),
        Predicate::Sgt | Predicate::Sge => Some(MinMaxKind::SMax),
        Predicate::Ult | Predicate::Ule => Some(MinMaxKind::UMin),
        Predicate::Slt | Predicate::Sle => Some(MinMaxKind::SMin),
        _ => None,
    }
}
