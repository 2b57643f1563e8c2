//! Closed expression views over the IR, used by the cost evaluator.
//!
//! `ValueNode` is a single-level view of how an SSA value is computed.
//! `BoundExpr` is the symbolic form of a loop trip count produced by
//! `trip::analyze`. Both are exhaustive sum types: anything the evaluator
//! does not model is represented by an explicit unsupported variant rather
//! than by an open-ended fallback.

use std::fmt;

use super::{Function, Opcode, Operand};

/// Integer operators the value evaluator understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    SDiv,
    UDiv,
    Shl,
    LShr,
    And,
    Xor,
}

impl BinaryOp {
    pub fn from_opcode(opcode: Opcode) -> Option<Self> {
        Some(match opcode {
            Opcode::Add => BinaryOp::Add,
            Opcode::Sub => BinaryOp::Sub,
            Opcode::SDiv => BinaryOp::SDiv,
            Opcode::UDiv => BinaryOp::UDiv,
            Opcode::Shl => BinaryOp::Shl,
            Opcode::LShr => BinaryOp::LShr,
            Opcode::And => BinaryOp::And,
            Opcode::Xor => BinaryOp::Xor,
            _ => return None,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ValueNode {
    Const(i64),
    Binary {
        op: BinaryOp,
        lhs: Operand,
        rhs: Operand,
    },
    /// Parameters, phis, loads, calls, floats and every opcode without a
    /// `BinaryOp`.
    Unsupported(Operand),
}

impl Function {
    /// One-level view of how `op` is computed.
    pub fn value_node(&self, op: Operand) -> ValueNode {
        let v = match op {
            Operand::Int(n) => return ValueNode::Const(n),
            Operand::Float(_) => return ValueNode::Unsupported(op),
            Operand::Value(v) => v,
        };
        let Some(inst) = self.defining_inst(v) else {
            return ValueNode::Unsupported(op);
        };
        match (BinaryOp::from_opcode(inst.opcode), inst.operand(0), inst.operand(1)) {
            (Some(bin), Some(lhs), Some(rhs)) => ValueNode::Binary { op: bin, lhs, rhs },
            _ => ValueNode::Unsupported(op),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MinMaxKind {
    UMax,
    SMax,
    UMin,
    SMin,
}

impl MinMaxKind {
    pub fn is_max(self) -> bool {
        matches!(self, MinMaxKind::UMax | MinMaxKind::SMax)
    }

    pub fn name(self) -> &'static str {
        match self {
            MinMaxKind::UMax => "umax",
            MinMaxKind::SMax => "smax",
            MinMaxKind::UMin => "umin",
            MinMaxKind::SMin => "smin",
        }
    }
}

/// Symbolic loop-bound expression.
#[derive(Clone, Debug, PartialEq)]
pub enum BoundExpr {
    /// An SSA value that is invariant in the loop.
    Value(Operand),
    Const(i64),
    Add(Vec<BoundExpr>),
    Mul(Vec<BoundExpr>),
    UDiv(Box<BoundExpr>, Box<BoundExpr>),
    Truncate(Box<BoundExpr>),
    ZeroExtend(Box<BoundExpr>),
    SignExtend(Box<BoundExpr>),
    MinMax(MinMaxKind, Vec<BoundExpr>),
    /// `{start,+,step}`: a value that itself changes with an enclosing loop.
    Recurrence {
        start: Box<BoundExpr>,
        step: Box<BoundExpr>,
    },
    CouldNotCompute,
}

impl BoundExpr {
    pub fn as_const(&self) -> Option<i64> {
        match self {
            BoundExpr::Const(c) => Some(*c),
            _ => None,
        }
    }

    /// Build `lhs + rhs`, flattening nested sums and folding every constant
    /// term into a single leading constant.
    pub fn sum(lhs: BoundExpr, rhs: BoundExpr) -> BoundExpr {
        let mut constant = 0i64;
        let mut terms = Vec::new();
        for e in [lhs, rhs] {
            let parts = match e {
                BoundExpr::Add(xs) => xs,
                other => vec![other],
            };
            for part in parts {
                match part {
                    BoundExpr::Const(c) => constant = constant.wrapping_add(c),
                    other => terms.push(other),
                }
            }
        }
        if constant != 0 {
            terms.insert(0, BoundExpr::Const(constant));
        }
        match terms.len() {
            0 => BoundExpr::Const(0),
            1 => terms.remove(0),
            _ => BoundExpr::Add(terms),
        }
    }

    /// Build `-e`.
    pub fn negate(e: BoundExpr) -> BoundExpr {
        match e {
            BoundExpr::Const(c) => BoundExpr::Const(c.wrapping_neg()),
            other => BoundExpr::Mul(vec![BoundExpr::Const(-1), other]),
        }
    }

    pub fn display<'a>(&'a self, func: &'a Function) -> BoundDisplay<'a> {
        BoundDisplay { expr: self, func }
    }
}

/// Renders a `BoundExpr` with value names resolved against its function,
/// in the usual scalar-evolution notation.
pub struct BoundDisplay<'a> {
    expr: &'a BoundExpr,
    func: &'a Function,
}

impl fmt::Display for BoundDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_bound(f, self.expr, self.func)
    }
}

fn write_list(
    f: &mut fmt::Formatter<'_>,
    items: &[BoundExpr],
    sep: &str,
    func: &Function,
) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, "{}", sep)?;
        }
        write_bound(f, item, func)?;
    }
    Ok(())
}

fn write_bound(f: &mut fmt::Formatter<'_>, expr: &BoundExpr, func: &Function) -> fmt::Result {
    match expr {
        BoundExpr::Value(op) => write!(f, "{}", func.format_operand(*op)),
        BoundExpr::Const(c) => write!(f, "{}", c),
        BoundExpr::Add(xs) => {
            write!(f, "(")?;
            write_list(f, xs, " + ", func)?;
            write!(f, ")")
        }
        BoundExpr::Mul(xs) => {
            write!(f, "(")?;
            write_list(f, xs, " * ", func)?;
            write!(f, ")")
        }
        BoundExpr::UDiv(a, b) => {
            write!(f, "(")?;
            write_bound(f, a, func)?;
            write!(f, " /u ")?;
            write_bound(f, b, func)?;
            write!(f, ")")
        }
        BoundExpr::Truncate(e) => {
            write!(f, "(trunc ")?;
            write_bound(f, e, func)?;
            write!(f, ")")
        }
        BoundExpr::ZeroExtend(e) => {
            write!(f, "(zext ")?;
            write_bound(f, e, func)?;
            write!(f, ")")
        }
        BoundExpr::SignExtend(e) => {
            write!(f, "(sext ")?;
            write_bound(f, e, func)?;
            write!(f, ")")
        }
        BoundExpr::MinMax(kind, xs) => {
            write!(f, "({} ", kind.name())?;
            write_list(f, xs, ", ", func)?;
            write!(f, ")")
        }
        BoundExpr::Recurrence { start, step } => {
            write!(f, "{{")?;
            write_bound(f, start, func)?;
            write!(f, ",+,")?;
            write_bound(f, step, func)?;
            write!(f, "}}")
        }
        BoundExpr::CouldNotCompute => write!(f, "***COULDNOTCOMPUTE***"),
    }
}
