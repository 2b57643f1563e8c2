//! Turning IR values and loop bounds into polynomials.
//!
//! Both evaluators are total: anything they cannot model evaluates to the
//! constant 1 and records an `AnalysisWarning`. That includes results whose
//! coefficients overflow and values that depend on themselves without going
//! through a phi. Value results are cached, so a value shared by several
//! expressions is evaluated and warned about once.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use super::mpoly::{Division, Mpoly};
use super::vars::VariableRegistry;
use super::AnalysisWarning;
use crate::config::AnalysisConfig;
use crate::ir::expr::{BinaryOp, BoundExpr, ValueNode};
use crate::ir::loops::Loop;
use crate::ir::{Function, Operand, ValueId};

pub struct Evaluator<'a> {
    func: &'a Function,
    vars: &'a VariableRegistry,
    config: &'a AnalysisConfig,
    warnings: Vec<AnalysisWarning>,
    memo: HashMap<ValueId, Mpoly>,
    /// Values whose evaluation is under way.
    active: HashSet<ValueId>,
}

impl<'a> Evaluator<'a> {
    pub fn new(func: &'a Function, vars: &'a VariableRegistry, config: &'a AnalysisConfig) -> Self {
        Self {
            func,
            vars,
            config,
            warnings: Vec::new(),
            memo: HashMap::new(),
            active: HashSet::new(),
        }
    }

    pub fn zero(&self) -> Mpoly {
        Mpoly::with_max_degree(self.vars.len(), self.config.max_degree)
    }

    pub fn constant(&self, value: i64) -> Mpoly {
        let mut p = self.zero();
        p.set_constant_i64(value);
        p
    }

    /// Warnings recorded so far, in the order they were raised.
    pub fn take_warnings(&mut self) -> Vec<AnalysisWarning> {
        std::mem::take(&mut self.warnings)
    }

    fn warn(&mut self, warning: AnalysisWarning) {
        warning.emit();
        self.warnings.push(warning);
    }

    fn unsupported(&mut self, expression: String) -> Mpoly {
        self.warn(AnalysisWarning::UnsupportedExpression {
            kernel: self.func.name.clone(),
            expression,
        });
        self.constant(1)
    }

    fn divide(&mut self, dividend: &mut Mpoly, divisor: &Mpoly, expression: impl FnOnce() -> String) {
        match dividend.divide_by(divisor) {
            Division::Exact => {}
            Division::NotExact => debug!("inexact division kept as dividend"),
            Division::ByZero => self.warn(AnalysisWarning::DivisionByZero {
                kernel: self.func.name.clone(),
                expression: expression(),
            }),
        }
    }

    // --- Values ---

    pub fn evaluate_value(&mut self, op: Operand) -> Mpoly {
        let Some(v) = op.as_value() else {
            return self.evaluate_node(op);
        };
        if let Some(index) = self.vars.index_of(v) {
            let mut p = self.zero();
            p.set_var_coeff(index, 1, 1);
            return p;
        }
        if let Some(p) = self.memo.get(&v) {
            return p.clone();
        }
        if !self.active.insert(v) {
            let text = self.func.describe(op);
            return self.unsupported(text);
        }
        let p = self.evaluate_node(op);
        self.active.remove(&v);
        self.memo.insert(v, p.clone());
        p
    }

    fn evaluate_node(&mut self, op: Operand) -> Mpoly {
        let mut p = match self.func.value_node(op) {
            ValueNode::Const(c) => self.constant(c),
            ValueNode::Binary { op: bin, lhs, rhs } => self.evaluate_binary(op, bin, lhs, rhs),
            ValueNode::Unsupported(_) => {
                let text = self.func.describe(op);
                return self.unsupported(text);
            }
        };
        if p.take_overflow() {
            let text = self.func.describe(op);
            return self.unsupported(text);
        }
        p
    }

    fn evaluate_binary(&mut self, whole: Operand, bin: BinaryOp, lhs: Operand, rhs: Operand) -> Mpoly {
        match bin {
            BinaryOp::Add => {
                let mut p = self.evaluate_value(lhs);
                p.add(&self.evaluate_value(rhs));
                p
            }
            BinaryOp::Sub => {
                let mut p = self.evaluate_value(lhs);
                p.sub(&self.evaluate_value(rhs));
                p
            }
            BinaryOp::SDiv | BinaryOp::UDiv => {
                let mut p = self.evaluate_value(lhs);
                let d = self.evaluate_value(rhs);
                let func = self.func;
                self.divide(&mut p, &d, || func.describe(whole));
                p
            }
            BinaryOp::Shl | BinaryOp::LShr => {
                let amount = self.evaluate_value(rhs);
                let Some(shift) = shift_amount(&amount) else {
                    let text = self.func.describe(whole);
                    return self.unsupported(text);
                };
                let mut p = self.evaluate_value(lhs);
                if bin == BinaryOp::Shl {
                    p.multiply_scalar(1i64 << shift);
                } else {
                    p.divide_by_scalar(1i64 << shift);
                }
                p
            }
            BinaryOp::And | BinaryOp::Xor => {
                let a = self.evaluate_value(lhs);
                let b = self.evaluate_value(rhs);
                match (a.constant_value(), b.constant_value()) {
                    (Some(_), Some(_)) => {
                        let (x, y) = (a.constant_numerator(), b.constant_numerator());
                        let bits = if bin == BinaryOp::And { x & y } else { x ^ y };
                        match i64::try_from(bits) {
                            Ok(bits) => self.constant(bits),
                            Err(_) => {
                                let text = self.func.describe(whole);
                                self.unsupported(text)
                            }
                        }
                    }
                    _ => {
                        let text = self.func.describe(whole);
                        self.unsupported(text)
                    }
                }
            }
        }
    }

    // --- Loop bounds ---

    pub fn evaluate_bound(&mut self, lp: &Loop, bound: &BoundExpr) -> Mpoly {
        let mut p = self.bound_node(lp, bound);
        if p.take_overflow() {
            let text = bound.display(self.func).to_string();
            return self.unsupported(text);
        }
        p
    }

    fn bound_node(&mut self, lp: &Loop, bound: &BoundExpr) -> Mpoly {
        match bound {
            BoundExpr::Value(op) => self.evaluate_value(*op),
            BoundExpr::Const(c) => self.constant(*c),
            BoundExpr::Add(terms) => {
                let mut p = self.zero();
                for term in terms {
                    p.add(&self.evaluate_bound(lp, term));
                }
                p
            }
            BoundExpr::Mul(factors) => {
                let mut p = self.constant(1);
                for factor in factors {
                    p.multiply(&self.evaluate_bound(lp, factor));
                }
                p
            }
            BoundExpr::UDiv(lhs, rhs) => {
                let mut p = self.evaluate_bound(lp, lhs);
                let d = self.evaluate_bound(lp, rhs);
                let func = self.func;
                self.divide(&mut p, &d, || bound.display(func).to_string());
                p
            }
            BoundExpr::Truncate(inner) | BoundExpr::ZeroExtend(inner) | BoundExpr::SignExtend(inner) => {
                self.evaluate_bound(lp, inner)
            }
            BoundExpr::MinMax(kind, operands) => {
                if let [only] = operands.as_slice() {
                    return self.evaluate_bound(lp, only);
                }
                if let Some(symbolic) = operands.iter().find(|e| e.as_const().is_none()) {
                    return self.evaluate_bound(lp, symbolic);
                }
                let constants = operands.iter().filter_map(BoundExpr::as_const);
                let picked = if kind.is_max() {
                    constants.max()
                } else {
                    constants.min()
                };
                match picked {
                    Some(c) => self.constant(c),
                    None => {
                        let text = bound.display(self.func).to_string();
                        self.unsupported(text)
                    }
                }
            }
            BoundExpr::Recurrence { .. } => {
                let text = bound.display(self.func).to_string();
                self.unsupported(text)
            }
            BoundExpr::CouldNotCompute => {
                let fallback = match lp.trip.max {
                    Some(max) if max <= self.config.max_plausible_trip_count => max,
                    _ => 1,
                };
                self.warn(AnalysisWarning::UncomputableLoopBound {
                    kernel: self.func.name.clone(),
                    header: self.func.block(lp.header).name.clone(),
                    fallback,
                });
                self.constant(fallback as i64)
            }
        }
    }
}

/// A constant, non-negative integer shift small enough for an `i64` factor.
fn shift_amount(p: &Mpoly) -> Option<u32> {
    let c = p.constant_value()?;
    if !c.is_integer() || !(0..63).contains(&c.numer()) {
        return None;
    }
    Some(c.numer() as u32)
}
