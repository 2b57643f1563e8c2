//! Feature vocabularies: how instructions are bucketed before counting.
//!
//! Each vocabulary is a fixed, ordered list of feature names plus a
//! classification table. An instruction lands in at most one feature; a
//! classification outside the active vocabulary is dropped.

use std::fmt;

use serde::Serialize;

use super::vars::GeometryQuery;
use crate::ir::{AddrSpace, Inst, Opcode};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Vocabulary {
    /// Grewe et al.: computation, comparisons, global and local memory,
    /// coalescing, atomics.
    Grewe,
    /// Fan et al.: arithmetic operator classes, memory operations, calls.
    Fan,
    /// One feature per arithmetic opcode.
    Full,
}

const GREWE: &[&str] = &["comp", "rational", "mem", "localmem", "coalesced", "atomic"];

const FAN: &[&str] = &[
    "int_addsub",
    "int_mul",
    "int_div",
    "int_rem",
    "addsub",
    "mul",
    "div",
    "rem",
    "call",
    "bitwise",
    "aggregate",
    "vector",
    "load",
    "store",
    "other",
];

const FULL: &[&str] = &[
    "add", "fadd", "sub", "fsub", "mul", "fmul", "udiv", "sdiv", "fdiv", "urem", "srem", "frem",
];

/// LLVM intrinsics that count as computation. Matched on the base name, so
/// `llvm.sqrt.f32` is `llvm.sqrt`.
const MATH_INTRINSICS: &[&str] = &[
    "llvm.fmuladd",
    "llvm.canonicalize",
    "llvm.smul.fix.sat",
    "llvm.umul.fix",
    "llvm.smul.fix",
    "llvm.sqrt",
    "llvm.powi",
    "llvm.sin",
    "llvm.cos",
    "llvm.pow",
    "llvm.exp",
    "llvm.exp2",
    "llvm.log",
    "llvm.log10",
    "llvm.log2",
    "llvm.fma",
    "llvm.fabs",
    "llvm.minnum",
    "llvm.maxnum",
    "llvm.minimum",
    "llvm.maximum",
    "llvm.copysign",
    "llvm.floor",
    "llvm.ceil",
    "llvm.trunc",
    "llvm.rint",
    "llvm.nearbyint",
    "llvm.round",
    "llvm.lround",
    "llvm.llround",
    "llvm.lrint",
    "llvm.llrint",
];

/// OpenCL math builtins, matched as substrings of (possibly mangled) names.
const MATH_BUILTINS: &[&str] = &[
    "sqrt", "exp", "log", "abs", "fabs", "max", "min", "pow", "floor", "ceil", "sin", "cos",
    "tan", "fma", "mad",
];

const BARRIER_BUILTINS: &[&str] = &["barrier", "mem_fence", "sub_group_reduce"];

const ATOMIC_BUILTINS: &[&str] = &["atomic_", "atom_"];

/// What a call instruction calls, as far as cost counting is concerned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallKind {
    Geometry(GeometryQuery),
    Barrier,
    Atomic,
    MathIntrinsic,
    /// Any other `llvm.*` intrinsic.
    OtherIntrinsic,
    MathBuiltin,
    Unknown,
}

impl CallKind {
    pub fn of(callee: &str) -> Self {
        if let Some(q) = GeometryQuery::recognize(callee) {
            return CallKind::Geometry(q);
        }
        if callee.starts_with("llvm.") {
            let is_math = MATH_INTRINSICS.iter().any(|name| {
                callee == *name
                    || callee
                        .strip_prefix(name)
                        .is_some_and(|rest| rest.starts_with('.'))
            });
            return if is_math {
                CallKind::MathIntrinsic
            } else {
                CallKind::OtherIntrinsic
            };
        }
        if BARRIER_BUILTINS.iter().any(|b| callee.contains(b)) {
            return CallKind::Barrier;
        }
        if ATOMIC_BUILTINS.iter().any(|a| callee.contains(a)) {
            return CallKind::Atomic;
        }
        if MATH_BUILTINS.iter().any(|m| callee.contains(m)) {
            return CallKind::MathBuiltin;
        }
        CallKind::Unknown
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Classification {
    Feature(&'static str),
    Ignored,
    /// A call the analysis cannot account for; reported and not counted.
    UnrecognizedCall(String),
}

impl Vocabulary {
    pub const ALL: [Vocabulary; 3] = [Vocabulary::Grewe, Vocabulary::Fan, Vocabulary::Full];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "grewe" => Some(Vocabulary::Grewe),
            "fan" => Some(Vocabulary::Fan),
            "full" => Some(Vocabulary::Full),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Vocabulary::Grewe => "grewe",
            Vocabulary::Fan => "fan",
            Vocabulary::Full => "full",
        }
    }

    /// Feature names in report order.
    pub fn feature_names(self) -> &'static [&'static str] {
        match self {
            Vocabulary::Grewe => GREWE,
            Vocabulary::Fan => FAN,
            Vocabulary::Full => FULL,
        }
    }

    pub fn classify(self, inst: &Inst) -> Classification {
        if inst.opcode == Opcode::Call {
            let callee = inst.callee.as_deref().unwrap_or("");
            let kind = CallKind::of(callee);
            if kind == CallKind::Unknown {
                return Classification::UnrecognizedCall(callee.to_string());
            }
            return self.keep(self.classify_call(kind));
        }
        let feature = match self {
            Vocabulary::Grewe => grewe(inst),
            Vocabulary::Fan => Some(fan(inst)),
            Vocabulary::Full => Some(inst.opcode.name()),
        };
        self.keep(feature)
    }

    fn classify_call(self, kind: CallKind) -> Option<&'static str> {
        match (self, kind) {
            (_, CallKind::Geometry(_) | CallKind::Barrier | CallKind::Unknown) => None,
            (Vocabulary::Grewe, CallKind::MathIntrinsic | CallKind::MathBuiltin) => Some("comp"),
            (Vocabulary::Grewe, CallKind::Atomic) => Some("atomic"),
            (Vocabulary::Grewe, CallKind::OtherIntrinsic) => None,
            (Vocabulary::Fan, CallKind::MathIntrinsic | CallKind::MathBuiltin) => Some("call"),
            (Vocabulary::Fan, CallKind::Atomic | CallKind::OtherIntrinsic) => Some("other"),
            (Vocabulary::Full, _) => Some("call"),
        }
    }

    fn keep(self, feature: Option<&'static str>) -> Classification {
        match feature {
            Some(name) if self.feature_names().contains(&name) => Classification::Feature(name),
            _ => Classification::Ignored,
        }
    }
}

impl fmt::Display for Vocabulary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

fn grewe(inst: &Inst) -> Option<&'static str> {
    use Opcode::*;
    match inst.opcode {
        Load | Store => match inst.addr_space {
            Some(AddrSpace::Global | AddrSpace::Constant) => Some("mem"),
            Some(AddrSpace::Local) => Some("localmem"),
            _ => None,
        },
        GetElementPtr | Add | FAdd | Sub | FSub | FNeg | Mul | FMul | UDiv | SDiv | FDiv | URem
        | SRem | FRem | Shl | LShr | AShr | And | Or | Xor => Some("comp"),
        ICmp | FCmp => Some("rational"),
        CmpXchg | AtomicRMW => Some("atomic"),
        _ => None,
    }
}

fn fan(inst: &Inst) -> &'static str {
    use Opcode::*;
    match inst.opcode {
        Add | Sub => "int_addsub",
        Mul => "int_mul",
        UDiv | SDiv => "int_div",
        URem | SRem => "int_rem",
        FAdd | FSub => "addsub",
        FMul => "mul",
        FDiv => "div",
        FRem => "rem",
        Shl | LShr | AShr | And | Or | Xor => "bitwise",
        ExtractValue | InsertValue => "aggregate",
        ExtractElement | InsertElement | ShuffleVector => "vector",
        Load => "load",
        Store => "store",
        _ => "other",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Operand, Type};

    fn inst(opcode: Opcode) -> Inst {
        Inst::new(opcode, Type::Int(32))
    }

    fn mem(opcode: Opcode, space: AddrSpace) -> Inst {
        let mut i = Inst::new(opcode, Type::Float);
        i.addr_space = Some(space);
        i
    }

    fn call(callee: &str) -> Inst {
        let mut i = Inst::new(Opcode::Call, Type::Float).with_operands(vec![Operand::Int(0)]);
        i.callee = Some(callee.to_string());
        i
    }

    #[test]
    fn test_grewe_table() {
        let v = Vocabulary::Grewe;
        assert_eq!(v.classify(&inst(Opcode::Add)), Classification::Feature("comp"));
        assert_eq!(v.classify(&inst(Opcode::Xor)), Classification::Feature("comp"));
        assert_eq!(v.classify(&inst(Opcode::GetElementPtr)), Classification::Feature("comp"));
        assert_eq!(v.classify(&inst(Opcode::ICmp)), Classification::Feature("rational"));
        assert_eq!(v.classify(&inst(Opcode::AtomicRMW)), Classification::Feature("atomic"));
        assert_eq!(
            v.classify(&mem(Opcode::Load, AddrSpace::Global)),
            Classification::Feature("mem")
        );
        assert_eq!(
            v.classify(&mem(Opcode::Store, AddrSpace::Constant)),
            Classification::Feature("mem")
        );
        assert_eq!(
            v.classify(&mem(Opcode::Load, AddrSpace::Local)),
            Classification::Feature("localmem")
        );
        assert_eq!(v.classify(&mem(Opcode::Load, AddrSpace::Private)), Classification::Ignored);
        assert_eq!(v.classify(&inst(Opcode::Phi)), Classification::Ignored);
        assert_eq!(v.classify(&inst(Opcode::Br)), Classification::Ignored);
        assert_eq!(v.classify(&inst(Opcode::ZExt)), Classification::Ignored);
    }

    #[test]
    fn test_grewe_calls() {
        let v = Vocabulary::Grewe;
        assert_eq!(v.classify(&call("get_global_id")), Classification::Ignored);
        assert_eq!(v.classify(&call("barrier")), Classification::Ignored);
        assert_eq!(v.classify(&call("llvm.fmuladd.f32")), Classification::Feature("comp"));
        assert_eq!(v.classify(&call("llvm.exp2.f32")), Classification::Feature("comp"));
        assert_eq!(v.classify(&call("llvm.lifetime.start")), Classification::Ignored);
        assert_eq!(v.classify(&call("_Z4sqrtf")), Classification::Feature("comp"));
        assert_eq!(v.classify(&call("atomic_add")), Classification::Feature("atomic"));
        assert_eq!(
            v.classify(&call("my_helper")),
            Classification::UnrecognizedCall("my_helper".to_string())
        );
    }

    #[test]
    fn test_fan_table() {
        let v = Vocabulary::Fan;
        assert_eq!(v.classify(&inst(Opcode::Sub)), Classification::Feature("int_addsub"));
        assert_eq!(v.classify(&inst(Opcode::SRem)), Classification::Feature("int_rem"));
        assert_eq!(v.classify(&inst(Opcode::FMul)), Classification::Feature("mul"));
        assert_eq!(v.classify(&inst(Opcode::FDiv)), Classification::Feature("div"));
        assert_eq!(v.classify(&inst(Opcode::AShr)), Classification::Feature("bitwise"));
        assert_eq!(v.classify(&inst(Opcode::ShuffleVector)), Classification::Feature("vector"));
        assert_eq!(v.classify(&inst(Opcode::InsertValue)), Classification::Feature("aggregate"));
        assert_eq!(
            v.classify(&mem(Opcode::Load, AddrSpace::Private)),
            Classification::Feature("load")
        );
        assert_eq!(v.classify(&inst(Opcode::Phi)), Classification::Feature("other"));
        assert_eq!(v.classify(&call("llvm.sqrt.f64")), Classification::Feature("call"));
        assert_eq!(v.classify(&call("get_local_size")), Classification::Ignored);
    }

    #[test]
    fn test_full_drops_non_arithmetic() {
        let v = Vocabulary::Full;
        assert_eq!(v.classify(&inst(Opcode::FRem)), Classification::Feature("frem"));
        assert_eq!(v.classify(&inst(Opcode::UDiv)), Classification::Feature("udiv"));
        assert_eq!(v.classify(&inst(Opcode::Shl)), Classification::Ignored);
        assert_eq!(v.classify(&call("llvm.sqrt.f64")), Classification::Ignored);
    }

    #[test]
    fn test_names_and_order() {
        for v in Vocabulary::ALL {
            assert_eq!(Vocabulary::from_name(v.name()), Some(v));
        }
        assert_eq!(Vocabulary::Grewe.feature_names()[4], "coalesced");
        assert_eq!(Vocabulary::Fan.feature_names().len(), 15);
        assert_eq!(Vocabulary::Full.feature_names().len(), 12);
    }
}
