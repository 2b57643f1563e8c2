//! Kernel IR: the program representation the cost analysis consumes.
//!
//! A `Function` owns an arena of basic blocks addressed by `BlockId` and an
//! arena of SSA values addressed by `ValueId`. Blocks refer to each other
//! only through indices, and loops (see `loops`) store index sets, so the
//! graph never forms ownership cycles.
//!
//! The IR mirrors the subset of LLVM that OpenCL kernels lower to after
//! inlining: integer/float arithmetic, compares, casts, memory accesses
//! tagged with an address space, atomics, calls to builtins, phis and
//! branches.

pub mod builder;
pub mod expr;
pub mod loops;
pub mod trip;

#[cfg(test)]
mod tests;

use std::fmt;

use petgraph::algo::dominators;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::span::Span;

pub use builder::FunctionBuilder;

// --- Identifiers ---

/// Index of a basic block inside its function. Block 0 is the entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub usize);

/// Index of an SSA value (parameter or instruction result) inside its function.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub usize);

// --- Types ---

/// OpenCL address spaces, numbered the way the AMDGPU backend numbers them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AddrSpace {
    Generic,
    Global,
    Region,
    Local,
    Constant,
    Private,
}

impl AddrSpace {
    /// Map an AMDGPU address space number to the OpenCL address space.
    /// Unknown numbers fall back to `Generic`.
    pub fn from_index(index: u32) -> Self {
        match index {
            1 => AddrSpace::Global,
            2 => AddrSpace::Region,
            3 => AddrSpace::Local,
            4 => AddrSpace::Constant,
            5 => AddrSpace::Private,
            _ => AddrSpace::Generic,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "generic" => Some(AddrSpace::Generic),
            "global" => Some(AddrSpace::Global),
            "region" => Some(AddrSpace::Region),
            "local" => Some(AddrSpace::Local),
            "constant" => Some(AddrSpace::Constant),
            "private" => Some(AddrSpace::Private),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AddrSpace::Generic => "generic",
            AddrSpace::Global => "global",
            AddrSpace::Region => "region",
            AddrSpace::Local => "local",
            AddrSpace::Constant => "constant",
            AddrSpace::Private => "private",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Type {
    Void,
    Int(u32),
    Half,
    Float,
    Double,
    Ptr(AddrSpace),
    Vector(u32, Box<Type>),
}

impl Type {
    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Ptr(_))
    }

    pub fn is_float(&self) -> bool {
        match self {
            Type::Half | Type::Float | Type::Double => true,
            Type::Vector(_, elem) => elem.is_float(),
            _ => false,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Int(bits) => write!(f, "i{}", bits),
            Type::Half => write!(f, "f16"),
            Type::Float => write!(f, "f32"),
            Type::Double => write!(f, "f64"),
            Type::Ptr(space) => write!(f, "ptr {}", space.name()),
            Type::Vector(n, elem) => write!(f, "<{} x {}>", n, elem),
        }
    }
}

// --- Instructions ---

macro_rules! opcodes {
    ($($variant:ident => $name:literal),* $(,)?) => {
        /// Instruction opcodes, named after their LLVM counterparts.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum Opcode {
            $($variant),*
        }

        impl Opcode {
            pub const ALL: &'static [Opcode] = &[$(Opcode::$variant),*];

            pub fn name(self) -> &'static str {
                match self {
                    $(Opcode::$variant => $name),*
                }
            }

            pub fn from_name(name: &str) -> Option<Opcode> {
                match name {
                    $($name => Some(Opcode::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

opcodes! {
    Add => "add",
    Sub => "sub",
    Mul => "mul",
    UDiv => "udiv",
    SDiv => "sdiv",
    URem => "urem",
    SRem => "srem",
    FAdd => "fadd",
    FSub => "fsub",
    FMul => "fmul",
    FDiv => "fdiv",
    FRem => "frem",
    FNeg => "fneg",
    Shl => "shl",
    LShr => "lshr",
    AShr => "ashr",
    And => "and",
    Or => "or",
    Xor => "xor",
    ICmp => "icmp",
    FCmp => "fcmp",
    Trunc => "trunc",
    ZExt => "zext",
    SExt => "sext",
    FPTrunc => "fptrunc",
    FPExt => "fpext",
    SIToFP => "sitofp",
    UIToFP => "uitofp",
    FPToSI => "fptosi",
    FPToUI => "fptoui",
    BitCast => "bitcast",
    AddrSpaceCast => "addrspacecast",
    Alloca => "alloca",
    Load => "load",
    Store => "store",
    GetElementPtr => "getelementptr",
    AtomicRMW => "atomicrmw",
    CmpXchg => "cmpxchg",
    ExtractElement => "extractelement",
    InsertElement => "insertelement",
    ShuffleVector => "shufflevector",
    ExtractValue => "extractvalue",
    InsertValue => "insertvalue",
    Phi => "phi",
    Select => "select",
    Call => "call",
    Br => "br",
    Ret => "ret",
}

impl Opcode {
    pub fn is_terminator(self) -> bool {
        matches!(self, Opcode::Br | Opcode::Ret)
    }

    /// Two-operand arithmetic and bitwise opcodes.
    pub fn is_binary(self) -> bool {
        matches!(
            self,
            Opcode::Add
                | Opcode::Sub
                | Opcode::Mul
                | Opcode::UDiv
                | Opcode::SDiv
                | Opcode::URem
                | Opcode::SRem
                | Opcode::FAdd
                | Opcode::FSub
                | Opcode::FMul
                | Opcode::FDiv
                | Opcode::FRem
                | Opcode::Shl
                | Opcode::LShr
                | Opcode::AShr
                | Opcode::And
                | Opcode::Or
                | Opcode::Xor
        )
    }

    pub fn is_cast(self) -> bool {
        matches!(
            self,
            Opcode::Trunc
                | Opcode::ZExt
                | Opcode::SExt
                | Opcode::FPTrunc
                | Opcode::FPExt
                | Opcode::SIToFP
                | Opcode::UIToFP
                | Opcode::FPToSI
                | Opcode::FPToUI
                | Opcode::BitCast
                | Opcode::AddrSpaceCast
        )
    }
}

/// Comparison predicates for `icmp` and `fcmp`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Predicate {
    Eq,
    Ne,
    Ugt,
    Uge,
    Ult,
    Ule,
    Sgt,
    Sge,
    Slt,
    Sle,
    /// Any floating-point predicate (`oeq`, `ult`, `uno`, ...). The cost
    /// analysis never needs to distinguish them.
    Float(FloatPredicate),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FloatPredicate {
    False,
    Oeq,
    Ogt,
    Oge,
    Olt,
    Ole,
    One,
    Ord,
    Ueq,
    Ugt,
    Uge,
    Ult,
    Ule,
    Une,
    Uno,
    True,
}

impl Predicate {
    pub fn from_int_name(name: &str) -> Option<Self> {
        Some(match name {
            "eq" => Predicate::Eq,
            "ne" => Predicate::Ne,
            "ugt" => Predicate::Ugt,
            "uge" => Predicate::Uge,
            "ult" => Predicate::Ult,
            "ule" => Predicate::Ule,
            "sgt" => Predicate::Sgt,
            "sge" => Predicate::Sge,
            "slt" => Predicate::Slt,
            "sle" => Predicate::Sle,
            _ => return None,
        })
    }

    pub fn from_float_name(name: &str) -> Option<Self> {
        let p = match name {
            "false" => FloatPredicate::False,
            "oeq" => FloatPredicate::Oeq,
            "ogt" => FloatPredicate::Ogt,
            "oge" => FloatPredicate::Oge,
            "olt" => FloatPredicate::Olt,
            "ole" => FloatPredicate::Ole,
            "one" => FloatPredicate::One,
            "ord" => FloatPredicate::Ord,
            "ueq" => FloatPredicate::Ueq,
            "ugt" => FloatPredicate::Ugt,
            "uge" => FloatPredicate::Uge,
            "ult" => FloatPredicate::Ult,
            "ule" => FloatPredicate::Ule,
            "une" => FloatPredicate::Une,
            "uno" => FloatPredicate::Uno,
            "true" => FloatPredicate::True,
            _ => return None,
        };
        Some(Predicate::Float(p))
    }

    pub fn name(self) -> &'static str {
        match self {
            Predicate::Eq => "eq",
            Predicate::Ne => "ne",
            Predicate::Ugt => "ugt",
            Predicate::Uge => "uge",
            Predicate::Ult => "ult",
            Predicate::Ule => "ule",
            Predicate::Sgt => "sgt",
            Predicate::Sge => "sge",
            Predicate::Slt => "slt",
            Predicate::Sle => "sle",
            Predicate::Float(p) => match p {
                FloatPredicate::False => "false",
                FloatPredicate::Oeq => "oeq",
                FloatPredicate::Ogt => "ogt",
                FloatPredicate::Oge => "oge",
                FloatPredicate::Olt => "olt",
                FloatPredicate::Ole => "ole",
                FloatPredicate::One => "one",
                FloatPredicate::Ord => "ord",
                FloatPredicate::Ueq => "ueq",
                FloatPredicate::Ugt => "ugt",
                FloatPredicate::Uge => "uge",
                FloatPredicate::Ult => "ult",
                FloatPredicate::Ule => "ule",
                FloatPredicate::Une => "une",
                FloatPredicate::Uno => "uno",
                FloatPredicate::True => "true",
            },
        }
    }

    /// The predicate that holds exactly when this one does not.
    pub fn inverse(self) -> Self {
        match self {
            Predicate::Eq => Predicate::Ne,
            Predicate::Ne => Predicate::Eq,
            Predicate::Ugt => Predicate::Ule,
            Predicate::Uge => Predicate::Ult,
            Predicate::Ult => Predicate::Uge,
            Predicate::Ule => Predicate::Ugt,
            Predicate::Sgt => Predicate::Sle,
            Predicate::Sge => Predicate::Slt,
            Predicate::Slt => Predicate::Sge,
            Predicate::Sle => Predicate::Sgt,
            Predicate::Float(p) => Predicate::Float(p),
        }
    }

    /// The predicate obtained by exchanging the two compared operands.
    pub fn swapped(self) -> Self {
        match self {
            Predicate::Ugt => Predicate::Ult,
            Predicate::Uge => Predicate::Ule,
            Predicate::Ult => Predicate::Ugt,
            Predicate::Ule => Predicate::Uge,
            Predicate::Sgt => Predicate::Slt,
            Predicate::Sge => Predicate::Sle,
            Predicate::Slt => Predicate::Sgt,
            Predicate::Sle => Predicate::Sge,
            other => other,
        }
    }
}

/// An instruction operand: an SSA value or an immediate literal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Operand {
    Value(ValueId),
    Int(i64),
    Float(f64),
}

impl Operand {
    pub fn as_value(self) -> Option<ValueId> {
        match self {
            Operand::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_int(self) -> Option<i64> {
        match self {
            Operand::Int(n) => Some(n),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Inst {
    pub opcode: Opcode,
    pub result: Option<ValueId>,
    /// Result type; for stores and branches this is `Void`.
    pub ty: Type,
    pub operands: Vec<Operand>,
    pub predicate: Option<Predicate>,
    pub callee: Option<String>,
    /// Address space of the pointer operand of loads, stores and atomics.
    pub addr_space: Option<AddrSpace>,
    /// Incoming (value, predecessor) pairs of a phi.
    pub incoming: Vec<(Operand, BlockId)>,
    /// Branch targets. A conditional branch has the condition as its only
    /// operand and `[taken, not_taken]` as targets.
    pub targets: Vec<BlockId>,
    pub span: Span,
}

impl Inst {
    pub fn new(opcode: Opcode, ty: Type) -> Self {
        Self {
            opcode,
            result: None,
            ty,
            operands: Vec::new(),
            predicate: None,
            callee: None,
            addr_space: None,
            incoming: Vec::new(),
            targets: Vec::new(),
            span: Span::dummy(),
        }
    }

    pub fn with_operands(mut self, operands: Vec<Operand>) -> Self {
        self.operands = operands;
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Operand `i`, if present.
    pub fn operand(&self, i: usize) -> Option<Operand> {
        self.operands.get(i).copied()
    }
}

// --- Blocks, values, functions ---

#[derive(Clone, Debug)]
pub struct Block {
    pub name: String,
    pub insts: Vec<Inst>,
    /// Upper bound on the loop trip count when this block heads a loop,
    /// supplied by a `!max_trip` annotation.
    pub max_trip: Option<u64>,
    pub span: Span,
}

impl Block {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            insts: Vec::new(),
            max_trip: None,
            span: Span::dummy(),
        }
    }

    pub fn terminator(&self) -> Option<&Inst> {
        self.insts.last().filter(|i| i.opcode.is_terminator())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueDef {
    Param(usize),
    Inst { block: BlockId, index: usize },
}

#[derive(Clone, Debug)]
pub struct ValueInfo {
    pub name: String,
    pub def: ValueDef,
}

#[derive(Clone, Debug)]
pub struct Param {
    pub name: String,
    pub ty: Type,
    pub value: ValueId,
}

#[derive(Clone, Debug)]
pub struct Function {
    pub name: String,
    /// Only kernel entry points are analysed; helper functions are
    /// assumed to be inlined and are skipped.
    pub is_kernel: bool,
    pub params: Vec<Param>,
    pub blocks: Vec<Block>,
    pub values: Vec<ValueInfo>,
    pub span: Span,
}

impl Function {
    pub fn entry(&self) -> BlockId {
        BlockId(0)
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.0]
    }

    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> + '_ {
        (0..self.blocks.len()).map(BlockId)
    }

    /// Successor blocks, read from the block's terminator.
    pub fn successors(&self, id: BlockId) -> &[BlockId] {
        match self.block(id).terminator() {
            Some(term) => &term.targets,
            None => &[],
        }
    }

    pub fn predecessors(&self, id: BlockId) -> Vec<BlockId> {
        self.block_ids()
            .filter(|&b| self.successors(b).contains(&id))
            .collect()
    }

    pub fn value(&self, v: ValueId) -> &ValueInfo {
        &self.values[v.0]
    }

    pub fn value_name(&self, v: ValueId) -> &str {
        &self.values[v.0].name
    }

    /// The instruction defining `v`, or `None` for parameters.
    pub fn defining_inst(&self, v: ValueId) -> Option<&Inst> {
        match self.values[v.0].def {
            ValueDef::Param(_) => None,
            ValueDef::Inst { block, index } => Some(&self.blocks[block.0].insts[index]),
        }
    }

    /// The block `v` is defined in, or `None` for parameters.
    pub fn defining_block(&self, v: ValueId) -> Option<BlockId> {
        match self.values[v.0].def {
            ValueDef::Param(_) => None,
            ValueDef::Inst { block, .. } => Some(block),
        }
    }

    pub fn instruction_count(&self) -> usize {
        self.blocks.iter().map(|b| b.insts.len()).sum()
    }

    /// The CFG as a petgraph graph; node `i` is block `i`.
    pub fn cfg_graph(&self) -> (DiGraph<BlockId, ()>, Vec<NodeIndex>) {
        let mut graph = DiGraph::new();
        let nodes: Vec<NodeIndex> = self.block_ids().map(|b| graph.add_node(b)).collect();
        for b in self.block_ids() {
            for succ in self.successors(b) {
                graph.add_edge(nodes[b.0], nodes[succ.0], ());
            }
        }
        (graph, nodes)
    }

    /// For every block, the blocks that dominate it (itself included), or
    /// `None` when the block is unreachable from the entry.
    pub fn dominator_sets(&self) -> Vec<Option<Vec<BlockId>>> {
        if self.blocks.is_empty() {
            return Vec::new();
        }
        let (graph, nodes) = self.cfg_graph();
        let doms = dominators::simple_fast(&graph, nodes[self.entry().0]);
        nodes
            .iter()
            .map(|&n| doms.dominators(n).map(|it| it.map(|d| graph[d]).collect()))
            .collect()
    }

    pub fn format_operand(&self, op: Operand) -> String {
        match op {
            Operand::Value(v) => format!("%{}", self.value_name(v)),
            Operand::Int(n) => n.to_string(),
            Operand::Float(x) => format!("{:?}", x),
        }
    }

    /// Render the definition of an operand, e.g. `%q = udiv %n, %m`.
    pub fn describe(&self, op: Operand) -> String {
        let Operand::Value(v) = op else {
            return self.format_operand(op);
        };
        match self.defining_inst(v) {
            None => format!("%{} (parameter)", self.value_name(v)),
            Some(inst) => {
                let mut out = format!("%{} = {}", self.value_name(v), inst.opcode.name());
                if let Some(pred) = inst.predicate {
                    out.push(' ');
                    out.push_str(pred.name());
                }
                if let Some(callee) = &inst.callee {
                    out.push_str(&format!(" @{}", callee));
                }
                let ops: Vec<String> = inst
                    .operands
                    .iter()
                    .chain(inst.incoming.iter().map(|(op, _)| op))
                    .map(|&op| self.format_operand(op))
                    .collect();
                if !ops.is_empty() {
                    out.push(' ');
                    out.push_str(&ops.join(", "));
                }
                out
            }
        }
    }
}

/// A translation unit: every function found in one input file.
#[derive(Clone, Debug, Default)]
pub struct Module {
    pub functions: Vec<Function>,
}

impl Module {
    pub fn kernels(&self) -> impl Iterator<Item = &Function> {
        self.functions.iter().filter(|f| f.is_kernel)
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }
}
