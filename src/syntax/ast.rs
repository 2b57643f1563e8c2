//! Parsed kernel IR text, before names are resolved.

use crate::ir::{AddrSpace, Opcode, Predicate, Type};
use crate::span::Spanned;

#[derive(Clone, Debug, Default)]
pub struct File {
    pub functions: Vec<Spanned<FnDecl>>,
}

#[derive(Clone, Debug)]
pub struct FnDecl {
    pub is_kernel: bool,
    pub name: Spanned<String>,
    pub params: Vec<ParamDecl>,
    pub blocks: Vec<BlockDecl>,
}

#[derive(Clone, Debug)]
pub struct ParamDecl {
    pub name: Spanned<String>,
    pub ty: Type,
}

#[derive(Clone, Debug)]
pub struct BlockDecl {
    pub label: Spanned<String>,
    /// `!max_trip N` after the label.
    pub max_trip: Option<u64>,
    pub insts: Vec<Spanned<InstDecl>>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum OperandRef {
    Local(String),
    Int(i64),
    Float(f64),
}

#[derive(Clone, Debug)]
pub struct InstDecl {
    pub result: Option<Spanned<String>>,
    pub opcode: Opcode,
    /// Explicit result or element type; inferred during lowering when absent.
    pub ty: Option<Type>,
    pub predicate: Option<Predicate>,
    pub addr_space: Option<AddrSpace>,
    pub callee: Option<String>,
    pub operands: Vec<Spanned<OperandRef>>,
    pub incoming: Vec<(Spanned<OperandRef>, Spanned<String>)>,
    pub targets: Vec<Spanned<String>>,
}

impl InstDecl {
    pub fn new(opcode: Opcode) -> Self {
        Self {
            result: None,
            opcode,
            ty: None,
            predicate: None,
            addr_space: None,
            callee: None,
            operands: Vec::new(),
            incoming: Vec::new(),
            targets: Vec::new(),
        }
    }
}
