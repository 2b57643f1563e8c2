//! Name resolution: parsed functions to `ir::Function`s.
//!
//! Value ids are assigned up front, parameters first and then every named
//! result in textual order, which is the order `FunctionBuilder` numbers
//! them in. That lets phis refer to values defined further down; every
//! other use is checked against the dominator tree once the function is
//! built.

use std::collections::HashMap;

use super::ast::{BlockDecl, File, FnDecl, InstDecl, OperandRef};
use crate::diagnostic::Diagnostic;
use crate::ir::{
    AddrSpace, BlockId, Function, FunctionBuilder, Inst, Module, Opcode, Operand, Type, ValueDef, ValueId,
};
use crate::span::Spanned;

pub(crate) fn lower_file(file: &File) -> Result<Module, Vec<Diagnostic>> {
    let mut diagnostics = Vec::new();
    let mut seen: HashMap<&str, &Spanned<String>> = HashMap::new();
    let mut functions = Vec::new();

    for decl in &file.functions {
        let name = &decl.node.name;
        if let Some(first) = seen.get(name.node.as_str()) {
            diagnostics.push(
                Diagnostic::error(format!("duplicate function '@{}'", name.node), name.span)
                    .with_note(format!("first defined at byte {}", first.span.start))
                    .with_help("every kernel and helper in a file needs a distinct name".to_string()),
            );
            continue;
        }
        seen.insert(&name.node, name);
        if let Some(func) = FnLowering::new(&decl.node, &mut diagnostics).lower(decl.span) {
            functions.push(func);
        }
    }

    if diagnostics.is_empty() {
        Ok(Module { functions })
    } else {
        Err(diagnostics)
    }
}

struct FnLowering<'a> {
    decl: &'a FnDecl,
    values: HashMap<&'a str, ValueId>,
    types: HashMap<ValueId, Type>,
    labels: HashMap<&'a str, BlockId>,
    diagnostics: &'a mut Vec<Diagnostic>,
    failed: bool,
}

impl<'a> FnLowering<'a> {
    fn new(decl: &'a FnDecl, diagnostics: &'a mut Vec<Diagnostic>) -> Self {
        Self {
            decl,
            values: HashMap::new(),
            types: HashMap::new(),
            labels: HashMap::new(),
            diagnostics,
            failed: false,
        }
    }

    fn error(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
        self.failed = true;
    }

    fn lower(mut self, span: crate::span::Span) -> Option<Function> {
        let decl = self.decl;
        if decl.blocks.is_empty() {
            self.error(
                Diagnostic::error(format!("function '@{}' has no blocks", decl.name.node), decl.name.span)
                    .with_help("add at least an `entry:` block ending in `ret`".to_string()),
            );
            return None;
        }
        self.assign_names();

        let mut b = if decl.is_kernel {
            FunctionBuilder::kernel(&decl.name.node)
        } else {
            FunctionBuilder::helper(&decl.name.node)
        }
        .with_span(span);

        for param in &decl.params {
            let v = b.param(&param.name.node, param.ty.clone());
            self.types.insert(v, param.ty.clone());
        }
        let ids: Vec<BlockId> = decl
            .blocks
            .iter()
            .map(|block| {
                let id = b.block(&block.label.node);
                b.set_block_span(id, block.label.span);
                if let Some(max) = block.max_trip {
                    b.set_max_trip(id, max);
                }
                id
            })
            .collect();

        for (block, &id) in decl.blocks.iter().zip(&ids) {
            b.switch_to(id);
            self.check_terminator(block);
            for inst in &block.insts {
                let Some(lowered) = self.lower_inst(inst) else {
                    continue;
                };
                let ty = lowered.ty.clone();
                let name = inst.node.result.as_ref().map(|r| r.node.clone());
                if let Some(v) = b.push(name, lowered) {
                    self.types.insert(v, ty);
                }
            }
        }

        if self.failed {
            return None;
        }
        let func = b.finish();
        self.check_dominance(&func);
        if self.failed {
            None
        } else {
            Some(func)
        }
    }

    /// A use must follow its definition in the same block or sit in a block
    /// the definition dominates. A phi's incoming value only has to be
    /// available at the end of the edge's predecessor. Unreachable blocks
    /// are not checked.
    fn check_dominance(&mut self, func: &Function) {
        let decl = self.decl;
        let doms = func.dominator_sets();
        let available = |def: ValueDef, block: BlockId, before: Option<usize>| match def {
            ValueDef::Param(_) => true,
            ValueDef::Inst { block: d, index } if d == block => before.map_or(true, |i| index < i),
            ValueDef::Inst { block: d, .. } => match &doms[block.0] {
                Some(dominating) => dominating.contains(&d),
                None => true,
            },
        };

        let mut late = Vec::new();
        for (b, block) in decl.blocks.iter().enumerate() {
            if doms[b].is_none() {
                continue;
            }
            let here = BlockId(b);
            for (i, (written_inst, inst)) in block.insts.iter().zip(&func.blocks[b].insts).enumerate() {
                let direct = inst
                    .operands
                    .iter()
                    .zip(&written_inst.node.operands)
                    .map(|(&op, written)| (op, written, here, Some(i)));
                let incoming = inst
                    .incoming
                    .iter()
                    .zip(&written_inst.node.incoming)
                    .map(|(&(op, from), (written, _))| (op, written, from, None));
                for (op, written, at, before) in direct.chain(incoming) {
                    let Operand::Value(v) = op else { continue };
                    if !available(func.value(v).def, at, before) {
                        late.push(written);
                    }
                }
            }
        }

        for written in late {
            let name = match &written.node {
                OperandRef::Local(name) => name.as_str(),
                _ => continue,
            };
            self.error(
                Diagnostic::error(format!("'%{}' is used before it is defined", name), written.span)
                    .with_help("only phi operands may refer to values defined later in the loop".to_string()),
            );
        }
    }

    /// Number parameters and results, reporting duplicates.
    fn assign_names(&mut self) {
        let decl = self.decl;
        let mut next = 0;
        let params = decl.params.iter().map(|p| &p.name);
        let results = decl
            .blocks
            .iter()
            .flat_map(|b| b.insts.iter())
            .filter_map(|i| i.node.result.as_ref());
        for name in params.chain(results) {
            if self.values.contains_key(name.node.as_str()) {
                self.error(
                    Diagnostic::error(format!("value '%{}' is defined twice", name.node), name.span)
                        .with_help("every SSA value is assigned exactly once".to_string()),
                );
            } else {
                self.values.insert(&name.node, ValueId(next));
            }
            next += 1;
        }

        for (i, block) in decl.blocks.iter().enumerate() {
            if self.labels.contains_key(block.label.node.as_str()) {
                self.error(Diagnostic::error(
                    format!("block label '{}' is defined twice", block.label.node),
                    block.label.span,
                ));
            } else {
                self.labels.insert(&block.label.node, BlockId(i));
            }
        }
    }

    fn check_terminator(&mut self, block: &BlockDecl) {
        let last = block.insts.len().checked_sub(1);
        for (i, inst) in block.insts.iter().enumerate() {
            if inst.node.opcode.is_terminator() && Some(i) != last {
                self.error(Diagnostic::error(
                    format!("instruction after the terminator of block '{}'", block.label.node),
                    block.insts[i + 1].span,
                ));
                return;
            }
        }
        let ends_in_terminator = block
            .insts
            .last()
            .is_some_and(|inst| inst.node.opcode.is_terminator());
        if !ends_in_terminator {
            self.error(
                Diagnostic::error(
                    format!("block '{}' does not end with a terminator", block.label.node),
                    block.label.span,
                )
                .with_help("end every block with `br` or `ret`".to_string()),
            );
        }
    }

    fn operand(&mut self, op: &Spanned<OperandRef>) -> Option<Operand> {
        match &op.node {
            OperandRef::Int(n) => Some(Operand::Int(*n)),
            OperandRef::Float(x) => Some(Operand::Float(*x)),
            OperandRef::Local(name) => match self.values.get(name.as_str()) {
                Some(&v) => Some(Operand::Value(v)),
                None => {
                    self.error(
                        Diagnostic::error(format!("use of undefined value '%{}'", name), op.span)
                            .with_help(
                                "values are defined by a parameter or an instruction of the same function"
                                    .to_string(),
                            ),
                    );
                    None
                }
            },
        }
    }

    fn label(&mut self, label: &Spanned<String>) -> Option<BlockId> {
        match self.labels.get(label.node.as_str()) {
            Some(&id) => Some(id),
            None => {
                self.error(Diagnostic::error(
                    format!("unknown block label '{}'", label.node),
                    label.span,
                ));
                None
            }
        }
    }

    fn type_of(&self, op: Operand) -> Option<&Type> {
        match op {
            Operand::Value(v) => self.types.get(&v),
            _ => None,
        }
    }

    fn lower_inst(&mut self, decl: &Spanned<InstDecl>) -> Option<Inst> {
        let d = &decl.node;
        let mut operands = Vec::with_capacity(d.operands.len());
        for op in &d.operands {
            operands.push(self.operand(op)?);
        }
        let mut targets = Vec::with_capacity(d.targets.len());
        for t in &d.targets {
            targets.push(self.label(t)?);
        }
        let mut incoming = Vec::with_capacity(d.incoming.len());
        for (value, from) in &d.incoming {
            incoming.push((self.operand(value)?, self.label(from)?));
        }

        let pointer_index = match d.opcode {
            Opcode::Store => Some(1),
            Opcode::Load | Opcode::GetElementPtr | Opcode::AtomicRMW | Opcode::CmpXchg => Some(0),
            _ => None,
        };
        let addr_space = pointer_index.map(|i| {
            d.addr_space.unwrap_or_else(|| {
                match operands.get(i).and_then(|&op| self.type_of(op)) {
                    Some(Type::Ptr(space)) => *space,
                    _ => AddrSpace::Generic,
                }
            })
        });

        let ty = match (&d.ty, d.opcode) {
            (_, Opcode::GetElementPtr) => Type::Ptr(addr_space.unwrap_or(AddrSpace::Generic)),
            (Some(ty), _) => ty.clone(),
            (None, Opcode::ICmp | Opcode::FCmp) => Type::Int(1),
            (None, Opcode::Store | Opcode::Br | Opcode::Ret) => Type::Void,
            (None, _) => match operands.first() {
                Some(&Operand::Float(_)) => Type::Float,
                Some(&op) => self.type_of(op).cloned().unwrap_or(Type::Int(32)),
                None => Type::Int(32),
            },
        };

        if let Some(result) = &d.result {
            if ty == Type::Void {
                self.error(Diagnostic::error(
                    format!("'{}' does not produce a value to bind to '%{}'", d.opcode.name(), result.node),
                    result.span,
                ));
                return None;
            }
        }

        let mut inst = Inst::new(d.opcode, ty)
            .with_operands(operands)
            .with_span(decl.span);
        inst.predicate = d.predicate;
        inst.callee = d.callee.clone();
        inst.addr_space = addr_space;
        inst.incoming = incoming;
        inst.targets = targets;
        Some(inst)
    }
}
