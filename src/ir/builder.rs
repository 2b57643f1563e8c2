use super::*;

/// Incremental construction of a `Function`.
///
/// Values are numbered in emission order: parameters first, then
/// instruction results. Blocks are numbered in creation order and the first
/// block created is the entry.
pub struct FunctionBuilder {
    func: Function,
    current: Option<BlockId>,
}

impl FunctionBuilder {
    pub fn kernel(name: impl Into<String>) -> Self {
        Self::new(name, true)
    }

    pub fn helper(name: impl Into<String>) -> Self {
        Self::new(name, false)
    }

    fn new(name: impl Into<String>, is_kernel: bool) -> Self {
        Self {
            func: Function {
                name: name.into(),
                is_kernel,
                params: Vec::new(),
                blocks: Vec::new(),
                values: Vec::new(),
                span: Span::dummy(),
            },
            current: None,
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.func.span = span;
        self
    }

    pub fn param(&mut self, name: impl Into<String>, ty: Type) -> ValueId {
        let name = name.into();
        let value = ValueId(self.func.values.len());
        let position = self.func.params.len();
        self.func.values.push(ValueInfo {
            name: name.clone(),
            def: ValueDef::Param(position),
        });
        self.func.params.push(Param { name, ty, value });
        value
    }

    /// Create a new block. The builder keeps emitting into the current
    /// block until `switch_to` is called; the very first block becomes
    /// current automatically.
    pub fn block(&mut self, name: impl Into<String>) -> BlockId {
        let id = BlockId(self.func.blocks.len());
        self.func.blocks.push(Block::new(name));
        if self.current.is_none() {
            self.current = Some(id);
        }
        id
    }

    pub fn switch_to(&mut self, block: BlockId) {
        self.current = Some(block);
    }

    pub fn set_max_trip(&mut self, block: BlockId, max: u64) {
        self.func.blocks[block.0].max_trip = Some(max);
    }

    pub fn set_block_span(&mut self, block: BlockId, span: Span) {
        self.func.blocks[block.0].span = span;
    }

    fn current_block(&mut self) -> BlockId {
        match self.current {
            Some(b) => b,
            None => self.block("entry"),
        }
    }

    /// Append `inst` to the current block, allocating a result value when
    /// `name` is given.
    pub fn push(&mut self, name: Option<String>, inst: Inst) -> Option<ValueId> {
        match name {
            Some(name) => Some(self.emit(&name, inst)),
            None => {
                let block = self.current_block();
                self.func.blocks[block.0].insts.push(inst);
                None
            }
        }
    }

    fn emit(&mut self, name: &str, mut inst: Inst) -> ValueId {
        let block = self.current_block();
        let index = self.func.blocks[block.0].insts.len();
        let value = ValueId(self.func.values.len());
        self.func.values.push(ValueInfo {
            name: name.to_string(),
            def: ValueDef::Inst { block, index },
        });
        inst.result = Some(value);
        self.func.blocks[block.0].insts.push(inst);
        value
    }

    pub fn binary(
        &mut self,
        name: &str,
        opcode: Opcode,
        ty: Type,
        lhs: Operand,
        rhs: Operand,
    ) -> ValueId {
        self.emit(name, Inst::new(opcode, ty).with_operands(vec![lhs, rhs]))
    }

    pub fn icmp(&mut self, name: &str, pred: Predicate, lhs: Operand, rhs: Operand) -> ValueId {
        let mut inst = Inst::new(Opcode::ICmp, Type::Int(1)).with_operands(vec![lhs, rhs]);
        inst.predicate = Some(pred);
        self.emit(name, inst)
    }

    pub fn fcmp(&mut self, name: &str, pred: Predicate, lhs: Operand, rhs: Operand) -> ValueId {
        let mut inst = Inst::new(Opcode::FCmp, Type::Int(1)).with_operands(vec![lhs, rhs]);
        inst.predicate = Some(pred);
        self.emit(name, inst)
    }

    pub fn cast(&mut self, name: &str, opcode: Opcode, value: Operand, to: Type) -> ValueId {
        self.emit(name, Inst::new(opcode, to).with_operands(vec![value]))
    }

    pub fn call(&mut self, name: &str, ty: Type, callee: &str, args: Vec<Operand>) -> ValueId {
        let mut inst = Inst::new(Opcode::Call, ty).with_operands(args);
        inst.callee = Some(callee.to_string());
        self.emit(name, inst)
    }

    pub fn call_void(&mut self, callee: &str, args: Vec<Operand>) {
        let mut inst = Inst::new(Opcode::Call, Type::Void).with_operands(args);
        inst.callee = Some(callee.to_string());
        self.push(None, inst);
    }

    pub fn load(&mut self, name: &str, ty: Type, space: AddrSpace, ptr: Operand) -> ValueId {
        let mut inst = Inst::new(Opcode::Load, ty).with_operands(vec![ptr]);
        inst.addr_space = Some(space);
        self.emit(name, inst)
    }

    pub fn store(&mut self, space: AddrSpace, value: Operand, ptr: Operand) {
        let mut inst = Inst::new(Opcode::Store, Type::Void).with_operands(vec![value, ptr]);
        inst.addr_space = Some(space);
        self.push(None, inst);
    }

    pub fn gep(&mut self, name: &str, space: AddrSpace, base: Operand, index: Operand) -> ValueId {
        self.emit(
            name,
            Inst::new(Opcode::GetElementPtr, Type::Ptr(space)).with_operands(vec![base, index]),
        )
    }

    pub fn atomic_rmw(
        &mut self,
        name: &str,
        ty: Type,
        space: AddrSpace,
        ptr: Operand,
        value: Operand,
    ) -> ValueId {
        let mut inst = Inst::new(Opcode::AtomicRMW, ty).with_operands(vec![ptr, value]);
        inst.addr_space = Some(space);
        self.emit(name, inst)
    }

    pub fn phi(&mut self, name: &str, ty: Type, incoming: Vec<(Operand, BlockId)>) -> ValueId {
        let mut inst = Inst::new(Opcode::Phi, ty);
        inst.incoming = incoming;
        self.emit(name, inst)
    }

    /// Add an incoming edge to an existing phi, for back edges whose value
    /// is defined after the phi.
    pub fn add_incoming(&mut self, phi: ValueId, value: Operand, from: BlockId) {
        if let ValueDef::Inst { block, index } = self.func.values[phi.0].def {
            self.func.blocks[block.0].insts[index]
                .incoming
                .push((value, from));
        }
    }

    pub fn select(
        &mut self,
        name: &str,
        ty: Type,
        cond: Operand,
        if_true: Operand,
        if_false: Operand,
    ) -> ValueId {
        self.emit(
            name,
            Inst::new(Opcode::Select, ty).with_operands(vec![cond, if_true, if_false]),
        )
    }

    pub fn br(&mut self, target: BlockId) {
        let mut inst = Inst::new(Opcode::Br, Type::Void);
        inst.targets = vec![target];
        self.push(None, inst);
    }

    pub fn cond_br(&mut self, cond: Operand, taken: BlockId, not_taken: BlockId) {
        let mut inst = Inst::new(Opcode::Br, Type::Void).with_operands(vec![cond]);
        inst.targets = vec![taken, not_taken];
        self.push(None, inst);
    }

    pub fn ret(&mut self) {
        self.push(None, Inst::new(Opcode::Ret, Type::Void));
    }

    pub fn finish(self) -> Function {
        self.func
    }
}
