use super::ast::*;
use super::lexeme::Lexeme;
use crate::diagnostic::{Diagnostic, Severity};
use crate::ir::{AddrSpace, Opcode, Predicate, Type};
use crate::span::{Span, Spanned};

/// Recursive-descent parser for kernel IR text.
///
/// Errors never stop the parse: the offending instruction is skipped up to
/// the end of its line and parsing resumes, so one run reports every
/// problem in the file.
pub(crate) struct Parser<'src> {
    tokens: Vec<Spanned<Lexeme>>,
    source: &'src str,
    pos: usize,
    diagnostics: Vec<Diagnostic>,
}

impl<'src> Parser<'src> {
    pub(crate) fn new(tokens: Vec<Spanned<Lexeme>>, source: &'src str) -> Self {
        Self {
            tokens,
            source,
            pos: 0,
            diagnostics: Vec::new(),
        }
    }

    pub(crate) fn parse_file(mut self) -> (File, Vec<Diagnostic>) {
        let mut file = File::default();
        while !self.at(&Lexeme::Eof) {
            if self.at(&Lexeme::Kernel) || self.at(&Lexeme::Func) {
                file.functions.push(self.parse_function());
            } else {
                self.error_with_help(
                    &format!("expected 'kernel' or 'func', found {}", self.peek().description()),
                    "every function starts with `kernel @name(...) {` or `func @name(...) {`",
                );
                self.skip_to_function();
            }
        }
        (file, self.diagnostics)
    }

    // --- Functions and blocks ---

    fn parse_function(&mut self) -> Spanned<FnDecl> {
        let start = self.current_span();
        let is_kernel = self.at(&Lexeme::Kernel);
        self.advance();
        let name = self.expect_global();

        let mut params = Vec::new();
        if self.expect(&Lexeme::LParen).is_some() {
            if !self.at(&Lexeme::RParen) {
                loop {
                    let name = self.expect_local();
                    self.expect(&Lexeme::Colon);
                    let ty = self.parse_type();
                    params.push(ParamDecl { name, ty });
                    if !self.eat(&Lexeme::Comma) {
                        break;
                    }
                }
            }
            self.expect(&Lexeme::RParen);
        }

        let mut blocks = Vec::new();
        if self.expect(&Lexeme::LBrace).is_some() {
            while !self.at_function_end() {
                let start = self.pos;
                match self.parse_block() {
                    Some(block) => blocks.push(block),
                    None => self.recover_line(start),
                }
            }
            self.expect(&Lexeme::RBrace);
        } else {
            self.skip_to_function();
        }

        let span = start.merge(self.prev_span());
        Spanned::new(
            FnDecl {
                is_kernel,
                name,
                params,
                blocks,
            },
            span,
        )
    }

    fn parse_block(&mut self) -> Option<BlockDecl> {
        if !self.at_label() {
            self.error_with_help(
                &format!("expected a block label, found {}", self.peek().description()),
                "every block starts with `label:`; the first block is the entry",
            );
            return None;
        }
        let label = self.expect_label()?;
        self.expect(&Lexeme::Colon);

        let mut max_trip = None;
        while let Lexeme::Meta(name) = self.peek().clone() {
            let span = self.current_span();
            self.advance();
            if name == "max_trip" {
                match *self.peek() {
                    Lexeme::Integer(n) if n >= 0 => {
                        max_trip = Some(n as u64);
                        self.advance();
                    }
                    _ => self.error_with_help(
                        "expected a trip count after '!max_trip'",
                        "write the largest number of iterations, e.g. `!max_trip 64`",
                    ),
                }
            } else {
                self.diagnostics.push(Diagnostic::warning(
                    format!("unknown annotation '!{}' is ignored", name),
                    span,
                ));
                while !self.at_function_end()
                    && !self.at_line_start()
                    && !matches!(self.peek(), Lexeme::Meta(_))
                {
                    self.advance();
                }
            }
        }

        let mut insts = Vec::new();
        while !self.at_function_end() && !self.at_label() {
            let start = self.pos;
            match self.parse_inst() {
                Some(inst) => insts.push(inst),
                None => self.recover_line(start),
            }
        }
        Some(BlockDecl {
            label,
            max_trip,
            insts,
        })
    }

    // --- Instructions ---

    fn parse_inst(&mut self) -> Option<Spanned<InstDecl>> {
        let start = self.current_span();
        let result = match self.peek().clone() {
            Lexeme::Local(name) if self.peek_next() == &Lexeme::Eq => {
                let span = self.current_span();
                self.advance();
                self.advance();
                Some(Spanned::new(name, span))
            }
            _ => None,
        };

        let op = match self.peek().clone() {
            Lexeme::Ident(name) => name,
            other => {
                self.error_with_help(
                    &format!("expected an instruction, found {}", other.description()),
                    "instructions look like `%x = add i32 %a, %b` or `br label`",
                );
                return None;
            }
        };
        let op_span = self.current_span();
        let opcode = match op.as_str() {
            "gep" => Some(Opcode::GetElementPtr),
            name => Opcode::from_name(name),
        };
        let Some(opcode) = opcode else {
            self.diagnostics.push(
                Diagnostic::error(format!("unknown instruction '{}'", op), op_span).with_help(
                    "instructions use LLVM opcode names such as add, fmul, load, icmp, call, phi, br"
                        .to_string(),
                ),
            );
            return None;
        };
        self.advance();

        let mut inst = InstDecl::new(opcode);
        inst.result = result;
        match opcode {
            Opcode::ICmp | Opcode::FCmp => {
                inst.predicate = Some(self.parse_predicate(opcode == Opcode::FCmp)?);
                inst.operands = self.parse_operands(&op, Some(2))?;
            }
            Opcode::Load => {
                inst.ty = Some(self.parse_type());
                inst.addr_space = self.parse_addr_space();
                inst.operands = self.parse_operands(&op, Some(1))?;
            }
            Opcode::Store => {
                inst.addr_space = self.parse_addr_space();
                inst.operands = self.parse_operands(&op, Some(2))?;
            }
            Opcode::GetElementPtr => {
                inst.addr_space = self.parse_addr_space();
                inst.operands = self.parse_operands(&op, None)?;
            }
            Opcode::AtomicRMW | Opcode::CmpXchg => {
                inst.ty = Some(self.parse_type());
                inst.addr_space = self.parse_addr_space();
                let count = if opcode == Opcode::CmpXchg { 3 } else { 2 };
                inst.operands = self.parse_operands(&op, Some(count))?;
            }
            Opcode::Alloca => {
                inst.ty = Some(self.parse_type());
            }
            Opcode::Phi => {
                inst.ty = Some(self.parse_type());
                inst.incoming = self.parse_incoming()?;
            }
            Opcode::Call => {
                inst.ty = Some(self.parse_type());
                inst.callee = Some(self.expect_global().node);
                self.expect(&Lexeme::LParen)?;
                if !self.at(&Lexeme::RParen) {
                    inst.operands = self.parse_operands(&op, None)?;
                }
                self.expect(&Lexeme::RParen)?;
            }
            Opcode::Br => {
                if self.at_label_ref() {
                    inst.targets.push(self.expect_label()?);
                } else {
                    inst.operands = vec![self.parse_operand()?];
                    self.expect(&Lexeme::Comma)?;
                    inst.targets.push(self.expect_label()?);
                    self.expect(&Lexeme::Comma)?;
                    inst.targets.push(self.expect_label()?);
                }
            }
            Opcode::Ret => {
                if !self.at_line_start() {
                    if matches!(self.peek(), Lexeme::Ident(w) if w == "void") {
                        self.advance();
                    } else if self.at_operand() {
                        inst.operands = vec![self.parse_operand()?];
                    }
                }
            }
            op_kind if op_kind.is_cast() => {
                inst.operands = vec![self.parse_operand()?];
                self.expect_word("to")?;
                inst.ty = Some(self.parse_type());
            }
            _ => {
                if self.at_type() {
                    inst.ty = Some(self.parse_type());
                }
                inst.operands = self.parse_operands(&op, None)?;
            }
        }

        let span = start.merge(self.prev_span());
        Some(Spanned::new(inst, span))
    }

    fn parse_predicate(&mut self, float: bool) -> Option<Predicate> {
        let name = match self.peek() {
            Lexeme::Ident(name) => name.clone(),
            _ => String::new(),
        };
        let pred = if float {
            Predicate::from_float_name(&name)
        } else {
            Predicate::from_int_name(&name)
        };
        match pred {
            Some(p) => {
                self.advance();
                Some(p)
            }
            None => {
                let help = if float {
                    "fcmp predicates: oeq ogt oge olt ole one ord ueq ugt uge ult ule une uno true false"
                } else {
                    "icmp predicates: eq ne ugt uge ult ule sgt sge slt sle"
                };
                self.error_with_help(
                    &format!("expected a comparison predicate, found {}", self.peek().description()),
                    help,
                );
                None
            }
        }
    }

    /// Comma-separated operands; `count` is the exact number required.
    fn parse_operands(&mut self, op: &str, count: Option<usize>) -> Option<Vec<Spanned<OperandRef>>> {
        let start = self.current_span();
        let mut operands = vec![self.parse_operand()?];
        while self.eat(&Lexeme::Comma) {
            operands.push(self.parse_operand()?);
        }
        if let Some(n) = count {
            if operands.len() != n {
                self.diagnostics.push(Diagnostic::error(
                    format!("'{}' takes {} operand(s), found {}", op, n, operands.len()),
                    start.merge(self.prev_span()),
                ));
                return None;
            }
        }
        Some(operands)
    }

    fn parse_operand(&mut self) -> Option<Spanned<OperandRef>> {
        let span = self.current_span();
        let operand = match self.peek().clone() {
            Lexeme::Local(name) => OperandRef::Local(name),
            Lexeme::Integer(n) => OperandRef::Int(n),
            Lexeme::Float(x) => OperandRef::Float(x),
            Lexeme::Ident(word) if word == "true" => OperandRef::Int(1),
            Lexeme::Ident(word) if word == "false" => OperandRef::Int(0),
            other => {
                self.error_with_help(
                    &format!("expected an operand, found {}", other.description()),
                    "operands are values like `%x` or literals like `4` and `1.5`",
                );
                return None;
            }
        };
        self.advance();
        Some(Spanned::new(operand, span))
    }

    /// `[value, label], [value, label], ...`
    fn parse_incoming(&mut self) -> Option<Vec<(Spanned<OperandRef>, Spanned<String>)>> {
        let mut incoming = Vec::new();
        loop {
            self.expect(&Lexeme::LBracket)?;
            let value = self.parse_operand()?;
            self.expect(&Lexeme::Comma)?;
            let label = self.expect_label()?;
            self.expect(&Lexeme::RBracket)?;
            incoming.push((value, label));
            if !self.eat(&Lexeme::Comma) {
                break;
            }
        }
        Some(incoming)
    }

    // --- Types ---

    fn at_type(&self) -> bool {
        match self.peek() {
            Lexeme::Lt => true,
            Lexeme::Ident(name) => name == "ptr" || scalar_type(name).is_some(),
            _ => false,
        }
    }

    fn parse_type(&mut self) -> Type {
        match self.peek().clone() {
            Lexeme::Lt => {
                self.advance();
                let lanes = match *self.peek() {
                    Lexeme::Integer(n) if n > 0 && n <= u32::MAX as i64 => {
                        self.advance();
                        n as u32
                    }
                    _ => {
                        self.error_at_current("expected a lane count in vector type");
                        1
                    }
                };
                self.expect_word("x");
                let elem = self.parse_type();
                self.expect(&Lexeme::Gt);
                Type::Vector(lanes, Box::new(elem))
            }
            Lexeme::Ident(name) if name == "ptr" => {
                self.advance();
                Type::Ptr(self.parse_addr_space().unwrap_or(AddrSpace::Generic))
            }
            Lexeme::Ident(name) => match scalar_type(&name) {
                Some(ty) => {
                    self.advance();
                    ty
                }
                None => {
                    self.error_with_help(
                        &format!("unknown type '{}'", name),
                        "types are i1..i64, f16, f32, f64, void, `ptr <space>` and `<N x T>`",
                    );
                    Type::Void
                }
            },
            other => {
                self.error_at_current(&format!("expected a type, found {}", other.description()));
                Type::Void
            }
        }
    }

    /// An optional address space: a name, or `addrspace(N)`.
    fn parse_addr_space(&mut self) -> Option<AddrSpace> {
        let Lexeme::Ident(name) = self.peek().clone() else {
            return None;
        };
        if let Some(space) = AddrSpace::from_name(&name) {
            self.advance();
            return Some(space);
        }
        if name != "addrspace" {
            return None;
        }
        self.advance();
        self.expect(&Lexeme::LParen)?;
        let index = match *self.peek() {
            Lexeme::Integer(n) if n >= 0 => n as u32,
            _ => {
                self.error_at_current("expected an address space number");
                0
            }
        };
        self.advance();
        self.expect(&Lexeme::RParen);
        Some(AddrSpace::from_index(index))
    }

    // --- Token helpers ---

    fn peek(&self) -> &Lexeme {
        &self.tokens[self.pos].node
    }

    fn peek_next(&self) -> &Lexeme {
        let next = (self.pos + 1).min(self.tokens.len() - 1);
        &self.tokens[next].node
    }

    fn current_span(&self) -> Span {
        self.tokens[self.pos].span
    }

    fn prev_span(&self) -> Span {
        if self.pos > 0 {
            self.tokens[self.pos - 1].span
        } else {
            self.current_span()
        }
    }

    fn advance(&mut self) -> &Spanned<Lexeme> {
        let tok = &self.tokens[self.pos];
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn at(&self, token: &Lexeme) -> bool {
        std::mem::discriminant(self.peek()) == std::mem::discriminant(token)
    }

    fn eat(&mut self, token: &Lexeme) -> bool {
        if self.at(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Lexeme) -> Option<Span> {
        if self.at(token) {
            let span = self.current_span();
            self.advance();
            Some(span)
        } else {
            self.error_at_current(&format!(
                "expected {}, found {}",
                token.description(),
                self.peek().description()
            ));
            None
        }
    }

    fn expect_word(&mut self, word: &str) -> Option<Span> {
        match self.peek() {
            Lexeme::Ident(w) if w == word => {
                let span = self.current_span();
                self.advance();
                Some(span)
            }
            other => {
                let msg = format!("expected '{}', found {}", word, other.description());
                self.error_at_current(&msg);
                None
            }
        }
    }

    fn expect_global(&mut self) -> Spanned<String> {
        if let Lexeme::Global(name) = self.peek().clone() {
            let span = self.current_span();
            self.advance();
            Spanned::new(name, span)
        } else {
            self.error_with_help(
                &format!("expected a function name, found {}", self.peek().description()),
                "function names start with '@', e.g. `@vadd`",
            );
            Spanned::new("_error_".to_string(), self.current_span())
        }
    }

    fn expect_local(&mut self) -> Spanned<String> {
        if let Lexeme::Local(name) = self.peek().clone() {
            let span = self.current_span();
            self.advance();
            Spanned::new(name, span)
        } else {
            self.error_with_help(
                &format!("expected a parameter name, found {}", self.peek().description()),
                "parameters look like `%n: i32`",
            );
            Spanned::new("_error_".to_string(), self.current_span())
        }
    }

    fn expect_label(&mut self) -> Option<Spanned<String>> {
        if let Lexeme::Ident(name) = self.peek().clone() {
            let span = self.current_span();
            self.advance();
            Some(Spanned::new(name, span))
        } else {
            self.error_at_current(&format!(
                "expected a block label, found {}",
                self.peek().description()
            ));
            None
        }
    }

    fn at_label(&self) -> bool {
        matches!(self.peek(), Lexeme::Ident(_)) && self.peek_next() == &Lexeme::Colon
    }

    fn at_label_ref(&self) -> bool {
        matches!(self.peek(), Lexeme::Ident(w) if w != "true" && w != "false")
    }

    fn at_operand(&self) -> bool {
        matches!(
            self.peek(),
            Lexeme::Local(_) | Lexeme::Integer(_) | Lexeme::Float(_)
        )
    }

    fn at_function_end(&self) -> bool {
        matches!(
            self.peek(),
            Lexeme::RBrace | Lexeme::Eof | Lexeme::Kernel | Lexeme::Func
        )
    }

    /// Whether a newline separates the current token from the previous one.
    fn at_line_start(&self) -> bool {
        if self.pos == 0 {
            return true;
        }
        let prev = self.tokens[self.pos - 1].span.end as usize;
        let cur = self.tokens[self.pos].span.start as usize;
        self.source.get(prev..cur).is_some_and(|gap| gap.contains('\n'))
    }

    /// Skip to the next line after a failed parse that began at token
    /// `start`. Consumes at least one token.
    fn recover_line(&mut self, start: usize) {
        if self.pos == start && !self.at_function_end() {
            self.advance();
        }
        while !self.at_function_end() && !self.at_line_start() {
            self.advance();
        }
    }

    fn skip_to_function(&mut self) {
        self.advance();
        while !self.at(&Lexeme::Eof) && !self.at(&Lexeme::Kernel) && !self.at(&Lexeme::Func) {
            self.advance();
        }
    }

    fn error_at_current(&mut self, msg: &str) {
        self.diagnostics
            .push(Diagnostic::error(msg.to_string(), self.current_span()));
    }

    fn error_with_help(&mut self, msg: &str, help: &str) {
        self.diagnostics.push(
            Diagnostic::error(msg.to_string(), self.current_span()).with_help(help.to_string()),
        );
    }
}

/// Whether any diagnostic is an error.
pub(crate) fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(|d| d.severity == Severity::Error)
}

fn scalar_type(name: &str) -> Option<Type> {
    match name {
        "void" => Some(Type::Void),
        "half" | "f16" => Some(Type::Half),
        "float" | "f32" => Some(Type::Float),
        "double" | "f64" => Some(Type::Double),
        _ => {
            let bits: u32 = name.strip_prefix('i')?.parse().ok()?;
            (1..=128).contains(&bits).then_some(Type::Int(bits))
        }
    }
}
