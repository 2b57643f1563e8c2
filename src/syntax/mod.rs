//! Kernel IR text (`.kir`): lexer, parser and lowering to `ir::Module`.

pub mod ast;
pub mod lexeme;
pub(crate) mod lexer;
mod lower;
pub(crate) mod parser;

use std::path::Path;

use tracing::{debug, warn};

use crate::diagnostic::Diagnostic;
use crate::error::CrelError;
use crate::ir::Module;
use lexer::Lexer;
use lower::lower_file;
use parser::{has_errors, Parser};

/// Parse and lower kernel IR text. Every error in the text is returned
/// together; warnings are logged and do not fail the parse.
pub fn parse_module(source: &str) -> Result<Module, Vec<Diagnostic>> {
    let (tokens, mut diagnostics) = Lexer::new(source, 0).tokenize();
    let (file, parse_diagnostics) = Parser::new(tokens, source).parse_file();
    diagnostics.extend(parse_diagnostics);
    if has_errors(&diagnostics) {
        return Err(diagnostics);
    }
    for diag in &diagnostics {
        warn!("{}", diag);
    }
    let module = lower_file(&file)?;
    debug!(functions = module.functions.len(), "parsed module");
    Ok(module)
}

/// Read and parse a `.kir` file.
pub fn load_module(path: &Path) -> Result<Module, CrelError> {
    let source = std::fs::read_to_string(path).map_err(|e| CrelError::io(path, e))?;
    parse_module(&source).map_err(|diagnostics| CrelError::Parse {
        path: path.to_path_buf(),
        source_text: source,
        diagnostics,
    })
}
