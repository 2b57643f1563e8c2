use super::lexeme::Lexeme;
use crate::diagnostic::Diagnostic;
use crate::span::{Span, Spanned};

pub(crate) struct Lexer<'src> {
    source: &'src [u8],
    file_id: u16,
    pos: usize,
    diagnostics: Vec<Diagnostic>,
}

impl<'src> Lexer<'src> {
    pub(crate) fn new(source: &'src str, file_id: u16) -> Self {
        Self {
            source: source.as_bytes(),
            file_id,
            pos: 0,
            diagnostics: Vec::new(),
        }
    }

    pub(crate) fn tokenize(mut self) -> (Vec<Spanned<Lexeme>>, Vec<Diagnostic>) {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token();
            let is_eof = tok.node == Lexeme::Eof;
            tokens.push(tok);
            if is_eof {
                break;
            }
        }
        (tokens, self.diagnostics)
    }

    fn next_token(&mut self) -> Spanned<Lexeme> {
        loop {
            self.skip_whitespace_and_comments();

            if self.pos >= self.source.len() {
                return self.make_token(Lexeme::Eof, self.pos, self.pos);
            }

            let start = self.pos;
            let ch = self.source[self.pos];

            if is_ident_start(ch) {
                return self.scan_ident_or_keyword();
            }

            if ch.is_ascii_digit() || (ch == b'-' && self.peek_at(1).is_some_and(|c| c.is_ascii_digit())) {
                return self.scan_number();
            }

            if let Some(sigil) = sigil_kind(ch) {
                if let Some(tok) = self.scan_name(start, sigil) {
                    return tok;
                }
                continue;
            }

            if let Some(tok) = self.scan_symbol(start) {
                return tok;
            }
            // scan_symbol returned None → error was recorded, try again
        }
    }

    /// Whitespace, `; comment` and `// comment`.
    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while self.pos < self.source.len() && self.source[self.pos].is_ascii_whitespace() {
                self.pos += 1;
            }
            let line_comment = match self.source.get(self.pos) {
                Some(b';') => true,
                Some(b'/') => self.peek_at(1) == Some(b'/'),
                _ => false,
            };
            if !line_comment {
                break;
            }
            while self.pos < self.source.len() && self.source[self.pos] != b'\n' {
                self.pos += 1;
            }
        }
    }

    fn text(&self, start: usize, end: usize) -> String {
        String::from_utf8_lossy(&self.source[start..end]).into_owned()
    }

    fn scan_ident_or_keyword(&mut self) -> Spanned<Lexeme> {
        let start = self.pos;
        while self.pos < self.source.len() && is_name_continue(self.source[self.pos]) {
            self.pos += 1;
        }
        let text = self.text(start, self.pos);
        let token = Lexeme::from_keyword(&text).unwrap_or(Lexeme::Ident(text));
        self.make_token(token, start, self.pos)
    }

    /// `%value`, `@function` or `!annotation`.
    fn scan_name(&mut self, start: usize, sigil: u8) -> Option<Spanned<Lexeme>> {
        self.pos += 1;
        let name_start = self.pos;
        while self.pos < self.source.len() && is_name_continue(self.source[self.pos]) {
            self.pos += 1;
        }
        if self.pos == name_start {
            let what = match sigil {
                b'%' => "value",
                b'@' => "function",
                _ => "annotation",
            };
            self.diagnostics.push(
                Diagnostic::error(
                    format!("expected a {} name after '{}'", what, sigil as char),
                    Span::new(self.file_id, start as u32, self.pos as u32),
                )
                .with_help(format!(
                    "names are letters, digits, '_' and '.', e.g. `{}x.next`",
                    sigil as char
                )),
            );
            return None;
        }
        let name = self.text(name_start, self.pos);
        let token = match sigil {
            b'%' => Lexeme::Local(name),
            b'@' => Lexeme::Global(name),
            _ => Lexeme::Meta(name),
        };
        Some(self.make_token(token, start, self.pos))
    }

    fn scan_number(&mut self) -> Spanned<Lexeme> {
        let start = self.pos;
        if self.source[self.pos] == b'-' {
            self.pos += 1;
        }
        while self.pos < self.source.len() && self.source[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        let mut is_float = false;
        if self.source.get(self.pos) == Some(&b'.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            self.pos += 1;
            while self.pos < self.source.len() && self.source[self.pos].is_ascii_digit() {
                self.pos += 1;
            }
        }
        if matches!(self.source.get(self.pos), Some(b'e' | b'E')) {
            let exp_digits = match self.peek_at(1) {
                Some(b'+' | b'-') => 2,
                _ => 1,
            };
            if self.peek_at(exp_digits).is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                self.pos += exp_digits;
                while self.pos < self.source.len() && self.source[self.pos].is_ascii_digit() {
                    self.pos += 1;
                }
            }
        }

        let text = self.text(start, self.pos);
        if is_float {
            return match text.parse::<f64>() {
                Ok(x) => self.make_token(Lexeme::Float(x), start, self.pos),
                Err(_) => {
                    self.diagnostics.push(Diagnostic::error(
                        format!("malformed float literal '{}'", text),
                        Span::new(self.file_id, start as u32, self.pos as u32),
                    ));
                    self.make_token(Lexeme::Float(0.0), start, self.pos)
                }
            };
        }
        match text.parse::<i64>() {
            Ok(n) => self.make_token(Lexeme::Integer(n), start, self.pos),
            Err(_) => {
                self.diagnostics.push(
                    Diagnostic::error(
                        format!("integer literal '{}' is out of range", text),
                        Span::new(self.file_id, start as u32, self.pos as u32),
                    )
                    .with_help(format!("integer literals must fit in i64 (maximum {})", i64::MAX)),
                );
                self.make_token(Lexeme::Integer(0), start, self.pos)
            }
        }
    }

    fn scan_symbol(&mut self, start: usize) -> Option<Spanned<Lexeme>> {
        let ch = self.source[self.pos];
        self.pos += 1;

        let token = match ch {
            b'(' => Lexeme::LParen,
            b')' => Lexeme::RParen,
            b'{' => Lexeme::LBrace,
            b'}' => Lexeme::RBrace,
            b'[' => Lexeme::LBracket,
            b']' => Lexeme::RBracket,
            b',' => Lexeme::Comma,
            b':' => Lexeme::Colon,
            b'=' => Lexeme::Eq,
            b'<' => Lexeme::Lt,
            b'>' => Lexeme::Gt,
            _ => {
                let shown = if ch.is_ascii_graphic() {
                    format!("'{}'", ch as char)
                } else {
                    format!("byte 0x{:02X}", ch)
                };
                self.diagnostics.push(
                    Diagnostic::error(
                        format!("unexpected character {}", shown),
                        Span::new(self.file_id, start as u32, self.pos as u32),
                    )
                    .with_help("comments start with ';' or '//'".to_string()),
                );
                return None;
            }
        };

        Some(self.make_token(token, start, self.pos))
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.source.get(self.pos + offset).copied()
    }

    fn make_token(&self, token: Lexeme, start: usize, end: usize) -> Spanned<Lexeme> {
        Spanned::new(token, Span::new(self.file_id, start as u32, end as u32))
    }
}

fn sigil_kind(ch: u8) -> Option<u8> {
    matches!(ch, b'%' | b'@' | b'!').then_some(ch)
}

fn is_ident_start(ch: u8) -> bool {
    ch.is_ascii_alphabetic() || ch == b'_'
}

fn is_name_continue(ch: u8) -> bool {
    ch.is_ascii_alphanumeric() || ch == b'_' || ch == b'.' || ch == b'$'
}

#[cfg(test)]
mod tests;
