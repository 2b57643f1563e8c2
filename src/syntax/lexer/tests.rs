use super::*;

fn lex(source: &str) -> Vec<Lexeme> {
    let (tokens, diags) = Lexer::new(source, 0).tokenize();
    assert!(diags.is_empty(), "unexpected diagnostics: {:?}", diags);
    tokens.into_iter().map(|t| t.node).collect()
}

#[test]
fn test_instruction_line() {
    assert_eq!(
        lex("%i.next = add i32 %i, 1"),
        vec![
            Lexeme::Local("i.next".to_string()),
            Lexeme::Eq,
            Lexeme::Ident("add".to_string()),
            Lexeme::Ident("i32".to_string()),
            Lexeme::Local("i".to_string()),
            Lexeme::Comma,
            Lexeme::Integer(1),
            Lexeme::Eof,
        ]
    );
}

#[test]
fn test_header_and_annotation() {
    assert_eq!(
        lex("kernel @vadd(%n: i32) {\nbody: !max_trip 64\n}"),
        vec![
            Lexeme::Kernel,
            Lexeme::Global("vadd".to_string()),
            Lexeme::LParen,
            Lexeme::Local("n".to_string()),
            Lexeme::Colon,
            Lexeme::Ident("i32".to_string()),
            Lexeme::RParen,
            Lexeme::LBrace,
            Lexeme::Ident("body".to_string()),
            Lexeme::Colon,
            Lexeme::Meta("max_trip".to_string()),
            Lexeme::Integer(64),
            Lexeme::RBrace,
            Lexeme::Eof,
        ]
    );
}

#[test]
fn test_numbers() {
    assert_eq!(
        lex("-3 2.5 1e3 7"),
        vec![
            Lexeme::Integer(-3),
            Lexeme::Float(2.5),
            Lexeme::Float(1000.0),
            Lexeme::Integer(7),
            Lexeme::Eof,
        ]
    );
}

#[test]
fn test_comments_are_skipped() {
    assert_eq!(
        lex("; leading\nret // trailing\n; done"),
        vec![Lexeme::Ident("ret".to_string()), Lexeme::Eof]
    );
}

#[test]
fn test_mangled_callee() {
    assert_eq!(
        lex("@_Z13get_global_idj @llvm.fmuladd.f32"),
        vec![
            Lexeme::Global("_Z13get_global_idj".to_string()),
            Lexeme::Global("llvm.fmuladd.f32".to_string()),
            Lexeme::Eof,
        ]
    );
}

#[test]
fn test_errors_are_collected() {
    let (tokens, diags) = Lexer::new("% ret ? 99999999999999999999", 0).tokenize();
    assert_eq!(diags.len(), 3);
    assert!(diags[0].message.contains("value name"));
    assert!(diags[1].message.contains("'?'"));
    assert!(diags[2].message.contains("out of range"));
    assert_eq!(tokens.last().map(|t| &t.node), Some(&Lexeme::Eof));
}
