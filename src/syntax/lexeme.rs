/// All lexemes of the kernel IR text format.
#[derive(Clone, Debug, PartialEq)]
pub enum Lexeme {
    // Keywords
    Kernel,
    Func,

    // Names
    Local(String),  // %name
    Global(String), // @name
    Meta(String),   // !name
    Ident(String),

    // Literals
    Integer(i64),
    Float(f64),

    // Symbols
    LParen,   // (
    RParen,   // )
    LBrace,   // {
    RBrace,   // }
    LBracket, // [
    RBracket, // ]
    Comma,    // ,
    Colon,    // :
    Eq,       // =
    Lt,       // <
    Gt,       // >

    // End of file
    Eof,
}

impl Lexeme {
    pub fn from_keyword(s: &str) -> Option<Lexeme> {
        match s {
            "kernel" => Some(Lexeme::Kernel),
            "func" => Some(Lexeme::Func),
            _ => None,
        }
    }

    /// Human-readable description for error messages.
    pub fn description(&self) -> String {
        match self {
            Lexeme::Kernel => "'kernel'".to_string(),
            Lexeme::Func => "'func'".to_string(),
            Lexeme::Local(name) => format!("value '%{}'", name),
            Lexeme::Global(name) => format!("function name '@{}'", name),
            Lexeme::Meta(name) => format!("annotation '!{}'", name),
            Lexeme::Ident(name) => format!("'{}'", name),
            Lexeme::Integer(n) => format!("integer {}", n),
            Lexeme::Float(x) => format!("float {}", x),
            Lexeme::LParen => "'('".to_string(),
            Lexeme::RParen => "')'".to_string(),
            Lexeme::LBrace => "'{'".to_string(),
            Lexeme::RBrace => "'}'".to_string(),
            Lexeme::LBracket => "'['".to_string(),
            Lexeme::RBracket => "']'".to_string(),
            Lexeme::Comma => "','".to_string(),
            Lexeme::Colon => "':'".to_string(),
            Lexeme::Eq => "'='".to_string(),
            Lexeme::Lt => "'<'".to_string(),
            Lexeme::Gt => "'>'".to_string(),
            Lexeme::Eof => "end of file".to_string(),
        }
    }
}
