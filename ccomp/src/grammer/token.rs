use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub pos: Pos,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, pos: Pos) -> Self {
        Token { kind, text: text.into(), pos }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Triple character tokens
    LAngleLAngleEqual, // '<<='
    RAngleRAngleEqual, // '>>='

    // Double character tokens
    PlusPlus,     // '++'
    MinusMinus,   // '--'
    PlusEqual,    // '+='
    MinusEqual,   // '-='
    StarEqual,    // '*='
    SlashEqual,   // '/='
    PercentEqual, // '%='
    AmpEqual,     // '&='
    PipeEqual,    // '|='
    CaretEqual,   // '^='
    EqualEqual,   // '=='
    ExclEqual,    // '!='
    LAngleEqual,  // '<='
    RAngleEqual,  // '>='
    LAngleLAngle, // '<<'
    RAngleRAngle, // '>>'
    AmpAmp,       // '&&'
    PipePipe,     // '||'
    Arrow,        // '->'

    // Single character tokens
    Equal,     // '='
    Plus,      // '+'
    Minus,     // '-'
    Star,      // '*'
    Slash,     // '/'
    Percent,   // '%'
    Ampasand,  // '&'
    Pipe,      // '|'
    Caret,     // '^'
    Excl,      // '!'
    Tilde,     // '~'
    Question,  // '?'
    Colon,     // ':'
    Semicolon, // ';'
    Comma,     // ','
    Period,    // '.'
    LParen,    // '('
    RParen,    // ')'
    LBracket,  // '['
    RBracket,  // ']'
    LCurly,    // '{'
    RCurly,    // '}'
    LAngle,    // '<'
    RAngle,    // '>'

    // Keywords
    KwInt,      // "int"
    KwChar,     // "char"
    KwFloat,    // "float"
    KwDouble,   // "double"
    KwVoid,     // "void"
    KwBool,     // "bool"
    KwIf,       // "if"
    KwElse,     // "else"
    KwWhile,    // "while"
    KwFor,      // "for"
    KwReturn,   // "return"
    KwBreak,    // "break"
    KwContinue, // "continue"
    KwStruct,   // "struct"
    KwEnum,     // "enum"
    KwTypedef,  // "typedef"
    KwSwitch,   // "switch"
    KwCase,     // "case"
    KwDefault,  // "default"
    KwTrue,     // "true"
    KwFalse,    // "false"

    // Identifier
    Ident(String),

    // Literals
    Int(i64),
    Float(f64),
    Char(char),
    Text(String),

    // Special
    Error(String),
    Eof,
}

/// 1-based source position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pos {
    pub line: usize,
    pub col: usize,
}

impl Pos {
    pub fn new(line: usize, col: usize) -> Self {
        Pos { line, col }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}
