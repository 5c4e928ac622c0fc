use crate::grammer::{
    ast::Type,
    token::{Pos, Token},
};
use color_print::ceprintln;
use thiserror::Error;

/// An `Error` token left by the lexer.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{msg}")]
pub struct LexError {
    pub msg: String,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("expected {expected}, found {found}")]
pub struct ParseError {
    pub expected: String,
    /// Offending token as written, or `end of file`
    pub found: String,
    pub pos: Pos,
}

impl ParseError {
    pub fn new(expected: impl Into<String>, token: &Token) -> Self {
        let found = if token.text.is_empty() {
            "end of file".to_string()
        } else {
            format!("`{}`", token.text)
        };
        ParseError { expected: expected.into(), found, pos: token.pos }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TypeError {
    #[error("undeclared identifier `{0}`")]
    Undeclared(String, Pos),

    #[error("`{0}` is already declared in this scope")]
    Duplicate(String, Pos),

    #[error("incompatible types: expected `{expected}`, found `{found}`")]
    Incompatible { expected: Type, found: Type, pos: Pos },

    #[error("invalid operand of type `{ty}` for `{op}`")]
    InvalidOperand { op: String, ty: Type, pos: Pos },

    #[error("`{0}` is not a function")]
    NotCallable(String, Pos),

    #[error("`{name}` takes {expected} argument(s) but {found} were given")]
    ArgCount { name: String, expected: usize, found: usize, pos: Pos },

    #[error("{0}")]
    Misplaced(String, Pos),
}

impl TypeError {
    pub fn pos(&self) -> Pos {
        match self {
            TypeError::Undeclared(_, pos)
            | TypeError::Duplicate(_, pos)
            | TypeError::NotCallable(_, pos)
            | TypeError::Misplaced(_, pos) => *pos,
            TypeError::Incompatible { pos, .. }
            | TypeError::InvalidOperand { pos, .. }
            | TypeError::ArgCount { pos, .. } => *pos,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodegenError {
    #[error("unsupported: {0}")]
    Unsupported(String, Pos),
}

impl CodegenError {
    pub fn pos(&self) -> Pos {
        match self {
            CodegenError::Unsupported(_, pos) => *pos,
        }
    }
}

/// The stage that stopped the pipeline, with its diagnostics.
#[derive(Debug, Error)]
pub enum Failure {
    #[error("Lexical analysis failed")]
    Lex(Vec<LexError>),

    #[error("Parsing failed")]
    Parse(Vec<ParseError>),

    #[error("Type checking failed")]
    Type(TypeError),

    #[error("Code generation failed")]
    Codegen(CodegenError),

    #[error("Cannot access `{0}`: {1}")]
    Io(String, #[source] std::io::Error),
}

impl Failure {
    /// `(position, message)` of every diagnostic, in source order of discovery.
    pub fn diagnostics(&self) -> Vec<(Pos, String)> {
        match self {
            Failure::Lex(errs) => errs.iter().map(|e| (e.pos, e.to_string())).collect(),
            Failure::Parse(errs) => errs.iter().map(|e| (e.pos, e.to_string())).collect(),
            Failure::Type(err) => vec![(err.pos(), err.to_string())],
            Failure::Codegen(err) => vec![(err.pos(), err.to_string())],
            Failure::Io(..) => Vec::new(),
        }
    }

    /// Print every diagnostic to stderr with a source excerpt.
    pub fn print(&self, file: &str, source: &str) {
        let lines: Vec<&str> = source.lines().collect();
        for (pos, msg) in self.diagnostics() {
            ceprintln!("<red,bold>error</>: {}", msg);
            ceprintln!("     <blue>--></> <underline>{}:{}</>", file, pos);
            ceprintln!("      <blue>|</>");
            let content = lines.get(pos.line.wrapping_sub(1)).copied().unwrap_or("");
            ceprintln!(" <blue>{:>4} |</> {}", pos.line, content);
            ceprintln!("      <blue>|</> {}<red,bold>^</>", " ".repeat(pos.col.saturating_sub(1)));
        }
        ceprintln!("<red,bold>{}</>", self);
    }
}
