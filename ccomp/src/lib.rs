pub mod check;
pub mod compile;
pub mod error;
pub mod grammer;

use error::{Failure, LexError};
use grammer::ast::Ast;
use grammer::lexer::Lexer;
use grammer::token::{Token, TokenKind};

/// Result of a successful compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct Compiled {
    /// Tokens produced by the lexer, `Eof` included
    pub tokens: usize,
    pub asm: String,
}

/// Tokenize. Any `Error` token fails the stage.
pub fn lex(source: &str) -> Result<Vec<Token>, Failure> {
    let tokens = Lexer::new(source).parse();
    let errors: Vec<LexError> = tokens
        .iter()
        .filter_map(|token| match &token.kind {
            TokenKind::Error(msg) => Some(LexError { msg: msg.clone(), pos: token.pos }),
            _ => None,
        })
        .collect();
    match errors.is_empty() {
        true => Ok(tokens),
        false => Err(Failure::Lex(errors)),
    }
}

pub fn parse(tokens: Vec<Token>) -> Result<Ast, Failure> {
    grammer::parser::parse(tokens).map_err(Failure::Parse)
}

pub fn check(ast: &mut Ast) -> Result<(), Failure> {
    check::check(ast).map_err(Failure::Type)
}

pub fn generate(ast: &Ast, file: &str) -> Result<String, Failure> {
    let code = compile::generate(ast, file).map_err(Failure::Codegen)?;
    Ok(compile::render(&code))
}

/// Run every stage over one translation unit.
pub fn compile(file: &str, source: &str) -> Result<Compiled, Failure> {
    let tokens = lex(source)?;
    let count = tokens.len();
    let mut ast = parse(tokens)?;
    check(&mut ast)?;
    let asm = generate(&ast, file)?;
    Ok(Compiled { tokens: count, asm })
}
