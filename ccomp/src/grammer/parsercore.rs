use super::ast::{Ast, Type};
use super::token::{Token, TokenKind};
use crate::error::ParseError;
use indexmap::IndexMap;

/// Cursor over the token vector. The cursor can be saved and restored,
/// which is how declarations are told apart from expressions.
pub struct Parser {
    tokens: Vec<Token>,
    cursor: usize,
    errors: Vec<ParseError>,
    pub(super) ast: Ast,
    pub(super) typedefs: IndexMap<String, Type>,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        tokens.retain(|token| !matches!(token.kind, TokenKind::Error(_)));
        if !matches!(tokens.last(), Some(Token { kind: TokenKind::Eof, .. })) {
            let pos = tokens.last().map(|t| t.pos).unwrap_or_default();
            tokens.push(Token::new(TokenKind::Eof, "", pos));
        }
        Parser {
            tokens,
            cursor: 0,
            errors: Vec::new(),
            ast: Ast::new(),
            typedefs: IndexMap::new(),
        }
    }

    pub fn error(&mut self, e: ParseError) {
        self.errors.push(e);
    }

    pub(super) fn finish(self) -> Result<Ast, Vec<ParseError>> {
        if self.errors.is_empty() {
            Ok(self.ast)
        } else {
            Err(self.errors)
        }
    }
}

impl Parser {
    /// Peek : Watch next token without consuming it
    pub fn peek(&self) -> &Token {
        self.peek_nth(0)
    }

    /// Token `n` ahead of the cursor, `Eof` past the end
    pub fn peek_nth(&self, n: usize) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.cursor + n).min(last)]
    }

    /// Next : Consume next token and return it. `Eof` is never consumed.
    pub fn next(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.cursor += 1;
        }
        token
    }

    pub fn at_eof(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    pub fn mark(&self) -> usize {
        self.cursor
    }

    pub fn rewind(&mut self, mark: usize) {
        self.cursor = mark;
    }

    /// Peek and check next token is match with condition
    pub fn check_if<F: Fn(&Token) -> bool>(&self, cond: F) -> bool {
        cond(self.peek())
    }

    /// Consume if next token is match with condition
    pub fn consume_if<F: Fn(&Token) -> bool>(&mut self, cond: F) -> Option<Token> {
        if self.check_if(cond) {
            Some(self.next())
        } else {
            None
        }
    }

    /// Consume until next token is match with condition
    pub fn consume_until<F: Fn(&Token) -> bool>(&mut self, cond: F) {
        while !self.at_eof() && !cond(self.peek()) {
            self.next();
        }
    }

    /// Next token must be match with condition
    pub fn expect_tobe<F: Fn(&Token) -> bool>(
        &mut self,
        cond: F,
        expected: &str,
    ) -> Result<Token, ParseError> {
        if self.check_if(cond) {
            Ok(self.next())
        } else {
            Err(ParseError::new(expected, self.peek()))
        }
    }

    /// Panic mode: skip to the next `;` (consumed), `{` or `}`.
    /// If nothing was consumed since `start`, one token is dropped so the caller always advances.
    pub fn synchronize(&mut self, start: usize) {
        self.consume_until(|token| {
            matches!(token.kind, TokenKind::Semicolon | TokenKind::LCurly | TokenKind::RCurly)
        });
        if self.peek().kind == TokenKind::Semicolon || self.cursor == start {
            self.next();
        }
    }
}

/// Spelling of a token kind for diagnostics
pub fn spelling(kind: &str) -> String {
    let text = match kind {
        "Semicolon" => ";",
        "Comma" => ",",
        "Colon" => ":",
        "Equal" => "=",
        "LParen" => "(",
        "RParen" => ")",
        "LBracket" => "[",
        "RBracket" => "]",
        "LCurly" => "{",
        "RCurly" => "}",
        "KwWhile" => "while",
        _ => return kind.to_string(),
    };
    format!("`{}`", text)
}

#[macro_export]
macro_rules! check {
    ($parser:expr, $kind:pat) => {
        $parser.check_if(|token| matches!(&token.kind, $kind))
    };
}

#[macro_export]
macro_rules! expect {
    ($parser:expr, $kind:pat) => {
        $parser.expect_tobe(
            |token| matches!(&token.kind, $kind),
            &$crate::grammer::parsercore::spelling(stringify!($kind)),
        )
    };
}

#[macro_export]
macro_rules! optional {
    ($parser:expr, $trigger:pat, $following:expr) => {
        if check!($parser, $trigger) {
            expect!($parser, $trigger)?;
            Some($following)
        } else {
            None
        }
    };
    ($parser:expr, $trigger:pat) => {
        $parser.consume_if(|token| matches!(&token.kind, $trigger))
    };
}

/// Parse repeated elements with optional delimiters
/// 3 args: { element } terminal (no delimiter)
/// 4 args: [ element { delimiter element } ] terminal (with delimiter)
#[macro_export]
macro_rules! repeat {
    // Without delimiter: { element } terminal
    ($parser:expr, $elem:expr, $terminal:pat) => {{
        let mut items = Vec::new();
        while !check!($parser, $terminal) && !$parser.at_eof() {
            items.push($elem?);
        }
        items
    }};

    // With delimiter: [ element { delimiter element } ] terminal
    ($parser:expr, $elem:expr, $delimiter:pat, $terminal:pat) => {{
        let mut items = Vec::new();
        if !check!($parser, $terminal) {
            items.push($elem?);
            while check!($parser, $delimiter) {
                expect!($parser, $delimiter)?;
                items.push($elem?);
            }
        }
        items
    }};
}

/// Record the error and resynchronize at a statement boundary.
/// `$mark` is the cursor before the failed production.
#[macro_export]
macro_rules! recover {
    ($parser:expr, $err:expr, $mark:expr) => {{
        $parser.error($err);
        $parser.synchronize($mark);
    }};
}
