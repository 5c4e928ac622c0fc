use super::token::{Pos, Token, TokenKind};
use std::iter::Peekable;
use std::str::CharIndices;

pub struct Lexer<'a> {
    code: &'a str,
    iter: Peekable<CharIndices<'a>>,
    line: usize,
    col: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(code: &'a str) -> Self {
        Self {
            code,
            iter: code.char_indices().peekable(),
            line: 1,
            col: 1,
        }
    }
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

impl<'a> Lexer<'a> {
    fn peek_nth(&self, n: usize) -> Option<char> {
        self.iter.clone().nth(n).map(|(_, ch)| ch)
    }

    fn consume(&mut self) -> Option<char> {
        let (_, ch) = self.iter.next()?;
        if ch == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    fn consume_while<F: Fn(char) -> bool>(&mut self, cond: F) {
        while self.peek_nth(0).map_or(false, &cond) {
            self.consume();
        }
    }

    /// Byte offset of the next unread character
    fn offset(&mut self) -> usize {
        self.iter.peek().map_or(self.code.len(), |&(idx, _)| idx)
    }

    fn pos(&self) -> Pos {
        Pos::new(self.line, self.col)
    }
}

// ----------------------------------------------------------------------------
// Lexer
// ----------------------------------------------------------------------------

impl<'a> Lexer<'a> {
    /// Tokenize the whole source. The last token is always `Eof`.
    pub fn parse(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        while let Some(ch0) = self.peek_nth(0) {
            // 0. Skip whitespaces
            if ch0.is_whitespace() {
                self.consume();
                continue;
            }

            let pos = self.pos();
            let start = self.offset();
            let ch1 = self.peek_nth(1);

            // 1. Comments and preprocessor lines
            if (ch0 == '/' && ch1 == Some('/')) || ch0 == '#' {
                self.consume_while(|ch| ch != '\n');
                continue;
            }
            if ch0 == '/' && ch1 == Some('*') {
                if let Err(msg) = self.block_comment() {
                    tokens.push(self.token(TokenKind::Error(msg), start, pos));
                }
                continue;
            }

            // 2. Operators, longest match first
            if let Some((kind, len)) = operator(ch0, ch1, self.peek_nth(2)) {
                for _ in 0..len {
                    self.consume();
                }
                tokens.push(self.token(kind, start, pos));
                continue;
            }

            let kind = match ch0 {
                // 3. Number literal
                '0'..='9' => self.parse_number(),
                // 4. Char literal
                '\'' => self.parse_char(),
                // 5. String literal
                '"' => self.parse_text(),
                // 6. Identifier or keyword
                ch if ch.is_ascii_alphabetic() || ch == '_' => self.parse_word(),
                // Error
                ch => {
                    self.consume();
                    TokenKind::Error(format!("unexpected character `{ch}`"))
                }
            };
            tokens.push(self.token(kind, start, pos));
        }
        let end = self.code.len();
        tokens.push(self.token(TokenKind::Eof, end, self.pos()));
        tokens
    }

    fn token(&mut self, kind: TokenKind, start: usize, pos: Pos) -> Token {
        let end = self.offset();
        Token::new(kind, &self.code[start..end], pos)
    }

    fn block_comment(&mut self) -> Result<(), String> {
        self.consume(); // consume '/'
        self.consume(); // consume '*'
        loop {
            match self.consume() {
                Some('*') if self.peek_nth(0) == Some('/') => {
                    self.consume();
                    return Ok(());
                }
                Some(_) => {}
                None => return Err("unterminated block comment".to_string()),
            }
        }
    }

    fn parse_word(&mut self) -> TokenKind {
        let start = self.offset();
        self.consume_while(|ch| ch.is_ascii_alphanumeric() || ch == '_');
        let end = self.offset();
        let lexeme = &self.code[start..end];
        keyword(lexeme).unwrap_or_else(|| TokenKind::Ident(lexeme.to_string()))
    }

    // 42, 0x2A, 1.5, 2.0f
    fn parse_number(&mut self) -> TokenKind {
        let start = self.offset();
        if self.peek_nth(0) == Some('0') && matches!(self.peek_nth(1), Some('x' | 'X')) {
            self.consume();
            self.consume();
            let digits = self.offset();
            self.consume_while(|ch| ch.is_ascii_hexdigit());
            let end = self.offset();
            return match i64::from_str_radix(&self.code[digits..end], 16) {
                Ok(num) => TokenKind::Int(num),
                Err(_) => {
                    TokenKind::Error(format!("invalid hex literal `{}`", &self.code[start..end]))
                }
            };
        }

        self.consume_while(|ch| ch.is_ascii_digit());
        if self.peek_nth(0) != Some('.') {
            let end = self.offset();
            return match self.code[start..end].parse::<i64>() {
                Ok(num) => TokenKind::Int(num),
                Err(_) => {
                    let text = &self.code[start..end];
                    TokenKind::Error(format!("integer literal `{}` is too large", text))
                }
            };
        }

        self.consume(); // consume '.'
        self.consume_while(|ch| ch.is_ascii_digit());
        let end = self.offset();
        let lexeme = &self.code[start..end];
        if matches!(self.peek_nth(0), Some('f' | 'F')) {
            self.consume();
        }
        match lexeme.parse::<f64>() {
            Ok(num) => TokenKind::Float(num),
            Err(_) => TokenKind::Error(format!("invalid float literal `{lexeme}`")),
        }
    }

    fn escape(&mut self) -> Result<char, String> {
        match self.consume() {
            Some('n') => Ok('\n'),
            Some('t') => Ok('\t'),
            Some('r') => Ok('\r'),
            Some('\\') => Ok('\\'),
            Some('"') => Ok('"'),
            Some('\'') => Ok('\''),
            Some('0') => Ok('\0'),
            Some(ch) => Err(format!("unknown escape sequence `\\{ch}`")),
            None => Err("unterminated escape sequence".to_string()),
        }
    }

    // 'a', '\n'
    fn parse_char(&mut self) -> TokenKind {
        self.consume(); // consume opening '
        let value = match self.consume() {
            Some('\'') => return TokenKind::Error("empty character literal".to_string()),
            Some('\n') | None => {
                return TokenKind::Error("unterminated character literal".to_string())
            }
            Some('\\') => self.escape(),
            Some(ch) => Ok(ch),
        };
        if self.peek_nth(0) != Some('\'') {
            return TokenKind::Error("unterminated character literal".to_string());
        }
        self.consume(); // consume closing '
        match value {
            Ok(ch) => TokenKind::Char(ch),
            Err(msg) => TokenKind::Error(msg),
        }
    }

    // "hoge\nfuga"
    fn parse_text(&mut self) -> TokenKind {
        self.consume(); // consume opening "
        let mut text = String::new();
        let mut error = None;
        loop {
            match self.peek_nth(0) {
                Some('"') => {
                    self.consume();
                    break;
                }
                Some('\n') | None => {
                    return TokenKind::Error("unterminated string literal".to_string())
                }
                Some('\\') => {
                    self.consume();
                    match self.escape() {
                        Ok(ch) => text.push(ch),
                        Err(msg) => error = error.or(Some(msg)),
                    }
                }
                Some(ch) => {
                    self.consume();
                    text.push(ch);
                }
            }
        }
        match error {
            Some(msg) => TokenKind::Error(msg),
            None => TokenKind::Text(text),
        }
    }
}

/// Operator starting at `ch0` and its length in characters
fn operator(ch0: char, ch1: Option<char>, ch2: Option<char>) -> Option<(TokenKind, usize)> {
    if let (Some(ch1), Some(ch2)) = (ch1, ch2) {
        if let Some(kind) = triple_char_token(ch0, ch1, ch2) {
            return Some((kind, 3));
        }
    }
    if let Some(ch1) = ch1 {
        if let Some(kind) = double_char_token(ch0, ch1) {
            return Some((kind, 2));
        }
    }
    single_char_token(ch0).map(|kind| (kind, 1))
}

fn triple_char_token(ch0: char, ch1: char, ch2: char) -> Option<TokenKind> {
    match (ch0, ch1, ch2) {
        ('<', '<', '=') => Some(TokenKind::LAngleLAngleEqual),
        ('>', '>', '=') => Some(TokenKind::RAngleRAngleEqual),
        _ => None,
    }
}

fn double_char_token(ch0: char, ch1: char) -> Option<TokenKind> {
    match (ch0, ch1) {
        ('+', '+') => Some(TokenKind::PlusPlus),
        ('-', '-') => Some(TokenKind::MinusMinus),
        ('+', '=') => Some(TokenKind::PlusEqual),
        ('-', '=') => Some(TokenKind::MinusEqual),
        ('*', '=') => Some(TokenKind::StarEqual),
        ('/', '=') => Some(TokenKind::SlashEqual),
        ('%', '=') => Some(TokenKind::PercentEqual),
        ('&', '=') => Some(TokenKind::AmpEqual),
        ('|', '=') => Some(TokenKind::PipeEqual),
        ('^', '=') => Some(TokenKind::CaretEqual),
        ('=', '=') => Some(TokenKind::EqualEqual),
        ('!', '=') => Some(TokenKind::ExclEqual),
        ('<', '=') => Some(TokenKind::LAngleEqual),
        ('>', '=') => Some(TokenKind::RAngleEqual),
        ('<', '<') => Some(TokenKind::LAngleLAngle),
        ('>', '>') => Some(TokenKind::RAngleRAngle),
        ('&', '&') => Some(TokenKind::AmpAmp),
        ('|', '|') => Some(TokenKind::PipePipe),
        ('-', '>') => Some(TokenKind::Arrow),
        _ => None,
    }
}

fn single_char_token(ch: char) -> Option<TokenKind> {
    match ch {
        '=' => Some(TokenKind::Equal),
        '+' => Some(TokenKind::Plus),
        '-' => Some(TokenKind::Minus),
        '*' => Some(TokenKind::Star),
        '/' => Some(TokenKind::Slash),
        '%' => Some(TokenKind::Percent),
        '&' => Some(TokenKind::Ampasand),
        '|' => Some(TokenKind::Pipe),
        '^' => Some(TokenKind::Caret),
        '!' => Some(TokenKind::Excl),
        '~' => Some(TokenKind::Tilde),
        '?' => Some(TokenKind::Question),
        ':' => Some(TokenKind::Colon),
        ';' => Some(TokenKind::Semicolon),
        ',' => Some(TokenKind::Comma),
        '.' => Some(TokenKind::Period),
        '(' => Some(TokenKind::LParen),
        ')' => Some(TokenKind::RParen),
        '[' => Some(TokenKind::LBracket),
        ']' => Some(TokenKind::RBracket),
        '{' => Some(TokenKind::LCurly),
        '}' => Some(TokenKind::RCurly),
        '<' => Some(TokenKind::LAngle),
        '>' => Some(TokenKind::RAngle),
        _ => None,
    }
}

fn keyword(s: &str) -> Option<TokenKind> {
    match s {
        "int" => Some(TokenKind::KwInt),
        "char" => Some(TokenKind::KwChar),
        "float" => Some(TokenKind::KwFloat),
        "double" => Some(TokenKind::KwDouble),
        "void" => Some(TokenKind::KwVoid),
        "bool" => Some(TokenKind::KwBool),
        "if" => Some(TokenKind::KwIf),
        "else" => Some(TokenKind::KwElse),
        "while" => Some(TokenKind::KwWhile),
        "for" => Some(TokenKind::KwFor),
        "return" => Some(TokenKind::KwReturn),
        "break" => Some(TokenKind::KwBreak),
        "continue" => Some(TokenKind::KwContinue),
        "struct" => Some(TokenKind::KwStruct),
        "enum" => Some(TokenKind::KwEnum),
        "typedef" => Some(TokenKind::KwTypedef),
        "switch" => Some(TokenKind::KwSwitch),
        "case" => Some(TokenKind::KwCase),
        "default" => Some(TokenKind::KwDefault),
        "true" => Some(TokenKind::KwTrue),
        "false" => Some(TokenKind::KwFalse),
        _ => None,
    }
}
