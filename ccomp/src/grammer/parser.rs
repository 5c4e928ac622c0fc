use super::ast::{Ast, BinaryOp, NodeId, NodeKind, Param, PostfixOp, Type, UnaryOp};
use super::parsercore::Parser;
use super::token::{Pos, Token, TokenKind, TokenKind::*};
use crate::error::ParseError;
use crate::{check, expect, optional, recover, repeat};

/// Parse a token stream. Any syntax error discards the tree.
pub fn parse(tokens: Vec<Token>) -> Result<Ast, Vec<ParseError>> {
    Parser::new(tokens).parse()
}

impl Parser {
    pub fn parse(mut self) -> Result<Ast, Vec<ParseError>> {
        let program = self.parse_program();
        self.ast.set_root(program);
        self.finish()
    }
}

// ----------------------------------------------------------------------------
// Declarations
// ----------------------------------------------------------------------------

impl Parser {
    /// program = { decl }
    fn parse_program(&mut self) -> NodeId {
        let pos = self.peek().pos;
        let mut decls = Vec::new();
        while !self.at_eof() {
            let mark = self.mark();
            match self.parse_decl() {
                Ok(decl) => decls.push(decl),
                Err(err) => recover!(self, err, mark),
            }
        }
        self.ast.push(NodeKind::Program(decls), pos)
    }

    fn at_type(&self) -> bool {
        match &self.peek().kind {
            KwInt | KwChar | KwFloat | KwDouble | KwVoid | KwBool | KwStruct | KwEnum => true,
            Ident(name) => self.typedefs.contains_key(name),
            _ => false,
        }
    }

    /// `struct Name {` or `enum Name {`
    fn at_tagged_body(&self) -> bool {
        matches!(self.peek().kind, KwStruct | KwEnum)
            && matches!(self.peek_nth(1).kind, Ident(_))
            && self.peek_nth(2).kind == LCurly
    }

    /// decl = typedef | tagged-decl | func-decl | var-decl
    fn parse_decl(&mut self) -> Result<NodeId, ParseError> {
        if check!(self, KwTypedef) {
            return self.parse_typedef();
        }
        if self.at_tagged_body() {
            return self.parse_tagged_decl();
        }
        if !self.at_type() {
            return Err(ParseError::new("declaration", self.peek()));
        }

        // type ident "(" starts a function, anything else is a variable
        let mark = self.mark();
        let pos = self.peek().pos;
        let ret = self.parse_type()?;
        let name = self.parse_ident()?;
        if check!(self, LParen) {
            return self.parse_function(ret, name, pos);
        }
        self.rewind(mark);
        self.parse_var_decl()
    }

    /// typedef = "typedef" type ident ";"
    fn parse_typedef(&mut self) -> Result<NodeId, ParseError> {
        let pos = expect!(self, KwTypedef)?.pos;
        let ty = self.parse_type()?;
        let name = self.parse_ident()?;
        expect!(self, Semicolon)?;
        self.typedefs.insert(name.clone(), ty.clone());
        Ok(self.ast.push(NodeKind::Typedef(name, ty), pos))
    }

    /// tagged-decl = ( "struct" | "enum" ) ident "{" ... "}" ";"
    /// The body is skipped with brace matching; members are not recorded.
    fn parse_tagged_decl(&mut self) -> Result<NodeId, ParseError> {
        let keyword = self.next();
        let name = self.parse_ident()?;
        expect!(self, LCurly)?;
        let mut depth = 1;
        while depth > 0 {
            let token = self.next();
            match token.kind {
                LCurly => depth += 1,
                RCurly => depth -= 1,
                Eof => return Err(ParseError::new("`}`", &token)),
                _ => {}
            }
        }
        expect!(self, Semicolon)?;
        let kind = match keyword.kind {
            KwStruct => NodeKind::Struct(name),
            _ => NodeKind::Enum(name),
        };
        Ok(self.ast.push(kind, keyword.pos))
    }

    /// func-decl = type ident "(" ( "void" | [ param { "," param } ] ) ")" ( block | ";" )
    fn parse_function(&mut self, ret: Type, name: String, pos: Pos) -> Result<NodeId, ParseError> {
        expect!(self, LParen)?;
        let params = if check!(self, KwVoid) && self.peek_nth(1).kind == RParen {
            self.next();
            Vec::new()
        } else {
            repeat!(self, self.parse_param(), Comma, RParen)
        };
        expect!(self, RParen)?;
        let body = match optional!(self, Semicolon) {
            Some(_) => None,
            None => Some(self.parse_block()?),
        };
        Ok(self.ast.push(NodeKind::Function { name, ret, params, body }, pos))
    }

    /// param = type [ ident ] [ "[" [ num ] "]" ]
    fn parse_param(&mut self) -> Result<Param, ParseError> {
        let mut ty = self.parse_type()?;
        let name = match check!(self, Ident(_)) {
            true => Some(self.parse_ident()?),
            false => None,
        };
        if optional!(self, LBracket).is_some() {
            optional!(self, Int(_));
            expect!(self, RBracket)?;
            ty = Type::pointer(ty);
        }
        Ok(Param { name, ty })
    }

    /// var-decl = base-type declarator { "," declarator } ";"
    fn parse_var_decl(&mut self) -> Result<NodeId, ParseError> {
        let pos = self.peek().pos;
        let base = self.parse_base_type()?;
        let mut decls = repeat!(self, self.parse_declarator(&base), Comma, Semicolon);
        expect!(self, Semicolon)?;
        match decls.len() {
            1 => Ok(decls.remove(0)),
            _ => Ok(self.ast.push(NodeKind::Decls(decls), pos)),
        }
    }

    /// declarator = { "*" } ident [ "[" [ num ] "]" ] [ "=" init ]
    fn parse_declarator(&mut self, base: &Type) -> Result<NodeId, ParseError> {
        let ty = self.parse_stars(base.clone());
        let pos = self.peek().pos;
        let name = self.parse_ident()?;
        let size = optional!(self, LBracket, {
            let size = match self.peek().kind.clone() {
                Int(n) => {
                    self.next();
                    Some(n as usize)
                }
                _ => None,
            };
            expect!(self, RBracket)?;
            size
        });
        let init = optional!(self, Equal, self.parse_init()?);

        let ty = match size {
            None => ty,
            Some(Some(n)) => Type::Array(Box::new(ty), n),
            // int a[] = { ... } / char s[] = "..."
            Some(None) => match init.map(|id| self.ast.kind(id)) {
                Some(NodeKind::InitList(items)) => Type::Array(Box::new(ty), items.len()),
                Some(NodeKind::StrLit(text)) => Type::Array(Box::new(ty), text.chars().count() + 1),
                _ => return Err(ParseError::new("array size", self.peek())),
            },
        };
        Ok(self.ast.push(NodeKind::Var { name, ty, init }, pos))
    }

    /// init = assign | "{" [ assign { "," assign } ] "}"
    fn parse_init(&mut self) -> Result<NodeId, ParseError> {
        if !check!(self, LCurly) {
            return self.parse_assign();
        }
        let pos = expect!(self, LCurly)?.pos;
        let items = repeat!(self, self.parse_assign(), Comma, RCurly);
        expect!(self, RCurly)?;
        Ok(self.ast.push(NodeKind::InitList(items), pos))
    }

    /// base-type = "int" | "char" | "float" | "double" | "void" | "bool"
    ///           | "struct" ident | "enum" ident | typedef-name
    fn parse_base_type(&mut self) -> Result<Type, ParseError> {
        let token = self.peek().clone();
        let ty = match &token.kind {
            KwInt => Type::Int,
            KwChar => Type::Char,
            KwFloat => Type::Float,
            KwDouble => Type::Double,
            KwVoid => Type::Void,
            KwBool => Type::Bool,
            KwStruct => {
                self.next();
                return Ok(Type::Struct(self.parse_ident()?));
            }
            KwEnum => {
                self.next();
                return Ok(Type::Enum(self.parse_ident()?));
            }
            Ident(name) => match self.typedefs.get(name) {
                Some(ty) => ty.clone(),
                None => return Err(ParseError::new("type", &token)),
            },
            _ => return Err(ParseError::new("type", &token)),
        };
        self.next();
        Ok(ty)
    }

    /// type = base-type { "*" }
    fn parse_type(&mut self) -> Result<Type, ParseError> {
        let base = self.parse_base_type()?;
        Ok(self.parse_stars(base))
    }

    fn parse_stars(&mut self, mut ty: Type) -> Type {
        while optional!(self, Star).is_some() {
            ty = Type::pointer(ty);
        }
        ty
    }

    /// ident = ( "A".."Z" | "a".."z" | "_" ) { "0".."9" | "A".."Z" | "a".."z" | "_" }
    fn parse_ident(&mut self) -> Result<String, ParseError> {
        match &self.peek().kind {
            Ident(name) => {
                let name = name.clone();
                self.next();
                Ok(name)
            }
            _ => Err(ParseError::new("identifier", self.peek())),
        }
    }
}

// ----------------------------------------------------------------------------
// Statements
// ----------------------------------------------------------------------------

impl Parser {
    /// block = "{" { stmt } "}"
    fn parse_block(&mut self) -> Result<NodeId, ParseError> {
        let pos = expect!(self, LCurly)?.pos;
        let stmts = self.parse_stmts(|kind| matches!(kind, RCurly));
        expect!(self, RCurly)?;
        Ok(self.ast.push(NodeKind::Block(stmts), pos))
    }

    /// { stmt } up to a terminator, resynchronizing after each error
    fn parse_stmts<F: Fn(&TokenKind) -> bool>(&mut self, stop: F) -> Vec<NodeId> {
        let mut stmts = Vec::new();
        while !self.at_eof() && !stop(&self.peek().kind) {
            let mark = self.mark();
            match self.parse_stmt() {
                Ok(stmt) => stmts.push(stmt),
                Err(err) => recover!(self, err, mark),
            }
        }
        stmts
    }

    /// stmt = block | if-stmt | while-stmt | for-stmt | switch-stmt | return-stmt
    ///      | "break" ";" | "continue" ";" | typedef | tagged-decl | var-decl | [ expr ] ";"
    fn parse_stmt(&mut self) -> Result<NodeId, ParseError> {
        let pos = self.peek().pos;
        match self.peek().kind.clone() {
            // Block statement: "{" { stmt } "}"
            LCurly => self.parse_block(),

            // Conditional statement: "if" "(" expr ")" stmt [ "else" stmt ]
            KwIf => {
                expect!(self, KwIf)?;
                expect!(self, LParen)?;
                let cond = self.parse_expr()?;
                expect!(self, RParen)?;
                let then = self.parse_stmt()?;
                let els = optional!(self, KwElse, self.parse_stmt()?);
                Ok(self.ast.push(NodeKind::If(cond, then, els), pos))
            }

            // Loop statement: "while" "(" expr ")" stmt
            KwWhile => {
                expect!(self, KwWhile)?;
                expect!(self, LParen)?;
                let cond = self.parse_expr()?;
                expect!(self, RParen)?;
                let body = self.parse_stmt()?;
                Ok(self.ast.push(NodeKind::While(cond, body), pos))
            }

            KwFor => self.parse_for(),
            KwSwitch => self.parse_switch(),

            // Return statement: "return" [ expr ] ";"
            KwReturn => {
                expect!(self, KwReturn)?;
                let value = match check!(self, Semicolon) {
                    true => None,
                    false => Some(self.parse_expr()?),
                };
                expect!(self, Semicolon)?;
                Ok(self.ast.push(NodeKind::Return(value), pos))
            }

            KwBreak => {
                expect!(self, KwBreak)?;
                expect!(self, Semicolon)?;
                Ok(self.ast.push(NodeKind::Break, pos))
            }

            KwContinue => {
                expect!(self, KwContinue)?;
                expect!(self, Semicolon)?;
                Ok(self.ast.push(NodeKind::Continue, pos))
            }

            KwTypedef => self.parse_typedef(),
            _ if self.at_tagged_body() => self.parse_tagged_decl(),
            _ if self.at_type() => self.parse_var_decl(),

            // Empty statement: ";"
            Semicolon => {
                expect!(self, Semicolon)?;
                Ok(self.ast.push(NodeKind::Expr(None), pos))
            }

            // Expression statement: expr ";"
            _ => {
                let expr = self.parse_expr()?;
                expect!(self, Semicolon)?;
                Ok(self.ast.push(NodeKind::Expr(Some(expr)), pos))
            }
        }
    }

    /// for-stmt = "for" "(" ( var-decl | [ expr ] ";" ) [ expr ] ";" [ expr ] ")" stmt
    fn parse_for(&mut self) -> Result<NodeId, ParseError> {
        let pos = expect!(self, KwFor)?.pos;
        expect!(self, LParen)?;
        let init = if optional!(self, Semicolon).is_some() {
            None
        } else if self.at_type() {
            Some(self.parse_var_decl()?)
        } else {
            let init = self.parse_expr()?;
            expect!(self, Semicolon)?;
            Some(init)
        };
        let cond = match check!(self, Semicolon) {
            true => None,
            false => Some(self.parse_expr()?),
        };
        expect!(self, Semicolon)?;
        let step = match check!(self, RParen) {
            true => None,
            false => Some(self.parse_expr()?),
        };
        expect!(self, RParen)?;
        let body = self.parse_stmt()?;
        Ok(self.ast.push(NodeKind::For { init, cond, step, body }, pos))
    }

    /// switch-stmt = "switch" "(" expr ")" "{" { case } "}"
    fn parse_switch(&mut self) -> Result<NodeId, ParseError> {
        let pos = expect!(self, KwSwitch)?.pos;
        expect!(self, LParen)?;
        let cond = self.parse_expr()?;
        expect!(self, RParen)?;
        expect!(self, LCurly)?;
        let cases = repeat!(self, self.parse_case(), RCurly);
        expect!(self, RCurly)?;
        Ok(self.ast.push(NodeKind::Switch(cond, cases), pos))
    }

    /// case = ( "case" ternary | "default" ) ":" { stmt }
    fn parse_case(&mut self) -> Result<NodeId, ParseError> {
        let pos = self.peek().pos;
        let value = match self.peek().kind.clone() {
            KwCase => {
                self.next();
                Some(self.parse_ternary()?)
            }
            KwDefault => {
                self.next();
                None
            }
            _ => return Err(ParseError::new("`case` or `default`", self.peek())),
        };
        expect!(self, Colon)?;
        let body = self.parse_stmts(|kind| matches!(kind, KwCase | KwDefault | RCurly));
        Ok(self.ast.push(NodeKind::Case(value, body), pos))
    }
}

// ----------------------------------------------------------------------------
// Expressions
// ----------------------------------------------------------------------------

impl Parser {
    /// expr = assign
    fn parse_expr(&mut self) -> Result<NodeId, ParseError> {
        self.parse_assign()
    }

    /// assign = ternary [ assign-op assign ]
    /// assign-op = "=" | "+=" | "-=" | "*=" | "/=" | "%=" | "&=" | "|=" | "^=" | "<<=" | ">>="
    fn parse_assign(&mut self) -> Result<NodeId, ParseError> {
        let lhs = self.parse_ternary()?;
        let op = match self.peek().kind.clone() {
            Equal => None,
            PlusEqual => Some(BinaryOp::Add),
            MinusEqual => Some(BinaryOp::Sub),
            StarEqual => Some(BinaryOp::Mul),
            SlashEqual => Some(BinaryOp::Div),
            PercentEqual => Some(BinaryOp::Mod),
            AmpEqual => Some(BinaryOp::And),
            PipeEqual => Some(BinaryOp::Or),
            CaretEqual => Some(BinaryOp::Xor),
            LAngleLAngleEqual => Some(BinaryOp::Shl),
            RAngleRAngleEqual => Some(BinaryOp::Shr),
            _ => return Ok(lhs),
        };
        let pos = self.next().pos;
        let rhs = self.parse_assign()?;
        Ok(self.ast.push(NodeKind::Assign(op, lhs, rhs), pos))
    }

    /// ternary = logor [ "?" expr ":" ternary ]
    fn parse_ternary(&mut self) -> Result<NodeId, ParseError> {
        let cond = self.parse_logor()?;
        match optional!(self, Question) {
            Some(question) => {
                let then = self.parse_expr()?;
                expect!(self, Colon)?;
                let els = self.parse_ternary()?;
                Ok(self.ast.push(NodeKind::Ternary(cond, then, els), question.pos))
            }
            None => Ok(cond),
        }
    }

    /// Left-associative level: operand { op operand }
    fn parse_binary(
        &mut self,
        ops: &[(TokenKind, BinaryOp)],
        operand: fn(&mut Self) -> Result<NodeId, ParseError>,
    ) -> Result<NodeId, ParseError> {
        let mut lhs = operand(self)?;
        loop {
            let found = ops.iter().find(|(kind, _)| *kind == self.peek().kind);
            let Some(&(_, op)) = found else {
                return Ok(lhs);
            };
            let pos = self.next().pos;
            let rhs = operand(self)?;
            lhs = self.ast.push(NodeKind::Binary(op, lhs, rhs), pos);
        }
    }

    /// logor = logand { "||" logand }
    fn parse_logor(&mut self) -> Result<NodeId, ParseError> {
        self.parse_binary(&[(PipePipe, BinaryOp::LogOr)], Self::parse_logand)
    }

    /// logand = bitor { "&&" bitor }
    fn parse_logand(&mut self) -> Result<NodeId, ParseError> {
        self.parse_binary(&[(AmpAmp, BinaryOp::LogAnd)], Self::parse_bitor)
    }

    /// bitor = bitxor { "|" bitxor }
    fn parse_bitor(&mut self) -> Result<NodeId, ParseError> {
        self.parse_binary(&[(Pipe, BinaryOp::Or)], Self::parse_bitxor)
    }

    /// bitxor = bitand { "^" bitand }
    fn parse_bitxor(&mut self) -> Result<NodeId, ParseError> {
        self.parse_binary(&[(Caret, BinaryOp::Xor)], Self::parse_bitand)
    }

    /// bitand = eq { "&" eq }
    fn parse_bitand(&mut self) -> Result<NodeId, ParseError> {
        self.parse_binary(&[(Ampasand, BinaryOp::And)], Self::parse_eq)
    }

    /// eq = relat { ( "==" | "!=" ) relat }
    fn parse_eq(&mut self) -> Result<NodeId, ParseError> {
        let ops = [(EqualEqual, BinaryOp::Eq), (ExclEqual, BinaryOp::Ne)];
        self.parse_binary(&ops, Self::parse_relat)
    }

    /// relat = shift { ( "<" | "<=" | ">" | ">=" ) shift }
    fn parse_relat(&mut self) -> Result<NodeId, ParseError> {
        let ops = [
            (LAngle, BinaryOp::Lt),
            (LAngleEqual, BinaryOp::Le),
            (RAngle, BinaryOp::Gt),
            (RAngleEqual, BinaryOp::Ge),
        ];
        self.parse_binary(&ops, Self::parse_shift)
    }

    /// shift = add { ( "<<" | ">>" ) add }
    fn parse_shift(&mut self) -> Result<NodeId, ParseError> {
        let ops = [(LAngleLAngle, BinaryOp::Shl), (RAngleRAngle, BinaryOp::Shr)];
        self.parse_binary(&ops, Self::parse_add)
    }

    /// add = mul { ( "+" | "-" ) mul }
    fn parse_add(&mut self) -> Result<NodeId, ParseError> {
        let ops = [(Plus, BinaryOp::Add), (Minus, BinaryOp::Sub)];
        self.parse_binary(&ops, Self::parse_mul)
    }

    /// mul = unary { ( "*" | "/" | "%" ) unary }
    fn parse_mul(&mut self) -> Result<NodeId, ParseError> {
        let ops = [(Star, BinaryOp::Mul), (Slash, BinaryOp::Div), (Percent, BinaryOp::Mod)];
        self.parse_binary(&ops, Self::parse_unary)
    }

    /// unary = ( "+" | "-" | "!" | "~" | "*" | "&" | "++" | "--" ) unary | postfix
    fn parse_unary(&mut self) -> Result<NodeId, ParseError> {
        let op = match self.peek().kind.clone() {
            Plus => UnaryOp::Pos,
            Minus => UnaryOp::Neg,
            Excl => UnaryOp::Not,
            Tilde => UnaryOp::BitNot,
            Star => UnaryOp::Deref,
            Ampasand => UnaryOp::Addr,
            PlusPlus => UnaryOp::PreInc,
            MinusMinus => UnaryOp::PreDec,
            _ => return self.parse_postfix(),
        };
        let pos = self.next().pos;
        let operand = self.parse_unary()?;
        Ok(self.ast.push(NodeKind::Unary(op, operand), pos))
    }

    /// postfix = primary { "(" [ assign { "," assign } ] ")" | "[" expr "]"
    ///                   | ( "." | "->" ) ident | "++" | "--" }
    fn parse_postfix(&mut self) -> Result<NodeId, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            let Token { kind, pos, .. } = self.peek().clone();
            let node = match kind {
                // Function call: expr "(" [ expr { "," expr } ] ")"
                LParen => {
                    self.next();
                    let args = repeat!(self, self.parse_assign(), Comma, RParen);
                    expect!(self, RParen)?;
                    NodeKind::Call(expr, args)
                }

                // Array indexing: expr "[" expr "]"
                LBracket => {
                    self.next();
                    let index = self.parse_expr()?;
                    expect!(self, RBracket)?;
                    NodeKind::Index(expr, index)
                }

                // Member access: expr "." ident | expr "->" ident
                Period | Arrow => {
                    self.next();
                    let field = self.parse_ident()?;
                    NodeKind::Member(expr, field, kind == Arrow)
                }

                PlusPlus => {
                    self.next();
                    NodeKind::Postfix(PostfixOp::Inc, expr)
                }
                MinusMinus => {
                    self.next();
                    NodeKind::Postfix(PostfixOp::Dec, expr)
                }

                _ => return Ok(expr),
            };
            expr = self.ast.push(node, pos);
        }
    }

    /// primary = int-lit | float-lit | char-lit | string-lit
    ///         | "true" | "false" | ident | "(" expr ")"
    fn parse_primary(&mut self) -> Result<NodeId, ParseError> {
        let token = self.peek().clone();
        let node = match &token.kind {
            Int(v) => NodeKind::IntLit(*v),
            Float(v) => NodeKind::FloatLit(*v),
            Char(ch) => NodeKind::CharLit(*ch),
            Text(text) => NodeKind::StrLit(text.clone()),
            KwTrue => NodeKind::BoolLit(true),
            KwFalse => NodeKind::BoolLit(false),
            Ident(name) => NodeKind::Ident(name.clone()),

            // Parenthesized expression: "(" expr ")"
            LParen => {
                self.next();
                let inner = self.parse_expr()?;
                expect!(self, RParen)?;
                return Ok(inner);
            }

            _ => return Err(ParseError::new("expression", &token)),
        };
        self.next();
        Ok(self.ast.push(node, token.pos))
    }
}
