use super::token::Pos;
use std::fmt;
use strum::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

/// All nodes of one compilation unit. Children are referenced by id.
#[derive(Debug, Clone, Default)]
pub struct Ast {
    nodes: Vec<Node>,
    root: Option<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub pos: Pos,
    /// Filled in by the type checker
    pub ty: Option<Type>,
}

impl Ast {
    pub fn new() -> Self {
        Ast::default()
    }

    pub fn push(&mut self, kind: NodeKind, pos: Pos) -> NodeId {
        self.nodes.push(Node { kind, pos, ty: None });
        NodeId(self.nodes.len() - 1)
    }

    pub fn set_root(&mut self, id: NodeId) {
        self.root = Some(id);
    }

    /// The `Program` node. An empty arena has an empty program.
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn pos(&self, id: NodeId) -> Pos {
        self.nodes[id.0].pos
    }

    pub fn ty(&self, id: NodeId) -> Option<&Type> {
        self.nodes[id.0].ty.as_ref()
    }

    pub fn set_ty(&mut self, id: NodeId, ty: Type) {
        self.nodes[id.0].ty = Some(ty);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Top level declarations in source order
    pub fn decls(&self) -> &[NodeId] {
        match self.root.map(|id| self.kind(id)) {
            Some(NodeKind::Program(decls)) => decls,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Void,                            // "void"
    Int,                             // "int"
    Char,                            // "char"
    Float,                           // "float"
    Double,                          // "double"
    Bool,                            // "bool"
    Pointer(Box<Type>),              // type "*"
    Array(Box<Type>, usize),         // type ident "[" num "]"
    Struct(String),                  // "struct" ident
    Enum(String),                    // "enum" ident
    Function(Box<Type>, Vec<Type>),  // type ident "(" params ")"
}

impl Type {
    pub fn pointer(to: Type) -> Type {
        Type::Pointer(Box::new(to))
    }

    /// Element type of a pointer or array
    pub fn elem(&self) -> Option<&Type> {
        match self {
            Type::Pointer(elem) | Type::Array(elem, _) => Some(elem),
            _ => None,
        }
    }

    pub fn is_pointer_like(&self) -> bool {
        matches!(self, Type::Pointer(_) | Type::Array(..))
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Type::Float | Type::Double)
    }

    /// int, char, bool and enum values all live in one word
    pub fn is_integer(&self) -> bool {
        matches!(self, Type::Int | Type::Char | Type::Bool | Type::Enum(_))
    }

    /// Exactly `int`. Enum constants are ints.
    pub fn is_int(&self) -> bool {
        matches!(self, Type::Int | Type::Enum(_))
    }

    /// Operand of a compound assignment
    pub fn is_arithmetic(&self) -> bool {
        matches!(self, Type::Int | Type::Enum(_) | Type::Char | Type::Float)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float()
    }

    /// Usable as a condition
    pub fn is_scalar(&self) -> bool {
        self.is_numeric() || self.is_pointer_like()
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Int => write!(f, "int"),
            Type::Char => write!(f, "char"),
            Type::Float => write!(f, "float"),
            Type::Double => write!(f, "double"),
            Type::Bool => write!(f, "bool"),
            Type::Pointer(elem) => write!(f, "{}*", elem),
            Type::Array(elem, size) => write!(f, "{}[{}]", elem, size),
            Type::Struct(name) => write!(f, "struct {}", name),
            Type::Enum(name) => write!(f, "enum {}", name),
            Type::Function(ret, params) => {
                let params = params.iter().map(|p| p.to_string()).collect::<Vec<_>>();
                write!(f, "{}({})", ret, params.join(", "))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Option<String>,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Program(Vec<NodeId>), // { decl }

    // Declarations
    Function {
        name: String,
        ret: Type,
        params: Vec<Param>,
        body: Option<NodeId>,
    }, // type ident "(" [ param { "," param } ] ")" ( block | ";" )
    Var {
        name: String,
        ty: Type,
        init: Option<NodeId>,
    }, // ident [ "[" [ num ] "]" ] [ "=" init ]
    Decls(Vec<NodeId>),   // type declarator "," declarator { "," declarator } ";"
    Struct(String),       // "struct" ident "{" ... "}" ";"
    Enum(String),         // "enum" ident "{" ... "}" ";"
    Typedef(String, Type), // "typedef" type ident ";"

    // Statements
    Block(Vec<NodeId>),                           // "{" { stmt } "}"
    If(NodeId, NodeId, Option<NodeId>),           // "if" "(" expr ")" stmt [ "else" stmt ]
    While(NodeId, NodeId),                        // "while" "(" expr ")" stmt
    For {
        init: Option<NodeId>,
        cond: Option<NodeId>,
        step: Option<NodeId>,
        body: NodeId,
    }, // "for" "(" [ decl | expr ] ";" [ expr ] ";" [ expr ] ")" stmt
    Switch(NodeId, Vec<NodeId>),                  // "switch" "(" expr ")" "{" { case } "}"
    Case(Option<NodeId>, Vec<NodeId>),            // ( "case" expr | "default" ) ":" { stmt }
    Return(Option<NodeId>),                       // "return" [ expr ] ";"
    Break,                                        // "break" ";"
    Continue,                                     // "continue" ";"
    Expr(Option<NodeId>),                         // [ expr ] ";"

    // Expressions
    IntLit(i64),
    FloatLit(f64),
    CharLit(char),
    StrLit(String),
    BoolLit(bool),
    Ident(String),
    Binary(BinaryOp, NodeId, NodeId),             // expr binop expr
    Unary(UnaryOp, NodeId),                       // unop expr
    Postfix(PostfixOp, NodeId),                   // expr ( "++" | "--" )
    Assign(Option<BinaryOp>, NodeId, NodeId),     // expr ( "=" | binop "=" ) expr
    Ternary(NodeId, NodeId, NodeId),              // expr "?" expr ":" expr
    Call(NodeId, Vec<NodeId>),                    // expr "(" [ expr { "," expr } ] ")"
    Index(NodeId, NodeId),                        // expr "[" expr "]"
    Member(NodeId, String, bool),                 // expr ( "." | "->" ) ident
    InitList(Vec<NodeId>),                        // "{" [ expr { "," expr } ] "}"
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum BinaryOp {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Sub,
    #[strum(serialize = "*")]
    Mul,
    #[strum(serialize = "/")]
    Div,
    #[strum(serialize = "%")]
    Mod,
    #[strum(serialize = "&")]
    And,
    #[strum(serialize = "|")]
    Or,
    #[strum(serialize = "^")]
    Xor,
    #[strum(serialize = "<<")]
    Shl,
    #[strum(serialize = ">>")]
    Shr,
    #[strum(serialize = "==")]
    Eq,
    #[strum(serialize = "!=")]
    Ne,
    #[strum(serialize = "<")]
    Lt,
    #[strum(serialize = "<=")]
    Le,
    #[strum(serialize = ">")]
    Gt,
    #[strum(serialize = ">=")]
    Ge,
    #[strum(serialize = "&&")]
    LogAnd,
    #[strum(serialize = "||")]
    LogOr,
}

impl BinaryOp {
    pub fn is_comparison(&self) -> bool {
        use BinaryOp::*;
        matches!(self, Eq | Ne | Lt | Le | Gt | Ge)
    }

    pub fn is_bitwise(&self) -> bool {
        use BinaryOp::*;
        matches!(self, And | Or | Xor | Shl | Shr)
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::LogAnd | BinaryOp::LogOr)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum UnaryOp {
    #[strum(serialize = "+")]
    Pos,
    #[strum(serialize = "-")]
    Neg,
    #[strum(serialize = "!")]
    Not,
    #[strum(serialize = "~")]
    BitNot,
    #[strum(serialize = "*")]
    Deref,
    #[strum(serialize = "&")]
    Addr,
    #[strum(serialize = "++")]
    PreInc,
    #[strum(serialize = "--")]
    PreDec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum PostfixOp {
    #[strum(serialize = "++")]
    Inc,
    #[strum(serialize = "--")]
    Dec,
}
