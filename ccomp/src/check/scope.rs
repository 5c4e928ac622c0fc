use crate::grammer::ast::{NodeId, Type};
use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    Function,
    Struct,
    Enum,
    Typedef,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub ty: Type,
    /// Declaring node. `None` for builtins.
    pub node: Option<NodeId>,
}

impl Symbol {
    pub fn new(name: impl Into<String>, kind: SymbolKind, ty: Type, node: Option<NodeId>) -> Self {
        Symbol { name: name.into(), kind, ty, node }
    }

    /// Struct and enum tags live apart from ordinary names.
    pub fn key(&self) -> String {
        match self.kind {
            SymbolKind::Struct => format!("struct {}", self.name),
            SymbolKind::Enum => format!("enum {}", self.name),
            _ => self.name.clone(),
        }
    }
}

#[derive(Debug, Default)]
struct Frame {
    symbols: IndexMap<String, Symbol>,
    parent: Option<usize>,
}

/// Scope chain as an arena of frames. Frame 0 holds the builtins,
/// frame 1 is the translation unit, deeper frames are blocks.
#[derive(Debug)]
pub struct Scopes {
    frames: Vec<Frame>,
    current: usize,
}

impl Default for Scopes {
    fn default() -> Self {
        Self::new()
    }
}

impl Scopes {
    pub fn new() -> Self {
        let mut scopes = Scopes { frames: vec![Frame::default()], current: 0 };
        for builtin in builtins() {
            scopes.define(builtin);
        }
        scopes.enter();
        scopes
    }

    pub fn enter(&mut self) {
        self.frames.push(Frame { symbols: IndexMap::new(), parent: Some(self.current) });
        self.current = self.frames.len() - 1;
    }

    /// Discard the innermost frame and everything declared in it.
    pub fn leave(&mut self) {
        if let Some(parent) = self.frames[self.current].parent {
            self.frames.truncate(self.current);
            self.current = parent;
        }
    }

    /// Add to the innermost frame. Returns false if the name is already taken there.
    pub fn declare(&mut self, symbol: Symbol) -> bool {
        let frame = &mut self.frames[self.current];
        let key = symbol.key();
        if frame.symbols.contains_key(&key) {
            return false;
        }
        frame.symbols.insert(key, symbol);
        true
    }

    /// Add or replace in the innermost frame.
    pub fn define(&mut self, symbol: Symbol) {
        self.frames[self.current].symbols.insert(symbol.key(), symbol);
    }

    pub fn lookup_local(&self, key: &str) -> Option<&Symbol> {
        self.frames[self.current].symbols.get(key)
    }

    /// Walk outward through the parents.
    pub fn lookup(&self, key: &str) -> Option<&Symbol> {
        let mut index = Some(self.current);
        while let Some(i) = index {
            if let Some(symbol) = self.frames[i].symbols.get(key) {
                return Some(symbol);
            }
            index = self.frames[i].parent;
        }
        None
    }
}

fn builtins() -> Vec<Symbol> {
    let func = |name: &str, ret: Type, params: Vec<Type>| {
        Symbol::new(name, SymbolKind::Function, Type::Function(Box::new(ret), params), None)
    };
    vec![
        func("putchar", Type::Int, vec![Type::Int]),
        func("malloc", Type::pointer(Type::Void), vec![Type::Int]),
        func("free", Type::Void, vec![Type::pointer(Type::Void)]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Symbol {
        Symbol::new(name, SymbolKind::Variable, Type::Int, None)
    }

    #[test]
    fn inner_frames_are_discarded() {
        let mut scopes = Scopes::new();
        assert!(scopes.declare(var("x")));
        scopes.enter();
        assert!(scopes.declare(var("y")));
        assert!(scopes.lookup("x").is_some());
        scopes.leave();
        assert!(scopes.lookup("y").is_none());
        assert!(scopes.lookup("x").is_some());
    }

    #[test]
    fn same_frame_duplicates_are_refused() {
        let mut scopes = Scopes::new();
        assert!(scopes.declare(var("x")));
        assert!(!scopes.declare(var("x")));
        scopes.enter();
        assert!(scopes.declare(var("x")));
    }

    #[test]
    fn builtins_can_be_shadowed() {
        let mut scopes = Scopes::new();
        assert!(scopes.lookup("malloc").is_some());
        assert!(scopes.declare(var("malloc")));
        assert_eq!(scopes.lookup("malloc").map(|s| s.kind), Some(SymbolKind::Variable));
    }

    #[test]
    fn tags_do_not_clash_with_names() {
        let mut scopes = Scopes::new();
        let tag = Symbol::new("S", SymbolKind::Struct, Type::Struct("S".into()), None);
        assert!(scopes.declare(tag));
        assert!(scopes.declare(var("S")));
        assert!(scopes.lookup("struct S").is_some());
    }
}
