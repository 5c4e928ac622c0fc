use crate::error::Error;
use indexmap::IndexMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub address: u32,
    pub is_data: bool,
    /// 0-based source line of the definition
    pub line: usize,
}

/// Label table in definition order.
#[derive(Debug, Default)]
pub struct Labels(IndexMap<String, Label>);

impl Labels {
    pub fn new() -> Self {
        Labels(IndexMap::new())
    }

    pub fn define(&mut self, name: &str, label: Label) -> Result<(), Error> {
        if let Some(prev) = self.0.get(name) {
            return Err(Error::RedefinedLabel(name.to_string(), prev.line + 1));
        }
        self.0.insert(name.to_string(), label);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Label> {
        self.0.get(name)
    }

    pub fn address(&self, name: &str) -> Option<u32> {
        self.0.get(name).map(|label| label.address)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Label)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
