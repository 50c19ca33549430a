use serde::{Deserialize, Serialize};

use crate::{schema::ColumnInfo, types::RuntimeType};

/// A table a schema produces for one `name(args)` invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
    /// Row entity type handed to injected-source parameters
    pub entity_type: RuntimeType,
}

impl TableDescriptor {
    pub fn new(name: impl Into<String>, entity_type: RuntimeType) -> Self {
        Self { name: name.into(), columns: Vec::new(), entity_type }
    }

    pub fn with_column(mut self, name: impl Into<String>, ty: RuntimeType) -> Self {
        let index = self.columns.len();
        self.columns.push(ColumnInfo::new(name, index, ty));
        self
    }

    pub fn with_structured_column(mut self, name: impl Into<String>, intended_type: impl Into<String>) -> Self {
        let index = self.columns.len();
        self.columns.push(ColumnInfo::new(name, index, RuntimeType::Object).with_intended_type(intended_type));
        self
    }

    /// Exact match first, then case-insensitive.
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .or_else(|| self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name)))
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_lookup_falls_back_to_case_insensitive() {
        let t = TableDescriptor::new("files", RuntimeType::named("FileEntity"))
            .with_column("Name", RuntimeType::String)
            .with_column("Length", RuntimeType::Long);
        assert_eq!(t.column("Name").map(|c| c.index), Some(0));
        assert_eq!(t.column("length").map(|c| c.index), Some(1));
        assert!(t.column("Size").is_none());
        assert_eq!(t.column_names(), vec!["Name", "Length"]);
    }
}
