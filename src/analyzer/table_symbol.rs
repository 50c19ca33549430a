use serde::Serialize;

use crate::{
    schema::{ColumnInfo, TableDescriptor},
    types::RuntimeType,
};

/// A bound source as the scope sees it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSymbol {
    pub alias: String,
    pub schema: String,
    pub table: String,
    pub columns: Vec<ColumnInfo>,
    pub entity_type: RuntimeType,
    /// Aliases merged into this symbol, for tables produced by join steps
    pub compound: Vec<String>,
    /// Source sits on the optional side of an outer join or apply
    pub nullable_side: bool,
}

impl TableSymbol {
    pub fn from_table(alias: &str, schema: &str, table: &TableDescriptor) -> Self {
        Self {
            alias: alias.to_string(),
            schema: schema.to_string(),
            table: table.name.clone(),
            columns: table.columns.clone(),
            entity_type: table.entity_type.clone(),
            compound: Vec::new(),
            nullable_side: false,
        }
    }

    /// Symbol over a table produced by merging `parts`; columns are renamed
    /// `<alias>.<column>`.
    pub fn compound(alias: &str, parts: &[&TableSymbol]) -> Self {
        let mut columns = Vec::new();
        let mut compound = Vec::new();
        for part in parts {
            for c in &part.columns {
                let name = if part.compound.is_empty() { format!("{}.{}", part.alias, c.name) } else { c.name.clone() };
                let mut merged = ColumnInfo::new(name, columns.len(), part.column_type(c));
                merged.intended_type = c.intended_type.clone();
                columns.push(merged);
            }
            if part.compound.is_empty() {
                compound.push(part.alias.clone());
            } else {
                compound.extend(part.compound.iter().cloned());
            }
        }
        Self {
            alias: alias.to_string(),
            schema: String::new(),
            table: alias.to_string(),
            columns,
            entity_type: RuntimeType::Object,
            compound,
            nullable_side: false,
        }
    }

    fn column_type(&self, column: &ColumnInfo) -> RuntimeType {
        if self.nullable_side { RuntimeType::nullable(column.ty.clone()) } else { column.ty.clone() }
    }

    /// Column by name with the outer-join nullability applied.
    pub fn column(&self, name: &str) -> Option<ColumnInfo> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .or_else(|| self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name)))
            .map(|c| ColumnInfo { ty: self.column_type(c), ..c.clone() })
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Copy restricted to `keep`, in this symbol's column order.
    pub fn narrow(&self, keep: &[String]) -> Self {
        let columns = self
            .columns
            .iter()
            .filter(|c| keep.iter().any(|k| k == &c.name))
            .enumerate()
            .map(|(index, c)| ColumnInfo { index, ..c.clone() })
            .collect();
        Self { columns, ..self.clone() }
    }

    pub fn on_nullable_side(&self) -> Self {
        Self { nullable_side: true, ..self.clone() }
    }

    pub fn covers(&self, alias: &str) -> bool {
        self.alias == alias || self.compound.iter().any(|a| a == alias)
    }
}
