use serde::{Deserialize, Serialize};

use crate::types::RuntimeType;

/// One column exposed by a data source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub index: usize,
    pub ty: RuntimeType,
    /// Nominal type for structured binary/text payloads whose runtime type is
    /// `Object` but whose shape is described in the type catalog
    pub intended_type: Option<String>,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, index: usize, ty: RuntimeType) -> Self {
        Self { name: name.into(), index, ty, intended_type: None }
    }

    pub fn with_intended_type(mut self, type_name: impl Into<String>) -> Self {
        self.intended_type = Some(type_name.into());
        self
    }

    /// Type used for member access: the intended nominal type when present.
    pub fn shape_type(&self) -> RuntimeType {
        match &self.intended_type {
            Some(name) => RuntimeType::Named(name.clone()),
            None => self.ty.clone(),
        }
    }
}
