use std::sync::Arc;

use indexmap::IndexMap;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    methods::{MethodDescriptor, MethodLibrary},
    methods::method_resolver::join_types,
    schema::{Schema, SchemaError, SchemaProvider, TableDescriptor},
    types::{RuntimeType, TypeCatalog, TypeCompatibility, TypeDescriptor},
};

#[derive(Debug, Clone)]
struct TableOverload {
    params: Vec<RuntimeType>,
    descriptor: TableDescriptor,
}

/// Schema backed by registered table shapes and a method library.
#[derive(Debug, Clone)]
pub struct InMemorySchema {
    name: String,
    tables: IndexMap<String, Vec<TableOverload>>,
    library: MethodLibrary,
    catalog: TypeCatalog,
}

impl InMemorySchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: IndexMap::new(),
            library: MethodLibrary::new(),
            catalog: TypeCatalog::new(),
        }
    }

    /// Register `table` for invocations whose argument types fit `params`.
    pub fn with_table(mut self, params: Vec<RuntimeType>, descriptor: TableDescriptor) -> Self {
        self.tables
            .entry(descriptor.name.to_lowercase())
            .or_default()
            .push(TableOverload { params, descriptor });
        self
    }

    pub fn with_method(mut self, descriptor: MethodDescriptor) -> Self {
        self.library.register(descriptor);
        self
    }

    pub fn with_library(mut self, library: MethodLibrary) -> Self {
        self.library = library;
        self
    }

    /// Types this schema contributes to the provider's catalog.
    pub fn with_type(mut self, descriptor: TypeDescriptor) -> Self {
        self.catalog.register(descriptor);
        self
    }

    pub fn catalog(&self) -> &TypeCatalog {
        &self.catalog
    }
}

impl Schema for InMemorySchema {
    fn name(&self) -> &str {
        &self.name
    }

    fn table(&self, name: &str, args: &[RuntimeType], cancel: &CancellationToken) -> Result<TableDescriptor, SchemaError> {
        if cancel.is_cancelled() {
            return Err(SchemaError::Cancelled);
        }
        let not_found = || SchemaError::TableNotFound {
            schema: self.name.clone(),
            table: name.to_string(),
            args: join_types(args),
        };
        let overloads = self.tables.get(&name.to_lowercase()).ok_or_else(not_found)?;
        overloads
            .iter()
            .find(|o| {
                o.params.len() == args.len()
                    && o.params.iter().zip(args).all(|(p, a)| TypeCompatibility::can_supply(a, p, &self.catalog))
            })
            .map(|o| o.descriptor.clone())
            .ok_or_else(not_found)
    }

    fn library(&self) -> &MethodLibrary {
        &self.library
    }
}

/// Provider over a fixed set of in-memory schemas. Names are matched without
/// the leading `#` and case-insensitively.
#[derive(Clone, Default)]
pub struct InMemorySchemaProvider {
    schemas: IndexMap<String, Arc<dyn Schema>>,
    catalog: TypeCatalog,
}

impl InMemorySchemaProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schema(mut self, schema: InMemorySchema) -> Self {
        for descriptor in schema.catalog().types() {
            self.catalog.register(descriptor.clone());
        }
        self.schemas.insert(Self::key(schema.name()), Arc::new(schema));
        self
    }

    pub fn with_type(mut self, descriptor: TypeDescriptor) -> Self {
        self.catalog.register(descriptor);
        self
    }

    fn key(name: &str) -> String {
        name.trim_start_matches('#').to_lowercase()
    }
}

impl SchemaProvider for InMemorySchemaProvider {
    fn schema(&self, name: &str, cancel: &CancellationToken) -> Result<Arc<dyn Schema>, SchemaError> {
        if cancel.is_cancelled() {
            return Err(SchemaError::Cancelled);
        }
        debug!(schema = name, "schema lookup");
        self.schemas
            .get(&Self::key(name))
            .cloned()
            .ok_or_else(|| SchemaError::SchemaNotFound(name.to_string()))
    }

    fn type_catalog(&self) -> &TypeCatalog {
        &self.catalog
    }
}
