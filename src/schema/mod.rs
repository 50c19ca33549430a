pub mod column_info;
pub use column_info::*;

pub mod table_descriptor;
pub use table_descriptor::*;

pub mod in_memory;
pub use in_memory::*;

use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::{
    methods::{MethodLibrary, MethodResolver, NameCache, ResolutionError, ResolvedMethod},
    types::{RuntimeType, TypeCatalog},
};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("schema '{0}' is not defined")]
    SchemaNotFound(String),
    #[error("table '{table}' is not defined in schema '{schema}' for arguments ({args})")]
    TableNotFound { schema: String, table: String, args: String },
    #[error("schema lookup was cancelled")]
    Cancelled,
    #[error("schema provider failed: {0}")]
    Provider(String),
}

/// Shared state overload resolution reads from.
#[derive(Clone, Copy)]
pub struct MethodContext<'a> {
    pub catalog: &'a TypeCatalog,
    pub cache: &'a NameCache,
}

/// A data source family (`#git`, `#os`, ...) exposing tables and callables.
pub trait Schema: Send + Sync {
    fn name(&self) -> &str;

    /// Resolve `name(args)` into a table. May be long-running; implementations
    /// must honour `cancel`.
    fn table(&self, name: &str, args: &[RuntimeType], cancel: &CancellationToken) -> Result<TableDescriptor, SchemaError>;

    fn library(&self) -> &MethodLibrary;

    fn resolve_method(
        &self,
        name: &str,
        args: &[RuntimeType],
        entity: Option<&RuntimeType>,
        ctx: MethodContext<'_>,
    ) -> Result<ResolvedMethod, ResolutionError> {
        MethodResolver::new(self.library(), ctx.catalog, ctx.cache).resolve(name, args, entity)
    }

    /// Like `resolve_method` but only succeeds for aggregate getters.
    fn resolve_aggregate(
        &self,
        name: &str,
        args: &[RuntimeType],
        entity: Option<&RuntimeType>,
        ctx: MethodContext<'_>,
    ) -> Result<ResolvedMethod, ResolutionError> {
        let resolved = self.resolve_method(name, args, entity, ctx)?;
        if resolved.is_aggregate() {
            Ok(resolved)
        } else {
            Err(ResolutionError::NotFound {
                name: name.to_string(),
                args: args.to_vec(),
                known: vec![format!("{} is not an aggregate", resolved.descriptor)],
            })
        }
    }

    /// Resolution with no bound entity.
    fn resolve_raw_method(&self, name: &str, args: &[RuntimeType], ctx: MethodContext<'_>) -> Result<ResolvedMethod, ResolutionError> {
        MethodResolver::new(self.library(), ctx.catalog, ctx.cache).resolve_raw(name, args)
    }

    fn is_aggregate(&self, name: &str, ctx: MethodContext<'_>) -> bool {
        MethodResolver::new(self.library(), ctx.catalog, ctx.cache).is_aggregate(name)
    }
}

pub trait SchemaProvider: Send + Sync {
    fn schema(&self, name: &str, cancel: &CancellationToken) -> Result<Arc<dyn Schema>, SchemaError>;

    fn type_catalog(&self) -> &TypeCatalog;
}
