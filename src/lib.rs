pub mod types;
pub use types::{RuntimeType, TypeCatalog, TypeDescriptor};

pub mod methods;
pub use methods::{MethodDescriptor, MethodLibrary, NameCache};

pub mod schema;
pub use schema::{InMemorySchema, InMemorySchemaProvider, Schema, SchemaError, SchemaProvider, TableDescriptor};

pub mod ast;
pub use ast::{Node, NodeKind, QueryBuilder};

pub mod config;
pub use config::CompilerConfig;

pub mod analyzer;
pub use analyzer::{AnalyzedQuery, AnalyzerError, Diagnostic, DiagnosticSink, SemanticPass};

pub mod planner;
pub use planner::RewritePass;

pub mod compiler;
pub use compiler::{CompiledQuery, Compiler};

#[cfg(test)]
mod test_fixtures;
