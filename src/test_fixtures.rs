//! Schemas and helpers shared by the analyzer, planner and compiler tests.

use tokio_util::sync::CancellationToken;

use crate::{
    analyzer::{AnalysisContext, AnalyzedQuery, AnalyzerError, DiagnosticSink, SemanticPass},
    ast::Node,
    config::CompilerConfig,
    methods::{MethodDescriptor, MethodLibrary, NameCache},
    schema::{InMemorySchema, InMemorySchemaProvider, TableDescriptor},
    types::{RuntimeType, TypeDescriptor},
};

fn library() -> MethodLibrary {
    use RuntimeType::*;
    MethodLibrary::new()
        .with(MethodDescriptor::new("Abs", "Library").param("value", Long).returns(Long))
        .with(MethodDescriptor::new("Abs", "Library").param("value", Int).returns(Int))
        .with(MethodDescriptor::new("ToUpper", "Library").param("value", String).returns(String))
        .with(MethodDescriptor::new("Concat", "Library").variadic("values", String).returns(String))
        .with(MethodDescriptor::new("Name", "FileLibrary").injected_source("file", RuntimeType::named("IFile")).returns(String))
        .with(MethodDescriptor::new("RowNumber", "Library").injected_stats("stats").returns(Int))
        .with(
            MethodDescriptor::new("Sum", "Library")
                .aggregate_getter()
                .injected_group("group")
                .param("name", String)
                .optional("parent", Int)
                .returns(Decimal),
        )
        .with(
            MethodDescriptor::new("SetSum", "Library")
                .aggregate_setter()
                .injected_group("group")
                .param("name", String)
                .param("value", RuntimeType::nullable(Long))
                .optional("parent", Int),
        )
        .with(
            MethodDescriptor::new("SetSum", "Library")
                .aggregate_setter()
                .injected_group("group")
                .param("name", String)
                .param("value", RuntimeType::nullable(Int))
                .optional("parent", Int),
        )
        .with(
            MethodDescriptor::new("Count", "Library")
                .aggregate_getter()
                .injected_group("group")
                .param("name", String)
                .optional("parent", Int)
                .returns(Int),
        )
        .with(
            MethodDescriptor::new("SetCount", "Library")
                .aggregate_setter()
                .injected_group("group")
                .param("name", String)
                .param("value", Object)
                .optional("parent", Int),
        )
        .with(
            MethodDescriptor::new("Max", "Library")
                .aggregate_getter()
                .generic("T")
                .injected_group("group")
                .param("name", String)
                .returns(RuntimeType::generic("T")),
        )
        .with(
            MethodDescriptor::new("SetMax", "Library")
                .aggregate_setter()
                .generic("T")
                .injected_group("group")
                .param("name", String)
                .param("value", RuntimeType::generic("T")),
        )
}

fn files_table() -> TableDescriptor {
    TableDescriptor::new("files", RuntimeType::named("FileEntity"))
        .with_column("Name", RuntimeType::String)
        .with_column("Length", RuntimeType::Long)
        .with_column("Directory", RuntimeType::String)
        .with_column("Extension", RuntimeType::String)
        .with_column("Modified", RuntimeType::DateTime)
        .with_column("Tags", RuntimeType::array(RuntimeType::String))
        .with_structured_column("Owner", "Author")
}

fn dirs_table() -> TableDescriptor {
    TableDescriptor::new("dirs", RuntimeType::named("DirEntity"))
        .with_column("Name", RuntimeType::String)
        .with_column("Path", RuntimeType::String)
        .with_column("Files", RuntimeType::array(RuntimeType::named("FileInfo")))
}

fn commits_table() -> TableDescriptor {
    TableDescriptor::new("commits", RuntimeType::named("CommitEntity"))
        .with_column("Sha", RuntimeType::String)
        .with_column("Message", RuntimeType::String)
        .with_column("Author", RuntimeType::String)
        .with_column("Committed", RuntimeType::DateTime)
        .with_column("Additions", RuntimeType::Int)
        .with_column("Payload", RuntimeType::Object)
}

/// `#os` (files, dirs) and `#git` (commits), both taking one string argument.
pub fn provider() -> InMemorySchemaProvider {
    let os = InMemorySchema::new("os")
        .with_library(library())
        .with_type(TypeDescriptor::new("IFile"))
        .with_type(TypeDescriptor::new("FileEntity").with_capability("IFile"))
        .with_type(TypeDescriptor::new("DirEntity"))
        .with_type(
            TypeDescriptor::new("FileInfo")
                .with_property("Name", RuntimeType::String)
                .with_property("Length", RuntimeType::Long),
        )
        .with_type(
            TypeDescriptor::new("Author")
                .with_property("Name", RuntimeType::String)
                .with_property("Email", RuntimeType::String),
        )
        .with_table(vec![RuntimeType::String], files_table())
        .with_table(vec![RuntimeType::String], dirs_table());
    let git = InMemorySchema::new("git")
        .with_library(library())
        .with_type(TypeDescriptor::new("CommitEntity"))
        .with_table(vec![RuntimeType::String], commits_table());
    InMemorySchemaProvider::new().with_schema(os).with_schema(git)
}

pub fn files(alias: &str) -> Node {
    Node::schema_from("#os", "files", vec![Node::string("/tmp")], Some(alias))
}

pub fn dirs(alias: &str) -> Node {
    Node::schema_from("#os", "dirs", vec![Node::string("/tmp")], Some(alias))
}

pub fn commits(alias: &str) -> Node {
    Node::schema_from("#git", "commits", vec![Node::string(".")], Some(alias))
}

pub fn analyze_with(tree: &Node, config: &CompilerConfig) -> Result<AnalyzedQuery, AnalyzerError> {
    let provider = provider();
    let cache = NameCache::new();
    let cancel = CancellationToken::new();
    SemanticPass::analyze(tree, AnalysisContext::new(&provider, &cache, config, &cancel))
}

pub fn analyze(tree: &Node) -> Result<AnalyzedQuery, AnalyzerError> {
    analyze_with(tree, &CompilerConfig::default())
}

pub fn analyze_collecting(tree: &Node) -> (Result<AnalyzedQuery, AnalyzerError>, DiagnosticSink) {
    let provider = provider();
    let cache = NameCache::new();
    let cancel = CancellationToken::new();
    let config = CompilerConfig::default();
    let mut sink = DiagnosticSink::new();
    let result = SemanticPass::analyze_with_sink(tree, AnalysisContext::new(&provider, &cache, &config, &cancel), &mut sink);
    (result, sink)
}
