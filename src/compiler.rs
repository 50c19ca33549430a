use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::{
    analyzer::{AnalysisContext, AnalyzedQuery, AnalyzerError, Diagnostic, DiagnosticSink, SemanticPass, SourceInfo},
    ast::Node,
    config::CompilerConfig,
    methods::NameCache,
    planner::RewritePass,
    schema::SchemaProvider,
};

/// Outcome of one compilation, ready to hand to an execution engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledQuery {
    /// `Root` statement list; absent when diagnostics were recorded
    pub root: Option<Node>,
    pub sources: Vec<SourceInfo>,
    pub diagnostics: Vec<Diagnostic>,
}

impl CompiledQuery {
    pub fn is_ok(&self) -> bool {
        self.root.is_some() && self.diagnostics.is_empty()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Runs the semantic pass and the rewrite pass against one schema provider.
///
/// A compiler holds no per-query state, so one instance (and its name cache)
/// can serve many compilations at once.
pub struct Compiler<'a> {
    provider: &'a dyn SchemaProvider,
    cache: &'a NameCache,
    config: CompilerConfig,
}

impl<'a> Compiler<'a> {
    pub fn new(provider: &'a dyn SchemaProvider, cache: &'a NameCache) -> Self {
        Self { provider, cache, config: CompilerConfig::default() }
    }

    pub fn with_config(mut self, config: CompilerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compile `tree`, failing on the first error.
    #[instrument(level = "debug", skip_all)]
    pub fn compile(&self, tree: &Node, cancel: &CancellationToken) -> Result<CompiledQuery, AnalyzerError> {
        let analyzed = SemanticPass::analyze(tree, AnalysisContext::new(self.provider, self.cache, &self.config, cancel))?;
        Self::finish(analyzed)
    }

    /// Compile `tree`, recording recoverable errors instead of stopping at the
    /// first one. When anything was recorded the plan is not built.
    #[instrument(level = "debug", skip_all)]
    pub fn compile_collecting(&self, tree: &Node, cancel: &CancellationToken) -> Result<CompiledQuery, AnalyzerError> {
        let mut sink = DiagnosticSink::new();
        let analyzed =
            SemanticPass::analyze_with_sink(tree, AnalysisContext::new(self.provider, self.cache, &self.config, cancel), &mut sink)?;
        if !sink.is_empty() {
            info!(diagnostics = sink.len(), "compilation produced diagnostics");
            return Ok(CompiledQuery {
                root: None,
                sources: analyzed.sources().cloned().collect(),
                diagnostics: sink.into_diagnostics(),
            });
        }
        Self::finish(analyzed)
    }

    fn finish(analyzed: AnalyzedQuery) -> Result<CompiledQuery, AnalyzerError> {
        let root = RewritePass::rewrite(&analyzed)?;
        let sources: Vec<SourceInfo> = analyzed.sources().cloned().collect();
        debug!(sources = sources.len(), "compiled");
        Ok(CompiledQuery { root: Some(root), sources, diagnostics: Vec::new() })
    }
}
