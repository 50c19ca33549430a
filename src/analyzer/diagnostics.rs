use serde::Serialize;
use tracing::warn;

use crate::{
    analyzer::{AnalyzerError, ErrorKind},
    ast::Node,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub code: &'static str,
    pub kind: ErrorKind,
    pub message: String,
    /// Canonical text of the offending node
    pub node: String,
    pub suggestions: Vec<String>,
}

/// Collects recoverable errors so analysis can report all of them in one run.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticSink {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, error: &AnalyzerError, node: &Node) {
        warn!(code = error.code(), node = %node, "{}", error);
        self.diagnostics.push(Diagnostic {
            code: error.code(),
            kind: error.kind(),
            message: error.to_string(),
            node: node.to_string(),
            suggestions: error.suggestions().to_vec(),
        });
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn merge(&mut self, other: DiagnosticSink) {
        self.diagnostics.extend(other.diagnostics);
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}
