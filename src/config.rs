use serde::{Deserialize, Serialize};

/// Compiler configuration.
///
/// - `validate_primitive_types` rejects non-primitive values in relational clauses.
/// - `max_suggestions` / `suggestion_distance` tune "did you mean" hints.
/// - `auto_alias_prefix` prefixes aliases generated for unaliased sources.
/// - `forward_source_hints` hands skip/take/distinct to single-source queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Reject `Object`, entity and collection types in SELECT, WHERE, GROUP BY,
    /// HAVING, ORDER BY, SKIP and TAKE
    pub validate_primitive_types: bool,
    /// Upper bound of suggestions attached to one error
    pub max_suggestions: usize,
    /// Largest edit distance still offered as a suggestion
    pub suggestion_distance: usize,
    pub auto_alias_prefix: String,
    pub forward_source_hints: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            validate_primitive_types: true,
            max_suggestions: 3,
            suggestion_distance: 2,
            auto_alias_prefix: "_".to_string(),
            forward_source_hints: true,
        }
    }
}

impl CompilerConfig {
    /// Create default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience: defaults with primitive-type validation switched off.
    pub fn permissive() -> Self {
        Self { validate_primitive_types: false, ..Self::default() }
    }

    pub fn with_auto_alias_prefix(mut self, prefix: &str) -> Self {
        self.auto_alias_prefix = prefix.to_string();
        self
    }

    pub fn with_suggestions(mut self, max: usize, distance: usize) -> Self {
        self.max_suggestions = max;
        self.suggestion_distance = distance;
        self
    }

    pub fn without_source_hints(mut self) -> Self {
        self.forward_source_hints = false;
        self
    }

    /// Parse a JSON configuration; missing keys keep their defaults.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
