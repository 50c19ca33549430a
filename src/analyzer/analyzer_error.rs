use serde::Serialize;
use thiserror::Error;

use crate::{
    ast::StackUnderflow,
    methods::{ResolutionError, method_resolver::join_types},
    schema::SchemaError,
    types::RuntimeType,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    Binding,
    Resolution,
    Type,
    Structural,
    Cancelled,
    Schema,
}

fn suggest(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!("; did you mean {}?", suggestions.join(", "))
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalyzerError {
    #[error("unknown column '{name}'{}", suggest(.suggestions))]
    UnknownColumn { name: String, suggestions: Vec<String> },
    #[error("unknown alias '{alias}'{}", suggest(.suggestions))]
    UnknownAlias { alias: String, suggestions: Vec<String> },
    #[error("type '{ty}' has no property '{property}'{}", suggest(.suggestions))]
    UnknownProperty { ty: RuntimeType, property: String, suggestions: Vec<String> },
    #[error("column '{name}' is ambiguous between sources [{}]", .aliases.join(", "))]
    AmbiguousColumn { name: String, aliases: Vec<String> },
    #[error("table '{table}' is not defined in schema '{schema}' for arguments ({args})")]
    TableNotDefined { schema: String, table: String, args: String },
    #[error("schema '{0}' is not defined")]
    SchemaNotDefined(String),
    #[error("alias '{0}' is already used")]
    DuplicateAlias(String),
    #[error("method '{method}' needs an alias when the query reads more than one source")]
    MissingAlias { method: String },

    #[error("no method {name}({args}) matches; known signatures: [{}]", .known.join("; "))]
    MethodNotFound { name: String, args: String, known: Vec<String> },
    #[error("call {name}({args}) is ambiguous between [{}]", .candidates.join("; "))]
    AmbiguousMethod { name: String, args: String, candidates: Vec<String> },
    #[error("field link ::{index} is out of range; the query groups by {count} key(s)")]
    GroupFieldOutOfRange { index: usize, count: usize },

    #[error("{clause} expression '{expr}' has non-primitive type '{ty}'")]
    NonPrimitiveType { clause: String, expr: String, ty: RuntimeType },
    #[error("'{expr}' of type '{ty}' cannot be indexed")]
    IndexerRequired { expr: String, ty: RuntimeType },
    #[error("{op} combines {left} column(s) with {right} column(s)")]
    SetOperatorColumnCount { op: String, left: usize, right: usize },
    #[error("{op} column {position} is '{left}' on the left and '{right}' on the right")]
    SetOperatorColumnType { op: String, position: usize, left: RuntimeType, right: RuntimeType },
    #[error("{op} requires at least one key column")]
    SetOperatorMissingKeys { op: String },
    #[error("{op} key '{key}' is not an output column of the left query")]
    SetOperatorUnknownKey { op: String, key: String },
    #[error("operator '{op}' cannot combine '{left}' and '{right}'")]
    OperatorTypeMismatch { op: String, left: RuntimeType, right: RuntimeType },
    #[error("{clause} expects a boolean, got '{expr}' of type '{ty}'")]
    ExpectedBoolean { clause: String, expr: String, ty: RuntimeType },
    #[error("literal {literal} cannot be read as '{target}'")]
    InvalidLiteral { literal: String, target: RuntimeType },
    #[error("column '{column}' must appear in GROUP BY or inside an aggregate")]
    NonGroupedColumn { column: String },

    #[error("expected {expected}, found '{found}'")]
    UnexpectedNode { expected: String, found: String },
    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("compilation was cancelled")]
    Cancelled,
    #[error("schema provider failed: {0}")]
    Provider(String),
}

impl AnalyzerError {
    pub fn kind(&self) -> ErrorKind {
        use AnalyzerError::*;
        match self {
            UnknownColumn { .. }
            | UnknownAlias { .. }
            | UnknownProperty { .. }
            | AmbiguousColumn { .. }
            | TableNotDefined { .. }
            | SchemaNotDefined(_)
            | DuplicateAlias(_)
            | MissingAlias { .. } => ErrorKind::Binding,
            MethodNotFound { .. } | AmbiguousMethod { .. } | GroupFieldOutOfRange { .. } => ErrorKind::Resolution,
            NonPrimitiveType { .. }
            | IndexerRequired { .. }
            | SetOperatorColumnCount { .. }
            | SetOperatorColumnType { .. }
            | SetOperatorMissingKeys { .. }
            | SetOperatorUnknownKey { .. }
            | OperatorTypeMismatch { .. }
            | ExpectedBoolean { .. }
            | InvalidLiteral { .. }
            | NonGroupedColumn { .. } => ErrorKind::Type,
            UnexpectedNode { .. } | Unsupported(_) => ErrorKind::Structural,
            Cancelled => ErrorKind::Cancelled,
            Provider(_) => ErrorKind::Schema,
        }
    }

    /// Stable diagnostic code.
    pub fn code(&self) -> &'static str {
        use AnalyzerError::*;
        match self {
            UnknownColumn { .. } => "QRW101",
            UnknownAlias { .. } => "QRW102",
            UnknownProperty { .. } => "QRW103",
            AmbiguousColumn { .. } => "QRW104",
            TableNotDefined { .. } => "QRW105",
            SchemaNotDefined(_) => "QRW106",
            DuplicateAlias(_) => "QRW107",
            MissingAlias { .. } => "QRW108",
            MethodNotFound { .. } => "QRW201",
            AmbiguousMethod { .. } => "QRW202",
            GroupFieldOutOfRange { .. } => "QRW203",
            NonPrimitiveType { .. } => "QRW301",
            IndexerRequired { .. } => "QRW302",
            SetOperatorColumnCount { .. } => "QRW303",
            SetOperatorColumnType { .. } => "QRW304",
            SetOperatorMissingKeys { .. } => "QRW305",
            SetOperatorUnknownKey { .. } => "QRW306",
            OperatorTypeMismatch { .. } => "QRW307",
            ExpectedBoolean { .. } => "QRW308",
            InvalidLiteral { .. } => "QRW309",
            NonGroupedColumn { .. } => "QRW310",
            UnexpectedNode { .. } => "QRW401",
            Unsupported(_) => "QRW402",
            Cancelled => "QRW500",
            Provider(_) => "QRW600",
        }
    }

    /// Binding, resolution and type errors can be recorded in a sink and
    /// analysis continues past them.
    pub fn is_recoverable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Binding | ErrorKind::Resolution | ErrorKind::Type)
    }

    pub fn suggestions(&self) -> &[String] {
        match self {
            AnalyzerError::UnknownColumn { suggestions, .. }
            | AnalyzerError::UnknownAlias { suggestions, .. }
            | AnalyzerError::UnknownProperty { suggestions, .. } => suggestions,
            _ => &[],
        }
    }

    pub fn unexpected(expected: &str, found: impl ToString) -> Self {
        AnalyzerError::UnexpectedNode { expected: expected.to_string(), found: found.to_string() }
    }
}

impl From<ResolutionError> for AnalyzerError {
    fn from(err: ResolutionError) -> Self {
        match err {
            ResolutionError::NotFound { name, args, known } => AnalyzerError::MethodNotFound { name, args: join_types(&args), known },
            ResolutionError::Ambiguous { name, args, candidates } => {
                AnalyzerError::AmbiguousMethod { name, args: join_types(&args), candidates }
            }
        }
    }
}

impl From<SchemaError> for AnalyzerError {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::SchemaNotFound(name) => AnalyzerError::SchemaNotDefined(name),
            SchemaError::TableNotFound { schema, table, args } => AnalyzerError::TableNotDefined { schema, table, args },
            SchemaError::Cancelled => AnalyzerError::Cancelled,
            SchemaError::Provider(message) => AnalyzerError::Provider(message),
        }
    }
}

impl From<StackUnderflow> for AnalyzerError {
    fn from(err: StackUnderflow) -> Self {
        AnalyzerError::unexpected("an operand", err.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_suggestions() {
        let err = AnalyzerError::UnknownColumn { name: "Nme".into(), suggestions: vec!["Name".into()] };
        assert_eq!(err.to_string(), "unknown column 'Nme'; did you mean Name?");
        assert_eq!(err.code(), "QRW101");
        assert!(err.is_recoverable());
    }

    #[test]
    fn schema_errors_convert() {
        let err: AnalyzerError = SchemaError::Cancelled.into();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert!(!err.is_recoverable());
        let err: AnalyzerError = SchemaError::SchemaNotFound("#git".into()).into();
        assert_eq!(err, AnalyzerError::SchemaNotDefined("#git".into()));
    }
}
