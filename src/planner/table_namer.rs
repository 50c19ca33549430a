use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::ast::{Node, NodeKind};

static INVALID: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_]+").expect("valid regex"));

/// Deterministic names for materialized tables. Same input order, same names.
#[derive(Debug, Default)]
pub struct TableNamer {
    taken: HashSet<String>,
    next_suffix: HashMap<String, usize>,
}

impl TableNamer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sanitize(part: &str) -> String {
        INVALID.replace_all(part, "_").trim_matches('_').to_lowercase()
    }

    /// Name a from-node contributes to the tables built from it.
    pub fn source_name(from: &Node) -> String {
        match &from.kind {
            NodeKind::SchemaFrom { schema, method, .. } => Self::sanitize(&format!("{}_{}", schema, method)),
            NodeKind::PropertyFrom { source, property, .. } => Self::sanitize(&format!("{}_{}", source, property)),
            NodeKind::InMemoryFrom { table, .. } => Self::sanitize(table),
            NodeKind::Join { left, right, .. }
            | NodeKind::JoinStep { left, right, .. }
            | NodeKind::Apply { left, right, .. }
            | NodeKind::ApplyStep { left, right, .. } => {
                format!("{}_{}", Self::source_name(left), Self::source_name(right))
            }
            _ => String::from("table"),
        }
    }

    /// Join the sanitized parts; a repeated name gets `_2`, `_3`, ...
    pub fn name(&mut self, parts: &[&str]) -> String {
        let joined = parts.iter().map(|p| Self::sanitize(p)).filter(|p| !p.is_empty()).collect::<Vec<_>>().join("_");
        let base = if joined.is_empty() { String::from("table") } else { joined };
        if self.taken.insert(base.clone()) {
            return base;
        }
        let suffix = self.next_suffix.entry(base.clone()).or_insert(2);
        loop {
            let candidate = format!("{}_{}", base, suffix);
            *suffix += 1;
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
        }
    }
}
