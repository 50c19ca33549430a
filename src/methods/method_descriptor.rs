use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::RuntimeType;

/// How a formal parameter receives its value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamKind {
    /// Supplied by the caller's argument list
    Positional,
    /// The row entity of the bound source; the parameter type is the
    /// capability the entity must implement
    InjectedSource,
    /// The aggregation group of the current row
    InjectedGroup,
    /// Query statistics (row number and friends)
    InjectedStats,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParamDescriptor {
    pub name: String,
    pub ty: RuntimeType,
    pub kind: ParamKind,
    pub optional: bool,
    /// Trailing params-array; `ty` is the array type
    pub variadic: bool,
}

impl ParamDescriptor {
    pub fn is_injected(&self) -> bool {
        self.kind != ParamKind::Positional
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregateRole {
    /// Reads the aggregated value (`Sum`)
    Getter,
    /// Feeds one row into the aggregate state (`SetSum`)
    Setter,
}

/// A callable exposed by a schema library.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodDescriptor {
    pub name: String,
    pub declaring_type: String,
    pub params: Vec<ParamDescriptor>,
    pub return_type: RuntimeType,
    pub generic_params: Vec<String>,
    pub aggregate: Option<AggregateRole>,
}

impl MethodDescriptor {
    pub fn new(name: impl Into<String>, declaring_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declaring_type: declaring_type.into(),
            params: Vec::new(),
            return_type: RuntimeType::Void,
            generic_params: Vec::new(),
            aggregate: None,
        }
    }

    fn push(mut self, name: &str, ty: RuntimeType, kind: ParamKind, optional: bool, variadic: bool) -> Self {
        self.params.push(ParamDescriptor { name: name.to_string(), ty, kind, optional, variadic });
        self
    }

    pub fn param(self, name: &str, ty: RuntimeType) -> Self {
        self.push(name, ty, ParamKind::Positional, false, false)
    }

    pub fn optional(self, name: &str, ty: RuntimeType) -> Self {
        self.push(name, ty, ParamKind::Positional, true, false)
    }

    /// `element` is the element type; the parameter is typed `element[]`.
    pub fn variadic(self, name: &str, element: RuntimeType) -> Self {
        self.push(name, RuntimeType::array(element), ParamKind::Positional, false, true)
    }

    pub fn injected_source(self, name: &str, capability: RuntimeType) -> Self {
        self.push(name, capability, ParamKind::InjectedSource, false, false)
    }

    pub fn injected_group(self, name: &str) -> Self {
        self.push(name, RuntimeType::named("Group"), ParamKind::InjectedGroup, false, false)
    }

    pub fn injected_stats(self, name: &str) -> Self {
        self.push(name, RuntimeType::named("QueryStats"), ParamKind::InjectedStats, false, false)
    }

    pub fn generic(mut self, name: &str) -> Self {
        self.generic_params.push(name.to_string());
        self
    }

    pub fn returns(mut self, ty: RuntimeType) -> Self {
        self.return_type = ty;
        self
    }

    pub fn aggregate_getter(mut self) -> Self {
        self.aggregate = Some(AggregateRole::Getter);
        self
    }

    pub fn aggregate_setter(mut self) -> Self {
        self.aggregate = Some(AggregateRole::Setter);
        self
    }

    pub fn is_generic(&self) -> bool {
        !self.generic_params.is_empty()
    }

    pub fn is_variadic(&self) -> bool {
        self.params.last().map(|p| p.variadic).unwrap_or(false)
    }

    pub fn is_aggregate_getter(&self) -> bool {
        self.aggregate == Some(AggregateRole::Getter)
    }

    /// Parameters the caller supplies, in order.
    pub fn positional(&self) -> impl Iterator<Item = &ParamDescriptor> {
        self.params.iter().filter(|p| !p.is_injected())
    }

    pub fn positional_count(&self) -> usize {
        self.positional().count()
    }

    /// Inclusive lower bound and optional upper bound of supplied arguments.
    pub fn arity(&self) -> (usize, Option<usize>) {
        let mut required = 0;
        let mut max = 0;
        for p in self.positional() {
            if p.variadic {
                return (required, None);
            }
            max += 1;
            if !p.optional {
                required += 1;
            }
        }
        (required, Some(max))
    }

    pub fn accepts_arg_count(&self, count: usize) -> bool {
        let (min, max) = self.arity();
        count >= min && max.map(|m| count <= m).unwrap_or(true)
    }

    pub fn source_param(&self) -> Option<&ParamDescriptor> {
        self.params.iter().find(|p| p.kind == ParamKind::InjectedSource)
    }

    /// Mutator name paired with an aggregate getter.
    pub fn setter_name(getter: &str) -> String {
        format!("Set{}", getter)
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}.{}", self.return_type, self.declaring_type, self.name)?;
        if self.is_generic() {
            write!(f, "<{}>", self.generic_params.join(", "))?;
        }
        write!(f, "(")?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match p.kind {
                ParamKind::InjectedSource => write!(f, "[source] ")?,
                ParamKind::InjectedGroup => write!(f, "[group] ")?,
                ParamKind::InjectedStats => write!(f, "[stats] ")?,
                ParamKind::Positional if p.variadic => write!(f, "params ")?,
                ParamKind::Positional => {}
            }
            write!(f, "{} {}", p.ty, p.name)?;
            if p.optional {
                write!(f, " = default")?;
            }
        }
        write!(f, ")")
    }
}
