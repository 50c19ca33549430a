use std::fmt;

use serde::{Deserialize, Serialize};

/// Runtime type tag carried by every expression node.
///
/// `Unset` marks a node that has not been through binding yet. A successfully
/// analyzed tree never contains it in an expression position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuntimeType {
    /// Not bound yet
    Unset,
    /// Statements and clauses that produce no value
    Void,
    /// Type of the `null` literal
    Null,
    Bool,
    Short,
    Int,
    Long,
    Float,
    Double,
    Decimal,
    Char,
    String,
    DateTime,
    DateTimeOffset,
    TimeSpan,
    Guid,
    /// Dynamic escape type: anything goes, checked at runtime
    Object,
    Nullable(Box<RuntimeType>),
    Array(Box<RuntimeType>),
    Enumerable(Box<RuntimeType>),
    Dictionary(Box<RuntimeType>, Box<RuntimeType>),
    /// Entity or structured type registered in the `TypeCatalog`
    Named(String),
    /// Generic parameter of a method descriptor
    Generic(String),
}

impl RuntimeType {
    pub fn nullable(inner: RuntimeType) -> RuntimeType {
        match inner {
            RuntimeType::Nullable(_) => inner,
            value if value.is_value_type() => RuntimeType::Nullable(Box::new(value)),
            other => other,
        }
    }

    pub fn array(element: RuntimeType) -> RuntimeType {
        RuntimeType::Array(Box::new(element))
    }

    pub fn enumerable(element: RuntimeType) -> RuntimeType {
        RuntimeType::Enumerable(Box::new(element))
    }

    pub fn named(name: impl Into<String>) -> RuntimeType {
        RuntimeType::Named(name.into())
    }

    pub fn generic(name: impl Into<String>) -> RuntimeType {
        RuntimeType::Generic(name.into())
    }

    pub fn is_numeric(&self) -> bool {
        use RuntimeType::*;
        matches!(self, Short | Int | Long | Float | Double | Decimal)
    }

    pub fn is_integral(&self) -> bool {
        matches!(self, RuntimeType::Short | RuntimeType::Int | RuntimeType::Long)
    }

    pub fn is_date_time(&self) -> bool {
        matches!(self, RuntimeType::DateTime | RuntimeType::DateTimeOffset | RuntimeType::TimeSpan)
    }

    /// Types that can be wrapped into `Nullable`.
    pub fn is_value_type(&self) -> bool {
        use RuntimeType::*;
        matches!(
            self,
            Bool | Short | Int | Long | Float | Double | Decimal | Char | DateTime | DateTimeOffset | TimeSpan | Guid
        )
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self, RuntimeType::Nullable(_))
    }

    /// Accepts `null` without being a nullable value type.
    pub fn is_reference_type(&self) -> bool {
        use RuntimeType::*;
        matches!(self, String | Object | Array(_) | Enumerable(_) | Dictionary(_, _) | Named(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self, RuntimeType::Object)
    }

    pub fn is_generic(&self) -> bool {
        match self {
            RuntimeType::Generic(_) => true,
            RuntimeType::Nullable(inner) | RuntimeType::Array(inner) | RuntimeType::Enumerable(inner) => inner.is_generic(),
            RuntimeType::Dictionary(key, value) => key.is_generic() || value.is_generic(),
            _ => false,
        }
    }

    /// Strip one level of `Nullable`.
    pub fn unwrap_nullable(&self) -> &RuntimeType {
        match self {
            RuntimeType::Nullable(inner) => inner,
            other => other,
        }
    }

    /// Element type of arrays and enumerables.
    pub fn element_type(&self) -> Option<&RuntimeType> {
        match self {
            RuntimeType::Array(inner) | RuntimeType::Enumerable(inner) => Some(inner),
            _ => None,
        }
    }

    /// Numeric, string, boolean, date/time (and their nullable forms) may flow
    /// into relational clauses.
    pub fn is_primitive_safe(&self) -> bool {
        let bare = self.unwrap_nullable();
        bare.is_numeric() || bare.is_date_time() || matches!(bare, RuntimeType::Bool | RuntimeType::String | RuntimeType::Char | RuntimeType::Guid | RuntimeType::Null)
    }

    pub fn is_bool(&self) -> bool {
        matches!(self.unwrap_nullable(), RuntimeType::Bool)
    }

    /// Replace generic parameters using `bindings`; unknown generics stay as they are.
    pub fn substitute(&self, bindings: &indexmap::IndexMap<String, RuntimeType>) -> RuntimeType {
        match self {
            RuntimeType::Generic(name) => bindings.get(name).cloned().unwrap_or_else(|| self.clone()),
            RuntimeType::Nullable(inner) => RuntimeType::nullable(inner.substitute(bindings)),
            RuntimeType::Array(inner) => RuntimeType::array(inner.substitute(bindings)),
            RuntimeType::Enumerable(inner) => RuntimeType::enumerable(inner.substitute(bindings)),
            RuntimeType::Dictionary(key, value) => {
                RuntimeType::Dictionary(Box::new(key.substitute(bindings)), Box::new(value.substitute(bindings)))
            }
            other => other.clone(),
        }
    }
}

impl fmt::Display for RuntimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeType::Unset => write!(f, "<unset>"),
            RuntimeType::Void => write!(f, "void"),
            RuntimeType::Null => write!(f, "null"),
            RuntimeType::Bool => write!(f, "bool"),
            RuntimeType::Short => write!(f, "short"),
            RuntimeType::Int => write!(f, "int"),
            RuntimeType::Long => write!(f, "long"),
            RuntimeType::Float => write!(f, "float"),
            RuntimeType::Double => write!(f, "double"),
            RuntimeType::Decimal => write!(f, "decimal"),
            RuntimeType::Char => write!(f, "char"),
            RuntimeType::String => write!(f, "string"),
            RuntimeType::DateTime => write!(f, "datetime"),
            RuntimeType::DateTimeOffset => write!(f, "datetimeoffset"),
            RuntimeType::TimeSpan => write!(f, "timespan"),
            RuntimeType::Guid => write!(f, "guid"),
            RuntimeType::Object => write!(f, "object"),
            RuntimeType::Nullable(inner) => write!(f, "{}?", inner),
            RuntimeType::Array(inner) => write!(f, "{}[]", inner),
            RuntimeType::Enumerable(inner) => write!(f, "IEnumerable<{}>", inner),
            RuntimeType::Dictionary(key, value) => write!(f, "IDictionary<{}, {}>", key, value),
            RuntimeType::Named(name) => write!(f, "{}", name),
            RuntimeType::Generic(name) => write!(f, "{}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nullable_only_wraps_value_types_once() {
        let n = RuntimeType::nullable(RuntimeType::Decimal);
        assert_eq!(n, RuntimeType::Nullable(Box::new(RuntimeType::Decimal)));
        assert_eq!(RuntimeType::nullable(n.clone()), n);
        assert_eq!(RuntimeType::nullable(RuntimeType::String), RuntimeType::String);
    }

    #[test]
    fn primitive_safety() {
        assert!(RuntimeType::nullable(RuntimeType::Int).is_primitive_safe());
        assert!(RuntimeType::DateTimeOffset.is_primitive_safe());
        assert!(!RuntimeType::Object.is_primitive_safe());
        assert!(!RuntimeType::array(RuntimeType::Int).is_primitive_safe());
        assert!(!RuntimeType::named("FileEntity").is_primitive_safe());
    }

    #[test]
    fn display_reads_like_a_signature() {
        assert_eq!(RuntimeType::nullable(RuntimeType::Decimal).to_string(), "decimal?");
        assert_eq!(RuntimeType::array(RuntimeType::generic("T")).to_string(), "T[]");
    }

    #[test]
    fn substitute_replaces_nested_generics() {
        let mut bindings = indexmap::IndexMap::new();
        bindings.insert("T".to_string(), RuntimeType::Int);
        let ty = RuntimeType::enumerable(RuntimeType::nullable(RuntimeType::generic("T")));
        // Nullable(Generic) is built through the raw variant since generics are not value types
        let raw = RuntimeType::Enumerable(Box::new(RuntimeType::Nullable(Box::new(RuntimeType::generic("T")))));
        assert_eq!(ty, RuntimeType::enumerable(RuntimeType::generic("T")));
        assert_eq!(
            raw.substitute(&bindings),
            RuntimeType::enumerable(RuntimeType::nullable(RuntimeType::Int))
        );
    }
}
