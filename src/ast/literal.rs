use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use ordered_float::NotNan;
use serde::Serialize;

use crate::types::RuntimeType;

#[derive(Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Literal {
    Null,
    Bool(bool),
    /// Integral literal; the node type says whether it is a short, int or long
    Integer(i64),
    /// Exact decimal text
    Decimal(String),
    Real(NotNan<f64>),
    String(String),
    DateTime(NaiveDateTime),
    DateTimeOffset(DateTime<FixedOffset>),
}

const DATE_TIME_FORMATS: [&str; 4] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];
const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S %z", "%Y-%m-%d %H:%M:%S%:z"];

impl Literal {
    /// Type a freshly parsed literal gets before any contextual conversion.
    pub fn natural_type(&self) -> RuntimeType {
        match self {
            Literal::Null => RuntimeType::Null,
            Literal::Bool(_) => RuntimeType::Bool,
            Literal::Integer(i) if i32::try_from(*i).is_ok() => RuntimeType::Int,
            Literal::Integer(_) => RuntimeType::Long,
            Literal::Decimal(_) => RuntimeType::Decimal,
            Literal::Real(_) => RuntimeType::Double,
            Literal::String(_) => RuntimeType::String,
            Literal::DateTime(_) => RuntimeType::DateTime,
            Literal::DateTimeOffset(_) => RuntimeType::DateTimeOffset,
        }
    }

    /// Convert a numeric literal to `target` when no precision is lost.
    pub fn convert_numeric(&self, target: &RuntimeType) -> Option<Literal> {
        match (self, target) {
            (Literal::Integer(i), RuntimeType::Short) => i16::try_from(*i).ok().map(|_| self.clone()),
            (Literal::Integer(i), RuntimeType::Int) => i32::try_from(*i).ok().map(|_| self.clone()),
            (Literal::Integer(_), RuntimeType::Long) => Some(self.clone()),
            (Literal::Integer(i), RuntimeType::Decimal) => Some(Literal::Decimal(i.to_string())),
            (Literal::Integer(i), RuntimeType::Float) if i.unsigned_abs() <= 1 << 24 => {
                NotNan::new(*i as f64).ok().map(Literal::Real)
            }
            (Literal::Integer(i), RuntimeType::Double) if i.unsigned_abs() <= 1 << 53 => {
                NotNan::new(*i as f64).ok().map(Literal::Real)
            }
            (Literal::Decimal(_), RuntimeType::Decimal) => Some(self.clone()),
            (Literal::Real(_), RuntimeType::Double) => Some(self.clone()),
            _ => None,
        }
    }

    /// Parse a string literal compared against a date/time operand.
    pub fn parse_temporal(text: &str, target: &RuntimeType) -> Option<Literal> {
        match target.unwrap_nullable() {
            RuntimeType::DateTime => DATE_TIME_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
                .or_else(|| {
                    NaiveDate::parse_from_str(text, "%Y-%m-%d")
                        .ok()
                        .and_then(|d| d.and_hms_opt(0, 0, 0))
                })
                .map(Literal::DateTime),
            RuntimeType::DateTimeOffset => DateTime::parse_from_rfc3339(text)
                .ok()
                .or_else(|| OFFSET_FORMATS.iter().find_map(|f| DateTime::parse_from_str(text, f).ok()))
                .map(Literal::DateTimeOffset),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Literal::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => write!(f, "null"),
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Integer(i) => write!(f, "{}", i),
            Literal::Decimal(d) => write!(f, "{}", d),
            Literal::Real(r) => write!(f, "{}d", r.into_inner()),
            Literal::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Literal::DateTime(d) => write!(f, "'{}'", d.format("%Y-%m-%d %H:%M:%S")),
            Literal::DateTimeOffset(d) => write!(f, "'{}'", d.to_rfc3339()),
        }
    }
}

impl fmt::Debug for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => write!(f, "Null"),
            Literal::Bool(_) => write!(f, "Bool({})", self),
            Literal::Integer(_) => write!(f, "Integer({})", self),
            Literal::Decimal(_) => write!(f, "Decimal({})", self),
            Literal::Real(_) => write!(f, "Real({})", self),
            Literal::String(_) => write!(f, "String({})", self),
            Literal::DateTime(_) => write!(f, "DateTime({})", self),
            Literal::DateTimeOffset(_) => write!(f, "DateTimeOffset({})", self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_natural_type_depends_on_range() {
        assert_eq!(Literal::Integer(5).natural_type(), RuntimeType::Int);
        assert_eq!(Literal::Integer(i64::from(i32::MAX) + 1).natural_type(), RuntimeType::Long);
    }

    #[test]
    fn numeric_conversion_is_lossless_only() {
        assert_eq!(Literal::Integer(7).convert_numeric(&RuntimeType::Long), Some(Literal::Integer(7)));
        assert_eq!(Literal::Integer(7).convert_numeric(&RuntimeType::Decimal), Some(Literal::Decimal("7".into())));
        assert_eq!(Literal::Integer(70_000).convert_numeric(&RuntimeType::Short), None);
        assert_eq!(Literal::Decimal("1.5".into()).convert_numeric(&RuntimeType::Int), None);
    }

    #[test]
    fn temporal_parsing() {
        let dt = Literal::parse_temporal("2024-03-01", &RuntimeType::DateTime).unwrap();
        assert_eq!(dt.to_string(), "'2024-03-01 00:00:00'");
        assert!(Literal::parse_temporal("2024-03-01 10:20:30", &RuntimeType::nullable(RuntimeType::DateTime)).is_some());
        assert!(Literal::parse_temporal("2024-03-01T10:20:30+02:00", &RuntimeType::DateTimeOffset).is_some());
        assert!(Literal::parse_temporal("yesterday", &RuntimeType::DateTime).is_none());
    }

    #[test]
    fn strings_render_quoted() {
        assert_eq!(Literal::String("it's".into()).to_string(), "'it''s'");
    }
}
