use crate::types::{RuntimeType, TypeCatalog};

/// Answers "can a value of type A be supplied where type B is expected".
pub struct TypeCompatibility;

impl TypeCompatibility {
    /// Implicit numeric widening table. Only strictly wider integral targets;
    /// nothing widens into or out of `bool`, `decimal` or the floating types.
    pub fn widens_to(from: &RuntimeType, to: &RuntimeType) -> bool {
        use RuntimeType::*;
        matches!((from, to), (Short, Int) | (Short, Long) | (Int, Long))
    }

    fn value_compatible(arg: &RuntimeType, param: &RuntimeType) -> bool {
        arg == param || Self::widens_to(arg, param)
    }

    /// Argument-to-parameter compatibility used by overload resolution.
    pub fn can_supply(arg: &RuntimeType, param: &RuntimeType, catalog: &TypeCatalog) -> bool {
        if arg == param || param.is_object() {
            return true;
        }

        match (arg, param) {
            (RuntimeType::Null, p) => p.is_nullable() || p.is_reference_type(),
            (RuntimeType::Nullable(a), RuntimeType::Nullable(p)) => Self::value_compatible(a, p),
            (a, RuntimeType::Nullable(p)) => Self::value_compatible(a, p),
            (RuntimeType::Nullable(_), _) => false,
            (a, p) if a.is_value_type() && p.is_value_type() => Self::value_compatible(a, p),
            (a, p) if a.is_value_type() || p.is_value_type() => false,
            (a, p) => catalog.is_assignable(a, p),
        }
    }

    /// `a` is at least as specific as `b`: every value of `a` could be passed
    /// where `b` is expected.
    pub fn is_at_least_as_specific(a: &RuntimeType, b: &RuntimeType, catalog: &TypeCatalog) -> bool {
        a == b || Self::can_supply(a, b, catalog)
    }

    /// Result type of an arithmetic operator over two bare numeric types.
    pub fn promote_numeric(left: &RuntimeType, right: &RuntimeType) -> Option<RuntimeType> {
        use RuntimeType::*;
        if !left.is_numeric() || !right.is_numeric() {
            return None;
        }
        if left == right {
            return Some(left.clone());
        }
        if Self::widens_to(left, right) {
            return Some(right.clone());
        }
        if Self::widens_to(right, left) {
            return Some(left.clone());
        }
        match (left, right) {
            (l, Decimal) | (Decimal, l) if l.is_integral() => Some(Decimal),
            (l, Float) | (Float, l) if l.is_integral() => Some(Float),
            (l, Double) | (Double, l) if l.is_integral() || *l == Float => Some(Double),
            _ => None,
        }
    }

    /// Common type of several branch/argument types: identical types, numeric
    /// promotion, `null` folding into nullable/reference types.
    pub fn common_type(types: &[RuntimeType]) -> Option<RuntimeType> {
        let mut saw_null = false;
        let mut saw_nullable = false;
        let mut acc: Option<RuntimeType> = None;
        for ty in types {
            match ty {
                RuntimeType::Null => saw_null = true,
                other => {
                    saw_nullable |= other.is_nullable();
                    let bare = other.unwrap_nullable().clone();
                    acc = match acc {
                        None => Some(bare),
                        Some(current) if current == bare => Some(current),
                        Some(current) => Some(Self::promote_numeric(&current, &bare)?),
                    };
                }
            }
        }
        match acc {
            None => Some(RuntimeType::Null),
            Some(ty) if saw_null || saw_nullable => Some(RuntimeType::nullable(ty)),
            Some(ty) => Some(ty),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use RuntimeType::*;

    fn supply(a: RuntimeType, p: RuntimeType) -> bool {
        TypeCompatibility::can_supply(&a, &p, &TypeCatalog::new())
    }

    #[test]
    fn numeric_widening_is_upward_only() {
        let numerics = [Bool, Short, Int, Long, Decimal];
        for a in &numerics {
            for b in &numerics {
                let expected = a == b || matches!((a, b), (Short, Int) | (Short, Long) | (Int, Long));
                assert_eq!(supply(a.clone(), b.clone()), expected, "{a} -> {b}");
            }
        }
    }

    #[test]
    fn floats_only_accept_themselves() {
        assert!(!supply(Float, Double));
        assert!(!supply(Int, Double));
        assert!(!supply(Double, Decimal));
        assert!(supply(Double, Double));
    }

    #[test]
    fn nullable_accepts_bare_and_null() {
        let nd = RuntimeType::nullable(Decimal);
        assert!(supply(Decimal, nd.clone()));
        assert!(supply(nd.clone(), nd.clone()));
        assert!(supply(Null, nd.clone()));
        assert!(!supply(nd, Decimal));
        assert!(supply(Short, RuntimeType::nullable(Long)));
        assert!(!supply(Null, Int));
    }

    #[test]
    fn reference_types_accept_null_and_object_accepts_all() {
        assert!(supply(Null, String));
        assert!(supply(Int, Object));
        assert!(supply(RuntimeType::nullable(Int), Object));
        assert!(!supply(Int, String));
        assert!(!supply(String, Int));
    }

    #[test]
    fn promotion_for_arithmetic() {
        assert_eq!(TypeCompatibility::promote_numeric(&Short, &Long), Some(Long));
        assert_eq!(TypeCompatibility::promote_numeric(&Int, &Decimal), Some(Decimal));
        assert_eq!(TypeCompatibility::promote_numeric(&Long, &Double), Some(Double));
        assert_eq!(TypeCompatibility::promote_numeric(&Decimal, &Double), None);
        assert_eq!(TypeCompatibility::promote_numeric(&Int, &String), None);
    }

    #[test]
    fn common_type_folds_nulls() {
        assert_eq!(TypeCompatibility::common_type(&[Int, Null]), Some(RuntimeType::nullable(Int)));
        assert_eq!(TypeCompatibility::common_type(&[Int, Long]), Some(Long));
        assert_eq!(TypeCompatibility::common_type(&[String, Null]), Some(String));
        assert_eq!(TypeCompatibility::common_type(&[String, Int]), None);
    }
}
