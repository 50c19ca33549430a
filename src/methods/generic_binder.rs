use indexmap::IndexMap;

use crate::types::{RuntimeType, TypeCompatibility};

pub type GenericBindings = IndexMap<String, RuntimeType>;

/// Infers generic parameters of a method from supplied argument types.
pub struct GenericBinder;

impl GenericBinder {
    /// Unify a formal type against an actual argument type, recording the
    /// bindings. Arrays and enumerables are unwrapped one level. Returns false
    /// when the argument can never satisfy the formal shape.
    pub fn unify(formal: &RuntimeType, actual: &RuntimeType, bindings: &mut GenericBindings) -> bool {
        if !formal.is_generic() {
            return true;
        }
        match formal {
            RuntimeType::Generic(name) => Self::bind(name, actual, bindings),
            RuntimeType::Array(inner) | RuntimeType::Enumerable(inner) => match actual.element_type() {
                Some(element) => Self::unify(inner, element, bindings),
                None => false,
            },
            RuntimeType::Nullable(inner) => Self::unify(inner, actual.unwrap_nullable(), bindings),
            RuntimeType::Dictionary(fk, fv) => match actual {
                RuntimeType::Dictionary(ak, av) => Self::unify(fk, ak, bindings) && Self::unify(fv, av, bindings),
                _ => false,
            },
            _ => true,
        }
    }

    fn bind(name: &str, actual: &RuntimeType, bindings: &mut GenericBindings) -> bool {
        // `null` carries no information; the parameter may still be bound by another argument
        if *actual == RuntimeType::Null {
            return true;
        }
        match bindings.get(name) {
            None => {
                bindings.insert(name.to_string(), actual.clone());
                true
            }
            Some(existing) if existing == actual => true,
            Some(existing) => match TypeCompatibility::common_type(&[existing.clone(), actual.clone()]) {
                Some(common) => {
                    bindings.insert(name.to_string(), common);
                    true
                }
                None => false,
            },
        }
    }

    /// Element type for a generic params-array built from the trailing arguments.
    pub fn variadic_element(trailing: &[RuntimeType]) -> RuntimeType {
        match trailing {
            [] => RuntimeType::Object,
            [first, rest @ ..] if rest.iter().all(|t| t == first) => first.clone(),
            all => TypeCompatibility::common_type(all).unwrap_or(RuntimeType::Object),
        }
    }

    /// Any generic left unbound becomes `Object`.
    pub fn close(generic_params: &[String], bindings: &mut GenericBindings) {
        for name in generic_params {
            bindings.entry(name.clone()).or_insert(RuntimeType::Object);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binds_through_arrays_and_enumerables() {
        let mut b = GenericBindings::new();
        let formal = RuntimeType::enumerable(RuntimeType::generic("T"));
        assert!(GenericBinder::unify(&formal, &RuntimeType::array(RuntimeType::String), &mut b));
        assert_eq!(b.get("T"), Some(&RuntimeType::String));
    }

    #[test]
    fn conflicting_bindings_promote_or_fail() {
        let mut b = GenericBindings::new();
        let t = RuntimeType::generic("T");
        assert!(GenericBinder::unify(&t, &RuntimeType::Int, &mut b));
        assert!(GenericBinder::unify(&t, &RuntimeType::Long, &mut b));
        assert_eq!(b.get("T"), Some(&RuntimeType::Long));
        assert!(!GenericBinder::unify(&t, &RuntimeType::String, &mut b));
    }

    #[test]
    fn scalar_argument_cannot_fill_array_formal() {
        let mut b = GenericBindings::new();
        let formal = RuntimeType::array(RuntimeType::generic("T"));
        assert!(!GenericBinder::unify(&formal, &RuntimeType::Int, &mut b));
    }

    #[test]
    fn variadic_element_from_trailing_arguments() {
        use RuntimeType::*;
        assert_eq!(GenericBinder::variadic_element(&[Int, Int]), Int);
        assert_eq!(GenericBinder::variadic_element(&[Int, Long]), Long);
        assert_eq!(GenericBinder::variadic_element(&[Int, String]), Object);
    }

    #[test]
    fn null_arguments_leave_parameter_open() {
        let mut b = GenericBindings::new();
        assert!(GenericBinder::unify(&RuntimeType::generic("T"), &RuntimeType::Null, &mut b));
        assert!(b.is_empty());
        GenericBinder::close(&["T".to_string()], &mut b);
        assert_eq!(b.get("T"), Some(&RuntimeType::Object));
    }
}
