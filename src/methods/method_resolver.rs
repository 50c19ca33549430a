use std::sync::Arc;

use thiserror::Error;
use tracing::trace;

use crate::{
    methods::{GenericBinder, GenericBindings, MethodDescriptor, MethodLibrary, NameCache, ParamKind},
    types::{RuntimeType, TypeCatalog, TypeCompatibility},
};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolutionError {
    #[error("no method {name}({}) matches; known signatures: [{}]", join_types(.args), .known.join("; "))]
    NotFound { name: String, args: Vec<RuntimeType>, known: Vec<String> },
    #[error("call {name}({}) is ambiguous between [{}]", join_types(.args), .candidates.join("; "))]
    Ambiguous { name: String, args: Vec<RuntimeType>, candidates: Vec<String> },
}

pub(crate) fn join_types(types: &[RuntimeType]) -> String {
    types.iter().map(|t| t.to_string()).collect::<Vec<_>>().join(", ")
}

/// Outcome of a successful resolution. Generic descriptors are returned
/// already instantiated.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMethod {
    pub descriptor: Arc<MethodDescriptor>,
    /// Mutator paired with an aggregate getter
    pub setter: Option<Arc<MethodDescriptor>>,
    pub return_type: RuntimeType,
}

impl ResolvedMethod {
    pub fn is_aggregate(&self) -> bool {
        self.setter.is_some()
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    original: Arc<MethodDescriptor>,
    instantiated: MethodDescriptor,
    /// formal type matched by each supplied argument
    formals: Vec<RuntimeType>,
    /// positional formals counted with the params-array expanded
    formal_count: usize,
    expanded_variadic: bool,
    /// bindings inferred from arguments, before unbound generics are closed
    bindings: GenericBindings,
}

/// Resolves call sites against a `MethodLibrary`.
pub struct MethodResolver<'a> {
    library: &'a MethodLibrary,
    catalog: &'a TypeCatalog,
    cache: &'a NameCache,
}

impl<'a> MethodResolver<'a> {
    pub fn new(library: &'a MethodLibrary, catalog: &'a TypeCatalog, cache: &'a NameCache) -> Self {
        Self { library, catalog, cache }
    }

    /// Resolve `name(args)` with an optional bound entity type. Aggregate
    /// getters are resolved together with their `Set<Name>` mutator.
    pub fn resolve(&self, name: &str, args: &[RuntimeType], entity: Option<&RuntimeType>) -> Result<ResolvedMethod, ResolutionError> {
        let overloads = self.library.lookup(name, self.cache);
        if overloads.iter().any(|d| d.is_aggregate_getter()) {
            return self.resolve_aggregate(name, &overloads, args, entity);
        }
        let mut best = self.resolve_among(name, &overloads, args, entity)?;
        Self::close_return(&mut best.instantiated);
        Ok(ResolvedMethod {
            return_type: best.instantiated.return_type.clone(),
            descriptor: Arc::new(best.instantiated),
            setter: None,
        })
    }

    /// Resolution without an entity, used before any source is bound.
    pub fn resolve_raw(&self, name: &str, args: &[RuntimeType]) -> Result<ResolvedMethod, ResolutionError> {
        self.resolve(name, args, None)
    }

    pub fn is_aggregate(&self, name: &str) -> bool {
        self.library.lookup(name, self.cache).iter().any(|d| d.is_aggregate_getter())
    }

    fn resolve_aggregate(
        &self,
        name: &str,
        overloads: &[Arc<MethodDescriptor>],
        args: &[RuntimeType],
        entity: Option<&RuntimeType>,
    ) -> Result<ResolvedMethod, ResolutionError> {
        let getters: Vec<_> = overloads.iter().filter(|d| d.is_aggregate_getter()).cloned().collect();

        let mut getter_args = vec![RuntimeType::String];
        getter_args.extend(args.iter().skip(1).cloned());
        let getter = self.resolve_among(name, &getters, &getter_args, entity)?;

        let setter_name = MethodDescriptor::setter_name(&getter.original.name);
        let setters = self.library.lookup(&setter_name, self.cache);
        let mut setter_args = vec![RuntimeType::String];
        setter_args.extend(args.iter().cloned());
        let setter = self.resolve_among(&setter_name, &setters, &setter_args, entity)?;

        // a generic getter result is fixed by what the mutator accumulates
        let mut instantiated = getter.instantiated;
        instantiated.return_type = instantiated.return_type.substitute(&setter.bindings);
        Self::close_return(&mut instantiated);
        let mut setter_instantiated = setter.instantiated;
        Self::close_return(&mut setter_instantiated);
        let setter = setter_instantiated;

        trace!(getter = %instantiated, setter = %setter, "resolved aggregate pair");
        Ok(ResolvedMethod {
            return_type: instantiated.return_type.clone(),
            descriptor: Arc::new(instantiated),
            setter: Some(Arc::new(setter)),
        })
    }

    fn close_return(descriptor: &mut MethodDescriptor) {
        if descriptor.return_type.is_generic() {
            let mut closing = GenericBindings::new();
            GenericBinder::close(&descriptor.generic_params, &mut closing);
            descriptor.return_type = descriptor.return_type.substitute(&closing);
        }
    }

    fn resolve_among(
        &self,
        name: &str,
        overloads: &[Arc<MethodDescriptor>],
        args: &[RuntimeType],
        entity: Option<&RuntimeType>,
    ) -> Result<Candidate, ResolutionError> {
        let matches: Vec<Candidate> = overloads
            .iter()
            .filter_map(|d| self.try_match(d, args, entity))
            .collect();

        if matches.is_empty() {
            return Err(ResolutionError::NotFound {
                name: name.to_string(),
                args: args.to_vec(),
                known: overloads.iter().map(|d| d.to_string()).collect(),
            });
        }

        self.pick_best(name, args, matches)
    }

    fn try_match(&self, descriptor: &Arc<MethodDescriptor>, args: &[RuntimeType], entity: Option<&RuntimeType>) -> Option<Candidate> {
        if !descriptor.accepts_arg_count(args.len()) {
            trace!(method = %descriptor, supplied = args.len(), "arity mismatch");
            return None;
        }

        let mut bindings = GenericBindings::new();

        for param in descriptor.params.iter().filter(|p| p.kind == ParamKind::InjectedSource) {
            let entity = entity?;
            if param.ty.is_generic() {
                if !GenericBinder::unify(&param.ty, entity, &mut bindings) {
                    return None;
                }
            } else if !self.catalog.is_assignable(entity, &param.ty) {
                trace!(method = %descriptor, %entity, capability = %param.ty, "entity lacks capability");
                return None;
            }
        }

        let positional: Vec<_> = descriptor.positional().collect();
        let fixed_len = positional.iter().take_while(|p| !p.variadic).count();
        let variadic = positional.get(fixed_len).copied();

        // formal type expected at each supplied position
        let mut formals: Vec<RuntimeType> = Vec::with_capacity(args.len());
        let mut expanded_variadic = false;
        let mut formal_count = positional.len();
        for (i, _) in args.iter().enumerate() {
            if i < fixed_len {
                formals.push(positional[i].ty.clone());
            } else if let Some(v) = variadic {
                formals.push(v.ty.clone());
            }
        }

        if let Some(v) = variadic {
            let trailing = &args[fixed_len.min(args.len())..];
            let passes_array = trailing.len() == 1 && trailing[0].element_type().is_some();
            if !passes_array {
                let element = v.ty.element_type().cloned().unwrap_or(RuntimeType::Object);
                for f in formals.iter_mut().skip(fixed_len) {
                    *f = element.clone();
                }
                expanded_variadic = !trailing.is_empty();
                formal_count = fixed_len + trailing.len();
                if element.is_generic() && !trailing.is_empty() {
                    let common = GenericBinder::variadic_element(trailing);
                    if !GenericBinder::unify(&element, &common, &mut bindings) {
                        return None;
                    }
                }
            }
        }

        for (formal, arg) in formals.iter().zip(args) {
            if !GenericBinder::unify(formal, arg, &mut bindings) {
                return None;
            }
        }
        let open = bindings.clone();
        if descriptor.is_generic() {
            GenericBinder::close(&descriptor.generic_params, &mut bindings);
        }

        let formals: Vec<RuntimeType> = formals.iter().map(|f| f.substitute(&bindings)).collect();
        for (formal, arg) in formals.iter().zip(args) {
            if !TypeCompatibility::can_supply(arg, formal, self.catalog) {
                trace!(method = %descriptor, %arg, %formal, "argument not compatible");
                return None;
            }
        }

        let mut instantiated = (**descriptor).clone();
        if descriptor.is_generic() {
            for p in instantiated.params.iter_mut() {
                p.ty = p.ty.substitute(&bindings);
            }
            instantiated.return_type = instantiated.return_type.substitute(&open);
        }

        Some(Candidate {
            original: descriptor.clone(),
            instantiated,
            formals,
            formal_count,
            expanded_variadic,
            bindings: open,
        })
    }

    fn pick_best(&self, name: &str, args: &[RuntimeType], mut matches: Vec<Candidate>) -> Result<Candidate, ResolutionError> {
        if matches.iter().any(|c| !c.original.is_generic()) {
            matches.retain(|c| !c.original.is_generic());
        }

        if let Some(fewest) = matches.iter().map(|c| c.formal_count).min() {
            matches.retain(|c| c.formal_count == fewest);
        }

        if matches.iter().any(|c| !c.expanded_variadic) {
            matches.retain(|c| !c.expanded_variadic);
        }

        if matches.len() == 1 {
            return Ok(matches.remove(0));
        }

        let most_derived: Vec<usize> = (0..matches.len())
            .filter(|&i| {
                matches.iter().enumerate().all(|(j, other)| {
                    i == j
                        || matches[i]
                            .formals
                            .iter()
                            .zip(&other.formals)
                            .all(|(a, b)| TypeCompatibility::is_at_least_as_specific(a, b, self.catalog))
                })
            })
            .collect();

        if let [winner] = most_derived.as_slice() {
            return Ok(matches.swap_remove(*winner));
        }

        Err(ResolutionError::Ambiguous {
            name: name.to_string(),
            args: args.to_vec(),
            candidates: matches.iter().map(|c| c.original.to_string()).collect(),
        })
    }
}
