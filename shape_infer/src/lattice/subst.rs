//! Type-variable bindings.
//!
//! Variables are allocated by the store and bound at most once; a bound
//! variable may point at another variable, so lookups chase chains.

use super::types::{TupleType, Type, VarId};

#[derive(Debug, Clone, Default)]
pub struct Substitution {
    bindings: Vec<Option<Type>>,
}

impl Substitution {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an unbound variable.
    pub fn fresh_var(&mut self) -> Type {
        let id = VarId(self.bindings.len() as u32);
        self.bindings.push(None);
        Type::Var(id)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Direct binding of `var`. Variables this store never allocated are unbound.
    pub fn lookup(&self, var: VarId) -> Option<&Type> {
        self.bindings.get(var.0 as usize).and_then(Option::as_ref)
    }

    pub fn bind(&mut self, var: VarId, ty: Type) {
        let index = var.0 as usize;
        if index >= self.bindings.len() {
            self.bindings.resize(index + 1, None);
        }
        self.bindings[index] = Some(ty);
    }

    /// Follow variable chains until reaching an unbound variable or a
    /// non-variable type. Only the outermost constructor is resolved.
    pub fn deref(&self, ty: &Type) -> Type {
        let mut current = ty;
        while let Type::Var(v) = current {
            match self.lookup(*v) {
                Some(next) => current = next,
                None => break,
            }
        }
        current.clone()
    }

    /// Replace every bound variable inside `ty` with its binding.
    pub fn resolve(&self, ty: &Type) -> Type {
        match self.deref(ty) {
            Type::List(elem) => Type::list(self.resolve(&elem)),
            Type::Tuple(TupleType::Fixed(elems)) => {
                Type::tuple(elems.iter().map(|e| self.resolve(e)).collect())
            }
            Type::Tuple(TupleType::Homogeneous(elem)) => Type::tuple_of(self.resolve(&elem)),
            Type::Dict(k, v) => Type::dict(self.resolve(&k), self.resolve(&v)),
            Type::Optional(inner) => Type::optional(self.resolve(&inner)),
            Type::Arrow { params, ret } => Type::Arrow {
                params: params.iter().map(|p| self.resolve(p)).collect(),
                ret: Box::new(self.resolve(&ret)),
            },
            other => other,
        }
    }

    /// Mark every variable mentioned in `ty` as allocated, so later fresh
    /// variables cannot collide with variables built outside this store.
    pub fn reserve(&mut self, ty: &Type) {
        match ty {
            Type::Var(v) => {
                let index = v.0 as usize;
                if index >= self.bindings.len() {
                    self.bindings.resize(index + 1, None);
                }
            }
            Type::List(elem) | Type::Optional(elem) => self.reserve(elem),
            Type::Tuple(TupleType::Homogeneous(elem)) => self.reserve(elem),
            Type::Tuple(TupleType::Fixed(elems)) => elems.iter().for_each(|e| self.reserve(e)),
            Type::Dict(k, v) => {
                self.reserve(k);
                self.reserve(v);
            }
            Type::Arrow { params, ret } => {
                params.iter().for_each(|p| self.reserve(p));
                self.reserve(ret);
            }
            _ => {}
        }
    }

    /// Whether `var` appears in `ty` after dereferencing.
    pub fn occurs(&self, var: VarId, ty: &Type) -> bool {
        match self.deref(ty) {
            Type::Var(v) => v == var,
            Type::List(elem) | Type::Optional(elem) => self.occurs(var, &elem),
            Type::Tuple(TupleType::Homogeneous(elem)) => self.occurs(var, &elem),
            Type::Tuple(TupleType::Fixed(elems)) => elems.iter().any(|e| self.occurs(var, e)),
            Type::Dict(k, v) => self.occurs(var, &k) || self.occurs(var, &v),
            Type::Arrow { params, ret } => {
                params.iter().any(|p| self.occurs(var, p)) || self.occurs(var, &ret)
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_fresh_vars_are_distinct() {
        let mut subst = Substitution::new();
        let a = subst.fresh_var();
        let b = subst.fresh_var();
        assert_ne!(a, b);
        assert_eq!(subst.len(), 2);
    }

    #[test]
    fn test_deref_follows_chains() {
        let mut subst = Substitution::new();
        let Type::Var(a) = subst.fresh_var() else { unreachable!() };
        let b = subst.fresh_var();
        let Type::Var(b_id) = b else { unreachable!() };
        subst.bind(a, b.clone());
        assert_eq!(subst.deref(&Type::Var(a)), b);
        subst.bind(b_id, Type::int());
        assert_eq!(subst.deref(&Type::Var(a)), Type::int());
    }

    #[test]
    fn test_deref_is_idempotent() {
        let mut subst = Substitution::new();
        let head = subst.fresh_var();
        let middle = subst.fresh_var();
        let tail = subst.fresh_var();
        let unbound = subst.fresh_var();
        let (Type::Var(h), Type::Var(m), Type::Var(t)) = (&head, &middle, &tail) else {
            unreachable!()
        };
        subst.bind(*h, middle.clone());
        subst.bind(*m, tail.clone());
        subst.bind(*t, Type::list(unbound.clone()));

        let samples = [
            head,
            middle,
            unbound,
            Type::int_const(3),
            Type::optional(Type::Str),
            Type::tuple(vec![tail, Type::None]),
        ];
        for ty in &samples {
            let once = subst.deref(ty);
            assert_eq!(subst.deref(&once), once, "deref of {ty:?}");
        }
        assert_eq!(subst.deref(&samples[0]), Type::list(samples[2].clone()));
    }

    #[test]
    fn test_resolve_is_deep() {
        let mut subst = Substitution::new();
        let v = subst.fresh_var();
        let Type::Var(id) = v else { unreachable!() };
        let t = Type::list(Type::tuple(vec![v.clone(), Type::Str]));
        subst.bind(id, Type::float());
        assert_eq!(
            subst.resolve(&t),
            Type::list(Type::tuple(vec![Type::float(), Type::Str]))
        );
    }

    #[test]
    fn test_unknown_vars_are_unbound() {
        let subst = Substitution::new();
        assert_eq!(subst.lookup(VarId(40)), None);
        assert_eq!(subst.deref(&Type::Var(VarId(40))), Type::Var(VarId(40)));
    }

    #[test]
    fn test_occurs() {
        let mut subst = Substitution::new();
        let v = subst.fresh_var();
        let Type::Var(id) = v else { unreachable!() };
        assert!(subst.occurs(id, &Type::list(v.clone())));
        assert!(!subst.occurs(id, &Type::list(Type::int())));
    }

    #[test]
    fn test_reserve_skips_outside_vars() {
        let mut subst = Substitution::new();
        subst.reserve(&Type::list(Type::Var(VarId(3))));
        assert_eq!(subst.len(), 4);
        assert_eq!(subst.fresh_var(), Type::Var(VarId(4)));
    }
}
