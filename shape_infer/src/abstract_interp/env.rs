//! Typing environments threaded through control flow.
//!
//! A [`Scope`] pairs the local name environment with the attribute
//! environment of live objects. Branches and loop passes work on copies of
//! the scope and are merged back with [`Scope::merge`], which joins the types
//! both sides know and carries over names only one side bound.

use std::collections::BTreeMap;

use crate::error::UnifyError;
use crate::host::ObjectId;
use crate::lattice::{join, Substitution, Type};

/// A binding two control-flow paths gave incompatible types.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeConflict {
    /// Variable name, or `object#N.attr` for an attribute.
    pub name: String,
    pub error: UnifyError,
}

/// Local variable types.
///
/// # Example
/// ```
/// use shape_infer::abstract_interp::TypeEnv;
/// use shape_infer::lattice::{Substitution, Type};
///
/// let mut subst = Substitution::new();
/// let mut then_env = TypeEnv::new();
/// then_env.set("x", Type::int());
/// let mut else_env = TypeEnv::new();
/// else_env.set("x", Type::float());
/// else_env.set("y", Type::Str);
///
/// let merged = then_env.merge(&else_env, &mut subst).unwrap();
/// assert_eq!(merged.get("x"), Some(&Type::float()));
/// assert_eq!(merged.get("y"), Some(&Type::Str));
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TypeEnv {
    bindings: BTreeMap<String, Type>,
}

impl TypeEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Type> {
        self.bindings.get(name)
    }

    /// Rebinds `name`, replacing any previous type.
    pub fn set(&mut self, name: impl Into<String>, ty: Type) {
        self.bindings.insert(name.into(), ty);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Type)> {
        self.bindings.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Join of two environments at a control-flow merge.
    pub fn merge(&self, other: &TypeEnv, subst: &mut Substitution) -> Result<TypeEnv, MergeConflict> {
        Ok(TypeEnv {
            bindings: merge_maps(&self.bindings, &other.bindings, subst, |name| name.clone())?,
        })
    }
}

/// Field types of objects, keyed by object handle and field name, so every
/// alias of one object shares the same entries.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AttrEnv {
    bindings: BTreeMap<(ObjectId, String), Type>,
}

impl AttrEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, object: ObjectId, attr: &str) -> Option<&Type> {
        self.bindings.get(&(object, attr.to_string()))
    }

    pub fn set(&mut self, object: ObjectId, attr: impl Into<String>, ty: Type) {
        self.bindings.insert((object, attr.into()), ty);
    }

    pub fn contains(&self, object: ObjectId, attr: &str) -> bool {
        self.bindings.contains_key(&(object, attr.to_string()))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &str, &Type)> {
        self.bindings
            .iter()
            .map(|((object, attr), ty)| (*object, attr.as_str(), ty))
    }

    pub fn merge(&self, other: &AttrEnv, subst: &mut Substitution) -> Result<AttrEnv, MergeConflict> {
        Ok(AttrEnv {
            bindings: merge_maps(&self.bindings, &other.bindings, subst, |(object, attr)| {
                format!("{object}.{attr}")
            })?,
        })
    }
}

fn merge_maps<K: Ord + Clone>(
    first: &BTreeMap<K, Type>,
    second: &BTreeMap<K, Type>,
    subst: &mut Substitution,
    describe: impl Fn(&K) -> String,
) -> Result<BTreeMap<K, Type>, MergeConflict> {
    let mut merged = BTreeMap::new();
    for (key, ty) in first {
        let ty = match second.get(key) {
            Some(other) => join(subst, ty, other).map_err(|error| MergeConflict {
                name: describe(key),
                error,
            })?,
            None => ty.clone(),
        };
        merged.insert(key.clone(), ty);
    }
    for (key, ty) in second {
        if !first.contains_key(key) {
            merged.insert(key.clone(), ty.clone());
        }
    }
    Ok(merged)
}

/// Everything a statement can rebind: locals and object fields.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Scope {
    pub vars: TypeEnv,
    pub attrs: AttrEnv,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&self, other: &Scope, subst: &mut Substitution) -> Result<Scope, MergeConflict> {
        Ok(Scope {
            vars: self.vars.merge(&other.vars, subst)?,
            attrs: self.attrs.merge(&other.attrs, subst)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::{known_shape, DType, ShapeElem};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_merge_joins_shapes() {
        let mut subst = Substitution::new();
        let mut a = Scope::new();
        a.vars.set("x", Type::ndarray(DType::Float32, known_shape(&[3, 5])));
        let mut b = Scope::new();
        b.vars.set("x", Type::ndarray(DType::Float32, known_shape(&[3, 4])));

        let merged = a.merge(&b, &mut subst).unwrap();
        assert_eq!(
            merged.vars.get("x"),
            Some(&Type::ndarray(
                DType::Float32,
                vec![ShapeElem::Known(3), ShapeElem::Unknown]
            ))
        );
    }

    #[test]
    fn test_one_sided_names_are_carried() {
        let mut subst = Substitution::new();
        let mut a = TypeEnv::new();
        a.set("only_then", Type::Bool);
        let mut b = TypeEnv::new();
        b.set("only_else", Type::Str);
        let merged = a.merge(&b, &mut subst).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.get("only_then"), Some(&Type::Bool));
        assert_eq!(merged.get("only_else"), Some(&Type::Str));
    }

    #[test]
    fn test_conflicting_attribute_names_the_field() {
        let mut subst = Substitution::new();
        let obj = ObjectId(2);
        let mut a = AttrEnv::new();
        a.set(obj, "cache", Type::list(Type::int()));
        let mut b = AttrEnv::new();
        b.set(obj, "cache", Type::dict(Type::Str, Type::int()));

        let conflict = a.merge(&b, &mut subst).unwrap_err();
        assert_eq!(conflict.name, "object#2.cache");
        assert!(matches!(conflict.error, UnifyError::Mismatch { .. }));
    }
}
