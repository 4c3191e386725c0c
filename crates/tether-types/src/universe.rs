//! The process-wide registry of structured type definitions.

use std::sync::{Arc, Mutex, OnceLock};

use rustc_hash::FxHashMap;

use crate::{ScalarType, Ty, TypeError};

/// Distinguishes user-facing records from named tuples. Both lay out the
/// same way; named tuples get positional field names (`_0`, `_1`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Record,
    NamedTuple,
}

/// A structured type in the closed universe: an ordered list of scalar
/// fields with C-compatible layout.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordDef {
    pub name: String,
    pub kind: RecordKind,
    pub fields: Vec<(String, ScalarType)>,
}

impl RecordDef {
    pub fn record(
        name: impl Into<String>,
        fields: Vec<(impl Into<String>, ScalarType)>,
    ) -> Self {
        RecordDef {
            name: name.into(),
            kind: RecordKind::Record,
            fields: fields
                .into_iter()
                .map(|(n, ty)| (n.into(), ty))
                .collect(),
        }
    }

    pub fn named_tuple(name: impl Into<String>, elements: Vec<ScalarType>) -> Self {
        RecordDef {
            name: name.into(),
            kind: RecordKind::NamedTuple,
            fields: elements
                .into_iter()
                .enumerate()
                .map(|(i, ty)| (format!("_{i}"), ty))
                .collect(),
        }
    }

    /// Index of a field by name.
    pub fn field_index(&self, field: &str) -> Option<usize> {
        self.fields.iter().position(|(n, _)| n == field)
    }
}

/// A signature component after resolution against the universe.
#[derive(Debug, Clone)]
pub enum ResolvedTy {
    Scalar(ScalarType),
    Record(Arc<RecordDef>),
}

/// The closed type universe. Definitions are registered once and live for
/// the process; duplicate names are rejected rather than replaced.
pub struct TypeUniverse {
    defs: Mutex<FxHashMap<String, Arc<RecordDef>>>,
}

impl TypeUniverse {
    fn new() -> Self {
        TypeUniverse {
            defs: Mutex::new(FxHashMap::default()),
        }
    }

    /// The process-wide universe instance.
    pub fn global() -> &'static TypeUniverse {
        static UNIVERSE: OnceLock<TypeUniverse> = OnceLock::new();
        UNIVERSE.get_or_init(TypeUniverse::new)
    }

    /// Registers a structured type definition. The name must be fresh.
    pub fn define(&self, def: RecordDef) -> Result<(), TypeError> {
        let mut defs = self.defs.lock().unwrap();
        if defs.contains_key(&def.name) {
            return Err(TypeError::DuplicateType(def.name));
        }
        defs.insert(def.name.clone(), Arc::new(def));
        Ok(())
    }

    /// Looks up a structured type by name.
    pub fn resolve(&self, name: &str) -> Result<Arc<RecordDef>, TypeError> {
        let defs = self.defs.lock().unwrap();
        defs.get(name)
            .cloned()
            .ok_or_else(|| TypeError::UnknownType(name.to_string()))
    }

    /// Resolves one signature component. Scalars resolve trivially; named
    /// references must exist in the universe.
    pub fn resolve_ty(&self, ty: &Ty) -> Result<ResolvedTy, TypeError> {
        match ty {
            Ty::Scalar(s) => Ok(ResolvedTy::Scalar(*s)),
            Ty::Named(name) => self.resolve(name).map(ResolvedTy::Record),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_and_resolve() {
        let universe = TypeUniverse::new();
        universe
            .define(RecordDef::record(
                "UVec2",
                vec![("x", ScalarType::F64), ("y", ScalarType::F64)],
            ))
            .unwrap();

        let def = universe.resolve("UVec2").unwrap();
        assert_eq!(def.fields.len(), 2);
        assert_eq!(def.field_index("y"), Some(1));
        assert_eq!(def.kind, RecordKind::Record);
    }

    #[test]
    fn unknown_type_is_an_error() {
        let universe = TypeUniverse::new();
        assert!(matches!(
            universe.resolve("NoSuchType"),
            Err(TypeError::UnknownType(_))
        ));
        assert!(matches!(
            universe.resolve_ty(&Ty::named("NoSuchType")),
            Err(TypeError::UnknownType(_))
        ));
    }

    #[test]
    fn duplicate_definition_rejected() {
        let universe = TypeUniverse::new();
        universe
            .define(RecordDef::named_tuple("UPair", vec![ScalarType::I64; 2]))
            .unwrap();
        let err = universe.define(RecordDef::named_tuple("UPair", vec![ScalarType::I64; 2]));
        assert!(matches!(err, Err(TypeError::DuplicateType(_))));
    }

    #[test]
    fn named_tuple_fields_are_positional() {
        let def = RecordDef::named_tuple("T3", vec![ScalarType::F32; 3]);
        assert_eq!(def.fields[0].0, "_0");
        assert_eq!(def.fields[2].0, "_2");
        assert_eq!(def.kind, RecordKind::NamedTuple);
    }

    #[test]
    fn scalars_resolve_without_registration() {
        let universe = TypeUniverse::new();
        let resolved = universe.resolve_ty(&Ty::Scalar(ScalarType::F64)).unwrap();
        assert!(matches!(resolved, ResolvedTy::Scalar(ScalarType::F64)));
    }
}
