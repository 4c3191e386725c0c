//! The closed type universe shared by the JIT and the binding layer.
//!
//! Signatures are built from [`Ty`] values: either a scalar from the fixed
//! primitive set, or a name that resolves against the process-wide
//! [`TypeUniverse`] to a record or named-tuple definition. The universe is
//! closed: only registered definitions resolve, everything else is an
//! [`TypeError::UnknownType`].

use std::fmt;
use thiserror::Error;

mod layout;
mod universe;

pub use layout::{record_layout, RecordLayout};
pub use universe::{RecordDef, RecordKind, ResolvedTy, TypeUniverse};

/// Errors from type resolution and layout computation.
#[derive(Error, Debug)]
pub enum TypeError {
    #[error("unknown type `{0}`: not registered in the type universe")]
    UnknownType(String),

    #[error("type `{0}` is already defined in the type universe")]
    DuplicateType(String),

    #[error("malformed signature: {0}")]
    MalformedSignature(String),

    #[error("layout computation failed: {0}")]
    Repc(#[from] repc::Error),

    #[error("layout missing for field {0} after computation")]
    MissingFieldLayout(usize),
}

/// The primitive slice of the closed type universe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Bool,
}

impl ScalarType {
    /// Size of the scalar in bytes as laid out in memory and in records.
    pub fn size_bytes(self) -> usize {
        match self {
            ScalarType::I8 | ScalarType::U8 | ScalarType::Bool => 1,
            ScalarType::I16 | ScalarType::U16 => 2,
            ScalarType::I32 | ScalarType::U32 | ScalarType::F32 => 4,
            ScalarType::I64 | ScalarType::U64 | ScalarType::F64 => 8,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, ScalarType::F32 | ScalarType::F64)
    }

    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            ScalarType::U8 | ScalarType::U16 | ScalarType::U32 | ScalarType::U64
        )
    }

    fn name(self) -> &'static str {
        match self {
            ScalarType::I8 => "i8",
            ScalarType::I16 => "i16",
            ScalarType::I32 => "i32",
            ScalarType::I64 => "i64",
            ScalarType::U8 => "u8",
            ScalarType::U16 => "u16",
            ScalarType::U32 => "u32",
            ScalarType::U64 => "u64",
            ScalarType::F32 => "f32",
            ScalarType::F64 => "f64",
            ScalarType::Bool => "bool",
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One component of a signature: a scalar, or a named reference into the
/// type universe. Structured values are passed and returned by pointer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Ty {
    Scalar(ScalarType),
    Named(String),
}

impl Ty {
    pub fn named(name: impl Into<String>) -> Self {
        Ty::Named(name.into())
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Scalar(s) => write!(f, "{s}"),
            Ty::Named(n) => f.write_str(n),
        }
    }
}

impl From<ScalarType> for Ty {
    fn from(s: ScalarType) -> Self {
        Ty::Scalar(s)
    }
}

/// An ordered sequence of parameter types plus one return type.
///
/// Signatures are immutable once constructed and compared structurally:
/// two signatures are equal iff their return types and their ordered
/// parameter types are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    params: Vec<Ty>,
    ret: Ty,
}

impl Signature {
    pub fn new(params: Vec<Ty>, ret: Ty) -> Self {
        Signature { params, ret }
    }

    pub fn params(&self) -> &[Ty] {
        &self.params
    }

    pub fn ret(&self) -> &Ty {
        &self.ret
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Checks structural well-formedness without touching the universe:
    /// named type references must be non-empty identifiers.
    pub fn validate(&self) -> Result<(), TypeError> {
        for ty in self.params.iter().chain(std::iter::once(&self.ret)) {
            if let Ty::Named(name) = ty {
                if name.is_empty() {
                    return Err(TypeError::MalformedSignature(
                        "empty named-type reference".to_string(),
                    ));
                }
                if !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
                    return Err(TypeError::MalformedSignature(format!(
                        "named-type reference `{name}` is not an identifier"
                    )));
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{p}")?;
        }
        write!(f, ") -> {}", self.ret)
    }
}
