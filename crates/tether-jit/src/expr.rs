//! The expression language the JIT lowers.
//!
//! This is the "function body" input of the compiler collaborator: enough
//! surface to write arithmetic over scalar parameters, read fields out of
//! pointer-passed records, and call previously compiled functions by
//! reference. Calls to handles are always lowered as imported-symbol
//! calls; a callee body is never copied into the calling module.

use std::fmt;
use std::sync::Arc;

use tether_types::Signature;

use crate::callable::ModuleArtifact;

/// A typed literal constant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Bool(bool),
}

/// Binary arithmetic over two operands of the same scalar type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// A reference to an already-compiled function, by symbol and type shape.
///
/// Carries everything a calling module needs to emit a declare-and-call:
/// the symbol name, the structural signature, and (for handles that were
/// never published to the process-wide registry) the concrete address to
/// pre-register on the module builder. The callee's owning module rides
/// along so its executable memory outlives every caller.
#[derive(Clone)]
pub struct ExternTarget {
    pub(crate) symbol: String,
    pub(crate) signature: Signature,
    pub(crate) address: Option<usize>,
    pub(crate) keepalive: Option<Arc<ModuleArtifact>>,
}

impl ExternTarget {
    /// A target resolved purely through the process-wide symbol registry.
    pub fn registered(symbol: impl Into<String>, signature: Signature) -> Self {
        ExternTarget {
            symbol: symbol.into(),
            signature,
            address: None,
            keepalive: None,
        }
    }

    /// A target with a known native address, pinned on the module builder
    /// of any unit that calls it. The address must stay valid for the
    /// process lifetime.
    pub fn pinned(symbol: impl Into<String>, signature: Signature, address: usize) -> Self {
        ExternTarget {
            symbol: symbol.into(),
            signature,
            address: Some(address),
            keepalive: None,
        }
    }

    /// The same callee, re-addressed through a published registry symbol:
    /// no pinned address, so resolution goes through the process-wide
    /// table, while the callee's owning module stays retained.
    pub fn via_registry_symbol(&self, symbol: impl Into<String>) -> ExternTarget {
        ExternTarget {
            symbol: symbol.into(),
            signature: self.signature.clone(),
            address: None,
            keepalive: self.keepalive.clone(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }
}

impl fmt::Debug for ExternTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternTarget")
            .field("symbol", &self.symbol)
            .field("signature", &self.signature.to_string())
            .field("address", &self.address)
            .finish()
    }
}

/// An expression tree over the parameters of one function.
#[derive(Debug, Clone)]
pub enum Expr {
    Lit(Literal),
    /// The n-th parameter, by position in the signature.
    Param(usize),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    /// A scalar field loaded from a pointer-passed record parameter.
    Field(usize, String),
    /// A call to an already-compiled function, arguments forwarded by value.
    Call(ExternTarget, Vec<Expr>),
}

impl Expr {
    pub fn lit_f64(v: f64) -> Expr {
        Expr::Lit(Literal::F64(v))
    }

    pub fn lit_i64(v: i64) -> Expr {
        Expr::Lit(Literal::I64(v))
    }

    pub fn param(index: usize) -> Expr {
        Expr::Param(index)
    }

    pub fn add(lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary(BinOp::Add, Box::new(lhs), Box::new(rhs))
    }

    pub fn sub(lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary(BinOp::Sub, Box::new(lhs), Box::new(rhs))
    }

    pub fn mul(lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary(BinOp::Mul, Box::new(lhs), Box::new(rhs))
    }

    pub fn div(lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary(BinOp::Div, Box::new(lhs), Box::new(rhs))
    }

    pub fn field(param: usize, name: impl Into<String>) -> Expr {
        Expr::Field(param, name.into())
    }

    /// Collects every call target in the tree, deduplicated by symbol.
    pub(crate) fn collect_targets(&self, out: &mut Vec<ExternTarget>) {
        match self {
            Expr::Lit(_) | Expr::Param(_) | Expr::Field(..) => {}
            Expr::Binary(_, lhs, rhs) => {
                lhs.collect_targets(out);
                rhs.collect_targets(out);
            }
            Expr::Call(target, args) => {
                if !out.iter().any(|t| t.symbol == target.symbol) {
                    out.push(target.clone());
                }
                for arg in args {
                    arg.collect_targets(out);
                }
            }
        }
    }
}

/// A plain, not-yet-compiled function: a name, parameter names, and a
/// body expression. The binding layer introspects the parameter names.
#[derive(Debug, Clone)]
pub struct PlainFn {
    pub name: String,
    pub params: Vec<String>,
    pub body: Expr,
}

impl PlainFn {
    pub fn new(
        name: impl Into<String>,
        params: Vec<impl Into<String>>,
        body: Expr,
    ) -> Self {
        PlainFn {
            name: name.into(),
            params: params.into_iter().map(Into::into).collect(),
            body,
        }
    }
}
