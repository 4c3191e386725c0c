//! Cranelift-backed JIT collaborators for cross-unit function binding.
//!
//! Three concerns live here:
//!
//! - the compiler: [`compile`] lowers a [`PlainFn`] body to native code in
//!   a fresh `JITModule` and returns a [`CompiledHandle`];
//! - the code builder: [`compile_forwarder`] emits a unit whose only
//!   content is an imported-symbol declaration plus one forwarding call;
//! - the execution engine's symbol side: [`register_symbol`] /
//!   [`resolve_symbol`], the process-wide name-to-address table every
//!   module consults when linking imports.

pub mod callable;
pub mod compiler;
mod error;
pub mod expr;
pub mod registry;

mod lower;

pub use callable::{Callable, CompiledHandle, Dispatcher, StandaloneFn};
pub use compiler::{compile, compile_forwarder, CompileOptions, OptLevel};
pub use error::JitError;
pub use expr::{BinOp, Expr, ExternTarget, Literal, PlainFn};
pub use registry::{register_symbol, resolve_symbol};
