//! Cross-unit function binding for JIT-compiled functions.
//!
//! Given an already-compiled function's native entry and its structural
//! signature, [`bind`] synthesizes a typed, callable stub in a fresh
//! compilation unit that declares the entry as an external symbol and
//! forwards its arguments — the callee's implementation is never lowered
//! into the caller's unit. Bindings compose: each application publishes
//! a fresh symbol, so chains of bound functions stay one-declaration
//! deep per link instead of growing by inlining.
//!
//! The mechanics: the extractor turns any [`Callable`](tether_jit::Callable)
//! shape into a descriptor (compiling it first if still plain), a
//! process-unique name is generated, the name-to-address pair is
//! published into the symbol table every JIT unit links against, and a
//! forwarding stub is compiled through the ordinary JIT path and handed
//! back as the binding result.

mod bind;
mod error;
mod extract;
mod names;
mod registry;
mod stub;

pub use bind::{bind, Binder};
pub use error::BindError;
pub use extract::FunctionDescriptor;
pub use names::{stub_symbol, unique_name};
pub use registry::{artifact_record, ArtifactRecord};

#[cfg(test)]
mod tests;
