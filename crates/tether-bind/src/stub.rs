//! Synthesis of the forwarding stub for one published symbol.

use tether_jit::{compile_forwarder, CompileOptions, CompiledHandle, ExternTarget};
use tether_types::{Signature, TypeError, TypeUniverse};

use crate::{names, BindError};

/// Synthesizes the callable stub for a published symbol: an imported
/// declaration of `target` plus a forwarding function compiled through
/// the standard JIT path, so the result behaves like any directly
/// compiled function to further callers.
///
/// The symbol must already be published; the import resolves through the
/// process-wide table no later than the stub's first invocation.
///
/// # Panics
///
/// Panics if `arg_names` does not match the signature's arity; that is a
/// programmer error in the caller, not a recoverable condition.
pub(crate) fn synthesize(
    unique_name: &str,
    arg_names: &[String],
    signature: &Signature,
    target: &ExternTarget,
    options: &CompileOptions,
) -> Result<CompiledHandle, BindError> {
    // Every component of the signature must resolve against the closed
    // type universe before any declaration mentioning it is emitted.
    for ty in signature
        .params()
        .iter()
        .chain(std::iter::once(signature.ret()))
    {
        match TypeUniverse::global().resolve_ty(ty) {
            Ok(_) => {}
            Err(TypeError::UnknownType(name)) => return Err(BindError::UnknownType(name)),
            Err(other) => return Err(BindError::InvalidSignature(other.to_string())),
        }
    }

    assert_eq!(
        arg_names.len(),
        signature.arity(),
        "argument-name list does not match arity of {signature}"
    );

    let stub_symbol = names::stub_symbol(unique_name);
    log::debug!(
        "synthesizing stub `{stub_symbol}` forwarding to `{}` under {signature}",
        target.symbol()
    );
    let handle = compile_forwarder(&stub_symbol, target, options)?;
    Ok(handle)
}
