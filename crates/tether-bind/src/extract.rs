//! Uniform extraction of a binding descriptor from any callable shape.

use tether_jit::{compile, Callable, CompileOptions, ExternTarget};
use tether_types::Signature;

use crate::BindError;

/// Everything one binding needs to know about its source function:
/// the name basis for generated symbols, the parameter names of the
/// underlying implementation, the native entry for exactly the requested
/// signature, and the options the caller asked for. Created once per
/// binding request, never mutated afterwards.
#[derive(Debug)]
pub struct FunctionDescriptor {
    pub base_name: String,
    pub arg_names: Vec<String>,
    pub native_address: usize,
    /// Call-target form of the compiled entry. Carries the keep-alive
    /// reference to the unit that owns the code.
    pub target: ExternTarget,
    pub options: CompileOptions,
}

/// Extracts a descriptor, compiling the function under `signature` when
/// it is still plain.
///
/// The three shapes are handled by one exhaustive match:
/// plain functions are compiled here (compiler errors propagate
/// unchanged); dispatchers must already hold a variant whose signature
/// equals the requested one structurally; standalone functions must have
/// exactly the requested fixed signature.
pub fn extract(
    callable: &Callable,
    signature: &Signature,
    options: &CompileOptions,
) -> Result<FunctionDescriptor, BindError> {
    let base_name = callable.name().to_string();
    match callable {
        Callable::Plain(plain) => {
            log::debug!("extracting plain `{}`: compiling for {signature}", plain.name);
            let handle = compile(plain, signature, options)?;
            let native_address = handle.native_address(signature)?;
            Ok(FunctionDescriptor {
                base_name,
                arg_names: plain.params.clone(),
                native_address,
                target: handle.extern_target(),
                options: *options,
            })
        }

        Callable::Dispatch(dispatcher) => {
            let plain = dispatcher.plain();
            let handle = dispatcher.find(signature).ok_or_else(|| {
                let available: Vec<String> = dispatcher
                    .compiled_signatures()
                    .map(|s| s.to_string())
                    .collect();
                BindError::SignatureMismatch {
                    requested: signature.to_string(),
                    available: if available.is_empty() {
                        "none".to_string()
                    } else {
                        available.join(", ")
                    },
                }
            })?;
            if plain.params.len() != signature.arity() {
                return Err(BindError::UnsupportedCallableKind(format!(
                    "dispatcher `{}` exposes {} parameter names for arity {}",
                    plain.name,
                    plain.params.len(),
                    signature.arity()
                )));
            }
            log::debug!(
                "extracting dispatcher `{}`: found compiled variant for {signature}",
                plain.name
            );
            let native_address = handle.native_address(signature)?;
            Ok(FunctionDescriptor {
                base_name,
                arg_names: plain.params.clone(),
                native_address,
                target: handle.extern_target(),
                options: *options,
            })
        }

        Callable::Standalone(standalone) => {
            if standalone.signature() != signature {
                return Err(BindError::SignatureMismatch {
                    requested: signature.to_string(),
                    available: standalone.signature().to_string(),
                });
            }
            if standalone.params().len() != signature.arity() {
                return Err(BindError::UnsupportedCallableKind(format!(
                    "standalone `{}` exposes {} parameter names for arity {}",
                    standalone.name(),
                    standalone.params().len(),
                    signature.arity()
                )));
            }
            log::debug!(
                "extracting standalone `{}` at {:#x}",
                standalone.name(),
                standalone.address()
            );
            Ok(FunctionDescriptor {
                base_name,
                arg_names: standalone.params().to_vec(),
                native_address: standalone.address(),
                target: ExternTarget::pinned(
                    standalone.name(),
                    signature.clone(),
                    standalone.address(),
                ),
                options: *options,
            })
        }
    }
}
