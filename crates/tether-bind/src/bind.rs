//! The binding entry point.

use std::sync::{Mutex, PoisonError};

use tether_jit::{Callable, CompileOptions, CompiledHandle};
use tether_types::Signature;

use crate::registry::{self, ArtifactRecord};
use crate::{extract, names, stub, BindError};

/// One process-wide lock around the whole bind sequence. Name generation
/// and symbol publication must not interleave between concurrent binds,
/// so extract-generate-publish-synthesize runs as a single critical
/// section.
static BIND_LOCK: Mutex<()> = Mutex::new(());

/// Configures a binding for one signature and option set.
///
/// ```
/// use tether_bind::bind;
/// use tether_jit::{Callable, CompileOptions, Expr, PlainFn};
/// use tether_types::{ScalarType, Signature};
///
/// let sig = Signature::new(
///     vec![ScalarType::F64.into(), ScalarType::F64.into()],
///     ScalarType::F64.into(),
/// );
/// let plain = PlainFn::new("add", vec!["x", "y"], Expr::add(Expr::param(0), Expr::param(1)));
/// let handle = bind(sig, CompileOptions::default())
///     .apply(&Callable::Plain(plain))
///     .unwrap();
/// let add = unsafe { handle.as_fn::<extern "C" fn(f64, f64) -> f64>() };
/// assert_eq!(add(2.0, 2.5), 4.5);
/// ```
pub fn bind(signature: Signature, options: CompileOptions) -> Binder {
    Binder { signature, options }
}

/// A configured binder: applies one signature/options pair to callables.
#[derive(Debug, Clone)]
pub struct Binder {
    signature: Signature,
    options: CompileOptions,
}

impl Binder {
    /// Binds a callable: compiles or locates its native entry for the
    /// configured signature, publishes it under a fresh symbol, and
    /// returns a forwarding stub indistinguishable from a directly
    /// compiled function.
    ///
    /// Every application publishes a fresh symbol; binding the same
    /// function twice yields two independent, non-interfering bindings.
    /// A failure after publication leaves the published symbol in place
    /// (no rollback); the stub never existed, so nothing can call it.
    pub fn apply(&self, callable: &Callable) -> Result<CompiledHandle, BindError> {
        // The guard protects ordering, not data; recover it if an
        // earlier bind unwound mid-sequence.
        let _guard = BIND_LOCK.lock().unwrap_or_else(PoisonError::into_inner);

        self.signature
            .validate()
            .map_err(|e| BindError::InvalidSignature(e.to_string()))?;

        let descriptor = extract::extract(callable, &self.signature, &self.options)?;

        let unique = names::unique_name(&descriptor.base_name);
        log::debug!(
            "binding `{}` as `{unique}` under {}",
            descriptor.base_name,
            self.signature
        );

        registry::publish(&unique, descriptor.native_address);
        registry::record_artifact(
            &unique,
            ArtifactRecord {
                signature: self.signature.clone(),
                options: self.options,
                extern_symbol: unique.clone(),
                stub_symbol: names::stub_symbol(&unique),
            },
        );

        let target = descriptor.target.via_registry_symbol(&unique);
        stub::synthesize(
            &unique,
            &descriptor.arg_names,
            &self.signature,
            &target,
            &self.options,
        )
        .inspect_err(|e| {
            log::warn!(
                "binding `{unique}` failed after publication; the symbol stays registered: {e}"
            );
        })
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }
}
