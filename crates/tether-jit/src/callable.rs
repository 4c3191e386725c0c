//! Compiled handles and the three callable shapes the binding layer
//! accepts.

use std::fmt;
use std::sync::Arc;

use cranelift_jit::JITModule;
use tether_types::Signature;

use crate::compiler::{self, CompileOptions};
use crate::expr::{ExternTarget, PlainFn};
use crate::JitError;

/// Owns the executable memory of one compilation unit.
///
/// Dropping it does not unmap the code (that would require proving no
/// callers remain); it exists so handles can keep their own unit and the
/// units of their callees reachable.
pub struct ModuleArtifact {
    #[allow(dead_code)] // held for lifetime only; the code lives inside
    module: JITModule,
    #[allow(dead_code)]
    callees: Vec<Arc<ModuleArtifact>>,
}

impl ModuleArtifact {
    pub(crate) fn new(module: JITModule, callees: Vec<Arc<ModuleArtifact>>) -> Self {
        ModuleArtifact { module, callees }
    }
}

impl fmt::Debug for ModuleArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleArtifact")
            .field("module", &"[JITModule]")
            .field("callees", &self.callees.len())
            .finish()
    }
}

/// An opaque reference to native, directly callable code for one exact
/// signature.
#[derive(Debug)]
pub struct CompiledHandle {
    symbol: String,
    signature: Signature,
    address: usize,
    clif: String,
    imports: Vec<String>,
    artifact: Arc<ModuleArtifact>,
}

impl CompiledHandle {
    pub(crate) fn new(
        symbol: String,
        signature: Signature,
        address: usize,
        clif: String,
        imports: Vec<String>,
        artifact: Arc<ModuleArtifact>,
    ) -> Self {
        CompiledHandle {
            symbol,
            signature,
            address,
            clif,
            imports,
            artifact,
        }
    }

    /// The symbol this function was defined under in its own unit.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// The native entry address, validated against the requested
    /// signature. Addresses stay valid as long as the handle (or any
    /// handle that calls into it) is alive.
    pub fn native_address(&self, signature: &Signature) -> Result<usize, JitError> {
        if &self.signature != signature {
            return Err(JitError::WrongSignature {
                name: self.symbol.clone(),
                requested: signature.to_string(),
            });
        }
        Ok(self.address)
    }

    /// The Cranelift IR text this handle was compiled from. Kept for
    /// diagnostics and for asserting on what a unit does and does not
    /// contain.
    pub fn clif(&self) -> &str {
        &self.clif
    }

    /// Symbols this unit declares as imports: external references only,
    /// never bodies.
    pub fn imports(&self) -> &[String] {
        &self.imports
    }

    /// A call target for lowering calls to this handle from another unit.
    pub fn extern_target(&self) -> ExternTarget {
        ExternTarget {
            symbol: self.symbol.clone(),
            signature: self.signature.clone(),
            address: Some(self.address),
            keepalive: Some(self.artifact.clone()),
        }
    }

    /// Reinterprets the entry address as a typed function pointer.
    ///
    /// # Safety
    ///
    /// The caller must ensure `F` matches the compiled signature exactly
    /// and must keep this handle alive while the returned pointer is used.
    pub unsafe fn as_fn<F: Copy>(&self) -> F {
        let address = self.address as *const u8;
        std::mem::transmute_copy(&address)
    }
}

/// A plain function together with the signatures it has been compiled
/// for. One compiled variant per structural signature; recompiling the
/// same signature is refused rather than deduplicated silently.
#[derive(Debug)]
pub struct Dispatcher {
    plain: PlainFn,
    compiled: Vec<CompiledHandle>,
}

impl Dispatcher {
    pub fn new(plain: PlainFn) -> Self {
        Dispatcher {
            plain,
            compiled: Vec::new(),
        }
    }

    pub fn plain(&self) -> &PlainFn {
        &self.plain
    }

    /// Compiles the plain function for one more signature.
    pub fn compile_for(
        &mut self,
        signature: &Signature,
        options: &CompileOptions,
    ) -> Result<&CompiledHandle, JitError> {
        if self.find(signature).is_some() {
            return Err(JitError::AlreadyCompiled(signature.to_string()));
        }
        let handle = compiler::compile(&self.plain, signature, options)?;
        self.compiled.push(handle);
        Ok(self.compiled.last().unwrap())
    }

    /// The compiled variant whose signature equals `signature`
    /// structurally, if any. At most one exists.
    pub fn find(&self, signature: &Signature) -> Option<&CompiledHandle> {
        self.compiled.iter().find(|h| h.signature() == signature)
    }

    pub fn compiled_signatures(&self) -> impl Iterator<Item = &Signature> {
        self.compiled.iter().map(|h| h.signature())
    }
}

/// A standalone function compiled outside the dispatch mechanism, with
/// one fixed signature: typically an `extern "C"` entry produced by some
/// other toolchain and registered here by address.
#[derive(Debug, Clone)]
pub struct StandaloneFn {
    name: String,
    params: Vec<String>,
    signature: Signature,
    address: usize,
}

impl StandaloneFn {
    /// # Safety contract (not enforced here)
    ///
    /// `address` must point at native code with exactly `signature`'s
    /// calling shape and must stay valid for the process lifetime.
    pub fn new(
        name: impl Into<String>,
        params: Vec<impl Into<String>>,
        signature: Signature,
        address: usize,
    ) -> Self {
        StandaloneFn {
            name: name.into(),
            params: params.into_iter().map(Into::into).collect(),
            signature,
            address,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn address(&self) -> usize {
        self.address
    }
}

/// The three callable shapes accepted by the binding entry point.
#[derive(Debug)]
pub enum Callable {
    /// Not yet compiled; the binder compiles it under the requested
    /// signature.
    Plain(PlainFn),
    /// Already compiled, possibly for several signatures.
    Dispatch(Dispatcher),
    /// Externally compiled with one fixed signature.
    Standalone(StandaloneFn),
}

impl Callable {
    /// The declared name this callable goes by, used as the basis for
    /// generated symbol names.
    pub fn name(&self) -> &str {
        match self {
            Callable::Plain(f) => &f.name,
            Callable::Dispatch(d) => &d.plain().name,
            Callable::Standalone(s) => s.name(),
        }
    }
}
