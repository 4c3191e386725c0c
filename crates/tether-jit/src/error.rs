use cranelift_codegen::settings::SetError;
use thiserror::Error;

/// Errors that can occur while compiling through the JIT.
#[derive(Error, Debug)]
pub enum JitError {
    #[error("failed during Cranelift code generation: {0}")]
    CraneliftGen(#[from] cranelift_codegen::CodegenError),

    #[error("failed during module processing: {0}")]
    CraneliftModule(#[from] cranelift_module::ModuleError),

    #[error("failed to configure Cranelift settings: {0}")]
    Settings(#[from] SetError),

    #[error("ISA setup failed: {0}")]
    IsaSetup(String),

    #[error("type resolution failed: {0}")]
    Type(#[from] tether_types::TypeError),

    #[error("error while lowering `{function}`: {message}")]
    Lowering { function: String, message: String },

    #[error("handle `{name}` holds no code for signature {requested}")]
    WrongSignature { name: String, requested: String },

    #[error("signature {0} is already compiled for this dispatcher")]
    AlreadyCompiled(String),
}
