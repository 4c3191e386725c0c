//! The compiler collaborator: one `JITModule` per compiled function.
//!
//! Every compilation builds a fresh module over the host ISA, lowers the
//! body with `cranelift-frontend`, finalizes, and packages the entry
//! address together with the module (which owns the executable memory)
//! into a [`CompiledHandle`]. Imported symbols resolve either from
//! addresses pinned on the module builder or, failing that, from the
//! process-wide symbol registry.

use std::sync::Arc;

use cranelift_codegen::ir::{AbiParam, Function, InstBuilder, UserFuncName};
use cranelift_codegen::isa::{CallConv, TargetIsa};
use cranelift_codegen::settings::{self, Configurable};
use cranelift_frontend::{FunctionBuilder, FunctionBuilderContext};
use cranelift_jit::{JITBuilder, JITModule};
use cranelift_module::{default_libcall_names, FuncId, Linkage, Module};
use target_lexicon::Triple;
use tether_types::Signature;

use crate::callable::{CompiledHandle, ModuleArtifact};
use crate::expr::{ExternTarget, PlainFn};
use crate::lower::{self, ExprLowerer};
use crate::{registry, JitError};

/// Options forwarded to every compilation. Stored verbatim in binding
/// descriptors and artifact metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    pub opt_level: OptLevel,
    pub enable_verifier: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptLevel {
    None,
    Speed,
    SpeedAndSize,
}

impl OptLevel {
    fn flag_value(self) -> &'static str {
        match self {
            OptLevel::None => "none",
            OptLevel::Speed => "speed",
            OptLevel::SpeedAndSize => "speed_and_size",
        }
    }
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            opt_level: OptLevel::None,
            enable_verifier: true,
        }
    }
}

/// Builds the ISA for the host target with the requested options.
fn host_isa(options: &CompileOptions) -> Result<Arc<dyn TargetIsa>, JitError> {
    let mut flag_builder = settings::builder();
    flag_builder.enable("is_pic")?;
    flag_builder.set("opt_level", options.opt_level.flag_value())?;
    flag_builder.set(
        "enable_verifier",
        if options.enable_verifier { "true" } else { "false" },
    )?;

    let isa_builder = cranelift_native::builder()
        .map_err(|e| JitError::IsaSetup(format!("host target lookup failed: {e}")))?;
    isa_builder
        .finish(settings::Flags::new(flag_builder))
        .map_err(|e| JitError::IsaSetup(format!("ISA construction failed: {e}")))
}

/// Creates a module whose import resolution consults the pinned target
/// addresses first and the process-wide symbol registry after.
fn new_jit_module(isa: Arc<dyn TargetIsa>, targets: &[ExternTarget]) -> JITModule {
    let mut builder = JITBuilder::with_isa(isa, default_libcall_names());
    for target in targets {
        if let Some(address) = target.address {
            builder.symbol(target.symbol.clone(), address as *const u8);
        }
    }
    builder.symbol_lookup_fn(Box::new(|name| {
        registry::resolve_symbol(name).map(|address| address as *const u8)
    }));
    JITModule::new(builder)
}

/// Translates a structural signature into a Cranelift one: scalars map
/// directly, structured types pass as pointers.
pub(crate) fn translate_signature(
    signature: &Signature,
    pointer_type: cranelift_codegen::ir::Type,
    call_conv: CallConv,
) -> cranelift_codegen::ir::Signature {
    let mut sig = cranelift_codegen::ir::Signature::new(call_conv);
    for param in signature.params() {
        sig.params
            .push(AbiParam::new(lower::ty_cl_type(param, pointer_type)));
    }
    sig.returns
        .push(AbiParam::new(lower::ty_cl_type(signature.ret(), pointer_type)));
    sig
}

/// Finalizes the module and packages the compiled entry as a handle.
fn finish_handle(
    mut module: JITModule,
    func_id: FuncId,
    symbol: String,
    signature: Signature,
    clif: String,
    imports: Vec<String>,
    callees: Vec<Arc<ModuleArtifact>>,
) -> Result<CompiledHandle, JitError> {
    module.finalize_definitions()?;
    let address = module.get_finalized_function(func_id) as usize;
    log::debug!("compiled `{symbol}` for {signature} at {address:#x}");
    Ok(CompiledHandle::new(
        symbol,
        signature,
        address,
        clif,
        imports,
        Arc::new(ModuleArtifact::new(module, callees)),
    ))
}

/// Compiles a plain function under the given signature.
///
/// Calls to other compiled functions in the body are lowered as imports
/// of their symbols; their owning modules are retained by the returned
/// handle so no callee address can dangle.
pub fn compile(
    plain: &PlainFn,
    signature: &Signature,
    options: &CompileOptions,
) -> Result<CompiledHandle, JitError> {
    if plain.params.len() != signature.arity() {
        return Err(JitError::Lowering {
            function: plain.name.clone(),
            message: format!(
                "{} parameters but signature {} has arity {}",
                plain.params.len(),
                signature,
                signature.arity()
            ),
        });
    }
    signature.validate()?;
    lower::check_signature_resolves(signature)?;

    log::trace!(
        "lowering `{}` for {signature} on {}",
        plain.name,
        Triple::host()
    );

    let mut targets = Vec::new();
    plain.body.collect_targets(&mut targets);
    let callees = targets.iter().filter_map(|t| t.keepalive.clone()).collect();

    let isa = host_isa(options)?;
    let pointer_type = isa.pointer_type();
    let call_conv = isa.default_call_conv();
    let mut module = new_jit_module(isa, &targets);

    let cl_sig = translate_signature(signature, pointer_type, call_conv);
    let func_id = module.declare_function(&plain.name, Linkage::Export, &cl_sig)?;

    let mut func =
        Function::with_name_signature(UserFuncName::user(0, func_id.as_u32()), cl_sig);
    let mut builder_ctx = FunctionBuilderContext::new();
    {
        let mut builder = FunctionBuilder::new(&mut func, &mut builder_ctx);
        let entry_block = builder.create_block();
        builder.append_block_params_for_function_params(entry_block);
        builder.switch_to_block(entry_block);
        let param_values = builder.block_params(entry_block).to_vec();

        let mut lowerer = ExprLowerer {
            function_name: &plain.name,
            builder: &mut builder,
            module: &mut module,
            pointer_type,
            call_conv,
            param_types: signature.params(),
            param_values: &param_values,
        };
        let (result, result_ty) = lowerer.lower(&plain.body)?;
        if &result_ty != signature.ret() {
            return Err(JitError::Lowering {
                function: plain.name.clone(),
                message: format!(
                    "body evaluates to {result_ty} but signature returns {}",
                    signature.ret()
                ),
            });
        }

        builder.ins().return_(&[result]);
        builder.seal_all_blocks();
        builder.finalize();
    }

    let clif = func.to_string();
    let mut ctx = module.make_context();
    ctx.func = func;
    module.define_function(func_id, &mut ctx)?;

    let imports = targets.iter().map(|t| t.symbol().to_string()).collect();
    finish_handle(
        module,
        func_id,
        plain.name.clone(),
        signature.clone(),
        clif,
        imports,
        callees,
    )
}

/// Compiles a forwarding function: declares `target`'s symbol as an
/// import and defines `symbol` with the same signature whose whole body
/// is one call, arguments forwarded unchanged, result returned
/// unconverted.
///
/// If the target carries no pinned address, the import resolves through
/// the process-wide symbol registry — at finalize time or lazily, but in
/// any case before the first call into the forwarder.
pub fn compile_forwarder(
    symbol: &str,
    target: &ExternTarget,
    options: &CompileOptions,
) -> Result<CompiledHandle, JitError> {
    let signature = target.signature().clone();
    lower::check_signature_resolves(&signature)?;

    let targets = std::slice::from_ref(target);
    let callees = target.keepalive.iter().cloned().collect();

    let isa = host_isa(options)?;
    let pointer_type = isa.pointer_type();
    let call_conv = isa.default_call_conv();
    let mut module = new_jit_module(isa, targets);

    let cl_sig = translate_signature(&signature, pointer_type, call_conv);
    let callee_id = module.declare_function(target.symbol(), Linkage::Import, &cl_sig)?;
    let func_id = module.declare_function(symbol, Linkage::Export, &cl_sig)?;

    let mut func =
        Function::with_name_signature(UserFuncName::user(0, func_id.as_u32()), cl_sig);
    let mut builder_ctx = FunctionBuilderContext::new();
    {
        let mut builder = FunctionBuilder::new(&mut func, &mut builder_ctx);
        let entry_block = builder.create_block();
        builder.append_block_params_for_function_params(entry_block);
        builder.switch_to_block(entry_block);
        let param_values = builder.block_params(entry_block).to_vec();

        let callee_ref = module.declare_func_in_func(callee_id, builder.func);
        let call = builder.ins().call(callee_ref, &param_values);
        let result = builder.inst_results(call)[0];
        builder.ins().return_(&[result]);

        builder.seal_all_blocks();
        builder.finalize();
    }

    let clif = func.to_string();
    let mut ctx = module.make_context();
    ctx.func = func;
    module.define_function(func_id, &mut ctx)?;

    finish_handle(
        module,
        func_id,
        symbol.to_string(),
        signature,
        clif,
        vec![target.symbol().to_string()],
        callees,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Expr;
    use tether_types::{RecordDef, ScalarType, Ty, TypeUniverse};

    fn f64_binary_sig() -> Signature {
        Signature::new(
            vec![ScalarType::F64.into(), ScalarType::F64.into()],
            ScalarType::F64.into(),
        )
    }

    #[test]
    fn compile_and_call_plain_function() {
        let plain = PlainFn::new(
            "jit_test_add",
            vec!["x", "y"],
            Expr::add(Expr::param(0), Expr::param(1)),
        );
        let handle = compile(&plain, &f64_binary_sig(), &CompileOptions::default()).unwrap();

        let add = unsafe { handle.as_fn::<extern "C" fn(f64, f64) -> f64>() };
        assert_eq!(add(2.0, 3.0), 5.0);
        assert!(handle.clif().contains("fadd"));
    }

    #[test]
    fn integer_subtraction_with_literal() {
        let plain = PlainFn::new(
            "jit_test_isub",
            vec!["x"],
            Expr::sub(Expr::param(0), Expr::lit_i64(5)),
        );
        let sig = Signature::new(vec![ScalarType::I64.into()], ScalarType::I64.into());
        let handle = compile(&plain, &sig, &CompileOptions::default()).unwrap();

        let f = unsafe { handle.as_fn::<extern "C" fn(i64) -> i64>() };
        assert_eq!(f(3), -2);
    }

    #[test]
    fn signed_division_rounds_toward_zero() {
        let plain = PlainFn::new(
            "jit_test_sdiv",
            vec!["a", "b"],
            Expr::div(Expr::param(0), Expr::param(1)),
        );
        let sig = Signature::new(
            vec![ScalarType::I32.into(), ScalarType::I32.into()],
            ScalarType::I32.into(),
        );
        let handle = compile(&plain, &sig, &CompileOptions::default()).unwrap();

        let f = unsafe { handle.as_fn::<extern "C" fn(i32, i32) -> i32>() };
        assert_eq!(f(-7, 2), -3);
        assert_eq!(f(7, -2), -3);
    }

    #[test]
    fn unsigned_division_does_not_sign_extend() {
        let plain = PlainFn::new(
            "jit_test_udiv",
            vec!["a", "b"],
            Expr::div(Expr::param(0), Expr::param(1)),
        );
        let sig = Signature::new(
            vec![ScalarType::U32.into(), ScalarType::U32.into()],
            ScalarType::U32.into(),
        );
        let handle = compile(&plain, &sig, &CompileOptions::default()).unwrap();

        let f = unsafe { handle.as_fn::<extern "C" fn(u32, u32) -> u32>() };
        // A signed divide of this dividend would produce a negative
        // quotient (0xC000_0000).
        assert_eq!(f(0x8000_0000, 2), 0x4000_0000);
    }

    #[test]
    fn float_subtraction_and_division() {
        let plain = PlainFn::new(
            "jit_test_relative_delta",
            vec!["x", "y"],
            Expr::div(
                Expr::sub(Expr::param(0), Expr::param(1)),
                Expr::param(1),
            ),
        );
        let handle = compile(&plain, &f64_binary_sig(), &CompileOptions::default()).unwrap();

        let f = unsafe { handle.as_fn::<extern "C" fn(f64, f64) -> f64>() };
        assert_eq!(f(7.0, 2.0), 2.5);
    }

    #[test]
    fn arity_mismatch_is_a_lowering_error() {
        let plain = PlainFn::new("jit_test_unary", vec!["x"], Expr::param(0));
        let err = compile(&plain, &f64_binary_sig(), &CompileOptions::default());
        assert!(matches!(err, Err(JitError::Lowering { .. })));
    }

    #[test]
    fn record_field_access_loads_through_pointer() {
        TypeUniverse::global()
            .define(RecordDef::record(
                "JitTestVec2",
                vec![("x", ScalarType::F64), ("y", ScalarType::F64)],
            ))
            .unwrap();

        let plain = PlainFn::new(
            "jit_test_vec_sum",
            vec!["v"],
            Expr::add(Expr::field(0, "x"), Expr::field(0, "y")),
        );
        let sig = Signature::new(vec![Ty::named("JitTestVec2")], ScalarType::F64.into());
        let handle = compile(&plain, &sig, &CompileOptions::default()).unwrap();

        #[repr(C)]
        struct Vec2 {
            x: f64,
            y: f64,
        }
        let v = Vec2 { x: 1.5, y: 2.25 };
        let sum = unsafe { handle.as_fn::<extern "C" fn(*const Vec2) -> f64>() };
        assert_eq!(sum(&v), 3.75);
    }

    #[test]
    fn forwarder_resolves_through_the_registry() {
        let plain = PlainFn::new(
            "jit_test_square",
            vec!["x"],
            Expr::mul(Expr::param(0), Expr::param(0)),
        );
        let sig = Signature::new(vec![ScalarType::F64.into()], ScalarType::F64.into());
        let handle = compile(&plain, &sig, &CompileOptions::default()).unwrap();

        // Publish under a fresh name, then forward through it with no
        // pinned address at all.
        let address = handle.native_address(&sig).unwrap();
        registry::register_symbol("jit_test_square_published", address);
        let target = ExternTarget::registered("jit_test_square_published", sig);

        let stub =
            compile_forwarder("jit_test_square_fwd", &target, &CompileOptions::default())
                .unwrap();
        let square = unsafe { stub.as_fn::<extern "C" fn(f64) -> f64>() };
        assert_eq!(square(9.0), 81.0);
        // The forwarder declares the symbol as an import; the callee's
        // multiply never enters its unit.
        assert!(!stub.clif().contains("fmul"));
        assert_eq!(stub.imports(), ["jit_test_square_published"]);
    }

    #[test]
    fn calling_a_handle_emits_an_import_not_a_copy() {
        let callee = PlainFn::new(
            "jit_test_offset",
            vec!["x"],
            Expr::add(Expr::param(0), Expr::lit_f64(41.25)),
        );
        let sig = Signature::new(vec![ScalarType::F64.into()], ScalarType::F64.into());
        let callee_handle = compile(&callee, &sig, &CompileOptions::default()).unwrap();

        let caller = PlainFn::new(
            "jit_test_caller",
            vec!["x"],
            Expr::mul(
                Expr::Call(callee_handle.extern_target(), vec![Expr::param(0)]),
                Expr::lit_f64(2.0),
            ),
        );
        let caller_handle = compile(&caller, &sig, &CompileOptions::default()).unwrap();

        let f = unsafe { caller_handle.as_fn::<extern "C" fn(f64) -> f64>() };
        assert_eq!(f(1.0), 2.0 * (1.0 + 41.25));

        // The callee's constant appears only in the callee's unit. CLIF
        // prints float immediates in hex-float form, so compare tokens.
        let token = cranelift_codegen::ir::immediates::Ieee64::with_float(41.25).to_string();
        assert!(callee_handle.clif().contains(&token));
        assert!(!caller_handle.clif().contains(&token));
        assert_eq!(caller_handle.imports(), ["jit_test_offset"]);
    }
}
