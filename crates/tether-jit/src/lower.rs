//! Lowering of body expressions into Cranelift IR.

use cranelift_codegen::ir::{types, InstBuilder, MemFlags, Type, Value};
use cranelift_frontend::FunctionBuilder;
use cranelift_jit::JITModule;
use cranelift_module::{Linkage, Module};
use tether_types::{record_layout, ResolvedTy, ScalarType, Signature, Ty, TypeUniverse};

use crate::compiler::translate_signature;
use crate::expr::{BinOp, Expr, Literal};
use crate::JitError;

/// Per-function lowering state: the builder positioned in the entry
/// block, the parameter values, and the module for import declarations.
pub(crate) struct ExprLowerer<'a, 'b> {
    pub(crate) function_name: &'a str,
    pub(crate) builder: &'a mut FunctionBuilder<'b>,
    pub(crate) module: &'a mut JITModule,
    pub(crate) pointer_type: Type,
    pub(crate) call_conv: cranelift_codegen::isa::CallConv,
    pub(crate) param_types: &'a [Ty],
    pub(crate) param_values: &'a [Value],
}

impl ExprLowerer<'_, '_> {
    fn err(&self, message: impl Into<String>) -> JitError {
        JitError::Lowering {
            function: self.function_name.to_string(),
            message: message.into(),
        }
    }

    /// Lowers one expression, returning the produced value and its type.
    pub(crate) fn lower(&mut self, expr: &Expr) -> Result<(Value, Ty), JitError> {
        match expr {
            Expr::Lit(lit) => Ok(self.lower_literal(*lit)),

            Expr::Param(index) => {
                let ty = self
                    .param_types
                    .get(*index)
                    .ok_or_else(|| self.err(format!("parameter index {index} out of range")))?;
                Ok((self.param_values[*index], ty.clone()))
            }

            Expr::Binary(op, lhs, rhs) => {
                let (lhs_val, lhs_ty) = self.lower(lhs)?;
                let (rhs_val, rhs_ty) = self.lower(rhs)?;
                if lhs_ty != rhs_ty {
                    return Err(self.err(format!(
                        "operands of {op:?} have mismatched types {lhs_ty} and {rhs_ty}"
                    )));
                }
                let scalar = match lhs_ty {
                    Ty::Scalar(s) => s,
                    Ty::Named(name) => {
                        return Err(self.err(format!(
                            "arithmetic on structured type `{name}` is not supported"
                        )))
                    }
                };
                let value = self.lower_binop(*op, scalar, lhs_val, rhs_val);
                Ok((value, Ty::Scalar(scalar)))
            }

            Expr::Field(param, field) => self.lower_field(*param, field),

            Expr::Call(target, args) => {
                if args.len() != target.signature().arity() {
                    return Err(self.err(format!(
                        "call to `{}` passes {} arguments, signature {} expects {}",
                        target.symbol(),
                        args.len(),
                        target.signature(),
                        target.signature().arity()
                    )));
                }
                let mut arg_values = Vec::with_capacity(args.len());
                for (arg, expected) in args.iter().zip(target.signature().params()) {
                    let (value, ty) = self.lower(arg)?;
                    if &ty != expected {
                        return Err(self.err(format!(
                            "argument of type {ty} where `{}` expects {expected}",
                            target.symbol()
                        )));
                    }
                    arg_values.push(value);
                }

                // Declare the callee as an import in this unit: symbol and
                // type shape only, never its body.
                let callee_sig = translate_signature(
                    target.signature(),
                    self.pointer_type,
                    self.call_conv,
                );
                let func_id = self.module.declare_function(
                    target.symbol(),
                    Linkage::Import,
                    &callee_sig,
                )?;
                let func_ref = self
                    .module
                    .declare_func_in_func(func_id, self.builder.func);
                let call = self.builder.ins().call(func_ref, &arg_values);
                let result = self.builder.inst_results(call)[0];
                Ok((result, target.signature().ret().clone()))
            }
        }
    }

    fn lower_literal(&mut self, lit: Literal) -> (Value, Ty) {
        match lit {
            Literal::I32(v) => (
                self.builder.ins().iconst(types::I32, v as i64),
                Ty::Scalar(ScalarType::I32),
            ),
            Literal::I64(v) => (
                self.builder.ins().iconst(types::I64, v),
                Ty::Scalar(ScalarType::I64),
            ),
            Literal::F32(v) => (
                self.builder.ins().f32const(v),
                Ty::Scalar(ScalarType::F32),
            ),
            Literal::F64(v) => (
                self.builder.ins().f64const(v),
                Ty::Scalar(ScalarType::F64),
            ),
            Literal::Bool(v) => (
                self.builder.ins().iconst(types::I8, v as i64),
                Ty::Scalar(ScalarType::Bool),
            ),
        }
    }

    fn lower_binop(&mut self, op: BinOp, scalar: ScalarType, lhs: Value, rhs: Value) -> Value {
        if scalar.is_float() {
            match op {
                BinOp::Add => self.builder.ins().fadd(lhs, rhs),
                BinOp::Sub => self.builder.ins().fsub(lhs, rhs),
                BinOp::Mul => self.builder.ins().fmul(lhs, rhs),
                BinOp::Div => self.builder.ins().fdiv(lhs, rhs),
            }
        } else {
            match op {
                BinOp::Add => self.builder.ins().iadd(lhs, rhs),
                BinOp::Sub => self.builder.ins().isub(lhs, rhs),
                BinOp::Mul => self.builder.ins().imul(lhs, rhs),
                BinOp::Div if scalar.is_unsigned() => self.builder.ins().udiv(lhs, rhs),
                BinOp::Div => self.builder.ins().sdiv(lhs, rhs),
            }
        }
    }

    fn lower_field(&mut self, param: usize, field: &str) -> Result<(Value, Ty), JitError> {
        let param_ty = self
            .param_types
            .get(param)
            .ok_or_else(|| self.err(format!("parameter index {param} out of range")))?;
        let type_name = match param_ty {
            Ty::Named(name) => name,
            Ty::Scalar(s) => {
                return Err(self.err(format!(
                    "field access `.{field}` on scalar parameter of type {s}"
                )))
            }
        };

        let def = TypeUniverse::global().resolve(type_name)?;
        let layout = record_layout(&def)?;
        let index = def.field_index(field).ok_or_else(|| {
            self.err(format!("record `{type_name}` has no field `{field}`"))
        })?;
        let field_scalar = def.fields[index].1;
        let offset = layout.field_offsets[index];

        let cl_ty = scalar_cl_type(field_scalar);
        let loaded = self.builder.ins().load(
            cl_ty,
            MemFlags::trusted(),
            self.param_values[param],
            offset as i32,
        );
        Ok((loaded, Ty::Scalar(field_scalar)))
    }
}

/// Maps a scalar to its Cranelift value type. Bools are i8.
pub(crate) fn scalar_cl_type(scalar: ScalarType) -> Type {
    match scalar {
        ScalarType::I8 | ScalarType::U8 | ScalarType::Bool => types::I8,
        ScalarType::I16 | ScalarType::U16 => types::I16,
        ScalarType::I32 | ScalarType::U32 => types::I32,
        ScalarType::I64 | ScalarType::U64 => types::I64,
        ScalarType::F32 => types::F32,
        ScalarType::F64 => types::F64,
    }
}

/// Maps a signature component to its Cranelift type: scalars directly,
/// structured types as a pointer into caller-owned memory.
pub(crate) fn ty_cl_type(ty: &Ty, pointer_type: Type) -> Type {
    match ty {
        Ty::Scalar(s) => scalar_cl_type(*s),
        Ty::Named(_) => pointer_type,
    }
}

/// Guards against signatures whose components cannot be materialized.
/// Named types must resolve in the universe before any declaration that
/// mentions them is emitted.
pub(crate) fn check_signature_resolves(signature: &Signature) -> Result<(), JitError> {
    for ty in signature.params().iter().chain(std::iter::once(signature.ret())) {
        match TypeUniverse::global().resolve_ty(ty)? {
            ResolvedTy::Scalar(_) | ResolvedTy::Record(_) => {}
        }
    }
    Ok(())
}
