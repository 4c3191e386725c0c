//! Unit tests for the binding core. End-to-end scenarios live in
//! `tests/binding_tests.rs`.

use tether_jit::{Callable, CompileOptions, Dispatcher, Expr, PlainFn, StandaloneFn};
use tether_types::{ScalarType, Signature};

use crate::{extract, BindError};

fn f64_sig() -> Signature {
    Signature::new(
        vec![ScalarType::F64.into(), ScalarType::F64.into()],
        ScalarType::F64.into(),
    )
}

fn i32_sig() -> Signature {
    Signature::new(
        vec![ScalarType::I32.into(), ScalarType::I32.into()],
        ScalarType::I32.into(),
    )
}

fn add_fn(name: &str) -> PlainFn {
    PlainFn::new(name, vec!["x", "y"], Expr::add(Expr::param(0), Expr::param(1)))
}

#[test]
fn extract_plain_compiles_and_introspects() {
    let callable = Callable::Plain(add_fn("ext_test_plain"));
    let descriptor =
        extract::extract(&callable, &f64_sig(), &CompileOptions::default()).unwrap();

    assert_eq!(descriptor.base_name, "ext_test_plain");
    assert_eq!(descriptor.arg_names, ["x", "y"]);
    assert_ne!(descriptor.native_address, 0);
}

#[test]
fn extract_dispatcher_finds_matching_variant() {
    let mut dispatcher = Dispatcher::new(add_fn("ext_test_dispatch"));
    dispatcher
        .compile_for(&f64_sig(), &CompileOptions::default())
        .unwrap();
    dispatcher
        .compile_for(&i32_sig(), &CompileOptions::default())
        .unwrap();
    let callable = Callable::Dispatch(dispatcher);

    let descriptor =
        extract::extract(&callable, &i32_sig(), &CompileOptions::default()).unwrap();
    assert_eq!(descriptor.arg_names, ["x", "y"]);
}

#[test]
fn extract_dispatcher_without_matching_variant_fails() {
    let mut dispatcher = Dispatcher::new(add_fn("ext_test_dispatch_miss"));
    dispatcher
        .compile_for(&f64_sig(), &CompileOptions::default())
        .unwrap();
    let callable = Callable::Dispatch(dispatcher);

    let err = extract::extract(&callable, &i32_sig(), &CompileOptions::default());
    match err {
        Err(BindError::SignatureMismatch {
            requested,
            available,
        }) => {
            assert_eq!(requested, "(i32, i32) -> i32");
            assert_eq!(available, "(f64, f64) -> f64");
        }
        other => panic!("expected SignatureMismatch, got {other:?}"),
    }
}

#[test]
fn extract_standalone_checks_fixed_signature() {
    extern "C" fn native_add(a: f64, b: f64) -> f64 {
        a + b
    }

    let standalone = StandaloneFn::new(
        "ext_test_standalone",
        vec!["a", "b"],
        f64_sig(),
        native_add as usize,
    );

    let descriptor = extract::extract(
        &Callable::Standalone(standalone.clone()),
        &f64_sig(),
        &CompileOptions::default(),
    )
    .unwrap();
    assert_eq!(descriptor.native_address, native_add as usize);

    let err = extract::extract(
        &Callable::Standalone(standalone),
        &i32_sig(),
        &CompileOptions::default(),
    );
    assert!(matches!(err, Err(BindError::SignatureMismatch { .. })));
}

#[test]
fn extract_rejects_callable_without_parameter_names() {
    extern "C" fn native_add(a: f64, b: f64) -> f64 {
        a + b
    }

    // Parameter names cannot be recovered when the declared name list
    // disagrees with the signature's arity.
    let standalone = StandaloneFn::new(
        "ext_test_bad_arity",
        vec!["a"],
        f64_sig(),
        native_add as usize,
    );
    let err = extract::extract(
        &Callable::Standalone(standalone),
        &f64_sig(),
        &CompileOptions::default(),
    );
    assert!(matches!(err, Err(BindError::UnsupportedCallableKind(_))));
}
