#![allow(dead_code)]
use std::sync::Arc;

use rsmir_build::MirLowering;
use rsmir_core::config::BuildConfig;
use rsmir_core::error::Error;
use rsmir_core::mir::{self, Body};
use rsmir_core::thir::Program;
use rsmir_core::types::{AdtDef, AdtFlags, FieldDef, Ty, VariantDef};
use tracing_subscriber::EnvFilter;

pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Struct with a destructor; every value of it gets a `drop`.
pub fn guard_def() -> Arc<AdtDef> {
    Arc::new(AdtDef::new_struct(
        0,
        "Guard",
        vec![FieldDef::new("id", Ty::i32())],
        AdtFlags {
            is_copy: false,
            has_dtor: true,
        },
    ))
}

pub fn guard_ty() -> Ty {
    Ty::adt(guard_def())
}

pub fn option_def(inner: Ty) -> Arc<AdtDef> {
    let is_copy = inner.is_copy();
    Arc::new(AdtDef::new_enum(
        1,
        "Option",
        vec![
            VariantDef::new("None", 0, Vec::new()),
            VariantDef::new("Some", 1, vec![FieldDef::new("0", inner)]),
        ],
        AdtFlags {
            is_copy,
            has_dtor: false,
        },
    ))
}

pub fn lower(program: &Program) -> mir::Program {
    lower_with(BuildConfig::default(), program)
}

pub fn lower_with(config: BuildConfig, program: &Program) -> mir::Program {
    init_logging();
    let mut lowering = MirLowering::with_config(config);
    let mir_program = lowering
        .transform(program)
        .expect("THIR→MIR lowering should succeed");
    let (diagnostics, has_errors) = lowering.take_diagnostics();
    assert!(
        diagnostics.is_empty(),
        "unexpected diagnostics: {diagnostics:?}"
    );
    assert!(!has_errors);
    mir_program
}

pub fn lower_err(program: &Program) -> Error {
    init_logging();
    MirLowering::new()
        .transform(program)
        .expect_err("THIR→MIR lowering should fail")
}

pub fn body<'a>(program: &'a mir::Program, name: &str) -> &'a Body {
    program
        .body_of(name)
        .unwrap_or_else(|| panic!("no MIR body for `{name}`"))
}
