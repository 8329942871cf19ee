//! Test assertions for pipeline results.

use crate::context::{Category, RubixData};
use crate::errors::{ContractViolationError, RubixError, ViolationKind};

/// Asserts that `err` is a stage failure at `name`, 1-based `ordinal`.
pub fn assert_stage_failed_at(err: &RubixError, name: &str, ordinal: usize) {
    let Some(exec) = err.as_stage_execution() else {
        panic!("Expected a stage execution error, got: {err}");
    };
    assert_eq!(exec.stage_name(), Some(name), "Wrong failing stage: {exec}");
    assert_eq!(exec.ordinal(), Some(ordinal), "Wrong failing ordinal: {exec}");
}

/// Asserts that `err` is a configuration error with diagnostic `code`.
pub fn assert_configuration_code(err: &RubixError, code: &str) {
    let Some(config) = err.as_configuration() else {
        panic!("Expected a configuration error, got: {err}");
    };
    assert_eq!(config.code(), Some(code), "Unexpected code for: {config}");
}

/// Asserts that `err` is a contract violation of `kind` and returns it.
pub fn assert_contract_violation(err: &RubixError, kind: ViolationKind) -> &ContractViolationError {
    let Some(violation) = err.as_contract_violation() else {
        panic!("Expected a contract violation, got: {err}");
    };
    assert_eq!(violation.kind, kind, "Unexpected violation: {violation}");
    violation
}

/// Asserts that a scalar attribute holds `expected`.
pub fn assert_scalar(ctx: &RubixData, category: Category, name: &str, expected: f64) {
    let actual = ctx.scalar(category, name);
    assert_eq!(
        actual,
        Some(expected),
        "Expected {category}/{name} = {expected}, got {actual:?}"
    );
}
