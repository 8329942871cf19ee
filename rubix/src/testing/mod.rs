//! Testing utilities for rubix pipelines.
//!
//! This module provides:
//! - Fixture contexts and configurations
//! - Closure-backed stage factories and a recording emitter
//! - Assertions for pipeline errors and context values

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{
    assert_configuration_code, assert_contract_violation, assert_scalar, assert_stage_failed_at,
};
pub use fixtures::{bind, bind_with, galaxy_config, galaxy_fixture, x_context};
pub use mocks::{
    double, fail_if_negative, increment, CountingStage, RecordedSpan, RecordingEmitter, SpanKind,
};
