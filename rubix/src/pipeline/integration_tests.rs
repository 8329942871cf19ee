//! End-to-end tests for pipeline execution.

use crate::context::{array1, array_n3, Category, Component, RubixData};
use crate::errors::{StageLocator, ViolationKind};
use crate::pipeline::{
    build_pipeline, AbstractPipeline, LinearTransformerPipeline, PipelineBuilder, StageRegistry,
};
use crate::stages::kernels::FilterParticles;
use crate::stages::{stateless, AttributeAccess};
use crate::observability::StageScope;
use crate::testing::{
    assert_contract_violation, assert_scalar, assert_stage_failed_at, bind, bind_with, double,
    fail_if_negative, galaxy_config, galaxy_fixture, increment, x_context, CountingStage,
    RecordingEmitter, SpanKind,
};
use crate::transformer::{compiled_transformer, expression_transformer, BoundStage, ToExpression};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

fn double_then_increment() -> LinearTransformerPipeline {
    LinearTransformerPipeline::with_stages("scenario", vec![bind(&double()), bind(&increment())])
        .unwrap()
}

fn calc_ifu() -> LinearTransformerPipeline {
    build_pipeline(&StageRegistry::with_builtins(), &galaxy_config(), "calc_ifu").unwrap()
}

#[test]
fn test_linear_and_compiled_agree_on_scalar_scenario() {
    let pipeline = double_then_increment();
    assert_eq!(pipeline.run(x_context(3.0)).unwrap(), x_context(7.0));
    assert_eq!(pipeline.run_compiled(&x_context(3.0)).unwrap(), x_context(7.0));

    let compiled = compiled_transformer(pipeline.stages()).unwrap();
    assert_eq!(compiled.call(&x_context(3.0)).unwrap(), x_context(7.0));
}

#[test]
fn test_describe_summary() {
    let pipeline = double_then_increment();
    assert_eq!(
        pipeline.describe().summary(),
        json!([
            {"name": "double", "config": {}},
            {"name": "increment", "config": {}},
        ])
    );
    assert_eq!(pipeline.describe(), expression_transformer(pipeline.stages()));
}

#[test]
fn test_run_is_left_fold_of_stage_calls() {
    let stages = vec![
        bind(&double()),
        bind(&increment()),
        bind(&double()).renamed("double_again").unwrap(),
        bind(&increment()).renamed("increment_again").unwrap(),
    ];
    let pipeline = LinearTransformerPipeline::with_stages("fold", stages.clone()).unwrap();

    for x in [-2.0, 0.0, 1.5, 10.0] {
        let expected = stages
            .iter()
            .fold(x_context(x), |ctx, stage| stage.call(&ctx).unwrap());
        assert_eq!(pipeline.run(x_context(x)).unwrap(), expected);
        assert_eq!(pipeline.run_compiled(&x_context(x)).unwrap(), expected);
    }
    assert_eq!(pipeline.run(x_context(1.0)).unwrap(), x_context(7.0));
}

#[test]
fn test_failure_reports_stage_and_last_good() {
    let pipeline = LinearTransformerPipeline::with_stages(
        "guarded",
        vec![bind(&fail_if_negative()), bind(&double())],
    )
    .unwrap();

    let err = pipeline.run(x_context(-1.0)).unwrap_err();
    assert_stage_failed_at(&err, "fail_if_negative", 1);
    assert_eq!(err.last_good(), Some(&x_context(-1.0)));
    assert!(err.to_string().contains("fail_if_negative"));
}

#[test]
fn test_failure_halts_the_run() {
    let counter = CountingStage::new("after");
    let pipeline = LinearTransformerPipeline::with_stages(
        "halting",
        vec![bind(&increment()), bind(&fail_if_negative()), bind(&counter)],
    )
    .unwrap();

    let err = pipeline.run(x_context(-5.0)).unwrap_err();
    assert_stage_failed_at(&err, "fail_if_negative", 2);
    assert_eq!(err.last_good(), Some(&x_context(-4.0)));
    assert_eq!(counter.calls(), 0);

    assert_eq!(pipeline.run(x_context(5.0)).unwrap(), x_context(6.0));
    assert_eq!(counter.calls(), 1);
}

#[test]
fn test_compiled_failure_is_located_at_sequence() {
    let pipeline = LinearTransformerPipeline::with_stages(
        "guarded",
        vec![bind(&double()), bind(&fail_if_negative())],
    )
    .unwrap();

    let err = pipeline.run_compiled(&x_context(-1.0)).unwrap_err();
    let exec = err.as_stage_execution().unwrap();
    assert!(matches!(
        exec.locator,
        StageLocator::Sequence { stage_count: 2, .. }
    ));
    assert_eq!(exec.stage_name(), None);
    assert_eq!(exec.last_good(), &x_context(-1.0));
}

#[test]
fn test_register_rejects_and_keeps_previous() {
    let mut pipeline = double_then_increment();

    let err = pipeline.register(Vec::new()).unwrap_err();
    assert_eq!(err.code(), Some("CONFIG-001-EMPTY"));

    let err = pipeline
        .register(vec![bind(&double()), bind(&increment()), bind(&double())])
        .unwrap_err();
    assert_eq!(err.code(), Some("CONFIG-002-DUPLICATE"));
    assert_eq!(err.stage.as_deref(), Some("double"));

    assert_eq!(pipeline.describe().stage_names(), vec!["double", "increment"]);
    assert_eq!(pipeline.run(x_context(3.0)).unwrap(), x_context(7.0));
}

#[test]
fn test_register_replaces_sequence() {
    let mut pipeline = double_then_increment();
    pipeline
        .register(vec![bind(&increment()), bind(&double())])
        .unwrap();
    assert_eq!(pipeline.run(x_context(3.0)).unwrap(), x_context(8.0));
    assert_eq!(pipeline.run_compiled(&x_context(3.0)).unwrap(), x_context(8.0));
}

#[test]
fn test_missing_category_in_input_is_contract_violation() {
    let pipeline = calc_ifu();
    let full = galaxy_fixture(4, 4);
    let input = RubixData::new().with_component(
        Category::Stars,
        full.component(Category::Stars).unwrap().clone(),
    );

    let err = pipeline.run(input).unwrap_err();
    let violation = assert_contract_violation(&err, ViolationKind::MissingInput);
    assert_eq!(violation.stage, "rotate_galaxy");
    assert_eq!(violation.index, 0);
    assert_eq!(violation.producer, None);
}

#[test]
fn test_undeclared_write_detected_when_strict() {
    let sneaky = stateless(
        "sneaky",
        AttributeAccess::new().reads(Category::Galaxy, "x"),
        |ctx: &RubixData, _: &StageScope<'_>| Ok(ctx.clone().with_galaxy_scalar("x", 0.0)),
    );
    let stages = vec![bind(&sneaky)];

    let lenient = LinearTransformerPipeline::with_stages("lenient", stages.clone()).unwrap();
    assert_eq!(lenient.run(x_context(2.0)).unwrap(), x_context(0.0));

    let strict = LinearTransformerPipeline::with_stages("strict", stages)
        .unwrap()
        .with_settings(crate::config::EngineSettings::new().with_strict_ownership(true));
    let err = strict.run(x_context(2.0)).unwrap_err();
    let violation = assert_contract_violation(&err, ViolationKind::UndeclaredWrite);
    assert_eq!(violation.producer.as_deref(), Some("sneaky"));
}

#[test]
fn test_galaxy_pipeline_linear_matches_compiled() {
    let pipeline = calc_ifu();
    let input = galaxy_fixture(5, 4);

    let linear = pipeline.run(input.clone()).unwrap();
    let compiled = pipeline.run_compiled(&input).unwrap();
    assert_eq!(linear, compiled);

    for category in [Category::Stars, Category::Gas] {
        assert!(linear.array(category, "pixel_assignment").is_some());
        assert!(linear.array(category, "mask").is_some());
    }
    assert_eq!(
        linear.array(Category::Gas, "temperature").map(|t| t.len()),
        Some(4)
    );
    // The input is untouched.
    assert_eq!(input, galaxy_fixture(5, 4));
}

#[test]
fn test_galaxy_pipeline_respecializes_on_new_shape() {
    let pipeline = calc_ifu();
    let compiled = pipeline.compiled().unwrap();

    let small = galaxy_fixture(3, 3);
    let large = galaxy_fixture(7, 2);
    assert_eq!(pipeline.run_compiled(&small).unwrap(), pipeline.run(small.clone()).unwrap());
    assert_eq!(compiled.cached_plans(), 1);
    assert_eq!(pipeline.run_compiled(&large).unwrap(), pipeline.run(large.clone()).unwrap());
    assert_eq!(compiled.cached_plans(), 2);
    assert!(compiled.is_specialized_for(&small.shape()));
    assert!(compiled.is_specialized_for(&large.shape()));

    pipeline.run_compiled(&small).unwrap();
    assert_eq!(compiled.cached_plans(), 2);
}

#[test]
fn test_concurrent_runs_share_one_pipeline() {
    let pipeline = Arc::new(double_then_increment());

    std::thread::scope(|s| {
        for i in 0..8 {
            let pipeline = Arc::clone(&pipeline);
            s.spawn(move || {
                let x = f64::from(i);
                let expected = x_context(2.0 * x + 1.0);
                assert_eq!(pipeline.run(x_context(x)).unwrap(), expected);
                assert_eq!(pipeline.run_compiled(&x_context(x)).unwrap(), expected);
            });
        }
    });

    assert_eq!(pipeline.compiled().unwrap().cached_plans(), 1);
}

#[test]
fn test_emitter_sees_run_and_stage_events_in_order() {
    let emitter = Arc::new(RecordingEmitter::new());
    let pipeline = double_then_increment().with_emitter(emitter.clone());

    pipeline.run(x_context(1.0)).unwrap();
    assert_eq!(emitter.names(SpanKind::Start), vec!["scenario", "double", "increment"]);
    assert_eq!(emitter.names(SpanKind::End), vec!["double", "increment", "scenario"]);
    assert!(emitter.names(SpanKind::Error).is_empty());

    emitter.clear();
    let failing = LinearTransformerPipeline::with_stages(
        "guarded",
        vec![bind(&fail_if_negative()), bind(&double())],
    )
    .unwrap()
    .with_emitter(emitter.clone());
    failing.run(x_context(-1.0)).unwrap_err();
    assert_eq!(emitter.names(SpanKind::Error), vec!["fail_if_negative", "guarded"]);
    assert_eq!(emitter.names(SpanKind::End), Vec::<String>::new());
}

#[test]
fn test_empty_sequence_rejected_at_construction() {
    let err = LinearTransformerPipeline::with_stages("empty", Vec::new()).unwrap_err();
    assert_eq!(err.code(), Some("CONFIG-001-EMPTY"));

    let err = PipelineBuilder::new("empty", &galaxy_config()).build().unwrap_err();
    assert_eq!(err.code(), Some("CONFIG-001-EMPTY"));

    let config = crate::config::PipelineConfig::new(json!({"pipelines": {"empty": {"stages": []}}}));
    let err = build_pipeline(&StageRegistry::with_builtins(), &config, "empty").unwrap_err();
    assert_eq!(err.code(), Some("CONFIG-001-EMPTY"));
}

#[test]
fn test_expression_unaffected_by_compiled_cache() {
    let pipeline = calc_ifu();
    let before = pipeline.describe();
    let fingerprint = before.fingerprint();

    let compiled = pipeline.compiled().unwrap();
    pipeline.run_compiled(&galaxy_fixture(3, 3)).unwrap();
    pipeline.run_compiled(&galaxy_fixture(6, 2)).unwrap();
    assert_eq!(compiled.cached_plans(), 2);

    assert_eq!(pipeline.describe(), before);
    assert_eq!(pipeline.describe(), pipeline.describe());
    assert_eq!(compiled.to_expression(), before);
    assert_eq!(expression_transformer(pipeline.stages()), before);
    assert_eq!(pipeline.describe().fingerprint(), fingerprint);
    assert_eq!(compiled.fingerprint(), fingerprint);
}

#[test]
fn test_fused_matches_unfused_when_shape_depends_on_values() {
    let age_when_positive = stateless(
        "age_when_positive",
        AttributeAccess::new().reads(Category::Galaxy, "x"),
        |ctx: &RubixData, _: &StageScope<'_>| {
            let mut out = ctx.clone();
            if ctx.scalar(Category::Galaxy, "x").is_some_and(|x| x > 0.0) {
                out.component_mut(Category::Stars)
                    .ok_or_else(|| anyhow::anyhow!("stars are missing"))?
                    .set_array("age", array1(vec![5.0, 5.0]));
            }
            Ok(out)
        },
    );
    let config = crate::config::PipelineConfig::new(json!({
        "data": {"args": {"particle_type": ["stars"]}},
        "telescope": {"pixel_type": "square", "fov": 2.0, "sbin": 2},
    }));
    let pipeline = LinearTransformerPipeline::with_stages(
        "value_shaped",
        vec![bind(&age_when_positive), bind_with(&FilterParticles, &config)],
    )
    .unwrap();
    let input = |x: f64| {
        x_context(x).with_component(
            Category::Stars,
            Component::new().with_array("coords", array_n3(&[[0.5, 0.5, 0.0], [3.0, 0.0, 0.0]])),
        )
    };

    pipeline.run_compiled(&input(-1.0)).unwrap();
    let unfused = pipeline.run(input(1.0)).unwrap();
    let fused = pipeline.run_compiled(&input(1.0)).unwrap();
    assert_eq!(
        unfused.array(Category::Stars, "age").map(|a| a.iter().copied().collect::<Vec<_>>()),
        Some(vec![5.0, 0.0])
    );
    assert_eq!(fused, unfused);
}

#[test]
fn test_builder_and_registry_build_equal_pipelines() {
    let config = galaxy_config();
    let registry = StageRegistry::with_builtins();
    let stages: Vec<BoundStage> = ["rotate_galaxy", "filter_particles"]
        .iter()
        .map(|name| registry.bind(name, &config).unwrap())
        .collect();

    let mut builder = PipelineBuilder::new("partial", &config);
    for name in ["rotate_galaxy", "filter_particles"] {
        let factory = registry.get(name).unwrap();
        builder = builder.stage(factory.as_ref()).unwrap();
    }
    let built = builder.build().unwrap();

    assert_eq!(built.describe(), expression_transformer(&stages));
    let input = galaxy_fixture(4, 4);
    let out = built.run(input).unwrap();
    assert_scalar(&out, Category::Galaxy, "redshift", 0.1);
}
