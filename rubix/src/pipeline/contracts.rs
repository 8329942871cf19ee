//! Attribute contract checks between the stages of an unfused run.

use crate::context::{AttributeRef, Category, Component, RubixData};
use crate::errors::{ContractViolationError, ViolationKind};
use crate::transformer::BoundStage;
use ndarray::{ArrayD, Zip};
use std::collections::BTreeSet;

/// Checks that every attribute `stage` reads is present in its input.
///
/// `producer` is the stage whose output `ctx` is, `None` for the run input.
pub(crate) fn check_inputs(
    stage: &BoundStage,
    index: usize,
    ctx: &RubixData,
    producer: Option<&str>,
) -> Result<(), ContractViolationError> {
    let Some(attr) = stage.access().reads.iter().find(|attr| !ctx.contains(attr)) else {
        return Ok(());
    };

    let detail = match producer {
        Some(p) => format!("'{attr}' was not produced by '{p}' or any earlier stage"),
        None => format!("'{attr}' is absent from the run input"),
    };
    let err = ContractViolationError::new(stage.name(), index, ViolationKind::MissingInput, detail)
        .with_attribute(attr.clone());
    Err(match producer {
        Some(p) => err.with_producer(p),
        None => err,
    })
}

/// Checks what `stage` did to the context.
///
/// Declared writes must be present, categories and particle counts must be
/// unchanged and, when `strict`, attributes the stage does not own must be
/// untouched.
pub(crate) fn check_outputs(
    stage: &BoundStage,
    index: usize,
    before: &RubixData,
    after: &RubixData,
    strict: bool,
) -> Result<(), ContractViolationError> {
    let violation = |kind, detail: String| {
        ContractViolationError::new(stage.name(), index, kind, detail).with_producer(stage.name())
    };

    if let Some(attr) = stage.access().writes.iter().find(|attr| !after.contains(attr)) {
        return Err(violation(
            ViolationKind::MissingOutput,
            format!("declared output '{attr}' was not written"),
        )
        .with_attribute(attr.clone()));
    }

    let categories_before: Vec<Category> = before.categories().collect();
    let categories_after: Vec<Category> = after.categories().collect();
    if categories_before != categories_after {
        return Err(violation(
            ViolationKind::CategorySetChanged,
            format!("categories changed from {categories_before:?} to {categories_after:?}"),
        ));
    }

    for (category, component) in before.components() {
        if !category.is_particle() {
            continue;
        }
        let Some(count) = component.particle_count() else {
            continue;
        };
        let resized = after
            .component(category)
            .and_then(Component::particle_count);
        if resized != Some(count) {
            return Err(violation(
                ViolationKind::ParticleCountChanged,
                format!("'{category}' had {count} particles, now {resized:?}"),
            ));
        }
    }

    if strict {
        check_ownership(stage, before, after).map_err(|attr| {
            violation(
                ViolationKind::UndeclaredWrite,
                format!("'{attr}' changed but is not declared as written"),
            )
            .with_attribute(attr)
        })?;
    }
    Ok(())
}

/// Returns the first attribute outside the stage's ownership that differs.
fn check_ownership(stage: &BoundStage, before: &RubixData, after: &RubixData) -> Result<(), AttributeRef> {
    for (category, old) in before.components() {
        let Some(new) = after.component(category) else {
            continue;
        };
        let names: BTreeSet<&str> = old
            .arrays()
            .map(|(name, _)| name)
            .chain(old.scalars().map(|(name, _)| name))
            .chain(new.arrays().map(|(name, _)| name))
            .chain(new.scalars().map(|(name, _)| name))
            .collect();

        for name in names {
            let attr = AttributeRef::new(category, name);
            if stage.access().owns(&attr) {
                continue;
            }
            if !same_array(old.array(name), new.array(name))
                || old.scalar(name).map(f64::to_bits) != new.scalar(name).map(f64::to_bits)
            {
                return Err(attr);
            }
        }
    }
    Ok(())
}

/// Bitwise equality, so an untouched NaN counts as unchanged.
fn same_array(old: Option<&ArrayD<f64>>, new: Option<&ArrayD<f64>>) -> bool {
    match (old, new) {
        (None, None) => true,
        (Some(a), Some(b)) => {
            a.shape() == b.shape() && Zip::from(a).and(b).all(|x, y| x.to_bits() == y.to_bits())
        }
        _ => false,
    }
}
