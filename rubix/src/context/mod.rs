//! The shared context threaded through pipeline stages.
//!
//! This module provides:
//! - [`RubixData`], the per-run record of category sub-records
//! - the static attribute catalogue per [`Category`]
//! - [`ContextShape`], the structural key used by the compiled form

mod attributes;
mod data;
mod shape;

pub use attributes::{AttributeRef, Category};
pub use data::{array1, array_n3, Component, RubixData};
pub use shape::{ComponentShape, ContextShape};
