//! Validation and hashing helpers shared by the transformer and pipeline
//! modules.

mod hashing;
mod validation;

pub use hashing::{fingerprint, short_fingerprint};
pub use validation::{
    find_duplicate, validate_stage_name, DuplicateNameError, InvalidNameError, STAGE_NAME_PATTERN,
};
