//! Validation utilities for stage sequences.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Pattern every stage name must match.
pub const STAGE_NAME_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_.\-]*$";

static STAGE_NAME: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(STAGE_NAME_PATTERN));

/// Validates a stage name against [`STAGE_NAME_PATTERN`].
pub fn validate_stage_name(name: &str) -> Result<(), InvalidNameError> {
    match STAGE_NAME.as_ref() {
        Ok(re) if re.is_match(name) => Ok(()),
        Ok(_) if name.trim().is_empty() => Err(InvalidNameError {
            name: name.to_string(),
            reason: "Stage name cannot be empty or whitespace-only".to_string(),
        }),
        Ok(_) => Err(InvalidNameError {
            name: name.to_string(),
            reason: format!("Stage name must match {STAGE_NAME_PATTERN}"),
        }),
        Err(e) => Err(InvalidNameError {
            name: name.to_string(),
            reason: e.to_string(),
        }),
    }
}

/// Error indicating an invalid name.
#[derive(Debug, Clone)]
pub struct InvalidNameError {
    /// The rejected name.
    pub name: String,
    /// The reason the name is invalid.
    pub reason: String,
}

impl std::fmt::Display for InvalidNameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Invalid name '{}': {}", self.name, self.reason)
    }
}

impl std::error::Error for InvalidNameError {}

/// Returns the first name that appears twice, with both positions.
pub fn find_duplicate<S: AsRef<str>>(names: &[S]) -> Option<DuplicateNameError> {
    let mut seen: HashMap<&str, usize> = HashMap::with_capacity(names.len());
    for (index, name) in names.iter().enumerate() {
        if let Some(first) = seen.insert(name.as_ref(), index) {
            return Some(DuplicateNameError {
                name: name.as_ref().to_string(),
                first,
                second: index,
            });
        }
    }
    None
}

/// Error indicating two stages share a name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateNameError {
    /// The repeated name.
    pub name: String,
    /// Position of the first occurrence.
    pub first: usize,
    /// Position of the second occurrence.
    pub second: usize,
}

impl std::fmt::Display for DuplicateNameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Stage '{}' appears at positions {} and {}",
            self.name, self.first, self.second
        )
    }
}

impl std::error::Error for DuplicateNameError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_stage_name_ok() {
        assert!(validate_stage_name("rotate_galaxy").is_ok());
        assert!(validate_stage_name("calc.ifu-2").is_ok());
        assert!(validate_stage_name("_private").is_ok());
    }

    #[test]
    fn test_validate_stage_name_rejects() {
        assert!(validate_stage_name("").is_err());
        assert!(validate_stage_name("   ").is_err());
        assert!(validate_stage_name("2fast").is_err());
        assert!(validate_stage_name("has space").is_err());
    }

    #[test]
    fn test_empty_name_reason() {
        let err = validate_stage_name(" ").unwrap_err();
        assert!(err.reason.contains("empty"));
    }

    #[test]
    fn test_find_duplicate() {
        assert_eq!(find_duplicate(&["a", "b", "c"]), None);
        let dup = find_duplicate(&["a", "b", "a", "b"]).unwrap();
        assert_eq!(dup.name, "a");
        assert_eq!((dup.first, dup.second), (0, 2));
        assert_eq!(dup.to_string(), "Stage 'a' appears at positions 0 and 2");
    }
}
