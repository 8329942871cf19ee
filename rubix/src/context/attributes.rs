//! Categories and the static attribute catalogue.
//!
//! Every category has a declared set of attribute names. Stages that act on
//! "all array attributes except ..." use these declared sets instead of
//! inspecting whatever happens to be stored on a record.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A named sub-record of the context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Galaxy-level metadata (redshift, center, half-mass radius).
    Galaxy,
    /// Stellar particles.
    Stars,
    /// Gas cells.
    Gas,
}

const GALAXY_ATTRIBUTES: &[&str] = &["center", "halfmassrad_stars", "redshift"];

const STAR_ATTRIBUTES: &[&str] = &[
    "age",
    "coords",
    "mask",
    "mass",
    "metallicity",
    "pixel_assignment",
    "spatial_bin_edges",
    "velocity",
];

const GAS_ATTRIBUTES: &[&str] = &[
    "coords",
    "density",
    "electron_abundance",
    "internal_energy",
    "mask",
    "mass",
    "metallicity",
    "pixel_assignment",
    "sfr",
    "spatial_bin_edges",
    "temperature",
    "velocity",
];

const STAR_MASKABLE: &[&str] = &["age", "mass", "metallicity", "pixel_assignment"];

const GAS_MASKABLE: &[&str] = &[
    "density",
    "electron_abundance",
    "internal_energy",
    "mass",
    "metallicity",
    "pixel_assignment",
    "sfr",
    "temperature",
];

impl Category {
    /// All categories, in context order.
    pub const ALL: [Self; 3] = [Self::Galaxy, Self::Stars, Self::Gas];

    /// The particle categories.
    pub const PARTICLES: [Self; 2] = [Self::Stars, Self::Gas];

    /// Returns the category's name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Galaxy => "galaxy",
            Self::Stars => "stars",
            Self::Gas => "gas",
        }
    }

    /// Whether this category holds per-particle arrays.
    #[must_use]
    pub const fn is_particle(self) -> bool {
        matches!(self, Self::Stars | Self::Gas)
    }

    /// The attributes this category is documented to carry.
    #[must_use]
    pub const fn declared_attributes(self) -> &'static [&'static str] {
        match self {
            Self::Galaxy => GALAXY_ATTRIBUTES,
            Self::Stars => STAR_ATTRIBUTES,
            Self::Gas => GAS_ATTRIBUTES,
        }
    }

    /// Per-particle attributes zeroed when a particle is masked out.
    ///
    /// Positions and velocities are never masked.
    #[must_use]
    pub const fn maskable_attributes(self) -> &'static [&'static str] {
        match self {
            Self::Galaxy => &[],
            Self::Stars => STAR_MASKABLE,
            Self::Gas => GAS_MASKABLE,
        }
    }

    /// Whether `name` is in the declared catalogue.
    #[must_use]
    pub fn is_declared(self, name: &str) -> bool {
        self.declared_attributes().contains(&name)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "galaxy" => Ok(Self::Galaxy),
            "stars" => Ok(Self::Stars),
            "gas" => Ok(Self::Gas),
            other => Err(format!("unknown category '{other}'")),
        }
    }
}

/// Addresses one attribute of one category, written `category/name`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AttributeRef {
    /// The category.
    pub category: Category,
    /// The attribute name.
    pub name: String,
}

impl AttributeRef {
    /// Creates a new attribute reference.
    #[must_use]
    pub fn new(category: Category, name: impl Into<String>) -> Self {
        Self {
            category,
            name: name.into(),
        }
    }
}

impl fmt::Display for AttributeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.category, self.name)
    }
}

impl FromStr for AttributeRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (category, name) = s
            .split_once('/')
            .ok_or_else(|| format!("attribute '{s}' is not of the form category/name"))?;
        if name.is_empty() {
            return Err(format!("attribute '{s}' has an empty name"));
        }
        Ok(Self::new(category.parse()?, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_round_trip_names() {
        for category in Category::ALL {
            assert_eq!(category.as_str().parse::<Category>(), Ok(category));
        }
        assert!("dark_matter".parse::<Category>().is_err());
    }

    #[test]
    fn test_maskable_excludes_kinematics() {
        for category in Category::PARTICLES {
            let maskable = category.maskable_attributes();
            assert!(!maskable.contains(&"coords"));
            assert!(!maskable.contains(&"velocity"));
            for name in maskable {
                assert!(category.is_declared(name), "{category}/{name} not declared");
            }
        }
        assert!(Category::Galaxy.maskable_attributes().is_empty());
    }

    #[test]
    fn test_attribute_ref_parse() {
        let attr: AttributeRef = "stars/coords".parse().unwrap();
        assert_eq!(attr, AttributeRef::new(Category::Stars, "coords"));
        assert_eq!(attr.to_string(), "stars/coords");

        assert!("coords".parse::<AttributeRef>().is_err());
        assert!("stars/".parse::<AttributeRef>().is_err());
        assert!("halo/coords".parse::<AttributeRef>().is_err());
    }
}
