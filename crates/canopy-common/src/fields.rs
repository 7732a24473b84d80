//! The closed set of catalog fields filled by the AI provider, and the
//! categories they are grouped into for progress reporting.
//!
//! Every [`FieldKey`] maps to exactly one [`Category`] through an exhaustive
//! `match`, so adding a field without assigning it a category does not
//! compile.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A single catalog field that can be generated for a plant entry.
///
/// The declaration order is the default fill order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKey {
    ScientificName,
    CommonNames,
    Family,
    Genus,
    Description,
    Appearance,
    FlowerColor,
    MatureSize,
    Watering,
    Sunlight,
    Soil,
    Temperature,
    Humidity,
    Fertilizer,
    GrowthRate,
    BloomSeason,
    Propagation,
    Hardiness,
    NativeRegion,
    Toxicity,
    PetSafety,
    Uses,
}

/// Logical grouping of fields, used for category-level progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Identity,
    Description,
    Care,
    Growth,
    Origin,
    Safety,
}

impl FieldKey {
    /// All fields in default fill order.
    pub const ALL: [FieldKey; 22] = [
        FieldKey::ScientificName,
        FieldKey::CommonNames,
        FieldKey::Family,
        FieldKey::Genus,
        FieldKey::Description,
        FieldKey::Appearance,
        FieldKey::FlowerColor,
        FieldKey::MatureSize,
        FieldKey::Watering,
        FieldKey::Sunlight,
        FieldKey::Soil,
        FieldKey::Temperature,
        FieldKey::Humidity,
        FieldKey::Fertilizer,
        FieldKey::GrowthRate,
        FieldKey::BloomSeason,
        FieldKey::Propagation,
        FieldKey::Hardiness,
        FieldKey::NativeRegion,
        FieldKey::Toxicity,
        FieldKey::PetSafety,
        FieldKey::Uses,
    ];

    /// The category this field rolls up into.
    pub fn category(self) -> Category {
        match self {
            Self::ScientificName | Self::CommonNames | Self::Family | Self::Genus => {
                Category::Identity
            }
            Self::Description | Self::Appearance | Self::FlowerColor | Self::MatureSize => {
                Category::Description
            }
            Self::Watering
            | Self::Sunlight
            | Self::Soil
            | Self::Temperature
            | Self::Humidity
            | Self::Fertilizer => Category::Care,
            Self::GrowthRate | Self::BloomSeason | Self::Propagation | Self::Hardiness => {
                Category::Growth
            }
            Self::NativeRegion => Category::Origin,
            Self::Toxicity | Self::PetSafety | Self::Uses => Category::Safety,
        }
    }

    /// Stable wire name (snake_case).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ScientificName => "scientific_name",
            Self::CommonNames => "common_names",
            Self::Family => "family",
            Self::Genus => "genus",
            Self::Description => "description",
            Self::Appearance => "appearance",
            Self::FlowerColor => "flower_color",
            Self::MatureSize => "mature_size",
            Self::Watering => "watering",
            Self::Sunlight => "sunlight",
            Self::Soil => "soil",
            Self::Temperature => "temperature",
            Self::Humidity => "humidity",
            Self::Fertilizer => "fertilizer",
            Self::GrowthRate => "growth_rate",
            Self::BloomSeason => "bloom_season",
            Self::Propagation => "propagation",
            Self::Hardiness => "hardiness",
            Self::NativeRegion => "native_region",
            Self::Toxicity => "toxicity",
            Self::PetSafety => "pet_safety",
            Self::Uses => "uses",
        }
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown field: {s}"))
    }
}

impl Category {
    /// All categories in display order.
    pub const ALL: [Category; 6] = [
        Category::Identity,
        Category::Description,
        Category::Care,
        Category::Growth,
        Category::Origin,
        Category::Safety,
    ];

    /// Stable wire name (snake_case).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Description => "description",
            Self::Care => "care",
            Self::Growth => "growth",
            Self::Origin => "origin",
            Self::Safety => "safety",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn all_fields_listed_once() {
        let unique: HashSet<_> = FieldKey::ALL.iter().collect();
        assert_eq!(unique.len(), FieldKey::ALL.len());
    }

    #[test]
    fn every_category_has_at_least_one_field() {
        for category in Category::ALL {
            assert!(
                FieldKey::ALL.iter().any(|f| f.category() == category),
                "category {category} has no fields"
            );
        }
    }

    #[test]
    fn wire_names_parse_back() {
        for field in FieldKey::ALL {
            assert_eq!(field.as_str().parse::<FieldKey>().unwrap(), field);
        }
        assert!("leaf_shape".parse::<FieldKey>().is_err());
    }

    #[test]
    fn serde_matches_wire_name() {
        let json = serde_json::to_string(&FieldKey::PetSafety).unwrap();
        assert_eq!(json, "\"pet_safety\"");
        let json = serde_json::to_string(&Category::Care).unwrap();
        assert_eq!(json, "\"care\"");
    }

    #[test]
    fn declaration_order_is_fill_order() {
        let mut sorted = FieldKey::ALL;
        sorted.sort();
        assert_eq!(sorted, FieldKey::ALL);
    }
}
