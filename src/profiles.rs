//! Detection profiles: named, immutable parameter sets tuned per imaging
//! regime or per genus.
//!
//! The registry is an ordinary value. Callers build it with
//! [`ProfileRegistry::builtin`], optionally register their own profiles, and
//! hand it to the pipeline.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name of the profile used when none is requested.
pub const DEFAULT_PROFILE: &str = "default";

/// Closed interval in micrometers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UmRange {
    pub min: f64,
    pub max: f64,
}

impl UmRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    pub fn midpoint(&self) -> f64 {
        0.5 * (self.min + self.max)
    }

    /// True when `value` is at least `fraction * width` away from both bounds.
    pub fn contains_well_inside(&self, value: f64, fraction: f64) -> bool {
        let margin = fraction * self.width();
        value >= self.min + margin && value <= self.max - margin
    }
}

/// Expected tubercle geometry for a genus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenusReference {
    pub genus: String,
    pub diameter_um: UmRange,
    pub spacing_um: UmRange,
}

/// Tunable parameters of the preprocessing and detection stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionProfile {
    pub name: String,
    pub description: String,
    /// Normalised CLAHE clip limit in `(0, 1]`.
    pub clahe_clip_limit: f64,
    /// CLAHE tile size in pixels.
    pub clahe_kernel_size: usize,
    /// Gaussian blur sigma in pixels; 0 disables blurring.
    pub blur_sigma: f64,
    /// Disk radius of the optional top-hat style morphological opening.
    pub opening_radius: Option<usize>,
    /// Minimum scale-normalised blob response.
    pub threshold: f64,
    pub min_circularity: f64,
    pub min_diameter_um: f64,
    pub max_diameter_um: f64,
    pub edge_margin_px: f64,
    /// Explicit blob scale bounds in pixels; derived from the diameter range
    /// when absent.
    pub min_sigma: Option<f64>,
    pub max_sigma: Option<f64>,
    pub reference: Option<GenusReference>,
}

impl Default for DetectionProfile {
    fn default() -> Self {
        Self {
            name: DEFAULT_PROFILE.to_string(),
            description: "General purpose settings for SEM scale images".to_string(),
            clahe_clip_limit: 0.03,
            clahe_kernel_size: 64,
            blur_sigma: 1.0,
            opening_radius: None,
            threshold: 0.05,
            min_circularity: 0.5,
            min_diameter_um: 2.0,
            max_diameter_um: 10.0,
            edge_margin_px: 10.0,
            min_sigma: None,
            max_sigma: None,
            reference: None,
        }
    }
}

impl DetectionProfile {
    pub fn diameter_range(&self) -> UmRange {
        UmRange::new(self.min_diameter_um, self.max_diameter_um)
    }

    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push("name must not be empty".to_string());
        }
        if !(self.clahe_clip_limit > 0.0 && self.clahe_clip_limit <= 1.0) {
            errors.push(format!(
                "clahe_clip_limit must be in (0, 1], got {}",
                self.clahe_clip_limit
            ));
        }
        if self.clahe_kernel_size < 2 {
            errors.push("clahe_kernel_size must be at least 2".to_string());
        }
        if !(self.blur_sigma >= 0.0) {
            errors.push(format!("blur_sigma must be non-negative, got {}", self.blur_sigma));
        }
        if !(self.min_circularity >= 0.0 && self.min_circularity <= 1.0) {
            errors.push(format!(
                "min_circularity must be in [0, 1], got {}",
                self.min_circularity
            ));
        }
        if !(self.min_diameter_um > 0.0 && self.min_diameter_um < self.max_diameter_um) {
            errors.push(format!(
                "diameter range must satisfy 0 < min < max, got [{}, {}]",
                self.min_diameter_um, self.max_diameter_um
            ));
        }
        if !(self.edge_margin_px >= 0.0) {
            errors.push("edge_margin_px must be non-negative".to_string());
        }
        match (self.min_sigma, self.max_sigma) {
            (Some(lo), Some(hi)) if !(lo > 0.0 && lo <= hi) => {
                errors.push(format!(
                    "sigma bounds must satisfy 0 < min <= max, got [{}, {}]",
                    lo, hi
                ));
            }
            (Some(s), None) | (None, Some(s)) if !(s > 0.0) => {
                errors.push(format!("sigma bound must be positive, got {}", s));
            }
            _ => {}
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::InvalidConfiguration(format!(
                "profile '{}': {}",
                self.name,
                errors.join("; ")
            )))
        }
    }
}

fn genus_profile(
    name: &str,
    genus: &str,
    detect_diameter: (f64, f64),
    reference_diameter: (f64, f64),
    reference_spacing: (f64, f64),
) -> DetectionProfile {
    DetectionProfile {
        name: name.to_string(),
        description: format!("Tuned for {} scales", genus),
        min_diameter_um: detect_diameter.0,
        max_diameter_um: detect_diameter.1,
        reference: Some(GenusReference {
            genus: genus.to_string(),
            diameter_um: UmRange::new(reference_diameter.0, reference_diameter.1),
            spacing_um: UmRange::new(reference_spacing.0, reference_spacing.1),
        }),
        ..DetectionProfile::default()
    }
}

fn builtin_profiles() -> Vec<DetectionProfile> {
    let default = DetectionProfile::default();
    vec![
        default.clone(),
        DetectionProfile {
            name: "high-contrast".to_string(),
            description: "Sharp, well exposed micrographs".to_string(),
            clahe_clip_limit: 0.01,
            blur_sigma: 0.8,
            threshold: 0.1,
            min_circularity: 0.6,
            ..default.clone()
        },
        DetectionProfile {
            name: "low-contrast".to_string(),
            description: "Dim or hazy micrographs".to_string(),
            clahe_clip_limit: 0.05,
            clahe_kernel_size: 32,
            blur_sigma: 1.5,
            threshold: 0.02,
            min_circularity: 0.4,
            ..default.clone()
        },
        DetectionProfile {
            name: "scanned".to_string(),
            description: "Figures scanned from printed plates".to_string(),
            clahe_clip_limit: 0.04,
            blur_sigma: 2.0,
            opening_radius: Some(2),
            threshold: 0.04,
            min_circularity: 0.35,
            edge_margin_px: 15.0,
            ..default
        },
        genus_profile("lepisosteus", "Lepisosteus", (2.0, 6.5), (3.0, 5.0), (2.5, 4.5)),
        genus_profile("atractosteus", "Atractosteus", (3.5, 10.0), (5.0, 8.0), (3.0, 6.0)),
        genus_profile("polypterus", "Polypterus", (1.0, 4.0), (1.5, 3.0), (3.5, 6.5)),
        genus_profile("obaichthys", "Obaichthys", (2.5, 8.0), (3.5, 6.0), (0.8, 2.5)),
        genus_profile(
            "paralepidosteus",
            "Paralepidosteus",
            (4.0, 12.0),
            (6.0, 10.0),
            (5.0, 9.0),
        ),
    ]
}

/// Lookup table from profile name to an immutable profile.
#[derive(Debug, Clone, Default)]
pub struct ProfileRegistry {
    profiles: BTreeMap<String, DetectionProfile>,
}

impl ProfileRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the built-in profiles.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for profile in builtin_profiles() {
            registry.profiles.insert(profile.name.clone(), profile);
        }
        registry
    }

    /// Add or replace a profile after validating it.
    pub fn register(&mut self, profile: DetectionProfile) -> Result<()> {
        profile.validate()?;
        self.profiles.insert(profile.name.clone(), profile);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<DetectionProfile> {
        self.profiles
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownProfile {
                name: name.to_string(),
                valid: self.names(),
            })
    }

    pub fn names(&self) -> Vec<String> {
        self.profiles.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DetectionProfile> {
        self.profiles.values()
    }

    /// Genus references of every profile that carries one.
    pub fn genus_references(&self) -> Vec<GenusReference> {
        self.profiles
            .values()
            .filter_map(|p| p.reference.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_profiles_are_valid() {
        let registry = ProfileRegistry::builtin();
        assert!(registry.len() >= 9);
        for profile in registry.iter() {
            profile.validate().unwrap();
        }
    }

    #[test]
    fn unknown_profile_lists_valid_names() {
        let registry = ProfileRegistry::builtin();
        let err = registry.get("no-such-profile").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("no-such-profile"));
        assert!(message.contains("default"));
        assert!(message.contains("lepisosteus"));
        match err {
            Error::UnknownProfile { valid, .. } => assert_eq!(valid, registry.names()),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn register_rejects_inverted_diameter_range() {
        let mut registry = ProfileRegistry::new();
        let bad = DetectionProfile {
            name: "bad".to_string(),
            min_diameter_um: 5.0,
            max_diameter_um: 2.0,
            ..DetectionProfile::default()
        };
        assert!(matches!(
            registry.register(bad),
            Err(Error::InvalidConfiguration(_))
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn genus_references_come_from_genus_profiles() {
        let references = ProfileRegistry::builtin().genus_references();
        let genera: Vec<_> = references.iter().map(|r| r.genus.as_str()).collect();
        assert!(genera.contains(&"Lepisosteus"));
        assert!(genera.contains(&"Atractosteus"));
        assert_eq!(references.len(), 5);
    }

    #[test]
    fn well_inside_respects_margin() {
        let range = UmRange::new(2.0, 4.0);
        assert!(range.contains_well_inside(3.0, 0.15));
        assert!(range.contains(2.1));
        assert!(!range.contains_well_inside(2.1, 0.15));
    }

    #[test]
    fn profile_deserialises_with_defaults() {
        let profile: DetectionProfile =
            serde_json::from_str(r#"{"name": "custom", "threshold": 0.2}"#).unwrap();
        assert_eq!(profile.name, "custom");
        assert_eq!(profile.threshold, 0.2);
        assert_eq!(profile.clahe_kernel_size, 64);
    }
}
