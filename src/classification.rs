//! Rule-based genus suggestion from mean tubercle diameter and spacing.

use crate::profiles::{GenusReference, ProfileRegistry};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fraction of a range's width a value must keep from both bounds to count
/// as well inside it.
pub const WELL_INSIDE_FRACTION: f64 = 0.15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
    #[default]
    None,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
            Confidence::None => "none",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Classification {
    pub genus: Option<String>,
    pub confidence: Confidence,
}

impl Classification {
    fn none() -> Self {
        Self::default()
    }
}

/// Classifier over a fixed set of genus references.
#[derive(Debug, Clone, Default)]
pub struct GenusClassifier {
    references: Vec<GenusReference>,
}

impl GenusClassifier {
    pub fn new(references: Vec<GenusReference>) -> Self {
        Self { references }
    }

    /// References of every genus profile in `registry`.
    pub fn from_registry(registry: &ProfileRegistry) -> Self {
        Self::new(registry.genus_references())
    }

    pub fn classify(
        &self,
        mean_diameter_um: Option<f64>,
        mean_spacing_um: Option<f64>,
    ) -> Classification {
        let (Some(d), Some(s)) = (mean_diameter_um, mean_spacing_um) else {
            return Classification::none();
        };
        if !d.is_finite() || !s.is_finite() {
            return Classification::none();
        }

        let matches: Vec<&GenusReference> = self
            .references
            .iter()
            .filter(|r| r.diameter_um.contains(d) && r.spacing_um.contains(s))
            .collect();

        match matches.as_slice() {
            [] => Classification::none(),
            [only] => {
                let inside = [
                    only.diameter_um.contains_well_inside(d, WELL_INSIDE_FRACTION),
                    only.spacing_um.contains_well_inside(s, WELL_INSIDE_FRACTION),
                ];
                let confidence = match inside.iter().filter(|&&b| b).count() {
                    2 => Confidence::High,
                    1 => Confidence::Medium,
                    _ => Confidence::Low,
                };
                Classification {
                    genus: Some(only.genus.clone()),
                    confidence,
                }
            }
            several => {
                let closest = several
                    .iter()
                    .min_by(|a, b| {
                        midpoint_distance(a, d, s).total_cmp(&midpoint_distance(b, d, s))
                    })
                    .map(|r| r.genus.clone());
                Classification {
                    genus: closest,
                    confidence: Confidence::Low,
                }
            }
        }
    }
}

/// Distance to the range midpoints, each axis scaled by its range width.
fn midpoint_distance(reference: &GenusReference, d: f64, s: f64) -> f64 {
    let axis = |value: f64, range: &crate::profiles::UmRange| {
        let width = range.width().max(f64::EPSILON);
        (value - range.midpoint()) / width
    };
    axis(d, &reference.diameter_um).hypot(axis(s, &reference.spacing_um))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiles::UmRange;

    fn reference(genus: &str, d: (f64, f64), s: (f64, f64)) -> GenusReference {
        GenusReference {
            genus: genus.to_string(),
            diameter_um: UmRange::new(d.0, d.1),
            spacing_um: UmRange::new(s.0, s.1),
        }
    }

    #[test]
    fn missing_means_give_no_suggestion() {
        let classifier = GenusClassifier::from_registry(&ProfileRegistry::builtin());
        assert_eq!(classifier.classify(None, Some(3.0)), Classification::none());
        assert_eq!(classifier.classify(Some(4.0), None), Classification::none());
    }

    #[test]
    fn centred_values_are_high_confidence() {
        let classifier = GenusClassifier::new(vec![reference("A", (2.0, 4.0), (1.0, 3.0))]);
        let c = classifier.classify(Some(3.0), Some(2.0));
        assert_eq!(c.genus.as_deref(), Some("A"));
        assert_eq!(c.confidence, Confidence::High);
    }

    #[test]
    fn one_value_near_bound_is_medium() {
        let classifier = GenusClassifier::new(vec![reference("A", (2.0, 4.0), (1.0, 3.0))]);
        let c = classifier.classify(Some(3.0), Some(1.1));
        assert_eq!(c.confidence, Confidence::Medium);
        let c = classifier.classify(Some(2.05), Some(2.95));
        assert_eq!(c.confidence, Confidence::Low);
    }

    #[test]
    fn ties_pick_nearest_midpoint_with_low_confidence() {
        let classifier = GenusClassifier::new(vec![
            reference("A", (2.0, 6.0), (1.0, 5.0)),
            reference("B", (3.0, 4.0), (2.0, 3.0)),
        ]);
        let c = classifier.classify(Some(3.5), Some(2.5));
        assert_eq!(c.genus.as_deref(), Some("B"));
        assert_eq!(c.confidence, Confidence::Low);
    }

    #[test]
    fn no_match_is_none() {
        let classifier = GenusClassifier::from_registry(&ProfileRegistry::builtin());
        let c = classifier.classify(Some(50.0), Some(50.0));
        assert!(c.genus.is_none());
        assert_eq!(c.confidence, Confidence::None);
    }

    #[test]
    fn builtin_references_recognise_lepisosteus() {
        let classifier = GenusClassifier::from_registry(&ProfileRegistry::builtin());
        let c = classifier.classify(Some(3.79), Some(3.14));
        assert_eq!(c.genus.as_deref(), Some("Lepisosteus"));
        assert_ne!(c.confidence, Confidence::None);
    }
}
