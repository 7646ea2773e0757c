//! Flat export records and the versioned annotation document.
//!
//! Documents are JSON tagged by `format`. Legacy documents carry one
//! tubercle/edge set; current ones carry named sets with one of them active.
//! Reading always yields the current layout.

use crate::calibration::Calibration;
use crate::classification::Confidence;
use crate::connectivity::NeighborEdge;
use crate::detection::Tubercle;
use crate::pipeline::MeasurementResult;
use crate::profiles::DetectionProfile;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const FORMAT_V1: &str = "tubercle-annotations/v1";
pub const FORMAT_V2: &str = "tubercle-annotations/v2";

/// Name given to the single set of an upgraded legacy document.
pub const DEFAULT_SET: &str = "default";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TubercleRow {
    pub id: u32,
    pub centroid_x: f64,
    pub centroid_y: f64,
    pub diameter_px: f64,
    pub diameter_um: f64,
    pub radius_px: f64,
    pub circularity: f64,
}

impl From<&Tubercle> for TubercleRow {
    fn from(t: &Tubercle) -> Self {
        Self {
            id: t.id,
            centroid_x: t.centroid.x,
            centroid_y: t.centroid.y,
            diameter_px: t.diameter_px,
            diameter_um: t.diameter_um,
            radius_px: t.radius_px,
            circularity: t.circularity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRow {
    pub id1: u32,
    pub id2: u32,
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub center_distance_um: f64,
    pub edge_distance_um: f64,
}

impl From<&NeighborEdge> for EdgeRow {
    fn from(e: &NeighborEdge) -> Self {
        Self {
            id1: e.id1,
            id2: e.id2,
            x1: e.x1,
            y1: e.y1,
            x2: e.x2,
            y2: e.y2,
            center_distance_um: e.center_distance_um,
            edge_distance_um: e.edge_distance_um,
        }
    }
}

pub fn tubercle_rows(result: &MeasurementResult) -> Vec<TubercleRow> {
    result.tubercles.iter().map(TubercleRow::from).collect()
}

pub fn edge_rows(result: &MeasurementResult) -> Vec<EdgeRow> {
    result.edges.iter().map(EdgeRow::from).collect()
}

/// Aggregate statistics as stored in a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryStatistics {
    pub n_tubercles: usize,
    pub n_edges: usize,
    pub mean_diameter_um: Option<f64>,
    pub std_diameter_um: Option<f64>,
    pub mean_spacing_um: Option<f64>,
    pub std_spacing_um: Option<f64>,
    pub suggested_genus: Option<String>,
    #[serde(default)]
    pub classification_confidence: Confidence,
}

impl From<&MeasurementResult> for SummaryStatistics {
    fn from(result: &MeasurementResult) -> Self {
        Self {
            n_tubercles: result.stats.n_tubercles,
            n_edges: result.stats.n_edges,
            mean_diameter_um: result.stats.mean_diameter_um,
            std_diameter_um: result.stats.std_diameter_um,
            mean_spacing_um: result.stats.mean_spacing_um,
            std_spacing_um: result.stats.std_spacing_um,
            suggested_genus: result.suggested_genus.clone(),
            classification_confidence: result.classification_confidence,
        }
    }
}

/// One named set of tubercles and edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationSet {
    pub name: String,
    pub tubercles: Vec<TubercleRow>,
    pub edges: Vec<EdgeRow>,
}

/// Legacy single-set layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyAnnotations {
    pub image_id: String,
    pub calibration: Calibration,
    pub profile: DetectionProfile,
    pub statistics: SummaryStatistics,
    pub tubercles: Vec<TubercleRow>,
    pub edges: Vec<EdgeRow>,
}

/// Current multi-set layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotations {
    pub image_id: String,
    pub calibration: Calibration,
    pub profile: DetectionProfile,
    pub statistics: SummaryStatistics,
    pub sets: Vec<AnnotationSet>,
    pub active_set: String,
}

impl Annotations {
    /// Document holding `result` as its single, active set.
    pub fn from_result(result: &MeasurementResult, profile: &DetectionProfile) -> Self {
        Self {
            image_id: result.image_id.clone(),
            calibration: result.calibration,
            profile: profile.clone(),
            statistics: SummaryStatistics::from(result),
            sets: vec![AnnotationSet {
                name: DEFAULT_SET.to_string(),
                tubercles: tubercle_rows(result),
                edges: edge_rows(result),
            }],
            active_set: DEFAULT_SET.to_string(),
        }
    }

    pub fn set(&self, name: &str) -> Option<&AnnotationSet> {
        self.sets.iter().find(|s| s.name == name)
    }

    pub fn active(&self) -> Result<&AnnotationSet> {
        self.set(&self.active_set).ok_or_else(|| {
            Error::InvalidConfiguration(format!(
                "active set '{}' is not one of the document's sets",
                self.active_set
            ))
        })
    }

    /// Add or replace a named set.
    pub fn upsert_set(&mut self, set: AnnotationSet) {
        match self.sets.iter_mut().find(|s| s.name == set.name) {
            Some(existing) => *existing = set,
            None => self.sets.push(set),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let mut names: Vec<&str> = self.sets.iter().map(|s| s.name.as_str()).collect();
        names.sort_unstable();
        if names.windows(2).any(|w| w[0] == w[1]) {
            return Err(Error::InvalidConfiguration(
                "annotation set names must be unique".to_string(),
            ));
        }
        if !(self.calibration.um_per_pixel() > 0.0) {
            return Err(Error::InvalidConfiguration(
                "calibration um_per_pixel must be positive".to_string(),
            ));
        }
        self.active().map(|_| ())
    }
}

/// Any supported document version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format")]
pub enum AnnotationDocument {
    #[serde(rename = "tubercle-annotations/v1")]
    V1(LegacyAnnotations),
    #[serde(rename = "tubercle-annotations/v2")]
    V2(Annotations),
}

impl AnnotationDocument {
    pub fn format(&self) -> &'static str {
        match self {
            AnnotationDocument::V1(_) => FORMAT_V1,
            AnnotationDocument::V2(_) => FORMAT_V2,
        }
    }

    /// Convert to the current layout and validate it.
    pub fn upgrade(self) -> Result<Annotations> {
        let annotations = match self {
            AnnotationDocument::V1(legacy) => Annotations {
                image_id: legacy.image_id,
                calibration: legacy.calibration,
                profile: legacy.profile,
                statistics: legacy.statistics,
                sets: vec![AnnotationSet {
                    name: DEFAULT_SET.to_string(),
                    tubercles: legacy.tubercles,
                    edges: legacy.edges,
                }],
                active_set: DEFAULT_SET.to_string(),
            },
            AnnotationDocument::V2(current) => current,
        };
        annotations.validate()?;
        Ok(annotations)
    }
}

/// Parse a document of any version into the current layout.
pub fn from_json(json: &str) -> Result<Annotations> {
    let document: AnnotationDocument = serde_json::from_str(json)?;
    tracing::debug!(format = document.format(), "annotation document parsed");
    document.upgrade()
}

pub fn to_json(annotations: &Annotations) -> Result<String> {
    annotations.validate()?;
    Ok(serde_json::to_string_pretty(&AnnotationDocument::V2(
        annotations.clone(),
    ))?)
}

pub fn read_annotations(path: impl AsRef<Path>) -> Result<Annotations> {
    let content = std::fs::read_to_string(path)?;
    from_json(&content)
}

pub fn write_annotations(path: impl AsRef<Path>, annotations: &Annotations) -> Result<()> {
    std::fs::write(path, to_json(annotations)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::calibrate_manual;
    use serde_json::json;

    fn legacy_json() -> serde_json::Value {
        let calibration = calibrate_manual(10.0, 50.0).unwrap();
        json!({
            "format": FORMAT_V1,
            "image_id": "scale.tif",
            "calibration": calibration,
            "profile": DetectionProfile::default(),
            "statistics": { "n_tubercles": 1, "n_edges": 0,
                "mean_diameter_um": 4.0, "std_diameter_um": 0.0,
                "mean_spacing_um": null, "std_spacing_um": null,
                "suggested_genus": null },
            "tubercles": [{ "id": 1, "centroid_x": 10.0, "centroid_y": 12.0,
                "diameter_px": 20.0, "diameter_um": 4.0, "radius_px": 10.0,
                "circularity": 0.9 }],
            "edges": []
        })
    }

    #[test]
    fn legacy_document_upgrades_to_default_set() {
        let annotations = from_json(&legacy_json().to_string()).unwrap();
        assert_eq!(annotations.active_set, DEFAULT_SET);
        assert_eq!(annotations.sets.len(), 1);
        let active = annotations.active().unwrap();
        assert_eq!(active.tubercles.len(), 1);
        assert_eq!(active.tubercles[0].centroid_y, 12.0);
        assert_eq!(
            annotations.statistics.classification_confidence,
            Confidence::None
        );
    }

    #[test]
    fn written_documents_are_current_format() {
        let annotations = from_json(&legacy_json().to_string()).unwrap();
        let text = to_json(&annotations).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["format"], FORMAT_V2);
        assert_eq!(from_json(&text).unwrap(), annotations);
    }

    #[test]
    fn unknown_format_is_a_serialization_error() {
        let mut value = legacy_json();
        value["format"] = json!("tubercle-annotations/v9");
        assert!(matches!(from_json(&value.to_string()), Err(Error::Json(_))));
    }

    #[test]
    fn dangling_active_set_is_invalid() {
        let mut annotations = from_json(&legacy_json().to_string()).unwrap();
        annotations.active_set = "manual-edit".to_string();
        let text = serde_json::to_string(&AnnotationDocument::V2(annotations)).unwrap();
        assert!(matches!(
            from_json(&text),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn upsert_replaces_by_name() {
        let mut annotations = from_json(&legacy_json().to_string()).unwrap();
        annotations.upsert_set(AnnotationSet {
            name: "edited".to_string(),
            tubercles: vec![],
            edges: vec![],
        });
        annotations.upsert_set(AnnotationSet {
            name: DEFAULT_SET.to_string(),
            tubercles: vec![],
            edges: vec![],
        });
        assert_eq!(annotations.sets.len(), 2);
        assert!(annotations.active().unwrap().tubercles.is_empty());
    }
}
