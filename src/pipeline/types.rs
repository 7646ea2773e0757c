use crate::calibration::{
    calibrate_from_known_magnification, calibrate_manual, estimate_calibration_700x, Calibration,
};
use crate::classification::Confidence;
use crate::connectivity::{GraphMethod, NeighborEdge};
use crate::detection::{BlobMethod, DetectionStats, Tubercle, DEFAULT_NUM_SIGMA};
use crate::preprocessing::Preprocessed;
use crate::profiles::{DetectionProfile, ProfileRegistry, DEFAULT_PROFILE};
use crate::statistics::MeasurementStats;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Profile selection: a registry name or an explicit parameter set.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileChoice {
    Named(String),
    Custom(DetectionProfile),
}

impl Default for ProfileChoice {
    fn default() -> Self {
        ProfileChoice::Named(DEFAULT_PROFILE.to_string())
    }
}

impl From<&str> for ProfileChoice {
    fn from(name: &str) -> Self {
        ProfileChoice::Named(name.to_string())
    }
}

impl From<DetectionProfile> for ProfileChoice {
    fn from(profile: DetectionProfile) -> Self {
        ProfileChoice::Custom(profile)
    }
}

impl ProfileChoice {
    pub fn resolve(&self, registry: &ProfileRegistry) -> Result<DetectionProfile> {
        match self {
            ProfileChoice::Named(name) => registry.get(name),
            ProfileChoice::Custom(profile) => {
                profile.validate()?;
                Ok(profile.clone())
            }
        }
    }
}

/// How to obtain the calibration for an image.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum CalibrationSource {
    /// Scale bar measured on the image
    Manual { scale_bar_um: f64, scale_bar_px: f64 },
    /// Nominal magnification; the field of view spans the image width
    Magnification(f64),
    /// Conventional 700x magnification over the image width
    #[default]
    Estimated,
    Explicit(Calibration),
}

impl CalibrationSource {
    pub fn resolve(&self, image_width_px: usize) -> Result<Calibration> {
        let width = u32::try_from(image_width_px)
            .map_err(|_| Error::invalid_parameter("image width does not fit in u32"))?;
        match *self {
            CalibrationSource::Manual {
                scale_bar_um,
                scale_bar_px,
            } => calibrate_manual(scale_bar_um, scale_bar_px),
            CalibrationSource::Magnification(m) => calibrate_from_known_magnification(m, width),
            CalibrationSource::Estimated => estimate_calibration_700x(Some(width)),
            CalibrationSource::Explicit(calibration) => Ok(calibration),
        }
    }
}

/// Options for one pipeline invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    pub profile: ProfileChoice,
    pub calibration: CalibrationSource,
    pub blob_method: BlobMethod,
    pub neighbor_graph: GraphMethod,
    pub num_sigma: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            profile: ProfileChoice::default(),
            calibration: CalibrationSource::default(),
            blob_method: BlobMethod::default(),
            neighbor_graph: GraphMethod::default(),
            num_sigma: DEFAULT_NUM_SIGMA,
        }
    }
}

impl PipelineOptions {
    pub fn with_profile(mut self, profile: impl Into<ProfileChoice>) -> Self {
        self.profile = profile.into();
        self
    }

    pub fn with_calibration(mut self, calibration: CalibrationSource) -> Self {
        self.calibration = calibration;
        self
    }

    pub fn with_blob_method(mut self, method: BlobMethod) -> Self {
        self.blob_method = method;
        self
    }

    pub fn with_neighbor_graph(mut self, method: GraphMethod) -> Self {
        self.neighbor_graph = method;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTime {
    pub stage_name: String,
    pub duration_ms: f64,
}

/// Measurements of one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementResult {
    /// Source path, or a caller supplied label for in-memory images
    pub image_id: String,
    /// `(height, width)`
    pub image_shape: (usize, usize),
    pub calibration: Calibration,
    pub profile: String,
    pub tubercles: Vec<Tubercle>,
    pub edges: Vec<NeighborEdge>,
    #[serde(flatten)]
    pub stats: MeasurementStats,
    pub suggested_genus: Option<String>,
    pub classification_confidence: Confidence,
}

impl MeasurementResult {
    pub fn n_tubercles(&self) -> usize {
        self.tubercles.len()
    }

    pub fn mean_diameter_um(&self) -> Option<f64> {
        self.stats.mean_diameter_um
    }

    pub fn mean_spacing_um(&self) -> Option<f64> {
        self.stats.mean_spacing_um
    }
}

/// What happened during a run, for troubleshooting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticInfo {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub source: String,
    /// `(height, width)`
    pub image_shape: (usize, usize),
    pub channels: usize,
    pub profile: String,
    pub calibration_method: String,
    pub um_per_pixel: f64,
    pub blob_method: BlobMethod,
    pub neighbor_graph: GraphMethod,
    pub min_sigma: f64,
    pub max_sigma: f64,
    pub detection: DetectionStats,
    pub n_tubercles: usize,
    pub n_edges: usize,
    pub intermediates: Vec<String>,
    pub stage_timings: Vec<StageTime>,
}

impl DiagnosticInfo {
    pub fn total_duration_ms(&self) -> f64 {
        self.stage_timings.iter().map(|t| t.duration_ms).sum()
    }
}

/// Everything a run produces.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub result: MeasurementResult,
    pub preprocessed: Preprocessed,
    pub diagnostics: DiagnosticInfo,
}

impl PipelineRun {
    pub fn into_parts(self) -> (MeasurementResult, Array2<f32>, DiagnosticInfo) {
        (self.result, self.preprocessed.image, self.diagnostics)
    }
}
