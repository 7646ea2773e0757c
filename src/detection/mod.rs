//! Tubercle detection: scale-space blobs, geometric filters, circularity.

pub mod blobs;
pub mod circularity;
pub mod filters;

pub use blobs::{blob_dog, blob_log, prune_blobs, BlobCandidate};
pub use circularity::estimate_circularity;
pub use filters::{
    diameter_px_to_sigma, filter_by_edge_distance, filter_by_size, sigma_to_diameter_px,
};

use crate::calibration::Calibration;
use crate::profiles::DetectionProfile;
use crate::{Error, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Smallest blob scale the detectors are run at, in pixels.
pub const MIN_SIGMA_PX: f64 = 0.5;

/// Number of LoG scales when none is configured.
pub const DEFAULT_NUM_SIGMA: usize = 10;

/// Scale-space detector variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlobMethod {
    #[default]
    Log,
    Dog,
}

impl fmt::Display for BlobMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlobMethod::Log => write!(f, "log"),
            BlobMethod::Dog => write!(f, "dog"),
        }
    }
}

impl FromStr for BlobMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "log" => Ok(BlobMethod::Log),
            "dog" => Ok(BlobMethod::Dog),
            other => Err(Error::invalid_parameter(format!(
                "unknown blob method '{other}', expected 'log' or 'dog'"
            ))),
        }
    }
}

/// A point in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// A detected, measured tubercle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tubercle {
    /// Positive, unique within a result, in detection order.
    pub id: u32,
    pub centroid: Point,
    pub radius_px: f64,
    pub diameter_px: f64,
    pub diameter_um: f64,
    pub circularity: f64,
}

/// Fully resolved detector settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorParams {
    pub method: BlobMethod,
    pub min_sigma: f64,
    pub max_sigma: f64,
    pub num_sigma: usize,
    pub threshold: f64,
    pub min_diameter_um: f64,
    pub max_diameter_um: f64,
    pub edge_margin_px: f64,
    pub min_circularity: f64,
}

impl DetectorParams {
    /// Resolve a profile against a calibration. Sigma bounds come from the
    /// profile when set, otherwise from its diameter range.
    pub fn from_profile(
        profile: &DetectionProfile,
        calibration: &Calibration,
        method: BlobMethod,
        num_sigma: usize,
    ) -> Self {
        let sigma_for = |um: f64| diameter_px_to_sigma(calibration.um_to_px(um)).max(MIN_SIGMA_PX);
        let min_sigma = profile
            .min_sigma
            .unwrap_or_else(|| sigma_for(profile.min_diameter_um));
        let max_sigma = profile
            .max_sigma
            .unwrap_or_else(|| sigma_for(profile.max_diameter_um))
            .max(min_sigma);

        Self {
            method,
            min_sigma,
            max_sigma,
            num_sigma: num_sigma.max(1),
            threshold: profile.threshold,
            min_diameter_um: profile.min_diameter_um,
            max_diameter_um: profile.max_diameter_um,
            edge_margin_px: profile.edge_margin_px,
            min_circularity: profile.min_circularity,
        }
    }
}

/// Candidate counts after each detection step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionStats {
    pub candidates: usize,
    pub after_size_filter: usize,
    pub after_edge_filter: usize,
    pub after_circularity_filter: usize,
}

/// Tubercles plus the counts that produced them.
#[derive(Debug, Clone, Default)]
pub struct Detection {
    pub tubercles: Vec<Tubercle>,
    pub stats: DetectionStats,
}

/// Run the scale-space detector selected by `params.method`.
pub fn detect_blobs(image: &Array2<f32>, params: &DetectorParams) -> Vec<BlobCandidate> {
    match params.method {
        BlobMethod::Log => blob_log(
            image,
            params.min_sigma,
            params.max_sigma,
            params.num_sigma,
            params.threshold,
        ),
        BlobMethod::Dog => blob_dog(image, params.min_sigma, params.max_sigma, params.threshold),
    }
}

/// Detect, filter and measure tubercles, keeping per-step counts.
pub fn detect_with_stats(
    image: &Array2<f32>,
    calibration: &Calibration,
    params: &DetectorParams,
) -> Detection {
    let candidates = detect_blobs(image, params);
    let sized = filter_by_size(
        &candidates,
        calibration,
        params.min_diameter_um,
        params.max_diameter_um,
    );
    let inside = filter_by_edge_distance(&sized, image.dim(), params.edge_margin_px);

    let mut tubercles = Vec::with_capacity(inside.len());
    for blob in &inside {
        let diameter_px = sigma_to_diameter_px(blob.sigma);
        let radius_px = diameter_px / 2.0;
        let circularity = estimate_circularity(image, blob.x, blob.y, radius_px);
        if circularity < params.min_circularity {
            continue;
        }
        tubercles.push(Tubercle {
            id: tubercles.len() as u32 + 1,
            centroid: Point {
                x: blob.x,
                y: blob.y,
            },
            radius_px,
            diameter_px,
            diameter_um: calibration.px_to_um(diameter_px),
            circularity,
        });
    }

    let stats = DetectionStats {
        candidates: candidates.len(),
        after_size_filter: sized.len(),
        after_edge_filter: inside.len(),
        after_circularity_filter: tubercles.len(),
    };
    tracing::debug!(
        method = %params.method,
        min_sigma = params.min_sigma,
        max_sigma = params.max_sigma,
        candidates = stats.candidates,
        after_size = stats.after_size_filter,
        after_edge = stats.after_edge_filter,
        tubercles = stats.after_circularity_filter,
        "detection finished"
    );

    Detection { tubercles, stats }
}

/// Detect, filter and measure tubercles.
pub fn detect_tubercles(
    image: &Array2<f32>,
    calibration: &Calibration,
    params: &DetectorParams,
) -> Vec<Tubercle> {
    detect_with_stats(image, calibration, params).tubercles
}
