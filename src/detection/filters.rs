//! Geometric filters over blob candidates. All are total: an empty input
//! gives an empty output.

use super::blobs::BlobCandidate;
use crate::calibration::Calibration;

/// Pixel diameter of a blob of scale `sigma`.
pub fn sigma_to_diameter_px(sigma: f64) -> f64 {
    2.0 * std::f64::consts::SQRT_2 * sigma
}

/// Blob scale matching a pixel diameter; inverse of [`sigma_to_diameter_px`].
pub fn diameter_px_to_sigma(diameter_px: f64) -> f64 {
    diameter_px / (2.0 * std::f64::consts::SQRT_2)
}

/// Keep candidates whose calibrated diameter lies in `[min_um, max_um]`.
pub fn filter_by_size(
    candidates: &[BlobCandidate],
    calibration: &Calibration,
    min_diameter_um: f64,
    max_diameter_um: f64,
) -> Vec<BlobCandidate> {
    candidates
        .iter()
        .filter(|c| {
            let d = calibration.px_to_um(sigma_to_diameter_px(c.sigma));
            d >= min_diameter_um && d <= max_diameter_um
        })
        .copied()
        .collect()
}

/// Drop candidates whose centre lies closer than `min_edge_distance_px` to
/// any of the four borders of an image of `shape = (height, width)`.
pub fn filter_by_edge_distance(
    candidates: &[BlobCandidate],
    shape: (usize, usize),
    min_edge_distance_px: f64,
) -> Vec<BlobCandidate> {
    let (h, w) = shape;
    let max_x = w as f64 - 1.0;
    let max_y = h as f64 - 1.0;
    candidates
        .iter()
        .filter(|c| {
            c.x >= min_edge_distance_px
                && c.y >= min_edge_distance_px
                && max_x - c.x >= min_edge_distance_px
                && max_y - c.y >= min_edge_distance_px
        })
        .copied()
        .collect()
}
