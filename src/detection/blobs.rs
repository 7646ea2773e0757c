//! Scale-space blob detection (Laplacian of Gaussian and Difference of
//! Gaussians) on `[0, 1]` images.
//!
//! Responses are scale normalised so a bright disk of radius `r` and unit
//! contrast peaks near `0.74` at `sigma = r / sqrt(2)`, independent of `r`.

use crate::imaging::{gaussian_blur, laplacian};
use ndarray::Array2;
use std::f64::consts::PI;

/// A scale-space maximum: `(y, x)` in pixels, `sigma` in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlobCandidate {
    pub y: f64,
    pub x: f64,
    pub sigma: f64,
    pub response: f64,
}

impl BlobCandidate {
    pub fn new(y: f64, x: f64, sigma: f64) -> Self {
        Self {
            y,
            x,
            sigma,
            response: 0.0,
        }
    }

    /// Radius of the blob, `sqrt(2) * sigma`.
    pub fn radius(&self) -> f64 {
        std::f64::consts::SQRT_2 * self.sigma
    }
}

/// Ratio between consecutive DoG scales.
pub const DOG_SIGMA_RATIO: f64 = 1.6;

/// Maximum fraction of the smaller blob's area two kept blobs may share.
pub const DEFAULT_OVERLAP: f64 = 0.5;

fn linspace(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    if n <= 1 || hi <= lo {
        return vec![lo];
    }
    let step = (hi - lo) / (n - 1) as f64;
    (0..n).map(|i| lo + step * i as f64).collect()
}

fn ordered_bounds(min_sigma: f64, max_sigma: f64) -> Option<(f64, f64)> {
    if !min_sigma.is_finite() || !max_sigma.is_finite() {
        return None;
    }
    let lo = min_sigma.min(max_sigma);
    let hi = min_sigma.max(max_sigma);
    (lo > 0.0).then_some((lo, hi))
}

/// Laplacian of Gaussian detector over `num_sigma` linearly spaced scales.
pub fn blob_log(
    image: &Array2<f32>,
    min_sigma: f64,
    max_sigma: f64,
    num_sigma: usize,
    threshold: f64,
) -> Vec<BlobCandidate> {
    let Some((lo, hi)) = ordered_bounds(min_sigma, max_sigma) else {
        return Vec::new();
    };
    if image.is_empty() {
        return Vec::new();
    }
    let sigmas = linspace(lo, hi, num_sigma);
    let stack: Vec<Array2<f32>> = sigmas
        .iter()
        .map(|&s| {
            let scale = (s * s) as f32;
            laplacian(&gaussian_blur(image, s)).mapv(|v| -v * scale)
        })
        .collect();
    let blobs = scale_space_peaks(&stack, &sigmas, threshold);
    prune_blobs(blobs, DEFAULT_OVERLAP)
}

/// Difference of Gaussians detector over geometrically spaced scales.
pub fn blob_dog(
    image: &Array2<f32>,
    min_sigma: f64,
    max_sigma: f64,
    threshold: f64,
) -> Vec<BlobCandidate> {
    let Some((lo, hi)) = ordered_bounds(min_sigma, max_sigma) else {
        return Vec::new();
    };
    if image.is_empty() {
        return Vec::new();
    }
    let k = ((hi / lo).ln() / DOG_SIGMA_RATIO.ln()).floor().max(0.0) as i32 + 1;
    let gauss_sigmas: Vec<f64> = (0..=k).map(|i| lo * DOG_SIGMA_RATIO.powi(i)).collect();
    let blurred: Vec<Array2<f32>> = gauss_sigmas.iter().map(|&s| gaussian_blur(image, s)).collect();

    let norm = (1.0 / (DOG_SIGMA_RATIO - 1.0)) as f32;
    let stack: Vec<Array2<f32>> = blurred
        .windows(2)
        .map(|pair| (&pair[0] - &pair[1]).mapv(|v| v * norm))
        .collect();
    // Each difference approximates the normalised LoG between its two scales.
    let sigmas: Vec<f64> = gauss_sigmas
        .windows(2)
        .map(|pair| (pair[0] * pair[1]).sqrt())
        .collect();

    let blobs = scale_space_peaks(&stack, &sigmas, threshold);
    prune_blobs(blobs, DEFAULT_OVERLAP)
}

/// Offset of a parabola's vertex through `(-1, l)`, `(0, c)`, `(1, r)`.
#[inline]
fn parabolic_offset(l: f64, c: f64, r: f64) -> f64 {
    let denom = l - 2.0 * c + r;
    if denom < 0.0 {
        (0.5 * (l - r) / denom).clamp(-0.5, 0.5)
    } else {
        0.0
    }
}

fn interpolate_sigma(sigmas: &[f64], index: usize, offset: f64) -> f64 {
    if offset > 0.0 && index + 1 < sigmas.len() {
        sigmas[index] + offset * (sigmas[index + 1] - sigmas[index])
    } else if offset < 0.0 && index > 0 {
        sigmas[index] + offset * (sigmas[index] - sigmas[index - 1])
    } else {
        sigmas[index]
    }
}

/// Local maxima of the response stack over a 3x3x3 neighbourhood that exceed
/// `threshold` (and zero), refined to sub-pixel position and fractional
/// scale.
fn scale_space_peaks(stack: &[Array2<f32>], sigmas: &[f64], threshold: f64) -> Vec<BlobCandidate> {
    let Some(first) = stack.first() else {
        return Vec::new();
    };
    let (h, w) = first.dim();
    let (lo, hi) = stack
        .iter()
        .flat_map(|layer| layer.iter())
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if hi <= lo {
        return Vec::new();
    }
    let floor = threshold.max(0.0) as f32;

    let mut blobs = Vec::new();
    for (s, layer) in stack.iter().enumerate() {
        for y in 0..h {
            for x in 0..w {
                let v = layer[[y, x]];
                if v <= floor {
                    continue;
                }
                if !is_local_max(stack, s, y, x, v) {
                    continue;
                }

                let at = |yy: usize, xx: usize| layer[[yy, xx]] as f64;
                let dx = if x > 0 && x + 1 < w {
                    parabolic_offset(at(y, x - 1), v as f64, at(y, x + 1))
                } else {
                    0.0
                };
                let dy = if y > 0 && y + 1 < h {
                    parabolic_offset(at(y - 1, x), v as f64, at(y + 1, x))
                } else {
                    0.0
                };
                let ds = if s > 0 && s + 1 < stack.len() {
                    parabolic_offset(
                        stack[s - 1][[y, x]] as f64,
                        v as f64,
                        stack[s + 1][[y, x]] as f64,
                    )
                } else {
                    0.0
                };

                blobs.push(BlobCandidate {
                    y: y as f64 + dy,
                    x: x as f64 + dx,
                    sigma: interpolate_sigma(sigmas, s, ds),
                    response: v as f64,
                });
            }
        }
    }
    blobs
}

fn is_local_max(stack: &[Array2<f32>], s: usize, y: usize, x: usize, v: f32) -> bool {
    let (h, w) = stack[s].dim();
    let s_range = s.saturating_sub(1)..=(s + 1).min(stack.len() - 1);
    for layer in &stack[s_range] {
        for yy in y.saturating_sub(1)..=(y + 1).min(h - 1) {
            for xx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                if layer[[yy, xx]] > v {
                    return false;
                }
            }
        }
    }
    true
}

/// Fraction of the smaller blob's area covered by the intersection of two
/// blobs, each a disk of radius `sqrt(2) * sigma`.
pub fn blob_overlap(a: &BlobCandidate, b: &BlobCandidate) -> f64 {
    let r1 = a.radius();
    let r2 = b.radius();
    let d = ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt();
    let small = r1.min(r2);
    if small <= 0.0 {
        return 0.0;
    }
    if d >= r1 + r2 {
        return 0.0;
    }
    if d <= (r1 - r2).abs() {
        return 1.0;
    }
    let a1 = ((d * d + r1 * r1 - r2 * r2) / (2.0 * d * r1)).clamp(-1.0, 1.0).acos();
    let a2 = ((d * d + r2 * r2 - r1 * r1) / (2.0 * d * r2)).clamp(-1.0, 1.0).acos();
    let k = (-d + r1 + r2) * (d + r1 - r2) * (d - r1 + r2) * (d + r1 + r2);
    let lens = r1 * r1 * a1 + r2 * r2 * a2 - 0.5 * k.max(0.0).sqrt();
    (lens / (PI * small * small)).clamp(0.0, 1.0)
}

/// Greedy suppression: strongest blobs first, dropping any blob that overlaps
/// an already kept one by more than `overlap`. Survivors are returned in
/// raster order (by `y`, then `x`).
pub fn prune_blobs(mut blobs: Vec<BlobCandidate>, overlap: f64) -> Vec<BlobCandidate> {
    blobs.sort_by(|a, b| b.response.total_cmp(&a.response));
    let mut kept: Vec<BlobCandidate> = Vec::with_capacity(blobs.len());
    for blob in blobs {
        if kept.iter().all(|k| blob_overlap(k, &blob) <= overlap) {
            kept.push(blob);
        }
    }
    kept.sort_by(|a, b| a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x)));
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disk_image(h: usize, w: usize, centres: &[(f64, f64)], radius: f64) -> Array2<f32> {
        Array2::from_shape_fn((h, w), |(y, x)| {
            let inside = centres.iter().any(|&(cy, cx)| {
                (y as f64 - cy).powi(2) + (x as f64 - cx).powi(2) <= radius * radius
            });
            if inside {
                1.0
            } else {
                0.0
            }
        })
    }

    #[test]
    fn log_finds_single_disk_with_matching_scale() {
        let image = disk_image(64, 64, &[(32.0, 30.0)], 8.0);
        let blobs = blob_log(&image, 3.0, 9.0, 13, 0.1);
        assert_eq!(blobs.len(), 1);
        let blob = blobs[0];
        assert!((blob.x - 30.0).abs() < 1.0);
        assert!((blob.y - 32.0).abs() < 1.0);
        let expected_sigma = 8.0 / std::f64::consts::SQRT_2;
        assert!((blob.sigma - expected_sigma).abs() < 0.8, "sigma {}", blob.sigma);
    }

    #[test]
    fn dog_finds_separated_disks() {
        let centres = [(20.0, 20.0), (20.0, 60.0), (60.0, 40.0)];
        let image = disk_image(80, 80, &centres, 6.0);
        let blobs = blob_dog(&image, 2.0, 8.0, 0.1);
        assert!(blobs.len() >= 2 && blobs.len() <= 6, "found {}", blobs.len());
    }

    #[test]
    fn blank_image_has_no_blobs() {
        let image = Array2::<f32>::zeros((40, 40));
        assert!(blob_log(&image, 1.0, 5.0, 5, 0.0).is_empty());
        assert!(blob_log(&image, 1.0, 5.0, 5, -1.0).is_empty());
        assert!(blob_dog(&image, 1.0, 5.0, 0.0).is_empty());
    }

    #[test]
    fn invalid_sigma_bounds_yield_nothing() {
        let image = disk_image(20, 20, &[(10.0, 10.0)], 3.0);
        assert!(blob_log(&image, 0.0, 5.0, 5, 0.1).is_empty());
        assert!(blob_dog(&image, f64::NAN, 5.0, 0.1).is_empty());
        assert!(blob_log(&image, 1.0, f64::NAN, 5, 0.1).is_empty());
        assert!(blob_dog(&image, 1.0, f64::INFINITY, 0.1).is_empty());
    }

    #[test]
    fn overlap_of_identical_blobs_is_total() {
        let a = BlobCandidate::new(10.0, 10.0, 2.0);
        assert_eq!(blob_overlap(&a, &a), 1.0);
        let far = BlobCandidate::new(10.0, 40.0, 2.0);
        assert_eq!(blob_overlap(&a, &far), 0.0);
    }

    #[test]
    fn prune_keeps_stronger_of_overlapping_pair() {
        let mut weak = BlobCandidate::new(10.0, 10.0, 3.0);
        weak.response = 0.2;
        let mut strong = BlobCandidate::new(10.5, 10.0, 3.2);
        strong.response = 0.6;
        let kept = prune_blobs(vec![weak, strong], DEFAULT_OVERLAP);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].response, 0.6);
    }

    #[test]
    fn parabolic_offset_finds_vertex() {
        // f(t) = -(t - 0.25)^2
        let f = |t: f64| -(t - 0.25) * (t - 0.25);
        let off = parabolic_offset(f(-1.0), f(0.0), f(1.0));
        assert!((off - 0.25).abs() < 1e-12);
    }
}
