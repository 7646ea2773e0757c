//! Intensity preprocessing: grayscale → CLAHE → blur → optional opening →
//! min-max normalization.
//!
//! Every step is a pure function of its input. [`preprocess`] chains them and
//! keeps a copy of each intermediate for diagnostics; nothing downstream
//! reads those copies.

pub mod clahe;

pub use clahe::equalize_adapthist;

use crate::imaging::{gaussian_blur, opening, RawImage};
use crate::profiles::DetectionProfile;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Parameters of the preprocessing chain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreprocessParams {
    pub clahe_clip_limit: f64,
    pub clahe_kernel_size: usize,
    pub blur_sigma: f64,
    pub opening_radius: Option<usize>,
}

impl Default for PreprocessParams {
    fn default() -> Self {
        Self::from(&DetectionProfile::default())
    }
}

impl From<&DetectionProfile> for PreprocessParams {
    fn from(profile: &DetectionProfile) -> Self {
        Self {
            clahe_clip_limit: profile.clahe_clip_limit,
            clahe_kernel_size: profile.clahe_kernel_size,
            blur_sigma: profile.blur_sigma,
            opening_radius: profile.opening_radius,
        }
    }
}

/// Named copies of the image after each preprocessing step. The `original`
/// entry keeps the input as decoded, including all RGB channels.
#[derive(Debug, Clone, Default)]
pub struct Intermediates {
    entries: Vec<(&'static str, RawImage)>,
}

impl Intermediates {
    fn push(&mut self, name: &'static str, image: &Array2<f32>) {
        self.entries.push((name, RawImage::Gray(image.clone())));
    }

    pub fn raw(&self, name: &str) -> Option<&RawImage> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, image)| image)
    }

    /// Single-channel entry; `None` when missing or stored as RGB.
    pub fn get(&self, name: &str) -> Option<&Array2<f32>> {
        match self.raw(name)? {
            RawImage::Gray(image) => Some(image),
            RawImage::Rgb(_) => None,
        }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|(n, _)| *n).collect()
    }
}

/// Result of [`preprocess`].
#[derive(Debug, Clone)]
pub struct Preprocessed {
    pub image: Array2<f32>,
    pub intermediates: Intermediates,
}

/// Reduce to a single channel; gray input passes through unchanged.
pub fn to_grayscale(image: &RawImage) -> Array2<f32> {
    image.to_gray()
}

/// Clip-limited adaptive histogram equalization.
pub fn enhance_contrast(image: &Array2<f32>, clip_limit: f64, kernel_size: usize) -> Array2<f32> {
    equalize_adapthist(image, clip_limit, kernel_size)
}

/// Gaussian smoothing.
pub fn blur(image: &Array2<f32>, sigma: f64) -> Array2<f32> {
    gaussian_blur(image, sigma)
}

/// Morphological opening with a disk of `radius` pixels.
pub fn open(image: &Array2<f32>, radius: usize) -> Array2<f32> {
    opening(image, radius)
}

/// Linearly rescale to `[0, 1]`. A constant image maps to all zeros.
pub fn normalize(image: &Array2<f32>) -> Array2<f32> {
    let (min, max) = image
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let range = max - min;
    if !range.is_finite() || range <= f32::EPSILON {
        return Array2::zeros(image.dim());
    }
    image.mapv(|v| (v - min) / range)
}

/// Run the full chain and record every intermediate.
pub fn preprocess(image: &RawImage, params: &PreprocessParams) -> Preprocessed {
    let mut intermediates = Intermediates::default();

    intermediates.entries.push(("original", image.clone()));

    let gray = to_grayscale(image);
    intermediates.push("grayscale", &gray);

    let enhanced = enhance_contrast(&gray, params.clahe_clip_limit, params.clahe_kernel_size);
    intermediates.push("clahe", &enhanced);

    let blurred = blur(&enhanced, params.blur_sigma);
    intermediates.push("blurred", &blurred);

    let filtered = match params.opening_radius {
        Some(radius) if radius > 0 => {
            let opened = open(&blurred, radius);
            intermediates.push("opened", &opened);
            opened
        }
        _ => blurred,
    };

    let image = normalize(&filtered);
    intermediates.push("final", &image);

    tracing::debug!(
        steps = intermediates.entries.len(),
        blur_sigma = params.blur_sigma,
        opening_radius = ?params.opening_radius,
        "preprocessing finished"
    );

    Preprocessed {
        image,
        intermediates,
    }
}
