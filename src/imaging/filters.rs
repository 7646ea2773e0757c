use super::{array_to_luma32, luma32_to_array, GrayF32};
use imageproc::filter::{filter3x3, separable_filter_equal};
use ndarray::Array2;

/// Gaussian tails beyond this many standard deviations are dropped.
const TRUNCATE_SIGMAS: f64 = 4.0;

const K_LAPLACIAN: [f32; 9] = [0.0, 1.0, 0.0, 1.0, -4.0, 1.0, 0.0, 1.0, 0.0];
const K_SOBEL_X: [f32; 9] = [-1.0, 0.0, 1.0, -2.0, 0.0, 2.0, -1.0, 0.0, 1.0];
const K_SOBEL_Y: [f32; 9] = [-1.0, -2.0, -1.0, 0.0, 0.0, 0.0, 1.0, 2.0, 1.0];

/// Sobel response to a unit slope.
const SOBEL_GAIN: f64 = 8.0;

/// Normalised 1D Gaussian taps for `sigma`, truncated at 4σ.
pub fn gaussian_kernel(sigma: f64) -> Vec<f32> {
    if sigma <= 0.0 {
        return vec![1.0];
    }
    let radius = (TRUNCATE_SIGMAS * sigma).ceil().max(1.0) as i64;
    let denom = 2.0 * sigma * sigma;
    let taps: Vec<f64> = (-radius..=radius)
        .map(|i| (-(i * i) as f64 / denom).exp())
        .collect();
    let sum: f64 = taps.iter().sum();
    taps.into_iter().map(|t| (t / sum) as f32).collect()
}

/// Separable Gaussian blur with replicated borders. A non-positive sigma
/// returns a copy.
///
/// Taps come from [`gaussian_kernel`]; `gaussian_blur_f32` cuts the kernel
/// at 2σ, which shifts the scale of normalised LoG peaks.
pub fn gaussian_blur(image: &Array2<f32>, sigma: f64) -> Array2<f32> {
    if sigma <= 0.0 || image.is_empty() {
        return image.clone();
    }
    let taps = gaussian_kernel(sigma);
    let blurred: GrayF32 = separable_filter_equal(&array_to_luma32(image), &taps);
    luma32_to_array(&blurred)
}

/// Five-point discrete Laplacian with replicated borders.
pub fn laplacian(image: &Array2<f32>) -> Array2<f32> {
    if image.is_empty() {
        return image.clone();
    }
    let lap: GrayF32 = filter3x3(&array_to_luma32(image), &K_LAPLACIAN);
    luma32_to_array(&lap)
}

/// Mean Sobel gradient magnitude over the interior, in intensity per pixel.
pub fn mean_gradient_magnitude(image: &Array2<f32>) -> f64 {
    let (h, w) = image.dim();
    if h < 3 || w < 3 {
        return 0.0;
    }
    let img = array_to_luma32(image);
    let gx: GrayF32 = filter3x3(&img, &K_SOBEL_X);
    let gy: GrayF32 = filter3x3(&img, &K_SOBEL_Y);

    let mut total = 0.0f64;
    for y in 1..h as u32 - 1 {
        for x in 1..w as u32 - 1 {
            let dx = gx.get_pixel(x, y)[0] as f64;
            let dy = gy.get_pixel(x, y)[0] as f64;
            total += dx.hypot(dy);
        }
    }
    total / SOBEL_GAIN / ((h - 2) * (w - 2)) as f64
}
