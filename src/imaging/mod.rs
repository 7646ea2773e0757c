//! Floating point image containers and the numeric kernels the pipeline
//! stages are built from.

pub mod filters;
pub mod morphology;

pub use filters::*;
pub use morphology::*;

use image::{DynamicImage, ImageBuffer, Luma};
use ndarray::{Array2, Array3};

/// Single channel float image as used by `imageproc`.
pub type GrayF32 = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Luminosity weights for RGB to gray reduction.
pub const LUMA_WEIGHTS: [f32; 3] = [0.2125, 0.7154, 0.0721];

/// Decoded pixel data with intensities in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub enum RawImage {
    /// `(height, width)`
    Gray(Array2<f32>),
    /// `(height, width, 3)`
    Rgb(Array3<f32>),
}

impl RawImage {
    /// `(height, width)` of the image.
    pub fn shape(&self) -> (usize, usize) {
        match self {
            RawImage::Gray(a) => a.dim(),
            RawImage::Rgb(a) => {
                let (h, w, _) = a.dim();
                (h, w)
            }
        }
    }

    pub fn channels(&self) -> usize {
        match self {
            RawImage::Gray(_) => 1,
            RawImage::Rgb(_) => 3,
        }
    }

    /// Single channel view; RGB is reduced with [`LUMA_WEIGHTS`].
    pub fn to_gray(&self) -> Array2<f32> {
        match self {
            RawImage::Gray(a) => a.clone(),
            RawImage::Rgb(a) => {
                let (h, w, _) = a.dim();
                Array2::from_shape_fn((h, w), |(y, x)| {
                    LUMA_WEIGHTS[0] * a[[y, x, 0]]
                        + LUMA_WEIGHTS[1] * a[[y, x, 1]]
                        + LUMA_WEIGHTS[2] * a[[y, x, 2]]
                })
            }
        }
    }

    /// Convert a decoded image, keeping colour when the source has it.
    pub fn from_dynamic(img: &DynamicImage) -> Self {
        let (w, h) = (img.width() as usize, img.height() as usize);
        if img.color().has_color() {
            let rgb = img.to_rgb32f();
            let data = rgb.into_raw();
            let array = Array3::from_shape_vec((h, w, 3), data)
                .unwrap_or_else(|_| Array3::zeros((h, w, 3)));
            RawImage::Rgb(array)
        } else {
            let gray = img.to_luma32f();
            let data = gray.into_raw();
            let array =
                Array2::from_shape_vec((h, w), data).unwrap_or_else(|_| Array2::zeros((h, w)));
            RawImage::Gray(array)
        }
    }
}

impl From<Array2<f32>> for RawImage {
    fn from(a: Array2<f32>) -> Self {
        RawImage::Gray(a)
    }
}

impl From<Array3<f32>> for RawImage {
    fn from(a: Array3<f32>) -> Self {
        RawImage::Rgb(a)
    }
}

/// Convert an 8-bit gray image to a `[0, 1]` float array.
pub fn gray_to_array(img: &image::GrayImage) -> Array2<f32> {
    let (w, h) = img.dimensions();
    Array2::from_shape_fn((h as usize, w as usize), |(y, x)| {
        img.get_pixel(x as u32, y as u32)[0] as f32 / 255.0
    })
}

/// Copy an array into an `imageproc` float image.
pub fn array_to_luma32(array: &Array2<f32>) -> GrayF32 {
    let (h, w) = array.dim();
    ImageBuffer::from_fn(w as u32, h as u32, |x, y| Luma([array[[y as usize, x as usize]]]))
}

/// Copy an `imageproc` float image back into an array.
pub fn luma32_to_array(img: &GrayF32) -> Array2<f32> {
    let (w, h) = img.dimensions();
    Array2::from_shape_fn((h as usize, w as usize), |(y, x)| {
        img.get_pixel(x as u32, y as u32)[0]
    })
}

/// Convert a `[0, 1]` float array to an 8-bit gray image (values clamped).
pub fn array_to_gray(array: &Array2<f32>) -> image::GrayImage {
    let (h, w) = array.dim();
    image::GrayImage::from_fn(w as u32, h as u32, |x, y| {
        let v = array[[y as usize, x as usize]].clamp(0.0, 1.0);
        image::Luma([(v * 255.0).round() as u8])
    })
}
