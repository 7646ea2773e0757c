use super::{array_to_gray, gray_to_array};
use imageproc::morphology::{grayscale_open, Mask};
use ndarray::Array2;

/// Erosion followed by dilation with a disk of `radius` pixels. Bright
/// structures that cannot contain the disk are flattened; larger bright
/// regions keep their shape.
///
/// Works at 8-bit depth on the clamped `[0, 1]` range; radii above 255 use
/// a 255 px disk.
pub fn opening(image: &Array2<f32>, radius: usize) -> Array2<f32> {
    if radius == 0 || image.is_empty() {
        return image.clone();
    }
    let mask = Mask::disk(u8::try_from(radius).unwrap_or(u8::MAX));
    gray_to_array(&grayscale_open(&array_to_gray(image), &mask))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opening_removes_single_bright_pixel() {
        let mut image = Array2::<f32>::zeros((15, 15));
        image[[7, 7]] = 1.0;
        let opened = opening(&image, 2);
        assert!(opened.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn opening_keeps_large_square() {
        let image = Array2::from_shape_fn((30, 30), |(y, x)| {
            if (5..25).contains(&y) && (5..25).contains(&x) {
                1.0
            } else {
                0.0
            }
        });
        let opened = opening(&image, 2);
        assert_eq!(opened[[15, 15]], 1.0);
        assert_eq!(opened[[6, 15]], 1.0);
        assert_eq!(opened[[2, 2]], 0.0);
    }

    #[test]
    fn opening_flattens_thin_line() {
        let image = Array2::from_shape_fn((20, 20), |(y, _)| if y == 10 { 0.8 } else { 0.2 });
        let opened = opening(&image, 2);
        assert!(opened.iter().all(|&v| (v - 0.2).abs() < 1.0 / 255.0));
    }

    #[test]
    fn opening_with_zero_radius_is_identity() {
        let image = Array2::from_shape_fn((4, 4), |(y, x)| (x * y) as f32);
        assert_eq!(opening(&image, 0), image);
    }
}
