//! Pixel to micrometer calibration.
//!
//! A [`Calibration`] is a single linear factor (`um_per_pixel`) plus the
//! provenance of that factor. It is built either from a measured scale bar
//! or from the nominal magnification of the microscope.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Width of the reference display that SEM magnification is quoted against.
///
/// A magnification of `M` means a feature of `REFERENCE_DISPLAY_WIDTH_UM / M`
/// micrometers spans the full display width.
pub const REFERENCE_DISPLAY_WIDTH_UM: f64 = 100_000.0;

/// Magnification used by the conventional imaging setup.
pub const CONVENTIONAL_MAGNIFICATION: f64 = 700.0;

/// Image width assumed when the caller does not know it.
pub const DEFAULT_IMAGE_WIDTH_PX: u32 = 1024;

/// Where a calibration factor came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum CalibrationMethod {
    Manual,
    Estimated,
    Magnification(f64),
}

impl fmt::Display for CalibrationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalibrationMethod::Manual => write!(f, "manual"),
            CalibrationMethod::Estimated => write!(f, "estimated"),
            CalibrationMethod::Magnification(m) => write!(f, "magnification:{}x", m),
        }
    }
}

/// Linear mapping between pixel distance and physical distance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    um_per_pixel: f64,
    scale_bar_length_um: f64,
    scale_bar_length_px: f64,
    method: CalibrationMethod,
}

impl Calibration {
    pub fn um_per_pixel(&self) -> f64 {
        self.um_per_pixel
    }

    pub fn scale_bar_length_um(&self) -> f64 {
        self.scale_bar_length_um
    }

    pub fn scale_bar_length_px(&self) -> f64 {
        self.scale_bar_length_px
    }

    pub fn method(&self) -> CalibrationMethod {
        self.method
    }

    #[inline]
    pub fn px_to_um(&self, px: f64) -> f64 {
        px * self.um_per_pixel
    }

    #[inline]
    pub fn um_to_px(&self, um: f64) -> f64 {
        um / self.um_per_pixel
    }
}

fn require_positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(Error::invalid_parameter(format!(
            "{} must be a positive finite number, got {}",
            name, value
        )))
    }
}

/// Calibrate from a scale bar measured on the image.
pub fn calibrate_manual(scale_bar_um: f64, scale_bar_px: f64) -> Result<Calibration> {
    require_positive("scale_bar_um", scale_bar_um)?;
    require_positive("scale_bar_px", scale_bar_px)?;

    Ok(Calibration {
        um_per_pixel: scale_bar_um / scale_bar_px,
        scale_bar_length_um: scale_bar_um,
        scale_bar_length_px: scale_bar_px,
        method: CalibrationMethod::Manual,
    })
}

/// Calibrate from the nominal magnification the image was captured at.
///
/// The implied scale bar spans the full image width.
pub fn calibrate_from_known_magnification(
    magnification: f64,
    image_width_px: u32,
) -> Result<Calibration> {
    require_positive("magnification", magnification)?;
    if image_width_px == 0 {
        return Err(Error::invalid_parameter("image_width_px must be positive"));
    }

    let field_of_view_um = REFERENCE_DISPLAY_WIDTH_UM / magnification;
    let width = image_width_px as f64;

    Ok(Calibration {
        um_per_pixel: field_of_view_um / width,
        scale_bar_length_um: field_of_view_um,
        scale_bar_length_px: width,
        method: CalibrationMethod::Magnification(magnification),
    })
}

/// Heuristic calibration for images captured at the conventional 700x.
pub fn estimate_calibration_700x(image_width_px: Option<u32>) -> Result<Calibration> {
    let width = image_width_px.unwrap_or(DEFAULT_IMAGE_WIDTH_PX);
    let calibration = calibrate_from_known_magnification(CONVENTIONAL_MAGNIFICATION, width)?;
    Ok(Calibration {
        method: CalibrationMethod::Estimated,
        ..calibration
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_calibration_divides_scale_bar() {
        let cal = calibrate_manual(10.0, 50.0).unwrap();
        assert!((cal.um_per_pixel() - 0.2).abs() < 1e-12);
        assert_eq!(cal.method(), CalibrationMethod::Manual);
        assert_eq!(cal.method().to_string(), "manual");
    }

    #[test]
    fn manual_calibration_rejects_non_positive() {
        assert!(matches!(
            calibrate_manual(0.0, 10.0),
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            calibrate_manual(10.0, -1.0),
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            calibrate_manual(f64::NAN, 10.0),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn px_um_round_trip() {
        let cal = calibrate_manual(7.3, 91.0).unwrap();
        for x in [0.5, 1.0, 13.7, 250.0, 4096.0] {
            let back = cal.um_to_px(cal.px_to_um(x));
            assert!((back - x).abs() <= x * 1e-12, "{} -> {}", x, back);
        }
    }

    #[test]
    fn field_of_view_is_width_independent() {
        let narrow = estimate_calibration_700x(Some(512)).unwrap();
        let wide = estimate_calibration_700x(Some(2048)).unwrap();
        let fov_narrow = narrow.px_to_um(512.0);
        let fov_wide = wide.px_to_um(2048.0);
        assert!((fov_narrow - fov_wide).abs() < 1e-9);
        assert!((fov_wide - REFERENCE_DISPLAY_WIDTH_UM / 700.0).abs() < 1e-9);
        assert_eq!(wide.method(), CalibrationMethod::Estimated);
    }

    #[test]
    fn default_width_is_used_when_unknown() {
        let cal = estimate_calibration_700x(None).unwrap();
        assert_eq!(cal.scale_bar_length_px(), DEFAULT_IMAGE_WIDTH_PX as f64);
    }

    #[test]
    fn higher_magnification_means_finer_pixels() {
        let mut previous = f64::INFINITY;
        for magnification in [100.0, 350.0, 700.0, 1000.0, 5000.0] {
            let cal = calibrate_from_known_magnification(magnification, 1024).unwrap();
            assert!(cal.um_per_pixel() < previous);
            previous = cal.um_per_pixel();
        }
    }

    #[test]
    fn magnification_tag_formats_value() {
        let cal = calibrate_from_known_magnification(1500.0, 800).unwrap();
        assert_eq!(cal.method().to_string(), "magnification:1500x");
        assert!(calibrate_from_known_magnification(0.0, 800).is_err());
        assert!(calibrate_from_known_magnification(700.0, 0).is_err());
    }
}
