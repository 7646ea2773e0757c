#![allow(dead_code)]

use image::{GrayImage, Luma};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use std::path::Path;

/// Ground truth of a rendered lattice.
pub struct Lattice {
    pub image: GrayImage,
    pub centres: Vec<(f64, f64)>,
    pub radius_px: f64,
    pub um_per_px: f64,
}

impl Lattice {
    pub fn diameter_um(&self) -> f64 {
        2.0 * self.radius_px * self.um_per_px
    }

    pub fn save(&self, path: &Path) {
        self.image.save(path).unwrap();
    }
}

/// Anti-aliased disk coverage of a pixel at distance `d` from a centre.
fn coverage(d: f64, radius: f64) -> f64 {
    (radius + 0.5 - d).clamp(0.0, 1.0)
}

/// Hexagonal lattice of bright tubercles on a dim, slightly uneven
/// background, with seeded Gaussian noise.
///
/// `diameter_um` and `spacing_um` (centre to centre) are converted with
/// `um_per_px`. Every disk lies fully inside the image.
pub fn hex_lattice(
    width: u32,
    height: u32,
    um_per_px: f64,
    diameter_um: f64,
    spacing_um: f64,
    noise_std: f64,
    seed: u64,
) -> Lattice {
    let radius = diameter_um / um_per_px / 2.0;
    let pitch = spacing_um / um_per_px;
    let row_pitch = pitch * 3f64.sqrt() / 2.0;
    let margin = radius + 12.0;

    let mut centres = Vec::new();
    let mut row = 0;
    loop {
        let y = margin + row as f64 * row_pitch;
        if y > height as f64 - margin {
            break;
        }
        let offset = if row % 2 == 1 { pitch / 2.0 } else { 0.0 };
        let mut x = margin + offset;
        while x <= width as f64 - margin {
            centres.push((x, y));
            x += pitch;
        }
        row += 1;
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, noise_std.max(1e-12)).unwrap();

    let image = GrayImage::from_fn(width, height, |px, py| {
        let (fx, fy) = (px as f64, py as f64);
        let background = 0.2 + 0.05 * fx / width as f64;
        let cover = centres
            .iter()
            .filter(|(cx, cy)| (cx - fx).abs() < radius + 2.0 && (cy - fy).abs() < radius + 2.0)
            .map(|(cx, cy)| coverage(((cx - fx).powi(2) + (cy - fy).powi(2)).sqrt(), radius))
            .fold(0.0f64, f64::max);
        let value = background + 0.6 * cover + noise.sample(&mut rng);
        Luma([(value.clamp(0.0, 1.0) * 255.0).round() as u8])
    });

    Lattice {
        image,
        centres,
        radius_px: radius,
        um_per_px,
    }
}

/// Nine separated disks on a 3x3 grid.
pub fn nine_disks(size: u32, radius: f64) -> (GrayImage, Vec<(f64, f64)>) {
    let step = size as f64 / 4.0;
    let centres: Vec<(f64, f64)> = (1..=3)
        .flat_map(|r| (1..=3).map(move |c| (c as f64 * step, r as f64 * step)))
        .collect();
    let image = GrayImage::from_fn(size, size, |px, py| {
        let cover = centres
            .iter()
            .map(|(cx, cy)| {
                coverage(
                    ((cx - px as f64).powi(2) + (cy - py as f64).powi(2)).sqrt(),
                    radius,
                )
            })
            .fold(0.0f64, f64::max);
        Luma([(40.0 + 180.0 * cover).round() as u8])
    });
    (image, centres)
}
