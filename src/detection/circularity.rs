//! Shape regularity of the bright region around a blob centre.

use ndarray::Array2;
use std::collections::VecDeque;
use std::f64::consts::PI;

/// Regions smaller than this many pixels are scored 0.
const MIN_REGION_PIXELS: usize = 3;

/// Circularity in `[0, 1]` of the region around `(cx, cy)`.
///
/// The region is grown 4-connected from the centre over pixels brighter than
/// the midpoint between the centre value and the local background, limited
/// to twice the expected `radius_px`. The score is the minor/major axis ratio
/// from second moments times how well the region fills its moment ellipse.
pub fn estimate_circularity(image: &Array2<f32>, cx: f64, cy: f64, radius_px: f64) -> f64 {
    let (h, w) = image.dim();
    if h == 0 || w == 0 || !(radius_px > 0.0) {
        return 0.0;
    }
    let px = cx.round();
    let py = cy.round();
    if px < 0.0 || py < 0.0 || px >= w as f64 || py >= h as f64 {
        return 0.0;
    }
    let (px, py) = (px as usize, py as usize);

    let reach = 2.0 * radius_px;
    let half = reach.ceil() as usize + 1;
    let x0 = px.saturating_sub(half);
    let y0 = py.saturating_sub(half);
    let x1 = (px + half).min(w - 1);
    let y1 = (py + half).min(h - 1);

    let mut window: Vec<f32> = Vec::with_capacity((x1 - x0 + 1) * (y1 - y0 + 1));
    for y in y0..=y1 {
        for x in x0..=x1 {
            window.push(image[[y, x]]);
        }
    }
    window.sort_by(|a, b| a.total_cmp(b));
    let background = window[window.len() / 10] as f64;
    let peak = image[[py, px]] as f64;
    if peak - background <= 1e-6 {
        return 0.0;
    }
    let level = 0.5 * (peak + background);

    let within = |x: usize, y: usize| {
        let dx = x as f64 - cx;
        let dy = y as f64 - cy;
        dx * dx + dy * dy <= reach * reach
    };

    let mut visited = vec![false; (x1 - x0 + 1) * (y1 - y0 + 1)];
    let stride = x1 - x0 + 1;
    let mut queue = VecDeque::from([(px, py)]);
    visited[(py - y0) * stride + (px - x0)] = true;

    let (mut n, mut sx, mut sy, mut sxx, mut syy, mut sxy) = (0usize, 0.0, 0.0, 0.0, 0.0, 0.0);
    while let Some((x, y)) = queue.pop_front() {
        let (fx, fy) = (x as f64, y as f64);
        n += 1;
        sx += fx;
        sy += fy;
        sxx += fx * fx;
        syy += fy * fy;
        sxy += fx * fy;

        let neighbours = [
            (x.wrapping_sub(1), y),
            (x + 1, y),
            (x, y.wrapping_sub(1)),
            (x, y + 1),
        ];
        for (nx, ny) in neighbours {
            if nx < x0 || nx > x1 || ny < y0 || ny > y1 {
                continue;
            }
            let idx = (ny - y0) * stride + (nx - x0);
            if visited[idx] {
                continue;
            }
            visited[idx] = true;
            if image[[ny, nx]] as f64 >= level && within(nx, ny) {
                queue.push_back((nx, ny));
            }
        }
    }

    if n < MIN_REGION_PIXELS {
        return 0.0;
    }
    let nf = n as f64;
    let mx = sx / nf;
    let my = sy / nf;
    // Each pixel is a unit square, which adds 1/12 to each axis variance.
    let cxx = sxx / nf - mx * mx + 1.0 / 12.0;
    let cyy = syy / nf - my * my + 1.0 / 12.0;
    let cxy = sxy / nf - mx * my;

    let trace = cxx + cyy;
    let disc = ((cxx - cyy).powi(2) + 4.0 * cxy * cxy).sqrt();
    let major = 0.5 * (trace + disc);
    let minor = 0.5 * (trace - disc);
    if major <= 0.0 || minor <= 0.0 {
        return 0.0;
    }

    let axis_ratio = (minor / major).sqrt();
    let ellipse_area = 4.0 * PI * (major * minor).sqrt();
    let fill = nf / ellipse_area;
    let fill_score = fill.min(1.0 / fill);

    (axis_ratio * fill_score).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ellipse(h: usize, w: usize, cy: f64, cx: f64, ry: f64, rx: f64) -> Array2<f32> {
        Array2::from_shape_fn((h, w), |(y, x)| {
            let dy = (y as f64 - cy) / ry;
            let dx = (x as f64 - cx) / rx;
            if dx * dx + dy * dy <= 1.0 {
                1.0
            } else {
                0.0
            }
        })
    }

    #[test]
    fn disk_scores_near_one() {
        let image = ellipse(60, 60, 30.0, 30.0, 10.0, 10.0);
        let score = estimate_circularity(&image, 30.0, 30.0, 10.0);
        assert!(score > 0.9, "score {score}");
    }

    #[test]
    fn elongated_region_scores_lower() {
        let disk = ellipse(60, 60, 30.0, 30.0, 8.0, 8.0);
        let flat = ellipse(60, 60, 30.0, 30.0, 3.0, 12.0);
        let round = estimate_circularity(&disk, 30.0, 30.0, 8.0);
        let long = estimate_circularity(&flat, 30.0, 30.0, 8.0);
        assert!(long < round);
        assert!(long < 0.5, "score {long}");
    }

    #[test]
    fn flat_image_scores_zero() {
        let image = Array2::from_elem((20, 20), 0.4f32);
        assert_eq!(estimate_circularity(&image, 10.0, 10.0, 3.0), 0.0);
    }

    #[test]
    fn out_of_bounds_centre_scores_zero() {
        let image = ellipse(20, 20, 10.0, 10.0, 4.0, 4.0);
        assert_eq!(estimate_circularity(&image, -3.0, 10.0, 4.0), 0.0);
        assert_eq!(estimate_circularity(&image, 10.0, 25.0, 4.0), 0.0);
    }
}
