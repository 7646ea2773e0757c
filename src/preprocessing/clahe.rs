//! Contrast limited adaptive histogram equalization on `[0, 1]` images.

use ndarray::Array2;

pub const NBINS: usize = 256;

#[derive(Debug, Clone, Copy)]
struct Tile {
    start: usize,
    end: usize,
}

impl Tile {
    fn centre(&self) -> f64 {
        (self.start + self.end - 1) as f64 * 0.5
    }
}

fn split_axis(len: usize, tile: usize) -> Vec<Tile> {
    let tile = tile.max(1);
    (0..len.div_ceil(tile))
        .map(|i| Tile {
            start: i * tile,
            end: ((i + 1) * tile).min(len),
        })
        .collect()
}

#[inline]
fn bin_of(value: f32) -> usize {
    ((value.clamp(0.0, 1.0) * (NBINS - 1) as f32).round() as usize).min(NBINS - 1)
}

/// Clip the histogram at `limit` and spread the excess evenly over all bins.
fn clip_histogram(hist: &mut [f64], limit: f64) {
    let excess: f64 = hist.iter().map(|&c| (c - limit).max(0.0)).sum();
    if excess <= 0.0 {
        return;
    }
    let share = excess / hist.len() as f64;
    for c in hist.iter_mut() {
        *c = c.min(limit) + share;
    }
}

fn tile_mapping(image: &Array2<f32>, rows: Tile, cols: Tile, clip_limit: f64) -> Vec<f32> {
    let mut hist = vec![0.0f64; NBINS];
    for y in rows.start..rows.end {
        for x in cols.start..cols.end {
            hist[bin_of(image[[y, x]])] += 1.0;
        }
    }
    let area = ((rows.end - rows.start) * (cols.end - cols.start)) as f64;
    let limit = (clip_limit * area).max(1.0);
    clip_histogram(&mut hist, limit);

    let mut cdf = 0.0;
    hist.iter()
        .map(|&c| {
            cdf += c;
            (cdf / area).min(1.0) as f32
        })
        .collect()
}

/// Locate the two tile centres bracketing `pos` and the weight of the upper.
fn bracket(tiles: &[Tile], pos: usize) -> (usize, usize, f32) {
    let p = pos as f64;
    if tiles.len() == 1 || p <= tiles[0].centre() {
        return (0, 0, 0.0);
    }
    let last = tiles.len() - 1;
    if p >= tiles[last].centre() {
        return (last, last, 0.0);
    }
    let mut lo = 0;
    while lo + 1 < last && tiles[lo + 1].centre() <= p {
        lo += 1;
    }
    let c0 = tiles[lo].centre();
    let c1 = tiles[lo + 1].centre();
    (lo, lo + 1, ((p - c0) / (c1 - c0)) as f32)
}

/// Equalize `image` tile by tile with clip limit `clip_limit` (fraction of
/// the tile area) and tiles of `kernel_size` pixels, blending neighbouring
/// tile mappings bilinearly.
pub fn equalize_adapthist(image: &Array2<f32>, clip_limit: f64, kernel_size: usize) -> Array2<f32> {
    let (h, w) = image.dim();
    if h == 0 || w == 0 {
        return image.clone();
    }
    let row_tiles = split_axis(h, kernel_size);
    let col_tiles = split_axis(w, kernel_size);

    let maps: Vec<Vec<Vec<f32>>> = row_tiles
        .iter()
        .map(|&rt| {
            col_tiles
                .iter()
                .map(|&ct| tile_mapping(image, rt, ct, clip_limit))
                .collect()
        })
        .collect();

    let col_brackets: Vec<_> = (0..w).map(|x| bracket(&col_tiles, x)).collect();
    let mut out = Array2::<f32>::zeros((h, w));
    for y in 0..h {
        let (r0, r1, wy) = bracket(&row_tiles, y);
        for x in 0..w {
            let (c0, c1, wx) = col_brackets[x];
            let b = bin_of(image[[y, x]]);
            let top = maps[r0][c0][b] * (1.0 - wx) + maps[r0][c1][b] * wx;
            let bottom = maps[r1][c0][b] * (1.0 - wx) + maps[r1][c1][b] * wx;
            out[[y, x]] = (top * (1.0 - wy) + bottom * wy).clamp(0.0, 1.0);
        }
    }
    out
}
