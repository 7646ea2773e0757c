//! Neighbour graph over detected tubercles.
//!
//! Every graph starts from the Delaunay triangulation. Gabriel and relative
//! neighbourhood graphs keep the subset of Delaunay edges that pass their
//! empty-region test. Tubercles left without an edge are then joined to
//! their nearest neighbour, so with two or more tubercles every one has at
//! least one edge.

use crate::calibration::Calibration;
use crate::detection::Tubercle;
use crate::{Error, Result};
use kiddo::{ImmutableKdTree, SquaredEuclidean};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Rule deciding which tubercle pairs become edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphMethod {
    Delaunay,
    #[default]
    Gabriel,
    Rng,
}

impl fmt::Display for GraphMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GraphMethod::Delaunay => "delaunay",
            GraphMethod::Gabriel => "gabriel",
            GraphMethod::Rng => "rng",
        };
        f.write_str(name)
    }
}

impl FromStr for GraphMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "delaunay" => Ok(GraphMethod::Delaunay),
            "gabriel" => Ok(GraphMethod::Gabriel),
            "rng" => Ok(GraphMethod::Rng),
            other => Err(Error::invalid_parameter(format!(
                "unknown neighbor graph '{other}', expected delaunay, gabriel or rng"
            ))),
        }
    }
}

/// Undirected edge between two tubercles, `id1 < id2`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeighborEdge {
    pub id1: u32,
    pub id2: u32,
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub center_distance_um: f64,
    /// Surface to surface distance, floored at 0.
    pub edge_distance_um: f64,
}

fn dist2(a: [f64; 2], b: [f64; 2]) -> f64 {
    (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)
}

fn delaunay_pairs(coords: &[[f64; 2]]) -> BTreeSet<(usize, usize)> {
    let points: Vec<delaunator::Point> = coords
        .iter()
        .map(|c| delaunator::Point { x: c[0], y: c[1] })
        .collect();
    let triangulation = delaunator::triangulate(&points);

    let mut pairs = BTreeSet::new();
    for tri in triangulation.triangles.chunks_exact(3) {
        for (a, b) in [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])] {
            if a != b {
                pairs.insert((a.min(b), a.max(b)));
            }
        }
    }
    pairs
}

type PointTree = ImmutableKdTree<f64, 2>;

/// Indices of the `k` points nearest to `query`.
fn nearest(tree: &PointTree, query: &[f64; 2], k: usize) -> Vec<usize> {
    let Ok(k) = k.try_into() else {
        return Vec::new();
    };
    tree.nearest_n::<SquaredEuclidean>(query, k)
        .into_iter()
        .map(|nn| nn.item as usize)
        .collect()
}

/// No other point lies strictly inside the circle with diameter `ab`.
fn is_gabriel(tree: &PointTree, coords: &[[f64; 2]], a: usize, b: usize) -> bool {
    let (pa, pb) = (coords[a], coords[b]);
    let mid = [(pa[0] + pb[0]) * 0.5, (pa[1] + pb[1]) * 0.5];
    let r2 = dist2(pa, pb) * 0.25;
    nearest(tree, &mid, 3)
        .into_iter()
        .filter(|&i| i != a && i != b)
        .all(|i| dist2(coords[i], mid) >= r2 * (1.0 - 1e-9))
}

/// No other point is closer to both `a` and `b` than they are to each other.
fn is_relative_neighbor(coords: &[[f64; 2]], a: usize, b: usize) -> bool {
    let d = dist2(coords[a], coords[b]);
    coords.iter().enumerate().all(|(i, &c)| {
        i == a || i == b || dist2(coords[a], c).max(dist2(coords[b], c)) >= d
    })
}

fn make_edge(a: &Tubercle, b: &Tubercle, calibration: &Calibration) -> NeighborEdge {
    let (first, second) = if a.id <= b.id { (a, b) } else { (b, a) };
    let center_px = first.centroid.distance(&second.centroid);
    let surface_px = center_px - first.radius_px - second.radius_px;
    NeighborEdge {
        id1: first.id,
        id2: second.id,
        x1: first.centroid.x,
        y1: first.centroid.y,
        x2: second.centroid.x,
        y2: second.centroid.y,
        center_distance_um: calibration.px_to_um(center_px),
        edge_distance_um: calibration.px_to_um(surface_px.max(0.0)),
    }
}

/// Build the neighbour graph, edges ordered by `(id1, id2)`.
pub fn build_neighbor_graph(
    tubercles: &[Tubercle],
    calibration: &Calibration,
    method: GraphMethod,
) -> Vec<NeighborEdge> {
    if tubercles.len() < 2 {
        return Vec::new();
    }
    let coords: Vec<[f64; 2]> = tubercles
        .iter()
        .map(|t| [t.centroid.x, t.centroid.y])
        .collect();
    let tree = PointTree::new_from_slice(&coords);

    let mut pairs: BTreeSet<(usize, usize)> = delaunay_pairs(&coords)
        .into_iter()
        .filter(|&(a, b)| match method {
            GraphMethod::Delaunay => true,
            GraphMethod::Gabriel => is_gabriel(&tree, &coords, a, b),
            GraphMethod::Rng => is_relative_neighbor(&coords, a, b),
        })
        .collect();

    let mut degree = vec![0usize; coords.len()];
    for &(a, b) in &pairs {
        degree[a] += 1;
        degree[b] += 1;
    }
    let mut joined = 0usize;
    for (i, query) in coords.iter().enumerate() {
        if degree[i] > 0 {
            continue;
        }
        if let Some(j) = nearest(&tree, query, 2).into_iter().find(|&j| j != i) {
            if pairs.insert((i.min(j), i.max(j))) {
                joined += 1;
            }
            degree[i] += 1;
            degree[j] += 1;
        }
    }

    let mut edges: Vec<NeighborEdge> = pairs
        .into_iter()
        .map(|(a, b)| make_edge(&tubercles[a], &tubercles[b], calibration))
        .collect();
    edges.sort_by_key(|e| (e.id1, e.id2));

    tracing::debug!(
        method = %method,
        tubercles = tubercles.len(),
        edges = edges.len(),
        nearest_neighbor_joins = joined,
        "neighbor graph built"
    );
    edges
}
