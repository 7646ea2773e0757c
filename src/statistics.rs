//! Aggregate diameter and spacing statistics.

use crate::connectivity::NeighborEdge;
use crate::detection::Tubercle;
use serde::{Deserialize, Serialize};

/// Arithmetic mean; `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation; `None` for an empty slice.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    Some(var.sqrt())
}

/// Per-result measurement summary. Absent values mean "no data", never 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeasurementStats {
    pub n_tubercles: usize,
    pub n_edges: usize,
    pub diameters_um: Vec<f64>,
    /// Surface to surface distances of the neighbour edges.
    pub spacings_um: Vec<f64>,
    pub mean_diameter_um: Option<f64>,
    pub std_diameter_um: Option<f64>,
    pub mean_spacing_um: Option<f64>,
    pub std_spacing_um: Option<f64>,
}

impl MeasurementStats {
    pub fn compute(tubercles: &[Tubercle], edges: &[NeighborEdge]) -> Self {
        let diameters_um: Vec<f64> = tubercles.iter().map(|t| t.diameter_um).collect();
        let spacings_um: Vec<f64> = edges.iter().map(|e| e.edge_distance_um).collect();
        Self {
            n_tubercles: tubercles.len(),
            n_edges: edges.len(),
            mean_diameter_um: mean(&diameters_um),
            std_diameter_um: std_dev(&diameters_um),
            mean_spacing_um: mean(&spacings_um),
            std_spacing_um: std_dev(&spacings_um),
            diameters_um,
            spacings_um,
        }
    }

    /// Mean centre to centre distance of the edges.
    pub fn mean_center_distance_um(edges: &[NeighborEdge]) -> Option<f64> {
        let d: Vec<f64> = edges.iter().map(|e| e.center_distance_um).collect();
        mean(&d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn empty_inputs_have_no_statistics() {
        let stats = MeasurementStats::compute(&[], &[]);
        assert_eq!(stats.n_tubercles, 0);
        assert!(stats.mean_diameter_um.is_none());
        assert!(stats.std_diameter_um.is_none());
        assert!(stats.mean_spacing_um.is_none());
        assert!(stats.std_spacing_um.is_none());
    }

    #[test]
    fn std_is_population() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_relative_eq!(mean(&values).unwrap(), 5.0);
        assert_relative_eq!(std_dev(&values).unwrap(), 2.0);
    }

    #[test]
    fn single_value_has_zero_spread() {
        assert_eq!(std_dev(&[3.5]), Some(0.0));
    }

    fn edge(id1: u32, id2: u32, center: f64, surface: f64) -> NeighborEdge {
        NeighborEdge {
            id1,
            id2,
            x1: 0.0,
            y1: 0.0,
            x2: 1.0,
            y2: 0.0,
            center_distance_um: center,
            edge_distance_um: surface,
        }
    }

    #[test]
    fn spacing_uses_surface_distance() {
        let edges = [edge(1, 2, 7.0, 3.0), edge(2, 3, 8.0, 4.0)];
        let stats = MeasurementStats::compute(&[], &edges);
        assert_eq!(stats.n_edges, 2);
        assert_relative_eq!(stats.mean_spacing_um.unwrap(), 3.5);
        assert_relative_eq!(stats.std_spacing_um.unwrap(), 0.5);
        assert_relative_eq!(MeasurementStats::mean_center_distance_um(&edges).unwrap(), 7.5);
        assert!(MeasurementStats::mean_center_distance_um(&[]).is_none());
    }
}
