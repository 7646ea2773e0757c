use crate::calibration::Calibration;
use crate::classification::{Classification, GenusClassifier};
use crate::connectivity::{build_neighbor_graph, GraphMethod, NeighborEdge};
use crate::detection::{detect_with_stats, Detection, DetectorParams, Tubercle};
use crate::imaging::RawImage;
use crate::pipeline::PipelineStage;
use crate::preprocessing::{preprocess, PreprocessParams, Preprocessed};
use crate::statistics::MeasurementStats;
use crate::Result;
use ndarray::Array2;

/// Stage that turns a decoded image into a normalised gray image
pub struct PreprocessStage {
    params: PreprocessParams,
}

impl PreprocessStage {
    pub fn new(params: PreprocessParams) -> Self {
        Self { params }
    }
}

impl PipelineStage for PreprocessStage {
    type Input = RawImage;
    type Output = Preprocessed;

    fn execute(&self, input: &Self::Input) -> Result<Self::Output> {
        Ok(preprocess(input, &self.params))
    }

    fn stage_name(&self) -> &str {
        "preprocess"
    }

    fn input_size(&self, input: &Self::Input) -> Option<(usize, usize)> {
        let (h, w) = input.shape();
        Some((w, h))
    }

    fn describe_output(&self, output: &Self::Output) -> (&'static str, usize) {
        ("image", output.intermediates.names().len())
    }
}

/// Stage that detects and measures tubercles
pub struct DetectStage {
    calibration: Calibration,
    params: DetectorParams,
}

impl DetectStage {
    pub fn new(calibration: Calibration, params: DetectorParams) -> Self {
        Self {
            calibration,
            params,
        }
    }
}

impl PipelineStage for DetectStage {
    type Input = Array2<f32>;
    type Output = Detection;

    fn execute(&self, input: &Self::Input) -> Result<Self::Output> {
        Ok(detect_with_stats(input, &self.calibration, &self.params))
    }

    fn stage_name(&self) -> &str {
        "detect"
    }

    fn input_size(&self, input: &Self::Input) -> Option<(usize, usize)> {
        let (h, w) = input.dim();
        Some((w, h))
    }

    fn describe_output(&self, output: &Self::Output) -> (&'static str, usize) {
        ("tubercles", output.tubercles.len())
    }
}

/// Neighbour edges plus the aggregate statistics over them
#[derive(Debug, Clone)]
pub struct Connectivity {
    pub edges: Vec<NeighborEdge>,
    pub stats: MeasurementStats,
}

/// Stage that builds the neighbour graph and aggregates measurements
pub struct ConnectStage {
    calibration: Calibration,
    method: GraphMethod,
}

impl ConnectStage {
    pub fn new(calibration: Calibration, method: GraphMethod) -> Self {
        Self {
            calibration,
            method,
        }
    }
}

impl PipelineStage for ConnectStage {
    type Input = Vec<Tubercle>;
    type Output = Connectivity;

    fn execute(&self, input: &Self::Input) -> Result<Self::Output> {
        let edges = build_neighbor_graph(input, &self.calibration, self.method);
        let stats = MeasurementStats::compute(input, &edges);
        Ok(Connectivity { edges, stats })
    }

    fn stage_name(&self) -> &str {
        "connect"
    }

    fn describe_output(&self, output: &Self::Output) -> (&'static str, usize) {
        ("edges", output.edges.len())
    }
}

/// Stage that suggests a genus from the aggregate statistics
pub struct ClassifyStage {
    classifier: GenusClassifier,
}

impl ClassifyStage {
    pub fn new(classifier: GenusClassifier) -> Self {
        Self { classifier }
    }
}

impl PipelineStage for ClassifyStage {
    type Input = MeasurementStats;
    type Output = Classification;

    fn execute(&self, input: &Self::Input) -> Result<Self::Output> {
        Ok(self
            .classifier
            .classify(input.mean_diameter_um, input.mean_spacing_um))
    }

    fn stage_name(&self) -> &str {
        "classify"
    }

    fn describe_output(&self, output: &Self::Output) -> (&'static str, usize) {
        ("classification", usize::from(output.genus.is_some()))
    }
}
