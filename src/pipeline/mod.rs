//! Measurement pipeline: preprocess → detect → connect → classify.
//!
//! Each stage is a pure [`PipelineStage`]. [`Pipeline`] resolves the profile
//! and calibration, runs the stages in order under per-stage spans and
//! assembles the result. A `Pipeline` holds no per-run state and can be
//! shared across threads.

pub mod stage;
pub mod traits;
pub mod types;

pub use stage::*;
pub use traits::*;
pub use types::*;

use crate::classification::GenusClassifier;
use crate::data::{load_image, validate_image_size};
use crate::detection::DetectorParams;
use crate::imaging::RawImage;
use crate::logging::{get_correlation_id, CorrelationScope, PipelineSpan, RunSpan};
use crate::preprocessing::PreprocessParams;
use crate::profiles::ProfileRegistry;
use crate::Result;
use chrono::Utc;
use ndarray::Array2;
use std::path::Path;
use tracing::{debug, error, info};

/// Pipeline over an injected profile registry
#[derive(Debug, Clone)]
pub struct Pipeline {
    registry: ProfileRegistry,
    classifier: GenusClassifier,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(ProfileRegistry::builtin())
    }
}

impl Pipeline {
    pub fn new(registry: ProfileRegistry) -> Self {
        let classifier = GenusClassifier::from_registry(&registry);
        Self {
            registry,
            classifier,
        }
    }

    pub fn registry(&self) -> &ProfileRegistry {
        &self.registry
    }

    /// Load `path` and measure it.
    pub fn process_path(
        &self,
        path: impl AsRef<Path>,
        options: &PipelineOptions,
    ) -> Result<PipelineRun> {
        let path = path.as_ref();
        let image = load_image(path)?;
        self.run(&image, &path.display().to_string(), options)
    }

    /// Measure an already decoded image; `image_id` labels the result.
    pub fn process_array(
        &self,
        image: &RawImage,
        image_id: &str,
        options: &PipelineOptions,
    ) -> Result<PipelineRun> {
        self.run(image, image_id, options)
    }

    fn run(
        &self,
        image: &RawImage,
        source: &str,
        options: &PipelineOptions,
    ) -> Result<PipelineRun> {
        validate_image_size(image, 1)?;
        let profile = options.profile.resolve(&self.registry)?;
        let (height, width) = image.shape();
        let calibration = options.calibration.resolve(width)?;
        let detector = DetectorParams::from_profile(
            &profile,
            &calibration,
            options.blob_method,
            options.num_sigma,
        );

        let correlation = CorrelationScope::new();
        let run_id = correlation.id();
        let started_at = Utc::now();
        let run_span = RunSpan::new(source, &profile.name, run_id);
        let _run_guard = run_span.enter();
        info!(
            source = %source,
            width = width,
            height = height,
            profile = %profile.name,
            calibration = %calibration.method(),
            um_per_pixel = calibration.um_per_pixel(),
            "Starting measurement run"
        );

        let mut timings = Vec::with_capacity(4);

        let preprocessed = run_stage(
            &PreprocessStage::new(PreprocessParams::from(&profile)),
            image,
            &mut timings,
        )?;
        let detection = run_stage(
            &DetectStage::new(calibration, detector.clone()),
            &preprocessed.image,
            &mut timings,
        )?;
        let connectivity = run_stage(
            &ConnectStage::new(calibration, options.neighbor_graph),
            &detection.tubercles,
            &mut timings,
        )?;
        let classification = run_stage(
            &ClassifyStage::new(self.classifier.clone()),
            &connectivity.stats,
            &mut timings,
        )?;

        let diagnostics = DiagnosticInfo {
            run_id,
            started_at,
            source: source.to_string(),
            image_shape: (height, width),
            channels: image.channels(),
            profile: profile.name.clone(),
            calibration_method: calibration.method().to_string(),
            um_per_pixel: calibration.um_per_pixel(),
            blob_method: options.blob_method,
            neighbor_graph: options.neighbor_graph,
            min_sigma: detector.min_sigma,
            max_sigma: detector.max_sigma,
            detection: detection.stats,
            n_tubercles: detection.tubercles.len(),
            n_edges: connectivity.edges.len(),
            intermediates: preprocessed
                .intermediates
                .names()
                .into_iter()
                .map(String::from)
                .collect(),
            stage_timings: timings,
        };

        run_span.record_completion(
            diagnostics.n_tubercles,
            diagnostics.n_edges,
            classification.genus.as_deref(),
        );

        let result = MeasurementResult {
            image_id: source.to_string(),
            image_shape: (height, width),
            calibration,
            profile: profile.name,
            tubercles: detection.tubercles,
            edges: connectivity.edges,
            stats: connectivity.stats,
            suggested_genus: classification.genus,
            classification_confidence: classification.confidence,
        };

        Ok(PipelineRun {
            result,
            preprocessed,
            diagnostics,
        })
    }
}

fn run_stage<S: PipelineStage>(
    stage: &S,
    input: &S::Input,
    timings: &mut Vec<StageTime>,
) -> Result<S::Output> {
    let span = PipelineSpan::new(stage.stage_name(), get_correlation_id());
    let _guard = span.enter();
    span.record_input(stage.stage_name(), stage.input_size(input));
    debug!(stage = stage.stage_name(), stage_index = timings.len(), "Executing pipeline stage");

    match stage.execute(input) {
        Ok(output) => {
            let (kind, count) = stage.describe_output(&output);
            let duration_ms = span.record_completion(kind, count);
            timings.push(StageTime {
                stage_name: stage.stage_name().to_string(),
                duration_ms,
            });
            Ok(output)
        }
        Err(e) => {
            error!(stage = stage.stage_name(), error = %e, "Pipeline stage failed");
            Err(e)
        }
    }
}

/// Measure the image at `image_path` with the built-in profiles.
///
/// Returns the measurements, the preprocessed image the detector saw and
/// diagnostics for the run.
pub fn process_image(
    image_path: impl AsRef<Path>,
    options: &PipelineOptions,
) -> Result<(MeasurementResult, Array2<f32>, DiagnosticInfo)> {
    Pipeline::default()
        .process_path(image_path, options)
        .map(PipelineRun::into_parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::Confidence;
    use crate::Error;
    use tracing_test::traced_test;

    fn options() -> PipelineOptions {
        PipelineOptions::default().with_calibration(CalibrationSource::Manual {
            scale_bar_um: 10.0,
            scale_bar_px: 50.0,
        })
    }

    #[traced_test]
    #[test]
    fn blank_image_gives_empty_result() {
        let image = RawImage::Gray(Array2::zeros((96, 96)));
        let run = Pipeline::default()
            .process_array(&image, "blank", &options())
            .unwrap();
        assert!(run.result.tubercles.is_empty());
        assert!(run.result.edges.is_empty());
        assert!(run.result.mean_diameter_um().is_none());
        assert!(run.result.stats.std_spacing_um.is_none());
        assert!(run.result.suggested_genus.is_none());
        assert_eq!(run.result.classification_confidence, Confidence::None);
        assert_eq!(run.diagnostics.stage_timings.len(), 4);
        assert_eq!(run.diagnostics.detection.candidates, 0);
        assert!(logs_contain("Pipeline stage completed"));
    }

    #[test]
    fn unknown_profile_is_rejected_before_processing() {
        let image = RawImage::Gray(Array2::zeros((16, 16)));
        let err = Pipeline::default()
            .process_array(&image, "x", &options().with_profile("nope"))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownProfile { .. }));
    }

    #[test]
    fn invalid_manual_calibration_is_rejected() {
        let image = RawImage::Gray(Array2::zeros((16, 16)));
        let opts = options().with_calibration(CalibrationSource::Manual {
            scale_bar_um: 10.0,
            scale_bar_px: 0.0,
        });
        let err = Pipeline::default().process_array(&image, "x", &opts).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
    }

    #[test]
    fn empty_image_is_rejected() {
        let image = RawImage::Gray(Array2::zeros((0, 10)));
        let err = Pipeline::default().process_array(&image, "x", &options()).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
    }

    #[test]
    fn estimated_calibration_uses_image_width() {
        let image = RawImage::Gray(Array2::zeros((32, 64)));
        let run = Pipeline::default()
            .process_array(
                &image,
                "x",
                &PipelineOptions::default().with_calibration(CalibrationSource::Estimated),
            )
            .unwrap();
        assert_eq!(run.diagnostics.calibration_method, "estimated");
        let fov = run.result.calibration.um_per_pixel() * 64.0;
        assert!((fov - 100_000.0 / 700.0).abs() < 1e-9);
    }

    #[test]
    fn missing_file_surfaces_image_load_error() {
        let err = process_image("/definitely/not/here.png", &options()).unwrap_err();
        assert!(matches!(err, Error::ImageLoad { .. }));
    }
}
