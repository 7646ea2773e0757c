//! Structured spans for hierarchical logging
//!
//! One `RunSpan` per measurement run and one `PipelineSpan` per stage, both
//! tagged with the run's correlation id.

use std::time::Instant;
use tracing::{field, span, Level, Span};
use uuid::Uuid;

/// Span for a pipeline stage
pub struct PipelineSpan {
    span: Span,
    start_time: Instant,
    stage_name: String,
}

impl PipelineSpan {
    /// Create a new pipeline stage span
    pub fn new(stage_name: &str, correlation_id: Option<Uuid>) -> Self {
        let span = span!(
            Level::INFO,
            "pipeline_stage",
            stage = stage_name,
            correlation_id = field::Empty,
            input_type = field::Empty,
            input_width = field::Empty,
            input_height = field::Empty,
            output_type = field::Empty,
            item_count = field::Empty,
            execution_time_ms = field::Empty,
        );
        if let Some(id) = correlation_id {
            span.record("correlation_id", field::display(id));
        }

        Self {
            span,
            start_time: Instant::now(),
            stage_name: stage_name.to_string(),
        }
    }

    /// Record stage input metadata; `input_size` is `(width, height)`.
    pub fn record_input(&self, input_type: &str, input_size: Option<(usize, usize)>) {
        self.span.record("input_type", input_type);
        if let Some((width, height)) = input_size {
            self.span.record("input_width", width);
            self.span.record("input_height", height);
        }
        tracing::debug!(
            parent: &self.span,
            input_type = input_type,
            input_width = input_size.map(|(w, _)| w),
            input_height = input_size.map(|(_, h)| h),
            "Pipeline stage input recorded"
        );
    }

    /// Record stage completion and return the elapsed time in milliseconds.
    pub fn record_completion(&self, output_type: &str, item_count: usize) -> f64 {
        let duration_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        self.span.record("output_type", output_type);
        self.span.record("item_count", item_count);
        self.span.record("execution_time_ms", duration_ms);

        tracing::info!(
            parent: &self.span,
            stage = %self.stage_name,
            output_type = output_type,
            item_count = item_count,
            execution_time_ms = duration_ms,
            "Pipeline stage completed"
        );
        duration_ms
    }

    pub fn stage_name(&self) -> &str {
        &self.stage_name
    }

    /// Enter the span context
    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

/// Span for one measurement run over a single image
pub struct RunSpan {
    span: Span,
    start_time: Instant,
    run_id: Uuid,
}

impl RunSpan {
    pub fn new(source: &str, profile: &str, run_id: Uuid) -> Self {
        let span = span!(
            Level::INFO,
            "measurement_run",
            source = source,
            profile = profile,
            correlation_id = %run_id,
            tubercles = field::Empty,
            edges = field::Empty,
            genus = field::Empty,
            total_ms = field::Empty,
        );
        Self {
            span,
            start_time: Instant::now(),
            run_id,
        }
    }

    /// Record the run outcome
    pub fn record_completion(&self, tubercles: usize, edges: usize, genus: Option<&str>) {
        let total_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        self.span.record("tubercles", tubercles);
        self.span.record("edges", edges);
        if let Some(genus) = genus {
            self.span.record("genus", genus);
        }
        self.span.record("total_ms", total_ms);

        tracing::info!(
            parent: &self.span,
            tubercles = tubercles,
            edges = edges,
            genus = genus.unwrap_or("none"),
            total_ms = total_ms,
            "Measurement run completed"
        );
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[traced_test]
    #[test]
    fn test_pipeline_span() {
        let correlation_id = Uuid::new_v4();
        let span = PipelineSpan::new("preprocess", Some(correlation_id));

        let _enter = span.enter();
        span.record_input("raw_image", Some((1024, 768)));
        let elapsed = span.record_completion("image", 1);
        assert!(elapsed >= 0.0);
        assert!(logs_contain("Pipeline stage completed"));
    }

    #[traced_test]
    #[test]
    fn test_run_span() {
        let run_id = Uuid::new_v4();
        let span = RunSpan::new("scale.png", "default", run_id);
        assert_eq!(span.run_id(), run_id);

        let _enter = span.enter();
        span.record_completion(12, 30, Some("Lepisosteus"));
        assert!(logs_contain("Measurement run completed"));
    }
}
