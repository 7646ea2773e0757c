use crate::Result;

/// One pure transformation of the measurement pipeline
pub trait PipelineStage: Send + Sync {
    type Input;
    type Output;

    /// Execute this stage of the pipeline
    fn execute(&self, input: &Self::Input) -> Result<Self::Output>;

    /// Get the name of this stage for logging/debugging
    fn stage_name(&self) -> &str;

    /// `(width, height)` of the input when it is an image
    fn input_size(&self, _input: &Self::Input) -> Option<(usize, usize)> {
        None
    }

    /// Short label and item count describing an output, for logging
    fn describe_output(&self, output: &Self::Output) -> (&'static str, usize);
}
