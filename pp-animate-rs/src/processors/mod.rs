//! Data processing modules.

pub mod combinations;
pub mod datasets;
pub mod sequence;

// Re-export key types for convenience
pub use combinations::{generate_cases, parameter_combinations, CaseSpecification, Params};
pub use datasets::{join_datasets, DatasetError};
pub use sequence::{
    run_animation, AnimationEncoder, AnimationJob, AnimationSummary, FrameSelector,
    ImageMagickEncoder, SequenceError,
};
