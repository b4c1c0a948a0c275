use std::path::PathBuf;

use thiserror::Error;

use crate::preprocess::ImageTensor;

#[cfg(feature = "tensorflow")]
mod frozen_graph;
#[cfg(feature = "tensorflow")]
pub use self::frozen_graph::{FrozenGraphModel, FrozenGraphOptions};

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("failed to read checkpoint {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[cfg(feature = "tensorflow")]
    #[error("tensorflow error: {0}")]
    Tensorflow(#[from] tensorflow::Status),
    #[error("model produces {outputs} scores but {labels} labels are registered")]
    WidthMismatch { outputs: usize, labels: usize },
    #[error("model returned no usable scores")]
    NoScores,
}

/// A loaded, inference-only classification network.
///
/// `forward` takes a `[1, 3, H, W]` tensor and returns one raw score per
/// class. Implementations are shared across request threads and must not
/// mutate themselves.
pub trait Classifier: Send + Sync {
    fn forward(&self, input: &ImageTensor) -> Result<Vec<f32>, ModelError>;
}

/// Index of the highest score. Ties go to the first index; NaN never wins.
pub fn argmax(scores: &[f32]) -> Option<usize> {
    scores
        .iter()
        .enumerate()
        .filter(|(_, score)| !score.is_nan())
        .fold(None, |best: Option<(usize, f32)>, (i, &score)| match best {
            Some((_, top)) if top >= score => best,
            _ => Some((i, score)),
        })
        .map(|(i, _)| i)
}
