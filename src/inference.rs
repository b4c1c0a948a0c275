use std::{path::Path, sync::Arc};

use image::{DynamicImage, ImageError};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    labels::LabelRegistry,
    model::{argmax, Classifier, ModelError},
    preprocess::{preprocess, ImageTensor, INPUT_SIZE},
};

#[derive(Error, Debug)]
pub enum PredictError {
    #[error("failed to open image: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to decode image: {0}")]
    Decode(#[from] ImageError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("class index {index} has no label ({labels} registered)")]
    UnknownClass { index: usize, labels: usize },
}

/// Model plus label registry, built once at startup and shared read-only.
#[derive(Clone)]
pub struct InferenceContext {
    classifier: Arc<dyn Classifier>,
    labels: Arc<LabelRegistry>,
}

impl InferenceContext {
    /// Runs one forward pass on a zero image and checks that the model
    /// emits exactly one score per registered label.
    pub fn new(classifier: Arc<dyn Classifier>, labels: LabelRegistry) -> Result<Self, ModelError> {
        let size = INPUT_SIZE as usize;
        let probe = ImageTensor::zeros(&[1, 3, size, size]);
        let outputs = classifier.forward(&probe)?.len();
        if outputs != labels.len() {
            return Err(ModelError::WidthMismatch {
                outputs,
                labels: labels.len(),
            });
        }
        info!(classes = outputs, "model output width matches label registry");

        Ok(InferenceContext {
            classifier,
            labels: Arc::new(labels),
        })
    }

    /// Decodes the file at `path` and classifies it. The format is sniffed
    /// from the content, falling back to the file extension.
    pub fn predict_path(&self, path: &Path) -> Result<String, PredictError> {
        let image = image::io::Reader::open(path)?
            .with_guessed_format()?
            .decode()?;
        self.predict_image(&image)
    }

    pub fn predict_image(&self, image: &DynamicImage) -> Result<String, PredictError> {
        let input = preprocess(image).unsqueeze();
        let scores = self.classifier.forward(&input)?;
        let index = argmax(&scores).ok_or(ModelError::NoScores)?;

        let label = self
            .labels
            .get(index)
            .ok_or(PredictError::UnknownClass {
                index,
                labels: self.labels.len(),
            })?;
        debug!(index, score = scores[index], label, "prediction");
        Ok(label.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use image::{Rgb, RgbImage};

    use super::*;

    struct Fixed(Vec<f32>);

    impl Classifier for Fixed {
        fn forward(&self, _input: &ImageTensor) -> Result<Vec<f32>, ModelError> {
            Ok(self.0.clone())
        }
    }

    fn labels(names: &[&str]) -> (tempfile::TempDir, LabelRegistry) {
        let dir = tempfile::tempdir().unwrap();
        for name in names {
            fs::create_dir(dir.path().join(name)).unwrap();
        }
        let registry = LabelRegistry::from_dataset_dir(dir.path()).unwrap();
        (dir, registry)
    }

    #[test]
    fn width_mismatch_is_fatal() {
        let (_dir, registry) = labels(&["a", "b", "c"]);
        let err = InferenceContext::new(Arc::new(Fixed(vec![0.0; 4])), registry)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            ModelError::WidthMismatch {
                outputs: 4,
                labels: 3
            }
        ));
    }

    #[test]
    fn highest_score_selects_label() {
        let (_dir, registry) = labels(&["biryani", "dosa", "paratha"]);
        let ctx = InferenceContext::new(Arc::new(Fixed(vec![0.2, -1.0, 4.0])), registry).unwrap();
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([1, 2, 3])));
        assert_eq!(ctx.predict_image(&image).unwrap(), "paratha");
    }

    #[test]
    fn all_nan_scores_are_an_error() {
        let (_dir, registry) = labels(&["a", "b"]);
        let ctx = InferenceContext::new(Arc::new(Fixed(vec![f32::NAN; 2])), registry).unwrap();
        let image = DynamicImage::ImageRgb8(RgbImage::new(4, 4));
        assert!(matches!(
            ctx.predict_image(&image),
            Err(PredictError::Model(ModelError::NoScores))
        ));
    }

    #[test]
    fn garbage_file_is_a_decode_error() {
        let (_dir, registry) = labels(&["a", "b"]);
        let ctx = InferenceContext::new(Arc::new(Fixed(vec![1.0, 0.0])), registry).unwrap();
        let file = tempfile::NamedTempFile::new().unwrap();
        fs::write(file.path(), b"definitely not an image").unwrap();
        assert!(matches!(
            ctx.predict_path(file.path()),
            Err(PredictError::Decode(_))
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let (dir, registry) = labels(&["a", "b"]);
        let ctx = InferenceContext::new(Arc::new(Fixed(vec![1.0, 0.0])), registry).unwrap();
        assert!(matches!(
            ctx.predict_path(&dir.path().join("missing.jpg")),
            Err(PredictError::Io(_))
        ));
    }
}
