use std::{fs, io::Cursor, path::Path, sync::Arc};

use axum::{
    body::Body,
    http::{header, Request},
    Router,
};
use food_detector_rs::{
    inference::InferenceContext,
    labels::LabelRegistry,
    model::{Classifier, ModelError},
    preprocess::{ImageTensor, CHANNEL_MEAN, CHANNEL_STD},
    server::{router, AppState},
};
use image::{DynamicImage, ImageOutputFormat};
use tempfile::TempDir;

pub const BOUNDARY: &str = "X-FOOD-DETECTOR-BOUNDARY";

/// Scores each of `blue`, `green`, `red` (sorted label order) by the mean
/// intensity of that channel.
pub struct ChannelClassifier;

impl Classifier for ChannelClassifier {
    fn forward(&self, input: &ImageTensor) -> Result<Vec<f32>, ModelError> {
        let plane = input.as_slice().len() / 3;
        let mean = |c: usize| {
            let sum: f32 = input.as_slice()[c * plane..(c + 1) * plane]
                .iter()
                .map(|v| v * CHANNEL_STD[c] + CHANNEL_MEAN[c])
                .sum();
            sum / plane as f32
        };
        Ok(vec![mean(2), mean(1), mean(0)])
    }
}

pub struct TestServer {
    pub app: Router,
    pub labels: LabelRegistry,
    pub temp: TempDir,
    _dataset: TempDir,
}

impl TestServer {
    pub fn new() -> Self {
        Self::with_body_limit(5 * 1024 * 1024)
    }

    pub fn with_body_limit(body_limit_bytes: usize) -> Self {
        let dataset = tempfile::tempdir().unwrap();
        for name in ["red", "green", "blue"] {
            fs::create_dir(dataset.path().join(name)).unwrap();
        }
        let labels = LabelRegistry::from_dataset_dir(dataset.path()).unwrap();
        let inference =
            InferenceContext::new(Arc::new(ChannelClassifier), labels.clone()).unwrap();

        let temp = tempfile::tempdir().unwrap();
        let state = Arc::new(AppState {
            inference,
            temp_dir: temp.path().to_path_buf(),
        });

        TestServer {
            app: router(state, body_limit_bytes),
            labels,
            temp,
            _dataset: dataset,
        }
    }

    pub fn temp_is_empty(&self) -> bool {
        dir_is_empty(self.temp.path())
    }
}

fn dir_is_empty(dir: &Path) -> bool {
    fs::read_dir(dir).unwrap().next().is_none()
}

pub fn encode(image: &DynamicImage, format: ImageOutputFormat) -> Vec<u8> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), format).unwrap();
    bytes
}

pub struct Part<'a> {
    pub name: &'a str,
    pub file_name: Option<&'a str>,
    pub bytes: &'a [u8],
}

pub fn multipart_request(parts: &[Part<'_>]) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        let disposition = match part.file_name {
            Some(file_name) => format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                part.name, file_name
            ),
            None => format!("Content-Disposition: form-data; name=\"{}\"\r\n", part.name),
        };
        body.extend_from_slice(disposition.as_bytes());
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(part.bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/predict")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

pub fn image_request(file_name: &str, bytes: &[u8]) -> Request<Body> {
    multipart_request(&[Part {
        name: "image",
        file_name: Some(file_name),
        bytes,
    }])
}
