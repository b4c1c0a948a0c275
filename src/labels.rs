use std::{
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LabelError {
    #[error("failed to read dataset directory {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("dataset directory {0} has no entries")]
    Empty(PathBuf),
    #[error("dataset entry {0:?} is not valid UTF-8")]
    NonUtf8(OsString),
}

/// Class names indexed exactly like the model's output scores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelRegistry {
    labels: Vec<String>,
}

impl LabelRegistry {
    /// Enumerates every entry of `dir` and sorts the names lexicographically.
    /// The model is expected to have been trained with classes in this order.
    pub fn from_dataset_dir(dir: impl AsRef<Path>) -> Result<Self, LabelError> {
        let dir = dir.as_ref();
        let io_err = |source| LabelError::Io {
            path: dir.to_path_buf(),
            source,
        };

        let mut labels = Vec::new();
        for entry in fs::read_dir(dir).map_err(io_err)? {
            let name = entry.map_err(io_err)?.file_name();
            labels.push(name.into_string().map_err(LabelError::NonUtf8)?);
        }

        if labels.is_empty() {
            return Err(LabelError::Empty(dir.to_path_buf()));
        }

        labels.sort();
        Ok(LabelRegistry { labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}
