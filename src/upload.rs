use std::{
    fs, io,
    path::{Path, PathBuf},
};

use tracing::warn;
use uuid::Uuid;

const MAX_EXTENSION_LEN: usize = 8;

/// An uploaded file persisted under a unique name. The file is removed when
/// the guard is dropped, whatever happened in between.
#[derive(Debug)]
pub struct TempUpload {
    path: PathBuf,
}

impl TempUpload {
    /// Writes `bytes` to `<dir>/<uuid>[.<ext>]`. Only the extension of the
    /// client-supplied name is kept, and only if it is short and alphanumeric.
    pub async fn persist(dir: &Path, original_name: Option<&str>, bytes: &[u8]) -> io::Result<Self> {
        let mut file_name = Uuid::new_v4().to_string();
        if let Some(ext) = original_name.and_then(safe_extension) {
            file_name.push('.');
            file_name.push_str(&ext);
        }

        // Guard first, so a partial write is cleaned up too.
        let upload = TempUpload {
            path: dir.join(file_name),
        };
        tokio::fs::write(&upload.path, bytes).await?;
        Ok(upload)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempUpload {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            if err.kind() != io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), "failed to remove upload: {err}");
            }
        }
    }
}

fn safe_extension(name: &str) -> Option<String> {
    let ext = Path::new(name).extension()?.to_str()?;
    let valid = !ext.is_empty()
        && ext.len() <= MAX_EXTENSION_LEN
        && ext.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then(|| ext.to_ascii_lowercase())
}
