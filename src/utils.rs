use std::{env, path::Path};

use anyhow::{bail, Context};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use tracing::info;

async fn download_file(url: &str, path: &Path) -> anyhow::Result<()> {
    info!(url, path = %path.display(), "downloading model");

    let mut header_map = HeaderMap::new();

    if let Ok(token) = env::var("GITHUB_TOKEN") {
        let auth_value = HeaderValue::from_str(&format!("Bearer {}", token))
            .context("GITHUB_TOKEN is not a valid header value")?;
        header_map.insert(AUTHORIZATION, auth_value);
    }
    header_map.insert(
        ACCEPT,
        HeaderValue::from_static("application/octet-stream"),
    );

    let client = reqwest::Client::new();
    let response = client
        .get(url)
        .headers(header_map)
        .send()
        .await
        .with_context(|| format!("failed to request {url}"))?;

    if !response.status().is_success() {
        bail!("failed to download {}: {}", url, response.status());
    }

    let bytes = response
        .bytes()
        .await
        .with_context(|| format!("failed to read body of {url}"))?;
    tokio::fs::write(path, &bytes)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;

    info!(bytes = bytes.len(), "model downloaded");
    Ok(())
}

/// Fetches the checkpoint when it is missing locally and a URL is known.
/// Without a URL a missing file is left for the loader to report.
pub async fn ensure_model_exists(model_path: &Path, model_url: Option<&str>) -> anyhow::Result<()> {
    info!("checking model...");
    if model_path.exists() {
        return Ok(());
    }

    match model_url {
        Some(url) => download_file(url, model_path).await,
        None => Ok(()),
    }
}
