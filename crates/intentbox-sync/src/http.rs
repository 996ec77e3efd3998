//! HTTP distribution client: streams model artifacts into the local models directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use intentbox_core::{StatusCode, StatusUpdate};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{DistributionService, RawStatus, SyncError};

const ARTIFACT_EXTENSION: &str = "onnx";

/// Fetches `GET {base_url}/models/{name}` into `{models_dir}/{name}.onnx`.
pub struct HttpDistribution {
    client: reqwest::Client,
    base_url: String,
    models_dir: PathBuf,
}

impl HttpDistribution {
    /// `base_url` should be like `http://localhost:8080` (no trailing slash).
    pub fn new(base_url: String, models_dir: PathBuf) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            models_dir,
        }
    }

    /// Where the artifact for `name` lands once downloaded.
    pub fn artifact_path(&self, name: &str) -> PathBuf {
        self.models_dir.join(format!("{name}.{ARTIFACT_EXTENSION}"))
    }

    async fn download(
        &self,
        name: &str,
        updates: &mpsc::Sender<RawStatus>,
        progress: &mut Progress,
    ) -> Result<PathBuf, SyncError> {
        let url = format!("{}/models/{name}", self.base_url);
        info!(url = %url, "fetching model");

        let mut resp = self.client.get(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SyncError::Server {
                status: status.as_u16(),
                body,
            });
        }

        progress.total = resp.content_length().unwrap_or(0);
        tokio::fs::create_dir_all(&self.models_dir).await?;
        let dest = self.artifact_path(name);
        let part = PartialFile::new(dest.with_extension(format!("{ARTIFACT_EXTENSION}.part")));

        let mut file = tokio::fs::File::create(part.path()).await?;
        while let Some(chunk) = resp.chunk().await? {
            file.write_all(&chunk).await?;
            progress.downloaded += chunk.len() as u64;
            send(updates, StatusCode::Running, progress.downloaded, progress.total).await;
        }
        file.flush().await?;
        drop(file);

        tokio::fs::rename(part.path(), &dest).await?;
        part.keep();
        if progress.total == 0 {
            progress.total = progress.downloaded;
        }
        send(updates, StatusCode::Succeeded, progress.downloaded, progress.total).await;
        info!(path = %dest.display(), bytes = progress.downloaded, "model downloaded");
        Ok(dest)
    }
}

#[async_trait]
impl DistributionService for HttpDistribution {
    async fn fetch(
        &self,
        name: &str,
        updates: mpsc::Sender<RawStatus>,
    ) -> Result<PathBuf, SyncError> {
        validate_name(name)?;
        send(&updates, StatusCode::Pending, 0, 0).await;

        let mut progress = Progress::default();
        match self.download(name, &updates, &mut progress).await {
            Ok(path) => Ok(path),
            Err(e) => {
                warn!(model = name, error = %e, "model download failed");
                send(&updates, StatusCode::Failed, progress.downloaded, progress.total).await;
                Err(e)
            }
        }
    }
}

/// Bytes received so far, and the announced total (0 when unknown).
#[derive(Debug, Default, Clone, Copy)]
struct Progress {
    downloaded: u64,
    total: u64,
}

/// An in-progress download file, removed on drop unless [`keep`](Self::keep) is called.
///
/// The download future may be dropped at any await point, including by an
/// acquisition timeout.
struct PartialFile {
    path: PathBuf,
    keep: bool,
}

impl PartialFile {
    fn new(path: PathBuf) -> Self {
        Self { path, keep: false }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    /// The file was renamed into place; nothing to clean up.
    fn keep(mut self) {
        self.keep = true;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed partial download"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "could not remove partial download")
            }
        }
    }
}

/// Model names become file names; keep them to one plain path segment.
fn validate_name(name: &str) -> Result<(), SyncError> {
    let ok = !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if ok {
        Ok(())
    } else {
        Err(SyncError::InvalidName(name.to_string()))
    }
}

async fn send(updates: &mpsc::Sender<RawStatus>, status: StatusCode, done: u64, total: u64) {
    // A closed receiver means nobody is watching; the download still completes.
    if updates
        .send(StatusUpdate::new(status, done, total).into())
        .await
        .is_err()
    {
        debug!(?status, "status receiver closed");
    }
}
