use std::path::PathBuf;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::coordinator::Consumer;
use crate::target_group::{LabelSet, TargetGroup};

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("encode target groups failed, {0}")]
    Encode(#[from] serde_json::Error),

    #[error("write {path:?} failed, {err}")]
    Io { path: PathBuf, err: std::io::Error },
}

/// One entry of a file_sd target file.
#[derive(Debug, Serialize)]
struct StaticConfig<'a> {
    targets: Vec<&'a str>,
    labels: &'a LabelSet,
}

/// Render target groups in the format Prometheus' `file_sd_configs` reads,
/// one entry per group in the order received. Groups without any target are
/// kept.
pub fn render(groups: &[TargetGroup]) -> Result<Vec<u8>, WriteError> {
    let configs = groups
        .iter()
        .map(|group| StaticConfig {
            targets: group.addresses().collect(),
            labels: &group.labels,
        })
        .collect::<Vec<_>>();

    let mut data = serde_json::to_vec_pretty(&configs)?;
    data.push(b'\n');

    Ok(data)
}

/// Writes every received set of target groups to a file_sd target file.
pub struct FileSdWriter {
    path: PathBuf,
    last: Option<Vec<u8>>,
}

impl FileSdWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileSdWriter {
            path: path.into(),
            last: None,
        }
    }

    /// Write `groups` to the target file, unless the content would be the
    /// same as the last successful write. Returns whether the file was written.
    ///
    /// The content goes to a temporary file first and is renamed over the
    /// target, so Prometheus never reads a partial file.
    pub async fn write(&mut self, groups: &[TargetGroup]) -> Result<bool, WriteError> {
        let data = render(groups)?;
        if self.last.as_deref() == Some(data.as_slice()) {
            return Ok(false);
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, &data)
            .await
            .map_err(|err| WriteError::Io {
                path: tmp.clone(),
                err,
            })?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|err| WriteError::Io {
                path: self.path.clone(),
                err,
            })?;

        self.last = Some(data);

        Ok(true)
    }
}

#[async_trait]
impl Consumer for FileSdWriter {
    async fn run(
        mut self: Box<Self>,
        mut input: mpsc::Receiver<Vec<TargetGroup>>,
        shutdown: CancellationToken,
    ) {
        loop {
            let groups = tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,
                groups = input.recv() => match groups {
                    Some(groups) => groups,
                    None => break,
                },
            };

            match self.write(&groups).await {
                Ok(true) => debug!(
                    message = "target file updated",
                    path = ?self.path,
                    groups = groups.len(),
                ),
                Ok(false) => trace!(message = "targets unchanged", path = ?self.path),
                Err(err) => error!(message = "write target file failed", %err),
            }
        }

        debug!(message = "file_sd writer stopped", path = ?self.path);
    }
}
