use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::{info_time, Error, Result};

/// One document to fetch: its URL and the file name it is stored under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DownloadTarget {
    pub url: String,
    pub file_name: String,
}

/// What happened to a single download.
#[derive(Debug)]
pub enum DownloadOutcome {
    /// The destination already existed, nothing was requested.
    Skipped { path: PathBuf },
    Success { bytes: usize, path: PathBuf },
    Failed(Error),
}

impl DownloadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DownloadOutcome::Success { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, DownloadOutcome::Skipped { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, DownloadOutcome::Failed(_))
    }
}

impl fmt::Display for DownloadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DownloadOutcome::Skipped { path } => write!(f, "skipped {}", path.display()),
            DownloadOutcome::Success { bytes, path } => {
                write!(f, "wrote {bytes} bytes to {}", path.display())
            }
            DownloadOutcome::Failed(e) => write!(f, "failed: {e}"),
        }
    }
}

/// Fetches documents to disk. Cheap to clone; every clone shares the HTTP client.
#[derive(Debug, Clone)]
pub struct DownloadManager {
    client: Client,
    expected_content_type: Arc<str>,
}

impl DownloadManager {
    pub fn new(timeout: Duration, expected_content_type: &str) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            expected_content_type: expected_content_type.into(),
        })
    }

    /// Downloads `url` into `output_dir/file_name` unless that file already exists.
    ///
    /// Never returns an error: every failure is logged and reported as
    /// [`DownloadOutcome::Failed`], and no file is left behind for it.
    pub async fn download(&self, url: &str, file_name: &str, output_dir: &Path) -> DownloadOutcome {
        let path = output_dir.join(file_name);

        if file_exists(&path).await {
            info!(url, path = %path.display(), "file already exists, skipping");
            return DownloadOutcome::Skipped { path };
        }

        let body = match self.fetch_document(url).await {
            Ok(body) => body,
            Err(e) => {
                warn!(url, path = %path.display(), reason = %e, "download failed");
                return DownloadOutcome::Failed(e);
            }
        };

        match write_new_file(&path, &body).await {
            Ok(()) => {
                info!(url, path = %path.display(), bytes = body.len(), "downloaded");
                DownloadOutcome::Success {
                    bytes: body.len(),
                    path,
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                info!(url, path = %path.display(), "file appeared while downloading, skipping");
                DownloadOutcome::Skipped { path }
            }
            Err(e) => {
                let e = Error::filesystem(&path, e);
                warn!(url, path = %path.display(), reason = %e, "couldn't write document");
                DownloadOutcome::Failed(e)
            }
        }
    }

    /// Downloads every target concurrently and waits for all of them.
    pub async fn download_all(
        &self,
        targets: impl IntoIterator<Item = DownloadTarget>,
        output_dir: &Path,
    ) -> BatchReport {
        let mut batch = DownloadBatch::new(self.clone(), output_dir);
        for target in targets {
            batch.spawn(target);
        }
        batch.join().await
    }

    /// GET + status, content-type and non-empty checks. The body is fully
    /// buffered before anything touches the disk.
    async fn fetch_document(&self, url: &str) -> Result<Vec<u8>> {
        let fetch_err = |source| Error::Fetch {
            url: url.to_string(),
            source,
        };

        let res = self.client.get(url).send().await.map_err(fetch_err)?;

        let status = res.status();
        if !status.is_success() {
            return Err(Error::Status {
                url: url.to_string(),
                status,
            });
        }

        let content_type = res
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.contains(&*self.expected_content_type) {
            return Err(Error::ContentTypeMismatch {
                url: url.to_string(),
                found: content_type,
                expected: self.expected_content_type.to_string(),
            });
        }

        let body = res.bytes().await.map_err(fetch_err)?;
        if body.is_empty() {
            return Err(Error::EmptyBody {
                url: url.to_string(),
            });
        }
        Ok(body.to_vec())
    }
}

async fn file_exists(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}

/// Creates `path` (failing if it already exists) and writes `body` to it.
/// A file that couldn't be written completely is removed again.
async fn write_new_file(path: &Path, body: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;

    let written = async {
        file.write_all(body).await?;
        file.flush().await
    }
    .await;

    if let Err(e) = written {
        drop(file);
        let _ = tokio::fs::remove_file(path).await;
        return Err(e);
    }
    Ok(())
}

/// A group of concurrently running downloads, one task per target.
///
/// Tasks start as soon as they are spawned; [`DownloadBatch::join`] waits for
/// all of them. A failed or panicked task never cancels its siblings.
pub struct DownloadBatch {
    manager: DownloadManager,
    output_dir: Arc<Path>,
    tasks: JoinSet<(DownloadTarget, DownloadOutcome)>,
}

impl DownloadBatch {
    pub fn new(manager: DownloadManager, output_dir: &Path) -> Self {
        Self {
            manager,
            output_dir: output_dir.into(),
            tasks: JoinSet::new(),
        }
    }

    pub fn spawn(&mut self, target: DownloadTarget) {
        let manager = self.manager.clone();
        let output_dir = self.output_dir.clone();
        self.tasks.spawn(async move {
            let outcome = manager
                .download(&target.url, &target.file_name, &output_dir)
                .await;
            (target, outcome)
        });
    }

    /// Number of tasks not yet joined.
    pub(crate) fn len(&self) -> usize {
        self.tasks.len()
    }

    pub async fn join(mut self) -> BatchReport {
        let start_time = Local::now();
        let mut report = BatchReport::default();

        while let Some(task) = self.tasks.join_next().await {
            match task {
                Ok((target, outcome)) => report.push(target, outcome),
                Err(e) => {
                    error!("download task didn't finish: {e}");
                    report.failed += 1;
                }
            }
        }

        info_time!(
            start_time,
            "Batch done: {} downloaded ({}), {} skipped, {} failed",
            report.succeeded,
            ByteLen(report.bytes),
            report.skipped,
            report.failed
        );
        report
    }
}

/// Per-target outcomes of a batch plus running totals.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub bytes: usize,
    pub outcomes: Vec<(DownloadTarget, DownloadOutcome)>,
}

impl BatchReport {
    fn push(&mut self, target: DownloadTarget, outcome: DownloadOutcome) {
        match &outcome {
            DownloadOutcome::Skipped { .. } => self.skipped += 1,
            DownloadOutcome::Success { bytes, .. } => {
                self.succeeded += 1;
                self.bytes += bytes;
            }
            DownloadOutcome::Failed(_) => self.failed += 1,
        }
        self.outcomes.push((target, outcome));
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.skipped + self.failed
    }

    /// Outcome for the target with the given URL, if it was part of the batch.
    pub fn outcome_for(&self, url: &str) -> Option<&DownloadOutcome> {
        self.outcomes
            .iter()
            .find(|(target, _)| target.url == url)
            .map(|(_, outcome)| outcome)
    }
}

/// Human readable byte count for log lines.
struct ByteLen(usize);

impl fmt::Display for ByteLen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const KIB: f64 = 1024.0;
        let n = self.0 as f64;
        if n < KIB {
            write!(f, "{} B", self.0)
        } else if n < KIB * KIB {
            write!(f, "{:.1} KiB", n / KIB)
        } else {
            write!(f, "{:.1} MiB", n / (KIB * KIB))
        }
    }
}
