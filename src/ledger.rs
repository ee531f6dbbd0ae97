//! Append-only, newline-delimited logs kept next to the downloads.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::{Error, Result};

/// Set of target URLs already enqueued in this or a previous run, backed by a
/// file with one URL per line.
///
/// Records what was *queued*, not what finished downloading.
#[derive(Debug)]
pub struct ResumeLedger {
    path: PathBuf,
    seen: HashSet<String>,
    entries: Vec<String>,
}

impl ResumeLedger {
    /// Loads the ledger at `path`. A missing file is an empty ledger.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let data = match tokio::fs::read_to_string(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(Error::filesystem(path, e)),
        };

        let mut ledger = Self {
            path,
            seen: HashSet::new(),
            entries: Vec::new(),
        };
        for line in data.lines().map(str::trim).filter(|l| !l.is_empty()) {
            ledger.insert(line);
        }
        debug!(path = %ledger.path.display(), entries = ledger.len(), "loaded ledger");
        Ok(ledger)
    }

    pub fn contains(&self, url: &str) -> bool {
        self.seen.contains(url)
    }

    /// Appends `url` to the log unless it is already there.
    /// Returns `true` when a new line was written.
    pub async fn record(&mut self, url: &str) -> Result<bool> {
        if self.contains(url) {
            return Ok(false);
        }
        append_line(&self.path, url).await?;
        self.insert(url);
        Ok(true)
    }

    /// Entries in the order they were first recorded.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn insert(&mut self, url: &str) {
        if self.seen.insert(url.to_string()) {
            self.entries.push(url.to_string());
        }
    }
}

/// Scrape cache: the raw markup of every fetched page, one blob per line.
#[derive(Debug, Clone)]
pub struct MarkupLog {
    path: PathBuf,
}

impl MarkupLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub async fn append(&self, markup: &str) -> Result<()> {
        append_line(&self.path, markup).await
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

async fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| Error::filesystem(path, e))?;

    let mut buf = Vec::with_capacity(line.len() + 1);
    buf.extend_from_slice(line.as_bytes());
    buf.push(b'\n');
    file.write_all(&buf)
        .await
        .map_err(|e| Error::filesystem(path, e))?;
    file.flush().await.map_err(|e| Error::filesystem(path, e))?;
    Ok(())
}
