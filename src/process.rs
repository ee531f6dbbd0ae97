use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use chrono::Local;
use tokio::task::spawn_blocking;
use tracing::{debug, info, warn};

use crate::config::{Config, ExtractorKind, FetchStrategy};
use crate::dedupe::dedupe;
use crate::download::{BatchReport, DownloadBatch, DownloadManager, DownloadTarget};
use crate::filename::FilenameSanitizer;
use crate::ledger::{MarkupLog, ResumeLedger};
use crate::parse::{AttributeExtractor, CallPatternExtractor, IdentifierExtractor};
use crate::request::{HttpFetcher, PageFetcher};
use crate::{info_time, Error, Result};

/// Totals of one live crawl.
#[derive(Debug, Default)]
pub struct RunReport {
    pub pages_fetched: usize,
    pub pages_failed: usize,
    pub identifiers: usize,
    pub enqueued: usize,
    pub downloads: BatchReport,
}

/// Drives the page loop: fetch → extract → dedupe → download.
pub struct Crawler {
    config: Config,
    fetcher: Arc<dyn PageFetcher>,
    extractor: Arc<dyn IdentifierExtractor>,
    downloader: DownloadManager,
    sanitizer: FilenameSanitizer,
    markup_log: MarkupLog,
}

impl Crawler {
    pub fn new(
        config: Config,
        fetcher: Arc<dyn PageFetcher>,
        extractor: Arc<dyn IdentifierExtractor>,
    ) -> Result<Self> {
        config.validate()?;
        let downloader =
            DownloadManager::new(config.download_timeout(), &config.expected_content_type)?;
        Ok(Self {
            sanitizer: FilenameSanitizer::from_config(&config),
            markup_log: MarkupLog::new(&config.markup_log),
            downloader,
            fetcher,
            extractor,
            config,
        })
    }

    /// Builds the fetch and extraction strategies named in `config`.
    pub async fn from_config(config: Config) -> Result<Self> {
        let fetcher = build_fetcher(&config).await?;
        let extractor: Arc<dyn IdentifierExtractor> = match config.extractor {
            ExtractorKind::Pattern => Arc::new(CallPatternExtractor::new(&config.call_name)?),
            ExtractorKind::Attribute => Arc::new(AttributeExtractor::new(&config.call_name)?),
        };
        Self::new(config, fetcher, extractor)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitizer(&self) -> &FilenameSanitizer {
        &self.sanitizer
    }

    /// Creates the output directory. Nothing can be downloaded without it.
    pub async fn prepare_output_dir(&self) -> Result<()> {
        let dir = &self.config.output_dir;
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| Error::filesystem(dir, e))
    }

    /// Live mode: crawls every page and downloads as it goes, then waits for
    /// every download. With a ledger, targets recorded there by an earlier run
    /// are left out and new ones are recorded before their download starts.
    pub async fn crawl(&self, ledger: Option<&mut ResumeLedger>) -> Result<RunReport> {
        let start_time = Local::now();
        info!(pages = self.config.alphabet.chars().count(), "Started crawling");

        let mut report = RunReport::default();
        let mut batch = DownloadBatch::new(self.downloader.clone(), &self.config.output_dir);

        // Downloads already spawned are always awaited, even if the page loop bails out.
        let scheduled = self.schedule_pages(ledger, &mut report, &mut batch).await;
        if let Err(e) = &scheduled {
            warn!(tasks = batch.len(), reason = %e, "Crawl stopped, waiting for started downloads");
        } else {
            info!(tasks = batch.len(), "All pages processed, waiting for downloads");
        }
        report.downloads = batch.join().await;
        scheduled?;

        info_time!(
            start_time,
            "Crawl finished: {} pages, {} failed, {} downloads enqueued",
            report.pages_fetched,
            report.pages_failed,
            report.enqueued
        );
        Ok(report)
    }

    /// Page loop of the live crawl: every new target is spawned into `batch` right away.
    async fn schedule_pages(
        &self,
        mut ledger: Option<&mut ResumeLedger>,
        report: &mut RunReport,
        batch: &mut DownloadBatch,
    ) -> Result<()> {
        let mut scheduled = HashSet::new();

        for letter in self.config.alphabet.chars() {
            let page_url = self.config.page_url(letter);
            let Some(markup) = self.fetch_page(&page_url, report).await? else {
                continue;
            };

            let (found, targets) = self.extract_targets(markup).await?;
            report.identifiers += found;

            for target in targets {
                if !scheduled.insert(target.url.clone()) {
                    continue;
                }
                if let Some(ledger) = ledger.as_deref_mut() {
                    if !ledger.record(&target.url).await? {
                        debug!(url = %target.url, "already in ledger");
                        continue;
                    }
                }
                report.enqueued += 1;
                batch.spawn(target);
            }
        }
        Ok(())
    }

    /// First half of the two-phase mode: crawls every page and records target
    /// URLs in the ledger without downloading. Returns the number of new entries.
    pub async fn enqueue(&self, ledger: &mut ResumeLedger) -> Result<usize> {
        let start_time = Local::now();
        let mut report = RunReport::default();
        let mut added = 0;

        for letter in self.config.alphabet.chars() {
            let page_url = self.config.page_url(letter);
            let Some(markup) = self.fetch_page(&page_url, &mut report).await? else {
                continue;
            };

            let (_, targets) = self.extract_targets(markup).await?;
            for target in targets {
                if ledger.record(&target.url).await? {
                    added += 1;
                }
            }
        }

        info_time!(
            start_time,
            "Enqueued {} new URLs into {} ({} total)",
            added,
            ledger.path().display(),
            ledger.len()
        );
        Ok(added)
    }

    /// Second half of the two-phase mode: downloads every URL in the ledger.
    /// Files that already exist are skipped, so draining twice is harmless.
    pub async fn drain(&self, ledger: &ResumeLedger) -> Result<BatchReport> {
        info!(entries = ledger.len(), path = %ledger.path().display(), "Draining ledger");
        let targets = ledger
            .entries()
            .iter()
            .map(|url| self.target_for(url.clone()))
            .collect::<Vec<_>>();
        Ok(self
            .downloader
            .download_all(targets, &self.config.output_dir)
            .await)
    }

    /// Distinct download targets referenced by `markup`, in first-seen order.
    pub async fn targets_from_markup(&self, markup: impl Into<String>) -> Result<Vec<DownloadTarget>> {
        let (_, targets) = self.extract_targets(markup.into()).await?;
        Ok(targets)
    }

    pub fn output_dir(&self) -> &Path {
        &self.config.output_dir
    }

    /// Fetches one listing page and appends it to the markup log.
    /// A failed fetch is logged and yields `None` so the crawl can go on.
    async fn fetch_page(&self, url: &str, report: &mut RunReport) -> Result<Option<String>> {
        let markup = match self.fetcher.fetch(url).await {
            Ok(markup) => markup,
            Err(e) => {
                warn!(url, reason = %e, "couldn't fetch page");
                report.pages_failed += 1;
                return Ok(None);
            }
        };
        info!(url, bytes = markup.len(), "Scraped page");
        report.pages_fetched += 1;
        self.markup_log.append(&markup).await?;
        Ok(Some(markup))
    }

    /// Runs extraction on the blocking pool and turns the distinct ids into
    /// targets. Also returns how many ids were found before deduplication.
    async fn extract_targets(&self, markup: String) -> Result<(usize, Vec<DownloadTarget>)> {
        let ids = spawn_blocking({
            let extractor = self.extractor.clone();
            move || extractor.extract(&markup)
        })
        .await?;

        let found = ids.len();
        let targets = dedupe(ids)
            .into_iter()
            .map(|id| self.target_for(self.config.target_url(&id)))
            .collect();
        Ok((found, targets))
    }

    fn target_for(&self, url: String) -> DownloadTarget {
        DownloadTarget {
            file_name: self.sanitizer.to_filename(&url),
            url,
        }
    }
}

async fn build_fetcher(config: &Config) -> Result<Arc<dyn PageFetcher>> {
    match config.fetch_strategy {
        FetchStrategy::Http => Ok(Arc::new(HttpFetcher::new(config.fetch_timeout())?)),
        #[cfg(feature = "render")]
        FetchStrategy::Rendered => Ok(Arc::new(
            crate::render::RenderedFetcher::launch(config.render_timeout()).await?,
        )),
        #[cfg(not(feature = "render"))]
        FetchStrategy::Rendered => Err(Error::Config(
            "fetch_strategy = \"rendered\" needs the `render` feature".into(),
        )),
    }
}
