//! PDF SCRAPER
//! Walks a paginated search listing, pulls the `LoadPDF(<id>)` document ids
//! out of every page and downloads the documents they point at.
//!
//! Re-running is cheap: files already on disk are never requested again, and
//! the optional URL ledger remembers what earlier runs queued.

mod macros;

pub mod config;
pub mod dedupe;
pub mod download;
mod error;
pub mod filename;
pub mod ledger;
pub mod logging;
pub mod parse;
pub mod process;
#[cfg(feature = "render")]
pub mod render;
pub mod request;

pub use config::Config;
pub use download::{BatchReport, DownloadManager, DownloadOutcome, DownloadTarget};
pub use error::{Error, Result};
pub use ledger::ResumeLedger;
pub use process::{Crawler, RunReport};
