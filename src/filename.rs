//! Maps a document URL to a stable local filename.

use std::path::Path;

use crate::config::{Config, KeepChars};

/// Pure URL → filename mapping: lowercase, non-kept characters become `_`,
/// runs of `_` collapse, edges are trimmed, noise substrings are stripped and
/// the extension is appended unless it is already there.
///
/// Uniqueness is not enforced; two URLs that sanitize to the same text share
/// a destination and the second one is skipped as already downloaded.
#[derive(Debug, Clone)]
pub struct FilenameSanitizer {
    keep: KeepChars,
    noise: Vec<String>,
    extension: String,
}

impl FilenameSanitizer {
    pub fn new(keep: KeepChars, noise: Vec<String>, extension: impl Into<String>) -> Self {
        Self {
            keep,
            noise,
            extension: extension.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.keep_chars,
            config.noise_substrings.clone(),
            config.extension.clone(),
        )
    }

    pub fn to_filename(&self, url: &str) -> String {
        let lower = url.to_lowercase();

        let mut safe = String::with_capacity(lower.len());
        let mut prev_underscore = false;
        for c in lower.chars() {
            if self.keeps(c) {
                safe.push(c);
                prev_underscore = false;
            } else if !prev_underscore {
                safe.push('_');
                prev_underscore = true;
            }
        }
        let mut safe = safe.trim_matches('_').to_string();

        for noise in self.noise.iter().filter(|n| !n.is_empty()) {
            safe = safe.replace(noise.as_str(), "");
        }

        if !self.has_extension(&safe) {
            safe.push_str(&self.extension);
        }
        safe
    }

    fn keeps(&self, c: char) -> bool {
        match self.keep {
            KeepChars::Letters => c.is_ascii_lowercase(),
            KeepChars::Alphanumeric => c.is_ascii_lowercase() || c.is_ascii_digit(),
        }
    }

    fn has_extension(&self, name: &str) -> bool {
        let wanted = self.extension.trim_start_matches('.');
        Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == wanted)
    }
}

impl Default for FilenameSanitizer {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
