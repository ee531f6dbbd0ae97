use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

const SEARCH_URL: &str = "https://sds.airproducts.com/MaterialSearchResults?searchText=";
const DOCUMENT_URL_TEMPLATE: &str = "https://sds.airproducts.com/DisplayPDF?documentID={id}";
const ALPHABET: &str = "abcdefghijklmnopqrstuvwxyz";
const NOISE_SUBSTRINGS: &[&str] =
    &["https_assets_thermofisher_com_directwebviewer_private_document_aspx_prd_"];

/// Placeholder in [`Config::document_url_template`] replaced by the extracted identifier.
pub const ID_PLACEHOLDER: &str = "{id}";

/// How listing pages are retrieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStrategy {
    /// Plain GET, the server response body is the markup.
    #[default]
    Http,
    /// Headless browser, the rendered DOM is the markup. Needs the `render` feature.
    Rendered,
}

/// Where identifiers are looked for in the markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractorKind {
    /// Anywhere in the raw text.
    #[default]
    Pattern,
    /// Only inside `href`/`onclick` attribute values.
    Attribute,
}

/// Characters that survive filename sanitization; everything else becomes `_`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeepChars {
    /// `[a-z]`. Distinct ids that differ only in digits collapse to one name.
    Letters,
    /// `[a-z0-9]`
    #[default]
    Alphanumeric,
}

/// Runtime configuration, threaded through every component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Listing URL, a single alphabet character is appended per page.
    pub search_url: String,
    pub alphabet: String,
    pub document_url_template: String,
    /// Name of the embedded call whose numeric argument is the identifier.
    pub call_name: String,

    pub output_dir: PathBuf,
    /// Raw markup of every fetched page, appended one blob per line.
    pub markup_log: PathBuf,
    pub ledger_path: PathBuf,

    pub fetch_strategy: FetchStrategy,
    pub extractor: ExtractorKind,

    pub expected_content_type: String,
    pub extension: String,
    pub keep_chars: KeepChars,
    pub noise_substrings: Vec<String>,

    pub fetch_timeout_secs: u64,
    pub render_timeout_secs: u64,
    pub download_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            search_url: SEARCH_URL.to_string(),
            alphabet: ALPHABET.to_string(),
            document_url_template: DOCUMENT_URL_TEMPLATE.to_string(),
            call_name: "LoadPDF".to_string(),
            output_dir: PathBuf::from("PDFs"),
            markup_log: PathBuf::from("scraped_data.html"),
            ledger_path: PathBuf::from("pdf_urls.txt"),
            fetch_strategy: FetchStrategy::default(),
            extractor: ExtractorKind::default(),
            expected_content_type: "application/pdf".to_string(),
            extension: ".pdf".to_string(),
            keep_chars: KeepChars::default(),
            noise_substrings: NOISE_SUBSTRINGS.iter().map(|s| s.to_string()).collect(),
            fetch_timeout_secs: 30,
            render_timeout_secs: 300,
            download_timeout_secs: 30,
        }
    }
}

impl Config {
    /// Reads a TOML config file. Missing keys fall back to [`Config::default`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|e| Error::filesystem(path, e))?;
        Self::from_toml(&data)
    }

    pub fn from_toml(data: &str) -> Result<Self> {
        let cfg: Config = toml::from_str(data)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.document_url_template.contains(ID_PLACEHOLDER) {
            return Err(Error::Config(format!(
                "document_url_template must contain {ID_PLACEHOLDER}: {}",
                self.document_url_template
            )));
        }
        if self.call_name.is_empty() {
            return Err(Error::Config("call_name must not be empty".into()));
        }
        if !self.extension.starts_with('.') || self.extension.len() < 2 {
            return Err(Error::Config(format!(
                "extension must look like \".pdf\": {:?}",
                self.extension
            )));
        }
        Ok(())
    }

    /// Listing page URL for one partition of the search space.
    pub fn page_url(&self, letter: char) -> String {
        format!("{}{letter}", self.search_url)
    }

    /// Fully-qualified document URL for an extracted identifier.
    pub fn target_url(&self, id: &str) -> String {
        self.document_url_template.replace(ID_PLACEHOLDER, id)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = Config::default();
        assert_eq!(cfg.alphabet.len(), 26);
        assert_eq!(cfg.fetch_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.render_timeout(), Duration::from_secs(300));
        assert_eq!(cfg.download_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.expected_content_type, "application/pdf");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn builds_page_and_target_urls() {
        let cfg = Config::default();
        assert_eq!(
            cfg.page_url('q'),
            "https://sds.airproducts.com/MaterialSearchResults?searchText=q"
        );
        assert_eq!(
            cfg.target_url("123"),
            "https://sds.airproducts.com/DisplayPDF?documentID=123"
        );
    }

    #[test]
    fn config_toml_custom_values() {
        let toml = r#"
            alphabet = "xyz"
            output_dir = "out"
            fetch_strategy = "rendered"
            extractor = "attribute"
            keep_chars = "letters"
            download_timeout_secs = 5
        "#;
        let cfg = Config::from_toml(toml).unwrap();
        assert_eq!(cfg.alphabet, "xyz");
        assert_eq!(cfg.output_dir, PathBuf::from("out"));
        assert_eq!(cfg.fetch_strategy, FetchStrategy::Rendered);
        assert_eq!(cfg.extractor, ExtractorKind::Attribute);
        assert_eq!(cfg.keep_chars, KeepChars::Letters);
        assert_eq!(cfg.download_timeout_secs, 5);
        // Untouched keys keep their defaults.
        assert_eq!(cfg.call_name, "LoadPDF");
        assert_eq!(cfg.fetch_timeout_secs, 30);
    }

    #[test]
    fn rejects_template_without_placeholder() {
        let err = Config::from_toml(r#"document_url_template = "https://example.com/doc""#)
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn rejects_malformed_toml() {
        let err = Config::from_toml("alphabet = ").unwrap_err();
        assert!(matches!(err, Error::ConfigParse(_)));
    }

    #[test]
    fn reads_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "call_name = \"OpenDoc\"\n").unwrap();

        let cfg = Config::from_file(&path).unwrap();
        assert_eq!(cfg.call_name, "OpenDoc");

        let missing = Config::from_file(dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(missing, Error::Filesystem { .. }));
    }
}
