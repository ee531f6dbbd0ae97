use regex::Regex;
use scraper::{Html, Selector};

use crate::{Error, Result};

/// Pulls document identifiers out of page markup.
///
/// Results come in source order and may contain duplicates; deduplication is
/// left to [`crate::dedupe::dedupe`]. No match is not an error.
pub trait IdentifierExtractor: Send + Sync {
    fn extract(&self, markup: &str) -> Vec<String>;
}

/// Matches `NAME(NUMBER)` anywhere in the text and captures `NUMBER`.
#[derive(Debug, Clone)]
pub struct CallPatternExtractor {
    pattern: Regex,
}

impl CallPatternExtractor {
    pub fn new(call_name: &str) -> Result<Self> {
        let pattern = Regex::new(&format!(r"{}\((\d+)\)", regex::escape(call_name)))?;
        Ok(Self { pattern })
    }

    fn captures_into(&self, text: &str, ids: &mut Vec<String>) {
        ids.extend(
            self.pattern
                .captures_iter(text)
                .filter_map(|caps| caps.get(1))
                .map(|m| m.as_str().to_string()),
        );
    }
}

impl IdentifierExtractor for CallPatternExtractor {
    fn extract(&self, markup: &str) -> Vec<String> {
        let mut ids = Vec::new();
        self.captures_into(markup, &mut ids);
        ids
    }
}

/// Like [`CallPatternExtractor`] but only looks inside `href` and `onclick`
/// attribute values, so calls mentioned in text or inline scripts are ignored.
#[derive(Debug, Clone)]
pub struct AttributeExtractor {
    calls: CallPatternExtractor,
    selector: Selector,
}

const LINK_ATTRIBUTES: [&str; 2] = ["href", "onclick"];

impl AttributeExtractor {
    pub fn new(call_name: &str) -> Result<Self> {
        Ok(Self {
            calls: CallPatternExtractor::new(call_name)?,
            selector: create_selector("[href], [onclick]")?,
        })
    }
}

impl IdentifierExtractor for AttributeExtractor {
    fn extract(&self, markup: &str) -> Vec<String> {
        let doc = Html::parse_document(markup);

        let mut ids = Vec::new();
        for element in doc.select(&self.selector) {
            for attr in LINK_ATTRIBUTES {
                if let Some(value) = element.value().attr(attr) {
                    self.calls.captures_into(value, &mut ids);
                }
            }
        }
        ids
    }
}

#[inline]
fn create_selector(sel_str: &str) -> Result<Selector> {
    Selector::parse(sel_str).map_err(|e| Error::Config(format!("bad selector {sel_str}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
        <table>
          <tr><td><a href="javascript:apci.LoadPDF(123);">Argon</a></td></tr>
          <tr><td><a href="javascript:apci.LoadPDF(456);">Helium</a></td></tr>
          <tr><td><a href="javascript:apci.LoadPDF(456);">Helium (EU)</a></td></tr>
        </table>
    "#;

    #[test]
    fn extracts_in_source_order_with_duplicates() {
        let extractor = CallPatternExtractor::new("LoadPDF").unwrap();
        assert_eq!(extractor.extract(LISTING), vec!["123", "456", "456"]);
    }

    #[test]
    fn no_matches_yield_empty_vec() {
        let extractor = CallPatternExtractor::new("LoadPDF").unwrap();
        assert!(extractor.extract("").is_empty());
        assert!(extractor.extract("<p>nothing to see</p>").is_empty());
    }

    #[test]
    fn ignores_non_numeric_and_other_calls() {
        let extractor = CallPatternExtractor::new("LoadPDF").unwrap();
        let markup = "LoadPDF(abc) LoadPDF() LoadDoc(9) LoadPDF( 5 ) LoadPDF(0042)";
        assert_eq!(extractor.extract(markup), vec!["0042"]);
    }

    #[test]
    fn call_name_is_matched_literally() {
        let extractor = CallPatternExtractor::new("apci.Load").unwrap();
        assert_eq!(extractor.extract("apci.Load(1) apciXLoad(2)"), vec!["1"]);
    }

    #[test]
    fn handles_large_input() {
        let extractor = CallPatternExtractor::new("LoadPDF").unwrap();
        let markup: String = (0..10_000).map(|i| format!("<a>LoadPDF({i})</a>")).collect();
        let ids = extractor.extract(&markup);
        assert_eq!(ids.len(), 10_000);
        assert_eq!(ids.first().map(String::as_str), Some("0"));
        assert_eq!(ids.last().map(String::as_str), Some("9999"));
    }

    #[test]
    fn attribute_extractor_only_reads_link_attributes() {
        let extractor = AttributeExtractor::new("LoadPDF").unwrap();
        let markup = r#"
            <html><body>
              <p>Call LoadPDF(1) to open the sheet.</p>
              <script>apci.LoadPDF(2);</script>
              <a href="javascript:apci.LoadPDF(3);">A</a>
              <button onclick="apci.LoadPDF(4)">B</button>
              <a href="/other">C</a>
            </body></html>
        "#;
        assert_eq!(extractor.extract(markup), vec!["3", "4"]);
    }

    #[test]
    fn attribute_extractor_matches_pattern_extractor_on_listing() {
        let by_attr = AttributeExtractor::new("LoadPDF").unwrap();
        assert_eq!(by_attr.extract(LISTING), vec!["123", "456", "456"]);
    }
}
