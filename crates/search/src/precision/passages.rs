//! Passage extraction
//!
//! Splits a note body into paragraph-sized passages, each addressable by
//! note path and the nearest preceding sub-heading.

use noteforge_common::config::PrecisionConfig;
use noteforge_common::document::{truncate_chars, Document, TRUNCATION_MARKER};
use std::sync::Arc;

/// Passage extraction limits
#[derive(Debug, Clone)]
pub struct PassageConfig {
    /// Characters kept per passage
    pub max_chars: usize,

    /// Blocks shorter than this (trimmed) are dropped
    pub min_chars: usize,
}

impl Default for PassageConfig {
    fn default() -> Self {
        Self::from(&PrecisionConfig::default())
    }
}

impl From<&PrecisionConfig> for PassageConfig {
    fn from(config: &PrecisionConfig) -> Self {
        Self {
            max_chars: config.per_passage_chars,
            min_chars: config.min_passage_chars,
        }
    }
}

/// A paragraph-sized piece of a note
#[derive(Debug, Clone)]
pub struct Passage {
    pub source: Arc<Document>,
    pub section_header: Option<String>,
    pub text: String,
}

impl Passage {
    /// `relative/path.md § Section`, or just the path outside any section
    pub fn citation(&self) -> String {
        match &self.section_header {
            Some(header) => format!("{} § {}", self.source.relative_path, header),
            None => self.source.relative_path.clone(),
        }
    }
}

/// Heading text for `## ` through `###### ` lines
fn sub_heading(line: &str) -> Option<&str> {
    let hashes = line.bytes().take_while(|&b| b == b'#').count();
    if !(2..=6).contains(&hashes) {
        return None;
    }
    line[hashes..].strip_prefix(' ').map(str::trim)
}

/// Split a document body into passages, in document order
pub fn extract_passages(doc: &Arc<Document>, config: &PassageConfig) -> Vec<Passage> {
    let mut passages = Vec::new();
    let mut header: Option<String> = None;
    let mut block: Vec<&str> = Vec::new();

    let mut flush = |block: &mut Vec<&str>, header: &Option<String>| {
        if block.is_empty() {
            return;
        }
        let joined = block.join("\n");
        block.clear();

        let trimmed = joined.trim();
        if trimmed.chars().count() < config.min_chars {
            return;
        }

        let (kept, cut) = truncate_chars(trimmed, config.max_chars);
        let mut text = kept.to_string();
        if cut {
            text.push_str(TRUNCATION_MARKER);
        }

        passages.push(Passage {
            source: Arc::clone(doc),
            section_header: header.clone(),
            text,
        });
    };

    for line in doc.body().lines() {
        if let Some(heading) = sub_heading(line) {
            flush(&mut block, &header);
            header = (!heading.is_empty()).then(|| heading.to_string());
        } else if line.trim().is_empty() {
            flush(&mut block, &header);
        } else {
            block.push(line);
        }
    }
    flush(&mut block, &header);

    passages
}

#[cfg(test)]
mod tests {
    use super::*;
    use noteforge_common::document::DocPath;
    use std::path::PathBuf;

    fn doc(body: &str) -> Arc<Document> {
        Arc::new(
            Document::from_parts(
                DocPath::from_canonical(PathBuf::from("/vault/topics/Rust.md")),
                "topics/Rust.md".to_string(),
                "Rust".to_string(),
                body.to_string(),
            )
            .unwrap(),
        )
    }

    fn config() -> PassageConfig {
        PassageConfig {
            max_chars: 800,
            min_chars: 20,
        }
    }

    #[test]
    fn test_split_on_blank_lines_and_headings() {
        let doc = doc(
            "Intro paragraph about the language itself.\n\n\
             ## Ownership\n\
             Every value has exactly one owner at a time.\n\
             Moves transfer that ownership.\n\n\
             Borrowing lends access without moving anything.\n\
             ### Lifetimes\n\
             Lifetimes bound how long a reference is valid.\n",
        );

        let passages = extract_passages(&doc, &config());
        assert_eq!(passages.len(), 4);

        assert_eq!(passages[0].section_header, None);
        assert_eq!(passages[0].citation(), "topics/Rust.md");

        assert_eq!(passages[1].section_header.as_deref(), Some("Ownership"));
        assert!(passages[1].text.contains("Moves transfer"));
        assert_eq!(passages[2].section_header.as_deref(), Some("Ownership"));

        assert_eq!(passages[3].citation(), "topics/Rust.md § Lifetimes");
    }

    #[test]
    fn test_short_blocks_and_heading_lines_dropped() {
        let doc = doc("## Tiny\nshort\n\n# Top level heading counts as text here\n");
        let passages = extract_passages(&doc, &config());
        assert_eq!(passages.len(), 1);
        assert!(passages[0].text.starts_with("# Top level"));
        assert_eq!(passages[0].section_header.as_deref(), Some("Tiny"));
    }

    #[test]
    fn test_long_passage_truncated() {
        let doc = doc(&"ünïcödé ".repeat(50));
        let passages = extract_passages(
            &doc,
            &PassageConfig {
                max_chars: 30,
                min_chars: 20,
            },
        );
        assert_eq!(passages.len(), 1);
        assert!(passages[0].text.ends_with(TRUNCATION_MARKER));
        assert_eq!(
            passages[0].text.chars().count(),
            30 + TRUNCATION_MARKER.chars().count()
        );
    }

    #[test]
    fn test_sub_heading_detection() {
        assert_eq!(sub_heading("## Title"), Some("Title"));
        assert_eq!(sub_heading("###### Deep "), Some("Deep"));
        assert_eq!(sub_heading("# Top"), None);
        assert_eq!(sub_heading("####### Seven"), None);
        assert_eq!(sub_heading("##NoSpace"), None);
    }

    #[test]
    fn test_metadata_block_not_extracted() {
        let doc = doc("---\ntags: [rust]\n---\nA body paragraph that is long enough.\n");
        let passages = extract_passages(&doc, &config());
        assert_eq!(passages.len(), 1);
        assert!(!passages[0].text.contains("tags"));
    }
}
