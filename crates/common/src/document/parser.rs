//! Note parsing
//!
//! Pure functions with no filesystem access:
//! - Metadata block detection and stripping
//! - Typed metadata extraction
//! - Wikilink reference extraction

use super::DocumentMetadata;
use regex_lite::Regex;
use std::sync::OnceLock;

/// Marker line opening and closing a metadata block
pub const METADATA_MARKER: &str = "---";

/// Alternative closing marker accepted by YAML
const METADATA_END_ALT: &str = "...";

/// Result of parsing raw note text
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedNote<'a> {
    /// Typed metadata (default when the note has no block)
    pub metadata: DocumentMetadata,

    /// Content after the metadata block; a suffix of the raw text
    pub body: &'a str,

    /// Reference targets in body order
    pub references: Vec<String>,
}

/// Parse raw note text into metadata, body and references.
///
/// Returns `None` only when a closed metadata block is present but is not
/// valid metadata. An opening marker that is never closed is treated as
/// ordinary body text.
pub fn parse(raw: &str) -> Option<ParsedNote<'_>> {
    let (metadata, body) = match split_metadata_block(raw) {
        Some((block, body)) => (parse_metadata(block)?, body),
        None => (DocumentMetadata::default(), raw),
    };

    Some(ParsedNote {
        metadata,
        body,
        references: extract_references(body),
    })
}

/// Locate a leading metadata block.
///
/// Returns `(block, body)` where `block` is the text between the markers and
/// `body` is everything after the closing marker line.
pub fn split_metadata_block(raw: &str) -> Option<(&str, &str)> {
    let content = raw.strip_prefix('\u{feff}').unwrap_or(raw);

    let first_end = content.find('\n')?;
    if content[..first_end].trim_end() != METADATA_MARKER {
        return None;
    }

    let block_start = first_end + 1;
    let mut offset = block_start;

    for line in content[block_start..].split_inclusive('\n') {
        let trimmed = line.trim_end();
        if trimmed == METADATA_MARKER || trimmed == METADATA_END_ALT {
            let block = &content[block_start..offset];
            let body = &content[offset + line.len()..];
            return Some((block, body));
        }
        offset += line.len();
    }

    None
}

/// Parse the metadata block into typed fields
fn parse_metadata(block: &str) -> Option<DocumentMetadata> {
    if block.trim().is_empty() {
        return Some(DocumentMetadata::default());
    }

    match serde_yaml::from_str::<DocumentMetadata>(block) {
        Ok(metadata) => Some(metadata),
        Err(e) => {
            tracing::debug!(error = %e, "Unparseable metadata block");
            None
        }
    }
}

fn wikilink_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\[\[([^\[\]]+)\]\]").expect("wikilink pattern is valid")
    })
}

/// Extract reference targets from `[[Target]]` and `[[Target|Alias]]`.
///
/// Aliases and `#heading` suffixes are discarded; empty targets are skipped.
/// Duplicates are kept so callers see every occurrence in order.
pub fn extract_references(body: &str) -> Vec<String> {
    wikilink_pattern()
        .captures_iter(body)
        .filter_map(|cap| {
            let inner = cap.get(1)?.as_str();
            let target = inner.split('|').next()?;
            let target = target.split('#').next()?.trim();
            if target.is_empty() {
                None
            } else {
                Some(target.to_string())
            }
        })
        .collect()
}
