//! Note model
//!
//! One `Document` per Markdown file in the vault. Documents are immutable once
//! loaded and shared between pipeline stages via `Arc`.

mod parser;

pub use parser::{extract_references, parse, split_metadata_block, ParsedNote, METADATA_MARKER};

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Canonical absolute path identifying a document
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocPath(PathBuf);

impl DocPath {
    /// Resolve a path on disk to its canonical form
    pub fn resolve(path: &Path) -> std::io::Result<Self> {
        path.canonicalize().map(Self)
    }

    /// Wrap a path that is already canonical
    pub fn from_canonical(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Typed note metadata from the leading YAML block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: Option<String>,

    #[serde(default, deserialize_with = "string_or_list")]
    pub aliases: Vec<String>,

    #[serde(default, deserialize_with = "string_or_list")]
    pub tags: Vec<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub author: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub created: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub source: Option<String>,
}

fn scalar_to_string(value: serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_yaml::Value>::deserialize(deserializer)?;
    Ok(value.and_then(scalar_to_string))
}

fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_yaml::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_yaml::Value::Sequence(items)) => {
            items.into_iter().filter_map(scalar_to_string).collect()
        }
        Some(other) => scalar_to_string(other).into_iter().collect(),
        None => Vec::new(),
    })
}

/// A loaded note
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Unique identifier
    pub path: DocPath,

    /// Path relative to the vault root, slash separated
    pub relative_path: String,

    /// Filename stem
    pub title: String,

    /// Full file text
    pub raw_content: String,

    /// Parsed metadata block
    pub metadata: DocumentMetadata,

    /// Byte offset of the body within `raw_content`
    body_offset: usize,

    /// Reference targets in body order
    pub outgoing_refs: Vec<String>,
}

impl Document {
    /// Load a note from disk.
    ///
    /// Returns `None` for unreadable, non-UTF-8, or unparseable files; the
    /// reason is logged.
    pub fn load(root: &Path, path: &Path) -> Option<Self> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable note");
                return None;
            }
        };

        let raw = match String::from_utf8(bytes) {
            Ok(raw) => raw,
            Err(_) => {
                tracing::warn!(path = %path.display(), "Skipping note that is not valid UTF-8");
                return None;
            }
        };

        let doc_path = match DocPath::resolve(path) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Skipping unresolvable note path");
                return None;
            }
        };

        let relative_path = doc_path
            .as_path()
            .strip_prefix(root)
            .unwrap_or(doc_path.as_path())
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let title = title_from_path(path);

        let document = Self::from_parts(doc_path, relative_path, title, raw);
        if document.is_none() {
            tracing::warn!(path = %path.display(), "Skipping note with malformed metadata block");
        }
        document
    }

    /// Build a document from already-read text
    pub fn from_parts(
        path: DocPath,
        relative_path: String,
        title: String,
        raw_content: String,
    ) -> Option<Self> {
        let (metadata, body_offset, outgoing_refs) = {
            let parsed = parse(&raw_content)?;
            let offset = raw_content.len() - parsed.body.len();
            (parsed.metadata, offset, parsed.references)
        };

        Some(Self {
            path,
            relative_path,
            title,
            raw_content,
            metadata,
            body_offset,
            outgoing_refs,
        })
    }

    /// Content with the metadata block stripped
    pub fn body(&self) -> &str {
        &self.raw_content[self.body_offset..]
    }

    /// Count of non-whitespace characters in the body
    pub fn body_weight(&self) -> usize {
        self.body().chars().filter(|c| !c.is_whitespace()).count()
    }
}

/// Derive a note title from its filename stem
pub fn title_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Truncate to at most `max_chars` characters on a char boundary.
///
/// Returns the kept prefix and whether anything was cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => (&text[..idx], true),
        None => (text, false),
    }
}

/// Marker appended to excerpts that were cut
pub const TRUNCATION_MARKER: &str = "\n…[truncated]";
