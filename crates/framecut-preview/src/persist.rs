//! Preview state stored as document properties.
//!
//! Four scalar properties: two comma-separated chunk lists, an integer flag
//! and an RFC 3339 timestamp of the last successful render.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PreviewError, PreviewResult};

pub const RENDERED_CHUNKS_KEY: &str = "previewchunks";
pub const DIRTY_CHUNKS_KEY: &str = "dirtypreviewchunks";
pub const ENABLED_KEY: &str = "enablepreview";
pub const DATE_KEY: &str = "previewdate";

/// Snapshot of the preview bookkeeping that outlives a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewProperties {
    pub rendered: Vec<i64>,
    pub dirty: Vec<i64>,
    pub enabled: bool,
    pub last_render: Option<DateTime<Utc>>,
}

impl PreviewProperties {
    pub fn to_document_properties(&self) -> BTreeMap<String, String> {
        let mut props = BTreeMap::new();
        props.insert(RENDERED_CHUNKS_KEY.to_owned(), format_chunk_list(&self.rendered));
        props.insert(DIRTY_CHUNKS_KEY.to_owned(), format_chunk_list(&self.dirty));
        props.insert(ENABLED_KEY.to_owned(), i32::from(self.enabled).to_string());
        let date = self.last_render.map(|d| d.to_rfc3339()).unwrap_or_default();
        props.insert(DATE_KEY.to_owned(), date);
        props
    }

    /// Read the four properties back. Missing keys mean empty lists,
    /// preview enabled, and no render date.
    pub fn from_document_properties(props: &BTreeMap<String, String>) -> PreviewResult<Self> {
        let list = |key: &str| {
            props
                .get(key)
                .map_or(Ok(Vec::new()), |value| parse_chunk_list(value))
        };
        let enabled = props
            .get(ENABLED_KEY)
            .map_or(true, |value| value.trim().parse::<i32>().map_or(true, |v| v != 0));
        let last_render = match props.get(DATE_KEY).map(|v| v.trim()) {
            None | Some("") => None,
            Some(value) => Some(
                DateTime::parse_from_rfc3339(value)
                    .map_err(|source| PreviewError::InvalidDate {
                        value: value.to_owned(),
                        source,
                    })?
                    .with_timezone(&Utc),
            ),
        };
        Ok(Self {
            rendered: list(RENDERED_CHUNKS_KEY)?,
            dirty: list(DIRTY_CHUNKS_KEY)?,
            enabled,
            last_render,
        })
    }
}

/// `"0,25,50"` for `[0, 25, 50]`.
pub fn format_chunk_list(chunks: &[i64]) -> String {
    chunks
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Parse a comma-separated frame list; empty parts are skipped.
pub fn parse_chunk_list(value: &str) -> PreviewResult<Vec<i64>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<i64>()
                .map_err(|_| PreviewError::InvalidChunkList(part.to_owned()))
        })
        .collect()
}

/// Tells whether a rendered chunk file is still usable.
pub trait ChunkProbe {
    /// Modification time of the chunk's file, `None` when it is missing.
    fn modified(&self, chunk: i64) -> Option<DateTime<Utc>>;
}

impl<F> ChunkProbe for F
where
    F: Fn(i64) -> Option<DateTime<Utc>>,
{
    fn modified(&self, chunk: i64) -> Option<DateTime<Utc>> {
        self(chunk)
    }
}

/// Probe backed by the files of a cache directory (`<dir>/<chunk>.<ext>`).
#[derive(Debug, Clone)]
pub struct CacheDirProbe {
    pub dir: PathBuf,
    pub extension: String,
}

impl CacheDirProbe {
    pub fn chunk_path(&self, chunk: i64) -> PathBuf {
        self.dir.join(format!("{chunk}.{}", self.extension))
    }
}

impl ChunkProbe for CacheDirProbe {
    fn modified(&self, chunk: i64) -> Option<DateTime<Utc>> {
        let meta = std::fs::metadata(self.chunk_path(chunk)).ok()?;
        meta.modified().ok().map(DateTime::<Utc>::from)
    }
}
