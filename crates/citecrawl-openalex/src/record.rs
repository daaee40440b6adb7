//! Work record parsing and citation edge extraction
//!
//! Raw OpenAlex Work JSON is parsed tolerantly: unknown fields are
//! ignored, missing optional fields become `None`, and only an absent
//! identifier makes a record malformed.

use rustc_hash::FxHashSet;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::abstract_decode::decode_inverted_index;

/// Short-form OpenAlex work identifier, e.g. `W2741809807`.
pub type WorkId = String;

/// Normalize an OpenAlex work reference to its short ID.
///
/// Accepts full URLs (`https://openalex.org/W123`) and bare IDs in either
/// case. Returns None when the result is not `W` followed by digits.
pub fn normalize_work_id(raw: &str) -> Option<WorkId> {
    let tail = raw.trim().rsplit('/').next()?;
    let digits = tail.strip_prefix(['W', 'w'])?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(format!("W{digits}"))
}

/// OpenAlex Work JSON structure (the subset the cascade keeps)
#[derive(Debug, Deserialize)]
pub struct WorkRecord {
    /// OpenAlex ID (e.g., "https://openalex.org/W2741809807")
    #[serde(default)]
    pub id: String,

    /// Digital Object Identifier
    #[serde(default)]
    pub doi: Option<String>,

    /// Title of the work
    #[serde(default)]
    pub title: Option<String>,

    /// Display name (usually same as title)
    #[serde(default)]
    pub display_name: Option<String>,

    /// Publication year
    #[serde(default)]
    pub publication_year: Option<i32>,

    /// Abstract as inverted index
    #[serde(default)]
    pub abstract_inverted_index: Option<Map<String, Value>>,

    /// Works this record cites, as full OpenAlex URLs
    #[serde(default)]
    pub referenced_works: Vec<String>,
}

impl WorkRecord {
    /// Decode abstract from the inverted index
    pub fn abstract_text(&self) -> Option<String> {
        self.abstract_inverted_index
            .as_ref()
            .map(decode_inverted_index)
            .filter(|s| !s.is_empty())
    }

    /// Outgoing citation list as short IDs, deduplicated in first-seen
    /// order. Unparseable references are dropped.
    pub fn cited_ids(&self) -> Vec<WorkId> {
        let mut seen = FxHashSet::default();
        let mut out = Vec::with_capacity(self.referenced_works.len());
        for raw in &self.referenced_works {
            let Some(id) = normalize_work_id(raw) else {
                log::debug!("dropping unparseable reference: {raw}");
                continue;
            };
            if seen.insert(id.clone()) {
                out.push(id);
            }
        }
        out
    }
}

/// Descriptive metadata attached to a graph node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkMeta {
    pub title: Option<String>,
    pub doi: Option<String>,
    pub publication_year: Option<i32>,
    pub abstract_text: Option<String>,
}

/// A fetched publication, ready for the graph assembler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRecord {
    pub id: WorkId,
    pub meta: WorkMeta,
    /// Outgoing citations, deduplicated, first-seen order
    pub cited: Vec<WorkId>,
}

/// Raw record without a usable identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedRecord {
    pub detail: String,
}

impl std::fmt::Display for MalformedRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "malformed record: {}", self.detail)
    }
}

impl std::error::Error for MalformedRecord {}

impl TryFrom<WorkRecord> for EntityRecord {
    type Error = MalformedRecord;

    fn try_from(raw: WorkRecord) -> Result<Self, Self::Error> {
        let id = normalize_work_id(&raw.id).ok_or_else(|| MalformedRecord {
            detail: if raw.id.is_empty() {
                "missing id".to_string()
            } else {
                format!("unparseable id {:?}", raw.id)
            },
        })?;
        let abstract_text = raw.abstract_text();
        let cited = raw.cited_ids();
        Ok(Self {
            id,
            meta: WorkMeta {
                title: raw.title.or(raw.display_name),
                doi: raw.doi,
                publication_year: raw.publication_year,
                abstract_text,
            },
            cited,
        })
    }
}
