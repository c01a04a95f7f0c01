//! Observation type definitions.
//!
//! Defines [`ObservationType`] (the label attached to each observation),
//! [`Observation`] (a stored record), [`NewObservation`] (insert parameters)
//! and [`Session`].

use serde::{Deserialize, Serialize};

/// What kind of event an observation records.
///
/// The built-in labels are a closed set, but ingestion pipelines may attach
/// their own; those round-trip through [`ObservationType::Other`]. The label is
/// used for display and filtering only, never for ranking.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ObservationType {
    Decision,
    Bugfix,
    Feature,
    Refactor,
    Discovery,
    Change,
    Other(String),
}

impl ObservationType {
    /// SQL-compatible string representation.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Decision => "decision",
            Self::Bugfix => "bugfix",
            Self::Feature => "feature",
            Self::Refactor => "refactor",
            Self::Discovery => "discovery",
            Self::Change => "change",
            Self::Other(label) => label,
        }
    }

    /// The labels offered to interactive users.
    pub const BUILTIN: [&'static str; 6] = [
        "decision",
        "bugfix",
        "feature",
        "refactor",
        "discovery",
        "change",
    ];
}

impl std::fmt::Display for ObservationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for ObservationType {
    fn from(s: &str) -> Self {
        match s {
            "decision" => Self::Decision,
            "bugfix" => Self::Bugfix,
            "feature" => Self::Feature,
            "refactor" => Self::Refactor,
            "discovery" => Self::Discovery,
            "change" => Self::Change,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for ObservationType {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<ObservationType> for String {
    fn from(t: ObservationType) -> Self {
        t.as_str().to_string()
    }
}

/// An observation record, matching the `observations` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    /// Monotonic row id, never reused after deletion.
    pub id: i64,
    pub session_id: String,
    #[serde(rename = "type")]
    pub obs_type: ObservationType,
    /// Original text, immutable once written.
    pub content: String,
    /// Shortened variant of `content`, indexed alongside it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compressed: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub file_refs: Vec<String>,
    /// Absolute path of the originating project.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_path: Option<String>,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
    /// Whitespace word count of `content`.
    pub token_count: i64,
}

impl Observation {
    /// The text shown to users: `content`, or `compressed` if content is blank.
    pub fn display_text(&self) -> &str {
        display_text(&self.content, self.compressed.as_deref())
    }
}

fn display_text<'a>(content: &'a str, compressed: Option<&'a str>) -> &'a str {
    match compressed {
        Some(compressed) if content.trim().is_empty() => compressed,
        _ => content,
    }
}

/// Parameters for [`super::store::ObservationStore::insert`].
#[derive(Debug, Clone)]
pub struct NewObservation {
    pub session_id: String,
    pub obs_type: ObservationType,
    pub content: String,
    pub project_path: Option<String>,
    pub compressed: Option<String>,
    pub file_refs: Vec<String>,
}

impl NewObservation {
    pub fn new(
        session_id: impl Into<String>,
        obs_type: impl Into<ObservationType>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            obs_type: obs_type.into(),
            content: content.into(),
            project_path: None,
            compressed: None,
            file_refs: Vec::new(),
        }
    }

    pub fn with_project(mut self, project_path: impl Into<String>) -> Self {
        self.project_path = Some(project_path.into());
        self
    }

    pub fn with_compressed(mut self, compressed: impl Into<String>) -> Self {
        self.compressed = Some(compressed.into());
        self
    }

    pub fn with_file_refs(mut self, file_refs: Vec<String>) -> Self {
        self.file_refs = file_refs;
        self
    }

    /// Text the observation will display once stored; see
    /// [`Observation::display_text`].
    pub fn display_text(&self) -> &str {
        display_text(&self.content, self.compressed.as_deref())
    }

    /// Rough size measure used for display.
    pub fn token_count(&self) -> i64 {
        self.content.split_whitespace().count() as i64
    }
}

/// A working session that groups observations.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: String,
    pub started_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}
