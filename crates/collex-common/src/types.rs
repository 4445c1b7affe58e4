//! Shared domain types for the export pipeline

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One search filter condition
///
/// Conditions are combined as a conjunction. A present `value` means
/// case-insensitive equality on `field`; `None` means the field must be
/// absent from the record (negated existence filter).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParam {
    pub field: String,
    pub value: Option<String>,
}

impl SearchParam {
    pub fn equals(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: Some(value.into()),
        }
    }

    pub fn absent(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: None,
        }
    }
}

/// How the produced rows are packaged for download
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Single CSV of the core kind, no descriptor
    Flat,
    /// Zipped multi-table archive with a schema descriptor, written directly
    PackagedArchive,
    /// Zipped multi-table archive drained out of the staging store,
    /// including kinds that need a second resolution pass
    StagedRelational,
}

impl std::str::FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "flat" | "csv" => Ok(OutputMode::Flat),
            "archive" | "packaged" => Ok(OutputMode::PackagedArchive),
            "relational" | "staged" => Ok(OutputMode::StagedRelational),
            _ => Err(format!("Invalid output mode: {}", s)),
        }
    }
}

/// Output entity kinds
///
/// `Occurrence` is the core kind; every other kind is an extension whose
/// rows carry the core row's identifier as a foreign key. `Media` records
/// are not embedded in the source documents and require a second retrieval
/// pass keyed by the ids collected from relationships.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Occurrence,
    Event,
    Agent,
    Relationship,
    Media,
}

impl EntityKind {
    /// Drain and descriptor order: core first, then extensions.
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Occurrence,
        EntityKind::Event,
        EntityKind::Agent,
        EntityKind::Relationship,
        EntityKind::Media,
    ];

    /// The core kind other kinds join back to
    pub const CORE: EntityKind = EntityKind::Occurrence;

    pub fn is_core(self) -> bool {
        self == Self::CORE
    }

    /// Table/file base name inside the package
    pub fn table_name(self) -> &'static str {
        match self {
            EntityKind::Occurrence => "occurrence",
            EntityKind::Event => "event",
            EntityKind::Agent => "agent",
            EntityKind::Relationship => "relationship",
            EntityKind::Media => "media",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table_name())
    }
}

/// One row destined for a single entity kind's table
///
/// `fields` is ordered; the archive writer takes the first row's field
/// names as the table header, so the mapper must emit every row of a kind
/// with the same columns in the same order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRow {
    /// Row identity: the natural id, or a synthesized content hash
    pub id: String,
    /// Ordered (column name, value) pairs; empty string marks an absent value
    pub fields: Vec<(String, String)>,
}

impl OutputRow {
    pub fn new(id: impl Into<String>, fields: Vec<(String, String)>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.fields.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn values(&self) -> Vec<&str> {
        self.fields.iter().map(|(_, value)| value.as_str()).collect()
    }
}

/// An immutable export job description, created once at process start
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportJob {
    pub job_id: Uuid,
    pub search_params: Vec<SearchParam>,
    /// Source record kind to query in the search backend
    pub target_kind: String,
    pub mode: OutputMode,
    /// Set when the job is derived from an upstream source system; the
    /// package then embeds that system's metadata document.
    pub source_system_id: Option<String>,
}

impl ExportJob {
    pub fn is_source_system_job(&self) -> bool {
        self.source_system_id.is_some()
    }
}

/// Job lifecycle states reported to the job-tracking service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Running,
    Failed,
}

impl JobState {
    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Running => "running",
            JobState::Failed => "failed",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_output_mode_from_str() {
        assert_eq!("flat".parse::<OutputMode>().unwrap(), OutputMode::Flat);
        assert_eq!(
            "ARCHIVE".parse::<OutputMode>().unwrap(),
            OutputMode::PackagedArchive
        );
        assert_eq!(
            "relational".parse::<OutputMode>().unwrap(),
            OutputMode::StagedRelational
        );
        assert!("parquet".parse::<OutputMode>().is_err());
    }

    #[test]
    fn test_core_kind_is_first_in_drain_order() {
        assert_eq!(EntityKind::ALL[0], EntityKind::CORE);
        assert!(EntityKind::Occurrence.is_core());
        assert!(!EntityKind::Media.is_core());
    }

    #[test]
    fn test_search_param_constructors() {
        let eq = SearchParam::equals("country", "Estonia");
        assert_eq!(eq.value.as_deref(), Some("Estonia"));

        let absent = SearchParam::absent("media_url");
        assert_eq!(absent.field, "media_url");
        assert!(absent.value.is_none());
    }

    #[test]
    fn test_output_row_accessors() {
        let row = OutputRow::new(
            "X1",
            vec![
                ("record_id".to_string(), "X1".to_string()),
                ("locality".to_string(), "Tartu".to_string()),
            ],
        );
        assert_eq!(row.column_names(), vec!["record_id", "locality"]);
        assert_eq!(row.values(), vec!["X1", "Tartu"]);
    }
}
