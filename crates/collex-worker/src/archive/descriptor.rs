//! Package schema descriptor
//!
//! `structure.xml` enumerates every table that actually received rows, the
//! core table first. Consumers join extension tables back to the core table
//! through the advertised join column, so the core entry names `record_id`
//! and every extension entry names its `core_id` foreign key. A package can
//! carry extensions without a core table: suppressing an all-blank core row
//! keeps its extension rows, which still advertise the synthesized core id.

use chrono::Utc;
use collex_common::{EntityKind, ExportError, Result};
use serde::Serialize;

/// Descriptor input for one populated table
#[derive(Debug, Clone)]
pub struct DescriptorTable {
    pub kind: EntityKind,
    pub file: String,
    pub columns: Vec<String>,
    pub rows: u64,
}

#[derive(Serialize)]
#[serde(rename = "archive")]
struct ArchiveXml {
    #[serde(rename = "@xmlns")]
    xmlns: &'static str,
    #[serde(rename = "@generated")]
    generated: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    core: Option<TableXml>,
    #[serde(rename = "extension")]
    extensions: Vec<TableXml>,
}

#[derive(Serialize)]
struct TableXml {
    #[serde(rename = "@kind")]
    kind: String,
    #[serde(rename = "@file")]
    file: String,
    /// Core: its identifier column. Extensions: the foreign key joining
    /// back to the core table.
    #[serde(rename = "@joinColumn")]
    join_column: String,
    #[serde(rename = "@rows")]
    rows: u64,
    #[serde(rename = "column")]
    columns: Vec<ColumnXml>,
}

#[derive(Serialize)]
struct ColumnXml {
    #[serde(rename = "@index")]
    index: usize,
    #[serde(rename = "@name")]
    name: String,
}

fn table_xml(table: &DescriptorTable) -> TableXml {
    TableXml {
        kind: table.kind.to_string(),
        file: table.file.clone(),
        join_column: table
            .columns
            .first()
            .cloned()
            .unwrap_or_default(),
        rows: table.rows,
        columns: table
            .columns
            .iter()
            .enumerate()
            .map(|(index, name)| ColumnXml {
                index,
                name: name.clone(),
            })
            .collect(),
    }
}

/// Render the descriptor for the populated tables
///
/// `tables` must already be in drain order; kinds that received no rows
/// must not be passed in. The core entry is omitted when no core row
/// survived suppression.
pub fn render_descriptor(tables: &[DescriptorTable]) -> Result<String> {
    let (core, extensions): (Vec<&DescriptorTable>, Vec<&DescriptorTable>) =
        tables.iter().partition(|t| t.kind.is_core());

    let document = ArchiveXml {
        xmlns: "http://collex.io/terms/structure",
        generated: Utc::now().to_rfc3339(),
        core: core.first().map(|t| table_xml(t)),
        extensions: extensions.iter().map(|t| table_xml(t)).collect(),
    };

    let body = quick_xml::se::to_string(&document)
        .map_err(|e| ExportError::Archive(format!("descriptor serialization failed: {}", e)))?;
    Ok(format!("{}\n{}", r#"<?xml version="1.0" encoding="UTF-8"?>"#, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(kind: EntityKind, rows: u64) -> DescriptorTable {
        let columns: Vec<String> = crate::mapping::catalog::columns(kind)
            .iter()
            .map(|c| c.to_string())
            .collect();
        DescriptorTable {
            kind,
            file: format!("{}.csv", kind.table_name()),
            columns,
            rows,
        }
    }

    #[test]
    fn test_descriptor_lists_only_given_tables() {
        let xml = render_descriptor(&[
            table(EntityKind::Occurrence, 3),
            table(EntityKind::Event, 2),
        ])
        .unwrap();

        assert!(xml.contains(r#"<core kind="occurrence" file="occurrence.csv""#));
        assert!(xml.contains(r#"<extension kind="event""#));
        assert!(!xml.contains("agent"));
        assert!(!xml.contains("media"));
    }

    #[test]
    fn test_core_advertises_record_id_join_column() {
        let xml = render_descriptor(&[
            table(EntityKind::Occurrence, 1),
            table(EntityKind::Agent, 1),
        ])
        .unwrap();

        assert!(xml.contains(r#"joinColumn="record_id""#));
        assert!(xml.contains(r#"joinColumn="core_id""#));
        assert!(xml.contains(r#"<column index="0" name="record_id"/>"#));
    }

    #[test]
    fn test_extensions_without_core_omit_the_core_entry() {
        let xml = render_descriptor(&[table(EntityKind::Event, 1)]).unwrap();

        assert!(!xml.contains("<core"));
        assert!(xml.contains(r#"<extension kind="event""#));
    }
}
