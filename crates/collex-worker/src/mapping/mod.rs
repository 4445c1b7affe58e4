//! Entity fan-out mapping
//!
//! Turns one retrieved record into rows across the output entity kinds: one
//! core occurrence row plus extension rows per related substructure. Three
//! policies apply to every row:
//!
//! - rows whose business fields are all blank are suppressed entirely;
//! - rows without a natural identifier get a deterministic content hash id;
//! - extension rows always carry the core row's identifier, synthesized or
//!   not.
//!
//! Media is the exception to single-pass mapping: relationships only carry
//! the media id, and the media records themselves are bulk-fetched in a
//! second pass and mapped with [`EntityFanOutMapper::map_media`].

pub mod catalog;

use crate::search::{RawAgent, RawEvent, RawMedia, RawRecord, RawRelationship};
use collex_common::hash::content_id;
use collex_common::{EntityKind, OutputRow};
use std::collections::BTreeMap;

/// Rows produced from one source record, grouped by kind
pub type FanOut = BTreeMap<EntityKind, Vec<OutputRow>>;

/// Stateless record-to-rows mapper
pub struct EntityFanOutMapper;

impl EntityFanOutMapper {
    pub fn new() -> Self {
        Self
    }

    /// Map one record into rows across all directly mappable kinds
    ///
    /// Kinds that produced no rows are absent from the result. Media rows
    /// are never produced here; see [`EntityFanOutMapper::map_media`].
    pub fn map(&self, record: &RawRecord) -> FanOut {
        let core_id = &record.id;
        let mut out = FanOut::new();

        if let Some(row) = self.map_core(record) {
            out.insert(EntityKind::Occurrence, vec![row]);
        }

        let events: Vec<OutputRow> = record
            .events
            .iter()
            .filter_map(|e| self.map_event(e, core_id))
            .collect();
        if !events.is_empty() {
            out.insert(EntityKind::Event, events);
        }

        let agents: Vec<OutputRow> = record
            .agents
            .iter()
            .filter_map(|a| self.map_agent(a, core_id))
            .collect();
        if !agents.is_empty() {
            out.insert(EntityKind::Agent, agents);
        }

        let relationships: Vec<OutputRow> = record
            .relationships
            .iter()
            .filter_map(|r| self.map_relationship(r, core_id))
            .collect();
        if !relationships.is_empty() {
            out.insert(EntityKind::Relationship, relationships);
        }

        out
    }

    /// Map one bulk-fetched media record back onto its core row
    ///
    /// A media row is a core-to-media link, and several core rows may
    /// reference the same media record. Its identity is therefore a content
    /// hash over the pair, not the media's own id, so staging dedupe keeps
    /// one row per link rather than one per media record.
    pub fn map_media(&self, media: &RawMedia, core_id: &str) -> Option<OutputRow> {
        let business = [
            opt(&media.access_uri),
            opt(&media.format),
            opt(&media.license),
            opt(&media.creator),
        ];
        if all_blank(&business) {
            return None;
        }

        let id = content_id(&[core_id, media.id.as_str()]);
        let mut fields = Vec::with_capacity(business.len() + 2);
        fields.push((catalog::FOREIGN_KEY_COLUMN.to_string(), core_id.to_string()));
        fields.push(("media_id".to_string(), media.id.clone()));
        for (column, value) in [
            ("access_uri", &business[0]),
            ("format", &business[1]),
            ("license", &business[2]),
            ("creator", &business[3]),
        ] {
            fields.push((column.to_string(), value.clone()));
        }
        Some(OutputRow::new(id, fields))
    }

    fn map_core(&self, record: &RawRecord) -> Option<OutputRow> {
        let values: Vec<String> = catalog::CORE_ATTRIBUTES
            .iter()
            .map(|(source, _)| attr(record, source))
            .collect();
        if all_blank(&values) {
            return None;
        }

        let mut fields = Vec::with_capacity(values.len() + 1);
        fields.push((catalog::CORE_ID_COLUMN.to_string(), record.id.clone()));
        for ((_, column), value) in catalog::CORE_ATTRIBUTES.iter().zip(values) {
            fields.push((column.to_string(), value));
        }
        Some(OutputRow::new(record.id.clone(), fields))
    }

    fn map_event(&self, event: &RawEvent, core_id: &str) -> Option<OutputRow> {
        let business = [
            opt(&event.event_type),
            opt(&event.date),
            opt(&event.locality),
            opt(&event.country),
        ];
        if all_blank(&business) {
            return None;
        }

        Some(extension_row(
            core_id,
            event.id.as_deref(),
            "event_id",
            &[
                ("event_type", business[0].clone()),
                ("event_date", business[1].clone()),
                ("locality", business[2].clone()),
                ("country", business[3].clone()),
            ],
        ))
    }

    fn map_agent(&self, agent: &RawAgent, core_id: &str) -> Option<OutputRow> {
        let business = [opt(&agent.name), opt(&agent.role)];
        if all_blank(&business) {
            return None;
        }

        Some(extension_row(
            core_id,
            agent.id.as_deref(),
            "agent_id",
            &[
                ("agent_name", business[0].clone()),
                ("agent_role", business[1].clone()),
            ],
        ))
    }

    fn map_relationship(&self, rel: &RawRelationship, core_id: &str) -> Option<OutputRow> {
        let business = [opt(&rel.relationship_type), opt(&rel.related_id)];
        if all_blank(&business) {
            return None;
        }

        Some(extension_row(
            core_id,
            rel.id.as_deref(),
            "relationship_id",
            &[
                ("relationship_type", business[0].clone()),
                ("related_id", business[1].clone()),
            ],
        ))
    }
}

impl Default for EntityFanOutMapper {
    fn default() -> Self {
        Self::new()
    }
}

/// Build an extension row: foreign key first, then the row's own id column,
/// then the business columns. A blank natural id falls back to a content
/// hash over the foreign key and business values.
fn extension_row(
    core_id: &str,
    natural_id: Option<&str>,
    id_column: &str,
    business: &[(&str, String)],
) -> OutputRow {
    let id = match natural_id {
        Some(id) if !id.trim().is_empty() => id.to_string(),
        _ => {
            let mut hashed: Vec<&str> = vec![core_id];
            hashed.extend(business.iter().map(|(_, v)| v.as_str()));
            content_id(&hashed)
        },
    };

    let mut fields = Vec::with_capacity(business.len() + 2);
    fields.push((catalog::FOREIGN_KEY_COLUMN.to_string(), core_id.to_string()));
    fields.push((id_column.to_string(), id.clone()));
    for (column, value) in business {
        fields.push((column.to_string(), value.clone()));
    }
    OutputRow::new(id, fields)
}

fn attr(record: &RawRecord, key: &str) -> String {
    match record.attributes.get(key) {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn opt(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn all_blank<S: AsRef<str>>(values: &[S]) -> bool {
    values.iter().all(|v| v.as_ref().trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn record(id: &str) -> RawRecord {
        RawRecord {
            id: id.to_string(),
            attributes: BTreeMap::from([(
                "scientificName".to_string(),
                serde_json::Value::String("Bufo bufo".to_string()),
            )]),
            events: Vec::new(),
            agents: Vec::new(),
            relationships: Vec::new(),
        }
    }

    #[test]
    fn test_core_row_carries_record_id_first() {
        let mapper = EntityFanOutMapper::new();
        let out = mapper.map(&record("X1"));
        let core = &out[&EntityKind::Occurrence][0];
        assert_eq!(core.id, "X1");
        assert_eq!(core.fields[0], ("record_id".to_string(), "X1".to_string()));
        assert_eq!(
            core.column_names(),
            catalog::columns(EntityKind::Occurrence)
        );
    }

    #[test]
    fn test_all_blank_core_row_is_suppressed() {
        let mapper = EntityFanOutMapper::new();
        let mut rec = record("X1");
        rec.attributes.clear();
        rec.agents.push(RawAgent {
            id: None,
            name: Some("Liis Kask".to_string()),
            role: Some("collector".to_string()),
        });

        let out = mapper.map(&rec);
        // Core suppressed, but the agent still fans out with the FK intact
        assert!(!out.contains_key(&EntityKind::Occurrence));
        assert_eq!(out[&EntityKind::Agent][0].fields[0].1, "X1");
    }

    #[test]
    fn test_all_blank_extension_row_is_suppressed() {
        let mapper = EntityFanOutMapper::new();
        let mut rec = record("X1");
        rec.events.push(RawEvent {
            id: Some("E9".to_string()),
            event_type: None,
            date: Some("  ".to_string()),
            locality: None,
            country: None,
        });

        let out = mapper.map(&rec);
        // An id alone does not make the row worth emitting
        assert!(!out.contains_key(&EntityKind::Event));
    }

    #[test]
    fn test_synthesized_extension_id_is_deterministic_and_linked() {
        let mapper = EntityFanOutMapper::new();
        let mut rec = record("X1");
        rec.events.push(RawEvent {
            id: None,
            event_type: Some("collection".to_string()),
            date: Some("1998-07-14".to_string()),
            locality: Some("Matsalu".to_string()),
            country: Some("EE".to_string()),
        });

        let first = mapper.map(&rec);
        let second = mapper.map(&rec);
        let row_a = &first[&EntityKind::Event][0];
        let row_b = &second[&EntityKind::Event][0];

        assert_eq!(row_a.id, row_b.id);
        assert!(collex_common::hash::is_synthesized(&row_a.id));
        assert_eq!(row_a.fields[0], ("core_id".to_string(), "X1".to_string()));
        assert_eq!(row_a.fields[1].1, row_a.id);
    }

    #[test]
    fn test_natural_extension_id_is_kept() {
        let mapper = EntityFanOutMapper::new();
        let mut rec = record("X1");
        rec.relationships.push(RawRelationship {
            id: Some("R4".to_string()),
            relationship_type: Some(catalog::HAS_MEDIA.to_string()),
            related_id: Some("M7".to_string()),
        });

        let out = mapper.map(&rec);
        let row = &out[&EntityKind::Relationship][0];
        assert_eq!(row.id, "R4");
        assert_eq!(row.fields[2].1, "hasMedia");
        assert_eq!(row.fields[3].1, "M7");
    }

    #[test]
    fn test_media_never_maps_in_first_pass() {
        let mapper = EntityFanOutMapper::new();
        let mut rec = record("X1");
        rec.relationships.push(RawRelationship {
            id: None,
            relationship_type: Some(catalog::HAS_MEDIA.to_string()),
            related_id: Some("M7".to_string()),
        });

        let out = mapper.map(&rec);
        assert!(!out.contains_key(&EntityKind::Media));
    }

    #[test]
    fn test_map_media_links_back_to_core() {
        let mapper = EntityFanOutMapper::new();
        let media = RawMedia {
            id: "M7".to_string(),
            access_uri: Some("https://media.example/M7.jpg".to_string()),
            format: Some("image/jpeg".to_string()),
            license: None,
            creator: None,
        };

        let row = mapper.map_media(&media, "X1").unwrap();
        // Link identity, not the media's own id
        assert!(collex_common::hash::is_synthesized(&row.id));
        assert_eq!(row.id, mapper.map_media(&media, "X1").unwrap().id);
        assert_eq!(row.fields[0].1, "X1");
        assert_eq!(row.fields[1].1, "M7");
        assert_eq!(row.column_names(), catalog::columns(EntityKind::Media));
        // A second core record linking the same media gets its own row
        assert_ne!(row.id, mapper.map_media(&media, "X2").unwrap().id);
    }

    #[test]
    fn test_blank_media_is_suppressed() {
        let mapper = EntityFanOutMapper::new();
        let media = RawMedia {
            id: "M8".to_string(),
            access_uri: None,
            format: None,
            license: None,
            creator: None,
        };
        assert!(mapper.map_media(&media, "X1").is_none());
    }

    #[test]
    fn test_numeric_attribute_values_are_stringified() {
        let mapper = EntityFanOutMapper::new();
        let mut rec = record("X1");
        rec.attributes.insert(
            "catalogNumber".to_string(),
            serde_json::Value::Number(4711.into()),
        );

        let out = mapper.map(&rec);
        let core = &out[&EntityKind::Occurrence][0];
        let catalog_number = core
            .fields
            .iter()
            .find(|(name, _)| name == "catalog_number")
            .map(|(_, v)| v.as_str());
        assert_eq!(catalog_number, Some("4711"));
    }
}
