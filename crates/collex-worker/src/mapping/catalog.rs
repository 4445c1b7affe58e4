//! Static field catalog
//!
//! Fixed column lists per entity kind, and the mapping from source
//! attribute names to core columns. The archive writer freezes each table's
//! header from its first row, so every row of a kind must be built from
//! exactly these columns in this order.

use collex_common::EntityKind;

/// Identifier column of the core kind; extension tables join back on it
pub const CORE_ID_COLUMN: &str = "record_id";

/// Foreign-key column carried by every extension row
pub const FOREIGN_KEY_COLUMN: &str = "core_id";

/// Relationship type marking a reference into the media index
pub const HAS_MEDIA: &str = "hasMedia";

/// Source attribute name -> core column name
pub const CORE_ATTRIBUTES: &[(&str, &str)] = &[
    ("scientificName", "scientific_name"),
    ("catalogNumber", "catalog_number"),
    ("collectionCode", "collection_code"),
    ("locality", "locality"),
    ("country", "country"),
    ("collectedDate", "collected_date"),
    ("basisOfRecord", "basis_of_record"),
];

/// Column list for a kind's table
pub fn columns(kind: EntityKind) -> &'static [&'static str] {
    match kind {
        EntityKind::Occurrence => &[
            CORE_ID_COLUMN,
            "scientific_name",
            "catalog_number",
            "collection_code",
            "locality",
            "country",
            "collected_date",
            "basis_of_record",
        ],
        EntityKind::Event => &[
            FOREIGN_KEY_COLUMN,
            "event_id",
            "event_type",
            "event_date",
            "locality",
            "country",
        ],
        EntityKind::Agent => &[FOREIGN_KEY_COLUMN, "agent_id", "agent_name", "agent_role"],
        EntityKind::Relationship => &[
            FOREIGN_KEY_COLUMN,
            "relationship_id",
            "relationship_type",
            "related_id",
        ],
        EntityKind::Media => &[
            FOREIGN_KEY_COLUMN,
            "media_id",
            "access_uri",
            "format",
            "license",
            "creator",
        ],
    }
}
