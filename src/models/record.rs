//! Store records and their search-index projection.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field name carrying the store identifier on an [`IndexObject`].
pub const OBJECT_ID_FIELD: &str = "objectID";

/// One document read from the store, identified by its store-assigned key.
///
/// Field contents are opaque: they are copied verbatim, never interpreted.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: String,
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn new(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }
}

/// A record projected for the search index.
///
/// Serializes as the record's fields plus `objectID`, which always equals
/// the originating record's identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexObject {
    #[serde(rename = "objectID")]
    pub object_id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl From<Record> for IndexObject {
    fn from(record: Record) -> Self {
        let mut fields = record.fields;
        // A stored objectID is overwritten by the store identifier.
        fields.remove(OBJECT_ID_FIELD);
        Self {
            object_id: record.id,
            fields,
        }
    }
}
