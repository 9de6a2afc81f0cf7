//! Purge query model.

/// Records in `collection` whose `field` equals `value`.
///
/// Built per request from a path parameter; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeQuery {
    pub collection: String,
    pub field: String,
    pub value: String,
}

impl PurgeQuery {
    pub fn new(
        collection: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            collection: collection.into(),
            field: field.into(),
            value: value.into(),
        }
    }
}

impl std::fmt::Display for PurgeQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{} == {:?}]", self.collection, self.field, self.value)
    }
}
