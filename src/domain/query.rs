//! Live query description handed to the transport on subscribe.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A query whose matching objects the server should push changes for.
///
/// Serializes as `{"className": ..., "where": {...}, "fields": [...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    class_name: String,
    #[serde(rename = "where", default = "empty_filter")]
    filter: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fields: Option<Vec<String>>,
}

fn empty_filter() -> Value {
    Value::Object(Map::new())
}

impl Query {
    /// Creates a query matching every object of `class_name`.
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            filter: empty_filter(),
            fields: None,
        }
    }

    /// Replaces the `where` filter.
    #[must_use]
    pub fn with_filter(mut self, filter: Value) -> Self {
        self.filter = filter;
        self
    }

    /// Restricts pushed objects to the given fields.
    #[must_use]
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Class the query runs against.
    #[must_use]
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// The `where` filter.
    #[must_use]
    pub const fn filter(&self) -> &Value {
        &self.filter
    }

    /// Field projection, if any.
    #[must_use]
    pub fn fields(&self) -> Option<&[String]> {
        self.fields.as_deref()
    }
}
