//! JSON output envelope
//!
//! Every `--format json` command wraps its payload in the same envelope so
//! scripts can check the schema before reading the data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Standard envelope for JSON output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T: Serialize> {
    /// Schema version identifier (e.g., "mp.list.v1")
    pub schema_version: String,

    /// When this output was generated
    pub generated_at: DateTime<Utc>,

    /// The actual data payload
    pub data: T,
}

impl<T: Serialize> Envelope<T> {
    /// Create a new envelope with the given schema and data
    pub fn new(schema_version: impl Into<String>, data: T) -> Self {
        Self {
            schema_version: schema_version.into(),
            generated_at: Utc::now(),
            data,
        }
    }

    /// Serialize to pretty JSON
    ///
    /// # Errors
    /// Returns a `serde_json::Error` if the payload cannot be serialized.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
