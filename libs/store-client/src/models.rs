//! Persisted rule artifacts, read-only from the engine's perspective.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored rule definition as persisted by the rules service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleRecord {
    pub id: uuid::Uuid,
    /// Unique short code used to address the rule in evaluate-by-code calls.
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub yaml_content: String,
    pub version: i32,
    pub is_active: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
