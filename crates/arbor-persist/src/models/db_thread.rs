use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A conversation: an independent tree of messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub id: Uuid,
    /// Human-authored or generated; the only mutable field
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Thread {
    pub fn new(summary: Option<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            summary,
            created_at,
        }
    }
}
