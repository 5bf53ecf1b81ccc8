use arbor_llm::ToolCall;
use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{PersistError, Result};
use crate::models::{Message, Role, Thread};

/// MongoDB thread document, identities stored in textual form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoThread {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

/// MongoDB message document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoMessage {
    #[serde(rename = "_id")]
    pub id: String,
    pub thread_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

fn parse_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| PersistError::Internal(format!("Stored id {:?} is not a UUID: {}", raw, e)))
}

// Conversions between database-agnostic and MongoDB-specific models

impl From<&Thread> for MongoThread {
    fn from(thread: &Thread) -> Self {
        Self {
            id: thread.id.to_string(),
            summary: thread.summary.clone(),
            created_at: thread.created_at,
        }
    }
}

impl TryFrom<MongoThread> for Thread {
    type Error = PersistError;

    fn try_from(doc: MongoThread) -> Result<Self> {
        Ok(Self {
            id: parse_id(&doc.id)?,
            summary: doc.summary,
            created_at: doc.created_at,
        })
    }
}

impl From<&Message> for MongoMessage {
    fn from(msg: &Message) -> Self {
        Self {
            id: msg.id.to_string(),
            thread_id: msg.thread_id.to_string(),
            parent_id: msg.parent_id.map(|p| p.to_string()),
            role: msg.role,
            content: msg.content.clone(),
            tool_calls: msg.tool_calls.clone(),
            model_name: msg.model_name.clone(),
            provider: msg.provider.clone(),
            created_at: msg.created_at,
        }
    }
}

impl TryFrom<MongoMessage> for Message {
    type Error = PersistError;

    fn try_from(doc: MongoMessage) -> Result<Self> {
        Ok(Self {
            id: parse_id(&doc.id)?,
            thread_id: parse_id(&doc.thread_id)?,
            parent_id: doc.parent_id.as_deref().map(parse_id).transpose()?,
            role: doc.role,
            content: doc.content,
            tool_calls: doc.tool_calls,
            model_name: doc.model_name,
            provider: doc.provider,
            created_at: doc.created_at,
        })
    }
}
