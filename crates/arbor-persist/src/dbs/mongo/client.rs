use async_trait::async_trait;
use chrono::{DateTime, Duration, DurationRound, Utc};
use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::options::ReturnDocument;
use mongodb::{Client, Collection};
use uuid::Uuid;

use super::models::{MongoMessage, MongoThread};
use crate::error::{PersistError, Result};
use crate::models::{Message, NewMessage, Thread};
use crate::repository::MessageRepository;

/// MongoDB-backed repository
///
/// Documents keep millisecond timestamps, so appends are stamped at least one
/// millisecond after their parent.
#[derive(Clone)]
pub struct MongoRepository {
    threads: Collection<MongoThread>,
    messages: Collection<MongoMessage>,
}

impl MongoRepository {
    /// Connect to MongoDB and open the `threads` and `messages` collections
    pub async fn connect(mongodb_uri: &str, database: &str) -> Result<Self> {
        let client = Client::with_uri_str(mongodb_uri)
            .await
            .map_err(|e| PersistError::Connection(e.to_string()))?;
        Ok(Self::new(&client, database))
    }

    pub fn new(client: &Client, database: &str) -> Self {
        let db = client.database(database);
        Self {
            threads: db.collection("threads"),
            messages: db.collection("messages"),
        }
    }

    fn now() -> DateTime<Utc> {
        let now = Utc::now();
        now.duration_trunc(Duration::milliseconds(1)).unwrap_or(now)
    }

    async fn ids_with_prefix<T>(collection: &Collection<T>, prefix: &str) -> Result<Vec<Uuid>>
    where
        T: Send + Sync,
    {
        // Textual UUIDs only contain hex digits and dashes
        if !prefix.chars().all(|c| c.is_ascii_hexdigit() || c == '-') {
            return Ok(Vec::new());
        }
        let filter = doc! { "_id": { "$regex": format!("^{}", prefix.to_ascii_lowercase()) } };
        let raw: Vec<String> = collection
            .distinct("_id", filter)
            .await?
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();
        Ok(raw.iter().filter_map(|id| Uuid::parse_str(id).ok()).collect())
    }
}

#[async_trait]
impl MessageRepository for MongoRepository {
    async fn create_thread(&self, summary: Option<String>) -> Result<Thread> {
        let thread = Thread::new(summary, Self::now());
        self.threads.insert_one(MongoThread::from(&thread)).await?;
        tracing::debug!(thread_id = %thread.id, "Created thread");
        Ok(thread)
    }

    async fn get_thread(&self, thread_id: Uuid) -> Result<Option<Thread>> {
        let filter = doc! { "_id": thread_id.to_string() };
        self.threads
            .find_one(filter)
            .await?
            .map(Thread::try_from)
            .transpose()
    }

    async fn list_threads(&self) -> Result<Vec<Thread>> {
        let docs: Vec<MongoThread> = self
            .threads
            .find(doc! {})
            .sort(doc! { "created_at": -1, "_id": -1 })
            .await?
            .try_collect()
            .await?;
        docs.into_iter().map(Thread::try_from).collect()
    }

    async fn set_thread_summary(&self, thread_id: Uuid, summary: String) -> Result<Thread> {
        let updated = self
            .threads
            .find_one_and_update(
                doc! { "_id": thread_id.to_string() },
                doc! { "$set": { "summary": summary } },
            )
            .return_document(ReturnDocument::After)
            .await?;
        updated
            .ok_or_else(|| PersistError::ThreadNotFound(thread_id.to_string()))
            .and_then(Thread::try_from)
    }

    async fn append_message(&self, message: NewMessage) -> Result<Message> {
        if self.get_thread(message.thread_id).await?.is_none() {
            return Err(PersistError::ThreadNotFound(message.thread_id.to_string()));
        }

        let mut created_at = Self::now();
        if let Some(parent_id) = message.parent_id {
            let parent = self
                .get_message(parent_id)
                .await?
                .filter(|p| p.thread_id == message.thread_id)
                .ok_or(PersistError::InvalidParent {
                    parent: parent_id,
                    thread: message.thread_id,
                })?;
            created_at = created_at.max(parent.created_at + Duration::milliseconds(1));
        }

        let id = message.id.unwrap_or_else(Uuid::new_v4);
        let stored = message.into_message(id, created_at);
        self.messages.insert_one(MongoMessage::from(&stored)).await?;
        tracing::debug!(
            message_id = %stored.id,
            thread_id = %stored.thread_id,
            role = %stored.role,
            "Appended message"
        );
        Ok(stored)
    }

    async fn get_message(&self, message_id: Uuid) -> Result<Option<Message>> {
        let filter = doc! { "_id": message_id.to_string() };
        self.messages
            .find_one(filter)
            .await?
            .map(Message::try_from)
            .transpose()
    }

    async fn list_messages(&self, thread_id: Uuid) -> Result<Vec<Message>> {
        let docs: Vec<MongoMessage> = self
            .messages
            .find(doc! { "thread_id": thread_id.to_string() })
            .sort(doc! { "created_at": 1, "_id": 1 })
            .await?
            .try_collect()
            .await?;
        docs.into_iter().map(Message::try_from).collect()
    }

    async fn delete_latest_messages(&self, thread_id: Uuid, count: usize) -> Result<Vec<Message>> {
        if self.get_thread(thread_id).await?.is_none() {
            return Err(PersistError::ThreadNotFound(thread_id.to_string()));
        }
        let messages = self.list_messages(thread_id).await?;
        let keep = messages.len().saturating_sub(count);
        let removed: Vec<Message> = messages.into_iter().skip(keep).collect();
        if removed.is_empty() {
            return Ok(removed);
        }

        let ids: Vec<String> = removed.iter().map(|m| m.id.to_string()).collect();
        self.messages.delete_many(doc! { "_id": { "$in": ids } }).await?;
        tracing::debug!(thread_id = %thread_id, removed = removed.len(), "Deleted latest messages");
        Ok(removed)
    }

    async fn thread_ids_with_prefix(&self, prefix: &str) -> Result<Vec<Uuid>> {
        Self::ids_with_prefix(&self.threads, prefix).await
    }

    async fn message_ids_with_prefix(&self, prefix: &str) -> Result<Vec<Uuid>> {
        Self::ids_with_prefix(&self.messages, prefix).await
    }
}
