use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::branch::recency;
use crate::error::{PersistError, Result};
use crate::models::{Message, NewMessage, Thread};
use crate::repository::MessageRepository;

#[derive(Default)]
struct Store {
    threads: HashMap<Uuid, Thread>,
    messages: HashMap<Uuid, Message>,
    last_timestamp: Option<DateTime<Utc>>,
}

impl Store {
    /// Wall clock, bumped so that every stored timestamp is unique and increasing
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let stamp = match self.last_timestamp {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_timestamp = Some(stamp);
        stamp
    }

    fn thread_messages(&self, thread_id: Uuid) -> Vec<Message> {
        let mut messages: Vec<Message> = self
            .messages
            .values()
            .filter(|m| m.thread_id == thread_id)
            .cloned()
            .collect();
        messages.sort_by(recency);
        messages
    }
}

/// Process-local repository, the default store and the one tests run against
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    store: Arc<RwLock<Store>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageRepository for InMemoryRepository {
    async fn create_thread(&self, summary: Option<String>) -> Result<Thread> {
        let mut store = self.store.write().await;
        let thread = Thread::new(summary, store.next_timestamp());
        store.threads.insert(thread.id, thread.clone());
        tracing::debug!(thread_id = %thread.id, "Created thread");
        Ok(thread)
    }

    async fn get_thread(&self, thread_id: Uuid) -> Result<Option<Thread>> {
        Ok(self.store.read().await.threads.get(&thread_id).cloned())
    }

    async fn list_threads(&self) -> Result<Vec<Thread>> {
        let store = self.store.read().await;
        let mut threads: Vec<Thread> = store.threads.values().cloned().collect();
        threads.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(threads)
    }

    async fn set_thread_summary(&self, thread_id: Uuid, summary: String) -> Result<Thread> {
        let mut store = self.store.write().await;
        let thread = store
            .threads
            .get_mut(&thread_id)
            .ok_or_else(|| PersistError::ThreadNotFound(thread_id.to_string()))?;
        thread.summary = Some(summary);
        Ok(thread.clone())
    }

    async fn append_message(&self, message: NewMessage) -> Result<Message> {
        let mut store = self.store.write().await;

        if !store.threads.contains_key(&message.thread_id) {
            return Err(PersistError::ThreadNotFound(message.thread_id.to_string()));
        }
        if let Some(parent) = message.parent_id {
            let same_thread = store
                .messages
                .get(&parent)
                .is_some_and(|p| p.thread_id == message.thread_id);
            if !same_thread {
                return Err(PersistError::InvalidParent {
                    parent,
                    thread: message.thread_id,
                });
            }
        }

        let id = message.id.unwrap_or_else(Uuid::new_v4);
        if store.messages.contains_key(&id) {
            return Err(PersistError::Internal(format!("Message {} already exists", id)));
        }

        let stored = message.into_message(id, store.next_timestamp());
        store.messages.insert(id, stored.clone());
        tracing::debug!(
            message_id = %stored.id,
            thread_id = %stored.thread_id,
            role = %stored.role,
            "Appended message"
        );
        Ok(stored)
    }

    async fn get_message(&self, message_id: Uuid) -> Result<Option<Message>> {
        Ok(self.store.read().await.messages.get(&message_id).cloned())
    }

    async fn list_messages(&self, thread_id: Uuid) -> Result<Vec<Message>> {
        Ok(self.store.read().await.thread_messages(thread_id))
    }

    async fn delete_latest_messages(&self, thread_id: Uuid, count: usize) -> Result<Vec<Message>> {
        let mut store = self.store.write().await;
        if !store.threads.contains_key(&thread_id) {
            return Err(PersistError::ThreadNotFound(thread_id.to_string()));
        }

        let messages = store.thread_messages(thread_id);
        let keep = messages.len().saturating_sub(count);
        let removed: Vec<Message> = messages.into_iter().skip(keep).collect();
        for message in &removed {
            store.messages.remove(&message.id);
        }
        tracing::debug!(thread_id = %thread_id, removed = removed.len(), "Deleted latest messages");
        Ok(removed)
    }

    async fn thread_ids_with_prefix(&self, prefix: &str) -> Result<Vec<Uuid>> {
        let store = self.store.read().await;
        Ok(store
            .threads
            .keys()
            .filter(|id| id.to_string().starts_with(prefix))
            .copied()
            .collect())
    }

    async fn message_ids_with_prefix(&self, prefix: &str) -> Result<Vec<Uuid>> {
        let store = self.store.read().await;
        Ok(store
            .messages
            .keys()
            .filter(|id| id.to_string().starts_with(prefix))
            .copied()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_timestamps_strictly_increase() {
        let repo = InMemoryRepository::new();
        let thread = repo.create_thread(None).await.unwrap();

        let mut parent = None;
        let mut previous = thread.created_at;
        for i in 0..50 {
            let message = repo
                .append_message(NewMessage::human(thread.id, parent, format!("m{}", i)))
                .await
                .unwrap();
            assert!(message.created_at > previous);
            previous = message.created_at;
            parent = Some(message.id);
        }
    }

    #[tokio::test]
    async fn test_duplicate_identity_rejected() {
        let repo = InMemoryRepository::new();
        let thread = repo.create_thread(None).await.unwrap();
        let id = Uuid::new_v4();

        repo.append_message(NewMessage::human(thread.id, None, "a").with_id(id))
            .await
            .unwrap();
        let err = repo
            .append_message(NewMessage::human(thread.id, None, "b").with_id(id))
            .await
            .unwrap_err();
        assert!(matches!(err, PersistError::Internal(_)));
    }
}
