use async_trait::async_trait;
use uuid::Uuid;

use crate::branch;
use crate::error::{PersistError, Result};
use crate::models::{Message, NewMessage, Thread};

/// Storage contract for threads and their message trees
///
/// Implementations provide the primitive CRUD operations; branch
/// reconstruction, prefix lookup and pending-approval detection are
/// derived from them.
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Create an empty thread
    async fn create_thread(&self, summary: Option<String>) -> Result<Thread>;

    async fn get_thread(&self, thread_id: Uuid) -> Result<Option<Thread>>;

    /// All threads, most recent first
    async fn list_threads(&self) -> Result<Vec<Thread>>;

    async fn set_thread_summary(&self, thread_id: Uuid, summary: String) -> Result<Thread>;

    /// Store a message, assigning an identity when it has none
    ///
    /// Fails when the thread is unknown or when the parent is missing or
    /// belongs to another thread. The stored creation timestamp is strictly
    /// later than the parent's.
    async fn append_message(&self, message: NewMessage) -> Result<Message>;

    async fn get_message(&self, message_id: Uuid) -> Result<Option<Message>>;

    /// Every message of a thread, oldest first
    async fn list_messages(&self, thread_id: Uuid) -> Result<Vec<Message>>;

    /// Remove the `count` most recent messages of a thread
    async fn delete_latest_messages(&self, thread_id: Uuid, count: usize) -> Result<Vec<Message>>;

    /// Thread ids whose textual form starts with `prefix`
    async fn thread_ids_with_prefix(&self, prefix: &str) -> Result<Vec<Uuid>>;

    /// Message ids whose textual form starts with `prefix`
    async fn message_ids_with_prefix(&self, prefix: &str) -> Result<Vec<Uuid>>;

    async fn latest_thread(&self) -> Result<Option<Thread>> {
        Ok(self.list_threads().await?.into_iter().next())
    }

    async fn find_thread_by_prefix(&self, prefix: &str) -> Result<Thread> {
        let ids = self.thread_ids_with_prefix(prefix).await?;
        let id = unique(prefix, ids, || PersistError::ThreadNotFound(prefix.to_string()))?;
        self.get_thread(id)
            .await?
            .ok_or_else(|| PersistError::ThreadNotFound(id.to_string()))
    }

    async fn find_message_by_prefix(&self, prefix: &str) -> Result<Message> {
        let ids = self.message_ids_with_prefix(prefix).await?;
        let id = unique(prefix, ids, || PersistError::MessageNotFound(prefix.to_string()))?;
        self.get_message(id)
            .await?
            .ok_or_else(|| PersistError::MessageNotFound(id.to_string()))
    }

    /// Linear branch of a thread ending at `head` (latest message when absent)
    async fn get_messages(&self, thread_id: Uuid, head: Option<Uuid>, extend_forward: bool) -> Result<Vec<Message>> {
        if self.get_thread(thread_id).await?.is_none() {
            return Err(PersistError::ThreadNotFound(thread_id.to_string()));
        }
        let messages = self.list_messages(thread_id).await?;
        branch::reconstruct(&messages, head, extend_forward)
    }

    /// Most recent assistant message on the branch whose tool calls are
    /// still unanswered
    async fn pending_approval(&self, thread_id: Uuid, head: Option<Uuid>) -> Result<Option<Message>> {
        let messages = self.list_messages(thread_id).await?;
        let spine = branch::reconstruct(&messages, head, false)?;
        Ok(spine
            .into_iter()
            .rev()
            .find(|m| branch::is_pending(m, &messages)))
    }
}

fn unique(prefix: &str, ids: Vec<Uuid>, missing: impl FnOnce() -> PersistError) -> Result<Uuid> {
    match ids.as_slice() {
        [id] => Ok(*id),
        [] => Err(missing()),
        _ => Err(PersistError::AmbiguousPrefix {
            prefix: prefix.to_string(),
            count: ids.len(),
        }),
    }
}
