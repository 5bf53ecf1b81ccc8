//! Branch reconstruction over a thread's message tree.
//!
//! Every message has at most one parent, so the path from any message back
//! to its root is unique. Alternative continuations are siblings; among
//! them recency (creation timestamp, then identity) decides which one is
//! followed when extending a branch forward.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::error::{PersistError, Result};
use crate::models::{Message, Role};

/// Total recency order: timestamp first, identity as a stable tie-break
pub fn recency(a: &Message, b: &Message) -> Ordering {
    a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id))
}

/// Linear conversational context ending at `head`.
///
/// Without a head the most recent message of the thread is used. With
/// `extend_forward` the branch continues from the head through the most
/// recent child at each level until a leaf is reached. The result is sorted
/// oldest first.
pub fn reconstruct(messages: &[Message], head: Option<Uuid>, extend_forward: bool) -> Result<Vec<Message>> {
    let by_id: HashMap<Uuid, &Message> = messages.iter().map(|m| (m.id, m)).collect();

    let head = match head {
        Some(id) => *by_id
            .get(&id)
            .ok_or_else(|| PersistError::MessageNotFound(id.to_string()))?,
        None => match messages.iter().max_by(|a, b| recency(a, b)) {
            Some(latest) => latest,
            None => return Ok(Vec::new()),
        },
    };

    let mut seen: HashSet<Uuid> = HashSet::new();
    let mut branch: Vec<&Message> = Vec::new();

    // Spine: head back to its root
    let mut cursor = Some(head);
    while let Some(message) = cursor {
        if !seen.insert(message.id) {
            break;
        }
        branch.push(message);
        cursor = message.parent_id.and_then(|parent| by_id.get(&parent).copied());
    }

    if extend_forward {
        let children = children_index(messages);
        let mut cursor = head;
        while let Some(next) = children
            .get(&cursor.id)
            .and_then(|kids| kids.iter().copied().max_by(|a, b| recency(a, b)))
        {
            if !seen.insert(next.id) {
                break;
            }
            branch.push(next);
            cursor = next;
        }
    }

    branch.sort_by(|a, b| recency(a, b));
    Ok(branch.into_iter().cloned().collect())
}

/// Whether an assistant message still waits for its tool calls to be
/// answered (by a tool result or an explicit rejection)
pub fn is_pending(message: &Message, thread_messages: &[Message]) -> bool {
    message.requests_tools()
        && !thread_messages
            .iter()
            .any(|m| m.parent_id == Some(message.id) && m.role == Role::Tool)
}

fn children_index(messages: &[Message]) -> HashMap<Uuid, Vec<&Message>> {
    let mut children: HashMap<Uuid, Vec<&Message>> = HashMap::new();
    for message in messages {
        if let Some(parent) = message.parent_id {
            children.entry(parent).or_default().push(message);
        }
    }
    children
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewMessage;
    use chrono::{Duration, TimeZone, Utc};

    fn at(thread: Uuid, parent: Option<&Message>, seconds: i64, content: &str) -> Message {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(seconds);
        NewMessage::human(thread, parent.map(|p| p.id), content).into_message(Uuid::new_v4(), created)
    }

    fn contents(messages: &[Message]) -> Vec<&str> {
        messages.iter().map(|m| m.content.as_str()).collect()
    }

    #[test]
    fn test_empty_thread() {
        assert!(reconstruct(&[], None, true).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_head() {
        let err = reconstruct(&[], Some(Uuid::new_v4()), false).unwrap_err();
        assert!(matches!(err, PersistError::MessageNotFound(_)));
    }

    #[test]
    fn test_timestamp_ties_break_on_identity() {
        let thread = Uuid::new_v4();
        let root = at(thread, None, 0, "root");
        let mut a = at(thread, Some(&root), 1, "a");
        let mut b = at(thread, Some(&root), 1, "b");
        a.id = Uuid::from_u128(1);
        b.id = Uuid::from_u128(2);

        let all = vec![root.clone(), a, b];
        let branch = reconstruct(&all, Some(root.id), true).unwrap();
        assert_eq!(contents(&branch), vec!["root", "b"]);
    }

    #[test]
    fn test_pending_detection() {
        let thread = Uuid::new_v4();
        let root = at(thread, None, 0, "root");
        let mut assistant = at(thread, Some(&root), 1, "calling");
        assistant.role = Role::Assistant;
        assistant.tool_calls = vec![arbor_llm::ToolCall::new("c1", "fs__ls", "{}")];

        let mut all = vec![root, assistant.clone()];
        assert!(is_pending(&assistant, &all));

        let mut result = at(thread, Some(&assistant), 2, "done");
        result.role = Role::Tool;
        all.push(result);
        assert!(!is_pending(&assistant, &all));
    }
}
