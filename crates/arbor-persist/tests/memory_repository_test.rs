use arbor_persist::{InMemoryRepository, MessageRepository, NewMessage, PersistError, Role};
use uuid::Uuid;

#[tokio::test]
async fn test_create_and_get_thread() {
    let repo = InMemoryRepository::new();
    let thread = repo.create_thread(Some("First".to_string())).await.unwrap();

    let fetched = repo.get_thread(thread.id).await.unwrap().unwrap();
    assert_eq!(fetched, thread);
    assert!(repo.get_thread(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_list_threads_most_recent_first() {
    let repo = InMemoryRepository::new();
    let first = repo.create_thread(None).await.unwrap();
    let second = repo.create_thread(None).await.unwrap();

    let threads = repo.list_threads().await.unwrap();
    assert_eq!(threads.len(), 2);
    assert_eq!(threads[0].id, second.id);
    assert_eq!(threads[1].id, first.id);

    let latest = repo.latest_thread().await.unwrap().unwrap();
    assert_eq!(latest.id, second.id);
}

#[tokio::test]
async fn test_set_thread_summary() {
    let repo = InMemoryRepository::new();
    let thread = repo.create_thread(None).await.unwrap();

    let updated = repo.set_thread_summary(thread.id, "Renamed".to_string()).await.unwrap();
    assert_eq!(updated.summary.as_deref(), Some("Renamed"));

    let err = repo
        .set_thread_summary(Uuid::new_v4(), "x".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, PersistError::ThreadNotFound(_)));
}

#[tokio::test]
async fn test_append_assigns_identity_and_keeps_given_one() {
    let repo = InMemoryRepository::new();
    let thread = repo.create_thread(None).await.unwrap();

    let assigned = repo
        .append_message(NewMessage::human(thread.id, None, "hello"))
        .await
        .unwrap();
    assert_eq!(assigned.role, Role::Human);
    assert_eq!(assigned.content, "hello");

    let id = Uuid::new_v4();
    let given = repo
        .append_message(NewMessage::human(thread.id, Some(assigned.id), "again").with_id(id))
        .await
        .unwrap();
    assert_eq!(given.id, id);
    assert!(given.created_at > assigned.created_at);

    let fetched = repo.get_message(id).await.unwrap().unwrap();
    assert_eq!(fetched, given);
}

#[tokio::test]
async fn test_append_to_unknown_thread() {
    let repo = InMemoryRepository::new();
    let err = repo
        .append_message(NewMessage::human(Uuid::new_v4(), None, "hello"))
        .await
        .unwrap_err();
    assert!(matches!(err, PersistError::ThreadNotFound(_)));
}

#[tokio::test]
async fn test_parent_must_share_thread() {
    let repo = InMemoryRepository::new();
    let one = repo.create_thread(None).await.unwrap();
    let two = repo.create_thread(None).await.unwrap();

    let foreign = repo
        .append_message(NewMessage::human(one.id, None, "in one"))
        .await
        .unwrap();

    let err = repo
        .append_message(NewMessage::human(two.id, Some(foreign.id), "in two"))
        .await
        .unwrap_err();
    match err {
        PersistError::InvalidParent { parent, thread } => {
            assert_eq!(parent, foreign.id);
            assert_eq!(thread, two.id);
        }
        other => panic!("Expected InvalidParent, got {:?}", other),
    }

    let err = repo
        .append_message(NewMessage::human(two.id, Some(Uuid::new_v4()), "orphan"))
        .await
        .unwrap_err();
    assert!(matches!(err, PersistError::InvalidParent { .. }));
}

#[tokio::test]
async fn test_delete_latest_messages() {
    let repo = InMemoryRepository::new();
    let thread = repo.create_thread(None).await.unwrap();

    let mut parent = None;
    for content in ["one", "two", "three"] {
        let message = repo
            .append_message(NewMessage::human(thread.id, parent, content))
            .await
            .unwrap();
        parent = Some(message.id);
    }

    let removed = repo.delete_latest_messages(thread.id, 2).await.unwrap();
    let removed: Vec<&str> = removed.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(removed, vec!["two", "three"]);

    let remaining = repo.list_messages(thread.id).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].content, "one");

    // Asking for more than exists removes everything
    let removed = repo.delete_latest_messages(thread.id, 10).await.unwrap();
    assert_eq!(removed.len(), 1);
    assert!(repo.list_messages(thread.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_find_by_prefix() {
    let repo = InMemoryRepository::new();
    let thread = repo.create_thread(None).await.unwrap();
    let message = repo
        .append_message(NewMessage::human(thread.id, None, "hello"))
        .await
        .unwrap();

    let full = thread.id.to_string();
    let found = repo.find_thread_by_prefix(&full[..8]).await.unwrap();
    assert_eq!(found.id, thread.id);

    let found = repo
        .find_message_by_prefix(&message.id.to_string()[..8])
        .await
        .unwrap();
    assert_eq!(found.id, message.id);

    let err = repo.find_thread_by_prefix("zzzz").await.unwrap_err();
    assert!(matches!(err, PersistError::ThreadNotFound(_)));
}

#[tokio::test]
async fn test_ambiguous_prefix() {
    let repo = InMemoryRepository::new();
    repo.create_thread(None).await.unwrap();
    repo.create_thread(None).await.unwrap();

    // Every textual id matches the empty prefix
    let err = repo.find_thread_by_prefix("").await.unwrap_err();
    match err {
        PersistError::AmbiguousPrefix { count, .. } => assert_eq!(count, 2),
        other => panic!("Expected AmbiguousPrefix, got {:?}", other),
    }
}

#[tokio::test]
async fn test_get_messages_unknown_thread() {
    let repo = InMemoryRepository::new();
    let err = repo.get_messages(Uuid::new_v4(), None, false).await.unwrap_err();
    assert!(matches!(err, PersistError::ThreadNotFound(_)));
}
