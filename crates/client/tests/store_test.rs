use aula_client::db;

#[tokio::test]
async fn bump_and_clear_unread() {
    let pool = db::init_memory_pool().await.unwrap();

    assert_eq!(db::bump_unread(&pool, "chat-1", "student").await.unwrap(), 1);
    assert_eq!(db::bump_unread(&pool, "chat-1", "student").await.unwrap(), 2);
    assert_eq!(db::unread_for(&pool, "chat-1", "student").await.unwrap(), 2);

    db::clear_unread(&pool, "chat-1", "student").await.unwrap();
    assert_eq!(db::unread_for(&pool, "chat-1", "student").await.unwrap(), 0);
}

#[tokio::test]
async fn counters_are_namespaced_by_role() {
    let pool = db::init_memory_pool().await.unwrap();

    db::bump_unread(&pool, "chat-1", "student").await.unwrap();
    db::bump_unread(&pool, "chat-1", "coach").await.unwrap();
    db::bump_unread(&pool, "chat-1", "coach").await.unwrap();

    assert_eq!(db::unread_for(&pool, "chat-1", "student").await.unwrap(), 1);
    assert_eq!(db::unread_for(&pool, "chat-1", "coach").await.unwrap(), 2);
}

#[tokio::test]
async fn all_unread_lists_only_positive_counts() {
    let pool = db::init_memory_pool().await.unwrap();

    db::bump_unread(&pool, "chat-1", "student").await.unwrap();
    db::bump_unread(&pool, "chat-2", "student").await.unwrap();
    db::clear_unread(&pool, "chat-2", "student").await.unwrap();

    let all = db::all_unread(&pool, "student").await.unwrap();
    assert_eq!(all, vec![("chat-1".to_string(), 1)]);
}

#[tokio::test]
async fn last_read_is_last_writer_wins() {
    let pool = db::init_memory_pool().await.unwrap();

    db::set_last_read(&pool, "chat-1", "student", "2026-08-01T10:00:00Z")
        .await
        .unwrap();
    db::set_last_read(&pool, "chat-1", "student", "2026-08-02T09:00:00Z")
        .await
        .unwrap();

    let read_at = db::last_read_for(&pool, "chat-1", "student").await.unwrap();
    assert_eq!(read_at.as_deref(), Some("2026-08-02T09:00:00Z"));
    assert!(db::last_read_for(&pool, "chat-9", "student")
        .await
        .unwrap()
        .is_none());
}
