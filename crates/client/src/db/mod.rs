//! Client-side persisted cache: unread counters and last-read timestamps,
//! keyed by chat id and role. Treated as last-writer-wins and rebuildable
//! from server state; losing this database loses nothing but badge counts.

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::path::Path;

pub async fn init_pool(database_path: &str) -> Result<SqlitePool, sqlx::Error> {
    // Ensure parent directory exists
    if let Some(parent) = Path::new(database_path).parent() {
        std::fs::create_dir_all(parent).ok();
    }

    let database_url = format!("sqlite:{}?mode=rwc", database_path);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    init_schema(&pool).await?;
    Ok(pool)
}

pub async fn init_memory_pool() -> Result<SqlitePool, sqlx::Error> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    init_schema(&pool).await?;
    Ok(pool)
}

async fn init_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(pool)
        .await
        .ok();
    sqlx::query("PRAGMA foreign_keys = ON").execute(pool).await?;

    let schema = include_str!("schema.sql");
    // Split by semicolons and execute each statement
    // (SQLx doesn't support multi-statement queries directly)
    for statement in schema.split(';') {
        let trimmed = statement.trim();
        if !trimmed.is_empty() {
            sqlx::query(trimmed).execute(pool).await?;
        }
    }
    Ok(())
}

pub async fn bump_unread(
    pool: &SqlitePool,
    chat_id: &str,
    role: &str,
) -> Result<i64, sqlx::Error> {
    let now = chrono::Utc::now().to_rfc3339();
    sqlx::query(
        r#"INSERT INTO unread_counts (chat_id, role, count, updated_at)
           VALUES (?, ?, 1, ?)
           ON CONFLICT (chat_id, role)
           DO UPDATE SET count = count + 1, updated_at = excluded.updated_at"#,
    )
    .bind(chat_id)
    .bind(role)
    .bind(&now)
    .execute(pool)
    .await?;

    unread_for(pool, chat_id, role).await
}

pub async fn clear_unread(pool: &SqlitePool, chat_id: &str, role: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM unread_counts WHERE chat_id = ? AND role = ?")
        .bind(chat_id)
        .bind(role)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn unread_for(pool: &SqlitePool, chat_id: &str, role: &str) -> Result<i64, sqlx::Error> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT count FROM unread_counts WHERE chat_id = ? AND role = ?",
    )
    .bind(chat_id)
    .bind(role)
    .fetch_optional(pool)
    .await?;
    Ok(count.unwrap_or(0))
}

pub async fn all_unread(pool: &SqlitePool, role: &str) -> Result<Vec<(String, i64)>, sqlx::Error> {
    sqlx::query_as::<_, (String, i64)>(
        "SELECT chat_id, count FROM unread_counts WHERE role = ? AND count > 0",
    )
    .bind(role)
    .fetch_all(pool)
    .await
}

pub async fn set_last_read(
    pool: &SqlitePool,
    chat_id: &str,
    role: &str,
    read_at: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO last_read (chat_id, role, read_at)
           VALUES (?, ?, ?)
           ON CONFLICT (chat_id, role) DO UPDATE SET read_at = excluded.read_at"#,
    )
    .bind(chat_id)
    .bind(role)
    .bind(read_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn last_read_for(
    pool: &SqlitePool,
    chat_id: &str,
    role: &str,
) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "SELECT read_at FROM last_read WHERE chat_id = ? AND role = ?",
    )
    .bind(chat_id)
    .bind(role)
    .fetch_optional(pool)
    .await
}
