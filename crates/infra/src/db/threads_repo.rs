use quill_core::domain::threads::Thread;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::{Database, StoreError};

pub async fn get_thread_by_uri(db: &Database, uri: &str) -> Result<Thread, StoreError> {
    db.bounded(async {
        let row = sqlx::query(
            r#"
            SELECT id, uri, title
            FROM threads
            WHERE uri = ?
            "#,
        )
        .bind(uri)
        .fetch_optional(db.pool())
        .await?;
        row.map(|row| map_thread(&row))
            .transpose()?
            .ok_or(StoreError::NotFound)
    })
    .await
}

pub async fn get_thread_by_id(db: &Database, id: i64) -> Result<Thread, StoreError> {
    db.bounded(async {
        let row = sqlx::query(
            r#"
            SELECT id, uri, title
            FROM threads
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(db.pool())
        .await?;
        row.map(|row| map_thread(&row))
            .transpose()?
            .ok_or(StoreError::NotFound)
    })
    .await
}

pub async fn new_thread(db: &Database, uri: &str, title: &str) -> Result<Thread, StoreError> {
    let uri = uri.trim();
    let title = title.trim();
    if uri.is_empty() {
        return Err(StoreError::InvalidParam("uri must not be empty".to_string()));
    }
    if title.is_empty() {
        return Err(StoreError::InvalidParam("title must not be empty".to_string()));
    }
    db.bounded(async {
        let id = sqlx::query(
            r#"
            INSERT INTO threads (uri, title)
            VALUES (?, ?)
            "#,
        )
        .bind(uri)
        .bind(title)
        .execute(db.pool())
        .await
        .map_err(|err| StoreError::from_insert(err, "thread"))?
        .last_insert_rowid();
        tracing::debug!(thread_id = id, uri, "thread created");
        Ok(Thread {
            id,
            uri: uri.to_string(),
            title: title.to_string(),
        })
    })
    .await
}

fn map_thread(row: &SqliteRow) -> Result<Thread, sqlx::Error> {
    Ok(Thread {
        id: row.try_get("id")?,
        uri: row.try_get("uri")?,
        title: row.try_get::<Option<String>, _>("title")?.unwrap_or_default(),
    })
}
