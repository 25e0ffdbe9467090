use super::{Database, StoreError};

pub async fn get_preference(db: &Database, key: &str) -> Result<String, StoreError> {
    db.bounded(async {
        let value: Option<Option<String>> =
            sqlx::query_scalar("SELECT value FROM preferences WHERE key = ?")
                .bind(key)
                .fetch_optional(db.pool())
                .await?;
        value.flatten().ok_or(StoreError::NotFound)
    })
    .await
}

/// Inserts `key` once; an existing key is a `Conflict`.
pub async fn set_preference(db: &Database, key: &str, value: &str) -> Result<(), StoreError> {
    db.bounded(async {
        sqlx::query("INSERT INTO preferences (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(db.pool())
            .await
            .map_err(|err| StoreError::from_insert(err, "preference"))?;
        Ok::<(), StoreError>(())
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::{get_preference, set_preference};
    use crate::db::testing::memory_db;
    use crate::db::StoreError;

    #[tokio::test]
    async fn stores_each_key_once() {
        let db = memory_db().await;
        assert!(matches!(
            get_preference(&db, "session-key").await,
            Err(StoreError::NotFound)
        ));
        set_preference(&db, "session-key", "abc").await.unwrap();
        assert_eq!(get_preference(&db, "session-key").await.unwrap(), "abc");
        assert!(matches!(
            set_preference(&db, "session-key", "def").await,
            Err(StoreError::Conflict(_))
        ));
        assert_eq!(get_preference(&db, "session-key").await.unwrap(), "abc");
    }
}
