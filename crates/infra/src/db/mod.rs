pub mod comments_repo;
pub mod error;
pub mod guard_repo;
pub mod migrations;
pub mod pool;
pub mod preferences_repo;
pub mod threads_repo;

pub use error::StoreError;
pub use pool::{Database, DbPoolError};

#[cfg(test)]
pub(crate) mod testing {
    use std::time::Duration;

    use quill_core::domain::comments::{Mode, NewComment};
    use quill_core::domain::threads::Thread;

    use super::{migrations, threads_repo, Database};

    pub async fn memory_db() -> Database {
        let db = Database::connect_in_memory(Duration::from_secs(5))
            .await
            .expect("in-memory pool");
        migrations::run_migrations(&db).await.expect("migrations");
        db
    }

    /// File-backed database on the production pool settings.
    pub async fn file_db(dir: &tempfile::TempDir) -> Database {
        let url = format!("sqlite://{}", dir.path().join("comments.db").display());
        let db = Database::connect(&url, Duration::from_secs(10))
            .await
            .expect("file pool");
        migrations::run_migrations(&db).await.expect("migrations");
        db
    }

    pub async fn thread(db: &Database, uri: &str) -> Thread {
        threads_repo::new_thread(db, uri, "Title")
            .await
            .expect("thread")
    }

    pub fn candidate(text: &str, parent: Option<i64>) -> NewComment {
        NewComment {
            parent,
            mode: Mode::Accepted,
            remote_addr: "127.0.0.1".to_string(),
            text: text.to_string(),
            author: None,
            email: None,
            website: None,
            notification: false,
        }
    }
}
