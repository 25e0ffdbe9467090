use std::collections::HashMap;

use quill_core::domain::comments::{Comment, CommentEdit, Mode, ModeFilter, NewComment};
use quill_core::domain::replies::ReplyCounts;
use quill_core::types::timestamp::now_secs;
use quill_core::types::VoterSet;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};

use super::{Database, StoreError};

/// Window used by [`is_approved_author`]: roughly six months.
pub const ACQUAINTANCE_WINDOW_SECS: f64 = 60.0 * 60.0 * 24.0 * 30.0 * 6.0;

const COMMENT_COLUMNS: &str = "c.tid, c.id, c.parent, c.created, c.modified, c.mode, \
     c.remote_addr, c.text, c.author, c.email, c.website, c.likes, c.dislikes, \
     c.voters, c.notification";

/// Which parent a fetch is restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentFilter {
    Any,
    TopLevel,
    RepliesTo(i64),
}

impl ParentFilter {
    /// Legacy encoding: negative means any parent, `0` top-level only.
    pub fn from_raw(parent: i64) -> Self {
        match parent {
            p if p < 0 => ParentFilter::Any,
            0 => ParentFilter::TopLevel,
            p => ParentFilter::RepliesTo(p),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderBy {
    #[default]
    Id,
    Created,
    Modified,
    Likes,
    Dislikes,
}

impl OrderBy {
    /// Unknown columns fall back to `id`.
    pub fn parse(value: &str) -> Self {
        match value {
            "created" => OrderBy::Created,
            "modified" => OrderBy::Modified,
            "likes" => OrderBy::Likes,
            "dislikes" => OrderBy::Dislikes,
            _ => OrderBy::Id,
        }
    }

    fn column(self) -> &'static str {
        match self {
            OrderBy::Id => "c.id",
            OrderBy::Created => "c.created",
            OrderBy::Modified => "c.modified",
            OrderBy::Likes => "c.likes",
            OrderBy::Dislikes => "c.dislikes",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchQuery {
    pub uri: String,
    pub modes: ModeFilter,
    pub after: f64,
    pub parent: ParentFilter,
    pub order_by: OrderBy,
    pub ascending: bool,
    pub limit: Option<i64>,
}

impl FetchQuery {
    /// Public comments of `uri`, oldest id first, without limit.
    pub fn public(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            modes: ModeFilter::PUBLIC,
            after: 0.0,
            parent: ParentFilter::Any,
            order_by: OrderBy::Id,
            ascending: true,
            limit: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteOutcome {
    pub likes: i64,
    pub dislikes: i64,
    /// False when the address had already voted on (or written) the comment.
    pub counted: bool,
}

pub async fn add_comment(
    db: &Database,
    uri: &str,
    candidate: &NewComment,
) -> Result<Comment, StoreError> {
    add_comment_at(db, uri, candidate, now_secs()).await
}

/// Same as [`add_comment`] with an explicit creation time.
pub async fn add_comment_at(
    db: &Database,
    uri: &str,
    candidate: &NewComment,
    created: f64,
) -> Result<Comment, StoreError> {
    db.bounded(async {
        let mut tx = db.begin_write().await?;
        let thread_id: i64 = sqlx::query_scalar("SELECT id FROM threads WHERE uri = ?")
            .bind(uri)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::NotFound)?;

        let parent = match candidate.parent {
            Some(parent) => Some(resolve_parent(&mut *tx, thread_id, parent).await?),
            None => None,
        };

        let mut voters = VoterSet::new();
        voters.add(candidate.remote_addr.as_bytes());

        let id = sqlx::query(
            r#"
            INSERT INTO comments (
                tid,
                parent,
                created,
                modified,
                mode,
                remote_addr,
                text,
                author,
                email,
                website,
                voters,
                notification
            )
            VALUES (?, ?, ?, NULL, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(thread_id)
        .bind(parent)
        .bind(created)
        .bind(candidate.mode.as_i64())
        .bind(&candidate.remote_addr)
        .bind(&candidate.text)
        .bind(&candidate.author)
        .bind(&candidate.email)
        .bind(&candidate.website)
        .bind(voters.as_bytes().as_slice())
        .bind(candidate.notification)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();
        tx.commit().await?;

        tracing::debug!(comment_id = id, thread_id, ?parent, "comment stored");
        Ok::<_, StoreError>(Comment {
            thread_id,
            id,
            parent,
            created,
            modified: None,
            mode: candidate.mode,
            remote_addr: candidate.remote_addr.clone(),
            text: candidate.text.clone(),
            author: candidate.author.clone(),
            email: candidate.email.clone(),
            website: candidate.website.clone(),
            likes: 0,
            dislikes: 0,
            voters,
            notification: candidate.notification,
        })
    })
    .await
}

/// Replies to a reply are re-parented to the top-level comment.
async fn resolve_parent(
    conn: &mut SqliteConnection,
    thread_id: i64,
    parent: i64,
) -> Result<i64, StoreError> {
    let row = sqlx::query("SELECT tid, parent FROM comments WHERE id = ?")
        .bind(parent)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(StoreError::InvalidParent(parent))?;
    let parent_thread: i64 = row.try_get("tid")?;
    if parent_thread != thread_id {
        return Err(StoreError::InvalidParent(parent));
    }
    let grandparent: Option<i64> = row.try_get("parent")?;
    Ok(grandparent.unwrap_or(parent))
}

pub async fn get_comment(db: &Database, id: i64) -> Result<Comment, StoreError> {
    db.bounded(async {
        let mut conn = db.pool().acquire().await?;
        load_comment(&mut *conn, id).await
    })
    .await
}

async fn load_comment(conn: &mut SqliteConnection, id: i64) -> Result<Comment, StoreError> {
    let sql = format!("SELECT {COMMENT_COLUMNS} FROM comments c WHERE c.id = ?");
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(StoreError::NotFound)?;
    Ok(map_comment(&row)?)
}

/// Rewrites the editable fields and stamps `modified`.
pub async fn update_comment(
    db: &Database,
    id: i64,
    edit: &CommentEdit,
) -> Result<Comment, StoreError> {
    db.bounded(async {
        let mut tx = db.begin_write().await?;
        let updated = sqlx::query(
            r#"
            UPDATE comments
            SET text = ?, author = ?, website = ?, modified = ?
            WHERE id = ?
            "#,
        )
        .bind(&edit.text)
        .bind(&edit.author)
        .bind(&edit.website)
        .bind(now_secs())
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if updated == 0 {
            return Err(StoreError::NotFound);
        }
        let comment = load_comment(&mut *tx, id).await?;
        tx.commit().await?;
        Ok(comment)
    })
    .await
}

/// Counts matching comments per parent id; top-level comments count under `0`.
pub async fn count_reply(
    db: &Database,
    uri: &str,
    modes: ModeFilter,
    after: f64,
) -> Result<ReplyCounts, StoreError> {
    db.bounded(async {
        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT COALESCE(c.parent, 0) AS parent_key, COUNT(*) AS total \
             FROM comments c INNER JOIN threads t ON t.id = c.tid WHERE t.uri = ",
        );
        builder.push_bind(uri);
        builder.push(" AND c.created > ");
        builder.push_bind(after);
        push_mode_filter(&mut builder, modes);
        builder.push(" GROUP BY parent_key");

        let rows = builder.build().fetch_all(db.pool()).await?;
        let mut counts = HashMap::with_capacity(rows.len());
        for row in rows {
            counts.insert(row.try_get("parent_key")?, row.try_get("total")?);
        }
        Ok::<_, StoreError>(ReplyCounts::from(counts))
    })
    .await
}

pub async fn fetch_comments(db: &Database, query: &FetchQuery) -> Result<Vec<Comment>, StoreError> {
    match query.limit {
        Some(limit) if limit < 0 => {
            return Err(StoreError::InvalidParam(format!(
                "limit must not be negative, got {limit}"
            )));
        }
        Some(0) => return Ok(Vec::new()),
        _ => {}
    }
    db.bounded(async {
        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {COMMENT_COLUMNS} FROM comments c \
             INNER JOIN threads t ON t.id = c.tid WHERE t.uri = "
        ));
        builder.push_bind(&query.uri);
        builder.push(" AND c.created > ");
        builder.push_bind(query.after);
        push_mode_filter(&mut builder, query.modes);
        match query.parent {
            ParentFilter::Any => {}
            ParentFilter::TopLevel => {
                builder.push(" AND c.parent IS NULL");
            }
            ParentFilter::RepliesTo(parent) => {
                builder.push(" AND c.parent = ");
                builder.push_bind(parent);
            }
        }
        builder.push(" ORDER BY ");
        builder.push(query.order_by.column());
        builder.push(if query.ascending { " ASC" } else { " DESC" });
        if let Some(limit) = query.limit {
            builder.push(" LIMIT ");
            builder.push_bind(limit);
        }

        let rows = builder.build().fetch_all(db.pool()).await?;
        let mut comments = Vec::with_capacity(rows.len());
        for row in rows {
            comments.push(map_comment(&row)?);
        }
        Ok::<_, StoreError>(comments)
    })
    .await
}

fn push_mode_filter(builder: &mut QueryBuilder<'_, Sqlite>, modes: ModeFilter) {
    if modes.is_empty() {
        builder.push(" AND 0");
        return;
    }
    builder.push(" AND c.mode IN (");
    let mut separated = builder.separated(", ");
    for mode in modes.modes() {
        separated.push_bind(mode.as_i64());
    }
    separated.push_unseparated(")");
}

/// Moves a pending comment to `Accepted`.
pub async fn activate_comment(db: &Database, id: i64) -> Result<(), StoreError> {
    db.bounded(async {
        let updated = sqlx::query("UPDATE comments SET mode = ? WHERE id = ? AND mode = ?")
            .bind(Mode::Accepted.as_i64())
            .bind(id)
            .bind(Mode::Moderation.as_i64())
            .execute(db.pool())
            .await?
            .rows_affected();
        if updated != 1 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    })
    .await
}

/// Soft-deletes a comment that still has replies and hard-deletes it otherwise.
///
/// Returns the placeholder left behind, or `None` when the row is gone.
pub async fn delete_comment(db: &Database, id: i64) -> Result<Option<Comment>, StoreError> {
    db.bounded(async {
        let mut tx = db.begin_write().await?;
        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM comments WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(StoreError::NotFound);
        }

        let replies: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE parent = ?")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        let placeholder = if replies > 0 {
            sqlx::query(
                r#"
                UPDATE comments
                SET mode = ?, text = '', author = NULL, website = NULL
                WHERE id = ?
                "#,
            )
            .bind(Mode::Deleted.as_i64())
            .bind(id)
            .execute(&mut *tx)
            .await?;
            Some(load_comment(&mut *tx, id).await?)
        } else {
            sqlx::query("DELETE FROM comments WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            None
        };

        let purged = remove_stale(&mut *tx).await?;
        tx.commit().await?;
        tracing::debug!(comment_id = id, soft = placeholder.is_some(), purged, "comment deleted");
        Ok(placeholder)
    })
    .await
}

/// Deleted placeholders whose replies are all gone.
async fn remove_stale(conn: &mut SqliteConnection) -> Result<u64, StoreError> {
    let mut total = 0;
    loop {
        let removed = sqlx::query(
            r#"
            DELETE FROM comments
            WHERE mode = ?
              AND id NOT IN (SELECT parent FROM comments WHERE parent IS NOT NULL)
            "#,
        )
        .bind(Mode::Deleted.as_i64())
        .execute(&mut *conn)
        .await?
        .rows_affected();
        if removed == 0 {
            return Ok(total);
        }
        total += removed;
    }
}

pub async fn purge_stale_deleted(db: &Database) -> Result<u64, StoreError> {
    db.bounded(async {
        let mut tx = db.begin_write().await?;
        let purged = remove_stale(&mut *tx).await?;
        tx.commit().await?;
        Ok::<_, StoreError>(purged)
    })
    .await
}

/// Drops pending comments that waited longer than `older_than` seconds.
pub async fn purge_moderated(db: &Database, older_than: f64, now: f64) -> Result<u64, StoreError> {
    db.bounded(async {
        let purged = sqlx::query("DELETE FROM comments WHERE mode = ? AND ? - created > ?")
            .bind(Mode::Moderation.as_i64())
            .bind(now)
            .bind(older_than)
            .execute(db.pool())
            .await?
            .rows_affected();
        Ok::<_, StoreError>(purged)
    })
    .await
}

/// Counts a like or dislike unless `remote_addr` is already in the voter set.
pub async fn vote_comment(
    db: &Database,
    id: i64,
    remote_addr: &str,
    upvote: bool,
) -> Result<VoteOutcome, StoreError> {
    db.bounded(async {
        let mut tx = db.begin_write().await?;
        let mut comment = load_comment(&mut *tx, id).await?;
        if comment.voters.contains(remote_addr.as_bytes()) {
            return Ok(VoteOutcome {
                likes: comment.likes,
                dislikes: comment.dislikes,
                counted: false,
            });
        }

        comment.voters.add(remote_addr.as_bytes());
        if upvote {
            comment.likes += 1;
        } else {
            comment.dislikes += 1;
        }
        sqlx::query("UPDATE comments SET likes = ?, dislikes = ?, voters = ? WHERE id = ?")
            .bind(comment.likes)
            .bind(comment.dislikes)
            .bind(comment.voters.as_bytes().as_slice())
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(VoteOutcome {
            likes: comment.likes,
            dislikes: comment.dislikes,
            counted: true,
        })
    })
    .await
}

/// Accepted comments per uri, in input order; unknown uris count zero.
pub async fn count_comments(db: &Database, uris: &[String]) -> Result<Vec<i64>, StoreError> {
    if uris.is_empty() {
        return Ok(Vec::new());
    }
    db.bounded(async {
        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT t.uri AS uri, COUNT(c.id) AS total \
             FROM comments c INNER JOIN threads t ON t.id = c.tid WHERE c.mode = ",
        );
        builder.push_bind(Mode::Accepted.as_i64());
        builder.push(" AND t.uri IN (");
        let mut separated = builder.separated(", ");
        for uri in uris {
            separated.push_bind(uri);
        }
        separated.push_unseparated(") GROUP BY t.uri");

        let rows = builder.build().fetch_all(db.pool()).await?;
        let mut by_uri: HashMap<String, i64> = HashMap::with_capacity(rows.len());
        for row in rows {
            by_uri.insert(row.try_get("uri")?, row.try_get("total")?);
        }
        Ok::<_, StoreError>(uris
            .iter()
            .map(|uri| by_uri.get(uri).copied().unwrap_or(0))
            .collect())
    })
    .await
}

/// Whether `email` has an accepted comment from the last six months.
pub async fn is_approved_author(db: &Database, email: &str, now: f64) -> Result<bool, StoreError> {
    db.bounded(async {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM comments WHERE email = ? AND mode = ? AND created > ?",
        )
        .bind(email)
        .bind(Mode::Accepted.as_i64())
        .bind(now - ACQUAINTANCE_WINDOW_SECS)
        .fetch_one(db.pool())
        .await?;
        Ok::<_, StoreError>(count > 0)
    })
    .await
}

fn map_comment(row: &SqliteRow) -> Result<Comment, sqlx::Error> {
    let raw_mode: i64 = row.try_get("mode")?;
    let mode = Mode::try_from(raw_mode).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
    let likes: i64 = row.try_get("likes")?;
    let dislikes: i64 = row.try_get("dislikes")?;
    let bytes: Vec<u8> = row.try_get("voters")?;
    // The submitter is seeded at insert, hence the extra element.
    let voter_count = usize::try_from(likes + dislikes + 1).unwrap_or(0);
    let voters = VoterSet::recover_from(&bytes, voter_count)
        .ok_or_else(|| sqlx::Error::Decode("voters column has an unexpected size".into()))?;
    Ok(Comment {
        thread_id: row.try_get("tid")?,
        id: row.try_get("id")?,
        parent: row.try_get("parent")?,
        created: row.try_get("created")?,
        modified: row.try_get("modified")?,
        mode,
        remote_addr: row.try_get::<Option<String>, _>("remote_addr")?.unwrap_or_default(),
        text: row.try_get::<Option<String>, _>("text")?.unwrap_or_default(),
        author: row.try_get("author")?,
        email: row.try_get("email")?,
        website: row.try_get("website")?,
        likes,
        dislikes,
        voters,
        notification: row.try_get("notification")?,
    })
}
