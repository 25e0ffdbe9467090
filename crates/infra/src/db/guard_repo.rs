use quill_core::domain::comments::NewComment;
use quill_core::domain::guard::{GuardPolicy, GuardVerdict, RATE_WINDOW_SECS};

use super::{Database, StoreError};

/// Runs the pre-insert anti-abuse checks for `candidate` on `uri`.
///
/// Never fails: a count that cannot be read is logged and taken as zero.
pub async fn check_new_comment(
    db: &Database,
    policy: &GuardPolicy,
    uri: &str,
    candidate: &NewComment,
    now: f64,
) -> GuardVerdict {
    if !policy.enabled {
        return GuardVerdict::allow();
    }

    let verdict = policy.check_required_fields(candidate);
    if !verdict.allowed {
        return verdict;
    }

    let addr = candidate.remote_addr.as_str();
    let recent = count_or_zero("ratelimit", recent_by_addr(db, addr, now)).await;
    let verdict = policy.check_rate(addr, recent);
    if !verdict.allowed {
        return verdict;
    }

    match candidate.parent {
        None => {
            let existing = count_or_zero("direct_reply", direct_by_addr(db, uri, addr)).await;
            policy.check_direct_replies(uri, existing)
        }
        Some(parent) if !policy.reply_to_self => {
            let open = count_or_zero(
                "reply_to_self",
                own_open_parent(db, addr, parent, now, policy.max_age),
            )
            .await;
            policy.check_reply_to_self(open)
        }
        Some(_) => GuardVerdict::allow(),
    }
}

async fn count_or_zero<F>(check: &'static str, count: F) -> i64
where
    F: Future<Output = Result<i64, StoreError>>,
{
    match count.await {
        Ok(count) => count,
        Err(err) => {
            tracing::warn!(check, error = %err, "guard count failed, assuming zero");
            0
        }
    }
}

async fn recent_by_addr(db: &Database, addr: &str, now: f64) -> Result<i64, StoreError> {
    db.bounded(async {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(id) FROM comments WHERE remote_addr = ? AND ? - created < ?",
        )
        .bind(addr)
        .bind(now)
        .bind(RATE_WINDOW_SECS)
        .fetch_one(db.pool())
        .await?;
        Ok::<_, StoreError>(count)
    })
    .await
}

async fn direct_by_addr(db: &Database, uri: &str, addr: &str) -> Result<i64, StoreError> {
    db.bounded(async {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(c.id)
            FROM comments c
            INNER JOIN threads t ON t.id = c.tid
            WHERE t.uri = ? AND c.remote_addr = ? AND c.parent IS NULL
            "#,
        )
        .bind(uri)
        .bind(addr)
        .fetch_one(db.pool())
        .await?;
        Ok::<_, StoreError>(count)
    })
    .await
}

async fn own_open_parent(
    db: &Database,
    addr: &str,
    parent: i64,
    now: f64,
    max_age: f64,
) -> Result<i64, StoreError> {
    db.bounded(async {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(id) FROM comments WHERE remote_addr = ? AND id = ? AND ? - created < ?",
        )
        .bind(addr)
        .bind(parent)
        .bind(now)
        .bind(max_age)
        .fetch_one(db.pool())
        .await?;
        Ok::<_, StoreError>(count)
    })
    .await
}

#[cfg(test)]
mod tests {
    use quill_core::domain::guard::GuardPolicy;
    use quill_core::types::timestamp::now_secs;

    use super::check_new_comment;
    use crate::db::comments_repo::add_comment;
    use crate::db::testing::{candidate, memory_db, thread};

    fn relaxed() -> GuardPolicy {
        GuardPolicy {
            rate_limit: 100,
            direct_reply: 100,
            ..GuardPolicy::default()
        }
    }

    #[tokio::test]
    async fn rate_limit_expires_after_window() {
        let db = memory_db().await;
        thread(&db, "/post").await;
        let parent = add_comment(&db, "/post", &candidate("parent", None)).await.unwrap();
        for _ in 0..5 {
            let mut reply = candidate("reply", Some(parent.id));
            reply.remote_addr = "10.0.0.9".to_string();
            add_comment(&db, "/post", &reply).await.unwrap();
        }
        let mut sixth = candidate("sixth", Some(parent.id));
        sixth.remote_addr = "10.0.0.9".to_string();
        add_comment(&db, "/post", &sixth).await.unwrap();

        let policy = GuardPolicy {
            rate_limit: 5,
            ..relaxed()
        };
        let now = now_secs();
        let verdict = check_new_comment(&db, &policy, "/post", &sixth, now).await;
        assert!(!verdict.allowed);
        assert!(verdict.reason.contains("ratelimit exceeded"));

        let later = check_new_comment(&db, &policy, "/post", &sixth, now + 61.0).await;
        assert!(later.allowed, "{}", later.reason);
    }

    #[tokio::test]
    async fn direct_reply_limit_counts_top_level_per_address() {
        let db = memory_db().await;
        thread(&db, "/post").await;
        for _ in 0..3 {
            add_comment(&db, "/post", &candidate("top", None)).await.unwrap();
        }
        let policy = GuardPolicy {
            direct_reply: 2,
            ..relaxed()
        };
        let verdict = check_new_comment(&db, &policy, "/post", &candidate("more", None), now_secs())
            .await;
        assert!(!verdict.allowed);
        assert_eq!(verdict.reason, "3 direct responses to /post");

        let mut stranger = candidate("more", None);
        stranger.remote_addr = "10.0.0.2".to_string();
        assert!(check_new_comment(&db, &policy, "/post", &stranger, now_secs())
            .await
            .allowed);
    }

    #[tokio::test]
    async fn reply_to_self_blocked_while_editable() {
        let db = memory_db().await;
        thread(&db, "/post").await;
        let own = add_comment(&db, "/post", &candidate("mine", None)).await.unwrap();
        let reply = candidate("answering myself", Some(own.id));

        let now = now_secs();
        let verdict = check_new_comment(&db, &relaxed(), "/post", &reply, now).await;
        assert_eq!(verdict.reason, "edit time frame is still open");

        let after_window = now + relaxed().max_age + 1.0;
        assert!(check_new_comment(&db, &relaxed(), "/post", &reply, after_window)
            .await
            .allowed);

        let lenient = GuardPolicy {
            reply_to_self: true,
            ..relaxed()
        };
        assert!(check_new_comment(&db, &lenient, "/post", &reply, now).await.allowed);
    }

    #[tokio::test]
    async fn disabled_guard_allows_everything() {
        let db = memory_db().await;
        let policy = GuardPolicy {
            enabled: false,
            rate_limit: -1,
            require_email: true,
            ..GuardPolicy::default()
        };
        let verdict =
            check_new_comment(&db, &policy, "/post", &candidate("hello", None), now_secs()).await;
        assert!(verdict.allowed);
    }
}
