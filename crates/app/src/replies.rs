use quill_core::domain::comments::ModeFilter;
use quill_core::domain::replies::{ReplyCounts, ReplyPage, ReplyView};
use quill_infra::db::comments_repo::{count_reply, fetch_comments, FetchQuery, OrderBy, ParentFilter};
use quill_infra::db::{Database, StoreError};

use crate::render::CommentRenderer;

#[derive(Debug, Clone, PartialEq)]
pub struct FetchParams {
    pub uri: String,
    /// `None` asks for the whole tree; `Some(id)` for the replies of one comment.
    pub parent: Option<i64>,
    pub after: f64,
    pub limit: Option<i64>,
    pub nested_limit: Option<i64>,
    pub plain: bool,
}

impl FetchParams {
    pub fn tree(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            parent: None,
            after: 0.0,
            limit: None,
            nested_limit: None,
            plain: false,
        }
    }
}

/// Builds the reader view of a thread: top-level comments with their replies
/// one level down, each node annotated with total and hidden reply counts.
///
/// Counts come from one grouped query; comments from one query per level.
pub async fn fetch_replies(
    db: &Database,
    renderer: &CommentRenderer,
    params: &FetchParams,
) -> Result<ReplyPage, StoreError> {
    let mut counts = count_reply(db, &params.uri, ModeFilter::PUBLIC, params.after).await?;
    if let Some(parent) = params.parent {
        // `after` may have filtered out the rows that established this key.
        counts.ensure(parent);
    }

    match params.parent {
        None => {
            let top_level = fetch_level(db, renderer, params, ParentFilter::TopLevel, params.limit).await?;
            let mut replies = Vec::with_capacity(top_level.len());
            for mut view in top_level {
                if counts.contains(view.id) {
                    let nested = fetch_level(
                        db,
                        renderer,
                        params,
                        ParentFilter::RepliesTo(view.id),
                        params.nested_limit,
                    )
                    .await?;
                    view.attach_replies(counts.get(view.id), nested);
                } else {
                    view.attach_replies(0, Vec::new());
                }
                replies.push(view);
            }
            Ok(ReplyPage::new(None, counts.get(ReplyCounts::TOP_LEVEL), replies))
        }
        Some(parent) if parent > 0 => {
            let replies = fetch_level(
                db,
                renderer,
                params,
                ParentFilter::RepliesTo(parent),
                params.limit,
            )
            .await?;
            Ok(ReplyPage::new(Some(parent), counts.get(parent), replies))
        }
        Some(parent) => Ok(ReplyPage::empty(Some(parent))),
    }
}

async fn fetch_level(
    db: &Database,
    renderer: &CommentRenderer,
    params: &FetchParams,
    parent: ParentFilter,
    limit: Option<i64>,
) -> Result<Vec<ReplyView>, StoreError> {
    let query = FetchQuery {
        uri: params.uri.clone(),
        modes: ModeFilter::PUBLIC,
        after: params.after,
        parent,
        order_by: OrderBy::Id,
        ascending: true,
        limit,
    };
    let comments = fetch_comments(db, &query).await?;
    Ok(comments
        .iter()
        .map(|comment| renderer.view(comment, params.plain))
        .collect())
}

#[cfg(test)]
mod tests {
    use quill_core::domain::comments::{Mode, NewComment};
    use quill_core::domain::replies::ReplyView;
    use quill_infra::db::comments_repo::{add_comment, add_comment_at, delete_comment};
    use quill_infra::db::threads_repo::new_thread;

    use super::{fetch_replies, FetchParams};
    use crate::state::testing::test_state;
    use crate::state::AppState;

    fn candidate(text: &str, parent: Option<i64>) -> NewComment {
        NewComment {
            parent,
            mode: Mode::Accepted,
            remote_addr: "192.168.1.1".to_string(),
            text: text.to_string(),
            author: None,
            email: None,
            website: None,
            notification: false,
        }
    }

    async fn post(state: &AppState, text: &str, parent: Option<i64>) -> i64 {
        add_comment(&state.db, "/post-1", &candidate(text, parent))
            .await
            .unwrap()
            .id
    }

    fn ids(views: &[ReplyView]) -> Vec<i64> {
        views.iter().map(|view| view.id).collect()
    }

    #[tokio::test]
    async fn builds_two_level_tree_with_flattened_replies() {
        let state = test_state(|_| {}).await;
        new_thread(&state.db, "/post-1", "Hello").await.unwrap();
        let a = post(&state, "comment A", None).await;
        let b = post(&state, "reply B to A", Some(a)).await;
        let c = post(&state, "reply C to B", Some(b)).await;

        let page = fetch_replies(&state.db, &state.renderer, &FetchParams::tree("/post-1"))
            .await
            .unwrap();
        assert_eq!(page.id, None);
        assert_eq!(page.total_replies, 1);
        assert_eq!(page.hidden_replies, 0);
        assert_eq!(ids(&page.replies), vec![a]);

        let top = &page.replies[0];
        assert_eq!(top.total_replies, Some(2));
        assert_eq!(top.hidden_replies, Some(0));
        let nested = top.replies.as_ref().unwrap();
        assert_eq!(ids(nested), vec![b, c]);
        assert!(nested.iter().all(|view| view.parent == Some(a)));
        assert!(nested.iter().all(|view| view.replies.is_none()));
    }

    #[tokio::test]
    async fn limits_produce_hidden_counts() {
        let state = test_state(|_| {}).await;
        new_thread(&state.db, "/post-1", "Hello").await.unwrap();
        let first = post(&state, "first", None).await;
        post(&state, "second", None).await;
        post(&state, "third", None).await;
        for i in 0..3 {
            post(&state, &format!("reply {i}"), Some(first)).await;
        }

        let params = FetchParams {
            limit: Some(2),
            nested_limit: Some(1),
            ..FetchParams::tree("/post-1")
        };
        let page = fetch_replies(&state.db, &state.renderer, &params).await.unwrap();
        assert_eq!(page.total_replies, 3);
        assert_eq!(page.hidden_replies, 1);
        let top = &page.replies[0];
        assert_eq!(top.total_replies, Some(3));
        assert_eq!(top.hidden_replies, Some(2));
        assert_eq!(top.replies.as_ref().unwrap().len(), 1);

        let childless = &page.replies[1];
        assert_eq!(childless.total_replies, Some(0));
        assert_eq!(childless.hidden_replies, Some(0));
        assert_eq!(childless.replies.as_deref(), Some(&[][..]));
    }

    #[tokio::test]
    async fn parent_requests_return_one_level() {
        let state = test_state(|_| {}).await;
        new_thread(&state.db, "/post-1", "Hello").await.unwrap();
        let a = post(&state, "comment A", None).await;
        let b = post(&state, "reply B", Some(a)).await;

        let params = FetchParams {
            parent: Some(a),
            ..FetchParams::tree("/post-1")
        };
        let page = fetch_replies(&state.db, &state.renderer, &params).await.unwrap();
        assert_eq!(page.id, Some(a));
        assert_eq!(page.total_replies, 1);
        assert_eq!(ids(&page.replies), vec![b]);

        for parent in [0, -3] {
            let params = FetchParams {
                parent: Some(parent),
                ..FetchParams::tree("/post-1")
            };
            let page = fetch_replies(&state.db, &state.renderer, &params).await.unwrap();
            assert_eq!(page.id, Some(parent));
            assert_eq!(page.total_replies, 0);
            assert!(page.replies.is_empty());
        }
    }

    #[tokio::test]
    async fn pending_comments_are_hidden_and_deleted_ones_kept() {
        let state = test_state(|_| {}).await;
        new_thread(&state.db, "/post-1", "Hello").await.unwrap();
        let kept = post(&state, "will be deleted", None).await;
        post(&state, "keeps the placeholder", Some(kept)).await;
        let mut pending = candidate("awaiting moderation", None);
        pending.mode = Mode::Moderation;
        add_comment(&state.db, "/post-1", &pending).await.unwrap();
        delete_comment(&state.db, kept).await.unwrap();

        let page = fetch_replies(&state.db, &state.renderer, &FetchParams::tree("/post-1"))
            .await
            .unwrap();
        assert_eq!(page.total_replies, 1);
        assert_eq!(ids(&page.replies), vec![kept]);
        assert_eq!(page.replies[0].mode, Mode::Deleted.as_i64());
        assert_eq!(page.replies[0].text, "");
    }

    #[tokio::test]
    async fn after_filter_and_plain_text() {
        let state = test_state(|_| {}).await;
        new_thread(&state.db, "/post-1", "Hello").await.unwrap();
        add_comment_at(&state.db, "/post-1", &candidate("old *one*", None), 10.0)
            .await
            .unwrap();
        add_comment_at(&state.db, "/post-1", &candidate("new *one*", None), 20.0)
            .await
            .unwrap();

        let params = FetchParams {
            after: 15.0,
            plain: true,
            ..FetchParams::tree("/post-1")
        };
        let page = fetch_replies(&state.db, &state.renderer, &params).await.unwrap();
        assert_eq!(page.total_replies, 1);
        assert_eq!(page.replies[0].text, "new *one*");

        let rendered = fetch_replies(&state.db, &state.renderer, &FetchParams::tree("/post-1"))
            .await
            .unwrap();
        assert!(rendered.replies[0].text.contains("<em>one</em>"));
        assert!(!rendered.replies[0].hash.is_empty());
    }

    #[tokio::test]
    async fn unknown_thread_yields_empty_tree() {
        let state = test_state(|_| {}).await;
        let page = fetch_replies(&state.db, &state.renderer, &FetchParams::tree("/nowhere"))
            .await
            .unwrap();
        assert_eq!(page.total_replies, 0);
        assert!(page.replies.is_empty());
    }
}
