use quill_core::domain::comments::{Comment, Mode, NewComment};
use quill_core::domain::events::Event;
use quill_core::domain::threads::Thread;
use quill_core::error::CoreError;
use quill_core::types::timestamp::now_secs;
use quill_core::types::ThreadUri;
use quill_infra::db::comments_repo::{add_comment, is_approved_author};
use quill_infra::db::guard_repo::check_new_comment;
use quill_infra::db::threads_repo::{get_thread_by_uri, new_thread};
use quill_infra::db::StoreError;
use thiserror::Error;
use tracing::{debug, info};

use crate::state::AppState;
use crate::title::{fetch_title, PageInfo, TitleError, DEFAULT_TITLE};

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("{0}")]
    Invalid(#[from] CoreError),
    #[error("{0}")]
    Forbidden(String),
    #[error("page title lookup failed: {0}")]
    Title(#[from] TitleError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A comment as posted by a client, before any checks ran.
#[derive(Debug, Clone)]
pub struct Submission {
    pub uri: String,
    /// Thread title sent by the client; looked up from the page when empty.
    pub title: Option<String>,
    /// Origin of the posting page, used when no public host is configured.
    pub origin: Option<String>,
    pub comment: NewComment,
}

#[derive(Debug, Clone)]
pub struct Submitted {
    pub thread: Thread,
    pub comment: Comment,
}

pub async fn submit(state: &AppState, submission: Submission) -> Result<Submitted, SubmitError> {
    let uri = ThreadUri::try_from(submission.uri.as_str())?;
    let mut candidate = submission.comment.validated()?;
    candidate.author = candidate.author.map(|author| ammonia::clean_text(&author));

    let verdict = check_new_comment(
        &state.db,
        &state.config.guard,
        uri.as_str(),
        &candidate,
        now_secs(),
    )
    .await;
    if !verdict.allowed {
        info!(uri = %uri, remote_addr = %candidate.remote_addr, reason = %verdict.reason, "comment rejected by guard");
        return Err(SubmitError::Forbidden(verdict.reason));
    }

    let thread = resolve_thread(
        state,
        uri.as_str(),
        submission.title.as_deref(),
        submission.origin.as_deref(),
    )
    .await?;
    candidate.mode = pick_mode(state, &candidate).await?;

    let comment = add_comment(&state.db, &thread.uri, &candidate).await?;
    state.events.publish(Event::CommentCreated {
        thread: thread.clone(),
        comment: comment.clone(),
    });
    Ok(Submitted { thread, comment })
}

async fn resolve_thread(
    state: &AppState,
    uri: &str,
    title: Option<&str>,
    origin: Option<&str>,
) -> Result<Thread, SubmitError> {
    match get_thread_by_uri(&state.db, uri).await {
        Ok(thread) => return Ok(thread),
        Err(StoreError::NotFound) => {}
        Err(err) => return Err(err.into()),
    }

    let page = match title.map(str::trim).filter(|title| !title.is_empty()) {
        Some(title) => PageInfo {
            uri: uri.to_string(),
            title: title.to_string(),
        },
        None => match state.config.public_host.as_deref().or(origin) {
            Some(host) => fetch_title(&state.http_client, host, uri).await?,
            None => {
                debug!(uri, "no host to read the page title from");
                PageInfo {
                    uri: uri.to_string(),
                    title: DEFAULT_TITLE.to_string(),
                }
            }
        },
    };

    match new_thread(&state.db, &page.uri, &page.title).await {
        Ok(thread) => {
            state.events.publish(Event::ThreadCreated(thread.clone()));
            Ok(thread)
        }
        // Lost the race against a concurrent first comment.
        Err(StoreError::Conflict(_)) => Ok(get_thread_by_uri(&state.db, &page.uri).await?),
        Err(err) => Err(err.into()),
    }
}

async fn pick_mode(state: &AppState, candidate: &NewComment) -> Result<Mode, StoreError> {
    let moderation = &state.config.moderation;
    if !moderation.enabled {
        return Ok(Mode::Accepted);
    }
    if moderation.approve_acquaintance {
        if let Some(email) = candidate.email.as_deref() {
            if is_approved_author(&state.db, email, now_secs()).await? {
                return Ok(Mode::Accepted);
            }
        }
    }
    Ok(Mode::Moderation)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use quill_core::domain::comments::{Mode, NewComment};
    use quill_core::domain::events::EventKind;
    use quill_infra::db::comments_repo::get_comment;
    use quill_infra::db::threads_repo::{get_thread_by_uri, new_thread};
    use tokio::sync::mpsc;

    use super::{submit, SubmitError, Submission};
    use crate::events::EventBus;
    use crate::state::testing::test_state;
    use crate::title::DEFAULT_TITLE;

    fn submission(uri: &str, text: &str) -> Submission {
        Submission {
            uri: uri.to_string(),
            title: Some("Hello".to_string()),
            origin: None,
            comment: NewComment {
                parent: None,
                mode: Mode::Accepted,
                remote_addr: "10.1.1.1".to_string(),
                text: text.to_string(),
                author: None,
                email: None,
                website: None,
                notification: false,
            },
        }
    }

    #[tokio::test]
    async fn first_comment_creates_thread_and_publishes_events() {
        let mut state = test_state(|_| {}).await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut bus = EventBus::new();
        for kind in [EventKind::ThreadCreated, EventKind::CommentCreated] {
            let tx = tx.clone();
            bus.subscribe(kind, move |event| {
                let tx = tx.clone();
                async move {
                    let _ = tx.send(event.kind());
                }
            });
        }
        state.events = Arc::new(bus);

        let submitted = submit(&state, submission("/post-1", "first!")).await.unwrap();
        assert_eq!(submitted.thread.title, "Hello");
        assert_eq!(submitted.comment.mode, Mode::Accepted);
        assert_eq!(get_comment(&state.db, submitted.comment.id).await.unwrap().text, "first!");

        let mut kinds = Vec::new();
        for _ in 0..2 {
            let kind = tokio::time::timeout(Duration::from_secs(1), rx.recv())
                .await
                .unwrap()
                .unwrap();
            kinds.push(kind);
        }
        assert!(kinds.contains(&EventKind::ThreadCreated));
        assert!(kinds.contains(&EventKind::CommentCreated));
    }

    #[tokio::test]
    async fn existing_thread_is_reused() {
        let state = test_state(|_| {}).await;
        let thread = new_thread(&state.db, "/post-1", "Original").await.unwrap();
        let submitted = submit(&state, submission("/post-1", "hello")).await.unwrap();
        assert_eq!(submitted.thread, thread);
    }

    #[tokio::test]
    async fn missing_title_without_host_is_untitled() {
        let state = test_state(|_| {}).await;
        let mut request = submission("/post-1", "hello");
        request.title = Some("   ".to_string());
        submit(&state, request).await.unwrap();
        let thread = get_thread_by_uri(&state.db, "/post-1").await.unwrap();
        assert_eq!(thread.title, DEFAULT_TITLE);
    }

    #[tokio::test]
    async fn moderation_holds_unknown_authors() {
        let state = test_state(|config| {
            config.moderation.enabled = true;
            config.moderation.approve_acquaintance = true;
        })
        .await;
        let mut request = submission("/post-1", "hello");
        request.comment.email = Some("jane@example.com".to_string());
        let held = submit(&state, request.clone()).await.unwrap();
        assert_eq!(held.comment.mode, Mode::Moderation);

        quill_infra::db::comments_repo::activate_comment(&state.db, held.comment.id)
            .await
            .unwrap();
        request.comment.remote_addr = "10.1.1.2".to_string();
        let trusted = submit(&state, request).await.unwrap();
        assert_eq!(trusted.comment.mode, Mode::Accepted);
    }

    #[tokio::test]
    async fn guard_rejection_is_forbidden() {
        let state = test_state(|config| config.guard.rate_limit = 0).await;
        submit(&state, submission("/post-1", "one")).await.unwrap();
        let err = submit(&state, submission("/post-1", "two")).await.unwrap_err();
        match err {
            SubmitError::Forbidden(reason) => assert!(reason.contains("ratelimit exceeded")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn invalid_input_is_rejected_before_storage() {
        let state = test_state(|_| {}).await;
        assert!(matches!(
            submit(&state, submission("/post-1", "no")).await,
            Err(SubmitError::Invalid(_))
        ));
        assert!(matches!(
            submit(&state, submission("relative", "hello")).await,
            Err(SubmitError::Invalid(_))
        ));
        assert!(get_thread_by_uri(&state.db, "/post-1").await.is_err());
    }

    #[tokio::test]
    async fn author_is_escaped() {
        let state = test_state(|_| {}).await;
        let mut request = submission("/post-1", "hello");
        request.comment.author = Some("<b>Jane</b>".to_string());
        let submitted = submit(&state, request).await.unwrap();
        let author = submitted.comment.author.unwrap();
        assert!(author.starts_with("&lt;b&gt;Jane&lt;"));
        assert!(!author.contains('<'));
    }
}
