use quill_core::domain::events::{Event, EventKind};
use tracing::info;

use crate::events::EventBus;

/// Subscribes a notifier that writes every event to the log.
pub fn subscribe_log_notifier(bus: &mut EventBus) {
    for kind in EventKind::ALL {
        bus.subscribe(kind, |event| async move { log_event(&event) });
    }
}

fn log_event(event: &Event) {
    let kind = event.kind().as_str();
    match event {
        Event::ThreadCreated(thread) => {
            info!(event = kind, thread_id = thread.id, uri = %thread.uri, title = %thread.title, "thread created");
        }
        Event::CommentCreated { thread, comment } => {
            info!(
                event = kind,
                uri = %thread.uri,
                comment_id = comment.id,
                parent = ?comment.parent,
                mode = comment.mode.as_i64(),
                author = comment.author.as_deref().unwrap_or("anonymous"),
                "new comment"
            );
        }
        Event::CommentEdited(comment) => {
            info!(event = kind, comment_id = comment.id, "comment edited");
        }
        Event::CommentDeleted { id } => {
            info!(event = kind, comment_id = id, "comment deleted");
        }
        Event::CommentActivated { id } => {
            info!(event = kind, comment_id = id, "comment activated");
        }
        Event::CommentVoted {
            id,
            upvote,
            likes,
            dislikes,
        } => {
            info!(event = kind, comment_id = id, upvote, likes, dislikes, "comment voted");
        }
    }
}
