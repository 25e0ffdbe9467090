use crate::domain::comments::Comment;
use crate::domain::threads::Thread;

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    ThreadCreated(Thread),
    CommentCreated { thread: Thread, comment: Comment },
    CommentEdited(Comment),
    CommentDeleted { id: i64 },
    CommentActivated { id: i64 },
    CommentVoted {
        id: i64,
        upvote: bool,
        likes: i64,
        dislikes: i64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ThreadCreated,
    CommentCreated,
    CommentEdited,
    CommentDeleted,
    CommentActivated,
    CommentVoted,
}

impl EventKind {
    pub const ALL: [EventKind; 6] = [
        EventKind::ThreadCreated,
        EventKind::CommentCreated,
        EventKind::CommentEdited,
        EventKind::CommentDeleted,
        EventKind::CommentActivated,
        EventKind::CommentVoted,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::ThreadCreated => "comments.new:new-thread",
            EventKind::CommentCreated => "comments.new:finish",
            EventKind::CommentEdited => "comments.edit",
            EventKind::CommentDeleted => "comments.delete",
            EventKind::CommentActivated => "comments.activate",
            EventKind::CommentVoted => "comments.vote",
        }
    }
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::ThreadCreated(_) => EventKind::ThreadCreated,
            Event::CommentCreated { .. } => EventKind::CommentCreated,
            Event::CommentEdited(_) => EventKind::CommentEdited,
            Event::CommentDeleted { .. } => EventKind::CommentDeleted,
            Event::CommentActivated { .. } => EventKind::CommentActivated,
            Event::CommentVoted { .. } => EventKind::CommentVoted,
        }
    }
}
