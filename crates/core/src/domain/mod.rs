pub mod comments;
pub mod events;
pub mod guard;
pub mod replies;
pub mod threads;
