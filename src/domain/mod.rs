pub mod channel;
pub mod command;
pub mod entities;
pub mod errors;
pub mod event;
pub mod ports;

// Re-export the domain boundary types and ports.
pub use channel::{Channel, PostType};
pub use command::{Command, DeleteType, ReactionType};
pub use entities::{EndEffect, NewComment, PostLikeKey, ReactionKey, Redaction};
pub use errors::StoreError;
pub use event::Event;
pub use ports::{CommentStore, StoreTx};
