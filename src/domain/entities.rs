use serde::Serialize;

use crate::domain::channel::Channel;
use crate::domain::command::ReactionType;

/// Commenter id written when a moderator detaches a comment from its author.
pub const ANONYMOUS_COMMENTER_ID: &str = "0";

// Sent as `commentParent` for top-level comments.
pub const NO_PARENT_SENTINEL: i64 = -1;

/// Row data for a new comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComment {
    pub channel: Channel,
    pub body: String,
    pub commenter_id: String,
    pub parent_comment_id: Option<i64>,
}

/// Placeholder written over a removed comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redaction {
    ByUser,
    ByAdmin,
}

impl Redaction {
    pub fn body(self) -> &'static str {
        match self {
            Redaction::ByUser => "[comment removed by user]",
            Redaction::ByAdmin => "[comment removed by admin]",
        }
    }

    /// Admin redactions also detach the author.
    pub fn clears_commenter(self) -> bool {
        matches!(self, Redaction::ByAdmin)
    }
}

/// Identity of one `CommentReaction` row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReactionKey {
    pub reaction: ReactionType,
    pub comment_id: i64,
    pub user_id: String,
}

impl ReactionKey {
    // Same comment and user, different tag.
    pub fn with_reaction(&self, reaction: ReactionType) -> Self {
        Self {
            reaction,
            comment_id: self.comment_id,
            user_id: self.user_id.clone(),
        }
    }
}

/// Identity of one `<PostType>Like` row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PostLikeKey {
    pub channel: Channel,
    pub user_id: String,
}

/// Observable transition of a reaction, carried in the broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EndEffect {
    Creation,
    Deletion,
    // A vote replaced the opposite vote.
    Inversion,
}
