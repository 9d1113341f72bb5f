use serde::Serialize;

use crate::domain::command::ReactionType;
use crate::domain::entities::EndEffect;

/// Broadcast sent to every subscriber of the mutated channel.
///
/// Field names are the stable wire identifiers clients key on; each variant carries enough to
/// update a local view without re-fetching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action")]
pub enum Event {
    #[serde(rename = "commentCreationBroadcast")]
    CommentCreation {
        #[serde(rename = "commentID")]
        comment_id: i64,
        // Parent id, or -1 for a top-level comment.
        #[serde(rename = "commentParent")]
        comment_parent: i64,
        #[serde(rename = "commentBody")]
        comment_body: String,
        #[serde(rename = "commenterID")]
        commenter_id: String,
    },
    #[serde(rename = "commentUpdateBroadcast")]
    CommentUpdate {
        #[serde(rename = "commentID")]
        comment_id: i64,
        #[serde(rename = "commentBody")]
        comment_body: String,
    },
    // Redactions carry the placeholder body; hard deletes carry none.
    #[serde(rename = "commentDeletionBroadcast")]
    CommentDeletion {
        #[serde(rename = "commentID")]
        comment_id: i64,
        #[serde(rename = "commentBody", skip_serializing_if = "Option::is_none")]
        comment_body: Option<String>,
    },
    #[serde(rename = "commentReactionBroadcast")]
    CommentReaction {
        #[serde(rename = "reactionType")]
        reaction_type: ReactionType,
        #[serde(rename = "endEffect")]
        end_effect: EndEffect,
        #[serde(rename = "reactingUserID")]
        reacting_user_id: String,
        #[serde(rename = "commentID")]
        comment_id: i64,
    },
    #[serde(rename = "postLikeBroadcast")]
    PostLike {
        #[serde(rename = "likerID")]
        liker_id: String,
        // +1 for a new like, -1 for a removed one.
        change: i8,
    },
}

impl Event {
    pub fn action(&self) -> &'static str {
        match self {
            Event::CommentCreation { .. } => "commentCreationBroadcast",
            Event::CommentUpdate { .. } => "commentUpdateBroadcast",
            Event::CommentDeletion { .. } => "commentDeletionBroadcast",
            Event::CommentReaction { .. } => "commentReactionBroadcast",
            Event::PostLike { .. } => "postLikeBroadcast",
        }
    }
}
