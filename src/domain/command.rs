use std::fmt;
use std::str::FromStr;

use crate::domain::channel::Channel;

/// A validated client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    // Move the sender to another channel.
    ChannelUpdate {
        channel: Channel,
    },
    CommentCreation {
        channel: Channel,
        invoker_id: String,
        body: String,
        parent_comment_id: Option<i64>,
    },
    CommentUpdate {
        channel: Channel,
        comment_id: i64,
        body: String,
    },
    CommentDeletion {
        channel: Channel,
        comment_id: i64,
        delete_type: DeleteType,
        invoker_id: String,
    },
    CommentReaction {
        channel: Channel,
        comment_id: i64,
        reaction: ReactionType,
        invoker_id: String,
    },
    PostLike {
        channel: Channel,
        invoker_id: String,
    },
}

impl Command {
    /// Channel the command targets (or subscribes to).
    pub fn channel(&self) -> Channel {
        match self {
            Command::ChannelUpdate { channel }
            | Command::CommentCreation { channel, .. }
            | Command::CommentUpdate { channel, .. }
            | Command::CommentDeletion { channel, .. }
            | Command::CommentReaction { channel, .. }
            | Command::PostLike { channel, .. } => *channel,
        }
    }

    // Wire tag, also used as the log label.
    pub fn action(&self) -> &'static str {
        match self {
            Command::ChannelUpdate { .. } => "channelUpdate",
            Command::CommentCreation { .. } => "commentCreation",
            Command::CommentUpdate { .. } => "commentUpdate",
            Command::CommentDeletion { .. } => "commentDeletion",
            Command::CommentReaction { .. } => "commentReaction",
            Command::PostLike { .. } => "postLike",
        }
    }
}

/// How a comment is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteType {
    // Author retracts their comment; the row stays with a placeholder body.
    User,
    // Moderator redaction; the placeholder body also detaches the author.
    Admin,
    // Moderator hard delete of the row.
    Full,
}

impl DeleteType {
    pub fn as_str(self) -> &'static str {
        match self {
            DeleteType::User => "user",
            DeleteType::Admin => "admin",
            DeleteType::Full => "full",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown delete type `{0}`")]
pub struct UnknownDeleteType(pub String);

impl FromStr for DeleteType {
    type Err = UnknownDeleteType;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(DeleteType::User),
            "admin" => Ok(DeleteType::Admin),
            "full" => Ok(DeleteType::Full),
            other => Err(UnknownDeleteType(other.to_string())),
        }
    }
}

/// Reaction tag stored in `CommentReaction.type`.
///
/// Up and down votes are mutually exclusive per user and comment; every other tag is an
/// independent toggle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReactionType {
    UpVote,
    DownVote,
    Other(String),
}

impl ReactionType {
    pub fn as_str(&self) -> &str {
        match self {
            ReactionType::UpVote => "upVote",
            ReactionType::DownVote => "downVote",
            ReactionType::Other(tag) => tag,
        }
    }

    /// The vote this one replaces, or `None` for non-vote reactions.
    pub fn opposing_vote(&self) -> Option<ReactionType> {
        match self {
            ReactionType::UpVote => Some(ReactionType::DownVote),
            ReactionType::DownVote => Some(ReactionType::UpVote),
            ReactionType::Other(_) => None,
        }
    }
}

impl From<&str> for ReactionType {
    fn from(tag: &str) -> Self {
        match tag {
            "upVote" => ReactionType::UpVote,
            "downVote" => ReactionType::DownVote,
            other => ReactionType::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ReactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl serde::Serialize for ReactionType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn when_tag_is_a_vote_then_it_maps_to_the_vote_variant() {
        assert_eq!(ReactionType::from("upVote"), ReactionType::UpVote);
        assert_eq!(ReactionType::from("downVote"), ReactionType::DownVote);
        assert_eq!(
            ReactionType::from("heart"),
            ReactionType::Other("heart".to_string())
        );
    }

    #[test]
    fn votes_oppose_each_other_and_other_tags_oppose_nothing() {
        assert_eq!(
            ReactionType::UpVote.opposing_vote(),
            Some(ReactionType::DownVote)
        );
        assert_eq!(
            ReactionType::DownVote.opposing_vote(),
            Some(ReactionType::UpVote)
        );
        assert_eq!(ReactionType::from("laugh").opposing_vote(), None);
    }

    #[test]
    fn when_delete_type_is_unknown_then_parse_fails() {
        assert_eq!("admin".parse::<DeleteType>(), Ok(DeleteType::Admin));
        assert!("soft".parse::<DeleteType>().is_err());
    }
}
