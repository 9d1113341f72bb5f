// Wire codec: inbound command frames and outbound broadcast frames.
//
// Inbound frames are one flat JSON object carrying the union of every command's fields; the
// `action` tag decides which of them are required. Unknown fields are ignored.

use serde::{Deserialize, Serialize};

use crate::domain::channel::UnknownPostType;
use crate::domain::command::UnknownDeleteType;
use crate::domain::entities::ANONYMOUS_COMMENTER_ID;
use crate::domain::{Channel, Command, DeleteType, Event, PostType, ReactionType};

pub const MAX_COMMENT_BODY_LEN: usize = 10_000;
pub const MAX_INVOKER_ID_LEN: usize = 64;
pub const MAX_REACTION_TAG_LEN: usize = 32;

/// Raw inbound frame as clients send it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandFrame {
    pub action: String,
    #[serde(rename = "postType", default, skip_serializing_if = "Option::is_none")]
    pub post_type: Option<String>,
    #[serde(rename = "postID", default, skip_serializing_if = "Option::is_none")]
    pub post_id: Option<i64>,
    #[serde(rename = "invokerID", default, skip_serializing_if = "Option::is_none")]
    pub invoker_id: Option<String>,
    #[serde(rename = "commentBody", default, skip_serializing_if = "Option::is_none")]
    pub comment_body: Option<String>,
    #[serde(
        rename = "parentCommentID",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub parent_comment_id: Option<i64>,
    #[serde(rename = "commentID", default, skip_serializing_if = "Option::is_none")]
    pub comment_id: Option<i64>,
    #[serde(rename = "deleteType", default, skip_serializing_if = "Option::is_none")]
    pub delete_type: Option<String>,
    #[serde(rename = "reactionType", default, skip_serializing_if = "Option::is_none")]
    pub reaction_type: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unrecognized action `{0}`")]
    UnknownAction(String),
    #[error("`{action}` requires `{field}`")]
    MissingField {
        action: &'static str,
        field: &'static str,
    },
    #[error("invalid `{field}`: {reason}")]
    InvalidField {
        field: &'static str,
        reason: &'static str,
    },
    #[error(transparent)]
    PostType(#[from] UnknownPostType),
    #[error(transparent)]
    DeleteType(#[from] UnknownDeleteType),
}

/// Decodes one text frame into a validated command.
pub fn decode_command(text: &str) -> Result<Command, DecodeError> {
    let frame: CommandFrame = serde_json::from_str(text)?;
    Command::try_from(frame)
}

/// Encodes a command back into its wire frame.
pub fn encode_command(command: &Command) -> Result<String, serde_json::Error> {
    serde_json::to_string(&CommandFrame::from(command))
}

pub fn encode_event(event: &Event) -> Result<String, serde_json::Error> {
    serde_json::to_string(event)
}

impl TryFrom<CommandFrame> for Command {
    type Error = DecodeError;

    fn try_from(frame: CommandFrame) -> Result<Self, Self::Error> {
        let mut fields = FrameFields { frame };
        let command = match fields.frame.action.as_str() {
            "channelUpdate" => Command::ChannelUpdate {
                channel: fields.channel("channelUpdate")?,
            },
            "commentCreation" => {
                let action = "commentCreation";
                Command::CommentCreation {
                    channel: fields.channel(action)?,
                    invoker_id: fields.invoker_id(action)?,
                    body: fields.comment_body(action)?,
                    parent_comment_id: fields
                        .frame
                        .parent_comment_id
                        .map(|id| positive_id("parentCommentID", id))
                        .transpose()?,
                }
            }
            "commentUpdate" => {
                let action = "commentUpdate";
                Command::CommentUpdate {
                    channel: fields.channel(action)?,
                    comment_id: fields.comment_id(action)?,
                    body: fields.comment_body(action)?,
                }
            }
            "commentDeletion" => {
                let action = "commentDeletion";
                let delete_type = fields
                    .frame
                    .delete_type
                    .take()
                    .ok_or(DecodeError::MissingField {
                        action,
                        field: "deleteType",
                    })?
                    .parse::<DeleteType>()?;
                Command::CommentDeletion {
                    channel: fields.channel(action)?,
                    comment_id: fields.comment_id(action)?,
                    delete_type,
                    invoker_id: fields.invoker_id(action)?,
                }
            }
            "commentReaction" => {
                let action = "commentReaction";
                let tag = fields
                    .frame
                    .reaction_type
                    .take()
                    .ok_or(DecodeError::MissingField {
                        action,
                        field: "reactionType",
                    })?;
                if tag.is_empty() || tag.len() > MAX_REACTION_TAG_LEN {
                    return Err(DecodeError::InvalidField {
                        field: "reactionType",
                        reason: "must be 1-32 bytes",
                    });
                }
                Command::CommentReaction {
                    channel: fields.channel(action)?,
                    comment_id: fields.comment_id(action)?,
                    reaction: ReactionType::from(tag.as_str()),
                    invoker_id: fields.invoker_id(action)?,
                }
            }
            "postLike" => {
                let action = "postLike";
                Command::PostLike {
                    channel: fields.channel(action)?,
                    invoker_id: fields.invoker_id(action)?,
                }
            }
            other => return Err(DecodeError::UnknownAction(other.to_string())),
        };
        Ok(command)
    }
}

// Per-action field extraction with uniform error reporting.
struct FrameFields {
    frame: CommandFrame,
}

impl FrameFields {
    fn channel(&mut self, action: &'static str) -> Result<Channel, DecodeError> {
        let post_type = self
            .frame
            .post_type
            .take()
            .ok_or(DecodeError::MissingField {
                action,
                field: "postType",
            })?
            .parse::<PostType>()?;
        let post_id = self.frame.post_id.ok_or(DecodeError::MissingField {
            action,
            field: "postID",
        })?;
        Ok(Channel::new(post_type, positive_id("postID", post_id)?))
    }

    fn invoker_id(&mut self, action: &'static str) -> Result<String, DecodeError> {
        let invoker_id = self
            .frame
            .invoker_id
            .take()
            .ok_or(DecodeError::MissingField {
                action,
                field: "invokerID",
            })?;
        if invoker_id.is_empty() || invoker_id.len() > MAX_INVOKER_ID_LEN {
            return Err(DecodeError::InvalidField {
                field: "invokerID",
                reason: "must be 1-64 bytes",
            });
        }
        // The anonymous sentinel must never act as a real user.
        if invoker_id == ANONYMOUS_COMMENTER_ID {
            return Err(DecodeError::InvalidField {
                field: "invokerID",
                reason: "reserved id",
            });
        }
        Ok(invoker_id)
    }

    fn comment_id(&mut self, action: &'static str) -> Result<i64, DecodeError> {
        let comment_id = self.frame.comment_id.ok_or(DecodeError::MissingField {
            action,
            field: "commentID",
        })?;
        positive_id("commentID", comment_id)
    }

    fn comment_body(&mut self, action: &'static str) -> Result<String, DecodeError> {
        let body = self
            .frame
            .comment_body
            .take()
            .ok_or(DecodeError::MissingField {
                action,
                field: "commentBody",
            })?;
        if body.trim().is_empty() {
            return Err(DecodeError::InvalidField {
                field: "commentBody",
                reason: "must not be blank",
            });
        }
        if body.chars().count() > MAX_COMMENT_BODY_LEN {
            return Err(DecodeError::InvalidField {
                field: "commentBody",
                reason: "too long",
            });
        }
        Ok(body)
    }
}

fn positive_id(field: &'static str, id: i64) -> Result<i64, DecodeError> {
    if id > 0 {
        Ok(id)
    } else {
        Err(DecodeError::InvalidField {
            field,
            reason: "must be a positive integer",
        })
    }
}

impl From<&Command> for CommandFrame {
    fn from(command: &Command) -> Self {
        let channel = command.channel();
        let mut frame = CommandFrame {
            action: command.action().to_string(),
            post_type: Some(channel.post_type.as_str().to_string()),
            post_id: Some(channel.post_id),
            ..CommandFrame::default()
        };
        match command {
            Command::ChannelUpdate { .. } => {}
            Command::CommentCreation {
                invoker_id,
                body,
                parent_comment_id,
                ..
            } => {
                frame.invoker_id = Some(invoker_id.clone());
                frame.comment_body = Some(body.clone());
                frame.parent_comment_id = *parent_comment_id;
            }
            Command::CommentUpdate {
                comment_id, body, ..
            } => {
                frame.comment_id = Some(*comment_id);
                frame.comment_body = Some(body.clone());
            }
            Command::CommentDeletion {
                comment_id,
                delete_type,
                invoker_id,
                ..
            } => {
                frame.comment_id = Some(*comment_id);
                frame.delete_type = Some(delete_type.as_str().to_string());
                frame.invoker_id = Some(invoker_id.clone());
            }
            Command::CommentReaction {
                comment_id,
                reaction,
                invoker_id,
                ..
            } => {
                frame.comment_id = Some(*comment_id);
                frame.reaction_type = Some(reaction.as_str().to_string());
                frame.invoker_id = Some(invoker_id.clone());
            }
            Command::PostLike { invoker_id, .. } => {
                frame.invoker_id = Some(invoker_id.clone());
            }
        }
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EndEffect;
    use serde_json::{Value, json};

    fn blog_42() -> Channel {
        Channel::new(PostType::Blog, 42)
    }

    #[test]
    fn when_frame_is_channel_update_then_only_channel_fields_are_required() {
        let command = decode_command(r#"{"action":"channelUpdate","postType":"blog","postID":42}"#)
            .expect("expected channel update to decode");

        assert_eq!(command, Command::ChannelUpdate { channel: blog_42() });
    }

    #[test]
    fn when_creation_omits_parent_then_parent_is_none() {
        let command = decode_command(
            r#"{"action":"commentCreation","postType":"blog","postID":42,"invokerID":"u1","commentBody":"hi","parentCommentID":null}"#,
        )
        .expect("expected creation to decode");

        assert_eq!(
            command,
            Command::CommentCreation {
                channel: blog_42(),
                invoker_id: "u1".to_string(),
                body: "hi".to_string(),
                parent_comment_id: None,
            }
        );
    }

    #[test]
    fn when_frame_has_unknown_fields_then_they_are_ignored() {
        let command = decode_command(
            r#"{"action":"postLike","postType":"project","postID":7,"invokerID":"u1","theme":"dark"}"#,
        )
        .expect("expected unknown fields to be ignored");

        assert_eq!(
            command,
            Command::PostLike {
                channel: Channel::new(PostType::Project, 7),
                invoker_id: "u1".to_string(),
            }
        );
    }

    #[test]
    fn when_frame_is_not_json_then_returns_json_error() {
        let result = decode_command("hello there");

        assert!(matches!(result, Err(DecodeError::Json(_))));
    }

    #[test]
    fn when_action_is_unknown_then_returns_unknown_action() {
        let result = decode_command(r#"{"action":"commentPin","postType":"blog","postID":1}"#);

        assert!(matches!(result, Err(DecodeError::UnknownAction(action)) if action == "commentPin"));
    }

    #[test]
    fn when_update_is_missing_comment_id_then_reports_the_field() {
        let result = decode_command(
            r#"{"action":"commentUpdate","postType":"blog","postID":42,"commentBody":"edited"}"#,
        );

        assert!(matches!(
            result,
            Err(DecodeError::MissingField {
                action: "commentUpdate",
                field: "commentID"
            })
        ));
    }

    #[test]
    fn when_post_type_is_not_allow_listed_then_frame_is_rejected() {
        let result = decode_command(
            r#"{"action":"postLike","postType":"blog_id = 0 OR 1=1; --","postID":1,"invokerID":"u1"}"#,
        );

        assert!(matches!(result, Err(DecodeError::PostType(_))));
    }

    #[test]
    fn when_post_id_is_not_positive_then_frame_is_rejected() {
        let result = decode_command(r#"{"action":"channelUpdate","postType":"blog","postID":0}"#);

        assert!(matches!(
            result,
            Err(DecodeError::InvalidField { field: "postID", .. })
        ));
    }

    #[test]
    fn when_invoker_is_the_anonymous_sentinel_then_frame_is_rejected() {
        let result = decode_command(
            r#"{"action":"postLike","postType":"blog","postID":42,"invokerID":"0"}"#,
        );

        assert!(matches!(
            result,
            Err(DecodeError::InvalidField {
                field: "invokerID",
                ..
            })
        ));
    }

    #[test]
    fn when_delete_type_is_unknown_then_frame_is_rejected() {
        let result = decode_command(
            r#"{"action":"commentDeletion","postType":"blog","postID":42,"commentID":5,"deleteType":"soft","invokerID":"u1"}"#,
        );

        assert!(matches!(result, Err(DecodeError::DeleteType(_))));
    }

    #[test]
    fn when_body_is_blank_then_frame_is_rejected() {
        let result = decode_command(
            r#"{"action":"commentCreation","postType":"blog","postID":42,"invokerID":"u1","commentBody":"   "}"#,
        );

        assert!(matches!(
            result,
            Err(DecodeError::InvalidField {
                field: "commentBody",
                ..
            })
        ));
    }

    #[test]
    fn when_command_is_encoded_then_decoding_yields_the_same_command() {
        let commands = [
            Command::ChannelUpdate { channel: blog_42() },
            Command::CommentCreation {
                channel: blog_42(),
                invoker_id: "u1".to_string(),
                body: "hi".to_string(),
                parent_comment_id: Some(3),
            },
            Command::CommentUpdate {
                channel: blog_42(),
                comment_id: 5,
                body: "edited".to_string(),
            },
            Command::CommentDeletion {
                channel: blog_42(),
                comment_id: 5,
                delete_type: DeleteType::Full,
                invoker_id: "admin".to_string(),
            },
            Command::CommentReaction {
                channel: blog_42(),
                comment_id: 9,
                reaction: ReactionType::from("heart"),
                invoker_id: "u1".to_string(),
            },
            Command::PostLike {
                channel: Channel::new(PostType::Project, 7),
                invoker_id: "u1".to_string(),
            },
        ];

        for command in commands {
            let text = encode_command(&command).expect("expected command to encode");
            let decoded = decode_command(&text).expect("expected encoded command to decode");
            assert_eq!(decoded, command);
        }
    }

    #[test]
    fn when_client_frame_is_decoded_then_reencoding_keeps_its_fields() {
        let raw = json!({
            "action": "commentReaction",
            "postType": "blog",
            "postID": 42,
            "invokerID": "u1",
            "commentID": 9,
            "reactionType": "upVote"
        });

        let command = decode_command(&raw.to_string()).expect("expected frame to decode");
        let text = encode_command(&command).expect("expected command to encode");
        let reencoded: Value = serde_json::from_str(&text).expect("expected json");

        assert_eq!(reencoded, raw);
    }

    #[test]
    fn creation_event_uses_wire_field_names() {
        let event = Event::CommentCreation {
            comment_id: 11,
            comment_parent: -1,
            comment_body: "hi".to_string(),
            commenter_id: "u1".to_string(),
        };

        let value: Value =
            serde_json::from_str(&encode_event(&event).expect("expected event to encode"))
                .expect("expected json");

        assert_eq!(
            value,
            json!({
                "action": "commentCreationBroadcast",
                "commentID": 11,
                "commentParent": -1,
                "commentBody": "hi",
                "commenterID": "u1"
            })
        );
    }

    #[test]
    fn when_deletion_has_no_body_then_body_field_is_omitted() {
        let event = Event::CommentDeletion {
            comment_id: 5,
            comment_body: None,
        };

        let value: Value =
            serde_json::from_str(&encode_event(&event).expect("expected event to encode"))
                .expect("expected json");

        assert_eq!(
            value,
            json!({"action": "commentDeletionBroadcast", "commentID": 5})
        );
    }

    #[test]
    fn reaction_and_like_events_use_wire_field_names() {
        let reaction = Event::CommentReaction {
            reaction_type: ReactionType::UpVote,
            end_effect: EndEffect::Inversion,
            reacting_user_id: "u1".to_string(),
            comment_id: 9,
        };
        let like = Event::PostLike {
            liker_id: "u1".to_string(),
            change: -1,
        };

        let reaction: Value =
            serde_json::from_str(&encode_event(&reaction).expect("expected event to encode"))
                .expect("expected json");
        let like: Value =
            serde_json::from_str(&encode_event(&like).expect("expected event to encode"))
                .expect("expected json");

        assert_eq!(
            reaction,
            json!({
                "action": "commentReactionBroadcast",
                "reactionType": "upVote",
                "endEffect": "inversion",
                "reactingUserID": "u1",
                "commentID": 9
            })
        );
        assert_eq!(
            like,
            json!({"action": "postLikeBroadcast", "likerID": "u1", "change": -1})
        );
    }
}
