// Command dispatch: persistence action, resulting event and target channel per command.

use std::future::Future;
use tracing::{debug, warn};

use crate::domain::entities::NO_PARENT_SENTINEL;
use crate::domain::{
    Channel, Command, DeleteType, EndEffect, Event, NewComment, PostLikeKey, ReactionKey,
    Redaction, StoreError,
};
use crate::use_cases::hub::Hub;
use crate::use_cases::registry::ClientId;

/// What a dispatched command ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    // The sender now listens on a new channel.
    Subscribed,
    // The sender was already gone; nothing happened.
    SenderGone,
    // Authorization refused; nothing persisted or broadcast.
    Refused,
    // Persisted and broadcast to `delivered` subscribers.
    Published { delivered: usize },
}

impl Hub {
    /// Applies one command on behalf of `sender`.
    ///
    /// Store errors abandon the command before anything is broadcast.
    pub async fn dispatch(
        &self,
        sender: &ClientId,
        command: Command,
    ) -> Result<Outcome, StoreError> {
        match command {
            Command::ChannelUpdate { channel } => Ok(self.channel_update(sender, channel).await),
            Command::CommentCreation {
                channel,
                invoker_id,
                body,
                parent_comment_id,
            } => {
                self.comment_creation(NewComment {
                    channel,
                    body,
                    commenter_id: invoker_id,
                    parent_comment_id,
                })
                .await
            }
            Command::CommentUpdate {
                channel,
                comment_id,
                body,
            } => self.comment_update(channel, comment_id, body).await,
            Command::CommentDeletion {
                channel,
                comment_id,
                delete_type,
                invoker_id,
            } => {
                self.comment_deletion(channel, comment_id, delete_type, &invoker_id)
                    .await
            }
            Command::CommentReaction {
                channel,
                comment_id,
                reaction,
                invoker_id,
            } => {
                let key = ReactionKey {
                    reaction,
                    comment_id,
                    user_id: invoker_id,
                };
                self.comment_reaction(channel, key).await
            }
            Command::PostLike {
                channel,
                invoker_id,
            } => {
                let key = PostLikeKey {
                    channel,
                    user_id: invoker_id,
                };
                self.post_like(key).await
            }
        }
    }

    async fn channel_update(&self, sender: &ClientId, channel: Channel) -> Outcome {
        if self.registry.update_subscription(sender, channel).await {
            debug!(%channel, "subscription updated");
            Outcome::Subscribed
        } else {
            // The connection was evicted while this frame was in flight.
            debug!(%channel, "subscription update for departed client ignored");
            Outcome::SenderGone
        }
    }

    async fn comment_creation(&self, comment: NewComment) -> Result<Outcome, StoreError> {
        let comment_id = self.store.insert_comment(&comment).await?;
        let event = Event::CommentCreation {
            comment_id,
            comment_parent: comment.parent_comment_id.unwrap_or(NO_PARENT_SENTINEL),
            comment_body: comment.body,
            commenter_id: comment.commenter_id,
        };
        Ok(self.published(comment.channel, event).await)
    }

    async fn comment_update(
        &self,
        channel: Channel,
        comment_id: i64,
        body: String,
    ) -> Result<Outcome, StoreError> {
        let rows = self.store.update_comment_body(comment_id, &body).await?;
        if rows == 0 {
            debug!(comment_id, "comment update matched no rows");
        }
        let event = Event::CommentUpdate {
            comment_id,
            comment_body: body,
        };
        Ok(self.published(channel, event).await)
    }

    async fn comment_deletion(
        &self,
        channel: Channel,
        comment_id: i64,
        delete_type: DeleteType,
        invoker_id: &str,
    ) -> Result<Outcome, StoreError> {
        // Admin and full deletions share one authority.
        let redaction = match delete_type {
            DeleteType::User => Some(Redaction::ByUser),
            DeleteType::Admin | DeleteType::Full if !self.is_admin(invoker_id) => {
                debug!(
                    comment_id,
                    delete_type = delete_type.as_str(),
                    invoker_id,
                    "deletion refused for non-admin"
                );
                return Ok(Outcome::Refused);
            }
            DeleteType::Admin => Some(Redaction::ByAdmin),
            DeleteType::Full => None,
        };

        let comment_body = match redaction {
            Some(redaction) => {
                self.store.redact_comment(comment_id, redaction).await?;
                Some(redaction.body().to_string())
            }
            None => {
                self.store.delete_comment(comment_id).await?;
                None
            }
        };

        let event = Event::CommentDeletion {
            comment_id,
            comment_body,
        };
        Ok(self.published(channel, event).await)
    }

    async fn comment_reaction(
        &self,
        channel: Channel,
        key: ReactionKey,
    ) -> Result<Outcome, StoreError> {
        let end_effect = self
            .retry_on_conflict("comment reaction", || self.toggle_reaction(&key))
            .await?;
        let event = Event::CommentReaction {
            reaction_type: key.reaction,
            end_effect,
            reacting_user_id: key.user_id,
            comment_id: key.comment_id,
        };
        Ok(self.published(channel, event).await)
    }

    /// One attempt at the reaction transition, inside a single transaction.
    ///
    /// Votes form a per-user ternary state (none, up, down):
    /// - repeating the current vote deletes it (`deletion`);
    /// - otherwise any opposing vote is deleted and the new one inserted (`inversion` when an
    ///   opposing vote existed, `creation` when not).
    ///
    /// Other tags toggle independently.
    async fn toggle_reaction(&self, key: &ReactionKey) -> Result<EndEffect, StoreError> {
        let mut tx = self.store.begin().await?;

        let end_effect = if tx.delete_reaction(key).await? > 0 {
            EndEffect::Deletion
        } else {
            let replaced = match key.reaction.opposing_vote() {
                Some(opposing) => tx.delete_reaction(&key.with_reaction(opposing)).await?,
                None => 0,
            };
            tx.insert_reaction(key).await?;
            if replaced > 0 {
                EndEffect::Inversion
            } else {
                EndEffect::Creation
            }
        };

        tx.commit().await?;
        Ok(end_effect)
    }

    async fn post_like(&self, key: PostLikeKey) -> Result<Outcome, StoreError> {
        let change = self
            .retry_on_conflict("post like", || self.toggle_post_like(&key))
            .await?;
        let event = Event::PostLike {
            liker_id: key.user_id,
            change,
        };
        Ok(self.published(key.channel, event).await)
    }

    // Returns the like-count change: -1 when removed, +1 when added.
    async fn toggle_post_like(&self, key: &PostLikeKey) -> Result<i8, StoreError> {
        let mut tx = self.store.begin().await?;
        let change = if tx.delete_post_like(key).await? > 0 {
            -1
        } else {
            tx.insert_post_like(key).await?;
            1
        };
        tx.commit().await?;
        Ok(change)
    }

    async fn retry_on_conflict<T, F, Fut>(
        &self,
        operation: &str,
        mut attempt: F,
    ) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let mut retries = 0;
        loop {
            match attempt().await {
                Err(err) if err.is_retryable() && retries < self.settings.conflict_retries => {
                    retries += 1;
                    warn!(operation, retries, error = %err, "write conflict; retrying");
                }
                result => return result,
            }
        }
    }

    async fn published(&self, channel: Channel, event: Event) -> Outcome {
        let delivered = self.publish(channel, event).await;
        Outcome::Published { delivered }
    }
}
