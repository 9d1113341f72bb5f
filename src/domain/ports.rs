use async_trait::async_trait;

use crate::domain::entities::{NewComment, PostLikeKey, ReactionKey, Redaction};
use crate::domain::errors::StoreError;

// Port for the relational store behind the hub.
//
// Single-row statements run directly; toggles that read-then-write run through a `StoreTx`
// so concurrent requests from the same user cannot interleave.
#[async_trait]
pub trait CommentStore: Send + Sync {
    // Returns the generated comment id.
    async fn insert_comment(&self, comment: &NewComment) -> Result<i64, StoreError>;
    // Sets the body and marks the comment edited; returns affected rows.
    async fn update_comment_body(&self, comment_id: i64, body: &str) -> Result<u64, StoreError>;
    // Replaces the body with the redaction placeholder and clears `edited`.
    async fn redact_comment(
        &self,
        comment_id: i64,
        redaction: Redaction,
    ) -> Result<u64, StoreError>;
    async fn delete_comment(&self, comment_id: i64) -> Result<u64, StoreError>;
    // Opens a serialisable transaction.
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError>;
    // Releases pooled connections; called once at shutdown.
    async fn close(&self);
}

// Unit of work for reaction and like toggles. Dropping without `commit` rolls back.
#[async_trait]
pub trait StoreTx: Send {
    async fn delete_reaction(&mut self, key: &ReactionKey) -> Result<u64, StoreError>;
    async fn insert_reaction(&mut self, key: &ReactionKey) -> Result<(), StoreError>;
    async fn delete_post_like(&mut self, key: &PostLikeKey) -> Result<u64, StoreError>;
    async fn insert_post_like(&mut self, key: &PostLikeKey) -> Result<(), StoreError>;
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
