use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::OwnedMutexGuard;
use tracing::debug;

use crate::domain::entities::ANONYMOUS_COMMENTER_ID;
use crate::domain::{
    Channel, CommentStore, NewComment, PostLikeKey, ReactionKey, Redaction, StoreError, StoreTx,
};

/// One row of the in-memory `Comment` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentRow {
    pub id: i64,
    pub channel: Channel,
    pub body: String,
    pub commenter_id: String,
    pub parent_comment_id: Option<i64>,
    pub edited: bool,
}

#[derive(Default, Clone)]
struct Toggles {
    // Keyed like the unique (type, comment_id, user_id) index.
    reactions: HashSet<ReactionKey>,
    // Keyed like the unique (user_id, <type>_id) index of each likes table.
    post_likes: HashSet<PostLikeKey>,
}

#[derive(Default)]
struct Tables {
    comments: BTreeMap<i64, CommentRow>,
    last_comment_id: i64,
    toggles: Toggles,
}

/// Process-local store with the same row semantics as the MySQL schema.
///
/// Used when no DSN is configured and by tests. Transactions are serialised through `writer`,
/// so a toggle sees no interleaved writes to reactions or likes.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    writer: Arc<tokio::sync::Mutex<()>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        // Rows stay consistent even if a holder panicked; every mutation is a single step.
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
impl MemoryStore {
    pub(crate) fn comment(&self, comment_id: i64) -> Option<CommentRow> {
        self.tables().comments.get(&comment_id).cloned()
    }

    /// Inserts a comment directly and returns its id.
    pub(crate) fn seed_comment(&self, channel: Channel, body: &str, commenter_id: &str) -> i64 {
        let mut tables = self.tables();
        insert_row(
            &mut tables,
            &NewComment {
                channel,
                body: body.to_string(),
                commenter_id: commenter_id.to_string(),
                parent_comment_id: None,
            },
        )
    }

    pub(crate) fn has_reaction(&self, key: &ReactionKey) -> bool {
        self.tables().toggles.reactions.contains(key)
    }

    // Up- and down-vote rows held by one user on one comment.
    pub(crate) fn vote_rows(&self, comment_id: i64, user_id: &str) -> usize {
        self.tables()
            .toggles
            .reactions
            .iter()
            .filter(|key| {
                key.comment_id == comment_id
                    && key.user_id == user_id
                    && key.reaction.opposing_vote().is_some()
            })
            .count()
    }

    pub(crate) fn has_post_like(&self, key: &PostLikeKey) -> bool {
        self.tables().toggles.post_likes.contains(key)
    }

    pub(crate) fn mark_edited(&self, comment_id: i64) {
        if let Some(row) = self.tables().comments.get_mut(&comment_id) {
            row.edited = true;
        }
    }

    pub(crate) fn insert_test_reaction(&self, key: ReactionKey) {
        self.tables().toggles.reactions.insert(key);
    }
}

fn insert_row(tables: &mut Tables, comment: &NewComment) -> i64 {
    tables.last_comment_id += 1;
    let id = tables.last_comment_id;
    tables.comments.insert(
        id,
        CommentRow {
            id,
            channel: comment.channel,
            body: comment.body.clone(),
            commenter_id: comment.commenter_id.clone(),
            parent_comment_id: comment.parent_comment_id,
            edited: false,
        },
    );
    id
}

#[async_trait]
impl CommentStore for MemoryStore {
    async fn insert_comment(&self, comment: &NewComment) -> Result<i64, StoreError> {
        let mut tables = self.tables();
        Ok(insert_row(&mut tables, comment))
    }

    async fn update_comment_body(&self, comment_id: i64, body: &str) -> Result<u64, StoreError> {
        let mut tables = self.tables();
        match tables.comments.get_mut(&comment_id) {
            Some(row) => {
                row.body = body.to_string();
                row.edited = true;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn redact_comment(
        &self,
        comment_id: i64,
        redaction: Redaction,
    ) -> Result<u64, StoreError> {
        let mut tables = self.tables();
        match tables.comments.get_mut(&comment_id) {
            Some(row) => {
                row.body = redaction.body().to_string();
                row.edited = false;
                if redaction.clears_commenter() {
                    row.commenter_id = ANONYMOUS_COMMENTER_ID.to_string();
                }
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_comment(&self, comment_id: i64) -> Result<u64, StoreError> {
        let mut tables = self.tables();
        Ok(u64::from(tables.comments.remove(&comment_id).is_some()))
    }

    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let writer = self.writer.clone().lock_owned().await;
        let working = self.tables().toggles.clone();
        Ok(Box::new(MemoryTx {
            store: self.clone(),
            working,
            _writer: writer,
        }))
    }

    async fn close(&self) {
        debug!("memory store closed");
    }
}

// Works on a private copy of the toggle tables; `commit` publishes it.
struct MemoryTx {
    store: MemoryStore,
    working: Toggles,
    _writer: OwnedMutexGuard<()>,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn delete_reaction(&mut self, key: &ReactionKey) -> Result<u64, StoreError> {
        Ok(u64::from(self.working.reactions.remove(key)))
    }

    async fn insert_reaction(&mut self, key: &ReactionKey) -> Result<(), StoreError> {
        if !self.working.reactions.insert(key.clone()) {
            return Err(StoreError::Conflict(format!(
                "duplicate reaction {} on comment {}",
                key.reaction, key.comment_id
            )));
        }
        Ok(())
    }

    async fn delete_post_like(&mut self, key: &PostLikeKey) -> Result<u64, StoreError> {
        Ok(u64::from(self.working.post_likes.remove(key)))
    }

    async fn insert_post_like(&mut self, key: &PostLikeKey) -> Result<(), StoreError> {
        if !self.working.post_likes.insert(key.clone()) {
            return Err(StoreError::Conflict(format!(
                "duplicate like on {}",
                key.channel
            )));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTx {
            store,
            working,
            _writer,
        } = *self;
        store.tables().toggles = working;
        Ok(())
    }
}
