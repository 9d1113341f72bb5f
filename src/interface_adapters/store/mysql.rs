use async_trait::async_trait;
use sqlx::{MySql, MySqlPool, Transaction};

use crate::domain::entities::ANONYMOUS_COMMENTER_ID;
use crate::domain::{
    CommentStore, NewComment, PostLikeKey, ReactionKey, Redaction, StoreError, StoreTx,
};

// SQLSTATE for deadlock / serialization failure.
const SQLSTATE_SERIALIZATION_FAILURE: &str = "40001";

// Only deadlocks and duplicate keys are races worth retrying. Other integrity
// errors (foreign key, NOT NULL) share SQLSTATE 23000 but never resolve on retry.
fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        let conflicting = db_err.is_unique_violation()
            || db_err
                .code()
                .is_some_and(|code| code == SQLSTATE_SERIALIZATION_FAILURE);
        if conflicting {
            return StoreError::Conflict(db_err.message().to_string());
        }
    }
    StoreError::Backend(err.to_string())
}

/// MySQL-backed comment store.
///
/// Table and column names that vary by post type come from `PostType`, never from client input;
/// every value is bound.
#[derive(Clone)]
pub struct MySqlCommentStore {
    pool: MySqlPool,
}

impl MySqlCommentStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CommentStore for MySqlCommentStore {
    async fn insert_comment(&self, comment: &NewComment) -> Result<i64, StoreError> {
        let query = format!(
            "INSERT INTO Comment (body, {}, parent_comment_id, commenter_id) VALUES (?, ?, ?, ?)",
            comment.channel.post_type.comment_column()
        );
        let result = sqlx::query(&query)
            .bind(&comment.body)
            .bind(comment.channel.post_id)
            .bind(comment.parent_comment_id)
            .bind(&comment.commenter_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let id = result.last_insert_id();
        i64::try_from(id).map_err(|_| StoreError::InvalidId(id))
    }

    async fn update_comment_body(&self, comment_id: i64, body: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("UPDATE Comment SET body = ?, edited = ? WHERE id = ?")
            .bind(body)
            .bind(true)
            .bind(comment_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }

    async fn redact_comment(
        &self,
        comment_id: i64,
        redaction: Redaction,
    ) -> Result<u64, StoreError> {
        let query = if redaction.clears_commenter() {
            sqlx::query("UPDATE Comment SET body = ?, edited = ?, commenter_id = ? WHERE id = ?")
                .bind(redaction.body())
                .bind(false)
                .bind(ANONYMOUS_COMMENTER_ID)
                .bind(comment_id)
        } else {
            sqlx::query("UPDATE Comment SET body = ?, edited = ? WHERE id = ?")
                .bind(redaction.body())
                .bind(false)
                .bind(comment_id)
        };
        let result = query.execute(&self.pool).await.map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }

    async fn delete_comment(&self, comment_id: i64) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM Comment WHERE id = ?")
            .bind(comment_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }

    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        // Pool connections run at SERIALIZABLE (see `frameworks::db`).
        let tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        Ok(Box::new(MySqlTx { tx }))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

// Dropping the sqlx transaction without commit rolls it back.
struct MySqlTx {
    tx: Transaction<'static, MySql>,
}

#[async_trait]
impl StoreTx for MySqlTx {
    async fn delete_reaction(&mut self, key: &ReactionKey) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "DELETE FROM CommentReaction WHERE type = ? AND comment_id = ? AND user_id = ?",
        )
        .bind(key.reaction.as_str())
        .bind(key.comment_id)
        .bind(&key.user_id)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }

    async fn insert_reaction(&mut self, key: &ReactionKey) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO CommentReaction (type, comment_id, user_id) VALUES (?, ?, ?)")
            .bind(key.reaction.as_str())
            .bind(key.comment_id)
            .bind(&key.user_id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn delete_post_like(&mut self, key: &PostLikeKey) -> Result<u64, StoreError> {
        let post_type = key.channel.post_type;
        let query = format!(
            "DELETE FROM {} WHERE user_id = ? AND {} = ?",
            post_type.like_table(),
            post_type.comment_column()
        );
        let result = sqlx::query(&query)
            .bind(&key.user_id)
            .bind(key.channel.post_id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }

    async fn insert_post_like(&mut self, key: &PostLikeKey) -> Result<(), StoreError> {
        let post_type = key.channel.post_type;
        let query = format!(
            "INSERT INTO {} (user_id, {}) VALUES (?, ?)",
            post_type.like_table(),
            post_type.comment_column()
        );
        sqlx::query(&query)
            .bind(&key.user_id)
            .bind(key.channel.post_id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(map_sqlx_error)
    }
}
