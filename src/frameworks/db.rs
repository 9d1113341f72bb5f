use sqlx::{Executor, MySqlPool, mysql::MySqlPoolOptions};

// Build the MySQL pool; every connection runs its transactions at SERIALIZABLE so vote and like
// toggles cannot interleave.
pub async fn connect_pool(
    database_url: &str,
    max_connections: u32,
) -> Result<MySqlPool, sqlx::Error> {
    MySqlPoolOptions::new()
        .max_connections(max_connections)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("SET SESSION TRANSACTION ISOLATION LEVEL SERIALIZABLE")
                    .await?;
                Ok(())
            })
        })
        .connect(database_url)
        .await
}
