use anyhow::Result;
use sqlx::SqlitePool;

/// Create the vector index schema. Idempotent.
///
/// Every collection shares one `chunks` table; `seq` records insertion
/// order so listing and tie-breaking are stable.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            collection TEXT NOT NULL,
            id TEXT NOT NULL,
            content TEXT NOT NULL,
            metadata_json TEXT NOT NULL DEFAULT '{}',
            embedding BLOB NOT NULL,
            dims INTEGER NOT NULL,
            UNIQUE(collection, id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_collection ON chunks(collection, seq)")
        .execute(pool)
        .await?;

    Ok(())
}
