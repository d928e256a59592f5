use sqlx::PgPool;

/// Create the access audit table and its index if they do not exist.
pub async fn run_migrations(pool: &PgPool, table: &str) -> Result<(), sqlx::Error> {
    let create_table = format!(
        "
        CREATE TABLE IF NOT EXISTS {table} (
            id           UUID PRIMARY KEY,
            purchase_id  UUID NOT NULL,
            document_id  UUID,
            action       TEXT NOT NULL,
            outcome      TEXT NOT NULL,
            detail       TEXT NOT NULL DEFAULT '',
            occurred_at  TIMESTAMPTZ NOT NULL
        )
        "
    );
    sqlx::query(&create_table).execute(pool).await?;

    let index = format!(
        "CREATE INDEX IF NOT EXISTS idx_{table}_purchase_time ON {table} (purchase_id, occurred_at DESC)"
    );
    sqlx::query(&index).execute(pool).await?;

    Ok(())
}
