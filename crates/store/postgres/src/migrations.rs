use sqlx::PgPool;

use crate::config::PostgresConfig;

/// Run database migrations, creating required tables if they do not exist.
///
/// Creates the purchase and download log tables owned by this crate, plus the
/// catalog tables it reads from.
///
/// # Errors
///
/// Returns a [`sqlx::Error`] if any DDL statement fails.
pub async fn run_migrations(pool: &PgPool, config: &PostgresConfig) -> Result<(), sqlx::Error> {
    let purchases = config.purchases_table();
    let download_logs = config.download_logs_table();
    let offerings = config.offerings_table();
    let documents = config.documents_table();
    let offering_documents = config.offering_documents_table();
    let buyers = config.buyers_table();
    let prefix = &config.table_prefix;

    let statements = [
        format!(
            "CREATE TABLE IF NOT EXISTS {buyers} (
                id UUID PRIMARY KEY,
                name TEXT NOT NULL,
                tax_id TEXT NOT NULL,
                email TEXT NOT NULL
            )"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {offerings} (
                id UUID PRIMARY KEY,
                title TEXT NOT NULL,
                creator_name TEXT NOT NULL
            )"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {documents} (
                id UUID PRIMARY KEY,
                storage_key TEXT NOT NULL,
                file_name TEXT NOT NULL,
                size_bytes BIGINT NOT NULL,
                media_type TEXT NOT NULL
            )"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {offering_documents} (
                offering_id UUID NOT NULL REFERENCES {offerings} (id),
                document_id UUID NOT NULL REFERENCES {documents} (id),
                position INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (offering_id, document_id)
            )"
        ),
        // download_limit < 0 means unlimited.
        format!(
            "CREATE TABLE IF NOT EXISTS {purchases} (
                id UUID PRIMARY KEY,
                offering_id UUID NOT NULL,
                buyer_id UUID NOT NULL,
                buyer_name TEXT NOT NULL,
                buyer_tax_id TEXT NOT NULL,
                buyer_email TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                expires_at TIMESTAMPTZ,
                downloads_used INTEGER NOT NULL DEFAULT 0 CHECK (downloads_used >= 0),
                download_limit INTEGER NOT NULL DEFAULT -1,
                CHECK (download_limit < 0 OR downloads_used <= download_limit)
            )"
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS {prefix}purchases_buyer_idx ON {purchases} (buyer_id)"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {download_logs} (
                id UUID PRIMARY KEY,
                purchase_id UUID NOT NULL REFERENCES {purchases} (id),
                document_id UUID NOT NULL,
                downloaded_at TIMESTAMPTZ NOT NULL
            )"
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS {prefix}download_logs_purchase_idx \
             ON {download_logs} (purchase_id, downloaded_at)"
        ),
    ];

    for statement in &statements {
        sqlx::query(statement).execute(pool).await?;
    }

    Ok(())
}
