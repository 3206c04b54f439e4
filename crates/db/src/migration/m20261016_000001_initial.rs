//! Initial database migration.
//!
//! Creates the users, articles and transactions tables. The SQL is kept to the
//! subset PostgreSQL and SQLite both accept, so the same migration backs the
//! production database and the in-memory test database.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        for statement in [USERS_SQL, ARTICLES_SQL, TRANSACTIONS_SQL]
            .into_iter()
            .chain(INDEXES_SQL)
        {
            db.execute_unprepared(statement).await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared("DROP TABLE IF EXISTS transactions;")
            .await?;
        db.execute_unprepared("DROP TABLE IF EXISTS articles;").await?;
        db.execute_unprepared("DROP TABLE IF EXISTS users;").await?;
        Ok(())
    }
}

const USERS_SQL: &str = r"
CREATE TABLE users (
    id UUID PRIMARY KEY,
    name VARCHAR(64) NOT NULL UNIQUE,
    email VARCHAR(255),
    balance BIGINT NOT NULL DEFAULT 0,
    disabled BOOLEAN NOT NULL DEFAULT FALSE,
    created TIMESTAMPTZ NOT NULL,
    updated TIMESTAMPTZ
);
";

const ARTICLES_SQL: &str = r"
CREATE TABLE articles (
    id UUID PRIMARY KEY,
    precursor_id UUID REFERENCES articles(id) ON DELETE SET NULL,
    name VARCHAR(255) NOT NULL,
    barcode VARCHAR(32),
    amount BIGINT NOT NULL,
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    usage_count BIGINT NOT NULL DEFAULT 0,
    created TIMESTAMPTZ NOT NULL
);
";

// Sibling references are set to NULL when the counterpart row is hard-deleted.
const TRANSACTIONS_SQL: &str = r"
CREATE TABLE transactions (
    id UUID PRIMARY KEY,
    user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    article_id UUID REFERENCES articles(id),
    recipient_transaction_id UUID REFERENCES transactions(id) ON DELETE SET NULL,
    sender_transaction_id UUID REFERENCES transactions(id) ON DELETE SET NULL,
    quantity BIGINT,
    comment VARCHAR(255),
    amount BIGINT NOT NULL,
    deleted BOOLEAN NOT NULL DEFAULT FALSE,
    created TIMESTAMPTZ NOT NULL
);
";

const INDEXES_SQL: [&str; 3] = [
    // Barcodes are unique among active articles only
    "CREATE UNIQUE INDEX idx_articles_active_barcode ON articles(barcode) WHERE is_active;",
    "CREATE INDEX idx_transactions_user ON transactions(user_id, created DESC);",
    "CREATE INDEX idx_transactions_article ON transactions(article_id);",
];
