use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;
use tracing::info;

use super::models::Schema;
use crate::config::DatabaseConfig;

/// Errors from DatabaseManager
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Connection pool setup and schema bootstrap for the Postgres document store
pub struct DatabaseManager;

impl DatabaseManager {
    pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
        let connection_string = config
            .url
            .as_deref()
            .ok_or(DatabaseError::ConfigMissing("DATABASE"))?;
        let url = Self::validate_url(connection_string)?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(connection_string)
            .await?;

        info!("Created database pool for: {}", Self::redact(&url));
        Ok(pool)
    }

    fn validate_url(connection_string: &str) -> Result<url::Url, DatabaseError> {
        let url = url::Url::parse(connection_string).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        match url.scheme() {
            "postgres" | "postgresql" => Ok(url),
            _ => Err(DatabaseError::InvalidDatabaseUrl),
        }
    }

    /// Connection string safe for logs.
    pub fn redact(url: &url::Url) -> String {
        let mut url = url.clone();
        if url.password().is_some() {
            let _ = url.set_password(Some("****"));
        }
        url.to_string()
    }

    /// Creates the documents table and one partial unique index per schema constraint
    pub async fn migrate(pool: &PgPool, schemas: &[&Schema]) -> Result<(), DatabaseError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                id UUID NOT NULL,
                doc JSONB NOT NULL,
                PRIMARY KEY (collection, id)
            )",
        )
        .execute(pool)
        .await?;

        for schema in schemas {
            for statement in Self::index_statements(schema) {
                sqlx::query(&statement).execute(pool).await?;
            }
        }

        info!("Database schema is up to date ({} collections)", schemas.len());
        Ok(())
    }

    pub fn index_statements(schema: &Schema) -> Vec<String> {
        schema
            .unique_constraints()
            .iter()
            .map(|fields| {
                let expressions = fields
                    .iter()
                    .map(|f| format!("(doc->>{})", Self::quote_literal(f)))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!(
                    "CREATE UNIQUE INDEX IF NOT EXISTS {} ON documents ({}) WHERE collection = {}",
                    Self::quote_identifier(&schema.index_name(fields)),
                    expressions,
                    Self::quote_literal(schema.collection)
                )
            })
            .collect()
    }

    pub async fn health_check(pool: &PgPool) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(pool).await?;
        Ok(())
    }

    /// Quote SQL identifier to prevent injection
    fn quote_identifier(name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn quote_literal(value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{REVIEW_SCHEMA, USER_SCHEMA};

    #[test]
    fn rejects_non_postgres_urls() {
        assert!(DatabaseManager::validate_url("mysql://localhost/db").is_err());
        assert!(DatabaseManager::validate_url("not a url").is_err());
        assert!(DatabaseManager::validate_url("postgres://u:p@localhost:5432/natours").is_ok());
    }

    #[test]
    fn redacts_passwords() {
        let url = url::Url::parse("postgres://app:hunter2@db:5432/natours").unwrap();
        assert_eq!(DatabaseManager::redact(&url), "postgres://app:****@db:5432/natours");
    }

    #[test]
    fn builds_partial_unique_indexes() {
        assert_eq!(
            DatabaseManager::index_statements(&USER_SCHEMA),
            vec![
                "CREATE UNIQUE INDEX IF NOT EXISTS \"documents_users_email_key\" ON documents ((doc->>'email')) WHERE collection = 'users'"
                    .to_string()
            ]
        );
        assert!(DatabaseManager::index_statements(&REVIEW_SCHEMA)[0]
            .contains("((doc->>'tour'), (doc->>'user'))"));
    }
}
