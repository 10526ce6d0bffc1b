//! Database connection and pool management

use safewatch_common::config::DatabaseConfig;
use safewatch_common::{Error, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{error, info};

/// Database pool wrapper
#[derive(Clone)]
pub struct DatabasePool {
    pool: PgPool,
}

impl DatabasePool {
    /// Create a new database pool from configuration
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!(
            max_connections = config.max_connections,
            "Connecting to database"
        );

        let pool = Self::options(config)
            .connect(&config.url)
            .await
            .map_err(|e| Error::Database(format!("Failed to connect: {}", e)))?;

        info!("Database connection established");

        Ok(Self { pool })
    }

    /// Create a pool that opens connections on first use
    pub fn lazy(config: &DatabaseConfig) -> Result<Self> {
        let pool = Self::options(config)
            .connect_lazy(&config.url)
            .map_err(|e| Error::Database(format!("Invalid database URL: {}", e)))?;

        Ok(Self { pool })
    }

    fn options(config: &DatabaseConfig) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
    }

    /// Get the underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(format!("Migration failed: {}", e)))?;

        info!("Database migrations completed");
        Ok(())
    }

    /// Check database health
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Database(format!("Health check failed: {}", e)))?;
        Ok(())
    }
}

/// Log a driver error and replace it with a generic "Failed to ..." message.
///
/// Usage: `.map_err(db_failure("Failed to list campaigns"))`
pub fn db_failure(context: &'static str) -> impl FnOnce(sqlx::Error) -> Error {
    move |e| {
        error!(error = %e, "{}", context);
        Error::Database(context.to_string())
    }
}

fn has_sqlstate(err: &sqlx::Error, code: &str) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().as_deref() == Some(code),
        _ => false,
    }
}

/// True when the error is a PostgreSQL unique-constraint violation
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    has_sqlstate(err, "23505")
}

/// True when the error is a PostgreSQL foreign-key violation
pub fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    has_sqlstate(err, "23503")
}

/// Like [`db_failure`], but a foreign-key violation becomes a not-found error
/// for the referenced record.
pub fn reference_failure(
    context: &'static str,
    missing: &'static str,
) -> impl FnOnce(sqlx::Error) -> Error {
    move |e| {
        if is_foreign_key_violation(&e) {
            return Error::not_found(missing);
        }
        db_failure(context)(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::borrow::Cow;
    use std::fmt;

    #[derive(Debug)]
    struct Violation(&'static str);

    impl fmt::Display for Violation {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "constraint violated ({})", self.0)
        }
    }

    impl std::error::Error for Violation {}

    impl DatabaseError for Violation {
        fn message(&self) -> &str {
            "constraint violated"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed(self.0))
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::Other
        }
    }

    fn violation(code: &'static str) -> sqlx::Error {
        sqlx::Error::Database(Box::new(Violation(code)))
    }

    #[test]
    fn test_sqlstate_classification() {
        assert!(is_unique_violation(&violation("23505")));
        assert!(!is_unique_violation(&violation("23503")));
        assert!(is_foreign_key_violation(&violation("23503")));
        assert!(!is_foreign_key_violation(&sqlx::Error::RowNotFound));
    }

    #[test]
    fn test_missing_reference_is_not_found() {
        let err = reference_failure("Failed to submit response", "Contact not found")(violation("23503"));
        assert_eq!(err.status_code(), 404);
        assert_eq!(err.to_string(), "Contact not found");

        let err = reference_failure("Failed to submit response", "Contact not found")(violation("40001"));
        assert_eq!(err.code(), "DATABASE_ERROR");
    }
}
