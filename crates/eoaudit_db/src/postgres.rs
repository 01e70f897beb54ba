//! PostgreSQL backend over the `agdc` schema.

use crate::{redact_url, DatacubeIndex, DatasetType, DbError, Result};
use async_trait::async_trait;
use eoaudit_store::{with_retry, RetryPolicy};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{debug, info};

// `agdc` stores type ids as SMALLINT; widen so they decode as i32.
const LIST_TYPES_SQL: &str = "SELECT id::integer AS id, name FROM agdc.dataset_type ORDER BY id";
const COUNT_ROWS_SQL: &str =
    "SELECT COUNT(*) FROM agdc.dataset WHERE dataset_type_ref = $1::integer";

/// Datacube index backed by a PostgreSQL pool.
#[derive(Clone)]
pub struct PgDatacubeIndex {
    pool: PgPool,
    retry: RetryPolicy,
}

impl PgDatacubeIndex {
    /// Connect to the index database.
    ///
    /// The pool is lazy: the first query opens the connection, so connection
    /// faults surface through the retry loop rather than here.
    pub async fn connect(url: &str, retry: RetryPolicy) -> Result<Self> {
        if !(url.starts_with("postgres://") || url.starts_with("postgresql://")) {
            return Err(DbError::Config(format!(
                "expected a postgres:// URL, got '{}'",
                redact_url(url)
            )));
        }

        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(10))
            .connect_lazy(url)?;

        info!(url = %redact_url(url), "Datacube index pool created");
        Ok(Self { pool, retry })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool, retry: RetryPolicy) -> Self {
        Self { pool, retry }
    }
}

#[async_trait]
impl DatacubeIndex for PgDatacubeIndex {
    async fn list_registered_types(&self) -> Result<Vec<DatasetType>> {
        let pool = &self.pool;
        let types = with_retry(&self.retry, "list_dataset_types", || async move {
            sqlx::query_as::<_, DatasetType>(LIST_TYPES_SQL)
                .fetch_all(pool)
                .await
                .map_err(DbError::from)
        })
        .await?;

        debug!(count = types.len(), "Loaded dataset type registry");
        Ok(types)
    }

    async fn count_rows(&self, type_id: i32) -> Result<i64> {
        let pool = &self.pool;
        with_retry(&self.retry, "count_datasets", || async move {
            sqlx::query_scalar::<_, i64>(COUNT_ROWS_SQL)
                .bind(type_id)
                .fetch_one(pool)
                .await
                .map_err(DbError::from)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rejects_non_postgres_url() {
        let err = PgDatacubeIndex::connect("sqlite://x.db", RetryPolicy::none())
            .await
            .err()
            .expect("should reject");
        assert!(matches!(err, DbError::Config(_)));
    }
}
