use serde::Serialize;
use sqlx::{postgres::PgPoolOptions, Executor, PgPool};
use thiserror::Error;
use tracing::{error, info};

/// Errors from the database layer
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Outcome of running the configured setup statements. Every statement is
/// attempted; failures are collected rather than aborting the run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct SetupReport {
    pub executed: usize,
    pub failures: Vec<SetupFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SetupFailure {
    pub index: usize,
    pub message: String,
}

impl SetupReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Connection pool handle shared by every request
#[derive(Clone, Debug)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, DatabaseError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        info!(max_connections, "database pool ready");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Pings the pool to ensure connectivity
    pub async fn health_check(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Executes each statement with the simple query protocol, so a single
    /// entry may hold several `;`-separated statements or a function body.
    pub async fn run_setup(&self, statements: &[String]) -> SetupReport {
        let mut report = SetupReport::default();
        for (index, statement) in statements.iter().enumerate() {
            match self.pool.execute(statement.as_str()).await {
                Ok(_) => report.executed += 1,
                Err(e) => {
                    error!(index, error = %e, "setup statement failed");
                    report.failures.push(SetupFailure {
                        index,
                        message: e.to_string(),
                    });
                }
            }
        }
        info!(
            executed = report.executed,
            failed = report.failures.len(),
            "setup finished"
        );
        report
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("database pool closed");
    }
}
