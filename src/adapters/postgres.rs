use crate::domain::ports::WarehouseConnection;
use crate::utils::error::{LoaderError, Result};
use async_trait::async_trait;
use tokio_postgres::{Client, NoTls};

/// Warehouse session over the PostgreSQL wire protocol.
///
/// Statements go through the simple-query protocol. The first statement after
/// a commit or rollback opens a transaction, so every `execute` runs inside one.
pub struct PostgresWarehouse {
    client: Client,
    in_transaction: bool,
}

impl PostgresWarehouse {
    pub async fn connect(connection_string: &str) -> Result<Self> {
        let (client, connection) = tokio_postgres::connect(connection_string, NoTls)
            .await
            .map_err(|e| LoaderError::ConfigError {
                message: format!("Failed to connect to Redshift: {}", e),
            })?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("Redshift connection error: {}", e);
            }
        });

        Ok(Self {
            client,
            in_transaction: false,
        })
    }

    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    async fn send(&self, statement: &str) -> Result<()> {
        self.client
            .batch_execute(statement)
            .await
            .map_err(|e| LoaderError::execution(statement, db_message(&e)))
    }
}

fn db_message(err: &tokio_postgres::Error) -> String {
    match err.as_db_error() {
        Some(db) => format!("{} ({})", db.message(), db.code().code()),
        None => err.to_string(),
    }
}

#[async_trait]
impl WarehouseConnection for PostgresWarehouse {
    async fn begin(&mut self) -> Result<()> {
        if !self.in_transaction {
            self.send("BEGIN;").await?;
            self.in_transaction = true;
        }
        Ok(())
    }

    async fn execute(&mut self, statement: &str) -> Result<()> {
        self.begin().await?;
        self.send(statement).await
    }

    async fn commit(&mut self) -> Result<()> {
        if self.in_transaction {
            self.send("COMMIT;").await?;
            self.in_transaction = false;
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        if self.in_transaction {
            self.in_transaction = false;
            self.send("ROLLBACK;").await?;
        }
        Ok(())
    }
}
