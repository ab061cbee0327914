use crate::domain::ports::WarehouseConnection;
use crate::utils::error::{LoaderError, Result};
use async_trait::async_trait;

/// Warehouse connection that only records what it is asked to run.
///
/// Transaction boundaries are recorded as `BEGIN;`, `COMMIT;` and `ROLLBACK;`
/// entries, with the same implicit-begin rule as a real session. A statement
/// containing `fail_on` is recorded and then fails.
#[derive(Debug, Default, Clone)]
pub struct RecordingWarehouse {
    statements: Vec<String>,
    in_transaction: bool,
    fail_on: Option<String>,
}

impl RecordingWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(pattern: impl Into<String>) -> Self {
        Self {
            fail_on: Some(pattern.into()),
            ..Self::default()
        }
    }

    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    pub fn into_statements(self) -> Vec<String> {
        self.statements
    }
}

#[async_trait]
impl WarehouseConnection for RecordingWarehouse {
    async fn begin(&mut self) -> Result<()> {
        if !self.in_transaction {
            self.statements.push("BEGIN;".to_string());
            self.in_transaction = true;
        }
        Ok(())
    }

    async fn execute(&mut self, statement: &str) -> Result<()> {
        self.begin().await?;
        self.statements.push(statement.to_string());
        match &self.fail_on {
            Some(pattern) if statement.contains(pattern.as_str()) => Err(LoaderError::execution(
                statement,
                format!("simulated failure on '{}'", pattern),
            )),
            _ => Ok(()),
        }
    }

    async fn commit(&mut self) -> Result<()> {
        if self.in_transaction {
            self.statements.push("COMMIT;".to_string());
            self.in_transaction = false;
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        if self.in_transaction {
            self.statements.push("ROLLBACK;".to_string());
            self.in_transaction = false;
        }
        Ok(())
    }
}
