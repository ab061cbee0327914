//! CREATE TABLE planning from a dataset's columns.

use crate::domain::model::{Column, ColumnType, TableName};
use crate::utils::error::{LoaderError, Result};
use crate::utils::validation::validate_identifier;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Load-timestamp column appended to target tables.
pub const AUDIT_COLUMN: &str = "date_insert";
const AUDIT_COLUMN_DEFINITION: &str = "date_insert TIMESTAMP DEFAULT GETDATE()";

/// Distribution style used when no distribution key is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistStyle {
    #[default]
    Even,
    All,
    Auto,
}

impl fmt::Display for DistStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DistStyle::Even => "even",
            DistStyle::All => "all",
            DistStyle::Auto => "auto",
        })
    }
}

impl FromStr for DistStyle {
    type Err = LoaderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "even" => Ok(DistStyle::Even),
            "all" => Ok(DistStyle::All),
            "auto" => Ok(DistStyle::Auto),
            other => Err(LoaderError::validation(format!(
                "diststyle must be either 'even', 'all' or 'auto', got '{}'",
                other
            ))),
        }
    }
}

/// Physical layout requested for a target table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableSpec {
    /// Replaces type inference entirely; one entry per column, in column order.
    pub column_types: Option<Vec<String>>,
    /// Extra table constraints appended after the column list.
    pub column_constraints: Vec<String>,
    pub diststyle: DistStyle,
    pub distkey: Option<String>,
    pub sortkey: Vec<String>,
    pub sort_interleaved: bool,
    pub include_audit_column: bool,
}

impl Default for TableSpec {
    fn default() -> Self {
        Self {
            column_types: None,
            column_constraints: Vec::new(),
            diststyle: DistStyle::Even,
            distkey: None,
            sortkey: Vec::new(),
            sort_interleaved: false,
            include_audit_column: true,
        }
    }
}

impl TableSpec {
    pub fn with_diststyle(mut self, diststyle: &str) -> Result<Self> {
        self.diststyle = diststyle.parse()?;
        Ok(self)
    }

    pub fn with_distkey(mut self, column: impl Into<String>) -> Self {
        self.distkey = Some(column.into());
        self
    }

    pub fn with_sortkey<I, S>(mut self, columns: I, interleaved: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sortkey = columns.into_iter().map(Into::into).collect();
        self.sort_interleaved = interleaved;
        self
    }

    pub fn without_audit_column(mut self) -> Self {
        self.include_audit_column = false;
        self
    }

    fn distkey(&self) -> Option<&str> {
        self.distkey.as_deref().filter(|k| !k.trim().is_empty())
    }
}

/// Fixed mapping from semantic column type to warehouse column type.
pub fn redshift_type(column_type: ColumnType) -> &'static str {
    match column_type {
        ColumnType::Integer => "INTEGER",
        ColumnType::Float => "REAL",
        ColumnType::Timestamp => "TIMESTAMP",
        ColumnType::Boolean => "BOOLEAN",
        ColumnType::String => "VARCHAR(256)",
    }
}

/// Builds an idempotent `CREATE TABLE IF NOT EXISTS` statement.
///
/// The statement never checks an existing table's shape.
pub fn create_table_statement(
    table: &TableName,
    columns: &[Column],
    spec: &TableSpec,
) -> Result<String> {
    if columns.is_empty() {
        return Err(LoaderError::validation(format!(
            "cannot create {} without columns",
            table
        )));
    }

    let types: Vec<String> = match &spec.column_types {
        Some(types) => {
            if types.len() != columns.len() {
                return Err(LoaderError::validation(format!(
                    "{} column types given for {} columns",
                    types.len(),
                    columns.len()
                )));
            }
            types.clone()
        }
        None => columns
            .iter()
            .map(|c| redshift_type(c.column_type).to_string())
            .collect(),
    };

    let mut definitions: Vec<String> = columns
        .iter()
        .zip(&types)
        .map(|(column, sql_type)| format!("{} {}", column.name, sql_type))
        .collect();
    if spec.include_audit_column {
        definitions.push(AUDIT_COLUMN_DEFINITION.to_string());
    }
    definitions.extend(spec.column_constraints.iter().cloned());

    let mut statement = format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        table,
        definitions.join(", ")
    );

    match spec.distkey() {
        Some(distkey) => {
            validate_identifier("distkey", distkey)?;
            statement.push_str(&format!(" DISTSTYLE key DISTKEY({})", distkey));
        }
        None => statement.push_str(&format!(" DISTSTYLE {}", spec.diststyle)),
    }

    if !spec.sortkey.is_empty() {
        for key in &spec.sortkey {
            validate_identifier("sortkey", key)?;
        }
        if spec.sort_interleaved {
            statement.push_str(" INTERLEAVED");
        }
        statement.push_str(&format!(" SORTKEY({})", spec.sortkey.join(", ")));
    }

    statement.push(';');
    Ok(statement)
}
