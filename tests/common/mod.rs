#![allow(dead_code)]

use async_trait::async_trait;
use once_cell::sync::Lazy;
use redshift_etl::core::format::{Compression, FormatOptions, TableFormat};
use redshift_etl::{
    Column, ColumnType, Dataset, LoaderError, MemoryObjectStore, ObjectStore, Result, Value,
    WarehouseConnection,
};
use regex::Regex;
use std::collections::HashMap;

static COPY_SOURCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^COPY (\S+) \(([^)]*)\)\nFROM 's3://([^/]+)/([^']*)'").unwrap());
static CSV_CLAUSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"CSV DELIMITER '(.)' QUOTE AS '(.)'").unwrap());

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// In-process stand-in for a Redshift session.
///
/// Interprets the statements the loader emits against snapshot-isolated
/// tables: work happens on a copy taken at transaction start and only
/// replaces the committed tables on COMMIT. COPY reads from the shared
/// `MemoryObjectStore`.
pub struct SimulatedWarehouse {
    store: MemoryObjectStore,
    committed: HashMap<String, Table>,
    working: Option<HashMap<String, Table>>,
    log: Vec<String>,
    fail_on: Option<String>,
}

impl SimulatedWarehouse {
    pub fn new(store: MemoryObjectStore) -> Self {
        Self {
            store,
            committed: HashMap::new(),
            working: None,
            log: Vec::new(),
            fail_on: None,
        }
    }

    /// Statements containing `pattern` fail with an execution error.
    pub fn fail_on(&mut self, pattern: impl Into<String>) {
        self.fail_on = Some(pattern.into());
    }

    pub fn clear_failure(&mut self) {
        self.fail_on = None;
    }

    pub fn log(&self) -> &[String] {
        &self.log
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.committed.contains_key(name)
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.committed.get(name)
    }

    pub fn in_transaction(&self) -> bool {
        self.working.is_some()
    }

    /// Committed rows of `name` restricted to `columns`, sorted for comparison.
    pub fn rows(&self, name: &str, columns: &[&str]) -> Vec<Vec<String>> {
        let Some(table) = self.committed.get(name) else {
            return Vec::new();
        };
        let indexes: Vec<usize> = columns
            .iter()
            .map(|c| table.columns.iter().position(|t| t == c).unwrap())
            .collect();
        let mut rows: Vec<Vec<String>> = table
            .rows
            .iter()
            .map(|row| indexes.iter().map(|&i| row[i].to_string()).collect())
            .collect();
        rows.sort();
        rows
    }

    fn tables(&mut self) -> &mut HashMap<String, Table> {
        if self.working.is_none() {
            self.working = Some(self.committed.clone());
        }
        self.working.as_mut().unwrap()
    }

    async fn apply(&mut self, sql: &str) -> std::result::Result<(), String> {
        let statement = sql.trim().trim_end_matches(';');

        if let Some(rest) = statement.strip_prefix("CREATE TABLE IF NOT EXISTS ") {
            let (name, body) = rest.split_once(" (").ok_or("malformed CREATE TABLE")?;
            let definitions = column_list(body).ok_or("unbalanced CREATE TABLE")?;
            let tables = self.tables();
            if !tables.contains_key(name) {
                let columns = column_names(definitions);
                tables.insert(
                    name.to_string(),
                    Table {
                        columns,
                        rows: Vec::new(),
                    },
                );
            }
            return Ok(());
        }

        if let Some(rest) = statement.strip_prefix("CREATE TEMP TABLE ") {
            let (name, like) = rest.split_once(" (LIKE ").ok_or("malformed CREATE TEMP TABLE")?;
            let source = like.trim_end_matches(')');
            let tables = self.tables();
            if tables.contains_key(name) {
                return Err(format!("relation \"{}\" already exists", name));
            }
            let columns = tables
                .get(source)
                .ok_or_else(|| format!("relation \"{}\" does not exist", source))?
                .columns
                .clone();
            tables.insert(
                name.to_string(),
                Table {
                    columns,
                    rows: Vec::new(),
                },
            );
            return Ok(());
        }

        if let Some(rest) = statement.strip_prefix("DROP TABLE ") {
            let (if_exists, rest) = match rest.strip_prefix("IF EXISTS ") {
                Some(rest) => (true, rest),
                None => (false, rest),
            };
            let name = rest.trim_end_matches(" CASCADE");
            let removed = self.tables().remove(name);
            if removed.is_none() && !if_exists {
                return Err(format!("table \"{}\" does not exist", name));
            }
            return Ok(());
        }

        if let Some(rest) = statement.strip_prefix("ALTER TABLE ") {
            let (name, column) = rest.split_once(" DROP COLUMN ").ok_or("malformed ALTER")?;
            let table = self
                .tables()
                .get_mut(name)
                .ok_or_else(|| format!("relation \"{}\" does not exist", name))?;
            let index = table
                .columns
                .iter()
                .position(|c| c == column)
                .ok_or_else(|| format!("column \"{}\" does not exist", column))?;
            table.columns.remove(index);
            for row in &mut table.rows {
                row.remove(index);
            }
            return Ok(());
        }

        if statement.starts_with("COPY ") {
            return self.copy(statement).await;
        }

        if let Some(rest) = statement.strip_prefix("DELETE FROM ") {
            let (target, rest) = rest.split_once(" USING ").ok_or("malformed DELETE")?;
            let (staging, conditions) = rest.split_once(" WHERE ").ok_or("malformed DELETE")?;
            let keys: Vec<String> = conditions
                .split(" AND ")
                .map(|c| {
                    let left = c.split(" = ").next().unwrap_or_default();
                    left.rsplit('.').next().unwrap_or_default().to_string()
                })
                .collect();

            let tables = self.tables();
            let stage = tables
                .get(staging)
                .ok_or_else(|| format!("relation \"{}\" does not exist", staging))?
                .clone();
            let table = tables
                .get_mut(target)
                .ok_or_else(|| format!("relation \"{}\" does not exist", target))?;
            let target_idx = positions(&table.columns, &keys)?;
            let stage_idx = positions(&stage.columns, &keys)?;

            table.rows.retain(|row| {
                !stage.rows.iter().any(|staged| {
                    target_idx.iter().zip(&stage_idx).all(|(&t, &s)| {
                        !row[t].is_null() && row[t] == staged[s]
                    })
                })
            });
            return Ok(());
        }

        if let Some(rest) = statement.strip_prefix("INSERT INTO ") {
            let (target, rest) = rest.split_once(" (").ok_or("malformed INSERT")?;
            let (target_cols, rest) = rest.split_once(") SELECT ").ok_or("malformed INSERT")?;
            let (source_cols, staging) = rest.split_once(" FROM ").ok_or("malformed INSERT")?;
            let target_cols = split_list(target_cols);
            let source_cols = split_list(source_cols);
            if target_cols.len() != source_cols.len() {
                return Err("INSERT has more target columns than expressions".to_string());
            }

            let tables = self.tables();
            let stage = tables
                .get(staging)
                .ok_or_else(|| format!("relation \"{}\" does not exist", staging))?
                .clone();
            let table = tables
                .get_mut(target)
                .ok_or_else(|| format!("relation \"{}\" does not exist", target))?;
            let source_idx = positions(&stage.columns, &source_cols)?;
            let target_idx = positions(&table.columns, &target_cols)?;

            for staged in &stage.rows {
                let mut row = vec![Value::Null; table.columns.len()];
                for (&t, &s) in target_idx.iter().zip(&source_idx) {
                    row[t] = staged[s].clone();
                }
                table.rows.push(row);
            }
            return Ok(());
        }

        Err(format!("syntax error at or near \"{}\"", statement))
    }

    async fn copy(&mut self, statement: &str) -> std::result::Result<(), String> {
        let caps = COPY_SOURCE
            .captures(statement)
            .ok_or("malformed COPY statement")?;
        let table_name = caps[1].to_string();
        let columns = split_list(&caps[2]);
        let bucket = caps[3].to_string();
        let source = caps[4].to_string();

        let options = if statement.contains("FORMAT AS PARQUET") {
            FormatOptions::new(TableFormat::Parquet, Compression::None)
        } else {
            let csv = CSV_CLAUSE
                .captures(statement)
                .ok_or("COPY without a CSV clause")?;
            let compression = if statement.contains(" GZIP") {
                Compression::Gzip
            } else {
                Compression::None
            };
            FormatOptions {
                delimiter: csv[1].chars().next().unwrap_or(','),
                quote: csv[2].chars().next().unwrap_or('"'),
                ..FormatOptions::new(TableFormat::Csv, compression)
            }
        };

        let keys = self
            .store
            .list_keys(&bucket, &source)
            .await
            .map_err(|e| e.to_string())?;
        if keys.is_empty() {
            return Err(format!("The specified S3 prefix '{}' does not exist", source));
        }

        let mut loaded: Vec<Vec<Value>> = Vec::new();
        for key in keys {
            let bytes = self
                .store
                .get_object(&bucket, &key)
                .await
                .map_err(|e| e.to_string())?;
            let dataset = options.decode(&bytes).map_err(|e| e.to_string())?;
            if dataset.column_names() != columns {
                return Err(format!(
                    "file {} has columns {:?}, COPY lists {:?}",
                    key,
                    dataset.column_names(),
                    columns
                ));
            }
            loaded.extend(dataset.rows().iter().cloned());
        }

        let table = self
            .tables()
            .get_mut(&table_name)
            .ok_or_else(|| format!("relation \"{}\" does not exist", table_name))?;
        let target_idx = positions(&table.columns, &columns)?;
        for values in loaded {
            let mut row = vec![Value::Null; table.columns.len()];
            for (&t, value) in target_idx.iter().zip(values) {
                row[t] = value;
            }
            table.rows.push(row);
        }
        Ok(())
    }
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',').map(|c| c.trim().to_string()).collect()
}

fn positions(columns: &[String], wanted: &[String]) -> std::result::Result<Vec<usize>, String> {
    wanted
        .iter()
        .map(|w| {
            columns
                .iter()
                .position(|c| c == w)
                .ok_or_else(|| format!("column \"{}\" does not exist", w))
        })
        .collect()
}

/// Text up to the parenthesis closing the column list.
fn column_list(body: &str) -> Option<&str> {
    let mut depth = 0usize;
    for (i, ch) in body.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' if depth == 0 => return Some(&body[..i]),
            ')' => depth -= 1,
            _ => {}
        }
    }
    None
}

/// Column names of a CREATE TABLE body, skipping table constraints.
fn column_names(definitions: &str) -> Vec<String> {
    let mut depth = 0usize;
    let mut current = String::new();
    let mut parts = Vec::new();
    for ch in definitions.chars() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(ch);
    }
    parts.push(current);

    parts
        .iter()
        .filter_map(|p| p.split_whitespace().next().map(str::to_string))
        .filter(|name| {
            !matches!(
                name.to_uppercase().as_str(),
                "PRIMARY" | "UNIQUE" | "FOREIGN" | "CONSTRAINT" | "CHECK"
            )
        })
        .collect()
}

#[async_trait]
impl WarehouseConnection for SimulatedWarehouse {
    async fn begin(&mut self) -> Result<()> {
        self.tables();
        self.log.push("BEGIN;".to_string());
        Ok(())
    }

    async fn execute(&mut self, statement: &str) -> Result<()> {
        self.tables();
        self.log.push(statement.to_string());
        if let Some(pattern) = &self.fail_on {
            if statement.contains(pattern.as_str()) {
                return Err(LoaderError::execution(
                    statement,
                    format!("simulated failure on '{}'", pattern),
                ));
            }
        }
        self.apply(statement)
            .await
            .map_err(|message| LoaderError::execution(statement, message))
    }

    async fn commit(&mut self) -> Result<()> {
        if let Some(working) = self.working.take() {
            self.committed = working;
        }
        self.log.push("COMMIT;".to_string());
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.working = None;
        self.log.push("ROLLBACK;".to_string());
        Ok(())
    }
}

pub fn people(rows: &[(i64, &str)]) -> Dataset {
    Dataset::new(
        vec![
            Column::new("id", ColumnType::Integer),
            Column::new("name", ColumnType::String),
        ],
        rows.iter()
            .map(|(id, name)| vec![Value::Integer(*id), Value::String(name.to_string())])
            .collect(),
    )
    .unwrap()
}

pub fn pairs(rows: &[(i64, &str)]) -> Vec<Vec<String>> {
    let mut rows: Vec<Vec<String>> = rows
        .iter()
        .map(|(id, name)| vec![id.to_string(), name.to_string()])
        .collect();
    rows.sort();
    rows
}
