use crate::utils::error::{LoaderError, Result};
use crate::utils::validation::validate_identifier;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use url::Url;

/// Text layout used for timestamps in delimited files and COPY `TIMEFORMAT 'auto'`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    Float,
    Timestamp,
    Boolean,
    String,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::Timestamp => "timestamp",
            ColumnType::Boolean => "boolean",
            ColumnType::String => "string",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    Timestamp(NaiveDateTime),
    Boolean(bool),
    String(String),
}

impl Value {
    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            Value::Null => None,
            Value::Integer(_) => Some(ColumnType::Integer),
            Value::Float(_) => Some(ColumnType::Float),
            Value::Timestamp(_) => Some(ColumnType::Timestamp),
            Value::Boolean(_) => Some(ColumnType::Boolean),
            Value::String(_) => Some(ColumnType::String),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Timestamp(v) => write!(f, "{}", v.format(TIMESTAMP_FORMAT)),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::String(v) => f.write_str(v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// An ordered set of typed columns and the rows that populate them.
///
/// Every row has exactly one value per column, and each value is either
/// `Value::Null` or of the column's type. Integer values are accepted in float
/// columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
}

impl Dataset {
    pub fn new(columns: Vec<Column>, rows: Vec<Vec<Value>>) -> Result<Self> {
        for (row_idx, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(LoaderError::validation(format!(
                    "row {} has {} values, expected {}",
                    row_idx,
                    row.len(),
                    columns.len()
                )));
            }
            for (value, column) in row.iter().zip(&columns) {
                let accepted = match value.column_type() {
                    None => true,
                    Some(ColumnType::Integer) => matches!(
                        column.column_type,
                        ColumnType::Integer | ColumnType::Float
                    ),
                    Some(actual) => actual == column.column_type,
                };
                if !accepted {
                    return Err(LoaderError::validation(format!(
                        "row {} column '{}' holds a {} value, expected {}",
                        row_idx,
                        column.name,
                        value.column_type().map(|t| t.to_string()).unwrap_or_default(),
                        column.column_type
                    )));
                }
            }
        }
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Replaces column names positionally; types and rows are untouched.
    pub(crate) fn renamed(mut self, names: Vec<String>) -> Self {
        for (column, name) in self.columns.iter_mut().zip(names) {
            column.name = name;
        }
        self
    }

    /// Splits rows into `parts` contiguous chunks whose sizes differ by at most one.
    pub fn split(&self, parts: usize) -> Vec<Dataset> {
        let parts = parts.max(1);
        let base = self.rows.len() / parts;
        let extra = self.rows.len() % parts;

        let mut chunks = Vec::with_capacity(parts);
        let mut start = 0;
        for i in 0..parts {
            let size = base + usize::from(i < extra);
            chunks.push(Dataset {
                columns: self.columns.clone(),
                rows: self.rows[start..start + size].to_vec(),
            });
            start += size;
        }
        chunks
    }

    /// Concatenates datasets that share the same column names, widening
    /// integer columns to float where the inputs disagree.
    pub fn concat(datasets: Vec<Dataset>) -> Result<Option<Dataset>> {
        let mut iter = datasets.into_iter();
        let Some(mut merged) = iter.next() else {
            return Ok(None);
        };

        for next in iter {
            if merged.column_names() != next.column_names() {
                return Err(LoaderError::validation(format!(
                    "cannot concatenate datasets with columns {:?} and {:?}",
                    merged.column_names(),
                    next.column_names()
                )));
            }
            for (column, other) in merged.columns.iter_mut().zip(&next.columns) {
                column.column_type = widen(column.column_type, other.column_type);
            }
            merged.rows.extend(next.rows);
        }
        Ok(Some(merged))
    }

    /// Number of rows whose values at `key_columns` repeat an earlier row.
    pub fn duplicate_key_count(&self, key_columns: &[usize]) -> usize {
        let mut seen: HashMap<Vec<String>, usize> = HashMap::new();
        for row in &self.rows {
            let key: Vec<String> = key_columns.iter().map(|&i| row[i].to_string()).collect();
            *seen.entry(key).or_default() += 1;
        }
        seen.values().map(|count| count - 1).sum()
    }
}

fn widen(left: ColumnType, right: ColumnType) -> ColumnType {
    match (left, right) {
        (a, b) if a == b => a,
        (ColumnType::Integer, ColumnType::Float) | (ColumnType::Float, ColumnType::Integer) => {
            ColumnType::Float
        }
        _ => ColumnType::String,
    }
}

/// A warehouse table identified as `schema.table`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableName {
    pub schema: String,
    pub table: String,
}

impl TableName {
    /// Parses `schema.table`, or qualifies a bare `table` with `default_schema`.
    pub fn resolve(name: &str, default_schema: &str) -> Result<Self> {
        let (schema, table) = match name.split_once('.') {
            Some((schema, table)) => (schema, table),
            None => (default_schema, name),
        };
        validate_identifier("schema", schema)?;
        validate_identifier("table", table)?;
        Ok(Self {
            schema: schema.to_string(),
            table: table.to_string(),
        })
    }

    /// Object-store path segment for this table, `schema/table`.
    pub fn key_path(&self) -> String {
        format!("{}/{}", self.schema, self.table)
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

/// Bucket and key prefix under which load manifests are written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingLocation {
    pub bucket: String,
    pub prefix: String,
}

impl StagingLocation {
    pub fn new(bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: prefix.into().trim_matches('/').to_string(),
        }
    }

    /// Parses an `s3://bucket/prefix` URL.
    pub fn parse(location: &str) -> Result<Self> {
        let url = Url::parse(location).map_err(|e| LoaderError::InvalidConfigValueError {
            field: "staging_location".to_string(),
            value: location.to_string(),
            reason: format!("Invalid URL format: {}", e),
        })?;

        if url.scheme() != "s3" {
            return Err(LoaderError::InvalidConfigValueError {
                field: "staging_location".to_string(),
                value: location.to_string(),
                reason: format!("Unsupported URL scheme: {}", url.scheme()),
            });
        }

        let bucket = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| LoaderError::InvalidConfigValueError {
                field: "staging_location".to_string(),
                value: location.to_string(),
                reason: "URL has no bucket".to_string(),
            })?;

        Ok(Self::new(bucket, url.path()))
    }
}

impl fmt::Display for StagingLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> Dataset {
        Dataset::new(
            vec![
                Column::new("id", ColumnType::Integer),
                Column::new("name", ColumnType::String),
            ],
            vec![
                vec![Value::Integer(1), Value::String("a".into())],
                vec![Value::Integer(2), Value::String("b".into())],
                vec![Value::Integer(3), Value::Null],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_dataset_rejects_ragged_rows() {
        let result = Dataset::new(
            vec![Column::new("id", ColumnType::Integer)],
            vec![vec![Value::Integer(1), Value::Integer(2)]],
        );
        assert!(matches!(result, Err(LoaderError::ValidationError { .. })));
    }

    #[test]
    fn test_dataset_rejects_mistyped_values() {
        let result = Dataset::new(
            vec![Column::new("id", ColumnType::Integer)],
            vec![vec![Value::String("x".into())]],
        );
        assert!(result.is_err());

        let widened = Dataset::new(
            vec![Column::new("score", ColumnType::Float)],
            vec![vec![Value::Integer(3)]],
        );
        assert!(widened.is_ok());
    }

    #[test]
    fn test_split_is_contiguous_and_balanced() {
        let parts = people().split(2);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].len(), 2);
        assert_eq!(parts[1].len(), 1);
        assert_eq!(parts[1].rows()[0][0], Value::Integer(3));
    }

    #[test]
    fn test_concat_requires_matching_columns() {
        let other = Dataset::new(vec![Column::new("other", ColumnType::Integer)], vec![]).unwrap();
        assert!(Dataset::concat(vec![people(), other]).is_err());

        let merged = Dataset::concat(vec![people(), people()]).unwrap().unwrap();
        assert_eq!(merged.len(), 6);
        assert!(Dataset::concat(vec![]).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_key_count() {
        let dataset = Dataset::new(
            vec![Column::new("id", ColumnType::Integer)],
            vec![
                vec![Value::Integer(1)],
                vec![Value::Integer(1)],
                vec![Value::Integer(2)],
                vec![Value::Integer(1)],
            ],
        )
        .unwrap();
        assert_eq!(dataset.duplicate_key_count(&[0]), 2);
        assert_eq!(people().duplicate_key_count(&[0]), 0);
    }

    #[test]
    fn test_table_name_resolution() {
        let qualified = TableName::resolve("analytics.events", "public").unwrap();
        assert_eq!(qualified.to_string(), "analytics.events");
        assert_eq!(qualified.key_path(), "analytics/events");

        let bare = TableName::resolve("events", "public").unwrap();
        assert_eq!(bare.to_string(), "public.events");

        assert!(TableName::resolve("events; DROP TABLE x", "public").is_err());
        assert!(TableName::resolve("1events", "public").is_err());
    }

    #[test]
    fn test_staging_location_parse() {
        let location = StagingLocation::parse("s3://my-bucket/loads/daily/").unwrap();
        assert_eq!(location.bucket, "my-bucket");
        assert_eq!(location.prefix, "loads/daily");
        assert_eq!(location.to_string(), "s3://my-bucket/loads/daily");

        assert!(StagingLocation::parse("https://my-bucket/loads").is_err());
        assert!(StagingLocation::parse("not a url").is_err());
    }
}
