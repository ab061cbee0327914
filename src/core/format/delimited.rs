use crate::domain::model::{Column, ColumnType, Dataset, Value, TIMESTAMP_FORMAT};
use crate::utils::error::{LoaderError, Result};
use chrono::NaiveDateTime;

pub(super) fn encode(dataset: &Dataset, delimiter: u8, quote: u8) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .quote(quote)
        .from_writer(Vec::new());

    writer.write_record(dataset.columns().iter().map(|c| c.name.as_str()))?;
    for row in dataset.rows() {
        writer.write_record(row.iter().map(|v| v.to_string()))?;
    }

    writer
        .into_inner()
        .map_err(|e| LoaderError::serialization(format!("failed to flush CSV: {}", e)))
}

pub(super) fn decode(bytes: &[u8], delimiter: u8, quote: u8) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .quote(quote)
        .from_reader(bytes);

    let headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();
    let mut cells = Vec::new();
    for record in reader.records() {
        let record = record?;
        cells.push(record.iter().map(String::from).collect::<Vec<_>>());
    }

    typed_dataset(headers, cells)
}

/// Builds a dataset from untyped text cells, inferring one type per column.
/// Empty cells are nulls.
pub(super) fn typed_dataset(headers: Vec<String>, cells: Vec<Vec<String>>) -> Result<Dataset> {
    let types: Vec<ColumnType> = (0..headers.len())
        .map(|i| infer_type(cells.iter().filter_map(|row| row.get(i)).map(String::as_str)))
        .collect();

    let mut rows = Vec::with_capacity(cells.len());
    for row in &cells {
        let values = row
            .iter()
            .zip(&types)
            .map(|(cell, column_type)| parse_cell(cell, *column_type))
            .collect::<Result<Vec<_>>>()?;
        rows.push(values);
    }

    let columns = headers
        .into_iter()
        .zip(types)
        .map(|(name, column_type)| Column::new(name, column_type))
        .collect();
    Dataset::new(columns, rows)
}

fn infer_type<'a>(cells: impl Iterator<Item = &'a str> + Clone) -> ColumnType {
    let mut present = cells.filter(|c| !c.is_empty()).peekable();
    if present.peek().is_none() {
        return ColumnType::String;
    }

    if present.clone().all(|c| c.parse::<i64>().is_ok()) {
        ColumnType::Integer
    } else if present
        .clone()
        .all(|c| c.parse::<f64>().map(f64::is_finite).unwrap_or(false))
    {
        ColumnType::Float
    } else if present.clone().all(|c| c == "true" || c == "false") {
        ColumnType::Boolean
    } else if present.all(|c| parse_timestamp(c).is_some()) {
        ColumnType::Timestamp
    } else {
        ColumnType::String
    }
}

fn parse_timestamp(cell: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(cell, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(cell, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
}

fn parse_cell(cell: &str, column_type: ColumnType) -> Result<Value> {
    if cell.is_empty() {
        return Ok(Value::Null);
    }
    let invalid = || {
        LoaderError::serialization(format!("cannot read '{}' as {}", cell, column_type))
    };
    let value = match column_type {
        ColumnType::Integer => Value::Integer(cell.parse().map_err(|_| invalid())?),
        ColumnType::Float => Value::Float(cell.parse().map_err(|_| invalid())?),
        ColumnType::Boolean => Value::Boolean(cell == "true"),
        ColumnType::Timestamp => Value::Timestamp(parse_timestamp(cell).ok_or_else(invalid)?),
        ColumnType::String => Value::String(cell.to_string()),
    };
    Ok(value)
}
