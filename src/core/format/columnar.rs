use crate::domain::model::{Column, ColumnType, Dataset, Value};
use crate::utils::error::{LoaderError, Result};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parquet::basic::{ConvertedType, Repetition, Type as PhysicalType};
use parquet::data_type::{BoolType, ByteArray, ByteArrayType, DoubleType, Int64Type};
use parquet::file::properties::WriterProperties;
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::file::writer::SerializedFileWriter;
use parquet::record::Field;
use parquet::schema::types::Type;
use std::sync::Arc;

fn schema_for(dataset: &Dataset) -> Result<Type> {
    let mut fields = Vec::with_capacity(dataset.columns().len());
    for column in dataset.columns() {
        let (physical, converted) = match column.column_type {
            ColumnType::Integer => (PhysicalType::INT64, ConvertedType::NONE),
            ColumnType::Float => (PhysicalType::DOUBLE, ConvertedType::NONE),
            ColumnType::Timestamp => (PhysicalType::INT64, ConvertedType::TIMESTAMP_MILLIS),
            ColumnType::Boolean => (PhysicalType::BOOLEAN, ConvertedType::NONE),
            ColumnType::String => (PhysicalType::BYTE_ARRAY, ConvertedType::UTF8),
        };
        let field = Type::primitive_type_builder(&column.name, physical)
            .with_repetition(Repetition::OPTIONAL)
            .with_converted_type(converted)
            .build()?;
        fields.push(Arc::new(field));
    }
    Ok(Type::group_type_builder("dataset")
        .with_fields(fields)
        .build()?)
}

/// Writes the whole dataset as a single row group with optional columns.
pub(super) fn encode(dataset: &Dataset) -> Result<Vec<u8>> {
    let schema = Arc::new(schema_for(dataset)?);
    let properties = Arc::new(WriterProperties::builder().build());
    let mut writer = SerializedFileWriter::new(Vec::new(), schema, properties)?;

    let mut row_group = writer.next_row_group()?;
    let mut index = 0;
    while let Some(mut column_writer) = row_group.next_column()? {
        let column = &dataset.columns()[index];
        let cells: Vec<&Value> = dataset.rows().iter().map(|row| &row[index]).collect();
        let def_levels: Vec<i16> = cells.iter().map(|v| i16::from(!v.is_null())).collect();

        match column.column_type {
            ColumnType::Integer => {
                let values: Vec<i64> = cells
                    .iter()
                    .filter_map(|v| match v {
                        Value::Integer(i) => Some(*i),
                        _ => None,
                    })
                    .collect();
                column_writer
                    .typed::<Int64Type>()
                    .write_batch(&values, Some(&def_levels), None)?;
            }
            ColumnType::Float => {
                let values: Vec<f64> = cells
                    .iter()
                    .filter_map(|v| match v {
                        Value::Float(f) => Some(*f),
                        Value::Integer(i) => Some(*i as f64),
                        _ => None,
                    })
                    .collect();
                column_writer
                    .typed::<DoubleType>()
                    .write_batch(&values, Some(&def_levels), None)?;
            }
            ColumnType::Timestamp => {
                let values: Vec<i64> = cells
                    .iter()
                    .filter_map(|v| match v {
                        Value::Timestamp(ts) => Some(ts.and_utc().timestamp_millis()),
                        _ => None,
                    })
                    .collect();
                column_writer
                    .typed::<Int64Type>()
                    .write_batch(&values, Some(&def_levels), None)?;
            }
            ColumnType::Boolean => {
                let values: Vec<bool> = cells
                    .iter()
                    .filter_map(|v| match v {
                        Value::Boolean(b) => Some(*b),
                        _ => None,
                    })
                    .collect();
                column_writer
                    .typed::<BoolType>()
                    .write_batch(&values, Some(&def_levels), None)?;
            }
            ColumnType::String => {
                let values: Vec<ByteArray> = cells
                    .iter()
                    .filter_map(|v| match v {
                        Value::String(s) => Some(ByteArray::from(s.as_str())),
                        _ => None,
                    })
                    .collect();
                column_writer
                    .typed::<ByteArrayType>()
                    .write_batch(&values, Some(&def_levels), None)?;
            }
        }

        column_writer.close()?;
        index += 1;
    }
    row_group.close()?;

    Ok(writer.into_inner()?)
}

pub(super) fn decode(bytes: &[u8]) -> Result<Dataset> {
    let reader = SerializedFileReader::new(Bytes::copy_from_slice(bytes))?;

    let columns: Vec<Column> = reader
        .metadata()
        .file_metadata()
        .schema_descr()
        .columns()
        .iter()
        .map(|descr| {
            let column_type = match (descr.physical_type(), descr.converted_type()) {
                (PhysicalType::INT64, ConvertedType::TIMESTAMP_MILLIS)
                | (PhysicalType::INT64, ConvertedType::TIMESTAMP_MICROS) => ColumnType::Timestamp,
                (PhysicalType::INT32, _) | (PhysicalType::INT64, _) => ColumnType::Integer,
                (PhysicalType::FLOAT, _) | (PhysicalType::DOUBLE, _) => ColumnType::Float,
                (PhysicalType::BOOLEAN, _) => ColumnType::Boolean,
                _ => ColumnType::String,
            };
            Column::new(descr.name(), column_type)
        })
        .collect();

    let mut rows = Vec::new();
    for row in reader.get_row_iter(None)? {
        let row = row?;
        let values = row
            .get_column_iter()
            .map(|(name, field)| convert_field(name, field))
            .collect::<Result<Vec<_>>>()?;
        rows.push(values);
    }

    Dataset::new(columns, rows)
}

fn convert_field(column: &str, field: &Field) -> Result<Value> {
    let value = match field {
        Field::Null => Value::Null,
        Field::Bool(b) => Value::Boolean(*b),
        Field::Byte(v) => Value::Integer(i64::from(*v)),
        Field::Short(v) => Value::Integer(i64::from(*v)),
        Field::Int(v) => Value::Integer(i64::from(*v)),
        Field::Long(v) => Value::Integer(*v),
        Field::UByte(v) => Value::Integer(i64::from(*v)),
        Field::UShort(v) => Value::Integer(i64::from(*v)),
        Field::UInt(v) => Value::Integer(i64::from(*v)),
        Field::Float(v) => Value::Float(f64::from(*v)),
        Field::Double(v) => Value::Float(*v),
        Field::Str(s) => Value::String(s.clone()),
        Field::TimestampMillis(ms) => Value::Timestamp(
            DateTime::<Utc>::from_timestamp_millis(*ms)
                .ok_or_else(|| out_of_range(column, field))?
                .naive_utc(),
        ),
        Field::TimestampMicros(us) => Value::Timestamp(
            DateTime::<Utc>::from_timestamp_micros(*us)
                .ok_or_else(|| out_of_range(column, field))?
                .naive_utc(),
        ),
        other => Value::String(other.to_string()),
    };
    Ok(value)
}

fn out_of_range(column: &str, field: &Field) -> LoaderError {
    LoaderError::serialization(format!(
        "column '{}' holds an out-of-range timestamp {}",
        column, field
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_reads_every_row_in_order() {
        let dataset = Dataset::new(
            vec![
                Column::new("id", ColumnType::Integer),
                Column::new("name", ColumnType::String),
            ],
            (0..50)
                .map(|i| vec![Value::Integer(i), Value::String(format!("n{}", i))])
                .collect(),
        )
        .unwrap();

        let decoded = decode(&encode(&dataset).unwrap()).unwrap();
        assert_eq!(decoded.len(), 50);
        assert_eq!(decoded.rows()[0][0], Value::Integer(0));
        assert_eq!(decoded.rows()[49][1], Value::String("n49".into()));
    }

    #[test]
    fn test_decode_rejects_non_parquet_bytes() {
        assert!(decode(b"id,name\n1,a\n").is_err());
    }
}
