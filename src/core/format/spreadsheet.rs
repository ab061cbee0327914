use super::delimited::typed_dataset;
use crate::domain::model::{Dataset, Value};
use crate::utils::error::{LoaderError, Result};
use calamine::{Data, Reader, Xlsx};
use rust_xlsxwriter::{Workbook, XlsxError};
use std::io::Cursor;

const SHEET_NAME: &str = "Sheet1";

fn write_error(e: XlsxError) -> LoaderError {
    LoaderError::serialization(format!("failed to write spreadsheet: {}", e))
}

pub(super) fn encode(dataset: &Dataset) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME).map_err(write_error)?;

    for (col, column) in dataset.columns().iter().enumerate() {
        worksheet
            .write_string(0, col as u16, &column.name)
            .map_err(write_error)?;
    }

    for (idx, row) in dataset.rows().iter().enumerate() {
        let row_num = (idx + 1) as u32;
        for (col, value) in row.iter().enumerate() {
            let col = col as u16;
            let written = match value {
                Value::Null => continue,
                Value::Integer(i) => worksheet.write_number(row_num, col, *i as f64),
                Value::Float(f) => worksheet.write_number(row_num, col, *f),
                Value::Boolean(b) => worksheet.write_boolean(row_num, col, *b),
                Value::Timestamp(_) | Value::String(_) => {
                    worksheet.write_string(row_num, col, value.to_string())
                }
            };
            written.map_err(write_error)?;
        }
    }

    workbook.save_to_buffer().map_err(write_error)
}

/// Reads the first sheet; the first row holds column names.
pub(super) fn decode(bytes: &[u8]) -> Result<Dataset> {
    let read_error =
        |e: calamine::XlsxError| LoaderError::serialization(format!("failed to read spreadsheet: {}", e));

    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes.to_vec())).map_err(read_error)?;
    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| LoaderError::serialization("workbook has no sheets"))?;
    let range = workbook.worksheet_range(&sheet).map_err(read_error)?;

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(header) => header.iter().map(cell_text).collect(),
        None => return Err(LoaderError::serialization("sheet has no header row")),
    };
    let cells: Vec<Vec<String>> = rows
        .map(|row| {
            (0..headers.len())
                .map(|i| row.get(i).map(cell_text).unwrap_or_default())
                .collect()
        })
        .collect();

    typed_dataset(headers, cells)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::Bool(b) => b.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => format!("{}", *f as i64),
        other => other.to_string(),
    }
}
