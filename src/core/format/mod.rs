//! Table serializer: one closed set of on-disk encodings for a `Dataset`.

mod binary;
mod columnar;
mod delimited;
#[cfg(feature = "excel")]
mod spreadsheet;

use crate::domain::model::Dataset;
use crate::domain::ports::ObjectMeta;
use crate::utils::error::{LoaderError, Result};
use crate::utils::validation::{validate_format_char, validate_positive_number};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableFormat {
    #[default]
    Csv,
    Parquet,
    Xlsx,
    Binary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    None,
    Gzip,
}

impl TableFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            TableFormat::Csv => "csv",
            TableFormat::Parquet => "parquet",
            TableFormat::Xlsx => "xlsx",
            TableFormat::Binary => "bin",
        }
    }

    pub fn supports(&self, compression: Compression) -> bool {
        match compression {
            Compression::None => true,
            Compression::Gzip => matches!(self, TableFormat::Csv | TableFormat::Binary),
        }
    }

    /// Whether the warehouse COPY command can read this encoding.
    pub fn is_copy_loadable(&self) -> bool {
        matches!(self, TableFormat::Csv | TableFormat::Parquet)
    }

    /// Detects format and compression from an object key suffix.
    pub fn detect(key: &str) -> Option<(TableFormat, Compression)> {
        let (stem, compression) = match key.strip_suffix(".gz") {
            Some(stem) => (stem, Compression::Gzip),
            None => (key, Compression::None),
        };
        let extension = stem.rsplit_once('.').map(|(_, ext)| ext)?;
        let format = extension.parse::<TableFormat>().ok()?;
        format.supports(compression).then_some((format, compression))
    }
}

impl fmt::Display for TableFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for TableFormat {
    type Err = LoaderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(TableFormat::Csv),
            "parquet" => Ok(TableFormat::Parquet),
            "xlsx" => Ok(TableFormat::Xlsx),
            "bin" | "binary" => Ok(TableFormat::Binary),
            other => Err(LoaderError::validation(format!(
                "unsupported format '{}', expected one of csv, parquet, xlsx, binary",
                other
            ))),
        }
    }
}

impl FromStr for Compression {
    type Err = LoaderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "none" => Ok(Compression::None),
            "gzip" | "gz" => Ok(Compression::Gzip),
            other => Err(LoaderError::validation(format!(
                "unsupported compression '{}', expected none or gzip",
                other
            ))),
        }
    }
}

/// How a dataset is laid out in the object store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatOptions {
    pub format: TableFormat,
    pub compression: Compression,
    pub delimiter: char,
    pub quote: char,
    /// Number of objects the rows are split across.
    pub parts: usize,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            format: TableFormat::Csv,
            compression: Compression::Gzip,
            delimiter: ',',
            quote: '"',
            parts: 1,
        }
    }
}

impl FormatOptions {
    pub fn new(format: TableFormat, compression: Compression) -> Self {
        Self {
            format,
            compression,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.format.supports(self.compression) {
            return Err(LoaderError::validation(format!(
                "{} objects cannot be gzip compressed",
                self.format
            )));
        }
        validate_positive_number("parts", self.parts, 1)?;
        for (field, value) in [("delimiter", self.delimiter), ("quote", self.quote)] {
            validate_format_char(field, value)?;
            if !value.is_ascii() {
                return Err(LoaderError::validation(format!(
                    "{} must be an ASCII character",
                    field
                )));
            }
        }
        if self.delimiter == self.quote {
            return Err(LoaderError::validation(
                "delimiter and quote character must differ",
            ));
        }
        Ok(())
    }

    /// Key suffix without the leading dot, e.g. `csv.gz`.
    pub fn suffix(&self) -> String {
        match self.compression {
            Compression::None => self.format.extension().to_string(),
            Compression::Gzip => format!("{}.gz", self.format.extension()),
        }
    }

    pub fn object_meta(&self) -> ObjectMeta {
        let content_type = match self.format {
            TableFormat::Csv => "text/csv",
            TableFormat::Parquet | TableFormat::Binary => "application/octet-stream",
            TableFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        };
        ObjectMeta {
            content_type: content_type.to_string(),
            content_encoding: match self.compression {
                Compression::None => None,
                Compression::Gzip => Some("gzip".to_string()),
            },
        }
    }

    pub fn encode(&self, dataset: &Dataset) -> Result<Vec<u8>> {
        self.validate()?;
        let raw = match self.format {
            TableFormat::Csv => {
                delimited::encode(dataset, self.delimiter as u8, self.quote as u8)?
            }
            TableFormat::Parquet => columnar::encode(dataset)?,
            TableFormat::Xlsx => encode_xlsx(dataset)?,
            TableFormat::Binary => binary::encode(dataset)?,
        };
        match self.compression {
            Compression::None => Ok(raw),
            Compression::Gzip => gzip(&raw),
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<Dataset> {
        self.validate()?;
        let inflated;
        let raw = match self.compression {
            Compression::None => bytes,
            Compression::Gzip => {
                inflated = gunzip(bytes)?;
                inflated.as_slice()
            }
        };
        match self.format {
            TableFormat::Csv => delimited::decode(raw, self.delimiter as u8, self.quote as u8),
            TableFormat::Parquet => columnar::decode(raw),
            TableFormat::Xlsx => decode_xlsx(raw),
            TableFormat::Binary => binary::decode(raw),
        }
    }
}

#[cfg(feature = "excel")]
fn encode_xlsx(dataset: &Dataset) -> Result<Vec<u8>> {
    spreadsheet::encode(dataset)
}

#[cfg(not(feature = "excel"))]
fn encode_xlsx(_dataset: &Dataset) -> Result<Vec<u8>> {
    Err(LoaderError::serialization(
        "xlsx support requires the `excel` feature",
    ))
}

#[cfg(feature = "excel")]
fn decode_xlsx(bytes: &[u8]) -> Result<Dataset> {
    spreadsheet::decode(bytes)
}

#[cfg(not(feature = "excel"))]
fn decode_xlsx(_bytes: &[u8]) -> Result<Dataset> {
    Err(LoaderError::serialization(
        "xlsx support requires the `excel` feature",
    ))
}

fn gzip(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?)
}

fn gunzip(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(bytes);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}
