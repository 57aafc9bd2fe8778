//! Output writers for decoded records.
//!
//! Supports CSV with a selectable column set and JSON Lines.

use crate::schema::SchemaDefinition;
use crate::types::Record;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during output writing.
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Which fields to emit, and in what order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FieldSelection {
    /// Every field, in schema order
    #[default]
    All,
    /// Only the named fields, in the given order
    Named(Vec<String>),
}

impl std::str::FromStr for FieldSelection {
    type Err = OutputError;

    /// Parses a comma-separated list such as `"prefix,prefix_len,peer_ip"`.
    /// `"*"` or an empty string selects every field.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s == "*" {
            return Ok(Self::All);
        }

        let mut names: Vec<String> = Vec::new();
        for part in s.split(',').map(str::trim) {
            if part.is_empty() {
                return Err(OutputError::InvalidFormat(format!(
                    "Empty field name in {:?}",
                    s
                )));
            }
            if names.iter().any(|name| name == part) {
                return Err(OutputError::InvalidFormat(format!(
                    "Duplicate field: {}",
                    part
                )));
            }
            names.push(part.to_string());
        }

        Ok(Self::Named(names))
    }
}

impl FieldSelection {
    /// Resolves the selection against a schema into concrete column names.
    ///
    /// Fails if a named field does not exist in the schema.
    pub fn columns(&self, schema: &SchemaDefinition) -> Result<Vec<String>, OutputError> {
        match self {
            Self::All => Ok(schema
                .field_names()
                .iter()
                .map(|name| name.to_string())
                .collect()),
            Self::Named(names) => {
                if let Some(unknown) = names.iter().find(|name| schema.index_of(name).is_none()) {
                    return Err(OutputError::InvalidFormat(format!(
                        "Unknown field for {} v{}: {}",
                        schema.record_type(),
                        schema.version(),
                        unknown
                    )));
                }
                Ok(names.clone())
            }
        }
    }
}

/// CSV output writer for decoded records.
///
/// Columns missing from a record (e.g. a field added in a newer version)
/// are written as empty cells.
pub struct CsvWriter<W: Write> {
    writer: BufWriter<W>,
    columns: Vec<String>,
}

impl<W: Write> CsvWriter<W> {
    /// Creates a new CSV writer for the given columns.
    pub fn new(writer: W, columns: Vec<String>) -> Self {
        Self {
            writer: BufWriter::new(writer),
            columns,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Writes the header row.
    pub fn write_header(&mut self) -> Result<(), OutputError> {
        let header: Vec<String> = self.columns.iter().map(|c| escape_csv(c)).collect();
        writeln!(self.writer, "{}", header.join(","))?;
        Ok(())
    }

    /// Writes a batch of records.
    pub fn write_records<'a, I>(&mut self, records: I) -> Result<(), OutputError>
    where
        I: IntoIterator<Item = &'a Record>,
    {
        for record in records {
            self.write_record(record)?;
        }
        Ok(())
    }

    /// Writes a single record.
    pub fn write_record(&mut self, record: &Record) -> Result<(), OutputError> {
        let cells: Vec<String> = self
            .columns
            .iter()
            .map(|column| {
                record
                    .get(column)
                    .map(|value| escape_csv(&value.to_string()))
                    .unwrap_or_default()
            })
            .collect();
        writeln!(self.writer, "{}", cells.join(","))?;
        Ok(())
    }

    /// Flushes the writer.
    pub fn flush(&mut self) -> Result<(), OutputError> {
        self.writer.flush()?;
        Ok(())
    }
}

fn escape_csv(cell: &str) -> String {
    if cell.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

/// JSON Lines writer: one JSON object per record.
pub struct JsonWriter<W: Write> {
    writer: BufWriter<W>,
}

impl<W: Write> JsonWriter<W> {
    /// Creates a new JSON Lines writer.
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
        }
    }

    /// Writes a batch of records.
    pub fn write_records<'a, I>(&mut self, records: I) -> Result<(), OutputError>
    where
        I: IntoIterator<Item = &'a Record>,
    {
        for record in records {
            self.write_record(record)?;
        }
        Ok(())
    }

    pub fn write_record(&mut self, record: &Record) -> Result<(), OutputError> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    /// Flushes the writer.
    pub fn flush(&mut self) -> Result<(), OutputError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Writes records to a CSV file with a header row.
pub fn write_csv<P: AsRef<Path>>(
    path: P,
    records: &[Record],
    columns: Vec<String>,
) -> Result<(), OutputError> {
    let file = File::create(path)?;
    let mut writer = CsvWriter::new(file, columns);
    writer.write_header()?;
    writer.write_records(records)?;
    writer.flush()?;
    Ok(())
}

/// Writes records to a JSON Lines file.
pub fn write_json_lines<P: AsRef<Path>>(path: P, records: &[Record]) -> Result<(), OutputError> {
    let file = File::create(path)?;
    let mut writer = JsonWriter::new(file);
    writer.write_records(records)?;
    writer.flush()?;
    Ok(())
}
