//! CSV reading and writing for [`DataFrame`].

use crate::data::frame::{Column, ColumnData, DataFrame};
use crate::error::MlError;
use std::io::Read;
use std::path::Path;

/// Read a headed CSV file into a frame, inferring column types.
pub fn read_csv(path: &Path) -> Result<DataFrame, MlError> {
    let file = std::fs::File::open(path).map_err(|e| {
        MlError::dataset(format!("failed to open csv `{}`: {e}", path.display()))
    })?;
    from_csv_reader(file)
}

/// Parse headed CSV bytes into a frame.
pub fn from_csv_bytes(bytes: &[u8]) -> Result<DataFrame, MlError> {
    from_csv_reader(bytes)
}

/// Parse headed CSV from any reader.
///
/// Every record must have as many fields as the header.
pub fn from_csv_reader<R: Read>(reader: R) -> Result<DataFrame, MlError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    if headers.is_empty() || headers.iter().all(String::is_empty) {
        return Err(MlError::dataset("csv has no header row"));
    }

    let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for record in rdr.records() {
        let record = record?;
        for (col, field) in cells.iter_mut().zip(record.iter()) {
            col.push(field.to_string());
        }
    }

    let columns = headers
        .into_iter()
        .zip(cells)
        .map(|(name, values)| Column::new(name, ColumnData::infer(values)))
        .collect();
    DataFrame::new(columns)
}

/// Serialize a frame to headed CSV bytes.
pub fn to_csv_bytes(frame: &DataFrame) -> Result<Vec<u8>, MlError> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(frame.column_names())?;

    let rendered: Vec<Vec<String>> = frame
        .columns()
        .iter()
        .map(|c| c.data.to_strings())
        .collect();
    for row in 0..frame.row_count() {
        wtr.write_record(rendered.iter().map(|col| col[row].as_str()))?;
    }

    wtr.into_inner()
        .map_err(|e| MlError::dataset(format!("failed to flush csv writer: {e}")))
}

/// Write a frame to `path` as CSV, atomically.
pub fn write_csv(frame: &DataFrame, path: &Path) -> Result<(), MlError> {
    let bytes = to_csv_bytes(frame)?;
    forest_core::persistence::atomic_write(path, &bytes)?;
    Ok(())
}
