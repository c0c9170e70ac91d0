//! Decoder for 2-D map acquisitions stored as CSV numeric grids.

use std::path::Path;

use crate::container::Payload;

use super::IngestError;

/// Decode a rectangular CSV grid into a 2-D payload.
pub(crate) fn parse_file(path: &Path) -> Result<Payload, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| csv_error(path, e))?;

    let mut rows = 0_usize;
    let mut cols = 0_usize;
    let mut values = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|e| csv_error(path, e))?;
        if index == 0 {
            cols = record.len();
        }
        for field in record.iter() {
            let value = field
                .parse::<f64>()
                .map_err(|_| IngestError::InvalidData {
                    path: path.display().to_string(),
                    reason: format!("non-numeric cell '{field}' in row {}", index + 1),
                })?;
            values.push(value);
        }
        rows += 1;
    }

    if rows == 0 || cols == 0 {
        return Err(IngestError::InvalidData {
            path: path.display().to_string(),
            reason: "empty map file".to_string(),
        });
    }

    Ok(Payload::TwoD { rows, cols, values })
}

fn csv_error(path: &Path, error: csv::Error) -> IngestError {
    let reason = error.to_string();
    match error.into_kind() {
        csv::ErrorKind::Io(source) => IngestError::Storage {
            path: path.display().to_string(),
            source,
        },
        _ => IngestError::InvalidData {
            path: path.display().to_string(),
            reason,
        },
    }
}
