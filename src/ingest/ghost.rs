//! Parser for "ghost" delimited-text spectra.
//!
//! The format is a `Key: Value` header block followed by one integer per
//! line (counts on the detector). The header ends at the first line whose
//! first token is numeric; blank lines and header lines without a colon are
//! ignored.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use super::IngestError;

/// A parsed ghost spectrum: header metadata plus the 1-D sample body.
#[derive(Debug, Clone, Default)]
pub(crate) struct GhostSpectrum {
    /// Header `Key: Value` pairs, keys and values trimmed.
    pub metadata: BTreeMap<String, String>,
    /// Detector counts in file order.
    pub samples: Vec<i64>,
}

/// Parse a ghost spectrum file.
pub(crate) fn parse_file(path: &Path) -> Result<GhostSpectrum, IngestError> {
    let file = File::open(path).map_err(|source| IngestError::Storage {
        path: path.display().to_string(),
        source,
    })?;
    parse(BufReader::new(file)).map_err(|source| IngestError::Storage {
        path: path.display().to_string(),
        source,
    })
}

/// Parse a ghost spectrum from a line reader.
pub(crate) fn parse<R: BufRead>(reader: R) -> Result<GhostSpectrum, std::io::Error> {
    let mut spectrum = GhostSpectrum::default();
    let mut in_header = true;

    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if in_header {
            let first_token = trimmed.split_whitespace().next().unwrap_or("");
            if first_token.parse::<f64>().is_ok() {
                in_header = false;
            } else {
                if let Some((key, value)) = trimmed.split_once(':') {
                    spectrum
                        .metadata
                        .insert(key.trim().to_string(), value.trim().to_string());
                }
                continue;
            }
        }

        // Body: only lines that are a whole base-10 integer count.
        if let Ok(value) = trimmed.parse::<i64>() {
            spectrum.samples.push(value);
        }
    }

    Ok(spectrum)
}
