//! Claim records read from CSV.

use std::collections::BTreeMap;
use std::path::Path;

use csv::ReaderBuilder;
use log::info;

use crate::error::{ClaimscopeError, Result};

/// One row of the claims table keyed by column name.
pub type ClaimRecord = BTreeMap<String, String>;

/// Load header-keyed records from a CSV file.
///
/// The first row names the columns. Values are trimmed; rows may be shorter
/// than the header, in which case the missing columns are absent.
pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Vec<ClaimRecord>> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(ClaimscopeError::ingest(format!(
            "claims data not found at {}",
            path.display()
        )));
    }

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)?;
    let records = read_records(&mut reader)?;

    info!("loaded {} claim records from {}", records.len(), path.display());
    Ok(records)
}

/// Parse header-keyed records from CSV text.
pub fn parse_csv(data: &str) -> Result<Vec<ClaimRecord>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(data.as_bytes());
    read_records(&mut reader)
}

fn read_records<R: std::io::Read>(reader: &mut csv::Reader<R>) -> Result<Vec<ClaimRecord>> {
    let headers = reader.headers()?.clone();
    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let record: ClaimRecord = headers
            .iter()
            .zip(row.iter())
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        records.push(record);
    }
    Ok(records)
}
