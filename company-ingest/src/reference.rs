//! Bulk reference data, loaded once at startup and read-only afterwards.
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Separator between names in the available-names column.
pub const NAME_SEPARATOR: char = '|';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceRecord {
    pub domain: String,
    pub commercial_name: String,
    pub legal_name: String,
    pub available_names: Vec<String>,
}

#[derive(Error, Debug)]
pub enum ReferenceError {
    #[error("reference file {0} not found")]
    NotFound(String),
    #[error("could not open reference file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("could not parse reference file: {0}")]
    Csv(#[from] csv::Error),
}

/// Positions of the known columns in the header row. Other columns are ignored.
struct Columns {
    domain: Option<usize>,
    commercial_name: Option<usize>,
    legal_name: Option<usize>,
    available_names: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &StringRecord) -> Self {
        let position = |name: &str| headers.iter().position(|header| header.trim() == name);
        Self {
            domain: position("domain"),
            commercial_name: position("company_commercial_name"),
            legal_name: position("company_legal_name"),
            available_names: position("company_all_available_names"),
        }
    }
}

/// The cell at `column`, empty when the column is unknown or the row is short.
fn cell(record: &StringRecord, column: Option<usize>) -> &str {
    column
        .and_then(|idx| record.get(idx))
        .unwrap_or_default()
}

/// Reference records keyed by domain.
#[derive(Debug, Default)]
pub struct ReferenceData {
    records: HashMap<String, ReferenceRecord>,
    skipped_rows: usize,
}

impl ReferenceData {
    pub fn load(path: &Path) -> Result<Self, ReferenceError> {
        let display = path.display().to_string();
        if !path.exists() {
            return Err(ReferenceError::NotFound(display));
        }
        let file = File::open(path).map_err(|source| ReferenceError::Io {
            path: display.clone(),
            source,
        })?;

        let data = Self::from_reader(file)?;
        let loaded_path = display.as_str();
        info!(
            path = %loaded_path,
            records = data.len(),
            skipped_rows = data.skipped_rows,
            "reference data loaded"
        );
        Ok(data)
    }

    /// Parse CSV with a header row. Rows without a domain are skipped; a later
    /// row for an already seen domain replaces the earlier one.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ReferenceError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(reader);

        let columns = Columns::from_headers(reader.headers()?);
        if columns.domain.is_none() {
            warn!("reference file has no domain column, every row will be skipped");
        }

        let mut data = ReferenceData::default();
        for (line, row) in reader.records().enumerate() {
            let row = row?;

            let domain = cell(&row, columns.domain);
            if domain.is_empty() {
                // +2: one for the header, one for counting from 1
                warn!(line = line + 2, "skipping reference row with missing domain");
                data.skipped_rows += 1;
                continue;
            }

            let record = ReferenceRecord {
                domain: domain.to_owned(),
                commercial_name: cell(&row, columns.commercial_name).to_owned(),
                legal_name: cell(&row, columns.legal_name).to_owned(),
                available_names: split_names(cell(&row, columns.available_names)),
            };

            if data.records.insert(domain.to_owned(), record).is_some() {
                debug!(line = line + 2, "duplicate reference domain, keeping the later row");
            }
        }

        Ok(data)
    }

    pub fn get(&self, domain: &str) -> Option<&ReferenceRecord> {
        self.records.get(domain)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn skipped_rows(&self) -> usize {
        self.skipped_rows
    }
}

impl FromIterator<ReferenceRecord> for ReferenceData {
    fn from_iter<T: IntoIterator<Item = ReferenceRecord>>(iter: T) -> Self {
        let records = iter
            .into_iter()
            .map(|record| (record.domain.clone(), record))
            .collect();
        ReferenceData {
            records,
            skipped_rows: 0,
        }
    }
}

pub fn split_names(names: &str) -> Vec<String> {
    names
        .split(NAME_SEPARATOR)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_owned)
        .collect()
}
