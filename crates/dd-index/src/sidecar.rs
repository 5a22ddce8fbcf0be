//! The optional `metadata.csv` table next to the backing files.
//!
//! Published datasets ship one CSV row per simulation, keyed by an `ID`
//! column. The table is read once at build time and cross-checked against
//! the discovered files: rows without a file and files without a row are
//! both reported, and only rows with a file are kept.

use csv::{ReaderBuilder, Trim};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use dd_core::SimulationId;

use crate::config::IndexConfig;
use crate::error::{IndexError, IndexResult};
use crate::locator::LocatedFile;

pub const DEFAULT_SIDECAR: &str = "metadata.csv";
pub const ID_COLUMN: &str = "ID";

/// Outcome of cross-checking the sidecar against discovered files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SidecarReport {
    pub path: PathBuf,
    /// Header names other than `ID`, in file order.
    pub columns: Vec<String>,
    /// Data rows with a valid `ID`, duplicates included.
    pub rows: usize,
    /// Rows kept because their file was discovered.
    pub matched: usize,
    /// Rows whose `ID` field is empty or not an identifier, or that the CSV
    /// reader rejected.
    pub invalid_rows: usize,
    /// Rows repeating an earlier `ID`; the first one wins.
    pub duplicate_rows: usize,
    /// Listed in the sidecar, no backing file discovered.
    pub missing_files: Vec<SimulationId>,
    /// Discovered, no sidecar row.
    pub unlisted_files: Vec<SimulationId>,
}

impl SidecarReport {
    /// Every row names a discovered file and every file has a row.
    pub fn is_consistent(&self) -> bool {
        self.missing_files.is_empty()
            && self.unlisted_files.is_empty()
            && self.invalid_rows == 0
            && self.duplicate_rows == 0
    }
}

/// Rows of the sidecar whose simulation has a backing file.
#[derive(Debug, Clone)]
pub struct Sidecar {
    columns: Vec<String>,
    rows: BTreeMap<SimulationId, Vec<String>>,
    report: SidecarReport,
}

impl Sidecar {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn report(&self) -> &SidecarReport {
        &self.report
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of the non-`ID` columns, aligned with [`Sidecar::columns`].
    pub fn row(&self, id: &SimulationId) -> Option<&[String]> {
        self.rows.get(id).map(Vec::as_slice)
    }

    pub fn value(&self, id: &SimulationId, column: &str) -> Option<&str> {
        let index = self.columns.iter().position(|c| c == column)?;
        self.row(id)?.get(index).map(String::as_str)
    }

    /// Kept rows in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = (&SimulationId, &[String])> + '_ {
        self.rows.iter().map(|(id, values)| (id, values.as_slice()))
    }
}

/// `113525`, `007` and `113525.0` all name simulation 113525; float-typed
/// exports write whole numbers with a trailing `.0`.
pub fn parse_sidecar_id(raw: &str) -> Option<SimulationId> {
    if let Ok(id) = SimulationId::from_stem(raw) {
        return Some(id);
    }
    let (whole, fraction) = raw.split_once('.')?;
    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if digits(whole) && digits(fraction) && fraction.bytes().all(|b| b == b'0') {
        return whole.parse().ok().map(SimulationId::Numeric);
    }
    None
}

struct Table {
    columns: Vec<String>,
    rows: Vec<(SimulationId, Vec<String>)>,
    invalid_rows: usize,
}

fn csv_error(path: &Path, source: csv::Error) -> IndexError {
    IndexError::Csv {
        path: path.to_path_buf(),
        source,
    }
}

fn read_table(path: &Path) -> IndexResult<Table> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .from_path(path)
        .map_err(|source| csv_error(path, source))?;
    let headers = reader
        .headers()
        .map_err(|source| csv_error(path, source))?
        .clone();

    let Some(id_column) = headers.iter().position(|h| h == ID_COLUMN) else {
        return Err(IndexError::Sidecar {
            path: path.to_path_buf(),
            message: format!("no '{}' column in header", ID_COLUMN),
        });
    };
    let without_id = |fields: &csv::StringRecord| -> Vec<String> {
        fields
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != id_column)
            .map(|(_, v)| v.to_string())
            .collect()
    };

    let columns = without_id(&headers);
    let mut rows = Vec::new();
    let mut invalid_rows = 0;

    for (number, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping unreadable sidecar row");
                invalid_rows += 1;
                continue;
            }
        };
        let raw = record.get(id_column).unwrap_or_default();
        let Some(id) = parse_sidecar_id(raw) else {
            warn!(path = %path.display(), row = number + 1, id = raw, "skipping sidecar row with invalid ID");
            invalid_rows += 1;
            continue;
        };
        rows.push((id, without_id(&record)));
    }

    Ok(Table {
        columns,
        rows,
        invalid_rows,
    })
}

fn cross_check(path: PathBuf, table: Table, entries: &[LocatedFile]) -> Sidecar {
    let discovered: HashSet<&SimulationId> = entries.iter().map(|e| &e.id).collect();
    let mut seen: HashSet<SimulationId> = HashSet::new();
    let mut kept = BTreeMap::new();
    let mut missing_files = Vec::new();
    let mut duplicate_rows = 0;
    let rows = table.rows.len();

    for (id, values) in table.rows {
        if !seen.insert(id.clone()) {
            warn!(id = %id, "duplicate sidecar row, keeping the first");
            duplicate_rows += 1;
            continue;
        }
        if discovered.contains(&id) {
            kept.insert(id, values);
        } else {
            missing_files.push(id);
        }
    }
    missing_files.sort();

    let unlisted_files: Vec<SimulationId> = entries
        .iter()
        .filter(|e| !kept.contains_key(&e.id))
        .map(|e| e.id.clone())
        .collect();

    if kept.len() < rows {
        warn!(
            path = %path.display(),
            matched = kept.len(),
            rows,
            "found {}/{} sidecar rows with existing files",
            kept.len(),
            rows
        );
    }
    if !unlisted_files.is_empty() {
        warn!(count = unlisted_files.len(), "discovered files missing from the sidecar");
    }

    let report = SidecarReport {
        path,
        columns: table.columns.clone(),
        rows,
        matched: kept.len(),
        invalid_rows: table.invalid_rows,
        duplicate_rows,
        missing_files,
        unlisted_files,
    };
    Sidecar {
        columns: table.columns,
        rows: kept,
        report,
    }
}

/// Read `<root>/<config.sidecar>` if configured and present.
///
/// A missing file is not an error. A file without an `ID` column is.
pub fn load(root: &Path, config: &IndexConfig, entries: &[LocatedFile]) -> IndexResult<Option<Sidecar>> {
    let Some(name) = &config.sidecar else {
        return Ok(None);
    };
    let path = root.join(name);
    if !path.is_file() {
        debug!(path = %path.display(), "no sidecar table");
        return Ok(None);
    }
    let table = read_table(&path)?;
    Ok(Some(cross_check(path, table, entries)))
}
