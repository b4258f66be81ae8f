//! Prospect file loading.
//!
//! Reads `.csv` (comma) and `.tsv` (tab) files, and the first worksheet of
//! `.xlsx`, `.xlsm`, `.xls` or `.ods` workbooks. The first row holds the
//! headers. Header names are matched case-insensitively and extra columns are
//! ignored.

use std::path::Path;

use calamine::Reader;

use crate::core::FatalConfigError;

use super::RawProspect;

const REQUIRED_COLUMNS: [&str; 4] = ["name", "email", "company", "role"];

const SUPPORTED: &str = ".csv, .tsv, .xlsx, .xlsm, .xls or .ods";

/// How a prospect file is parsed, from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputFormat {
    Delimited(u8),
    Spreadsheet,
}

/// Load raw prospect rows from `path`, in file order.
///
/// `limit` caps the number of data rows read. Row-level problems (blank
/// cells, bad emails, undecodable bytes) are left for validation; only
/// file-level problems are errors here.
pub fn load_prospects(
    path: &Path,
    limit: Option<usize>,
) -> Result<Vec<RawProspect>, FatalConfigError> {
    let rows = match input_format(path)? {
        InputFormat::Delimited(delimiter) => std::fs::File::open(path)
            .map_err(|e| e.to_string())
            .and_then(|file| read_prospects(file, delimiter, limit)),
        InputFormat::Spreadsheet => read_spreadsheet(path, limit),
    }
    .map_err(|reason| input_error(path, reason))?;

    tracing::info!(path = %path.display(), rows = rows.len(), "Loaded prospects");
    Ok(rows)
}

/// Parse delimited prospect rows from any reader.
///
/// Cells that are not valid UTF-8 are decoded lossily so one badly encoded
/// row does not take down the file.
pub fn read_prospects<R: std::io::Read>(
    reader: R,
    delimiter: u8,
    limit: Option<usize>,
) -> Result<Vec<RawProspect>, String> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = reader
        .byte_headers()
        .map_err(|e| e.to_string())?
        .iter()
        .map(|h| String::from_utf8_lossy(h).into_owned())
        .collect();
    let columns = ColumnMap::from_headers(&headers)?;

    let mut rows = Vec::new();
    for (index, record) in reader.byte_records().enumerate() {
        if limit.is_some_and(|max| rows.len() >= max) {
            break;
        }
        let record = record.map_err(|e| e.to_string())?;
        let row = index + 1;
        if std::str::from_utf8(record.as_slice()).is_err() {
            tracing::warn!(row, "Row is not valid UTF-8, replacing undecodable bytes");
        }

        let cells: Vec<String> = record
            .iter()
            .map(|c| String::from_utf8_lossy(c).into_owned())
            .collect();
        rows.push(columns.prospect(row, &cells));
    }

    Ok(rows)
}

/// Parse prospect rows from the first worksheet of a workbook.
///
/// Fully blank rows are skipped but still count toward row numbers.
fn read_spreadsheet(path: &Path, limit: Option<usize>) -> Result<Vec<RawProspect>, String> {
    let mut workbook = calamine::open_workbook_auto(path).map_err(|e| e.to_string())?;
    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| "workbook has no worksheets".to_string())?;
    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| format!("worksheet '{sheet}': {e}"))?;

    let mut lines = range.rows();
    let headers: Vec<String> = lines
        .next()
        .ok_or_else(|| format!("worksheet '{sheet}' is empty"))?
        .iter()
        .map(ToString::to_string)
        .collect();
    let columns = ColumnMap::from_headers(&headers)?;

    let mut rows = Vec::new();
    for (index, line) in lines.enumerate() {
        if limit.is_some_and(|max| rows.len() >= max) {
            break;
        }
        let cells: Vec<String> = line.iter().map(ToString::to_string).collect();
        if cells.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        rows.push(columns.prospect(index + 1, &cells));
    }

    tracing::debug!(sheet = %sheet, rows = rows.len(), "Read worksheet");
    Ok(rows)
}

/// Positions of the required columns, in [`REQUIRED_COLUMNS`] order.
struct ColumnMap([usize; 4]);

impl ColumnMap {
    fn from_headers<S: AsRef<str>>(headers: &[S]) -> Result<Self, String> {
        let mut columns = [0usize; 4];
        for (slot, required) in columns.iter_mut().zip(REQUIRED_COLUMNS) {
            *slot = headers
                .iter()
                .position(|h| h.as_ref().trim().eq_ignore_ascii_case(required))
                .ok_or_else(|| format!("missing required column '{required}'"))?;
        }
        Ok(Self(columns))
    }

    fn prospect(&self, row: usize, cells: &[String]) -> RawProspect {
        let cell = |i: usize| {
            cells
                .get(self.0[i])
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(String::from)
        };

        RawProspect {
            row,
            name: cell(0),
            email: cell(1),
            company: cell(2),
            role: cell(3),
        }
    }
}

fn input_format(path: &Path) -> Result<InputFormat, FatalConfigError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("csv") => Ok(InputFormat::Delimited(b',')),
        Some("tsv") => Ok(InputFormat::Delimited(b'\t')),
        Some("xlsx" | "xlsm" | "xls" | "ods") => Ok(InputFormat::Spreadsheet),
        Some(other) => Err(input_error(
            path,
            format!("unsupported file type '.{other}' (expected {SUPPORTED})"),
        )),
        None => Err(input_error(
            path,
            format!("missing file extension (expected {SUPPORTED})"),
        )),
    }
}

fn input_error(path: &Path, reason: String) -> FatalConfigError {
    FatalConfigError::Input {
        path: path.to_path_buf(),
        reason,
    }
}
