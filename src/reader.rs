/*!
 * Row sources and the delimited-text reader
 *
 * A load starts from exactly one [`RowSource`]. The CSV sources in this
 * module read the whole table at once, sniff the delimiter from the header
 * line, strip a byte-order mark, and fall back to Latin-1 when the bytes are
 * not valid UTF-8 (older regulator exports are Latin-1 encoded).
 */

use std::path::{Path, PathBuf};
use std::time::Instant;

use csv::ReaderBuilder;
use serde_json::Value;
use tracing::{debug, info, warn};

#[cfg(feature = "progress")]
use indicatif::{ProgressBar, ProgressStyle};

use crate::data_types::{OperatorRecord, RawRow};
use crate::error::{ErrorContext, IdssError, Result};
use crate::normalize::normalize_batch;
use crate::schema::ColumnMap;

/// Delimiters tried when sniffing, in tie-break order
pub const CANDIDATE_DELIMITERS: [u8; 4] = [b',', b';', b'\t', b'|'];

/// Number of warnings printed before skipped rows are only counted
const MAX_ROW_WARNINGS: usize = 10;

/// Anything that can produce the raw rows of one dataset load
pub trait RowSource {
    /// Fetch every row; an empty table is an error
    fn fetch_rows(&self) -> Result<Vec<RawRow>>;

    /// Human-readable origin, used in logs and error messages
    fn describe(&self) -> String;
}

/// Fetch from a source and normalize every row
pub fn load_records(source: &dyn RowSource) -> Result<Vec<OperatorRecord>> {
    let start = Instant::now();
    let rows = source.fetch_rows()?;
    if rows.is_empty() {
        return Err(IdssError::empty_source(source.describe()));
    }

    let records = normalize_batch(&rows);
    info!(
        source = %source.describe(),
        records = records.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "loaded IDSS records"
    );
    Ok(records)
}

/// Pick the delimiter occurring most often in the header line.
///
/// Ties go to the earlier entry of [`CANDIDATE_DELIMITERS`]; a line with none
/// of them is read as comma-separated.
pub fn sniff_delimiter(header_line: &str) -> u8 {
    let mut best = b',';
    let mut best_count = 0;
    for candidate in CANDIDATE_DELIMITERS {
        let count = header_line.bytes().filter(|b| *b == candidate).count();
        if count > best_count {
            best = candidate;
            best_count = count;
        }
    }
    best
}

/// Decode file bytes: UTF-8 when valid, Latin-1 otherwise
pub fn decode_text(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => {
            debug!("input is not valid UTF-8, decoding as Latin-1");
            err.into_bytes().iter().map(|&b| b as char).collect()
        }
    }
}

/// Delimited-text reader
#[derive(Debug, Clone)]
pub struct IdssReader {
    /// Fixed delimiter; sniffed from the header line when `None`
    delimiter: Option<u8>,
    /// Skip structurally broken rows (true) or fail the load (false)
    skip_invalid_rows: bool,
    #[cfg(feature = "progress")]
    show_progress_bar: bool,
}

impl Default for IdssReader {
    fn default() -> Self {
        Self::new()
    }
}

impl IdssReader {
    pub fn new() -> Self {
        Self {
            delimiter: None,
            skip_invalid_rows: true,
            #[cfg(feature = "progress")]
            show_progress_bar: false,
        }
    }

    pub fn with_delimiter(mut self, delimiter: Option<u8>) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_skip_invalid_rows(mut self, skip: bool) -> Self {
        self.skip_invalid_rows = skip;
        self
    }

    /// Enable or disable the progress bar (no-op without the `progress` feature)
    #[allow(unused_mut, unused_variables)]
    pub fn with_progress_bar(mut self, show: bool) -> Self {
        #[cfg(feature = "progress")]
        {
            self.show_progress_bar = show;
        }
        self
    }

    /// Read a CSV file from disk
    pub fn read_file<P: AsRef<Path>>(&self, path: P) -> Result<Vec<RawRow>> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(IdssError::file_not_found_with_suggestion(path.to_path_buf()));
        }

        let bytes = std::fs::read(path).map_err(|source| IdssError::Io {
            message: format!("failed to read {}", path.display()),
            source,
            context: ErrorContext {
                file_path: Some(path.to_path_buf()),
                ..Default::default()
            },
        })?;

        self.read_text_from(&decode_text(bytes), Some(path))
    }

    /// Read CSV text held in memory
    pub fn read_text(&self, text: &str) -> Result<Vec<RawRow>> {
        self.read_text_from(text, None)
    }

    fn read_text_from(&self, text: &str, path: Option<&Path>) -> Result<Vec<RawRow>> {
        let text = text.trim_start_matches('\u{feff}');
        let header_line = text.lines().next().unwrap_or("");
        let delimiter = self.delimiter.unwrap_or_else(|| sniff_delimiter(header_line));
        debug!(delimiter = %(delimiter as char).escape_default(), "reading delimited text");

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .delimiter(delimiter)
            .trim(csv::Trim::Headers)
            .from_reader(text.as_bytes());

        let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
        let columns = ColumnMap::from_headers(&headers);
        if !columns.has_identity_columns() {
            warn!(
                headers = headers.len(),
                "no registry-number/year columns recognised; records will have empty identity fields"
            );
        }

        #[cfg(feature = "progress")]
        let progress_bar = if self.show_progress_bar {
            let pb = ProgressBar::new(text.len() as u64);
            if let Ok(style) =
                ProgressStyle::default_bar().template("[{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
            {
                pb.set_style(style.progress_chars("#>-"));
            }
            Some(pb)
        } else {
            None
        };

        let mut rows = Vec::new();
        let mut invalid_count = 0usize;

        for (index, result) in reader.records().enumerate() {
            // Header is line 1
            let line_number = index + 2;

            #[cfg(feature = "progress")]
            if let Some(ref pb) = progress_bar {
                if let Ok(ref record) = result {
                    if let Some(position) = record.position() {
                        pb.set_position(position.byte());
                    }
                }
            }

            match result {
                Ok(record) => {
                    let row: RawRow = headers
                        .iter()
                        .zip(record.iter())
                        .map(|(header, cell)| (header.clone(), cell_value(cell)))
                        .collect();
                    rows.push(row);
                }
                Err(err) => {
                    let error = IdssError::CsvParse {
                        message: format!("CSV error: {}", err),
                        line: Some(line_number),
                        context: ErrorContext {
                            file_path: path.map(|p| p.to_path_buf()),
                            line_number: Some(line_number),
                        },
                    };

                    if !self.skip_invalid_rows {
                        return Err(error);
                    }
                    invalid_count += 1;
                    if invalid_count <= MAX_ROW_WARNINGS {
                        warn!("skipping row: {}", error);
                    }
                }
            }
        }

        #[cfg(feature = "progress")]
        if let Some(pb) = progress_bar {
            pb.finish_with_message("Loading complete");
        }

        if invalid_count > 0 {
            warn!(skipped = invalid_count, "skipped invalid rows");
        }
        debug!(rows = rows.len(), "parsed delimited text");

        Ok(rows)
    }
}

/// Empty cells become null so every source agrees on "missing"
fn cell_value(cell: &str) -> Value {
    if cell.trim().is_empty() {
        Value::Null
    } else {
        Value::String(cell.to_string())
    }
}

/// CSV table held in memory (an uploaded file's contents, for example)
#[derive(Debug, Clone)]
pub struct CsvTextSource {
    text: String,
    reader: IdssReader,
}

impl CsvTextSource {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            reader: IdssReader::new(),
        }
    }

    pub fn with_reader(mut self, reader: IdssReader) -> Self {
        self.reader = reader;
        self
    }
}

impl RowSource for CsvTextSource {
    fn fetch_rows(&self) -> Result<Vec<RawRow>> {
        let rows = self.reader.read_text(&self.text)?;
        if rows.is_empty() {
            return Err(IdssError::empty_source(self.describe()));
        }
        Ok(rows)
    }

    fn describe(&self) -> String {
        format!("inline CSV ({} bytes)", self.text.len())
    }
}

/// CSV table on disk
#[derive(Debug, Clone)]
pub struct CsvFileSource {
    path: PathBuf,
    reader: IdssReader,
}

impl CsvFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            reader: IdssReader::new(),
        }
    }

    pub fn with_reader(mut self, reader: IdssReader) -> Self {
        self.reader = reader;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RowSource for CsvFileSource {
    fn fetch_rows(&self) -> Result<Vec<RawRow>> {
        let rows = self.reader.read_file(&self.path)?;
        if rows.is_empty() {
            return Err(IdssError::empty_source(self.describe()));
        }
        Ok(rows)
    }

    fn describe(&self) -> String {
        format!("CSV file {}", self.path.display())
    }
}
