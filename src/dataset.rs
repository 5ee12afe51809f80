/*!
 * Unified dataset API for IDSS data
 *
 * Provides a builder for loading one IDSS table from exactly one source and
 * the in-memory dataset type the rest of the crate works on.
 */

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::analytics::IdssAnalytics;
use crate::config::{DataSource, IdssConfig};
use crate::data_types::OperatorRecord;
use crate::evaluate::RecordQuery;
use crate::options::{build_options, compare_years_asc, compare_years_desc, FilterOptions};
use crate::reader::{load_records, CsvFileSource, CsvTextSource, IdssReader, RowSource};
use crate::remote::RemoteTableSource;
use crate::{IdssError, Result};

enum SourceKind {
    CsvFile(PathBuf),
    CsvText(String),
    Remote(RemoteTableSource),
    Custom(Box<dyn RowSource>),
}

/// Builder for loading an IDSS dataset
///
/// # Example
/// ```no_run
/// # use idss::dataset::IdssDatasetBuilder;
/// let dataset = IdssDatasetBuilder::new()
///     .csv_file("data/idss_2012_2025.csv")
///     .skip_invalid_rows(true)
///     .build()?;
/// # Ok::<(), idss::IdssError>(())
/// ```
pub struct IdssDatasetBuilder {
    source: Option<SourceKind>,
    delimiter: Option<u8>,
    skip_invalid_rows: bool,
    show_progress: bool,
}

impl Default for IdssDatasetBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl IdssDatasetBuilder {
    pub fn new() -> Self {
        Self {
            source: None,
            delimiter: None,
            skip_invalid_rows: true,
            show_progress: false,
        }
    }

    /// Builder preset from a configuration
    pub fn from_config(config: &IdssConfig) -> Self {
        let builder = Self::new()
            .skip_invalid_rows(config.skip_invalid_rows)
            .show_progress(config.show_progress)
            .delimiter(config.delimiter_byte());

        match &config.source {
            Some(DataSource::Local { csv_path }) => builder.csv_file(csv_path),
            Some(DataSource::Remote { url, table, api_key }) => {
                builder.remote(RemoteTableSource::new(url.clone(), table.clone(), api_key.clone()))
            }
            None => builder,
        }
    }

    /// Load from a CSV file on disk
    pub fn csv_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.source = Some(SourceKind::CsvFile(path.as_ref().to_path_buf()));
        self
    }

    /// Load from CSV text already in memory
    pub fn csv_text(mut self, text: impl Into<String>) -> Self {
        self.source = Some(SourceKind::CsvText(text.into()));
        self
    }

    /// Load from a remote table (needs the `remote` feature at fetch time)
    pub fn remote(mut self, source: RemoteTableSource) -> Self {
        self.source = Some(SourceKind::Remote(source));
        self
    }

    /// Load from any other row source
    pub fn source(mut self, source: Box<dyn RowSource>) -> Self {
        self.source = Some(SourceKind::Custom(source));
        self
    }

    /// Fixed CSV delimiter; sniffed from the header when `None`
    pub fn delimiter(mut self, delimiter: Option<u8>) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn skip_invalid_rows(mut self, skip: bool) -> Self {
        self.skip_invalid_rows = skip;
        self
    }

    /// Enable or disable the CSV progress bar
    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Fetch and normalize every row of the configured source
    pub fn build(self) -> Result<IdssDataset> {
        let kind = self.source.ok_or_else(|| IdssError::Configuration {
            message: "No data source specified".to_string(),
            suggestion: Some(
                "Use .csv_file(), .csv_text() or .remote(), or set [source] in the config file".to_string(),
            ),
        })?;

        let reader = IdssReader::new()
            .with_delimiter(self.delimiter)
            .with_skip_invalid_rows(self.skip_invalid_rows)
            .with_progress_bar(self.show_progress);

        let source: Box<dyn RowSource> = match kind {
            SourceKind::CsvFile(path) => Box::new(CsvFileSource::new(path).with_reader(reader)),
            SourceKind::CsvText(text) => Box::new(CsvTextSource::new(text).with_reader(reader)),
            SourceKind::Remote(remote) => Box::new(remote),
            SourceKind::Custom(custom) => custom,
        };

        info!(source = %source.describe(), "loading IDSS dataset");
        let records = load_records(source.as_ref())?;
        Ok(IdssDataset::from_records(records, source.describe()))
    }
}

/// One loaded IDSS table
#[derive(Debug, Clone)]
pub struct IdssDataset {
    /// Records in source order
    pub records: Vec<OperatorRecord>,
    source_description: String,
    loaded_at: DateTime<Utc>,
    registry_index: HashMap<String, Vec<usize>>,
}

impl IdssDataset {
    /// Wrap already-normalized records and index them
    pub fn from_records(records: Vec<OperatorRecord>, source_description: impl Into<String>) -> Self {
        let mut registry_index: HashMap<String, Vec<usize>> = HashMap::new();
        for (position, record) in records.iter().enumerate() {
            registry_index
                .entry(record.registry_number.clone())
                .or_default()
                .push(position);
        }

        Self {
            records,
            source_description: source_description.into(),
            loaded_at: Utc::now(),
            registry_index,
        }
    }

    /// Load a CSV file with default settings
    pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        IdssDatasetBuilder::new().csv_file(path).build()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn source_description(&self) -> &str {
        &self.source_description
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Every row of one operator, in source order
    pub fn get_by_registry(&self, registry_number: &str) -> Vec<&OperatorRecord> {
        self.registry_index
            .get(registry_number)
            .map(|positions| positions.iter().map(|&i| &self.records[i]).collect())
            .unwrap_or_default()
    }

    /// Every row of one operator, oldest year first
    pub fn operator_timeline(&self, registry_number: &str) -> Vec<&OperatorRecord> {
        let mut rows = self.get_by_registry(registry_number);
        rows.sort_by(|a, b| compare_years_asc(&a.year, &b.year));
        rows
    }

    /// Newest row of every operator, in first-appearance order
    pub fn latest_by_operator(&self) -> Vec<&OperatorRecord> {
        let mut seen = HashSet::new();
        let mut latest = Vec::with_capacity(self.registry_index.len());

        for record in &self.records {
            if !seen.insert(record.registry_number.as_str()) {
                continue;
            }
            let newest = self
                .get_by_registry(&record.registry_number)
                .into_iter()
                .min_by(|a, b| compare_years_desc(&a.year, &b.year));
            if let Some(newest) = newest {
                latest.push(newest);
            }
        }
        latest
    }

    pub fn distinct_operator_count(&self) -> usize {
        self.registry_index.len()
    }

    /// Option lists and bounds for this dataset
    pub fn filter_options(&self) -> FilterOptions {
        build_options(&self.records)
    }

    pub fn analytics(&self) -> IdssAnalytics<'_> {
        IdssAnalytics::new(&self.records)
    }

    pub fn query(&self) -> RecordQuery<'_> {
        RecordQuery::new(&self.records)
    }

    pub fn statistics(&self) -> DatasetStatistics {
        DatasetStatistics::from_dataset(self)
    }
}

/// Summary of a loaded dataset
#[derive(Debug, Clone, Serialize)]
pub struct DatasetStatistics {
    pub total_rows: usize,
    pub distinct_operators: usize,
    /// Oldest first
    pub years: Vec<String>,
    pub modalities: Vec<String>,
    pub rows_missing_composite: usize,
    pub source: String,
    pub loaded_at: DateTime<Utc>,
}

impl DatasetStatistics {
    pub fn from_dataset(dataset: &IdssDataset) -> Self {
        let options = dataset.filter_options();
        let mut years = options.years;
        years.reverse();

        Self {
            total_rows: dataset.len(),
            distinct_operators: dataset.distinct_operator_count(),
            years,
            modalities: options.operator_modalities,
            rows_missing_composite: dataset.records.iter().filter(|r| r.composite.is_none()).count(),
            source: dataset.source_description.clone(),
            loaded_at: dataset.loaded_at,
        }
    }

    /// Print a formatted summary of the statistics
    pub fn print_summary(&self) {
        println!("=== IDSS Dataset Statistics ===");
        println!("Source: {}", self.source);
        println!("Loaded at: {}", self.loaded_at.format("%Y-%m-%d %H:%M:%S UTC"));
        println!("Total Rows: {}", self.total_rows);
        println!("Distinct Operators: {}", self.distinct_operators);
        if let (Some(first), Some(last)) = (self.years.first(), self.years.last()) {
            println!("Years: {} to {} ({} editions)", first, last, self.years.len());
        }
        println!("Modalities: {}", self.modalities.len());
        for modality in &self.modalities {
            println!("  {}", modality);
        }
        if self.total_rows > 0 {
            println!(
                "Rows Missing IDSS: {} ({:.1}%)",
                self.rows_missing_composite,
                (self.rows_missing_composite as f64 / self.total_rows as f64) * 100.0
            );
        }
    }
}
