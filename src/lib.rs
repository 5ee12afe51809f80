/*!
 * # IDSS (Índice de Desempenho da Saúde Suplementar) Data Library
 *
 * A Rust library for the yearly quality index the Brazilian health-plan
 * regulator (ANS) publishes for dental health-plan operators: load the table,
 * filter it interactively, and compute the rankings and aggregates a
 * dashboard displays.
 *
 * ## Features
 *
 * - **Tolerant ingestion**: several header spellings, both decimal
 *   conventions (`0.8523` and `85,23`), `,` `;` tab or `|` delimited files,
 *   UTF-8 or Latin-1
 * - **Filter state machine**: every selection change is one event through a
 *   pure transition function
 * - **Rankings and aggregates**: O(1) rank lookup, null-safe averages,
 *   per-year series and per-category rankings
 * - **Remote tables**: PostgREST endpoints behind the `remote` feature
 *
 * ## Quick Start
 *
 * ```no_run
 * use idss::prelude::*;
 *
 * # fn main() -> Result<()> {
 * let dataset = IdssDataset::load_csv("data/idss_2012_2025.csv")?;
 *
 * let mut session = DashboardSession::default();
 * let ticket = session.begin_load();
 * session.complete_load(ticket, Ok(dataset));
 *
 * // Latest year and the preferred modalities are selected after a load
 * for ranked in session.analytics().top_performers(10) {
 *     println!("{:>3}. {}", ranked.rank, ranked.record.picker_label());
 * }
 * # Ok(())
 * # }
 * ```
 *
 * ## Filtering
 *
 * ```no_run
 * # use idss::prelude::*;
 * # fn main() -> Result<()> {
 * # let mut session = DashboardSession::default();
 * session.apply(FilterEvent::ValueToggled {
 *     dimension: FilterDimension::Size,
 *     value: "Large".to_string(),
 * });
 * session.apply(FilterEvent::ScoreRangeChanged { min: 0.5, max: 1.0 });
 *
 * if let Some(operator) = session.select_by_query("301949") {
 *     println!("Focused {}", operator.legal_name);
 * }
 * let timeline = session.history();
 * # Ok(())
 * # }
 * ```
 *
 * ## Loading Data
 *
 * ```no_run
 * # use idss::prelude::*;
 * # fn main() -> Result<()> {
 * let dataset = IdssDatasetBuilder::new()
 *     .csv_file("data/idss.csv")
 *     .delimiter(Some(b';'))
 *     .skip_invalid_rows(true)
 *     .build()?;
 * dataset.statistics().print_summary();
 * # Ok(())
 * # }
 * ```
 *
 * ## Configuration
 *
 * ```no_run
 * # use idss::prelude::*;
 * // Defaults, then ~/.config/idss/config.toml, then IDSS_* variables
 * let config = idss::config::IdssConfig::load();
 *
 * // Or build your own
 * let config = ConfigBuilder::new()
 *     .progress_bar(false)
 *     .local_source("data/idss.csv")
 *     .build();
 * idss::config::set_global_config(config);
 * ```
 */

// Re-export error types from root
pub use error::{ErrorContext, IdssError, IngestionFailure, Result};

// Public modules
pub mod analytics;
pub mod config;
pub mod data_types;
pub mod dataset;
pub mod error;
pub mod evaluate;
pub mod normalize;
pub mod options;
pub mod reader;
pub mod remote;
pub mod schema;
pub mod session;
pub mod state;

/// Prelude module for convenient imports
///
/// Import everything you need with:
/// ```
/// use idss::prelude::*;
/// ```
pub mod prelude {
    pub use crate::analytics::{IdssAnalytics, RankedRecord, Ranking};
    pub use crate::config::{ConfigBuilder, DataSource, IdssConfig};
    pub use crate::data_types::*;
    pub use crate::dataset::{DatasetStatistics, IdssDataset, IdssDatasetBuilder};
    pub use crate::error::{IdssError, Result};
    pub use crate::evaluate::{evaluate, EvaluateOptions, RecordQuery};
    pub use crate::normalize::{normalize, normalize_batch};
    pub use crate::options::{build_options, FilterOptions, NumericRange};
    pub use crate::reader::{CsvFileSource, CsvTextSource, IdssReader, RowSource};
    pub use crate::remote::RemoteTableSource;
    pub use crate::session::{DashboardSession, LoadOutcome, LoadTicket};
    pub use crate::state::{
        transition, ActiveFilters, FilterDimension, FilterEvent, FilterPolicy, FilterState, TransitionContext,
    };
}

/// IDSS data constants
pub mod constants {
    /// Largest beneficiary count classified as Small
    pub const SMALL_SIZE_MAX: i64 = 19_999;

    /// Largest beneficiary count classified as Medium
    pub const MEDIUM_SIZE_MAX: i64 = 99_999;

    /// Lower sentinel of the composite-score range is 0; this is the upper one
    pub const DEFAULT_SCORE_CEILING: f64 = 1.0;

    /// Upper sentinel of the beneficiary range
    pub const DEFAULT_BENEFICIARY_CEILING: f64 = 1_000_000.0;

    /// Separator in "registry — legal name" picker labels
    pub const PICKER_SEPARATOR: &str = "—";

    /// Separators accepted when a search query is a picker label
    pub const PICKER_SEPARATORS: [&str; 3] = ["—", "-", "|"];

    /// Modalities selected by default after a load
    pub const PREFERRED_MODALITIES: [&str; 2] = ["Cooperativa Odontológica", "Odontologia de Grupo"];

    /// (modality, group flag) pairs: selecting the modality adds the flag
    pub const SUBGROUP_SPLITS: [(&str, &str); 1] = [("Cooperativa Odontológica", "Sim")];

    /// Rows per ranking page
    pub const DEFAULT_PAGE_SIZE: usize = 50;

    /// Bucket label for empty category values
    pub const NOT_INFORMED: &str = "Not informed";
}

/// Common recipes and utility functions
pub mod cookbook {
    use crate::analytics::{CategoryScore, RankedRecord};
    use crate::prelude::*;

    /// Operator-year ranking of one edition
    ///
    /// # Example
    /// ```no_run
    /// # use idss::prelude::*;
    /// # use idss::cookbook::ranking_for_year;
    /// # fn main() -> Result<()> {
    /// # let dataset = IdssDataset::load_csv("data/idss.csv")?;
    /// for ranked in ranking_for_year(&dataset, "2025").iter().take(5) {
    ///     println!("{} {}", ranked.rank, ranked.record.legal_name);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn ranking_for_year<'a>(dataset: &'a IdssDataset, year: &str) -> Vec<RankedRecord<'a>> {
        let year = year.to_string();
        let rows = dataset.query().matching(move |r| r.year == year).execute();
        let ranking = Ranking::new(rows);
        ranking.top(ranking.len())
    }

    /// Average IDSS per modality within one edition
    pub fn modality_leaderboard(dataset: &IdssDataset, year: &str) -> Vec<CategoryScore> {
        let year = year.to_string();
        let rows = dataset.query().matching(move |r| r.year == year).execute();
        IdssAnalytics::new(rows).category_ranking(CategoryField::OperatorModality)
    }

    /// Case-insensitive partial match on the legal name
    pub fn find_by_partial_name<'a>(dataset: &'a IdssDataset, name_query: &str) -> Vec<&'a OperatorRecord> {
        let query_lower = name_query.to_lowercase();
        dataset
            .records
            .iter()
            .filter(|r| r.legal_name.to_lowercase().contains(&query_lower))
            .collect()
    }

    /// Year-over-year change of the composite for one operator
    ///
    /// Returns `(year, composite, change vs previous edition)`; the change is
    /// `None` for the first edition or when either composite is missing.
    pub fn composite_trend(dataset: &IdssDataset, registry_number: &str) -> Vec<(String, Option<f64>, Option<f64>)> {
        let mut previous: Option<f64> = None;
        dataset
            .operator_timeline(registry_number)
            .into_iter()
            .map(|record| {
                let change = match (record.composite, previous) {
                    (Some(now), Some(before)) => Some(now - before),
                    _ => None,
                };
                previous = record.composite;
                (record.year.clone(), record.composite, change)
            })
            .collect()
    }
}
