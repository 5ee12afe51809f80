use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use idss::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "idsscli")]
#[command(about = "IDSS Data CLI - Rank and compare dental health-plan operators by the ANS quality index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log filter (overrides RUST_LOG), e.g. "idss=debug"
    #[arg(long, global = true)]
    log: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show summary statistics for a dataset
    Stats(SourceArgs),
    /// Rank operators of one edition with dashboard filters
    Rank(RankArgs),
    /// Show every edition of one operator
    History(HistoryArgs),
    /// Average IDSS per category value
    Categories(CategoriesArgs),
    /// Find an operator in the ranking and report its page
    Locate(LocateArgs),
}

#[derive(Args)]
struct SourceArgs {
    /// CSV file to load; the configured source is used when omitted
    #[arg(long, env = "IDSS_CSV")]
    csv: Option<PathBuf>,
    /// Configuration file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Fail on broken CSV rows instead of skipping them
    #[arg(long)]
    strict: bool,
}

#[derive(Args)]
struct FilterArgs {
    /// Evaluation year; defaults to the latest one
    #[arg(long)]
    year: Option<String>,
    /// Operator modality (repeatable); defaults to the preferred modalities
    #[arg(long)]
    modality: Vec<String>,
    /// Size class: Small, Medium or Large (repeatable)
    #[arg(long)]
    size: Vec<String>,
    /// Minimum IDSS
    #[arg(long)]
    min_score: Option<f64>,
    /// Maximum IDSS
    #[arg(long)]
    max_score: Option<f64>,
}

#[derive(Args)]
struct RankArgs {
    #[command(flatten)]
    source: SourceArgs,
    #[command(flatten)]
    filters: FilterArgs,
    /// One row per operator (its best edition in the slice)
    #[arg(long)]
    per_operator: bool,
    /// Limit number of results
    #[arg(long, default_value_t = 20)]
    limit: usize,
}

#[derive(Args)]
struct HistoryArgs {
    #[command(flatten)]
    source: SourceArgs,
    /// Registry number, legal name, or "registry — name" label
    query: String,
}

#[derive(Args)]
struct CategoriesArgs {
    #[command(flatten)]
    source: SourceArgs,
    #[command(flatten)]
    filters: FilterArgs,
    /// Category to group by
    #[arg(long, value_enum, default_value_t = CategoryOpt::Modality)]
    by: CategoryOpt,
}

#[derive(Args)]
struct LocateArgs {
    #[command(flatten)]
    source: SourceArgs,
    #[command(flatten)]
    filters: FilterArgs,
    /// Name, registry number or tax id fragment
    term: String,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum CategoryOpt {
    Modality,
    IndexModality,
    Size,
    Group,
    State,
    Year,
}

impl From<CategoryOpt> for CategoryField {
    fn from(opt: CategoryOpt) -> Self {
        match opt {
            CategoryOpt::Modality => CategoryField::OperatorModality,
            CategoryOpt::IndexModality => CategoryField::IndexModality,
            CategoryOpt::Size => CategoryField::Size,
            CategoryOpt::Group => CategoryField::GroupFlag,
            CategoryOpt::State => CategoryField::State,
            CategoryOpt::Year => CategoryField::Year,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log.as_deref());

    let result = match cli.command {
        Commands::Stats(args) => cmd_stats(args),
        Commands::Rank(args) => cmd_rank(args),
        Commands::History(args) => cmd_history(args),
        Commands::Categories(args) => cmd_categories(args),
        Commands::Locate(args) => cmd_locate(args),
    };

    if let Err(e) = result {
        match e.downcast_ref::<IdssError>() {
            Some(idss_error) => eprintln!("Error: {}", idss_error.user_message()),
            None => eprintln!("Error: {:#}", e),
        }
        std::process::exit(1);
    }
}

fn init_logging(directive: Option<&str>) {
    let filter = match directive {
        Some(directive) => EnvFilter::new(directive),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &SourceArgs) -> anyhow::Result<IdssConfig> {
    let mut config = match &args.config {
        Some(path) => IdssConfig::layered(Some(path.as_path()))
            .with_context(|| format!("reading configuration from {}", path.display()))?,
        None => IdssConfig::load(),
    };
    if let Some(csv) = &args.csv {
        config.source = Some(DataSource::Local { csv_path: csv.clone() });
    }
    if args.strict {
        config.skip_invalid_rows = false;
    }
    Ok(config)
}

/// Load the dataset into a fresh session
fn open_session(args: &SourceArgs) -> anyhow::Result<DashboardSession> {
    let config = load_config(args)?;
    if config.source.is_none() {
        bail!("no data source: pass --csv or set [source] in the config file");
    }

    let mut session = DashboardSession::from_config(&config);
    let ticket = session.begin_load();
    let dataset = IdssDatasetBuilder::from_config(&config).build()?;
    session.complete_load(ticket, Ok(dataset));
    Ok(session)
}

fn apply_filters(session: &mut DashboardSession, filters: &FilterArgs) -> anyhow::Result<()> {
    if let Some(year) = &filters.year {
        if !session.options().years.contains(year) {
            bail!("year {} is not in the dataset (available: {})", year, session.options().years.join(", "));
        }
        session.apply(FilterEvent::SelectionChanged {
            dimension: FilterDimension::Year,
            values: BTreeSet::from([year.clone()]),
        });
    }
    if !filters.modality.is_empty() {
        session.apply(FilterEvent::SelectionChanged {
            dimension: FilterDimension::OperatorModality,
            values: filters.modality.iter().cloned().collect(),
        });
    }
    if !filters.size.is_empty() {
        let mut sizes = BTreeSet::new();
        for label in &filters.size {
            match SizeClass::from_label(label) {
                Some(size) => {
                    sizes.insert(size.as_str().to_string());
                }
                None => bail!("unknown size class '{}' (use Small, Medium or Large)", label),
            }
        }
        session.apply(FilterEvent::SelectionChanged {
            dimension: FilterDimension::Size,
            values: sizes,
        });
    }
    if filters.min_score.is_some() || filters.max_score.is_some() {
        let bounds = session.options().score_range;
        session.apply(FilterEvent::ScoreRangeChanged {
            min: filters.min_score.unwrap_or(bounds.min),
            max: filters.max_score.unwrap_or(bounds.max),
        });
    }
    Ok(())
}

fn format_score(value: Option<f64>) -> String {
    value.map(|v| format!("{:.4}", v)).unwrap_or_else(|| "-".to_string())
}

fn cmd_stats(args: SourceArgs) -> anyhow::Result<()> {
    let session = open_session(&args)?;
    if let Some(dataset) = session.dataset() {
        dataset.statistics().print_summary();
    }
    println!();
    session.analytics().overview().print_summary();
    Ok(())
}

fn cmd_rank(args: RankArgs) -> anyhow::Result<()> {
    let mut session = open_session(&args.source)?;
    apply_filters(&mut session, &args.filters)?;

    let analytics = session.analytics();
    let ranking = if args.per_operator {
        analytics.operator_ranking()
    } else {
        analytics.ranking()
    };

    for ranked in ranking.top(args.limit) {
        let record = ranked.record;
        println!(
            "{:>4} | {} | {} | {} | {} | {}",
            ranked.rank,
            format_score(record.composite),
            record.registry_number,
            record.legal_name,
            record.year,
            record.operator_modality
        );
    }
    println!("Total ranked: {}", ranking.len());
    Ok(())
}

fn cmd_history(args: HistoryArgs) -> anyhow::Result<()> {
    let mut session = open_session(&args.source)?;
    let Some(selected) = session.select_by_query(&args.query).cloned() else {
        bail!("no operator matches '{}'", args.query);
    };

    println!("{} ({})", selected.legal_name, selected.registry_number);
    let header: Vec<&str> = ScoreField::INDICATORS.iter().map(|f| f.code()).collect();
    println!("Year | {}", header.join(" | "));
    for record in session.operator_history() {
        let scores: Vec<String> = ScoreField::INDICATORS
            .iter()
            .map(|field| format_score(record.score(*field)))
            .collect();
        println!("{} | {}", record.year, scores.join(" | "));
    }

    println!();
    println!("Against the comparison group of {} rows:", session.comparison_group().len());
    let peers = IdssAnalytics::new(session.comparison_group());
    for comparison in peers.indicator_comparison(&selected) {
        println!(
            "  {}: {} vs {:.4}",
            comparison.field,
            format_score(comparison.selected),
            comparison.peer_average
        );
    }
    Ok(())
}

fn cmd_categories(args: CategoriesArgs) -> anyhow::Result<()> {
    let mut session = open_session(&args.source)?;
    apply_filters(&mut session, &args.filters)?;

    let field: CategoryField = args.by.into();
    println!("Average IDSS by {}", field.label());
    for score in session.analytics().category_ranking(field) {
        println!("  {:<40} {:.4} ({} rows)", score.category, score.average, score.count);
    }
    Ok(())
}

fn cmd_locate(args: LocateArgs) -> anyhow::Result<()> {
    let mut session = open_session(&args.source)?;
    apply_filters(&mut session, &args.filters)?;

    match session.analytics().locate(&args.term) {
        Some(found) => {
            println!(
                "{} ({}) is ranked {} on page {}",
                found.record.legal_name, found.record.registry_number, found.rank, found.page
            );
            Ok(())
        }
        None => bail!("'{}' is not in the filtered ranking", args.term),
    }
}
