/*!
 * Ranking and aggregation for IDSS data
 *
 * This module computes the comparative tables every view is built from:
 * composite rankings with O(1) rank lookup, null-safe group averages, per-year
 * series, per-category rankings and the smaller summaries used by the
 * overview, chart and comparison views.
 *
 * All functions work over a borrowed slice of records (usually the output of
 * the filter evaluator) and never copy the records themselves.
 */

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;

use crate::constants::{DEFAULT_PAGE_SIZE, NOT_INFORMED};
use crate::data_types::{CategoryField, OperatorRecord, ScoreField};
use crate::options::compare_years_asc;

/// Ranking order: composite descending (a missing composite counts as zero
/// and sorts below a real score of the same value), then legal name, then
/// registry number.
pub fn compare_for_ranking(a: &OperatorRecord, b: &OperatorRecord) -> Ordering {
    b.composite_or_zero()
        .total_cmp(&a.composite_or_zero())
        .then_with(|| a.composite.is_none().cmp(&b.composite.is_none()))
        .then_with(|| a.legal_name.cmp(&b.legal_name))
        .then_with(|| a.registry_number.cmp(&b.registry_number))
}

/// Mean of a score field, skipping missing values; `0.0` when nothing scores
pub fn group_average<'a, I>(records: I, field: ScoreField) -> f64
where
    I: IntoIterator<Item = &'a OperatorRecord>,
{
    mean(records.into_iter().filter_map(|r| r.score(field)))
}

fn mean<I: Iterator<Item = f64>>(values: I) -> f64 {
    let (sum, count) = values
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

fn category_label(value: &str) -> String {
    if value.is_empty() {
        NOT_INFORMED.to_string()
    } else {
        value.to_string()
    }
}

/// One position in a ranking
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RankedRecord<'a> {
    /// 1-based
    pub rank: usize,
    pub record: &'a OperatorRecord,
}

/// A computed ranking with constant-time rank lookup
#[derive(Debug, Clone)]
pub struct Ranking<'a> {
    entries: Vec<&'a OperatorRecord>,
    by_operator_year: HashMap<&'a str, HashMap<&'a str, usize>>,
    by_registry: HashMap<&'a str, usize>,
}

impl<'a> Ranking<'a> {
    /// Rank every operator-year row
    pub fn new<I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a OperatorRecord>,
    {
        let mut entries: Vec<&'a OperatorRecord> = records.into_iter().collect();
        entries.sort_by(|a, b| compare_for_ranking(a, b));

        let mut by_operator_year: HashMap<&'a str, HashMap<&'a str, usize>> = HashMap::new();
        let mut by_registry = HashMap::new();
        for (index, record) in entries.iter().enumerate() {
            let rank = index + 1;
            by_operator_year
                .entry(record.registry_number.as_str())
                .or_default()
                .entry(record.year.as_str())
                .or_insert(rank);
            by_registry.entry(record.registry_number.as_str()).or_insert(rank);
        }

        Self {
            entries,
            by_operator_year,
            by_registry,
        }
    }

    /// Rank operators by their best row only
    pub fn per_operator<I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a OperatorRecord>,
    {
        let mut best: HashMap<&'a str, &'a OperatorRecord> = HashMap::new();
        for record in records {
            best.entry(record.registry_number.as_str())
                .and_modify(|current| {
                    if compare_for_ranking(record, *current) == Ordering::Less {
                        *current = record;
                    }
                })
                .or_insert(record);
        }
        Self::new(best.into_values())
    }

    /// Rank of an operator-year row
    pub fn rank_of(&self, registry_number: &str, year: &str) -> Option<usize> {
        self.by_operator_year
            .get(registry_number)
            .and_then(|years| years.get(year))
            .copied()
    }

    /// Best rank held by any row of an operator
    pub fn rank_of_operator(&self, registry_number: &str) -> Option<usize> {
        self.by_registry.get(registry_number).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records in ranking order
    pub fn records(&self) -> &[&'a OperatorRecord] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = RankedRecord<'a>> + '_ {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, record)| RankedRecord {
                rank: index + 1,
                record: *record,
            })
    }

    pub fn top(&self, limit: usize) -> Vec<RankedRecord<'a>> {
        self.iter().take(limit).collect()
    }
}

/// Averages of the headline indicators for one year
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearlyAverage {
    pub year: String,
    /// Rounded to 4 decimals; fields with no data in that year are absent
    pub averages: BTreeMap<ScoreField, f64>,
}

/// Average composite of one category value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryScore {
    pub category: String,
    pub average: f64,
    pub count: usize,
}

/// Row count of one category value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: usize,
}

/// Selected operator against the rest of the slice, per indicator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorComparison {
    pub field: ScoreField,
    pub selected: Option<f64>,
    pub peer_average: f64,
}

/// Averaged indicator profile of one modality or size group
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSnapshot {
    pub label: String,
    pub count: usize,
    pub averages: BTreeMap<ScoreField, f64>,
}

/// Search hit positioned in the ranking
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LocatedRecord<'a> {
    pub rank: usize,
    /// 1-based page for the configured page size
    pub page: usize,
    pub record: &'a OperatorRecord,
}

/// Headline numbers of a slice
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overview<'a> {
    pub rows: usize,
    pub distinct_operators: usize,
    pub distinct_modalities: usize,
    pub averages: BTreeMap<ScoreField, f64>,
    pub top_performer: Option<&'a OperatorRecord>,
}

impl Overview<'_> {
    /// Print formatted overview
    pub fn print_summary(&self) {
        println!("=== IDSS Overview ===");
        println!("Rows: {}", self.rows);
        println!("Operators: {}", self.distinct_operators);
        println!("Modalities: {}", self.distinct_modalities);
        for (field, average) in &self.averages {
            println!("  Average {}: {:.4}", field, average);
        }
        if let Some(top) = self.top_performer {
            println!(
                "Top performer: {} ({}) {:.4}",
                top.legal_name,
                top.registry_number,
                top.composite_or_zero()
            );
        }
    }
}

/// Aggregation engine over a slice of records
pub struct IdssAnalytics<'a> {
    records: Vec<&'a OperatorRecord>,
    page_size: usize,
}

impl<'a> IdssAnalytics<'a> {
    /// Create an engine over any collection of borrowed records
    pub fn new<I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a OperatorRecord>,
    {
        Self {
            records: records.into_iter().collect(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Page size used by [`IdssAnalytics::locate`]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn records(&self) -> &[&'a OperatorRecord] {
        &self.records
    }

    /// Operator-year ranking of the slice
    pub fn ranking(&self) -> Ranking<'a> {
        Ranking::new(self.records.iter().copied())
    }

    /// One row per operator, each at its best composite
    pub fn operator_ranking(&self) -> Ranking<'a> {
        Ranking::per_operator(self.records.iter().copied())
    }

    pub fn group_average(&self, field: ScoreField) -> f64 {
        group_average(self.records.iter().copied(), field)
    }

    /// Per-year averages of the composite and the structural sub-indices
    pub fn yearly_averages(&self) -> Vec<YearlyAverage> {
        let mut by_year: HashMap<&str, Vec<&OperatorRecord>> = HashMap::new();
        for record in &self.records {
            by_year.entry(record.year.as_str()).or_default().push(*record);
        }

        let mut series: Vec<YearlyAverage> = by_year
            .into_iter()
            .map(|(year, rows)| YearlyAverage {
                year: year.to_string(),
                averages: indicator_averages(&rows),
            })
            .collect();
        series.sort_by(|a, b| compare_years_asc(&a.year, &b.year));
        series
    }

    /// Average composite per category value, best first
    pub fn category_ranking(&self, category: CategoryField) -> Vec<CategoryScore> {
        let mut groups: HashMap<String, (f64, usize)> = HashMap::new();
        for record in &self.records {
            if let Some(score) = record.composite {
                let entry = groups.entry(category_label(record.category(category))).or_insert((0.0, 0));
                entry.0 += score;
                entry.1 += 1;
            }
        }

        let mut ranking: Vec<CategoryScore> = groups
            .into_iter()
            .map(|(category, (sum, count))| CategoryScore {
                category,
                average: sum / count as f64,
                count,
            })
            .collect();
        ranking.sort_by(|a, b| {
            b.average
                .total_cmp(&a.average)
                .then_with(|| a.category.cmp(&b.category))
        });
        ranking
    }

    pub fn top_performers(&self, limit: usize) -> Vec<RankedRecord<'a>> {
        self.ranking().top(limit)
    }

    /// Top `limit` rows, plus the selected operator's best row at its real
    /// rank when it falls outside them
    pub fn top_performers_with_selected(&self, limit: usize, registry_number: &str) -> Vec<RankedRecord<'a>> {
        let ranking = self.ranking();
        let mut top = ranking.top(limit);

        if let Some(rank) = ranking.rank_of_operator(registry_number) {
            if rank > limit {
                if let Some(record) = ranking.records().get(rank - 1) {
                    top.push(RankedRecord { rank, record: *record });
                }
            }
        }
        top
    }

    /// Rows per category value, most frequent first
    pub fn distribution_by(&self, category: CategoryField) -> Vec<CategoryCount> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for record in &self.records {
            *counts.entry(category_label(record.category(category))).or_insert(0) += 1;
        }

        let mut distribution: Vec<CategoryCount> = counts
            .into_iter()
            .map(|(category, count)| CategoryCount { category, count })
            .collect();
        distribution.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.category.cmp(&b.category)));
        distribution
    }

    /// Distinct operators per year, oldest year first
    pub fn operators_per_year(&self) -> Vec<(String, usize)> {
        let mut by_year: HashMap<&str, HashSet<&str>> = HashMap::new();
        for record in &self.records {
            by_year
                .entry(record.year.as_str())
                .or_default()
                .insert(record.registry_number.as_str());
        }

        let mut counts: Vec<(String, usize)> = by_year
            .into_iter()
            .map(|(year, operators)| (year.to_string(), operators.len()))
            .collect();
        counts.sort_by(|a, b| compare_years_asc(&a.0, &b.0));
        counts
    }

    /// Selected operator vs the average of every other operator in the slice
    pub fn indicator_comparison(&self, selected: &OperatorRecord) -> Vec<IndicatorComparison> {
        let peers: Vec<&OperatorRecord> = self
            .records
            .iter()
            .copied()
            .filter(|r| r.registry_number != selected.registry_number)
            .collect();

        ScoreField::INDICATORS
            .iter()
            .map(|field| IndicatorComparison {
                field: *field,
                selected: selected.score(*field),
                peer_average: group_average(peers.iter().copied(), *field),
            })
            .collect()
    }

    /// One profile per listed modality and size; empty groups are skipped
    pub fn group_snapshots(&self, modalities: &[String], sizes: &[String]) -> Vec<GroupSnapshot> {
        let modality_groups = modalities.iter().map(|modality| {
            let rows: Vec<&OperatorRecord> = self
                .records
                .iter()
                .copied()
                .filter(|r| &r.operator_modality == modality)
                .collect();
            (format!("Modality: {}", modality), rows)
        });
        let size_groups = sizes.iter().map(|size| {
            let rows: Vec<&OperatorRecord> = self
                .records
                .iter()
                .copied()
                .filter(|r| r.size().as_str() == size)
                .collect();
            (format!("Size: {}", size), rows)
        });

        modality_groups
            .chain(size_groups)
            .filter(|(_, rows)| !rows.is_empty())
            .map(|(label, rows)| GroupSnapshot {
                label,
                count: rows.len(),
                averages: indicator_averages(&rows),
            })
            .collect()
    }

    pub fn overview(&self) -> Overview<'a> {
        let distinct_operators = self
            .records
            .iter()
            .map(|r| r.registry_number.as_str())
            .collect::<HashSet<_>>()
            .len();
        let distinct_modalities = self
            .records
            .iter()
            .map(|r| r.operator_modality.as_str())
            .filter(|m| !m.is_empty())
            .collect::<HashSet<_>>()
            .len();

        Overview {
            rows: self.records.len(),
            distinct_operators,
            distinct_modalities,
            averages: ScoreField::INDICATORS
                .iter()
                .map(|field| (*field, round4(self.group_average(*field))))
                .collect(),
            top_performer: self.ranking().records().first().copied(),
        }
    }

    /// First record in ranking order matching `term`.
    ///
    /// The legal name matches case-insensitively; registry number and tax id
    /// match as substrings.
    pub fn locate(&self, term: &str) -> Option<LocatedRecord<'a>> {
        let term = term.trim();
        if term.is_empty() {
            return None;
        }
        let lowered = term.to_lowercase();

        self.ranking()
            .iter()
            .find(|ranked| {
                let r = ranked.record;
                r.legal_name.to_lowercase().contains(&lowered)
                    || r.registry_number.contains(term)
                    || r.tax_id.contains(term)
            })
            .map(|ranked| LocatedRecord {
                rank: ranked.rank,
                page: (ranked.rank - 1) / self.page_size + 1,
                record: ranked.record,
            })
    }
}

/// Rounded averages of the headline indicators that have data
fn indicator_averages(rows: &[&OperatorRecord]) -> BTreeMap<ScoreField, f64> {
    ScoreField::INDICATORS
        .iter()
        .filter(|field| rows.iter().any(|r| r.score(**field).is_some()))
        .map(|field| (*field, round4(group_average(rows.iter().copied(), *field))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(registry: &str, name: &str, year: &str, composite: Option<f64>) -> OperatorRecord {
        OperatorRecord::builder(registry, year)
            .legal_name(name)
            .operator_modality("Odontologia de Grupo")
            .composite(composite)
            .build()
    }

    #[test]
    fn test_ranking_ties_and_nulls() {
        let records = vec![
            record("A", "Bbb", "2025", Some(0.9)),
            record("B", "Ccc", "2025", None),
            record("C", "Aaa", "2025", Some(0.9)),
        ];
        let ranking = Ranking::new(&records);
        let order: Vec<&str> = ranking.records().iter().map(|r| r.registry_number.as_str()).collect();
        assert_eq!(order, vec!["C", "A", "B"]);
        assert_eq!(ranking.rank_of("A", "2025"), Some(2));
        assert_eq!(ranking.rank_of("A", "2024"), None);
        assert_eq!(ranking.rank_of_operator("B"), Some(3));
    }

    #[test]
    fn test_null_below_zero_score() {
        let records = vec![record("1", "X", "2025", None), record("2", "Y", "2025", Some(0.0))];
        let ranking = Ranking::new(&records);
        assert_eq!(ranking.records()[0].registry_number, "2");
    }

    #[test]
    fn test_per_operator_ranking_keeps_best_row() {
        let records = vec![
            record("1", "ALFA", "2023", Some(0.4)),
            record("1", "ALFA", "2024", Some(0.8)),
            record("2", "BETA", "2024", Some(0.6)),
        ];
        let ranking = Ranking::per_operator(&records);
        assert_eq!(ranking.len(), 2);
        assert_eq!(ranking.records()[0].year, "2024");
        assert_eq!(ranking.rank_of_operator("2"), Some(2));
    }

    #[test]
    fn test_group_average_null_safety() {
        let empty: Vec<OperatorRecord> = Vec::new();
        assert_eq!(group_average(&empty, ScoreField::Composite), 0.0);

        let nulls = vec![record("1", "X", "2025", None), record("2", "Y", "2025", None)];
        assert_eq!(group_average(&nulls, ScoreField::Composite), 0.0);

        let mixed = vec![
            record("1", "X", "2025", Some(0.5)),
            record("2", "Y", "2025", None),
            record("3", "Z", "2025", Some(0.7)),
        ];
        assert!((group_average(&mixed, ScoreField::Composite) - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_yearly_averages() {
        let records = vec![
            record("1", "X", "2025", Some(0.33333)),
            record("2", "Y", "2024", Some(0.5)),
            record("3", "Z", "2025", Some(0.66667)),
        ];
        let series = IdssAnalytics::new(&records).yearly_averages();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].year, "2024");
        assert_eq!(series[1].averages.get(&ScoreField::Composite), Some(&0.5));
        assert!(!series[1].averages.contains_key(&ScoreField::Quality));
    }

    #[test]
    fn test_category_ranking() {
        let records = vec![
            OperatorRecord::builder("1", "2025").operator_modality("B").composite(Some(0.8)).build(),
            OperatorRecord::builder("2", "2025").operator_modality("A").composite(Some(0.8)).build(),
            OperatorRecord::builder("3", "2025").operator_modality("A").composite(None).build(),
            OperatorRecord::builder("4", "2025").operator_modality("").composite(Some(0.2)).build(),
        ];
        let ranking = IdssAnalytics::new(&records).category_ranking(CategoryField::OperatorModality);
        assert_eq!(ranking[0].category, "A");
        assert_eq!(ranking[0].count, 1);
        assert_eq!(ranking[1].category, "B");
        assert_eq!(ranking[2].category, NOT_INFORMED);
    }

    #[test]
    fn test_top_performers_with_selected() {
        let records: Vec<OperatorRecord> = (0..5)
            .map(|i| record(&format!("{}", i), &format!("OP {}", i), "2025", Some(0.9 - i as f64 * 0.1)))
            .collect();
        let analytics = IdssAnalytics::new(&records);

        let top = analytics.top_performers_with_selected(2, "4");
        assert_eq!(top.len(), 3);
        assert_eq!(top[2].rank, 5);

        let inside = analytics.top_performers_with_selected(2, "1");
        assert_eq!(inside.len(), 2);
    }

    #[test]
    fn test_distribution_and_operators_per_year() {
        let records = vec![
            record("1", "X", "2024", Some(0.5)),
            record("1", "X", "2025", Some(0.5)),
            record("2", "Y", "2025", Some(0.5)),
        ];
        let analytics = IdssAnalytics::new(&records);

        assert_eq!(
            analytics.operators_per_year(),
            vec![("2024".to_string(), 1), ("2025".to_string(), 2)]
        );
        let sizes = analytics.distribution_by(CategoryField::Size);
        assert_eq!(sizes, vec![CategoryCount { category: NOT_INFORMED.to_string(), count: 3 }]);
    }

    #[test]
    fn test_indicator_comparison_excludes_selected() {
        let records = vec![
            record("1", "X", "2025", Some(0.9)),
            record("1", "X", "2024", Some(0.1)),
            record("2", "Y", "2025", Some(0.5)),
        ];
        let analytics = IdssAnalytics::new(&records);
        let comparison = analytics.indicator_comparison(&records[0]);
        assert_eq!(comparison[0].field, ScoreField::Composite);
        assert_eq!(comparison[0].selected, Some(0.9));
        assert_eq!(comparison[0].peer_average, 0.5);
    }

    #[test]
    fn test_group_snapshots_skip_empty() {
        let records = vec![record("1", "X", "2025", Some(0.4))];
        let snapshots = IdssAnalytics::new(&records).group_snapshots(
            &["Odontologia de Grupo".to_string(), "Autogestão".to_string()],
            &["Large".to_string()],
        );
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].label, "Modality: Odontologia de Grupo");
    }

    #[test]
    fn test_locate_reports_page() {
        let records: Vec<OperatorRecord> = (0..7)
            .map(|i| record(&format!("{}", 100 + i), &format!("OPERADORA {}", i), "2025", Some(0.9 - i as f64 * 0.1)))
            .collect();
        let analytics = IdssAnalytics::new(&records).with_page_size(3);

        let hit = analytics.locate("operadora 4").unwrap();
        assert_eq!(hit.rank, 5);
        assert_eq!(hit.page, 2);
        assert_eq!(analytics.locate("106").map(|h| h.page), Some(3));
        assert!(analytics.locate("missing").is_none());
    }

    #[test]
    fn test_overview() {
        let records = vec![record("1", "X", "2025", Some(0.4)), record("2", "Y", "2025", Some(0.8))];
        let overview = IdssAnalytics::new(&records).overview();
        assert_eq!(overview.distinct_operators, 2);
        assert_eq!(overview.distinct_modalities, 1);
        assert_eq!(overview.top_performer.map(|r| r.registry_number.as_str()), Some("2"));
        assert_eq!(overview.averages.get(&ScoreField::Composite), Some(&0.6));
    }
}
