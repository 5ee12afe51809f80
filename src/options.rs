/*!
 * Filter-option index
 *
 * Scans a freshly loaded dataset once and produces the distinct value lists
 * and numeric bounds the selection widgets are populated from.
 */

use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::Serialize;

use crate::constants::{DEFAULT_BENEFICIARY_CEILING, DEFAULT_SCORE_CEILING};
use crate::data_types::OperatorRecord;

/// Inclusive numeric range
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NumericRange {
    pub min: f64,
    pub max: f64,
}

impl NumericRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Distinct values and bounds derived from one dataset load
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterOptions {
    /// Numerically descending; the first entry is the most recent year
    pub years: Vec<String>,
    pub operator_modalities: Vec<String>,
    pub legal_names: Vec<String>,
    pub registry_numbers: Vec<String>,
    pub sizes: Vec<String>,
    pub group_flags: Vec<String>,
    pub score_range: NumericRange,
    pub beneficiary_range: NumericRange,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            years: Vec::new(),
            operator_modalities: Vec::new(),
            legal_names: Vec::new(),
            registry_numbers: Vec::new(),
            sizes: Vec::new(),
            group_flags: Vec::new(),
            score_range: NumericRange::new(0.0, DEFAULT_SCORE_CEILING),
            beneficiary_range: NumericRange::new(0.0, DEFAULT_BENEFICIARY_CEILING),
        }
    }
}

impl FilterOptions {
    /// Most recent year present, if any
    pub fn latest_year(&self) -> Option<&str> {
        self.years.first().map(|s| s.as_str())
    }

    pub fn has_modality(&self, modality: &str) -> bool {
        self.operator_modalities.iter().any(|m| m == modality)
    }
}

/// Build the option index for a record collection
pub fn build_options<'a, I>(records: I) -> FilterOptions
where
    I: IntoIterator<Item = &'a OperatorRecord>,
{
    let mut years = BTreeSet::new();
    let mut modalities = BTreeSet::new();
    let mut legal_names = BTreeSet::new();
    let mut registry_numbers = BTreeSet::new();
    let mut sizes = BTreeSet::new();
    let mut group_flags = BTreeSet::new();

    // Sentinels keep single-value datasets from producing a degenerate range
    let mut score_min = 0.0_f64;
    let mut score_max = DEFAULT_SCORE_CEILING;
    let mut beneficiary_min = 0.0_f64;
    let mut beneficiary_max = DEFAULT_BENEFICIARY_CEILING;

    for record in records {
        insert_non_empty(&mut years, &record.year);
        insert_non_empty(&mut modalities, &record.operator_modality);
        insert_non_empty(&mut legal_names, &record.legal_name);
        insert_non_empty(&mut registry_numbers, &record.registry_number);
        insert_non_empty(&mut sizes, record.size().as_str());
        insert_non_empty(&mut group_flags, &record.group_flag);

        if let Some(score) = record.composite.filter(|v| v.is_finite()) {
            score_min = score_min.min(score);
            score_max = score_max.max(score);
        }
        if let Some(count) = record.beneficiary_count() {
            beneficiary_min = beneficiary_min.min(count as f64);
            beneficiary_max = beneficiary_max.max(count as f64);
        }
    }

    let mut years: Vec<String> = years.into_iter().collect();
    years.sort_by(|a, b| compare_years_desc(a, b));

    FilterOptions {
        years,
        operator_modalities: modalities.into_iter().collect(),
        legal_names: legal_names.into_iter().collect(),
        registry_numbers: registry_numbers.into_iter().collect(),
        sizes: sizes.into_iter().collect(),
        group_flags: group_flags.into_iter().collect(),
        score_range: NumericRange::new(score_min, score_max),
        beneficiary_range: NumericRange::new(beneficiary_min, beneficiary_max),
    }
}

fn insert_non_empty(set: &mut BTreeSet<String>, value: &str) {
    if !value.is_empty() {
        set.insert(value.to_string());
    }
}

/// Newest year first; non-numeric years go last in lexicographic order
pub fn compare_years_desc(a: &str, b: &str) -> Ordering {
    match (a.trim().parse::<i64>(), b.trim().parse::<i64>()) {
        (Ok(x), Ok(y)) => y.cmp(&x),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// Oldest year first; non-numeric years go last in lexicographic order
pub fn compare_years_asc(a: &str, b: &str) -> Ordering {
    match (a.trim().parse::<i64>(), b.trim().parse::<i64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}
