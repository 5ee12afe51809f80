/*!
 * Filter evaluator
 *
 * Applies an [`ActiveFilters`] value to the record collection. Every
 * dimension becomes one predicate in a [`RecordQuery`]; a record is kept when
 * all predicates accept it. Results always keep dataset order, except
 * [`history`] which is re-sorted by year.
 */

use std::collections::BTreeSet;

use crate::data_types::OperatorRecord;
use crate::options::compare_years_asc;
use crate::state::ActiveFilters;

/// Which dimensions to leave out of an evaluation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvaluateOptions {
    pub ignore_year: bool,
    /// Skips both the legal-name and the registry-number sets
    pub ignore_operator_identity: bool,
}

impl EvaluateOptions {
    pub fn history() -> Self {
        Self {
            ignore_year: true,
            ignore_operator_identity: false,
        }
    }

    pub fn comparison_group() -> Self {
        Self {
            ignore_year: true,
            ignore_operator_identity: true,
        }
    }
}

/// Records passing every active filter, in dataset order
pub fn evaluate<'a>(records: &'a [OperatorRecord], filters: &ActiveFilters, options: EvaluateOptions) -> Vec<&'a OperatorRecord> {
    RecordQuery::new(records).active_filters(filters, options).execute()
}

/// The default view: every filter applies
pub fn filtered<'a>(records: &'a [OperatorRecord], filters: &ActiveFilters) -> Vec<&'a OperatorRecord> {
    evaluate(records, filters, EvaluateOptions::default())
}

/// Year filter ignored; sorted by year ascending, stable within a year
pub fn history<'a>(records: &'a [OperatorRecord], filters: &ActiveFilters) -> Vec<&'a OperatorRecord> {
    let mut rows = evaluate(records, filters, EvaluateOptions::history());
    rows.sort_by(|a, b| compare_years_asc(&a.year, &b.year));
    rows
}

/// Year and operator identity ignored; the peer group of a selection
pub fn comparison_group<'a>(records: &'a [OperatorRecord], filters: &ActiveFilters) -> Vec<&'a OperatorRecord> {
    evaluate(records, filters, EvaluateOptions::comparison_group())
}

/// Query builder over a record slice
pub struct RecordQuery<'a> {
    records: &'a [OperatorRecord],
    filters: Vec<Box<dyn Fn(&OperatorRecord) -> bool + 'a>>,
}

impl<'a> RecordQuery<'a> {
    pub fn new(records: &'a [OperatorRecord]) -> Self {
        Self {
            records,
            filters: Vec::new(),
        }
    }

    /// Add one predicate per active dimension of `filters`
    pub fn active_filters(self, filters: &ActiveFilters, options: EvaluateOptions) -> Self {
        let mut query = self;

        if !options.ignore_year {
            query = query.years(&filters.years);
        }
        query = query.modalities(&filters.modalities);
        if !options.ignore_operator_identity {
            query = query
                .legal_names(&filters.legal_names)
                .registry_numbers(&filters.registry_numbers);
        }
        query = query
            .sizes(&filters.sizes)
            .group_flags(&filters.group_flags)
            .composite_between(filters.score_min, filters.score_max)
            .beneficiaries_between(filters.beneficiary_min, filters.beneficiary_max);

        if !options.ignore_year && !filters.years.is_empty() {
            query = query.scored_sub_index_only();
        }

        query
    }

    pub fn years(self, values: &BTreeSet<String>) -> Self {
        self.member_of(values, |r| &r.year)
    }

    pub fn modalities(self, values: &BTreeSet<String>) -> Self {
        self.member_of(values, |r| &r.operator_modality)
    }

    pub fn legal_names(self, values: &BTreeSet<String>) -> Self {
        self.member_of(values, |r| &r.legal_name)
    }

    pub fn registry_numbers(self, values: &BTreeSet<String>) -> Self {
        self.member_of(values, |r| &r.registry_number)
    }

    pub fn sizes(self, values: &BTreeSet<String>) -> Self {
        self.member_of(values, |r| r.size().as_str())
    }

    pub fn group_flags(self, values: &BTreeSet<String>) -> Self {
        self.member_of(values, |r| &r.group_flag)
    }

    /// Composite within `[min, max]`; records without a composite pass
    pub fn composite_between(mut self, min: f64, max: f64) -> Self {
        self.filters.push(Box::new(move |r| match r.composite {
            Some(score) => score >= min && score <= max,
            None => true,
        }));
        self
    }

    /// Beneficiary count within `[min, max]`; records without a count pass
    pub fn beneficiaries_between(mut self, min: f64, max: f64) -> Self {
        self.filters.push(Box::new(move |r| match r.beneficiary_count() {
            Some(count) => (count as f64) >= min && (count as f64) <= max,
            None => true,
        }));
        self
    }

    /// At least one structural sub-index strictly positive
    pub fn scored_sub_index_only(mut self) -> Self {
        self.filters.push(Box::new(|r| r.has_scored_sub_index()));
        self
    }

    /// Arbitrary extra predicate
    pub fn matching<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&OperatorRecord) -> bool + 'a,
    {
        self.filters.push(Box::new(predicate));
        self
    }

    fn member_of<F>(mut self, values: &BTreeSet<String>, field: F) -> Self
    where
        F: Fn(&OperatorRecord) -> &str + 'a,
    {
        if values.is_empty() {
            return self;
        }
        let values = values.clone();
        self.filters.push(Box::new(move |r| values.contains(field(r))));
        self
    }

    /// Execute the query and return matching records
    pub fn execute(self) -> Vec<&'a OperatorRecord> {
        self.records
            .iter()
            .filter(|record| self.filters.iter().all(|filter| filter(record)))
            .collect()
    }

    pub fn count(self) -> usize {
        self.execute().len()
    }
}
