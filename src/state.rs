/*!
 * Filter state machine
 *
 * The analyst's current selections live in [`ActiveFilters`]. Every change
 * goes through [`transition`], a pure function from the previous
 * [`FilterState`] and one [`FilterEvent`] to the next state. The cascading
 * rules (operator focus overwriting modality/size/group, the sub-group
 * consistency rule, identity-filter resolution) are all applied inside that
 * one function, in a fixed order.
 */

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::debug;

use crate::constants::{PICKER_SEPARATORS, PREFERRED_MODALITIES, SUBGROUP_SPLITS};
use crate::data_types::OperatorRecord;
use crate::options::{compare_years_desc, FilterOptions};

/// One selectable filter dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FilterDimension {
    Year,
    OperatorModality,
    LegalName,
    RegistryNumber,
    Size,
    GroupFlag,
}

impl FilterDimension {
    pub fn is_identity(&self) -> bool {
        matches!(self, FilterDimension::LegalName | FilterDimension::RegistryNumber)
    }
}

/// Current selections. An empty set means "no restriction".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveFilters {
    pub years: BTreeSet<String>,
    pub modalities: BTreeSet<String>,
    pub legal_names: BTreeSet<String>,
    pub registry_numbers: BTreeSet<String>,
    pub sizes: BTreeSet<String>,
    pub group_flags: BTreeSet<String>,
    pub score_min: f64,
    pub score_max: f64,
    pub beneficiary_min: f64,
    pub beneficiary_max: f64,
}

impl Default for ActiveFilters {
    fn default() -> Self {
        Self::unrestricted(&FilterOptions::default())
    }
}

impl ActiveFilters {
    /// No selections; ranges at the option bounds
    pub fn unrestricted(options: &FilterOptions) -> Self {
        Self {
            years: BTreeSet::new(),
            modalities: BTreeSet::new(),
            legal_names: BTreeSet::new(),
            registry_numbers: BTreeSet::new(),
            sizes: BTreeSet::new(),
            group_flags: BTreeSet::new(),
            score_min: options.score_range.min,
            score_max: options.score_range.max,
            beneficiary_min: options.beneficiary_range.min,
            beneficiary_max: options.beneficiary_range.max,
        }
    }

    pub fn values(&self, dimension: FilterDimension) -> &BTreeSet<String> {
        match dimension {
            FilterDimension::Year => &self.years,
            FilterDimension::OperatorModality => &self.modalities,
            FilterDimension::LegalName => &self.legal_names,
            FilterDimension::RegistryNumber => &self.registry_numbers,
            FilterDimension::Size => &self.sizes,
            FilterDimension::GroupFlag => &self.group_flags,
        }
    }

    pub fn values_mut(&mut self, dimension: FilterDimension) -> &mut BTreeSet<String> {
        match dimension {
            FilterDimension::Year => &mut self.years,
            FilterDimension::OperatorModality => &mut self.modalities,
            FilterDimension::LegalName => &mut self.legal_names,
            FilterDimension::RegistryNumber => &mut self.registry_numbers,
            FilterDimension::Size => &mut self.sizes,
            FilterDimension::GroupFlag => &mut self.group_flags,
        }
    }

    /// The selected year; with several selected, the most recent one
    pub fn active_year(&self) -> Option<&str> {
        self.years
            .iter()
            .min_by(|a, b| compare_years_desc(a, b))
            .map(|s| s.as_str())
    }

    /// Whether anything narrows the dataset relative to the option bounds
    pub fn is_restricting(&self, options: &FilterOptions) -> bool {
        !self.years.is_empty()
            || !self.modalities.is_empty()
            || !self.legal_names.is_empty()
            || !self.registry_numbers.is_empty()
            || !self.sizes.is_empty()
            || !self.group_flags.is_empty()
            || self.score_min > options.score_range.min
            || self.score_max < options.score_range.max
            || self.beneficiary_min > options.beneficiary_range.min
            || self.beneficiary_max < options.beneficiary_range.max
    }
}

/// A modality whose operators split into sub-groups by group flag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, serde::Deserialize)]
pub struct SubgroupRule {
    pub modality: String,
    pub group_flag: String,
}

/// Defaults and derived-update rules applied by [`transition`]
#[derive(Debug, Clone, PartialEq)]
pub struct FilterPolicy {
    /// Modalities pre-selected on load (intersected with what is present)
    pub preferred_modalities: Vec<String>,
    pub subgroup_rules: Vec<SubgroupRule>,
}

impl Default for FilterPolicy {
    fn default() -> Self {
        Self {
            preferred_modalities: PREFERRED_MODALITIES.iter().map(|m| m.to_string()).collect(),
            subgroup_rules: SUBGROUP_SPLITS
                .iter()
                .map(|(modality, flag)| SubgroupRule {
                    modality: modality.to_string(),
                    group_flag: flag.to_string(),
                })
                .collect(),
        }
    }
}

impl FilterPolicy {
    pub fn from_config(config: &crate::config::IdssConfig) -> Self {
        Self {
            preferred_modalities: config.preferred_modalities.clone(),
            subgroup_rules: config.subgroup_rules.clone(),
        }
    }
}

/// Filter selections plus the context they were made against
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct FilterState {
    pub filters: ActiveFilters,
    /// Bounds of the dataset the filters refer to
    pub options: FilterOptions,
    /// Operator currently in focus for comparisons
    pub selected_operator: Option<OperatorRecord>,
}

impl FilterState {
    /// State right after a dataset load: latest year, preferred modalities
    pub fn initial(options: FilterOptions, policy: &FilterPolicy) -> Self {
        let mut filters = ActiveFilters::unrestricted(&options);

        if let Some(latest) = options.latest_year() {
            filters.years.insert(latest.to_string());
        }
        filters.modalities = policy
            .preferred_modalities
            .iter()
            .filter(|m| options.has_modality(m))
            .cloned()
            .collect();

        Self {
            filters,
            options,
            selected_operator: None,
        }
    }
}

/// Everything that can change the filter state
#[derive(Debug, Clone, PartialEq)]
pub enum FilterEvent {
    /// A new dataset replaced the previous one
    DatasetLoaded { options: FilterOptions },
    /// An operator was picked directly (table row, chart bar)
    OperatorSelected(OperatorRecord),
    /// The operator focus was dropped; selections stay as they are
    OperatorCleared,
    /// Free-text operator search
    SearchSubmitted { query: String },
    /// A whole dimension was replaced
    SelectionChanged {
        dimension: FilterDimension,
        values: BTreeSet<String>,
    },
    /// One value was clicked on or off
    ValueToggled {
        dimension: FilterDimension,
        value: String,
    },
    ScoreRangeChanged { min: f64, max: f64 },
    BeneficiaryRangeChanged { min: f64, max: f64 },
    ClearAll,
}

impl FilterEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            FilterEvent::DatasetLoaded { .. } => "dataset_loaded",
            FilterEvent::OperatorSelected(_) => "operator_selected",
            FilterEvent::OperatorCleared => "operator_cleared",
            FilterEvent::SearchSubmitted { .. } => "search_submitted",
            FilterEvent::SelectionChanged { .. } => "selection_changed",
            FilterEvent::ValueToggled { .. } => "value_toggled",
            FilterEvent::ScoreRangeChanged { .. } => "score_range_changed",
            FilterEvent::BeneficiaryRangeChanged { .. } => "beneficiary_range_changed",
            FilterEvent::ClearAll => "clear_all",
        }
    }
}

/// Read-only inputs a transition may consult
#[derive(Debug, Clone, Copy)]
pub struct TransitionContext<'a> {
    pub records: &'a [OperatorRecord],
    pub policy: &'a FilterPolicy,
}

/// Compute the state that follows `previous` after `event`
pub fn transition(previous: &FilterState, event: FilterEvent, ctx: &TransitionContext<'_>) -> FilterState {
    let kind = event.kind();
    let mut next = previous.clone();
    let mut fresh_load = false;

    match event {
        FilterEvent::DatasetLoaded { options } => {
            next = FilterState::initial(options, ctx.policy);
            fresh_load = true;
        }
        FilterEvent::OperatorSelected(record) => {
            focus_operator(&mut next, record);
        }
        FilterEvent::OperatorCleared => {
            next.selected_operator = None;
        }
        FilterEvent::SearchSubmitted { query } => {
            let active_year = next.filters.active_year().map(|s| s.to_string());
            match resolve_operator_query(ctx.records, &query, active_year.as_deref()) {
                Some(record) => focus_operator(&mut next, record.clone()),
                None => debug!(query = %query, "search matched no operator"),
            }
        }
        FilterEvent::SelectionChanged { dimension, values } => {
            *next.filters.values_mut(dimension) = values;
            if dimension.is_identity() {
                resolve_identity_focus(&mut next, ctx.records);
            }
        }
        FilterEvent::ValueToggled { dimension, value } => {
            let set = next.filters.values_mut(dimension);
            if set.contains(&value) {
                set.remove(&value);
            } else {
                if dimension == FilterDimension::Year {
                    set.clear();
                }
                set.insert(value);
            }
            if dimension.is_identity() {
                resolve_identity_focus(&mut next, ctx.records);
            }
        }
        FilterEvent::ScoreRangeChanged { min, max } => {
            next.filters.score_min = min.min(max);
            next.filters.score_max = max.max(min);
        }
        FilterEvent::BeneficiaryRangeChanged { min, max } => {
            next.filters.beneficiary_min = min.min(max);
            next.filters.beneficiary_max = max.max(min);
        }
        FilterEvent::ClearAll => {
            let mut cleared = ActiveFilters::unrestricted(&next.options);
            cleared.years = if next.filters.years.is_empty() {
                next.options.latest_year().map(|y| y.to_string()).into_iter().collect()
            } else {
                next.filters.years.clone()
            };
            next.filters = cleared;
        }
    }

    apply_subgroup_rules(&previous.filters, &mut next.filters, ctx.policy, fresh_load);

    debug!(
        event = kind,
        years = next.filters.years.len(),
        modalities = next.filters.modalities.len(),
        selected = next.selected_operator.as_ref().map(|r| r.registry_number.as_str()).unwrap_or(""),
        "filter transition"
    );

    next
}

/// Overwrite the categorical filters to match one operator
fn focus_operator(state: &mut FilterState, record: OperatorRecord) {
    let filters = &mut state.filters;

    filters.modalities = singleton(&record.operator_modality);
    filters.sizes = singleton(record.size().as_str());
    filters.group_flags = singleton(&record.group_flag);
    filters.legal_names.clear();
    filters.registry_numbers.clear();

    if filters.years.is_empty() && !record.year.is_empty() {
        filters.years.insert(record.year.clone());
    }

    state.selected_operator = Some(record);
}

fn singleton(value: &str) -> BTreeSet<String> {
    if value.is_empty() {
        BTreeSet::new()
    } else {
        BTreeSet::from([value.to_string()])
    }
}

/// A single legal-name or a single registry selection (not both) focuses
/// the matching operator.
fn resolve_identity_focus(state: &mut FilterState, records: &[OperatorRecord]) {
    let one_name = state.filters.legal_names.len() == 1;
    let one_registry = state.filters.registry_numbers.len() == 1;
    if one_name == one_registry {
        return;
    }

    let active_year = state.filters.active_year().map(|s| s.to_string());
    let found = if one_name {
        let name = state.filters.legal_names.iter().next().cloned().unwrap_or_default();
        prefer_year(records.iter().filter(|r| r.legal_name == name), active_year.as_deref())
    } else {
        let registry = state.filters.registry_numbers.iter().next().cloned().unwrap_or_default();
        prefer_year(records.iter().filter(|r| r.registry_number == registry), active_year.as_deref())
    };

    if let Some(record) = found {
        focus_operator(state, record.clone());
    }
}

/// Keep the configured group flag selected while a split modality is active.
///
/// Fires when the modality becomes part of the set (or on a fresh load), and
/// when the group-flag set starts restricting while the modality is already
/// active. An empty group-flag set already admits every flag, so it is left
/// alone, and a flag the user just removed is not put back.
fn apply_subgroup_rules(previous: &ActiveFilters, next: &mut ActiveFilters, policy: &FilterPolicy, fresh_load: bool) {
    let flags_started_restricting = previous.group_flags.is_empty() && !next.group_flags.is_empty();

    for rule in &policy.subgroup_rules {
        if !next.modalities.contains(&rule.modality) || next.group_flags.is_empty() {
            continue;
        }
        let newly_active = fresh_load || !previous.modalities.contains(&rule.modality);
        let just_removed =
            previous.group_flags.contains(&rule.group_flag) && !next.group_flags.contains(&rule.group_flag);
        if (newly_active || flags_started_restricting) && !just_removed {
            next.group_flags.insert(rule.group_flag.clone());
        }
    }
}

/// Resolve free text to an operator record.
///
/// Precedence: exact registry number, exact legal name, then the registry
/// prefix of a "registry — legal name" picker label. Among matches, one from
/// the active year wins; otherwise the first in dataset order.
pub fn resolve_operator_query<'a>(
    records: &'a [OperatorRecord],
    query: &str,
    active_year: Option<&str>,
) -> Option<&'a OperatorRecord> {
    let query = query.trim();
    if query.is_empty() {
        return None;
    }

    prefer_year(records.iter().filter(|r| r.registry_number == query), active_year)
        .or_else(|| prefer_year(records.iter().filter(|r| r.legal_name == query), active_year))
        .or_else(|| {
            let prefix = picker_prefix(query)?;
            prefer_year(records.iter().filter(|r| r.registry_number == prefix), active_year)
        })
}

fn picker_prefix(query: &str) -> Option<&str> {
    PICKER_SEPARATORS
        .iter()
        .filter_map(|sep| query.find(sep))
        .min()
        .map(|idx| query[..idx].trim())
        .filter(|prefix| !prefix.is_empty())
}

fn prefer_year<'a, I>(candidates: I, year: Option<&str>) -> Option<&'a OperatorRecord>
where
    I: Iterator<Item = &'a OperatorRecord>,
{
    let mut first = None;
    for record in candidates {
        if year == Some(record.year.as_str()) {
            return Some(record);
        }
        if first.is_none() {
            first = Some(record);
        }
    }
    first
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::build_options;

    const COOP: &str = "Cooperativa Odontológica";
    const GROUP: &str = "Odontologia de Grupo";

    fn record(registry: &str, name: &str, year: &str, modality: &str, flag: &str, beneficiaries: i64) -> OperatorRecord {
        OperatorRecord::builder(registry, year)
            .legal_name(name)
            .operator_modality(modality)
            .group_flag(flag)
            .beneficiary_count(Some(beneficiaries))
            .composite(Some(0.5))
            .build()
    }

    fn dataset() -> Vec<OperatorRecord> {
        vec![
            record("111", "UNIODONTO ALFA", "2024", COOP, "Sim", 30_000),
            record("111", "UNIODONTO ALFA", "2025", COOP, "Sim", 30_000),
            record("222", "GRUPO BETA", "2025", GROUP, "Não", 150_000),
            record("333", "AUTOGESTAO GAMA", "2025", "Autogestão", "Não", 5_000),
        ]
    }

    fn loaded(records: &[OperatorRecord], policy: &FilterPolicy) -> FilterState {
        let ctx = TransitionContext { records, policy };
        transition(
            &FilterState::default(),
            FilterEvent::DatasetLoaded { options: build_options(records) },
            &ctx,
        )
    }

    #[test]
    fn test_dataset_loaded_defaults() {
        let records = dataset();
        let policy = FilterPolicy::default();
        let state = loaded(&records, &policy);

        assert_eq!(state.filters.years, BTreeSet::from(["2025".to_string()]));
        assert_eq!(state.filters.modalities, BTreeSet::from([COOP.to_string(), GROUP.to_string()]));
        assert!(state.filters.group_flags.is_empty());
        assert_eq!(state.filters.score_min, 0.0);
        assert_eq!(state.filters.beneficiary_max, 1_000_000.0);
        assert!(state.selected_operator.is_none());
    }

    #[test]
    fn test_preferred_modalities_intersect_present() {
        let records = vec![record("9", "X", "2025", GROUP, "", 10)];
        let state = loaded(&records, &FilterPolicy::default());
        assert_eq!(state.filters.modalities, BTreeSet::from([GROUP.to_string()]));
    }

    #[test]
    fn test_operator_selected_overwrites_categories() {
        let records = dataset();
        let policy = FilterPolicy::default();
        let ctx = TransitionContext { records: &records, policy: &policy };
        let mut state = loaded(&records, &policy);
        state.filters.legal_names.insert("SOMETHING".into());

        let next = transition(&state, FilterEvent::OperatorSelected(records[2].clone()), &ctx);
        assert_eq!(next.filters.modalities, BTreeSet::from([GROUP.to_string()]));
        assert_eq!(next.filters.sizes, BTreeSet::from(["Large".to_string()]));
        assert_eq!(next.filters.group_flags, BTreeSet::from(["Não".to_string()]));
        assert!(next.filters.legal_names.is_empty());
        assert!(next.filters.registry_numbers.is_empty());
        assert_eq!(next.filters.years, BTreeSet::from(["2025".to_string()]));
        assert_eq!(next.selected_operator.as_ref().map(|r| r.registry_number.as_str()), Some("222"));
    }

    #[test]
    fn test_operator_selected_adopts_year_only_when_empty() {
        let records = dataset();
        let policy = FilterPolicy::default();
        let ctx = TransitionContext { records: &records, policy: &policy };
        let state = loaded(&records, &policy);

        let cleared = transition(
            &state,
            FilterEvent::SelectionChanged { dimension: FilterDimension::Year, values: BTreeSet::new() },
            &ctx,
        );
        let next = transition(&cleared, FilterEvent::OperatorSelected(records[0].clone()), &ctx);
        assert_eq!(next.filters.years, BTreeSet::from(["2024".to_string()]));
    }

    #[test]
    fn test_single_registry_filter_focuses_operator() {
        let records = dataset();
        let policy = FilterPolicy::default();
        let ctx = TransitionContext { records: &records, policy: &policy };
        let state = loaded(&records, &policy);

        let next = transition(
            &state,
            FilterEvent::ValueToggled { dimension: FilterDimension::RegistryNumber, value: "111".into() },
            &ctx,
        );
        let selected = next.selected_operator.as_ref().expect("operator focused");
        assert_eq!(selected.year, "2025");
        assert!(next.filters.registry_numbers.is_empty());
        assert_eq!(next.filters.modalities, BTreeSet::from([COOP.to_string()]));
    }

    #[test]
    fn test_name_and_registry_together_do_not_focus() {
        let records = dataset();
        let policy = FilterPolicy::default();
        let ctx = TransitionContext { records: &records, policy: &policy };
        let mut state = loaded(&records, &policy);
        state.filters.legal_names.insert("GRUPO BETA".into());

        let next = transition(
            &state,
            FilterEvent::ValueToggled { dimension: FilterDimension::RegistryNumber, value: "111".into() },
            &ctx,
        );
        assert!(next.selected_operator.is_none());
        assert_eq!(next.filters.registry_numbers.len(), 1);
    }

    #[test]
    fn test_subgroup_rule_adds_flag_when_modality_newly_active() {
        let records = dataset();
        let policy = FilterPolicy::default();
        let ctx = TransitionContext { records: &records, policy: &policy };
        let mut state = loaded(&records, &policy);
        state.filters.modalities = BTreeSet::from([GROUP.to_string()]);
        state.filters.group_flags = BTreeSet::from(["Não".to_string()]);

        let next = transition(
            &state,
            FilterEvent::ValueToggled { dimension: FilterDimension::OperatorModality, value: COOP.into() },
            &ctx,
        );
        assert_eq!(next.filters.group_flags, BTreeSet::from(["Não".to_string(), "Sim".to_string()]));

        // The user can remove it afterwards
        let removed = transition(
            &next,
            FilterEvent::ValueToggled { dimension: FilterDimension::GroupFlag, value: "Sim".into() },
            &ctx,
        );
        assert_eq!(removed.filters.group_flags, BTreeSet::from(["Não".to_string()]));
    }

    #[test]
    fn test_subgroup_rule_adds_flag_when_flags_start_restricting() {
        let records = vec![
            record("1", "UNIODONTO UM", "2025", COOP, "Sim", 30_000),
            record("2", "GRUPO DOIS", "2025", GROUP, "Não", 30_000),
        ];
        let policy = FilterPolicy::default();
        let ctx = TransitionContext { records: &records, policy: &policy };
        let state = loaded(&records, &policy);
        assert!(state.filters.group_flags.is_empty());

        let next = transition(
            &state,
            FilterEvent::ValueToggled { dimension: FilterDimension::GroupFlag, value: "Não".into() },
            &ctx,
        );
        assert_eq!(next.filters.group_flags, BTreeSet::from(["Não".to_string(), "Sim".to_string()]));

        let visible: Vec<&str> = crate::evaluate::evaluate(&records, &next.filters, crate::evaluate::EvaluateOptions::history())
            .iter()
            .map(|r| r.registry_number.as_str())
            .collect();
        assert_eq!(visible, vec!["1", "2"]);

        // Replacing the whole set behaves the same
        let replaced = transition(
            &state,
            FilterEvent::SelectionChanged {
                dimension: FilterDimension::GroupFlag,
                values: BTreeSet::from(["Não".to_string()]),
            },
            &ctx,
        );
        assert!(replaced.filters.group_flags.contains("Sim"));

        // Without the split modality active nothing is added
        let mut group_only = state.clone();
        group_only.filters.modalities = BTreeSet::from([GROUP.to_string()]);
        let untouched = transition(
            &group_only,
            FilterEvent::ValueToggled { dimension: FilterDimension::GroupFlag, value: "Não".into() },
            &ctx,
        );
        assert_eq!(untouched.filters.group_flags, BTreeSet::from(["Não".to_string()]));
    }

    #[test]
    fn test_operator_cleared_keeps_selections() {
        let records = dataset();
        let policy = FilterPolicy::default();
        let ctx = TransitionContext { records: &records, policy: &policy };
        let state = loaded(&records, &policy);

        let focused = transition(&state, FilterEvent::OperatorSelected(records[2].clone()), &ctx);
        assert!(focused.selected_operator.is_some());

        let cleared = transition(&focused, FilterEvent::OperatorCleared, &ctx);
        assert!(cleared.selected_operator.is_none());
        assert_eq!(cleared.filters, focused.filters);
        assert_eq!(cleared.options, focused.options);
    }

    #[test]
    fn test_beneficiary_range_event_normalizes_order() {
        let records = dataset();
        let policy = FilterPolicy::default();
        let ctx = TransitionContext { records: &records, policy: &policy };
        let state = loaded(&records, &policy);

        let next = transition(
            &state,
            FilterEvent::BeneficiaryRangeChanged { min: 100_000.0, max: 20_000.0 },
            &ctx,
        );
        assert_eq!((next.filters.beneficiary_min, next.filters.beneficiary_max), (20_000.0, 100_000.0));
        assert_eq!(next.filters.score_min, state.filters.score_min);

        // 222 is above the range, 333 is outside the preferred modalities
        let in_range: Vec<&str> = crate::evaluate::history(&records, &next.filters)
            .iter()
            .map(|r| r.registry_number.as_str())
            .collect();
        assert_eq!(in_range, vec!["111", "111"]);
    }

    #[test]
    fn test_year_toggle_is_single_select() {
        let records = dataset();
        let policy = FilterPolicy::default();
        let ctx = TransitionContext { records: &records, policy: &policy };
        let state = loaded(&records, &policy);

        let next = transition(
            &state,
            FilterEvent::ValueToggled { dimension: FilterDimension::Year, value: "2024".into() },
            &ctx,
        );
        assert_eq!(next.filters.years, BTreeSet::from(["2024".to_string()]));

        let off = transition(
            &next,
            FilterEvent::ValueToggled { dimension: FilterDimension::Year, value: "2024".into() },
            &ctx,
        );
        assert!(off.filters.years.is_empty());
    }

    #[test]
    fn test_clear_all_keeps_year() {
        let records = dataset();
        let policy = FilterPolicy::default();
        let ctx = TransitionContext { records: &records, policy: &policy };
        let mut state = loaded(&records, &policy);
        state.filters.years = BTreeSet::from(["2024".to_string()]);
        state.filters.sizes.insert("Small".into());
        state.filters.score_min = 0.3;

        let next = transition(&state, FilterEvent::ClearAll, &ctx);
        assert_eq!(next.filters.years, BTreeSet::from(["2024".to_string()]));
        assert!(next.filters.modalities.is_empty());
        assert!(next.filters.sizes.is_empty());
        assert_eq!(next.filters.score_min, 0.0);

        state.filters.years.clear();
        let fallback = transition(&state, FilterEvent::ClearAll, &ctx);
        assert_eq!(fallback.filters.years, BTreeSet::from(["2025".to_string()]));
    }

    #[test]
    fn test_range_events_normalize_order() {
        let records = dataset();
        let policy = FilterPolicy::default();
        let ctx = TransitionContext { records: &records, policy: &policy };
        let state = loaded(&records, &policy);

        let next = transition(&state, FilterEvent::ScoreRangeChanged { min: 0.8, max: 0.2 }, &ctx);
        assert_eq!((next.filters.score_min, next.filters.score_max), (0.2, 0.8));
        assert!(next.filters.is_restricting(&next.options));
    }

    #[test]
    fn test_query_resolution_precedence() {
        let records = dataset();

        let by_registry = resolve_operator_query(&records, "111", Some("2024")).unwrap();
        assert_eq!(by_registry.year, "2024");

        let by_name = resolve_operator_query(&records, "GRUPO BETA", None).unwrap();
        assert_eq!(by_name.registry_number, "222");

        let by_label = resolve_operator_query(&records, "333 — AUTOGESTAO GAMA (old name)", Some("2025")).unwrap();
        assert_eq!(by_label.registry_number, "333");

        let first_in_order = resolve_operator_query(&records, "111", Some("2030")).unwrap();
        assert_eq!(first_in_order.year, "2024");

        assert!(resolve_operator_query(&records, "   ", None).is_none());
        assert!(resolve_operator_query(&records, "999", None).is_none());
    }

    #[test]
    fn test_search_event_focuses_operator() {
        let records = dataset();
        let policy = FilterPolicy::default();
        let ctx = TransitionContext { records: &records, policy: &policy };
        let state = loaded(&records, &policy);

        let next = transition(&state, FilterEvent::SearchSubmitted { query: "111 - UNIODONTO ALFA".into() }, &ctx);
        assert_eq!(next.selected_operator.map(|r| r.year), Some("2025".to_string()));

        let missed = transition(&state, FilterEvent::SearchSubmitted { query: "nobody".into() }, &ctx);
        assert_eq!(missed, state);
    }
}
