/*!
 * Dashboard session
 *
 * Owns the current dataset and filter state and recomputes every view from
 * them. Loads are two-step: [`DashboardSession::begin_load`] issues a ticket,
 * [`DashboardSession::complete_load`] installs the result only when that
 * ticket is still the newest one, so a slow load finishing after a newer one
 * is dropped instead of overwriting it.
 *
 * On install the order is fixed: filter options, then the filter-state
 * reset, then (lazily, on request) the views.
 */

use serde::Serialize;
use tracing::{info, warn};

use crate::analytics::IdssAnalytics;
use crate::config::IdssConfig;
use crate::constants::DEFAULT_PAGE_SIZE;
use crate::data_types::OperatorRecord;
use crate::dataset::{IdssDataset, IdssDatasetBuilder};
use crate::evaluate;
use crate::options::FilterOptions;
use crate::state::{transition, ActiveFilters, FilterEvent, FilterPolicy, FilterState, TransitionContext};
use crate::Result;

/// Proof that a load was started; hand it back to `complete_load`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
}

impl LoadTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// What `complete_load` did with a result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The dataset replaced the previous one
    Installed { records: usize },
    /// A newer load was started meanwhile; the result was dropped
    Superseded,
    /// The load failed; the previous dataset is still in place
    Failed,
}

/// Snapshot for a status line or error banner
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatus {
    pub loading: bool,
    pub records: usize,
    pub generation: u64,
    pub last_error: Option<String>,
}

pub struct DashboardSession {
    dataset: Option<IdssDataset>,
    state: FilterState,
    policy: FilterPolicy,
    page_size: usize,
    latest_generation: u64,
    loading: bool,
    last_error: Option<String>,
}

impl Default for DashboardSession {
    fn default() -> Self {
        Self::new(FilterPolicy::default())
    }
}

impl DashboardSession {
    pub fn new(policy: FilterPolicy) -> Self {
        Self {
            dataset: None,
            state: FilterState::default(),
            policy,
            page_size: DEFAULT_PAGE_SIZE,
            latest_generation: 0,
            loading: false,
            last_error: None,
        }
    }

    pub fn from_config(config: &IdssConfig) -> Self {
        let mut session = Self::new(FilterPolicy::from_config(config));
        session.page_size = config.page_size.max(1);
        session
    }

    /// Start a load; any earlier outstanding ticket becomes stale
    pub fn begin_load(&mut self) -> LoadTicket {
        self.latest_generation += 1;
        self.loading = true;
        LoadTicket {
            generation: self.latest_generation,
        }
    }

    /// Install (or reject) the result of the load started with `ticket`
    pub fn complete_load(&mut self, ticket: LoadTicket, result: Result<IdssDataset>) -> LoadOutcome {
        if ticket.generation != self.latest_generation {
            warn!(
                ticket = ticket.generation,
                latest = self.latest_generation,
                "ignoring superseded load"
            );
            return LoadOutcome::Superseded;
        }
        self.loading = false;

        match result {
            Ok(dataset) => {
                let options = dataset.filter_options();
                let ctx = TransitionContext {
                    records: &dataset.records,
                    policy: &self.policy,
                };
                self.state = transition(&self.state, FilterEvent::DatasetLoaded { options }, &ctx);

                let records = dataset.len();
                info!(
                    records,
                    source = %dataset.source_description(),
                    year = self.state.filters.active_year().unwrap_or(""),
                    "dataset installed"
                );
                self.dataset = Some(dataset);
                self.last_error = None;
                LoadOutcome::Installed { records }
            }
            Err(err) => {
                warn!("load failed: {}", err);
                self.last_error = Some(err.user_message());
                LoadOutcome::Failed
            }
        }
    }

    /// Begin, build and complete in one call
    pub fn load(&mut self, builder: IdssDatasetBuilder) -> LoadOutcome {
        let ticket = self.begin_load();
        let result = builder.build();
        self.complete_load(ticket, result)
    }

    /// Feed one event through the filter state machine
    pub fn apply(&mut self, event: FilterEvent) {
        let ctx = TransitionContext {
            records: self.records(),
            policy: &self.policy,
        };
        let next = transition(&self.state, event, &ctx);
        self.state = next;
    }

    /// Resolve free text to an operator and focus it
    pub fn select_by_query(&mut self, query: &str) -> Option<&OperatorRecord> {
        self.apply(FilterEvent::SearchSubmitted {
            query: query.to_string(),
        });
        self.state.selected_operator.as_ref()
    }

    pub fn dataset(&self) -> Option<&IdssDataset> {
        self.dataset.as_ref()
    }

    pub fn records(&self) -> &[OperatorRecord] {
        self.dataset.as_ref().map(|d| d.records.as_slice()).unwrap_or(&[])
    }

    pub fn state(&self) -> &FilterState {
        &self.state
    }

    pub fn filters(&self) -> &ActiveFilters {
        &self.state.filters
    }

    pub fn options(&self) -> &FilterOptions {
        &self.state.options
    }

    pub fn selected_operator(&self) -> Option<&OperatorRecord> {
        self.state.selected_operator.as_ref()
    }

    pub fn filtered(&self) -> Vec<&OperatorRecord> {
        evaluate::filtered(self.records(), &self.state.filters)
    }

    pub fn history(&self) -> Vec<&OperatorRecord> {
        evaluate::history(self.records(), &self.state.filters)
    }

    /// History rows of the focused operator only; empty without a focus
    pub fn operator_history(&self) -> Vec<&OperatorRecord> {
        let Some(selected) = self.state.selected_operator.as_ref() else {
            return Vec::new();
        };
        self.history()
            .into_iter()
            .filter(|r| r.registry_number == selected.registry_number)
            .collect()
    }

    pub fn comparison_group(&self) -> Vec<&OperatorRecord> {
        evaluate::comparison_group(self.records(), &self.state.filters)
    }

    /// Aggregations over the filtered view
    pub fn analytics(&self) -> IdssAnalytics<'_> {
        IdssAnalytics::new(self.filtered()).with_page_size(self.page_size)
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            loading: self.loading,
            records: self.records().len(),
            generation: self.latest_generation,
            last_error: self.last_error.clone(),
        }
    }
}
