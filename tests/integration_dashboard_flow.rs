/*!
 * Integration tests for the dashboard flow
 *
 * Drives a `DashboardSession` the way a presentation layer would: load a
 * table, react to filter events, then read the filtered, history and
 * comparison views and the rankings built on them.
 */

use std::collections::BTreeSet;
use std::io::Write;

use idss::prelude::*;
use tempfile::NamedTempFile;

const DENTAL_TABLE: &str = "\
REG_ANS;Razão Social;Ano;IDSS;IDQS;Modalidade;Qt_Beneficiários;Uniodonto
111;UNIODONTO ALFA;2023;0,41;0,50;Cooperativa Odontológica;25000;Sim
111;UNIODONTO ALFA;2024;0,52;0,60;Cooperativa Odontológica;28000;Sim
111;UNIODONTO ALFA;2025;0,63;0,70;Cooperativa Odontológica;21000;Sim
222;BETA ODONTO;2025;0,80;0,75;Odontologia de Grupo;150000;
333;GAMA SAUDE;2025;0,90;0,88;Medicina de Grupo;5000;
444;DELTA SORRISO;2025;0,95;0;Odontologia de Grupo;500;
555;UNIODONTO EPSILON;2024;0,70;0,65;Cooperativa Odontológica;30000;Sim
";

fn write_temp(contents: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents).unwrap();
    file.flush().unwrap();
    file
}

fn loaded_session(builder: IdssDatasetBuilder) -> DashboardSession {
    let mut session = DashboardSession::default();
    let outcome = session.load(builder);
    assert!(matches!(outcome, LoadOutcome::Installed { .. }), "load failed: {:?}", session.status());
    session
}

#[test]
fn test_single_operator_history_across_years() {
    let csv = "REG_ANS,Razão Social,Ano,IDSS,IDQS\n\
               111,ALFA ODONTO,2023,0.5,0.5\n\
               111,ALFA ODONTO,2025,0.6,0.6\n\
               111,ALFA ODONTO,2024,0.7,0.7\n";
    let mut session = loaded_session(IdssDatasetBuilder::new().csv_text(csv));

    // Loading selects the most recent year only
    assert_eq!(session.filters().years, BTreeSet::from(["2025".to_string()]));

    let selected = session.select_by_query("111").map(|r| r.year.clone());
    assert_eq!(selected, Some("2025".to_string()));
    assert_eq!(session.filters().years, BTreeSet::from(["2025".to_string()]));

    let years: Vec<&str> = session.history().iter().map(|r| r.year.as_str()).collect();
    assert_eq!(years, vec!["2023", "2024", "2025"]);

    let composites: Vec<Option<f64>> = session.operator_history().iter().map(|r| r.composite).collect();
    assert_eq!(composites, vec![Some(0.5), Some(0.7), Some(0.6)]);
}

#[test]
fn test_semicolon_file_with_comma_decimals() {
    let file = write_temp(DENTAL_TABLE.as_bytes());
    let mut session = loaded_session(IdssDatasetBuilder::new().csv_file(file.path()));

    assert_eq!(session.records().len(), 7);
    assert_eq!(session.options().years, vec!["2025", "2024", "2023"]);
    assert_eq!(
        session.filters().modalities,
        BTreeSet::from(["Cooperativa Odontológica".to_string(), "Odontologia de Grupo".to_string()])
    );
    assert!(session.filters().group_flags.is_empty());

    // 333 is outside the preferred modalities, 444 has no scored sub-index
    let filtered: Vec<&str> = session.filtered().iter().map(|r| r.registry_number.as_str()).collect();
    assert_eq!(filtered, vec!["111", "222"]);

    let analytics = session.analytics();
    let ranking = analytics.ranking();
    assert_eq!(ranking.rank_of("222", "2025"), Some(1));
    assert_eq!(ranking.rank_of("111", "2025"), Some(2));
    assert_eq!(ranking.rank_of("111", "2024"), None);

    session.apply(FilterEvent::ValueToggled {
        dimension: FilterDimension::Size,
        value: "Large".to_string(),
    });
    let large: Vec<&str> = session.filtered().iter().map(|r| r.registry_number.as_str()).collect();
    assert_eq!(large, vec!["222"]);
}

#[test]
fn test_focus_builds_comparison_group() {
    let file = write_temp(DENTAL_TABLE.as_bytes());
    let mut session = loaded_session(IdssDatasetBuilder::new().csv_file(file.path()));

    let focused = session.select_by_query("111 — UNIODONTO ALFA").cloned();
    let focused = focused.expect("picker label should resolve");
    assert_eq!(focused.year, "2025");
    assert_eq!(session.filters().sizes, BTreeSet::from(["Medium".to_string()]));
    assert_eq!(session.filters().group_flags, BTreeSet::from(["Sim".to_string()]));

    // Same modality, size and flag in any year
    let peers = session.comparison_group();
    let registries: Vec<&str> = peers.iter().map(|r| r.registry_number.as_str()).collect();
    assert_eq!(registries, vec!["111", "111", "111", "555"]);

    // The focused operator's own rows are not its peers
    let comparisons = IdssAnalytics::new(peers).indicator_comparison(&focused);
    let composite = comparisons.iter().find(|c| c.field == ScoreField::Composite).unwrap();
    assert_eq!(composite.selected, Some(0.63));
    assert!((composite.peer_average - 0.70).abs() < 1e-9);

    // Clearing keeps the year and the focused operator
    session.apply(FilterEvent::ClearAll);
    assert_eq!(session.filters().years, BTreeSet::from(["2025".to_string()]));
    assert!(session.filters().modalities.is_empty());
    assert_eq!(session.selected_operator().map(|r| r.registry_number.as_str()), Some("111"));
}

#[test]
fn test_latin1_file_is_decoded() {
    let bytes = b"REG_ANS,Raz\xe3o Social,Ano,IDSS\n1,S\xc3O PAULO ODONTO,2025,0.8\n";
    let file = write_temp(bytes);

    let dataset = IdssDatasetBuilder::new().csv_file(file.path()).build().unwrap();
    assert_eq!(dataset.len(), 1);
    assert_eq!(dataset.records[0].legal_name, "SÃO PAULO ODONTO");
    assert_eq!(dataset.records[0].composite, Some(0.8));
}

#[test]
fn test_failed_reload_keeps_previous_dataset() {
    let mut session = loaded_session(IdssDatasetBuilder::new().csv_text(DENTAL_TABLE));

    let outcome = session.load(IdssDatasetBuilder::new().csv_file("/nonexistent/idss.csv"));
    assert_eq!(outcome, LoadOutcome::Failed);

    let status = session.status();
    assert_eq!(status.records, 7);
    assert!(!status.loading);
    assert!(status.last_error.is_some());
    assert_eq!(session.filters().active_year(), Some("2025"));
}

#[test]
fn test_category_ranking_and_yearly_series() {
    let dataset = IdssDatasetBuilder::new().csv_text(DENTAL_TABLE).build().unwrap();
    let analytics = dataset.analytics();

    let by_modality = analytics.category_ranking(CategoryField::OperatorModality);
    assert_eq!(by_modality[0].category, "Medicina de Grupo");

    let yearly = analytics.yearly_averages();
    let years: Vec<&str> = yearly.iter().map(|y| y.year.as_str()).collect();
    assert_eq!(years, vec!["2023", "2024", "2025"]);
    assert_eq!(yearly[0].averages.get(&ScoreField::Composite), Some(&0.41));
}
