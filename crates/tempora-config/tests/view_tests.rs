//! View loading and evaluation through the public API.

use std::io::Write;

use approx::assert_relative_eq;
use tempora_config::{ConfigError, ConfigManager, ViewConfig};
use tempora_core::types::{Record, RecordSet};
use tempora_core::window::TimeWindow;

fn cefr_records() -> RecordSet {
    let schema = ViewConfig::cefr_dive().schema;
    let rows = [
        ("2024-01-04", "B2", Some(71.0)),
        ("2024-01-10", "B1", Some(52.0)),
        ("2024-01-19", "B2", Some(64.0)),
        ("2024-02-02", "C1", Some(88.0)),
        ("2024-02-09", "B2", Some(0.0)),
        ("2024-02-10", "A2", None),
    ];
    let records = rows
        .iter()
        .map(|(d, cefr, score)| Record::new(*d, vec![Some(cefr.to_string())], vec![*score]))
        .collect();
    RecordSet::new(schema, records).unwrap()
}

#[test]
fn test_cefr_dive_keeps_declared_levels() {
    let manager = ConfigManager::new();
    let output = manager
        .get("cefr_dive")
        .unwrap()
        .evaluate(&cefr_records())
        .unwrap();

    // unscored candidates are filtered out
    assert_eq!(output.pipeline.report.filtered_out, 2);
    assert!(output.pipeline.report.is_complete());

    let table = &output.pivots[0].table;
    assert_eq!(table.row_labels(), vec!["A1", "A2", "B1", "B2", "C1", "C2"]);
    assert!(table.rows[0].cells.iter().all(|c| c.is_no_data()));

    let periods: Vec<_> = table.columns.iter().map(|c| c.period.label()).collect();
    assert_eq!(periods[0], "Jan-2024");
    assert_eq!(periods.last().copied(), Some("Feb-2024"));

    let jan = table
        .columns
        .iter()
        .position(|c| c.metric == "max(TALKSCORE_OVERALL)" && c.period.label() == "Jan-2024")
        .unwrap();
    assert_relative_eq!(table.rows[3].cells[jan].value().unwrap(), 71.0);
}

#[test]
fn test_evaluation_is_deterministic() {
    let view = ViewConfig::cefr_dive();
    let first = serde_json::to_string(&view.evaluate(&cefr_records()).unwrap()).unwrap();
    let second = serde_json::to_string(&view.evaluate(&cefr_records()).unwrap()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_window_switch_changes_buckets() {
    let manager = ConfigManager::new();
    let daily = manager
        .get_with_window("cefr_dive", TimeWindow::Last30Days)
        .unwrap()
        .evaluate(&cefr_records())
        .unwrap();
    assert_eq!(daily.pipeline.report.outside_window, 2);
    let labels: Vec<_> = daily.series[0]
        .points
        .iter()
        .map(|p| p.period.label())
        .collect();
    assert_eq!(labels, vec!["Jan-19-2024", "Feb-02-2024"]);
}

#[test]
fn test_load_file() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    write!(
        file,
        r#"
[[views]]
name = "sources"
source = "TP_raw_data1.csv"
window = "all_time"

[views.schema]
timestamp = "DATE_DAY"
dimensions = ["NEW_SOURCE"]

[[views.rankings]]
name = "top_sources"
dimension = "NEW_SOURCE"
"#
    )
    .unwrap();

    let manager = ConfigManager::empty();
    assert_eq!(manager.load_file(file.path()).unwrap(), vec!["sources"]);
    assert_eq!(manager.get("sources").unwrap().rankings[0].limit, 10);

    let unsupported = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    assert!(matches!(
        manager.load_file(unsupported.path()),
        Err(ConfigError::Io { .. })
    ));
    assert!(matches!(
        manager.load_file("/nonexistent/views.json"),
        Err(ConfigError::Io { .. })
    ));
}

fn overview_records() -> RecordSet {
    let schema = ViewConfig::overview().schema;
    // OVERALL, TEST_COMPLETED, FOR_TS_REVIEW, VOCAB, FLUENCY, GRAMMAR, PRONUNCIATION
    let rows: [(&str, &str, [Option<f64>; 7]); 3] = [
        (
            "2024-03-04",
            "A",
            [Some(0.0), Some(1.0), None, Some(0.0), Some(0.0), Some(0.0), Some(0.0)],
        ),
        (
            "2024-03-05",
            "A",
            [Some(80.0), None, Some(1.0), Some(60.0), Some(70.0), Some(80.0), Some(90.0)],
        ),
        (
            "2024-03-06",
            "B",
            [Some(90.0), Some(0.0), None, Some(70.0), Some(80.0), Some(90.0), Some(100.0)],
        ),
    ];
    let records = rows
        .iter()
        .map(|(d, site, measures)| {
            Record::new(
                *d,
                vec![Some(site.to_string()), Some("referral".to_string())],
                measures.to_vec(),
            )
        })
        .collect();
    RecordSet::new(schema, records).unwrap()
}

fn named<'a, T>(items: &'a [T], name: &str, key: impl Fn(&T) -> &str) -> &'a T {
    items.iter().find(|i| key(i) == name).unwrap()
}

#[test]
fn test_overview_scores_ignore_unscored_candidates() {
    let output = ViewConfig::overview().evaluate(&overview_records()).unwrap();
    assert_eq!(output.pipeline.report.bucketed, 3);

    let overall = named(&output.series, "average_overall", |s| &s.name);
    let labels: Vec<_> = overall.points.iter().map(|p| p.label.as_str()).collect();
    assert_eq!(labels, vec!["85.00"]);

    let components = named(&output.series, "score_components", |s| &s.name);
    let vocab = named(&components.points, "mean(TALKSCORE_VOCAB)", |p| &p.series);
    assert_eq!(vocab.label, "65.00");

    let leads = named(&output.series, "lead_count", |s| &s.name);
    assert_eq!(leads.points[0].label, "3");
}

#[test]
fn test_overview_scorecards() {
    let output = ViewConfig::overview().evaluate(&overview_records()).unwrap();

    let overall = &named(&output.summaries, "overall_scorecard", |s| &s.name).table;
    assert_eq!(overall.cell("", "mean(TALKSCORE_OVERALL)").unwrap().text(), "85.00");

    let leads = &named(&output.summaries, "lead_scorecard", |s| &s.name).table;
    assert_eq!(leads.cell("", "records").unwrap().text(), "3");

    let components = &named(&output.summaries, "component_scorecard", |s| &s.name).table;
    assert_eq!(
        components.cell("", "mean(TALKSCORE_PRONUNCIATION)").unwrap().text(),
        "95.00"
    );
}

#[test]
fn test_completion_pct_divides_by_reported_tests() {
    let output = ViewConfig::overview().evaluate(&overview_records()).unwrap();
    let pct = named(&output.ratios, "test_completion_pct", |s| &s.name);

    // two of three records report TEST_COMPLETED
    let labels: Vec<_> = pct
        .points
        .iter()
        .map(|p| (p.series.as_str(), p.label.as_str()))
        .collect();
    assert_eq!(labels, vec![("A", "50.00%"), ("B", "0.00%")]);
}

fn talkscore_records() -> RecordSet {
    let schema = ViewConfig::talkscore_analysis().schema;
    // VOCAB, FLUENCY, GRAMMAR, COMPREHENSION, PRONUNCIATION, OVERALL
    let rows: [(&str, &str, [f64; 6]); 6] = [
        ("2024-05-30", "No show", [10.0, 20.0, 30.0, 40.0, 50.0, 60.0]),
        ("2024-05-29", "No show", [20.0, 40.0, 60.0, 80.0, 40.0, 70.0]),
        ("2024-05-28", "Low score", [30.0, 60.0, 90.0, 120.0, 30.0, 80.0]),
        ("2024-05-27", "Low score", [5.0, 5.0, 5.0, 5.0, 5.0, 0.0]),
        ("2024-05-26", "Low score", [5.0, 5.0, 5.0, 5.0, 5.0, 0.0]),
        ("2024-03-01", "Other", [50.0, 50.0, 50.0, 50.0, 50.0, 50.0]),
    ];
    let records = rows
        .iter()
        .map(|(d, reason, scores)| {
            Record::new(
                *d,
                vec![Some(reason.to_string())],
                scores.iter().copied().map(Some).collect(),
            )
        })
        .collect();
    RecordSet::new(schema, records).unwrap()
}

#[test]
fn test_talkscore_analysis() {
    let output = ViewConfig::talkscore_analysis()
        .evaluate(&talkscore_records())
        .unwrap();
    let report = &output.pipeline.report;
    assert_eq!(report.outside_window, 1);
    assert_eq!(report.filtered_out, 2);
    assert_eq!(report.bucketed, 3);

    let reasons: Vec<_> = output.rankings[0]
        .entries
        .iter()
        .map(|c| (c.value.as_str(), c.count))
        .collect();
    assert_eq!(reasons, vec![("No show", 2), ("Low score", 1)]);

    let correlation = &output.correlations[0];
    assert_eq!(correlation.records, 3);
    assert_eq!(correlation.matrix.measures.len(), 6);
    let r = |a: &str, b: &str| correlation.matrix.get(a, b).unwrap();
    assert_relative_eq!(r("TALKSCORE_VOCAB", "TALKSCORE_OVERALL"), 1.0, epsilon = 1e-9);
    assert_relative_eq!(
        r("TALKSCORE_VOCAB", "TALKSCORE_PRONUNCIATION"),
        -1.0,
        epsilon = 1e-9
    );

    let means = &output.summaries[0].table;
    assert_eq!(means.cell("", "mean(TALKSCORE_OVERALL)").unwrap().text(), "70.00");
}

#[test]
fn test_candidate_info_reads_invitation_data() {
    let view = ViewConfig::candidate_info();
    assert_eq!(view.source, "TalkpushCI_data_fetch.csv");
    assert_eq!(view.schema.timestamp, "INVITATIONDT");
}

#[test]
fn test_view_survives_calendar_limit_reference() {
    let schema = ViewConfig::cefr_dive().schema;
    let records = vec![Record::new(
        "-262143-01-01",
        vec![Some("B2".to_string())],
        vec![Some(70.0)],
    )];
    let set = RecordSet::new(schema, records).unwrap();
    let output = ViewConfig::cefr_dive().evaluate(&set).unwrap();
    assert_eq!(output.pipeline.report.bucketed, 1);
    assert!(output.pipeline.report.is_complete());
}
