//! Property-based tests for bucketing, aggregation and pivot invariants.
//!
//! - Bucketing is a pure function and lands on the bucket anchor
//! - Every record is reported exactly once
//! - Aggregates and pivot columns do not depend on input order
//! - Ratios are never NaN or infinite

use chrono::{Datelike, Days, NaiveDate, Weekday};
use proptest::prelude::*;
use tempora_core::prelude::*;
use tempora_core::ratio::safe_percentage;

// =============================================================================
// STRATEGIES
// =============================================================================

fn date_strategy() -> impl Strategy<Value = NaiveDate> {
    // 2020-01-01 plus up to ~6 years
    (0u64..2200).prop_map(|offset| {
        NaiveDate::from_ymd_opt(2020, 1, 1)
            .and_then(|d| d.checked_add_days(Days::new(offset)))
            .unwrap()
    })
}

fn weekday_strategy() -> impl Strategy<Value = Weekday> {
    prop::sample::select(vec![
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ])
}

#[derive(Debug, Clone)]
struct Row {
    timestamp: String,
    site: Option<String>,
    score: Option<f64>,
}

fn row_strategy() -> impl Strategy<Value = Row> {
    (
        prop_oneof![
            8 => date_strategy().prop_map(|d| d.format("%Y-%m-%d").to_string()),
            1 => Just("not a timestamp".to_string()),
        ],
        prop::option::of(prop::sample::select(vec!["A", "B", "C", "D"])),
        prop::option::of(-100.0f64..100.0),
    )
        .prop_map(|(timestamp, site, score)| Row {
            timestamp,
            site: site.map(String::from),
            score,
        })
}

fn record_set(rows: &[Row]) -> RecordSet {
    let schema = RecordSchema::new("DATE_DAY")
        .with_dimension("CAMP_SITE")
        .with_measure("SCORE");
    let records = rows
        .iter()
        .map(|r| Record::new(r.timestamp.clone(), vec![r.site.clone()], vec![r.score]))
        .collect();
    RecordSet::new(schema, records).unwrap()
}

fn request() -> AggregateRequest {
    AggregateRequest::new()
        .with_measure("SCORE")
        .with_grouping(Grouping::period_only())
        .group_by("CAMP_SITE")
}

// =============================================================================
// PROPERTIES
// =============================================================================

proptest! {
    #[test]
    fn property_bucketing_is_pure(date in date_strategy(), week_ending in weekday_strategy()) {
        let bucketer = PeriodBucketer::new().with_week_ending(week_ending);
        let ts = Timestamp::from_date(Date::from(date));
        for granularity in Granularity::all() {
            prop_assert_eq!(bucketer.bucket(ts, *granularity), bucketer.bucket(ts, *granularity));
        }
    }

    #[test]
    fn property_bucket_anchor(date in date_strategy(), week_ending in weekday_strategy()) {
        let bucketer = PeriodBucketer::new().with_week_ending(week_ending);
        let day = Date::from(date);

        let week = bucketer.bucket_date(day, Granularity::Week).start();
        prop_assert_eq!(week.weekday(), week_ending);
        let ahead = day.days_between(&week);
        prop_assert!((0..7).contains(&ahead), "week anchor {} days ahead", ahead);

        let month = bucketer.bucket_date(day, Granularity::Month).start();
        prop_assert_eq!(month.as_naive_date().day(), 1);
        prop_assert_eq!(month.as_naive_date().month(), date.month());
        prop_assert_eq!(month.as_naive_date().year(), date.year());
    }

    #[test]
    fn property_every_record_accounted(rows in prop::collection::vec(row_strategy(), 0..60)) {
        let set = record_set(&rows);
        let config = PipelineConfig::new(TimeWindow::Last12Weeks)
            .with_filter(RecordFilter::measure_above("SCORE", 0.0));
        let output = Pipeline::run(&set, &config, &request()).unwrap();

        prop_assert!(output.report.is_complete());
        let bucketed: usize = output
            .aggregates
            .period_totals()
            .unwrap()
            .rows
            .iter()
            .map(|r| r.record_count)
            .sum();
        prop_assert_eq!(bucketed, output.report.bucketed);
    }

    #[test]
    fn property_aggregation_order_independent(
        rows in prop::collection::vec(row_strategy(), 1..60),
        rotate in 0usize..60,
    ) {
        let mut permuted = rows.clone();
        permuted.reverse();
        let k = rotate % permuted.len();
        permuted.rotate_left(k);

        let config = PipelineConfig::new(TimeWindow::AllTime);
        let a = Pipeline::run(&record_set(&rows), &config, &request()).unwrap();
        let b = Pipeline::run(&record_set(&permuted), &config, &request()).unwrap();
        prop_assert_eq!(
            serde_json::to_string(&a.aggregates).unwrap(),
            serde_json::to_string(&b.aggregates).unwrap()
        );
    }

    #[test]
    fn property_pivot_columns_invariant_under_row_order(
        rows in prop::collection::vec(row_strategy(), 1..60),
        rotate in 0usize..60,
    ) {
        let output = Pipeline::run(
            &record_set(&rows),
            &PipelineConfig::new(TimeWindow::AllTime),
            &request(),
        )
        .unwrap();
        let aggregates = output.aggregates.by_dimension("CAMP_SITE").unwrap();
        let mut shuffled = aggregates.clone();
        shuffled.rows.reverse();
        if !shuffled.rows.is_empty() {
            let k = rotate % shuffled.rows.len();
            shuffled.rows.rotate_left(k);
        }

        let metrics = [Metric::RecordCount, Metric::mean("SCORE")];
        let reshaper = PivotReshaper::new();
        let expected = reshaper.reshape(aggregates, &metrics).unwrap();
        let actual = reshaper.reshape(&shuffled, &metrics).unwrap();
        prop_assert_eq!(&expected, &actual);

        let instants: Vec<_> = expected.columns.iter().map(|c| c.period.start()).collect();
        let mut sorted = instants.clone();
        sorted.sort();
        prop_assert_eq!(instants, sorted);
    }

    #[test]
    fn property_safe_divide(n in prop::option::of(any::<f64>()), d in prop::option::of(any::<f64>())) {
        if let Some(v) = safe_percentage(n, d) {
            prop_assert!(v.is_finite());
        }
        if d == Some(0.0) {
            prop_assert_eq!(safe_percentage(n, d), None);
        }
    }
}
