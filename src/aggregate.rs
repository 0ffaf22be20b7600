//! Monthly rollup of the scored dataset.
//!
//! Groups scored records by (category, calendar month) and computes mean
//! confidence scores and row counts for the report renderer. Zeroed
//! `unknown` rows participate in the means like any other row.

use chrono::{Datelike, NaiveDate};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::info;

use crate::config::AggregateConfig;
use crate::dataset;
use crate::error::PipelineError;
use crate::records::{MonthlyAggregate, ScoredRecord};

/// Arithmetic mean; 0.0 for empty input.
fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Truncates a record date to the first day of its month. `None` dates
/// stay `None` and form their own bucket.
pub fn month_bucket(date: Option<NaiveDate>) -> Option<NaiveDate> {
    date.and_then(|d| NaiveDate::from_ymd_opt(d.year(), d.month(), 1))
}

/// Category ascending, then month ascending with the null month last.
fn aggregate_order(a: &MonthlyAggregate, b: &MonthlyAggregate) -> Ordering {
    a.category.cmp(&b.category).then_with(|| match (a.month, b.month) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    })
}

#[derive(Default)]
struct Group {
    pos: Vec<f64>,
    neu: Vec<f64>,
    neg: Vec<f64>,
}

/// Pure aggregation: a deterministic function of the scored record set.
pub fn aggregate_records(records: &[ScoredRecord]) -> Vec<MonthlyAggregate> {
    let mut groups: HashMap<(String, Option<NaiveDate>), Group> = HashMap::new();

    for scored in records {
        let key = (
            scored.record.category.clone(),
            month_bucket(scored.record.date),
        );
        let group = groups.entry(key).or_default();
        group.pos.push(scored.score.pos);
        group.neu.push(scored.score.neu);
        group.neg.push(scored.score.neg);
    }

    let mut rows: Vec<MonthlyAggregate> = groups
        .into_iter()
        .map(|((category, month), group)| MonthlyAggregate {
            category,
            month,
            pos: mean(&group.pos),
            neu: mean(&group.neu),
            neg: mean(&group.neg),
            count: group.pos.len(),
        })
        .collect();

    rows.sort_by(aggregate_order);
    rows
}

/// Runs the aggregator stage.
#[tracing::instrument(skip(cfg), fields(input = %cfg.input.display()))]
pub fn run(cfg: &AggregateConfig) -> Result<usize, PipelineError> {
    if !cfg.input.is_file() {
        return Err(PipelineError::Configuration(format!(
            "missing scored dataset {}; run the score stage first",
            cfg.input.display()
        )));
    }

    let records = dataset::read_scored(&cfg.input)?;
    let rows = aggregate_records(&records);

    dataset::ensure_parent_dir(&cfg.output)?;
    dataset::write_aggregates(&cfg.output, &rows)?;

    info!(
        records = records.len(),
        groups = rows.len(),
        output = %cfg.output.display(),
        "Aggregate table written"
    );
    Ok(rows.len())
}
