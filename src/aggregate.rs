//! Group-by and aggregation over plan records.
//!
//! Rows are bucketed by the stringified values of the group-by columns and
//! buckets are emitted in first-seen order. Every aggregation reads cells
//! through [`Value::parse_float`], so numeric coercion rules live in one place.
//!
//! `min` and `max` over a bucket with no numeric cells stay at their identity
//! (`+inf` and `-inf` respectively). JSON has no infinity, so those cells are
//! written as `null` in JSON output.

use std::collections::{HashMap, HashSet};

use itertools::Itertools;
use log::debug;

use crate::{
    data::{Record, Value},
    error::PlanError,
    plan::{AggregateFunction, AggregateSpec},
};

/// Group key component; `None` stands for an absent or null cell so it can
/// never collide with any text value.
type KeyPart = Option<String>;

pub fn group_and_aggregate(
    rows: Vec<Record>,
    by: &[String],
    aggs: &[AggregateSpec],
) -> Result<Vec<Record>, PlanError> {
    let resolved = aggs
        .iter()
        .map(|agg| Ok((agg.function.parse::<AggregateFunction>()?, agg.col.as_str())))
        .collect::<Result<Vec<_>, PlanError>>()?;

    let buckets = partition(rows, by);
    debug!(
        "Grouped by {:?} into {} bucket(s) with {} aggregation(s)",
        by,
        buckets.len(),
        resolved.len()
    );

    Ok(buckets
        .iter()
        .map(|bucket| {
            let mut output = Record::new();
            if let Some(first) = bucket.first() {
                for column in by {
                    if let Some(value) = first.get(column) {
                        output.insert(column.clone(), value.clone());
                    }
                }
            }
            for (function, column) in &resolved {
                let value = aggregate_bucket(*function, bucket, column);
                output.insert(column.to_string(), Value::Number(value));
            }
            output
        })
        .collect())
}

fn partition(rows: Vec<Record>, by: &[String]) -> Vec<Vec<Record>> {
    let mut positions: HashMap<Vec<KeyPart>, usize> = HashMap::new();
    let mut buckets: Vec<Vec<Record>> = Vec::new();
    for row in rows {
        let key = by
            .iter()
            .map(|column| match row.get(column) {
                None | Some(Value::Null) => None,
                Some(value) => Some(value.as_display()),
            })
            .collect::<Vec<_>>();
        let position = *positions.entry(key).or_insert_with(|| {
            buckets.push(Vec::new());
            buckets.len() - 1
        });
        buckets[position].push(row);
    }
    buckets
}

pub fn aggregate_bucket(function: AggregateFunction, bucket: &[Record], column: &str) -> f64 {
    let parsed = || parsed_cells(bucket, column);
    match function {
        AggregateFunction::Count | AggregateFunction::Size => bucket.len() as f64,
        AggregateFunction::Sum => parsed().map(|value| value.unwrap_or(0.0)).sum(),
        AggregateFunction::Mean => {
            let sum: f64 = parsed().map(|value| value.unwrap_or(0.0)).sum();
            sum / bucket.len() as f64
        }
        AggregateFunction::Median => median(parsed().map(|value| value.unwrap_or(0.0))),
        AggregateFunction::Min => parsed()
            .map(|value| value.unwrap_or(f64::INFINITY))
            .fold(f64::INFINITY, f64::min),
        AggregateFunction::Max => parsed()
            .map(|value| value.unwrap_or(f64::NEG_INFINITY))
            .fold(f64::NEG_INFINITY, f64::max),
        AggregateFunction::NUnique => bucket
            .iter()
            .map(|row| distinct_key(row.get(column)))
            .collect::<HashSet<_>>()
            .len() as f64,
    }
}

fn parsed_cells<'a>(bucket: &'a [Record], column: &'a str) -> impl Iterator<Item = Option<f64>> + 'a {
    bucket
        .iter()
        .map(move |row| row.get(column).and_then(Value::parse_float))
}

fn median(values: impl Iterator<Item = f64>) -> f64 {
    let sorted = values.sorted_by(|a, b| a.total_cmp(b)).collect::<Vec<_>>();
    if sorted.is_empty() {
        return f64::NAN;
    }
    let mid = sorted.len() / 2;
    if sorted.len().is_multiple_of(2) {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Identity of a raw cell for distinct counting: variant plus textual form.
fn distinct_key(value: Option<&Value>) -> (u8, String) {
    match value {
        None | Some(Value::Null) => (0, String::new()),
        Some(Value::Boolean(b)) => (1, b.to_string()),
        Some(Value::Number(n)) => (2, crate::data::format_number(*n)),
        Some(Value::Text(s)) => (3, s.clone()),
    }
}
