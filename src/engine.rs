//! Operation plan execution.
//!
//! [`run_plan`] walks the plan's steps in order over a working copy of the
//! input rows: filter steps narrow it immediately, while group-by and
//! aggregate steps are only recorded. Grouping happens once after the scan,
//! and only when both a key and an aggregate list were recorded. The result is
//! then projected onto the plan's `x` and `y` columns; any row missing one of
//! them is dropped.

use log::{debug, warn};

use crate::{
    aggregate,
    data::Record,
    error::PlanError,
    filter,
    plan::{AggregateSpec, OperationPlan, Step},
};

pub fn run_plan(rows: &[Record], plan: &OperationPlan) -> Result<Vec<Record>, PlanError> {
    let columns = plan.projection();
    if plan.ops.is_empty() {
        return Ok(project(rows.iter(), &columns));
    }

    let mut current = rows.to_vec();
    let mut group_by: Option<&[String]> = None;
    let mut aggregates: Option<&[AggregateSpec]> = None;

    for (idx, step) in plan.ops.iter().enumerate() {
        match step.interpret() {
            Step::Filter(conditions) => {
                current = filter::apply_filter(current, conditions)?;
            }
            Step::GroupBy(by) => group_by = Some(by),
            Step::Aggregate(aggs) => aggregates = Some(aggs),
            Step::Incomplete(name) => {
                debug!("Step {} ('{name}') has no payload; skipping", idx + 1);
            }
            Step::Unknown(name) => {
                warn!("Ignoring unknown plan step '{name}' at position {}", idx + 1);
            }
        }
    }

    match (group_by, aggregates) {
        (Some(by), Some(aggs)) => {
            current = aggregate::group_and_aggregate(current, by, aggs)?;
        }
        (Some(_), None) => debug!("Group-by without aggregate has no effect"),
        (None, Some(_)) => debug!("Aggregate without group-by has no effect"),
        (None, None) => {}
    }

    Ok(project(current.iter(), &columns))
}

/// Reduces each row to `columns`, in that key order, dropping rows where any
/// of them is absent or null.
pub fn project<'a>(rows: impl Iterator<Item = &'a Record>, columns: &[&str]) -> Vec<Record> {
    let mut dropped = 0usize;
    let projected = rows
        .filter_map(|row| {
            let projected = columns
                .iter()
                .map(|column| match row.get(*column) {
                    Some(value) if !value.is_null() => Some((column.to_string(), value.clone())),
                    _ => None,
                })
                .collect::<Option<Record>>();
            if projected.is_none() {
                dropped += 1;
            }
            projected
        })
        .collect::<Vec<_>>();
    if dropped > 0 {
        debug!("Dropped {dropped} incomplete row(s) during projection");
    }
    projected
}
