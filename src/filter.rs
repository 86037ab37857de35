use std::cmp::Ordering;

use log::debug;

use crate::{
    data::{Record, Value, loose_cmp, loose_eq, strict_eq},
    error::PlanError,
    plan::{Condition, FilterOperator, Operand},
};

/// A condition whose operator name has been resolved.
#[derive(Debug, Clone)]
pub struct FilterCondition<'a> {
    pub column: &'a str,
    pub operator: FilterOperator,
    pub operand: Option<&'a Operand>,
}

pub fn resolve_conditions(conditions: &[Condition]) -> Result<Vec<FilterCondition<'_>>, PlanError> {
    conditions
        .iter()
        .map(|condition| {
            Ok(FilterCondition {
                column: condition.col.as_str(),
                operator: condition.op.parse()?,
                operand: condition.val.as_ref(),
            })
        })
        .collect()
}

/// Keeps the rows satisfying every condition, in their original order.
/// Operator names are resolved up front so an unknown one fails the step
/// even when no rows remain.
pub fn apply_filter(rows: Vec<Record>, conditions: &[Condition]) -> Result<Vec<Record>, PlanError> {
    let resolved = resolve_conditions(conditions)?;
    let before = rows.len();
    let kept = rows
        .into_iter()
        .filter(|row| evaluate_conditions(&resolved, row))
        .collect::<Vec<_>>();
    debug!(
        "Filter with {} condition(s) kept {} of {} row(s)",
        resolved.len(),
        kept.len(),
        before
    );
    Ok(kept)
}

pub fn evaluate_conditions(conditions: &[FilterCondition<'_>], row: &Record) -> bool {
    conditions
        .iter()
        .all(|condition| evaluate_condition(condition, row))
}

fn evaluate_condition(condition: &FilterCondition<'_>, row: &Record) -> bool {
    let null = Value::Null;
    let cell = row.get(condition.column).unwrap_or(&null);

    use FilterOperator::*;
    match condition.operator {
        In | NotIn => {
            let members = condition.operand.map(Operand::members).unwrap_or_default();
            let found = members.iter().any(|member| strict_eq(cell, member));
            if matches!(condition.operator, In) { found } else { !found }
        }
        Contains | NotContains => {
            let needle = condition.operand.map(Operand::text).unwrap_or_default();
            let found = cell.as_display().contains(&needle);
            if matches!(condition.operator, Contains) { found } else { !found }
        }
        Eq => loose_eq(cell, &scalar_operand(condition)),
        NotEq => !loose_eq(cell, &scalar_operand(condition)),
        Gt => loose_cmp(cell, &scalar_operand(condition)) == Some(Ordering::Greater),
        Ge => matches!(
            loose_cmp(cell, &scalar_operand(condition)),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Lt => loose_cmp(cell, &scalar_operand(condition)) == Some(Ordering::Less),
        Le => matches!(
            loose_cmp(cell, &scalar_operand(condition)),
            Some(Ordering::Less | Ordering::Equal)
        ),
    }
}

fn scalar_operand(condition: &FilterCondition<'_>) -> Value {
    condition.operand.map(Operand::scalar).unwrap_or_default()
}
