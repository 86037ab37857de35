use thiserror::Error;

/// Failures that abort a plan run. A plan naming an unknown operator or
/// aggregation will never succeed until the plan itself changes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("Unsupported filter operation: {0}")]
    UnsupportedOperation(String),
    #[error("Unsupported aggregation function: {0}")]
    UnsupportedAggregation(String),
}
