//! Rule engine errors

use rules_core::EventError;
use rules_item_registry::RegistryError;
use thiserror::Error;

/// Errors raised while building or running rules
///
/// None of these escape `Rule::execute`; they are logged at the rule
/// boundary.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Event(#[from] EventError),

    #[error("failed to schedule timer: {0}")]
    Scheduling(String),

    #[error("{item} has non-numeric state {state}")]
    NotNumeric { item: String, state: String },
}

/// Result type for rule operations
pub type RuleResult<T> = Result<T, RuleError>;
