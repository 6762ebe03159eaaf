use chrono::NaiveDate;
use thiserror::Error;

/// Failures reported by the external loan store.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("loan {0} does not exist in the store")]
    NotFound(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EmiError {
    #[error("invalid loan data: {0}")]
    Validation(String),

    #[error("installments have not started yet, the first one is due on {0}")]
    NotStarted(NaiveDate),

    #[error("the installment for {0} has already been paid")]
    AlreadyPaid(String),

    #[error("the next installment falls due on {0}, not in the current month")]
    NotDue(NaiveDate),

    #[error("all {0} installments are already paid")]
    Overpaid(u32),

    #[error("loan {0} not found")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, EmiError>;
