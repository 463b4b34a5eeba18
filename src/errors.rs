//! Unified error types and result handling.
//!
//! Every fallible operation in the crate returns [`Result`]. Pure calculators never
//! produce [`Error::Database`]; only orchestration functions that touch the store do.

use crate::core::balance::SaveWarning;
use crate::entities::TransactionStatus;
use chrono::NaiveDate;
use sea_orm::DbErr;
use thiserror::Error;

/// Broad classification of an [`Error`], so callers can decide between
/// showing a message, asking the user to choose, or retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input; nothing was changed
    Validation,
    /// Needs a caller decision (switch to edit, confirm, abort)
    Conflict,
    /// A referenced record does not exist
    NotFound,
    /// The store failed
    Persistence,
    /// Configuration, I/O and other ambient failures
    Internal,
}

/// Application error type
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be read or parsed
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// A required field is missing or malformed
    #[error("Validation error: {message}")]
    Validation {
        /// What went wrong
        message: String,
    },

    /// Amount is not a finite number or is out of range
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected amount
        amount: f64,
    },

    /// No bus with this plate
    #[error("Bus not found: {plate}")]
    BusNotFound {
        /// License plate that was looked up
        plate: String,
    },

    /// No transaction with this id
    #[error("Transaction not found: {id}")]
    TransactionNotFound {
        /// Transaction id that was looked up
        id: i64,
    },

    /// A new transaction targets a date that already has one
    #[error("A transaction already exists for {date} (id {existing_id})")]
    DuplicateDate {
        /// Conflicting date
        date: NaiveDate,
        /// Id of the record already stored for that date
        existing_id: i64,
    },

    /// Saving needs explicit confirmation of the listed warnings
    #[error("Confirmation required: {}", describe_warnings(.warnings))]
    ConfirmationRequired {
        /// Warnings the caller must acknowledge
        warnings: Vec<SaveWarning>,
    },

    /// Paid transactions are locked against deletion
    #[error("Transaction {id} is paid and cannot be deleted")]
    TransactionPaid {
        /// Transaction id
        id: i64,
    },

    /// Status change not allowed by the lifecycle
    #[error("Transaction {id} cannot move from {from} to {to}")]
    InvalidStatusTransition {
        /// Transaction id
        id: i64,
        /// Current status
        from: TransactionStatus,
        /// Requested status
        to: TransactionStatus,
    },

    /// A cycle for this month already exists
    #[error("Payment cycle {cycle_id} already exists")]
    CycleExists {
        /// Cycle id (`YYYY.MM`)
        cycle_id: String,
    },

    /// No cycle with this id
    #[error("Payment cycle not found: {cycle_id}")]
    CycleNotFound {
        /// Cycle id (`YYYY.MM`)
        cycle_id: String,
    },

    /// The cycle policy forbids changing this cycle
    #[error("Payment cycle {cycle_id} is locked; only {latest} can be changed")]
    CycleLocked {
        /// Cycle that was targeted
        cycle_id: String,
        /// The cycle that may still be changed
        latest: String,
    },

    /// Writing one member of a cycle failed; the whole batch was rolled back
    #[error("Failed to update transaction {transaction_id} for cycle {cycle_id}: {source}")]
    CycleMemberUpdate {
        /// Cycle being changed
        cycle_id: String,
        /// Transaction whose write failed
        transaction_id: i64,
        /// Underlying store error
        #[source]
        source: DbErr,
    },

    /// Underlying store error
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV writer error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Environment variable error
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),
}

impl Error {
    /// Classifies the error into validation, conflict, not-found, persistence or internal.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } | Self::InvalidAmount { .. } => ErrorKind::Validation,
            Self::DuplicateDate { .. }
            | Self::ConfirmationRequired { .. }
            | Self::TransactionPaid { .. }
            | Self::InvalidStatusTransition { .. }
            | Self::CycleExists { .. }
            | Self::CycleLocked { .. } => ErrorKind::Conflict,
            Self::BusNotFound { .. }
            | Self::TransactionNotFound { .. }
            | Self::CycleNotFound { .. } => ErrorKind::NotFound,
            Self::CycleMemberUpdate { .. } | Self::Database(_) => ErrorKind::Persistence,
            Self::Config { .. } | Self::Io(_) | Self::Csv(_) | Self::EnvVar(_) => {
                ErrorKind::Internal
            }
        }
    }
}

fn describe_warnings(warnings: &[SaveWarning]) -> String {
    warnings
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let validation = Error::Validation {
            message: "license plate is required".to_string(),
        };
        assert_eq!(validation.kind(), ErrorKind::Validation);

        let conflict = Error::CycleExists {
            cycle_id: "2024.05".to_string(),
        };
        assert_eq!(conflict.kind(), ErrorKind::Conflict);

        let missing = Error::TransactionNotFound { id: 7 };
        assert_eq!(missing.kind(), ErrorKind::NotFound);

        let store = Error::Database(DbErr::Custom("down".to_string()));
        assert_eq!(store.kind(), ErrorKind::Persistence);
    }

    #[test]
    fn test_confirmation_message_lists_warnings() {
        let err = Error::ConfirmationRequired {
            warnings: vec![SaveWarning::EmptyFinancials, SaveWarning::NegativeFixedExpense {
                fixed_expense: -20.0,
            }],
        };
        let message = err.to_string();
        assert!(message.contains("no financial data"));
        assert!(message.contains("-20"));
    }
}
