use std::error::Error as StdError;

use sea_orm::DbErr;
use thiserror::Error;

/// Boxed error used for caller-supplied failures (units of work, shutdown callbacks).
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Failure of a [`TxManager`](crate::db::txn::TxManager) call.
///
/// Exactly one of these is surfaced per top-level `run_in_transaction`. Caller
/// error enums embed it with `#[from]` so units can keep returning their own
/// error type.
#[derive(Debug, Error)]
pub enum TxError {
    #[error("failed to begin transaction: {0}")]
    Begin(#[source] DbErr),

    #[error("unit of work `{unit}` failed: {source}")]
    Unit {
        unit: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("unit of work `{unit}` panicked: {payload}")]
    Panic { unit: &'static str, payload: String },

    #[error("failed to commit transaction: {0}")]
    Commit(#[source] DbErr),

    #[error("{}", rollback_message(.source, .cause.as_deref()))]
    Rollback {
        #[source]
        source: DbErr,
        cause: Option<Box<TxError>>,
    },
}

fn rollback_message(source: &DbErr, cause: Option<&TxError>) -> String {
    match cause {
        Some(cause) => format!("{cause}; rollback error: {source}"),
        None => format!("failed to roll back transaction: {source}"),
    }
}

impl TxError {
    /// The name of the unit of work this error came from, if any.
    pub fn unit(&self) -> Option<&'static str> {
        match self {
            TxError::Unit { unit, .. } | TxError::Panic { unit, .. } => Some(*unit),
            TxError::Rollback {
                cause: Some(cause), ..
            } => cause.unit(),
            _ => None,
        }
    }

    /// Look through unit and rollback wrapping for the error a unit returned.
    pub fn unit_error<T: StdError + 'static>(&self) -> Option<&T> {
        match self {
            TxError::Unit { source, .. } => source.downcast_ref::<T>(),
            TxError::Rollback {
                cause: Some(cause), ..
            } => cause.unit_error(),
            _ => None,
        }
    }

    pub fn is_panic(&self) -> bool {
        match self {
            TxError::Panic { .. } => true,
            TxError::Rollback {
                cause: Some(cause), ..
            } => cause.is_panic(),
            _ => false,
        }
    }
}

/// Errors from configuration, connection setup and signal registration.
#[derive(Debug, Error)]
pub enum InfraError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("failed to connect to database: {0}")]
    Connect(#[source] DbErr),

    #[error("failed to install signal handler: {0}")]
    Signal(#[source] std::io::Error),
}

impl InfraError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}
