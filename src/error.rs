use crate::domain::codes::ErrorCode;
use crate::domain::operation::{OperationClass, Rejection};
use thiserror::Error;

/// Failure reported by the billing collaborator itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct StoreFault {
    pub message: String,
}

impl StoreFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum BillingError {
    #[error(
        "InAppBilling is not available. InAppBilling will not work/test on an emulator, only a physical device."
    )]
    NoEmulator,
    #[error("Channel is already open. Call close() on InAppBilling to be able to open().")]
    AlreadyOpen,
    #[error("Channel is not opened. Call open() on InAppBilling.")]
    NotConnected,
    #[error("Previous {0} operation is not resolved.")]
    PreviousNotResolved(OperationClass),
    #[error("{message}")]
    Rejected {
        code: ErrorCode,
        message: String,
        #[source]
        cause: Option<StoreFault>,
    },
    #[error("Pending {0} operation was abandoned when the channel was reset.")]
    Abandoned(OperationClass),
    #[error("Invalid command: {0}")]
    InvalidCommand(String),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl BillingError {
    /// Code from the stable vocabulary callers branch on.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NoEmulator => ErrorCode::NoEmulator,
            Self::AlreadyOpen | Self::NotConnected => ErrorCode::Connection,
            Self::Rejected { code, .. } => *code,
            Self::PreviousNotResolved(_)
            | Self::Abandoned(_)
            | Self::InvalidCommand(_)
            | Self::CsvError(_)
            | Self::IoError(_)
            | Self::JsonError(_) => ErrorCode::Unknown,
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Rejection::unknown(message).into()
    }
}

impl From<Rejection> for BillingError {
    fn from(rejection: Rejection) -> Self {
        Self::Rejected {
            code: rejection.code,
            message: rejection.message,
            cause: rejection.cause,
        }
    }
}

pub type Result<T> = std::result::Result<T, BillingError>;
