use super::codes::ErrorCode;
use super::product::TransactionRecord;
use crate::error::StoreFault;
use serde::{Serialize, Serializer};
use std::fmt;

/// Request categories that may have at most one outstanding instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationClass {
    Open,
    /// Purchases, subscriptions and subscription updates share one slot
    /// because the store runs a single purchase flow at a time.
    PurchaseOrSubscribe,
}

impl OperationClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::PurchaseOrSubscribe => "purchase-or-subscribe",
        }
    }
}

impl fmt::Display for OperationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value a purchase-flow request settles with.
#[derive(Debug, Clone, PartialEq)]
pub enum PurchaseOutcome {
    /// The collaborator reported the purchase with matching transaction data.
    Completed(TransactionRecord),
    /// The flow result was interpreted locally (short-circuit mode); no
    /// transaction data is available.
    Acknowledged,
}

impl PurchaseOutcome {
    pub fn transaction(&self) -> Option<&TransactionRecord> {
        match self {
            Self::Completed(record) => Some(record),
            Self::Acknowledged => None,
        }
    }
}

impl Serialize for PurchaseOutcome {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Completed(record) => record.serialize(serializer),
            Self::Acknowledged => serializer.serialize_bool(true),
        }
    }
}

/// Success side of a settled completion handle.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Opened,
    Purchase(PurchaseOutcome),
}

/// Failure side of a settled completion handle.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub code: ErrorCode,
    pub message: String,
    pub cause: Option<StoreFault>,
}

impl Rejection {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            cause: None,
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unknown, message)
    }

    pub fn with_cause(mut self, cause: Option<StoreFault>) -> Self {
        self.cause = cause;
        self
    }
}

/// What a completion handle is settled with: exactly one of these, once.
pub type Settlement = Result<Resolution, Rejection>;
