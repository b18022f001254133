use serde::{Serialize, Serializer};
use std::fmt;

/// Stable error vocabulary handed to callers.
///
/// Downstream consumers branch on the string form, so `as_str` must never
/// change for an existing variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    UserCanceled,
    ServiceUnavailable,
    BillingUnavailable,
    ItemUnavailable,
    DeveloperError,
    ApiError,
    ItemAlreadyOwned,
    ItemNotOwned,
    NoEmulator,
    Connection,
    Unknown,
}

impl ErrorCode {
    /// Translates a store response code into the stable vocabulary.
    ///
    /// Codes outside the known table (including `0`, which is success on the
    /// store side) map to [`ErrorCode::Unknown`].
    pub fn from_response_code(code: i32) -> Self {
        match code {
            1 => Self::UserCanceled,
            2 => Self::ServiceUnavailable,
            3 => Self::BillingUnavailable,
            4 => Self::ItemUnavailable,
            5 => Self::DeveloperError,
            6 => Self::ApiError,
            7 => Self::ItemAlreadyOwned,
            8 => Self::ItemNotOwned,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserCanceled => "E_USER_CANCELED",
            Self::ServiceUnavailable => "E_SERVICE_UNAVAILABLE",
            Self::BillingUnavailable => "E_BILLING_UNAVAILABLE",
            Self::ItemUnavailable => "E_ITEM_UNAVAILABLE",
            Self::DeveloperError => "E_DEVELOPER_ERROR",
            Self::ApiError => "E_API_ERROR",
            Self::ItemAlreadyOwned => "E_ITEM_ALREADY_OWNED",
            Self::ItemNotOwned => "E_ITEM_NOT_OWNED",
            Self::NoEmulator => "E_NO_EMULATOR",
            Self::Connection => "E_CONNECTION",
            Self::Unknown => "E_UNKNOWN",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_code_table() {
        let expected = [
            (1, "E_USER_CANCELED"),
            (2, "E_SERVICE_UNAVAILABLE"),
            (3, "E_BILLING_UNAVAILABLE"),
            (4, "E_ITEM_UNAVAILABLE"),
            (5, "E_DEVELOPER_ERROR"),
            (6, "E_API_ERROR"),
            (7, "E_ITEM_ALREADY_OWNED"),
            (8, "E_ITEM_NOT_OWNED"),
        ];
        for (code, name) in expected {
            assert_eq!(ErrorCode::from_response_code(code).as_str(), name);
        }
    }

    #[test]
    fn test_unmapped_codes_are_unknown() {
        for code in [-1, 0, 9, 42, i32::MAX] {
            assert_eq!(ErrorCode::from_response_code(code), ErrorCode::Unknown);
        }
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let json = serde_json::to_string(&ErrorCode::ItemAlreadyOwned).unwrap();
        assert_eq!(json, "\"E_ITEM_ALREADY_OWNED\"");
    }
}
