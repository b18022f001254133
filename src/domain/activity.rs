/// Request code the purchase flow is launched with.
pub const PURCHASE_FLOW_REQUEST_CODE: i32 = 32459;
/// Host-level result code for a flow that finished normally.
pub const RESULT_OK: i32 = -1;
/// Host-level result code for a flow the user backed out of.
pub const RESULT_CANCELED: i32 = 0;
/// Store response code meaning success.
pub const BILLING_RESPONSE_RESULT_OK: i32 = 0;

/// Result of a purchase-flow activity as delivered by the host environment.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct ActivityResult {
    pub request_code: i32,
    pub result_code: i32,
    /// `RESPONSE_CODE` extra attached by the store, if any.
    pub response_code: Option<i32>,
}

impl ActivityResult {
    pub fn new(request_code: i32, result_code: i32, response_code: Option<i32>) -> Self {
        Self {
            request_code,
            result_code,
            response_code,
        }
    }

    /// Store response code, defaulting to success when the extra is missing.
    pub fn response_code_or_ok(&self) -> i32 {
        self.response_code.unwrap_or(BILLING_RESPONSE_RESULT_OK)
    }

    pub fn is_success(&self) -> bool {
        self.result_code == RESULT_OK && self.response_code_or_ok() == BILLING_RESPONSE_RESULT_OK
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_response_code_defaults_to_ok() {
        let result = ActivityResult::new(PURCHASE_FLOW_REQUEST_CODE, RESULT_OK, None);
        assert!(result.is_success());
    }

    #[test]
    fn test_canceled_or_failed_is_not_success() {
        assert!(!ActivityResult::new(PURCHASE_FLOW_REQUEST_CODE, RESULT_CANCELED, None).is_success());
        assert!(!ActivityResult::new(PURCHASE_FLOW_REQUEST_CODE, RESULT_OK, Some(7)).is_success());
    }
}
