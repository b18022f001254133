use crate::domain::activity::PURCHASE_FLOW_REQUEST_CODE;

/// Environment variable holding the store license key.
pub const LICENSE_KEY_ENV: &str = "RNB_GOOGLE_PLAY_LICENSE_KEY";

/// Settings the bridge is constructed with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Public license key handed to the collaborator on `open()`.
    pub license_key: String,
    /// Request code purchase-flow activity results are matched against in
    /// short-circuit mode.
    pub purchase_flow_request_code: i32,
    /// Initial short-circuit setting; can be toggled at runtime.
    pub short_circuit: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            license_key: String::new(),
            purchase_flow_request_code: PURCHASE_FLOW_REQUEST_CODE,
            short_circuit: false,
        }
    }
}

impl BridgeConfig {
    pub fn new(license_key: impl Into<String>) -> Self {
        Self {
            license_key: license_key.into(),
            ..Self::default()
        }
    }

    /// Reads the license key from `RNB_GOOGLE_PLAY_LICENSE_KEY`, leaving it
    /// empty when unset.
    pub fn from_env() -> Self {
        Self::new(std::env::var(LICENSE_KEY_ENV).unwrap_or_default())
    }

    pub fn with_short_circuit(mut self, enabled: bool) -> Self {
        self.short_circuit = enabled;
        self
    }

    pub fn with_request_code(mut self, request_code: i32) -> Self {
        self.purchase_flow_request_code = request_code;
        self
    }
}
