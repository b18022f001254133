#![allow(dead_code)]

use async_trait::async_trait;
use billing_bridge::application::bridge::BillingBridge;
use billing_bridge::config::BridgeConfig;
use billing_bridge::domain::activity::ActivityResult;
use billing_bridge::domain::operation::OperationClass;
use billing_bridge::domain::ports::{
    BillingConnection, BillingEvent, BillingHandler, BillingService,
};
use billing_bridge::domain::product::{
    PurchaseData, PurchaseInfo, PurchaseState, SkuDetails, TransactionDetails,
};
use billing_bridge::error::StoreFault;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Collaborator whose callbacks are fired by the test, not by itself.
#[derive(Default)]
pub struct ScriptedState {
    pub handler: Option<Arc<dyn BillingHandler>>,
    pub calls: Vec<String>,
    pub connects: usize,
    pub releases: usize,
    pub refuse_flows: bool,
    pub transactions: HashMap<String, TransactionDetails>,
    pub listings: Option<Vec<SkuDetails>>,
    pub activity_results: Vec<ActivityResult>,
}

#[derive(Clone)]
pub struct ScriptedService {
    pub available: bool,
    pub connect_failure: Option<String>,
    pub auto_initialize: bool,
    pub state: Arc<Mutex<ScriptedState>>,
}

impl Default for ScriptedService {
    fn default() -> Self {
        Self {
            available: true,
            connect_failure: None,
            auto_initialize: true,
            state: Arc::default(),
        }
    }
}

impl ScriptedService {
    pub fn state(&self) -> std::sync::MutexGuard<'_, ScriptedState> {
        self.state.lock().unwrap()
    }

    /// Fires `event` through the handler captured on the last connect.
    pub fn emit(&self, event: BillingEvent) {
        let handler = self.state().handler.clone().expect("bridge never connected");
        handler.handle(event);
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    fn record(&self, call: String) {
        self.state().calls.push(call);
    }
}

#[async_trait]
impl BillingService for ScriptedService {
    fn is_service_available(&self) -> bool {
        self.available
    }

    async fn connect(
        &self,
        license_key: &str,
        handler: Arc<dyn BillingHandler>,
    ) -> Result<Arc<dyn BillingConnection>, StoreFault> {
        self.record(format!("connect:{license_key}"));
        if let Some(message) = &self.connect_failure {
            return Err(StoreFault::new(message.clone()));
        }
        {
            let mut state = self.state();
            state.connects += 1;
            state.handler = Some(handler.clone());
        }
        if self.auto_initialize {
            handler.handle(BillingEvent::Initialized);
        }
        Ok(Arc::new(self.clone()))
    }
}

#[async_trait]
impl BillingConnection for ScriptedService {
    async fn release(&self) {
        self.record("release".to_string());
        self.state().releases += 1;
    }

    async fn load_owned_purchases(&self) -> bool {
        self.record("load_owned_purchases".to_string());
        true
    }

    async fn purchase(&self, product_id: &str, developer_payload: Option<&str>) -> bool {
        self.record(format!("purchase:{product_id}:{}", developer_payload.unwrap_or("")));
        !self.state().refuse_flows
    }

    async fn subscribe(&self, product_id: &str, developer_payload: Option<&str>) -> bool {
        self.record(format!("subscribe:{product_id}:{}", developer_payload.unwrap_or("")));
        !self.state().refuse_flows
    }

    async fn update_subscription(
        &self,
        old_product_ids: &[String],
        product_id: &str,
        _developer_payload: Option<&str>,
    ) -> bool {
        self.record(format!(
            "update_subscription:{}->{product_id}",
            old_product_ids.join(",")
        ));
        !self.state().refuse_flows
    }

    async fn consume_purchase(&self, product_id: &str) -> Result<bool, StoreFault> {
        if product_id == "faulty" {
            return Err(StoreFault::new("consume exploded"));
        }
        Ok(self.state().transactions.remove(product_id).is_some())
    }

    async fn is_subscribed(&self, product_id: &str) -> bool {
        self.state().transactions.contains_key(product_id)
    }

    async fn is_purchased(&self, product_id: &str) -> bool {
        self.state().transactions.contains_key(product_id)
    }

    async fn is_one_time_purchase_supported(&self) -> bool {
        true
    }

    async fn is_valid_transaction_details(&self, details: &TransactionDetails) -> bool {
        details.purchase_info.signature.is_some()
    }

    async fn list_owned_products(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.state().transactions.keys().cloned().collect();
        ids.sort();
        ids
    }

    async fn list_owned_subscriptions(&self) -> Vec<String> {
        Vec::new()
    }

    async fn purchase_listing_details(
        &self,
        _product_ids: &[String],
    ) -> Result<Option<Vec<SkuDetails>>, StoreFault> {
        Ok(self.state().listings.clone())
    }

    async fn subscription_listing_details(
        &self,
        _product_ids: &[String],
    ) -> Result<Option<Vec<SkuDetails>>, StoreFault> {
        Err(StoreFault::new("listing service down"))
    }

    async fn purchase_transaction_details(&self, product_id: &str) -> Option<TransactionDetails> {
        self.state().transactions.get(product_id).cloned()
    }

    async fn subscription_transaction_details(
        &self,
        product_id: &str,
    ) -> Option<TransactionDetails> {
        self.state().transactions.get(product_id).cloned()
    }

    async fn handle_activity_result(&self, result: &ActivityResult) -> bool {
        self.state().activity_results.push(*result);
        true
    }
}

pub fn transaction(product_id: &str) -> TransactionDetails {
    TransactionDetails {
        purchase_info: PurchaseInfo {
            response_data: format!("{{\"productId\":\"{product_id}\"}}"),
            signature: Some("signature".to_string()),
            purchase_data: PurchaseData {
                order_id: format!("GPA.{product_id}"),
                package_name: "com.example".to_string(),
                product_id: product_id.to_string(),
                purchase_time: None,
                purchase_state: Some(PurchaseState::PurchasedSuccessfully),
                developer_payload: Some("payload".to_string()),
                purchase_token: format!("token-{product_id}"),
                auto_renewing: false,
            },
        },
    }
}

pub fn bridge_with(service: &ScriptedService) -> Arc<BillingBridge> {
    Arc::new(BillingBridge::new(
        Arc::new(service.clone()),
        BridgeConfig::new("test-key"),
    ))
}

/// Waits until a handle for `class` is pending on `bridge`.
pub async fn wait_for_pending(bridge: &BillingBridge, class: OperationClass) {
    for _ in 0..200 {
        if bridge.registry().has(class) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("no {class} handle became pending");
}
