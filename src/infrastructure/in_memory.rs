use crate::domain::activity::{ActivityResult, PURCHASE_FLOW_REQUEST_CODE, RESULT_CANCELED};
use crate::domain::ports::{BillingConnection, BillingEvent, BillingHandler, BillingService};
use crate::domain::product::{
    PurchaseData, PurchaseInfo, PurchaseState, SkuDetails, TransactionDetails,
};
use crate::error::{Result, StoreFault};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::sync::Arc;
use tokio::sync::RwLock;

const PACKAGE_NAME: &str = "com.example.billing";

// Store response codes the simulator produces.
const USER_CANCELED: i32 = 1;
const ITEM_UNAVAILABLE: i32 = 4;
const DEVELOPER_ERROR: i32 = 5;
const ITEM_ALREADY_OWNED: i32 = 7;
const ITEM_NOT_OWNED: i32 = 8;

/// Products offered by the simulated store, plus scripted failures.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    #[serde(default)]
    pub products: Vec<SkuDetails>,
    /// Response code a purchase flow for the given product fails with.
    #[serde(default)]
    pub failures: HashMap<String, i32>,
}

impl Catalog {
    /// Reads a catalog from JSON.
    pub fn from_reader<R: Read>(source: R) -> Result<Self> {
        Ok(serde_json::from_reader(source)?)
    }

    pub fn with_product(mut self, sku: SkuDetails) -> Self {
        self.products.push(sku);
        self
    }

    pub fn with_failure(mut self, product_id: impl Into<String>, code: i32) -> Self {
        self.failures.insert(product_id.into(), code);
        self
    }
}

/// How a launched purchase flow finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowCompletion {
    /// A spawned task completes the flow as if the user confirmed it.
    #[default]
    Automatic,
    /// The flow waits for [`BillingConnection::handle_activity_result`].
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlowKind {
    Purchase,
    Subscribe,
    Update,
}

#[derive(Debug, Clone)]
struct PendingFlow {
    kind: FlowKind,
    product_id: String,
    developer_payload: Option<String>,
    replaces: Vec<String>,
}

#[derive(Debug, Default)]
struct StoreState {
    catalog: HashMap<String, SkuDetails>,
    failures: HashMap<String, i32>,
    owned_products: BTreeMap<String, TransactionDetails>,
    owned_subscriptions: BTreeMap<String, TransactionDetails>,
    pending_flow: Option<PendingFlow>,
    next_order: u64,
    released: bool,
}

impl StoreState {
    fn listing(&self, product_ids: &[String], subscriptions: bool) -> Vec<SkuDetails> {
        product_ids
            .iter()
            .filter_map(|id| self.catalog.get(id))
            .filter(|sku| sku.is_subscription == subscriptions)
            .cloned()
            .collect()
    }

    /// Applies a confirmed flow, returning the new transaction or the store
    /// response code it fails with.
    fn settle_flow(
        &mut self,
        flow: &PendingFlow,
        license_key: &str,
    ) -> std::result::Result<TransactionDetails, i32> {
        if let Some(code) = self.failures.get(&flow.product_id) {
            return Err(*code);
        }
        let sku = self
            .catalog
            .get(&flow.product_id)
            .ok_or(ITEM_UNAVAILABLE)?;

        let wants_subscription = flow.kind != FlowKind::Purchase;
        if sku.is_subscription != wants_subscription {
            return Err(DEVELOPER_ERROR);
        }

        let owned = if wants_subscription {
            &self.owned_subscriptions
        } else {
            &self.owned_products
        };
        if owned.contains_key(&flow.product_id) {
            return Err(ITEM_ALREADY_OWNED);
        }

        if flow.kind == FlowKind::Update {
            if flow
                .replaces
                .iter()
                .any(|old| !self.owned_subscriptions.contains_key(old))
            {
                return Err(ITEM_NOT_OWNED);
            }
            for old in &flow.replaces {
                self.owned_subscriptions.remove(old);
            }
        }

        self.next_order += 1;
        let order = self.next_order;
        let purchase_data = PurchaseData {
            order_id: format!("GPA.SIM-{order:04}"),
            package_name: PACKAGE_NAME.to_string(),
            product_id: flow.product_id.clone(),
            purchase_time: Some(Utc::now()),
            purchase_state: Some(PurchaseState::PurchasedSuccessfully),
            developer_payload: flow.developer_payload.clone(),
            purchase_token: format!("token-{order}"),
            auto_renewing: wants_subscription,
        };
        let response_data = serde_json::to_string(&purchase_data).unwrap_or_default();
        let signature = (!license_key.is_empty()).then(|| format!("sim:{}", purchase_data.order_id));
        let details = TransactionDetails {
            purchase_info: PurchaseInfo {
                response_data,
                signature,
                purchase_data,
            },
        };

        let owned = if wants_subscription {
            &mut self.owned_subscriptions
        } else {
            &mut self.owned_products
        };
        owned.insert(flow.product_id.clone(), details.clone());
        Ok(details)
    }
}

/// In-memory stand-in for the device billing service.
///
/// Keeps a catalog and the owned items in memory and answers with the same
/// response codes a real store uses. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct InMemoryBillingService {
    available: bool,
    connect_failure: Option<String>,
    listing_failure: Option<String>,
    completion: FlowCompletion,
    state: Arc<RwLock<StoreState>>,
}

impl Default for InMemoryBillingService {
    fn default() -> Self {
        Self::new(Catalog::default())
    }
}

impl InMemoryBillingService {
    pub fn new(catalog: Catalog) -> Self {
        let state = StoreState {
            catalog: catalog
                .products
                .into_iter()
                .map(|sku| (sku.product_id.clone(), sku))
                .collect(),
            failures: catalog.failures,
            ..StoreState::default()
        };
        Self {
            available: true,
            connect_failure: None,
            listing_failure: None,
            completion: FlowCompletion::default(),
            state: Arc::new(RwLock::new(state)),
        }
    }

    pub fn with_availability(mut self, available: bool) -> Self {
        self.available = available;
        self
    }

    /// Makes every `connect` fail with `message`.
    pub fn with_connect_failure(mut self, message: impl Into<String>) -> Self {
        self.connect_failure = Some(message.into());
        self
    }

    /// Makes every listing query fail with `message`.
    pub fn with_listing_failure(mut self, message: impl Into<String>) -> Self {
        self.listing_failure = Some(message.into());
        self
    }

    pub fn with_completion(mut self, completion: FlowCompletion) -> Self {
        self.completion = completion;
        self
    }

    /// Whether the last connection handed out has been released.
    pub async fn is_released(&self) -> bool {
        self.state.read().await.released
    }

    pub async fn has_pending_flow(&self) -> bool {
        self.state.read().await.pending_flow.is_some()
    }
}

#[async_trait]
impl BillingService for InMemoryBillingService {
    fn is_service_available(&self) -> bool {
        self.available
    }

    async fn connect(
        &self,
        license_key: &str,
        handler: Arc<dyn BillingHandler>,
    ) -> std::result::Result<Arc<dyn BillingConnection>, StoreFault> {
        if let Some(message) = &self.connect_failure {
            return Err(StoreFault::new(message.clone()));
        }

        {
            let mut state = self.state.write().await;
            state.released = false;
            state.pending_flow = None;
        }

        let initialized = handler.clone();
        tokio::spawn(async move {
            initialized.handle(BillingEvent::Initialized);
        });

        Ok(Arc::new(InMemoryConnection {
            license_key: license_key.to_string(),
            listing_failure: self.listing_failure.clone(),
            completion: self.completion,
            handler,
            state: self.state.clone(),
        }))
    }
}

struct InMemoryConnection {
    license_key: String,
    listing_failure: Option<String>,
    completion: FlowCompletion,
    handler: Arc<dyn BillingHandler>,
    state: Arc<RwLock<StoreState>>,
}

impl InMemoryConnection {
    async fn start_flow(&self, flow: PendingFlow) -> bool {
        {
            let mut state = self.state.write().await;
            if state.released || state.pending_flow.is_some() {
                return false;
            }
            state.pending_flow = Some(flow);
        }

        if self.completion == FlowCompletion::Automatic {
            let state = self.state.clone();
            let handler = self.handler.clone();
            let license_key = self.license_key.clone();
            tokio::spawn(async move {
                finish_flow(&state, handler.as_ref(), &license_key, None).await;
            });
        }
        true
    }

    fn listing_fault(&self) -> Option<StoreFault> {
        self.listing_failure.clone().map(StoreFault::new)
    }
}

/// Completes the pending flow, confirmed unless `failure` carries the store
/// response code it was aborted with. Returns whether a flow was pending.
async fn finish_flow(
    state: &RwLock<StoreState>,
    handler: &dyn BillingHandler,
    license_key: &str,
    failure: Option<i32>,
) -> bool {
    let event = {
        let mut state = state.write().await;
        let Some(flow) = state.pending_flow.take() else {
            return false;
        };
        let settled = match failure {
            Some(code) => Err(code),
            None => state.settle_flow(&flow, license_key),
        };
        match settled {
            Ok(details) => BillingEvent::ProductPurchased {
                product_id: flow.product_id,
                details: Some(details),
            },
            Err(code) => BillingEvent::Error { code, cause: None },
        }
    };
    handler.handle(event);
    true
}

#[async_trait]
impl BillingConnection for InMemoryConnection {
    async fn release(&self) {
        let mut state = self.state.write().await;
        state.released = true;
        state.pending_flow = None;
    }

    async fn load_owned_purchases(&self) -> bool {
        self.handler.handle(BillingEvent::PurchaseHistoryRestored);
        true
    }

    async fn purchase(&self, product_id: &str, developer_payload: Option<&str>) -> bool {
        self.start_flow(PendingFlow {
            kind: FlowKind::Purchase,
            product_id: product_id.to_string(),
            developer_payload: developer_payload.map(str::to_string),
            replaces: Vec::new(),
        })
        .await
    }

    async fn subscribe(&self, product_id: &str, developer_payload: Option<&str>) -> bool {
        self.start_flow(PendingFlow {
            kind: FlowKind::Subscribe,
            product_id: product_id.to_string(),
            developer_payload: developer_payload.map(str::to_string),
            replaces: Vec::new(),
        })
        .await
    }

    async fn update_subscription(
        &self,
        old_product_ids: &[String],
        product_id: &str,
        developer_payload: Option<&str>,
    ) -> bool {
        self.start_flow(PendingFlow {
            kind: FlowKind::Update,
            product_id: product_id.to_string(),
            developer_payload: developer_payload.map(str::to_string),
            replaces: old_product_ids.to_vec(),
        })
        .await
    }

    async fn consume_purchase(&self, product_id: &str) -> std::result::Result<bool, StoreFault> {
        let mut state = self.state.write().await;
        Ok(state.owned_products.remove(product_id).is_some())
    }

    async fn is_subscribed(&self, product_id: &str) -> bool {
        self.state
            .read()
            .await
            .owned_subscriptions
            .contains_key(product_id)
    }

    async fn is_purchased(&self, product_id: &str) -> bool {
        self.state.read().await.owned_products.contains_key(product_id)
    }

    async fn is_one_time_purchase_supported(&self) -> bool {
        true
    }

    async fn is_valid_transaction_details(&self, details: &TransactionDetails) -> bool {
        let info = &details.purchase_info;
        info.signature.is_some() && !info.response_data.is_empty()
    }

    async fn list_owned_products(&self) -> Vec<String> {
        self.state.read().await.owned_products.keys().cloned().collect()
    }

    async fn list_owned_subscriptions(&self) -> Vec<String> {
        self.state
            .read()
            .await
            .owned_subscriptions
            .keys()
            .cloned()
            .collect()
    }

    async fn purchase_listing_details(
        &self,
        product_ids: &[String],
    ) -> std::result::Result<Option<Vec<SkuDetails>>, StoreFault> {
        if let Some(fault) = self.listing_fault() {
            return Err(fault);
        }
        Ok(Some(self.state.read().await.listing(product_ids, false)))
    }

    async fn subscription_listing_details(
        &self,
        product_ids: &[String],
    ) -> std::result::Result<Option<Vec<SkuDetails>>, StoreFault> {
        if let Some(fault) = self.listing_fault() {
            return Err(fault);
        }
        Ok(Some(self.state.read().await.listing(product_ids, true)))
    }

    async fn purchase_transaction_details(&self, product_id: &str) -> Option<TransactionDetails> {
        self.state.read().await.owned_products.get(product_id).cloned()
    }

    async fn subscription_transaction_details(
        &self,
        product_id: &str,
    ) -> Option<TransactionDetails> {
        self.state
            .read()
            .await
            .owned_subscriptions
            .get(product_id)
            .cloned()
    }

    async fn handle_activity_result(&self, result: &ActivityResult) -> bool {
        if result.request_code != PURCHASE_FLOW_REQUEST_CODE {
            return false;
        }
        let failure = if result.is_success() {
            None
        } else if result.result_code == RESULT_CANCELED && result.response_code.is_none() {
            Some(USER_CANCELED)
        } else {
            Some(result.response_code_or_ok())
        };
        finish_flow(
            &self.state,
            self.handler.as_ref(),
            &self.license_key,
            failure,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::activity::RESULT_OK;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<BillingEvent>>,
    }

    impl BillingHandler for Recorder {
        fn handle(&self, event: BillingEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    impl Recorder {
        /// Last flow-related event; the initialization callback races the
        /// test body and is skipped.
        fn last(&self) -> Option<BillingEvent> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|event| **event != BillingEvent::Initialized)
                .cloned()
        }
    }

    fn sku(id: &str, subscription: bool) -> SkuDetails {
        SkuDetails {
            product_id: id.to_string(),
            title: id.to_uppercase(),
            description: format!("{id} description"),
            is_subscription: subscription,
            currency: "USD".to_string(),
            price_value: dec!(1.99),
            price_text: "$1.99".to_string(),
            subscription_period: subscription.then(|| "P1M".to_string()),
            subscription_free_trial_period: None,
            have_trial_period: false,
            introductory_price_value: dec!(0),
            introductory_price_text: None,
            introductory_price_period: None,
            have_introductory_period: false,
            introductory_price_cycles: 0,
        }
    }

    fn catalog() -> Catalog {
        Catalog::default()
            .with_product(sku("coins", false))
            .with_product(sku("monthly", true))
            .with_product(sku("yearly", true))
            .with_failure("broken", 6)
    }

    async fn manual_connection(
        license_key: &str,
    ) -> (InMemoryBillingService, Arc<dyn BillingConnection>, Arc<Recorder>) {
        let service = InMemoryBillingService::new(catalog()).with_completion(FlowCompletion::Manual);
        let recorder = Arc::new(Recorder::default());
        let connection = service.connect(license_key, recorder.clone()).await.unwrap();
        (service, connection, recorder)
    }

    fn confirm() -> ActivityResult {
        ActivityResult::new(PURCHASE_FLOW_REQUEST_CODE, RESULT_OK, Some(0))
    }

    #[tokio::test]
    async fn test_manual_purchase_completes_on_activity_result() {
        let (_service, connection, recorder) = manual_connection("key").await;

        assert!(connection.purchase("coins", Some("payload")).await);
        assert!(connection.handle_activity_result(&confirm()).await);

        let Some(BillingEvent::ProductPurchased { product_id, details }) = recorder.last() else {
            panic!("expected a purchase event");
        };
        assert_eq!(product_id, "coins");
        let details = details.unwrap();
        assert_eq!(details.product_id(), "coins");
        assert!(connection.is_valid_transaction_details(&details).await);
        assert!(connection.is_purchased("coins").await);
    }

    #[tokio::test]
    async fn test_second_flow_does_not_start_while_one_is_pending() {
        let (_service, connection, _recorder) = manual_connection("key").await;

        assert!(connection.purchase("coins", None).await);
        assert!(!connection.subscribe("monthly", None).await);
    }

    #[tokio::test]
    async fn test_owned_product_fails_with_already_owned() {
        let (_service, connection, recorder) = manual_connection("key").await;

        connection.purchase("coins", None).await;
        connection.handle_activity_result(&confirm()).await;
        connection.purchase("coins", None).await;
        connection.handle_activity_result(&confirm()).await;

        assert_eq!(
            recorder.last(),
            Some(BillingEvent::Error {
                code: ITEM_ALREADY_OWNED,
                cause: None
            })
        );
    }

    #[tokio::test]
    async fn test_store_codes_for_bad_requests() {
        let (_service, connection, recorder) = manual_connection("key").await;
        let cases = [
            ("missing", ITEM_UNAVAILABLE),
            ("monthly", DEVELOPER_ERROR),
            ("broken", 6),
        ];

        for (product, code) in cases {
            connection.purchase(product, None).await;
            connection.handle_activity_result(&confirm()).await;
            assert_eq!(
                recorder.last(),
                Some(BillingEvent::Error { code, cause: None }),
                "product {product}"
            );
        }
    }

    #[tokio::test]
    async fn test_canceled_flow_reports_user_canceled() {
        let (_service, connection, recorder) = manual_connection("key").await;

        connection.purchase("coins", None).await;
        let canceled = ActivityResult::new(PURCHASE_FLOW_REQUEST_CODE, RESULT_CANCELED, None);
        connection.handle_activity_result(&canceled).await;

        assert_eq!(
            recorder.last(),
            Some(BillingEvent::Error {
                code: USER_CANCELED,
                cause: None
            })
        );
        assert!(!connection.is_purchased("coins").await);
    }

    #[tokio::test]
    async fn test_update_subscription_replaces_old_ids() {
        let (_service, connection, _recorder) = manual_connection("key").await;

        connection.subscribe("monthly", None).await;
        connection.handle_activity_result(&confirm()).await;
        connection
            .update_subscription(&["monthly".to_string()], "yearly", None)
            .await;
        connection.handle_activity_result(&confirm()).await;

        assert_eq!(connection.list_owned_subscriptions().await, vec!["yearly"]);
    }

    #[tokio::test]
    async fn test_unsigned_without_license_key() {
        let (_service, connection, _recorder) = manual_connection("").await;

        connection.purchase("coins", None).await;
        connection.handle_activity_result(&confirm()).await;

        let details = connection.purchase_transaction_details("coins").await.unwrap();
        assert!(details.purchase_info.signature.is_none());
        assert!(!connection.is_valid_transaction_details(&details).await);
    }

    #[tokio::test]
    async fn test_consume_removes_ownership() {
        let (_service, connection, _recorder) = manual_connection("key").await;

        connection.purchase("coins", None).await;
        connection.handle_activity_result(&confirm()).await;

        assert!(connection.consume_purchase("coins").await.unwrap());
        assert!(!connection.consume_purchase("coins").await.unwrap());
        assert!(connection.list_owned_products().await.is_empty());
    }

    #[tokio::test]
    async fn test_foreign_request_code_is_not_handled() {
        let (service, connection, _recorder) = manual_connection("key").await;

        connection.purchase("coins", None).await;
        let foreign = ActivityResult::new(1, RESULT_OK, None);

        assert!(!connection.handle_activity_result(&foreign).await);
        assert!(service.has_pending_flow().await);
    }

    #[tokio::test]
    async fn test_listing_filters_by_kind() {
        let (_service, connection, _recorder) = manual_connection("key").await;
        let ids = vec!["coins".to_string(), "monthly".to_string(), "nope".to_string()];

        let products = connection.purchase_listing_details(&ids).await.unwrap().unwrap();
        let subscriptions = connection
            .subscription_listing_details(&ids)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(products.len(), 1);
        assert_eq!(products[0].product_id, "coins");
        assert_eq!(subscriptions.len(), 1);
        assert_eq!(subscriptions[0].product_id, "monthly");
    }

    #[tokio::test]
    async fn test_catalog_from_json() {
        let json = r#"{
            "products": [{
                "productId": "coins",
                "title": "Coins",
                "description": "A pile of coins",
                "isSubscription": false,
                "currency": "USD",
                "priceValue": 0.99,
                "priceText": "$0.99"
            }],
            "failures": { "coins": 2 }
        }"#;

        let catalog = Catalog::from_reader(json.as_bytes()).unwrap();
        assert_eq!(catalog.products[0].price_value, dec!(0.99));
        assert_eq!(catalog.failures.get("coins"), Some(&2));
    }
}
