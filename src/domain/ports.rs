use super::activity::ActivityResult;
use super::product::{SkuDetails, TransactionDetails};
use crate::error::StoreFault;
use async_trait::async_trait;
use std::sync::Arc;

/// Callback delivered by the billing collaborator.
///
/// The store SDK reports success, failure and housekeeping through separate
/// callbacks; they are folded into one tagged type at the port so the bridge
/// routes a single shape.
#[derive(Debug, Clone, PartialEq)]
pub enum BillingEvent {
    /// The connection finished initializing.
    Initialized,
    /// A purchase flow finished. `details` may be missing on a broken store.
    ProductPurchased {
        product_id: String,
        details: Option<TransactionDetails>,
    },
    /// The store reported a failure with its integer response code.
    Error {
        code: i32,
        cause: Option<StoreFault>,
    },
    /// Owned products were reloaded from the store.
    PurchaseHistoryRestored,
}

/// Receiver of collaborator callbacks. May be invoked from any thread.
pub trait BillingHandler: Send + Sync {
    fn handle(&self, event: BillingEvent);
}

/// Entry point to the device's billing capability.
#[async_trait]
pub trait BillingService: Send + Sync {
    /// Whether billing works at all in the current environment.
    fn is_service_available(&self) -> bool;

    /// Starts a connection. A synchronous failure is returned as `Err`;
    /// completed initialization is signalled through `handler` with
    /// [`BillingEvent::Initialized`].
    async fn connect(
        &self,
        license_key: &str,
        handler: Arc<dyn BillingHandler>,
    ) -> Result<Arc<dyn BillingConnection>, StoreFault>;
}

/// An open connection to the billing collaborator.
///
/// Flow launchers return whether the flow started; its outcome arrives later
/// through the [`BillingHandler`] passed to [`BillingService::connect`].
#[async_trait]
pub trait BillingConnection: Send + Sync {
    async fn release(&self);
    async fn load_owned_purchases(&self) -> bool;

    async fn purchase(&self, product_id: &str, developer_payload: Option<&str>) -> bool;
    async fn subscribe(&self, product_id: &str, developer_payload: Option<&str>) -> bool;
    async fn update_subscription(
        &self,
        old_product_ids: &[String],
        product_id: &str,
        developer_payload: Option<&str>,
    ) -> bool;

    async fn consume_purchase(&self, product_id: &str) -> Result<bool, StoreFault>;
    async fn is_subscribed(&self, product_id: &str) -> bool;
    async fn is_purchased(&self, product_id: &str) -> bool;
    async fn is_one_time_purchase_supported(&self) -> bool;
    async fn is_valid_transaction_details(&self, details: &TransactionDetails) -> bool;

    async fn list_owned_products(&self) -> Vec<String>;
    async fn list_owned_subscriptions(&self) -> Vec<String>;

    async fn purchase_listing_details(
        &self,
        product_ids: &[String],
    ) -> Result<Option<Vec<SkuDetails>>, StoreFault>;
    async fn subscription_listing_details(
        &self,
        product_ids: &[String],
    ) -> Result<Option<Vec<SkuDetails>>, StoreFault>;

    async fn purchase_transaction_details(&self, product_id: &str) -> Option<TransactionDetails>;
    async fn subscription_transaction_details(&self, product_id: &str)
    -> Option<TransactionDetails>;

    /// Hands a purchase-flow activity result to the collaborator. Returns
    /// whether the collaborator recognized it.
    async fn handle_activity_result(&self, result: &ActivityResult) -> bool;
}

pub type BillingServiceRef = Arc<dyn BillingService>;
