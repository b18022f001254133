use super::callbacks::EventRouter;
use super::registry::PendingRegistry;
use crate::config::BridgeConfig;
use crate::domain::activity::ActivityResult;
use crate::domain::codes::ErrorCode;
use crate::domain::operation::{OperationClass, PurchaseOutcome, Rejection, Resolution};
use crate::domain::ports::{BillingConnection, BillingServiceRef};
use crate::domain::product::{ProductDetails, SkuDetails, TransactionDetails, TransactionRecord};
use crate::error::{BillingError, Result, StoreFault};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// A purchase-flow launch, dispatched to the matching collaborator call.
enum FlowRequest<'a> {
    Purchase {
        product_id: &'a str,
        developer_payload: Option<&'a str>,
    },
    Subscribe {
        product_id: &'a str,
        developer_payload: Option<&'a str>,
    },
    UpdateSubscription {
        old_product_ids: &'a [String],
        product_id: &'a str,
        developer_payload: Option<&'a str>,
    },
}

impl FlowRequest<'_> {
    fn process_name(&self) -> &'static str {
        match self {
            Self::Purchase { .. } => "purchase",
            Self::Subscribe { .. } | Self::UpdateSubscription { .. } => "subscribe",
        }
    }

    async fn launch(&self, connection: &dyn BillingConnection) -> bool {
        match *self {
            Self::Purchase {
                product_id,
                developer_payload,
            } => connection.purchase(product_id, developer_payload).await,
            Self::Subscribe {
                product_id,
                developer_payload,
            } => connection.subscribe(product_id, developer_payload).await,
            Self::UpdateSubscription {
                old_product_ids,
                product_id,
                developer_payload,
            } => {
                connection
                    .update_subscription(old_product_ids, product_id, developer_payload)
                    .await
            }
        }
    }
}

/// Exposes the billing collaborator through an async request/response API.
///
/// Each request that completes through a collaborator callback is parked in
/// the [`PendingRegistry`] under its [`OperationClass`] until the callback
/// arrives. At most one channel to the collaborator is open at a time.
pub struct BillingBridge {
    service: BillingServiceRef,
    config: BridgeConfig,
    registry: Arc<PendingRegistry>,
    router: Arc<EventRouter>,
    channel: RwLock<Option<Arc<dyn BillingConnection>>>,
    short_circuit: AtomicBool,
}

impl BillingBridge {
    /// Creates a closed bridge with an empty registry.
    ///
    /// # Arguments
    ///
    /// * `service` - The billing collaborator to connect to on `open()`.
    /// * `config` - License key and purchase-flow settings.
    pub fn new(service: BillingServiceRef, config: BridgeConfig) -> Self {
        let registry = Arc::new(PendingRegistry::new());
        let router = Arc::new(EventRouter::new(registry.clone()));
        let short_circuit = AtomicBool::new(config.short_circuit);
        Self {
            service,
            config,
            registry,
            router,
            channel: RwLock::new(None),
            short_circuit,
        }
    }

    pub fn registry(&self) -> &PendingRegistry {
        &self.registry
    }

    pub async fn is_open(&self) -> bool {
        self.channel.read().await.is_some()
    }

    async fn connection(&self) -> Result<Arc<dyn BillingConnection>> {
        self.channel
            .read()
            .await
            .clone()
            .ok_or(BillingError::NotConnected)
    }

    /// Opens the channel and waits for the collaborator to finish
    /// initializing.
    ///
    /// Any handles left over from a previous channel are discarded first. A
    /// connection the collaborator refuses outright fails with
    /// `E_CONNECTION`.
    pub async fn open(&self) -> Result<bool> {
        if !self.service.is_service_available() {
            return Err(BillingError::NoEmulator);
        }

        let pending = {
            let mut channel = self.channel.write().await;
            if channel.is_some() {
                return Err(BillingError::AlreadyOpen);
            }

            self.registry.clear();
            let Some(pending) = self.registry.register(OperationClass::Open) else {
                return Err(BillingError::PreviousNotResolved(OperationClass::Open));
            };

            match self
                .service
                .connect(&self.config.license_key, self.router.clone())
                .await
            {
                Ok(connection) => *channel = Some(connection),
                Err(fault) => {
                    tracing::warn!(error = %fault, "billing connection failed");
                    self.registry.reject(
                        OperationClass::Open,
                        Rejection::new(ErrorCode::Connection, fault.message.clone())
                            .with_cause(Some(fault)),
                    );
                }
            }
            pending
        };

        pending.wait().await?;
        tracing::info!("billing channel open");
        Ok(true)
    }

    /// Releases the channel and discards pending handles. Always succeeds.
    pub async fn close(&self) -> Result<bool> {
        self.abandon().await;
        Ok(true)
    }

    /// Close effect without a caller: used when the host environment goes
    /// away underneath the bridge.
    ///
    /// Callers still awaiting a discarded handle are not notified; their wait
    /// ends with [`BillingError::Abandoned`].
    pub async fn abandon(&self) {
        let mut channel = self.channel.write().await;
        if let Some(connection) = channel.take() {
            connection.release().await;
            tracing::info!("billing channel released");
        }
        self.registry.clear();
    }

    pub async fn load_owned_purchases_from_google(&self) -> Result<bool> {
        let connection = self.connection().await?;
        connection.load_owned_purchases().await;
        Ok(true)
    }

    pub async fn purchase(
        &self,
        product_id: &str,
        developer_payload: Option<&str>,
    ) -> Result<PurchaseOutcome> {
        self.run_flow(FlowRequest::Purchase {
            product_id,
            developer_payload,
        })
        .await
    }

    pub async fn subscribe(
        &self,
        product_id: &str,
        developer_payload: Option<&str>,
    ) -> Result<PurchaseOutcome> {
        self.run_flow(FlowRequest::Subscribe {
            product_id,
            developer_payload,
        })
        .await
    }

    /// Replaces `old_product_ids` with a subscription to `product_id`.
    pub async fn update_subscription(
        &self,
        old_product_ids: &[String],
        product_id: &str,
        developer_payload: Option<&str>,
    ) -> Result<PurchaseOutcome> {
        self.run_flow(FlowRequest::UpdateSubscription {
            old_product_ids,
            product_id,
            developer_payload,
        })
        .await
    }

    async fn run_flow(&self, request: FlowRequest<'_>) -> Result<PurchaseOutcome> {
        let class = OperationClass::PurchaseOrSubscribe;
        let connection = self.connection().await?;
        let pending = self
            .registry
            .register(class)
            .ok_or(BillingError::PreviousNotResolved(class))?;

        if !request.launch(connection.as_ref()).await {
            self.registry.reject(
                class,
                Rejection::unknown(format!(
                    "Could not start {} process.",
                    request.process_name()
                )),
            );
        }

        match pending.wait().await? {
            Resolution::Purchase(outcome) => Ok(outcome),
            Resolution::Opened => Err(BillingError::unknown(
                "Purchase flow settled with an unrelated result.",
            )),
        }
    }

    pub async fn consume_purchase(&self, product_id: &str) -> Result<bool> {
        let connection = self.connection().await?;
        match connection.consume_purchase(product_id).await {
            Ok(true) => Ok(true),
            Ok(false) => Err(BillingError::unknown("Could not consume purchase")),
            Err(fault) => Err(fault_rejection(fault.message.clone(), fault)),
        }
    }

    pub async fn is_subscribed(&self, product_id: &str) -> Result<bool> {
        Ok(self.connection().await?.is_subscribed(product_id).await)
    }

    pub async fn is_purchased(&self, product_id: &str) -> Result<bool> {
        Ok(self.connection().await?.is_purchased(product_id).await)
    }

    pub async fn is_one_time_purchase_supported(&self) -> Result<bool> {
        Ok(self
            .connection()
            .await?
            .is_one_time_purchase_supported()
            .await)
    }

    pub async fn is_valid_transaction_details(&self, product_id: &str) -> Result<bool> {
        let connection = self.connection().await?;
        let Some(details) = connection.purchase_transaction_details(product_id).await else {
            return Err(BillingError::unknown("Could not validate transaction details"));
        };
        Ok(connection.is_valid_transaction_details(&details).await)
    }

    pub async fn list_owned_products(&self) -> Result<Vec<String>> {
        Ok(self.connection().await?.list_owned_products().await)
    }

    pub async fn list_owned_subscriptions(&self) -> Result<Vec<String>> {
        Ok(self.connection().await?.list_owned_subscriptions().await)
    }

    pub async fn get_product_details(&self, product_ids: &[String]) -> Result<Vec<ProductDetails>> {
        let listing = self
            .connection()
            .await?
            .purchase_listing_details(product_ids)
            .await;
        map_listing(listing, "product", ProductDetails::product)
    }

    pub async fn get_subscription_details(
        &self,
        product_ids: &[String],
    ) -> Result<Vec<ProductDetails>> {
        let listing = self
            .connection()
            .await?
            .subscription_listing_details(product_ids)
            .await;
        map_listing(listing, "subscription", ProductDetails::subscription)
    }

    /// Details of a single product, failing when the store lists none.
    pub async fn product_detail(&self, product_id: &str) -> Result<ProductDetails> {
        first_detail(self.get_product_details(&[product_id.to_string()]).await?)
    }

    /// Details of a single subscription, failing when the store lists none.
    pub async fn subscription_detail(&self, product_id: &str) -> Result<ProductDetails> {
        first_detail(
            self.get_subscription_details(&[product_id.to_string()])
                .await?,
        )
    }

    pub async fn get_purchase_transaction_details(
        &self,
        product_id: &str,
    ) -> Result<TransactionRecord> {
        let details = self
            .connection()
            .await?
            .purchase_transaction_details(product_id)
            .await;
        matching_record(product_id, details.as_ref())
    }

    pub async fn get_subscription_transaction_details(
        &self,
        product_id: &str,
    ) -> Result<TransactionRecord> {
        let details = self
            .connection()
            .await?
            .subscription_transaction_details(product_id)
            .await;
        matching_record(product_id, details.as_ref())
    }

    /// When enabled, purchase-flow activity results are interpreted by the
    /// bridge instead of being handed to the collaborator.
    pub fn short_circuit_purchase_flow(&self, enabled: bool) {
        self.short_circuit.store(enabled, Ordering::SeqCst);
    }

    pub fn is_short_circuited(&self) -> bool {
        self.short_circuit.load(Ordering::SeqCst)
    }

    /// Entry point for purchase-flow results delivered by the host.
    pub async fn on_activity_result(&self, result: ActivityResult) {
        if self.is_short_circuited() {
            self.short_circuit_activity_result(&result);
            return;
        }

        let connection = self.channel.read().await.clone();
        if let Some(connection) = connection
            && !connection.handle_activity_result(&result).await
        {
            tracing::debug!(
                request_code = result.request_code,
                "activity result not handled by billing collaborator"
            );
        }
    }

    fn short_circuit_activity_result(&self, result: &ActivityResult) {
        if result.request_code != self.config.purchase_flow_request_code {
            return;
        }

        let class = OperationClass::PurchaseOrSubscribe;
        if result.is_success() {
            self.registry
                .resolve(class, Resolution::Purchase(PurchaseOutcome::Acknowledged));
        } else {
            self.registry.reject(
                class,
                Rejection::new(
                    ErrorCode::from_response_code(result.response_code_or_ok()),
                    format!("An error has occurred. Code: {}", result.request_code),
                ),
            );
        }
    }
}

fn fault_rejection(message: impl Into<String>, fault: StoreFault) -> BillingError {
    Rejection::unknown(message).with_cause(Some(fault)).into()
}

fn map_listing(
    listing: std::result::Result<Option<Vec<SkuDetails>>, StoreFault>,
    kind: &str,
    map: fn(&SkuDetails) -> ProductDetails,
) -> Result<Vec<ProductDetails>> {
    match listing {
        Ok(Some(skus)) => Ok(skus.iter().map(map).collect()),
        Ok(None) => Err(BillingError::unknown(format!(
            "Could not find {kind} details."
        ))),
        Err(fault) => Err(fault_rejection(
            format!("Could not get {kind} details."),
            fault,
        )),
    }
}

fn first_detail(details: Vec<ProductDetails>) -> Result<ProductDetails> {
    details
        .into_iter()
        .next()
        .ok_or_else(|| BillingError::unknown("Could not find details."))
}

fn matching_record(
    product_id: &str,
    details: Option<&TransactionDetails>,
) -> Result<TransactionRecord> {
    match details {
        Some(details) if details.product_id() == product_id => Ok(details.into()),
        _ => Err(BillingError::unknown(
            "Could not find transaction details for product id.",
        )),
    }
}
