use super::registry::PendingRegistry;
use crate::domain::codes::ErrorCode;
use crate::domain::operation::{OperationClass, PurchaseOutcome, Rejection, Resolution};
use crate::domain::ports::{BillingEvent, BillingHandler};
use crate::domain::product::{TransactionDetails, TransactionRecord};
use crate::error::StoreFault;
use std::sync::Arc;

/// Routes collaborator callbacks to the pending handle they belong to.
#[derive(Debug, Clone)]
pub struct EventRouter {
    registry: Arc<PendingRegistry>,
}

impl EventRouter {
    pub fn new(registry: Arc<PendingRegistry>) -> Self {
        Self { registry }
    }

    fn product_purchased(&self, product_id: &str, details: Option<&TransactionDetails>) {
        let class = OperationClass::PurchaseOrSubscribe;
        let Some(details) = details else {
            self.registry
                .reject(class, Rejection::unknown("There is no transaction information."));
            return;
        };

        if details.product_id() != product_id {
            tracing::warn!(
                reported = product_id,
                recorded = details.product_id(),
                "purchase callback product id does not match its transaction"
            );
            self.registry
                .reject(class, Rejection::unknown("Product id does not match."));
            return;
        }

        let outcome = PurchaseOutcome::Completed(TransactionRecord::from(details));
        self.registry.resolve(class, Resolution::Purchase(outcome));
    }

    fn billing_error(&self, code: i32, cause: Option<StoreFault>) {
        let class = OperationClass::PurchaseOrSubscribe;
        // Only purchase flows report through this callback; anything else
        // cannot be attributed to a caller.
        if !self.registry.has(class) {
            tracing::debug!(code, "dropping billing error with no pending purchase");
            return;
        }

        let message = cause
            .as_ref()
            .map(|fault| fault.message.clone())
            .unwrap_or_else(|| "Could not purchase product.".to_string());
        let rejection =
            Rejection::new(ErrorCode::from_response_code(code), message).with_cause(cause);
        self.registry.reject(class, rejection);
    }
}

impl BillingHandler for EventRouter {
    fn handle(&self, event: BillingEvent) {
        match event {
            BillingEvent::Initialized => {
                self.registry.resolve(OperationClass::Open, Resolution::Opened);
            }
            BillingEvent::ProductPurchased {
                product_id,
                details,
            } => self.product_purchased(&product_id, details.as_ref()),
            BillingEvent::Error { code, cause } => self.billing_error(code, cause),
            BillingEvent::PurchaseHistoryRestored => {
                tracing::debug!("purchase history restored");
            }
        }
    }
}
