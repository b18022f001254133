use crate::application::bridge::BillingBridge;
use crate::error::Result;
use crate::interfaces::csv::command_reader::{Command, Operation};
use serde_json::Value;

/// Executes script commands against a bridge, one at a time.
pub struct ScriptRunner<'a> {
    bridge: &'a BillingBridge,
}

impl<'a> ScriptRunner<'a> {
    pub fn new(bridge: &'a BillingBridge) -> Self {
        Self { bridge }
    }

    /// Runs `command` and renders its success value as JSON.
    pub async fn execute(&self, command: &Command) -> Result<Value> {
        let bridge = self.bridge;
        let payload = command.payload.as_deref();
        let value = match command.op {
            Operation::Open => Value::Bool(bridge.open().await?),
            Operation::Close => Value::Bool(bridge.close().await?),
            Operation::LoadOwnedPurchases => {
                Value::Bool(bridge.load_owned_purchases_from_google().await?)
            }
            Operation::Purchase => {
                serde_json::to_value(bridge.purchase(command.product_id()?, payload).await?)?
            }
            Operation::Subscribe => {
                serde_json::to_value(bridge.subscribe(command.product_id()?, payload).await?)?
            }
            Operation::UpdateSubscription => serde_json::to_value(
                bridge
                    .update_subscription(&command.replaced_ids(), command.product_id()?, payload)
                    .await?,
            )?,
            Operation::ConsumePurchase => {
                Value::Bool(bridge.consume_purchase(command.product_id()?).await?)
            }
            Operation::IsSubscribed => {
                Value::Bool(bridge.is_subscribed(command.product_id()?).await?)
            }
            Operation::IsPurchased => Value::Bool(bridge.is_purchased(command.product_id()?).await?),
            Operation::IsOneTimePurchaseSupported => {
                Value::Bool(bridge.is_one_time_purchase_supported().await?)
            }
            Operation::IsValidTransactionDetails => Value::Bool(
                bridge
                    .is_valid_transaction_details(command.product_id()?)
                    .await?,
            ),
            Operation::ListOwnedProducts => serde_json::to_value(bridge.list_owned_products().await?)?,
            Operation::ListOwnedSubscriptions => {
                serde_json::to_value(bridge.list_owned_subscriptions().await?)?
            }
            Operation::GetProductDetails => {
                serde_json::to_value(bridge.get_product_details(&command.product_ids()).await?)?
            }
            Operation::GetSubscriptionDetails => serde_json::to_value(
                bridge
                    .get_subscription_details(&command.product_ids())
                    .await?,
            )?,
            Operation::ProductDetail => {
                serde_json::to_value(bridge.product_detail(command.product_id()?).await?)?
            }
            Operation::SubscriptionDetail => {
                serde_json::to_value(bridge.subscription_detail(command.product_id()?).await?)?
            }
            Operation::GetPurchaseTransactionDetails => serde_json::to_value(
                bridge
                    .get_purchase_transaction_details(command.product_id()?)
                    .await?,
            )?,
            Operation::GetSubscriptionTransactionDetails => serde_json::to_value(
                bridge
                    .get_subscription_transaction_details(command.product_id()?)
                    .await?,
            )?,
        };
        Ok(value)
    }
}
