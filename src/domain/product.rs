use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Purchase state as recorded by the store.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
pub enum PurchaseState {
    PurchasedSuccessfully,
    Canceled,
    Refunded,
    SubscriptionExpired,
}

impl fmt::Display for PurchaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PurchasedSuccessfully => "PurchasedSuccessfully",
            Self::Canceled => "Canceled",
            Self::Refunded => "Refunded",
            Self::SubscriptionExpired => "SubscriptionExpired",
        };
        f.write_str(name)
    }
}

/// Parsed purchase payload as the store reports it.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseData {
    pub order_id: String,
    pub package_name: String,
    pub product_id: String,
    pub purchase_time: Option<DateTime<Utc>>,
    pub purchase_state: Option<PurchaseState>,
    pub developer_payload: Option<String>,
    pub purchase_token: String,
    pub auto_renewing: bool,
}

/// Raw receipt plus its optional signature and the parsed payload.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseInfo {
    pub response_data: String,
    pub signature: Option<String>,
    pub purchase_data: PurchaseData,
}

/// Transaction details handed over by the billing collaborator.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDetails {
    pub purchase_info: PurchaseInfo,
}

impl TransactionDetails {
    /// Product id recorded inside the transaction itself.
    pub fn product_id(&self) -> &str {
        &self.purchase_info.purchase_data.product_id
    }
}

/// Listing entry as the billing collaborator reports it.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SkuDetails {
    pub product_id: String,
    pub title: String,
    pub description: String,
    pub is_subscription: bool,
    pub currency: String,
    pub price_value: Decimal,
    pub price_text: String,
    #[serde(default)]
    pub subscription_period: Option<String>,
    #[serde(default)]
    pub subscription_free_trial_period: Option<String>,
    #[serde(default)]
    pub have_trial_period: bool,
    #[serde(default)]
    pub introductory_price_value: Decimal,
    #[serde(default)]
    pub introductory_price_text: Option<String>,
    #[serde(default)]
    pub introductory_price_period: Option<String>,
    #[serde(default)]
    pub have_introductory_period: bool,
    #[serde(default)]
    pub introductory_price_cycles: i32,
}

/// Caller-facing transaction record.
#[derive(Debug, Serialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub receipt_data: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_signature: Option<String>,
    pub product_id: String,
    pub order_id: String,
    pub purchase_token: String,
    /// RFC 3339 timestamp, empty when the store did not report one.
    pub purchase_time: String,
    /// State name, empty when the store did not report one.
    pub purchase_state: String,
    pub auto_renewing: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub developer_payload: Option<String>,
}

impl From<&TransactionDetails> for TransactionRecord {
    fn from(details: &TransactionDetails) -> Self {
        let info = &details.purchase_info;
        let data = &info.purchase_data;
        Self {
            receipt_data: info.response_data.clone(),
            receipt_signature: info.signature.clone(),
            product_id: data.product_id.clone(),
            order_id: data.order_id.clone(),
            purchase_token: data.purchase_token.clone(),
            purchase_time: data
                .purchase_time
                .map(|t| t.to_rfc3339())
                .unwrap_or_default(),
            purchase_state: data
                .purchase_state
                .map(|s| s.to_string())
                .unwrap_or_default(),
            auto_renewing: data.auto_renewing,
            developer_payload: data.developer_payload.clone(),
        }
    }
}

/// Subscription-only pricing terms.
#[derive(Debug, Serialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionTerms {
    pub subscription_period: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_free_trial_period: Option<String>,
    pub have_trial_period: bool,
    #[serde(with = "rust_decimal::serde::float")]
    pub introductory_price_value: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub introductory_price_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub introductory_price_period: Option<String>,
    pub have_introductory_period: bool,
    pub introductory_price_cycles: i32,
}

/// Caller-facing product listing record.
///
/// `subscription` is only filled for subscription listings; plain product
/// listings serialize without any of its fields.
#[derive(Debug, Serialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetails {
    pub product_id: String,
    pub title: String,
    pub description: String,
    pub is_subscription: bool,
    pub currency: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price_value: Decimal,
    pub price_text: String,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub subscription: Option<SubscriptionTerms>,
}

impl ProductDetails {
    pub fn product(sku: &SkuDetails) -> Self {
        Self {
            product_id: sku.product_id.clone(),
            title: sku.title.clone(),
            description: sku.description.clone(),
            is_subscription: sku.is_subscription,
            currency: sku.currency.clone(),
            price_value: sku.price_value,
            price_text: sku.price_text.clone(),
            subscription: None,
        }
    }

    pub fn subscription(sku: &SkuDetails) -> Self {
        Self {
            subscription: Some(SubscriptionTerms {
                subscription_period: sku.subscription_period.clone().unwrap_or_default(),
                subscription_free_trial_period: sku.subscription_free_trial_period.clone(),
                have_trial_period: sku.have_trial_period,
                introductory_price_value: sku.introductory_price_value,
                introductory_price_text: sku.introductory_price_text.clone(),
                introductory_price_period: sku.introductory_price_period.clone(),
                have_introductory_period: sku.have_introductory_period,
                introductory_price_cycles: sku.introductory_price_cycles,
            }),
            ..Self::product(sku)
        }
    }
}
