use crate::error::{BillingError, Result};
use serde::{Deserialize, Serialize};
use std::io::Read;

/// Bridge operation named in a command script.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Open,
    Close,
    LoadOwnedPurchases,
    Purchase,
    Subscribe,
    UpdateSubscription,
    ConsumePurchase,
    IsSubscribed,
    IsPurchased,
    IsOneTimePurchaseSupported,
    IsValidTransactionDetails,
    ListOwnedProducts,
    ListOwnedSubscriptions,
    GetProductDetails,
    GetSubscriptionDetails,
    ProductDetail,
    SubscriptionDetail,
    GetPurchaseTransactionDetails,
    GetSubscriptionTransactionDetails,
}

/// One row of a command script.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct Command {
    pub op: Operation,
    /// Product id, or `;`-separated ids for listing queries.
    pub product: Option<String>,
    pub payload: Option<String>,
    /// `;`-separated ids replaced by `update_subscription`.
    pub replaces: Option<String>,
}

fn split_ids(field: Option<&str>) -> Vec<String> {
    field
        .unwrap_or_default()
        .split(';')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

impl Command {
    pub fn product_id(&self) -> Result<&str> {
        self.product
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| BillingError::InvalidCommand(format!("{:?} needs a product id", self.op)))
    }

    pub fn product_ids(&self) -> Vec<String> {
        split_ids(self.product.as_deref())
    }

    pub fn replaced_ids(&self) -> Vec<String> {
        split_ids(self.replaces.as_deref())
    }
}

/// Reads commands from a CSV source.
///
/// Wraps `csv::Reader` and yields `Result<Command>` per row. Whitespace is
/// trimmed and short rows are accepted.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily reads and deserializes commands.
    pub fn commands(self) -> impl Iterator<Item = Result<Command>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(BillingError::from))
    }
}
