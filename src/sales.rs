//! Sales engine
//!
//! Depletes finished-goods stock on a retail sale and appends the immutable
//! sale record in the same unit of work. There is deliberately no
//! deduplication: two sales with identical business content are two debits.
use crate::error::WorkflowError;
use crate::ledger::LedgerStore;
use crate::model::{Party, Role, SaleRecord, TimeStamp};
use crate::notify::Notification;
use crate::utils::new_uuid_to_bech32;
use chrono::Utc;

pub struct SalesEngine {
    store: LedgerStore,
}

impl SalesEngine {
    pub fn new(store: LedgerStore) -> Self {
        Self { store }
    }

    /// Record a sale of `quantity` pieces. `sale_date` is the business-
    /// reported date; the record's creation timestamp is assigned here and
    /// is the authoritative one. When the post-sale stock is at or below
    /// the SKU's reorder threshold, a low-stock warning rides along.
    pub fn record_sale(
        &self,
        producer: &Party,
        product_id: &str,
        quantity: u32,
        tracking_number: &str,
        sale_date: TimeStamp<Utc>,
    ) -> anyhow::Result<(SaleRecord, Vec<Notification>)> {
        producer.require_role(Role::Producer)?;
        if quantity == 0 {
            return Err(WorkflowError::NonPositiveQuantity.into());
        }

        let product = self
            .store
            .get_product(product_id)?
            .ok_or_else(|| WorkflowError::NotFound {
                entity: "product",
                id: product_id.to_string(),
            })?;
        if product.producer_id != producer.id {
            return Err(WorkflowError::UnauthorizedParty {
                party_id: producer.id.clone(),
                entity: "product",
                id: product_id.to_string(),
            }
            .into());
        }

        let record = SaleRecord {
            id: new_uuid_to_bech32("sale_")?,
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            quantity,
            tracking_number: tracking_number.to_string(),
            sale_date,
            created_at: TimeStamp::now(),
        };

        let remaining = self.store.commit_sale(&record)?;

        tracing::info!(
            product_id = %product.id,
            quantity,
            remaining,
            "sale recorded"
        );

        let mut notifications = Vec::new();
        if remaining <= product.threshold {
            notifications.push(Notification::warning(
                &producer.id,
                "Low Stock Alert",
                format!(
                    "{} is down to {} pieces (threshold {}).",
                    product.name, remaining, product.threshold
                ),
            ));
        }
        Ok((record, notifications))
    }
}
