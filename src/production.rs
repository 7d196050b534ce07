//! Production engine
//!
//! Converts producer raw material into finished-goods stock at a configured
//! material-per-piece rate. The raw-material debit, the SKU credit and the
//! usage-log append commit as one unit; a shortfall produces nothing.
use crate::error::{LedgerError, WorkflowError};
use crate::ledger::LedgerStore;
use crate::model::{FinishedGoodsProduct, Party, Role, SkuDraft, TimeStamp, UsageLogEntry};
use crate::utils::{new_uuid_to_bech32, round2};

/// Metres of fabric consumed per finished piece. Global in this version,
/// not per-fabric.
pub const DEFAULT_FABRIC_PER_UNIT: f64 = 1.5;

#[derive(Debug, Clone, Copy)]
pub struct ProductionConfig {
    pub fabric_per_unit: f64,
}

impl Default for ProductionConfig {
    fn default() -> Self {
        Self {
            fabric_per_unit: DEFAULT_FABRIC_PER_UNIT,
        }
    }
}

pub struct ProductionEngine {
    store: LedgerStore,
    config: ProductionConfig,
}

impl ProductionEngine {
    pub fn new(store: LedgerStore, config: ProductionConfig) -> Self {
        Self { store, config }
    }

    /// Material needed for a run of `quantity` pieces.
    pub fn material_required(&self, quantity: u32) -> f64 {
        round2(f64::from(quantity) * self.config.fabric_per_unit)
    }

    /// Produce more pieces of an existing SKU.
    pub fn produce_existing(
        &self,
        producer: &Party,
        product_id: &str,
        quantity: u32,
    ) -> anyhow::Result<(FinishedGoodsProduct, UsageLogEntry)> {
        producer.require_role(Role::Producer)?;
        if quantity == 0 {
            return Err(WorkflowError::NonPositiveQuantity.into());
        }

        let mut product =
            self.store
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

        let material = self
            .store
            .get_raw_material(&producer.id, &product.fabric_id)?
            .ok_or_else(|| WorkflowError::NotFound {
                entity: "raw material",
                id: product.fabric_id.clone(),
            })?;

        let required = self.material_required(quantity);
        let entry = UsageLogEntry {
            id: new_uuid_to_bech32("use_")?,
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            fabric_id: material.fabric_id.clone(),
            fabric_name: material.name.clone(),
            material_used: required,
            quantity_produced: quantity,
            created_at: TimeStamp::now(),
        };

        // the store applies the credit to the row it reads in-transaction,
        // so a sale committing alongside this run is never erased
        let (balance, stock) = self
            .store
            .commit_production(
                &producer.id,
                &product.fabric_id,
                required,
                &product,
                quantity,
                &entry,
            )
            .map_err(|err| map_material_shortfall(err, required))?;
        product.stock = stock;

        tracing::info!(
            product_id = %product.id,
            quantity,
            required,
            balance,
            "production run committed"
        );
        Ok((product, entry))
    }

    /// Create a new SKU and run its first production in one unit of work.
    /// Color and fabric linkage come from the producer's raw-material entry,
    /// never from free-typed input; a failed run leaves no stranded SKU.
    pub fn produce_new(
        &self,
        producer: &Party,
        fabric_id: &str,
        draft: SkuDraft,
        quantity: u32,
    ) -> anyhow::Result<(FinishedGoodsProduct, UsageLogEntry)> {
        producer.require_role(Role::Producer)?;
        if quantity == 0 {
            return Err(WorkflowError::NonPositiveQuantity.into());
        }

        let material = self
            .store
            .get_raw_material(&producer.id, fabric_id)?
            .ok_or_else(|| WorkflowError::NotFound {
                entity: "raw material",
                id: fabric_id.to_string(),
            })?;

        let required = self.material_required(quantity);
        let mut product = FinishedGoodsProduct {
            id: new_uuid_to_bech32("sku_")?,
            producer_id: producer.id.clone(),
            name: draft.name,
            color: material.color.clone(),
            stock: 0,
            threshold: draft.threshold,
            fabric_id: material.fabric_id.clone(),
        };

        let entry = UsageLogEntry {
            id: new_uuid_to_bech32("use_")?,
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            fabric_id: material.fabric_id.clone(),
            fabric_name: material.name.clone(),
            material_used: required,
            quantity_produced: quantity,
            created_at: TimeStamp::now(),
        };

        let (balance, stock) = self
            .store
            .commit_production(&producer.id, fabric_id, required, &product, quantity, &entry)
            .map_err(|err| map_material_shortfall(err, required))?;
        product.stock = stock;

        tracing::info!(
            product_id = %product.id,
            quantity,
            required,
            balance,
            "new SKU produced"
        );
        Ok((product, entry))
    }
}

/// The store reports a generic stock guard failure; production surfaces it
/// under its own name.
fn map_material_shortfall(err: LedgerError, required: f64) -> anyhow::Error {
    match err {
        LedgerError::InsufficientStock { available, .. } => {
            WorkflowError::InsufficientRawMaterial {
                available,
                required,
            }
            .into()
        }
        other => other.into(),
    }
}
