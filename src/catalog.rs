//! Supplier fabric catalog
//!
//! Covers the two supplier-owned mutation paths of the fabric record:
//! listing a new fabric and the manual price/stock edit. Everything else
//! that touches fabric stock goes through the request lifecycle engine.
use crate::error::WorkflowError;
use crate::ledger::LedgerStore;
use crate::model::{Fabric, FabricDraft, Party, Role};
use crate::utils::{new_uuid_to_bech32, round2};

pub struct CatalogService {
    store: LedgerStore,
}

impl CatalogService {
    pub fn new(store: LedgerStore) -> Self {
        Self { store }
    }

    pub fn add_fabric(&self, supplier: &Party, draft: FabricDraft) -> anyhow::Result<Fabric> {
        supplier.require_role(Role::Supplier)?;
        if draft.stock < 0.0 {
            anyhow::bail!("fabric stock cannot be listed negative");
        }

        let fabric = Fabric {
            id: new_uuid_to_bech32("fab_")?,
            supplier_id: supplier.id.clone(),
            supplier_name: supplier.name.clone(),
            name: draft.name,
            kind: draft.kind,
            color: draft.color,
            price_per_unit: draft.price_per_unit,
            stock: round2(draft.stock),
        };
        self.store.insert_fabric(&fabric)?;

        tracing::info!(fabric_id = %fabric.id, stock = fabric.stock, "fabric listed");
        Ok(fabric)
    }

    /// Manual edit of price and/or stock. The stock figure is a correction,
    /// not a delta; the store rejects a negative value.
    pub fn update_fabric(
        &self,
        supplier: &Party,
        fabric_id: &str,
        price_per_unit: Option<u64>,
        stock: Option<f64>,
    ) -> anyhow::Result<Fabric> {
        supplier.require_role(Role::Supplier)?;

        let existing = self
            .store
            .get_fabric(fabric_id)?
            .ok_or_else(|| WorkflowError::NotFound {
                entity: "fabric",
                id: fabric_id.to_string(),
            })?;
        if existing.supplier_id != supplier.id {
            return Err(WorkflowError::UnauthorizedParty {
                party_id: supplier.id.clone(),
                entity: "fabric",
                id: fabric_id.to_string(),
            }
            .into());
        }

        let fabric = self.store.update_fabric(fabric_id, price_per_unit, stock)?;
        tracing::info!(fabric_id, stock = fabric.stock, "fabric edited");
        Ok(fabric)
    }

    pub fn fabrics_for_supplier(&self, supplier_id: &str) -> anyhow::Result<Vec<Fabric>> {
        Ok(self.store.fabrics_for_supplier(supplier_id)?)
    }

    pub fn all_fabrics(&self) -> anyhow::Result<Vec<Fabric>> {
        Ok(self.store.all_fabrics()?)
    }
}
