//! Ledger store over sled
//!
//! One named tree per ledger or log. Every quantity adjustment is a single
//! sled transaction so the non-negativity guard and the write land together;
//! operations on different keys never block each other. Request writes are
//! compare-and-set on the stored status, so two writers racing the same
//! transition cannot both land. Business preconditions (which transitions
//! are legal, ownership, conversion math) stay with the calling engines.
use crate::error::LedgerError;
use crate::model::{Fabric, FinishedGoodsProduct, RawMaterial, RawMaterialMeta, SaleRecord, UsageLogEntry};
use crate::request::{PurchaseRequest, RequestStatus};
use crate::utils::{new_uuid_to_bech32, round2};
use sled::transaction::{ConflictableTransactionError, TransactionError, TransactionalTree};
use sled::{Db, Transactional, Tree};

type TxErr = ConflictableTransactionError<LedgerError>;

fn abort(err: LedgerError) -> TxErr {
    ConflictableTransactionError::Abort(err)
}

fn run<T>(res: Result<T, TransactionError<LedgerError>>) -> Result<T, LedgerError> {
    res.map_err(|err| match err {
        TransactionError::Abort(inner) => inner,
        TransactionError::Storage(storage) => LedgerError::Storage(storage),
    })
}

fn enc<T: minicbor::Encode<()>>(value: &T) -> Result<Vec<u8>, LedgerError> {
    minicbor::to_vec(value).map_err(|e| LedgerError::Encode(e.to_string()))
}

fn dec<T: for<'b> minicbor::Decode<'b, ()>>(bytes: &[u8]) -> Result<T, LedgerError> {
    minicbor::decode(bytes).map_err(|e| LedgerError::Decode(e.to_string()))
}

// raw-material rows are keyed per producer+fabric pair
fn raw_material_key(producer_id: &str, fabric_id: &str) -> String {
    format!("{producer_id}/{fabric_id}")
}

#[derive(Clone)]
pub struct LedgerStore {
    fabrics: Tree,
    raw_materials: Tree,
    finished_goods: Tree,
    requests: Tree,
    sales: Tree,
    usage_log: Tree,
    attachments: Tree,
}

impl LedgerStore {
    pub fn open(db: &Db) -> Result<Self, LedgerError> {
        Ok(Self {
            fabrics: db.open_tree("fabrics")?,
            raw_materials: db.open_tree("raw_materials")?,
            finished_goods: db.open_tree("finished_goods")?,
            requests: db.open_tree("requests")?,
            sales: db.open_tree("sales")?,
            usage_log: db.open_tree("usage_log")?,
            attachments: db.open_tree("attachments")?,
        })
    }

    // FABRIC LEDGER

    pub fn insert_fabric(&self, fabric: &Fabric) -> Result<(), LedgerError> {
        self.fabrics.insert(fabric.id.as_bytes(), enc(fabric)?)?;
        Ok(())
    }

    pub fn get_fabric(&self, fabric_id: &str) -> Result<Option<Fabric>, LedgerError> {
        match self.fabrics.get(fabric_id)? {
            Some(bytes) => Ok(Some(dec(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Adjust a fabric's stock by `delta` metres, returning the new balance.
    /// Fails with `InsufficientStock` if the result would be negative; the
    /// check and the write are one atomic step.
    pub fn adjust_fabric_stock(&self, fabric_id: &str, delta: f64) -> Result<f64, LedgerError> {
        run(self.fabrics.transaction(|tx| {
            Ok(Self::tx_adjust_fabric(tx, fabric_id, delta)?)
        }))
    }

    /// Supplier manual edit: overwrite price and/or stock. The stock value
    /// is taken as-is (it is a correction, not a delta) but may not be
    /// negative.
    pub fn update_fabric(
        &self,
        fabric_id: &str,
        price_per_unit: Option<u64>,
        stock: Option<f64>,
    ) -> Result<Fabric, LedgerError> {
        run(self.fabrics.transaction(|tx| {
            let bytes = tx
                .get(fabric_id)?
                .ok_or_else(|| abort(LedgerError::MissingEntry(fabric_id.to_string())))?;
            let mut fabric: Fabric = dec(&bytes).map_err(abort)?;

            if let Some(price) = price_per_unit {
                fabric.price_per_unit = price;
            }
            if let Some(new_stock) = stock {
                if new_stock < 0.0 {
                    return Err(abort(LedgerError::InsufficientStock {
                        key: fabric_id.to_string(),
                        available: fabric.stock,
                        requested: -new_stock,
                    }));
                }
                fabric.stock = round2(new_stock);
            }

            tx.insert(fabric_id.as_bytes(), enc(&fabric).map_err(abort)?)?;
            Ok(fabric)
        }))
    }

    pub fn fabrics_for_supplier(&self, supplier_id: &str) -> Result<Vec<Fabric>, LedgerError> {
        let mut out = Vec::new();
        for item in self.fabrics.iter() {
            let (_, bytes) = item?;
            let fabric: Fabric = dec(&bytes)?;
            if fabric.supplier_id == supplier_id {
                out.push(fabric);
            }
        }
        Ok(out)
    }

    pub fn all_fabrics(&self) -> Result<Vec<Fabric>, LedgerError> {
        let mut out = Vec::new();
        for item in self.fabrics.iter() {
            let (_, bytes) = item?;
            out.push(dec(&bytes)?);
        }
        Ok(out)
    }

    // RAW-MATERIAL LEDGER

    pub fn get_raw_material(
        &self,
        producer_id: &str,
        fabric_id: &str,
    ) -> Result<Option<RawMaterial>, LedgerError> {
        let key = raw_material_key(producer_id, fabric_id);
        match self.raw_materials.get(&key)? {
            Some(bytes) => Ok(Some(dec(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Adjust a producer's raw-material balance for one fabric. A positive
    /// delta creates the row if it is absent (carrying the display meta); a
    /// negative result aborts with `InsufficientStock`.
    pub fn adjust_raw_material(
        &self,
        producer_id: &str,
        fabric_id: &str,
        delta: f64,
        meta: &RawMaterialMeta,
    ) -> Result<f64, LedgerError> {
        let fresh_id = mint_id("raw_")?;
        run(self.raw_materials.transaction(|tx| {
            Ok(Self::tx_adjust_raw_material(
                tx,
                producer_id,
                fabric_id,
                delta,
                meta,
                &fresh_id,
            )?)
        }))
    }

    pub fn raw_materials_for_producer(
        &self,
        producer_id: &str,
    ) -> Result<Vec<RawMaterial>, LedgerError> {
        let mut out = Vec::new();
        for item in self.raw_materials.iter() {
            let (_, bytes) = item?;
            let material: RawMaterial = dec(&bytes)?;
            if material.producer_id == producer_id {
                out.push(material);
            }
        }
        Ok(out)
    }

    // FINISHED-GOODS LEDGER

    pub fn insert_product(&self, product: &FinishedGoodsProduct) -> Result<(), LedgerError> {
        self.finished_goods
            .insert(product.id.as_bytes(), enc(product)?)?;
        Ok(())
    }

    pub fn get_product(
        &self,
        product_id: &str,
    ) -> Result<Option<FinishedGoodsProduct>, LedgerError> {
        match self.finished_goods.get(product_id)? {
            Some(bytes) => Ok(Some(dec(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Adjust a SKU's piece count by `delta`, returning the new count.
    pub fn adjust_finished_goods(&self, product_id: &str, delta: i64) -> Result<u32, LedgerError> {
        run(self.finished_goods.transaction(|tx| {
            let bytes = tx
                .get(product_id)?
                .ok_or_else(|| abort(LedgerError::MissingEntry(product_id.to_string())))?;
            let mut product: FinishedGoodsProduct = dec(&bytes).map_err(abort)?;

            let next = i64::from(product.stock) + delta;
            if next < 0 {
                return Err(abort(LedgerError::InsufficientStock {
                    key: product_id.to_string(),
                    available: f64::from(product.stock),
                    requested: -delta as f64,
                }));
            }
            product.stock = next as u32;

            tx.insert(product_id.as_bytes(), enc(&product).map_err(abort)?)?;
            Ok(product.stock)
        }))
    }

    pub fn products_for_producer(
        &self,
        producer_id: &str,
    ) -> Result<Vec<FinishedGoodsProduct>, LedgerError> {
        let mut out = Vec::new();
        for item in self.finished_goods.iter() {
            let (_, bytes) = item?;
            let product: FinishedGoodsProduct = dec(&bytes)?;
            if product.producer_id == producer_id {
                out.push(product);
            }
        }
        Ok(out)
    }

    // PURCHASE REQUESTS

    pub fn put_request(&self, request: &PurchaseRequest) -> Result<(), LedgerError> {
        self.requests.insert(request.id.as_bytes(), enc(request)?)?;
        Ok(())
    }

    pub fn get_request(&self, request_id: &str) -> Result<Option<PurchaseRequest>, LedgerError> {
        match self.requests.get(request_id)? {
            Some(bytes) => Ok(Some(dec(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn requests_for_producer(
        &self,
        producer_id: &str,
    ) -> Result<Vec<PurchaseRequest>, LedgerError> {
        self.filter_requests(|r| r.producer_id == producer_id)
    }

    pub fn requests_for_supplier(
        &self,
        supplier_id: &str,
    ) -> Result<Vec<PurchaseRequest>, LedgerError> {
        self.filter_requests(|r| r.supplier_id == supplier_id)
    }

    fn filter_requests(
        &self,
        keep: impl Fn(&PurchaseRequest) -> bool,
    ) -> Result<Vec<PurchaseRequest>, LedgerError> {
        let mut out = Vec::new();
        for item in self.requests.iter() {
            let (_, bytes) = item?;
            let request: PurchaseRequest = dec(&bytes)?;
            if keep(&request) {
                out.push(request);
            }
        }
        Ok(out)
    }

    /// Persist a request whose stored status still matches `expected`.
    /// Concurrent writers race on the same row; the loser's copy is stale
    /// and its write aborts with `StaleRequest` instead of clobbering.
    pub fn put_request_guarded(
        &self,
        request: &PurchaseRequest,
        expected: RequestStatus,
    ) -> Result<(), LedgerError> {
        let request_bytes = enc(request)?;
        run(self.requests.transaction(|tx| {
            Self::tx_expect_request_status(tx, &request.id, expected)?;
            tx.insert(request.id.as_bytes(), request_bytes.clone())?;
            Ok(())
        }))
    }

    // COMPOSITE COMMITS
    //
    // Each of these ties a guarded quantity adjustment to the record write
    // that justifies it, in one multi-tree transaction. The stored request
    // is re-read inside the transaction and must still hold the expected
    // prior status; a guard failure rolls back the whole unit, so the same
    // transition can never land twice.

    /// Adjust fabric stock and persist the request in the same transaction.
    /// Used for approval (negative delta) and cancellation (positive delta).
    pub fn adjust_fabric_and_put_request(
        &self,
        fabric_id: &str,
        delta: f64,
        request: &PurchaseRequest,
        expected: RequestStatus,
    ) -> Result<f64, LedgerError> {
        let request_bytes = enc(request)?;
        run(
            (&self.fabrics, &self.requests).transaction(|(fabrics, requests)| {
                Self::tx_expect_request_status(requests, &request.id, expected)?;
                let balance = Self::tx_adjust_fabric(fabrics, fabric_id, delta)?;
                requests.insert(request.id.as_bytes(), request_bytes.clone())?;
                Ok(balance)
            }),
        )
    }

    /// Credit the producer's raw-material row and persist the request in
    /// the same transaction. Used for completion; the row is created on
    /// first completion of a producer+fabric pair.
    pub fn credit_raw_material_and_put_request(
        &self,
        producer_id: &str,
        fabric_id: &str,
        delta: f64,
        meta: &RawMaterialMeta,
        request: &PurchaseRequest,
        expected: RequestStatus,
    ) -> Result<f64, LedgerError> {
        let fresh_id = mint_id("raw_")?;
        let request_bytes = enc(request)?;
        run(
            (&self.raw_materials, &self.requests).transaction(|(materials, requests)| {
                Self::tx_expect_request_status(requests, &request.id, expected)?;
                let balance = Self::tx_adjust_raw_material(
                    materials,
                    producer_id,
                    fabric_id,
                    delta,
                    meta,
                    &fresh_id,
                )?;
                requests.insert(request.id.as_bytes(), request_bytes.clone())?;
                Ok(balance)
            }),
        )
    }

    /// Debit raw material, credit the SKU's piece count and append the
    /// usage entry as one unit. The SKU row is read and adjusted inside the
    /// transaction, so a sale landing concurrently is never erased; when no
    /// row exists yet, `template` is inserted carrying the run's output. A
    /// raw-material shortfall leaves neither a stock change nor a stranded
    /// SKU. Returns the raw-material balance and the SKU's new count.
    pub fn commit_production(
        &self,
        producer_id: &str,
        fabric_id: &str,
        material_used: f64,
        template: &FinishedGoodsProduct,
        quantity: u32,
        entry: &UsageLogEntry,
    ) -> Result<(f64, u32), LedgerError> {
        let entry_bytes = enc(entry)?;
        run(
            (&self.raw_materials, &self.finished_goods, &self.usage_log).transaction(
                |(materials, products, usage)| {
                    let key = raw_material_key(producer_id, fabric_id);
                    let bytes = materials
                        .get(key.as_bytes())?
                        .ok_or_else(|| abort(LedgerError::MissingEntry(key.clone())))?;
                    let mut material: RawMaterial = dec(&bytes).map_err(abort)?;

                    let next = round2(material.quantity - material_used);
                    if next < 0.0 {
                        return Err(abort(LedgerError::InsufficientStock {
                            key: key.clone(),
                            available: material.quantity,
                            requested: material_used,
                        }));
                    }
                    material.quantity = next;

                    let mut product = match products.get(template.id.as_bytes())? {
                        Some(bytes) => dec::<FinishedGoodsProduct>(&bytes).map_err(abort)?,
                        None => template.clone(),
                    };
                    let stock = i64::from(product.stock) + i64::from(quantity);
                    if stock > i64::from(u32::MAX) {
                        return Err(abort(LedgerError::CounterOverflow {
                            key: template.id.clone(),
                        }));
                    }
                    product.stock = stock as u32;

                    materials.insert(key.as_bytes(), enc(&material).map_err(abort)?)?;
                    products.insert(product.id.as_bytes(), enc(&product).map_err(abort)?)?;
                    usage.insert(entry.id.as_bytes(), entry_bytes.clone())?;
                    Ok((next, product.stock))
                },
            ),
        )
    }

    /// Debit the SKU by the sold quantity and append the sale record as one
    /// unit. A stock shortfall appends nothing.
    pub fn commit_sale(&self, record: &SaleRecord) -> Result<u32, LedgerError> {
        let record_bytes = enc(record)?;
        run(
            (&self.finished_goods, &self.sales).transaction(|(products, sales)| {
                let bytes = products
                    .get(record.product_id.as_bytes())?
                    .ok_or_else(|| abort(LedgerError::MissingEntry(record.product_id.clone())))?;
                let mut product: FinishedGoodsProduct = dec(&bytes).map_err(abort)?;

                if product.stock < record.quantity {
                    return Err(abort(LedgerError::InsufficientStock {
                        key: record.product_id.clone(),
                        available: f64::from(product.stock),
                        requested: f64::from(record.quantity),
                    }));
                }
                product.stock -= record.quantity;

                products.insert(record.product_id.as_bytes(), enc(&product).map_err(abort)?)?;
                sales.insert(record.id.as_bytes(), record_bytes.clone())?;
                Ok(product.stock)
            }),
        )
    }

    // APPEND-ONLY LOG READS

    pub fn sales(&self) -> Result<Vec<SaleRecord>, LedgerError> {
        let mut out = Vec::new();
        for item in self.sales.iter() {
            let (_, bytes) = item?;
            out.push(dec(&bytes)?);
        }
        Ok(out)
    }

    pub fn usage_history(&self) -> Result<Vec<UsageLogEntry>, LedgerError> {
        let mut out = Vec::new();
        for item in self.usage_log.iter() {
            let (_, bytes) = item?;
            out.push(dec(&bytes)?);
        }
        Ok(out)
    }

    // ATTACHMENTS

    /// Store an opaque payment-proof payload, content-addressed by its
    /// sha256 digest. The digest is the reference carried on the request.
    pub fn put_attachment(&self, payload: &[u8]) -> Result<String, LedgerError> {
        let digest = sha256::digest(payload);
        self.attachments.insert(digest.as_bytes(), payload)?;
        Ok(digest)
    }

    pub fn get_attachment(&self, reference: &str) -> Result<Option<Vec<u8>>, LedgerError> {
        Ok(self.attachments.get(reference)?.map(|ivec| ivec.to_vec()))
    }

    // shared transaction bodies

    fn tx_expect_request_status(
        tx: &TransactionalTree,
        request_id: &str,
        expected: RequestStatus,
    ) -> Result<(), TxErr> {
        let bytes = tx
            .get(request_id)?
            .ok_or_else(|| abort(LedgerError::MissingEntry(request_id.to_string())))?;
        let stored: PurchaseRequest = dec(&bytes).map_err(abort)?;
        if stored.status != expected {
            return Err(abort(LedgerError::StaleRequest {
                id: request_id.to_string(),
                expected,
                found: stored.status,
            }));
        }
        Ok(())
    }

    fn tx_adjust_fabric(
        tx: &TransactionalTree,
        fabric_id: &str,
        delta: f64,
    ) -> Result<f64, TxErr> {
        let bytes = tx
            .get(fabric_id)?
            .ok_or_else(|| abort(LedgerError::MissingEntry(fabric_id.to_string())))?;
        let mut fabric: Fabric = dec(&bytes).map_err(abort)?;

        let next = round2(fabric.stock + delta);
        if next < 0.0 {
            return Err(abort(LedgerError::InsufficientStock {
                key: fabric_id.to_string(),
                available: fabric.stock,
                requested: -delta,
            }));
        }
        fabric.stock = next;

        tx.insert(fabric_id.as_bytes(), enc(&fabric).map_err(abort)?)?;
        Ok(next)
    }

    fn tx_adjust_raw_material(
        tx: &TransactionalTree,
        producer_id: &str,
        fabric_id: &str,
        delta: f64,
        meta: &RawMaterialMeta,
        fresh_id: &str,
    ) -> Result<f64, TxErr> {
        let key = raw_material_key(producer_id, fabric_id);
        let mut material = match tx.get(key.as_bytes())? {
            Some(bytes) => dec::<RawMaterial>(&bytes).map_err(abort)?,
            None => {
                if delta <= 0.0 {
                    return Err(abort(LedgerError::MissingEntry(key)));
                }
                RawMaterial {
                    id: fresh_id.to_string(),
                    producer_id: producer_id.to_string(),
                    fabric_id: fabric_id.to_string(),
                    name: meta.name.clone(),
                    color: meta.color.clone(),
                    quantity: 0.0,
                }
            }
        };

        let next = round2(material.quantity + delta);
        if next < 0.0 {
            return Err(abort(LedgerError::InsufficientStock {
                key,
                available: material.quantity,
                requested: -delta,
            }));
        }
        material.quantity = next;

        tx.insert(key.as_bytes(), enc(&material).map_err(abort)?)?;
        Ok(next)
    }
}

fn mint_id(prefix: &str) -> Result<String, LedgerError> {
    new_uuid_to_bech32(prefix).map_err(|e| LedgerError::IdMint(e.to_string()))
}
