//! Core inventory records and caller identity types
use chrono::{DateTime, TimeZone, Utc};

/// The two parties a caller can act as. The core trusts this input; token
/// issuance and verification live outside the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Producer,
    Supplier,
}

/// Authenticated caller identity handed in by the boundary layer.
#[derive(Debug, Clone)]
pub struct Party {
    pub id: String,
    pub name: String,
    pub role: Role,
}

impl Party {
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role,
        }
    }

    /// Role gate at the top of every engine operation. The role itself is
    /// trusted input; only the claim is checked.
    pub fn require_role(&self, role: Role) -> anyhow::Result<()> {
        if self.role != role {
            anyhow::bail!("{} does not hold the {role:?} role", self.id);
        }
        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl TimeStamp<Utc> {
    pub fn now() -> Self {
        Self(Utc::now())
    }
    pub fn new_with(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Self {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .unwrap()
            .into()
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

/// Supplier-owned fabric stock unit. Stock is a length in metres; price is
/// in minor currency units per metre.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct Fabric {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub supplier_id: String,
    #[n(2)]
    pub supplier_name: String,
    #[n(3)]
    pub name: String,
    #[n(4)]
    pub kind: String,
    #[n(5)]
    pub color: String,
    #[n(6)]
    pub price_per_unit: u64,
    #[n(7)]
    pub stock: f64,
}

/// Fields a supplier provides when listing a new fabric; identity and
/// ownership are filled in by the catalog.
#[derive(Debug, Clone)]
pub struct FabricDraft {
    pub name: String,
    pub kind: String,
    pub color: String,
    pub price_per_unit: u64,
    pub stock: f64,
}

/// A producer's local on-hand quantity of one fabric type. Name and color
/// are denormalized from the source fabric at first completion.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct RawMaterial {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub producer_id: String,
    #[n(2)]
    pub fabric_id: String,
    #[n(3)]
    pub name: String,
    #[n(4)]
    pub color: String,
    #[n(5)]
    pub quantity: f64,
}

/// Display fields carried along when a raw-material row is created on the
/// fly by a positive adjustment.
#[derive(Debug, Clone)]
pub struct RawMaterialMeta {
    pub name: String,
    pub color: String,
}

/// A producer-defined sellable item. Stock counts whole pieces.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct FinishedGoodsProduct {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub producer_id: String,
    #[n(2)]
    pub name: String,
    #[n(3)]
    pub color: String,
    #[n(4)]
    pub stock: u32,
    #[n(5)]
    pub threshold: u32,
    #[n(6)]
    pub fabric_id: String,
}

/// Fields a producer chooses for a new SKU. Color and fabric linkage are
/// inherited from the raw-material entry, never free-typed.
#[derive(Debug, Clone)]
pub struct SkuDraft {
    pub name: String,
    pub threshold: u32,
}

/// Append-only retail sale record. `sale_date` is business-reported;
/// `created_at` is assigned by the engine and is authoritative.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct SaleRecord {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub product_id: String,
    #[n(2)]
    pub product_name: String,
    #[n(3)]
    pub quantity: u32,
    #[n(4)]
    pub tracking_number: String,
    #[n(5)]
    pub sale_date: TimeStamp<Utc>,
    #[n(6)]
    pub created_at: TimeStamp<Utc>,
}

/// Append-only production run record.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct UsageLogEntry {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub product_id: String,
    #[n(2)]
    pub product_name: String,
    #[n(3)]
    pub fabric_id: String,
    #[n(4)]
    pub fabric_name: String,
    #[n(5)]
    pub material_used: f64,
    #[n(6)]
    pub quantity_produced: u32,
    #[n(7)]
    pub created_at: TimeStamp<Utc>,
}
