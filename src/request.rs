//! Purchase request record and its lifecycle states
use crate::model::TimeStamp;
use crate::utils::short_ref;
use chrono::Utc;

/// Lifecycle states of a purchase request.
///
/// `Pending` and `WaitingVerification` are both "awaiting supplier
/// verification": a request may be approved or rejected straight from
/// `Pending` when a proof is already attached, or after the proof upload
/// moved it to `WaitingVerification`.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    WaitingVerification,
    #[n(2)]
    Approved,
    #[n(3)]
    Shipped,
    #[n(4)]
    Rejected,
    #[n(5)]
    Cancelled,
    #[n(6)]
    Completed,
}

impl RequestStatus {
    /// True while the supplier may still approve or reject.
    pub fn awaits_verification(self) -> bool {
        matches!(self, Self::Pending | Self::WaitingVerification)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::Cancelled | Self::Completed)
    }

    /// The legal edges of the lifecycle graph. Status changes are monotonic:
    /// nothing skips a required predecessor, and the only short-circuits are
    /// rejection (from either awaiting state) and cancellation (from
    /// approved).
    pub fn can_transition_to(self, next: RequestStatus) -> bool {
        use RequestStatus::*;

        matches!(
            (self, next),
            (Pending, WaitingVerification)
                | (Pending | WaitingVerification, Approved)
                | (Pending | WaitingVerification, Rejected)
                | (Approved, Shipped)
                | (Approved, Cancelled)
                | (Shipped, Completed)
        )
    }
}

/// A single-fabric, single-quantity purchase negotiation between one
/// producer and one supplier. Never deleted; the status field is owned
/// exclusively by the request lifecycle engine.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct PurchaseRequest {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub producer_id: String,
    #[n(2)]
    pub producer_name: String,
    #[n(3)]
    pub supplier_id: String,
    #[n(4)]
    pub supplier_name: String,
    #[n(5)]
    pub fabric_id: String,
    #[n(6)]
    pub fabric_name: String,
    #[n(7)]
    pub fabric_color: String,
    #[n(8)]
    pub quantity: f64,
    #[n(9)]
    pub status: RequestStatus,
    #[n(10)]
    pub created_at: TimeStamp<Utc>,
    #[n(11)]
    pub notes: Option<String>,
    /// Content hash of the uploaded payment proof, when present. The core
    /// only ever checks presence; the payload stays opaque.
    #[n(12)]
    pub payment_proof: Option<String>,
}

impl PurchaseRequest {
    /// Short order reference used in human-facing messages, e.g. `#4f2a`.
    pub fn short_id(&self) -> &str {
        short_ref(&self.id)
    }
}
