//! Request lifecycle engine
//!
//! Owns every status transition of a purchase request and is the only
//! component that moves material between the supplier fabric ledger and the
//! producer raw-material ledger. The fabric debit happens at approval, the
//! raw-material credit at completion: goods are reserved at the supplier
//! first and physically received by the producer later.
use crate::error::{LedgerError, WorkflowError};
use crate::ledger::LedgerStore;
use crate::model::{Party, RawMaterialMeta, Role, TimeStamp};
use crate::notify::Notification;
use crate::request::{PurchaseRequest, RequestStatus};
use crate::utils::new_uuid_to_bech32;

/// Outcome of a supplier approval attempt. A stock shortfall is not a plain
/// error: the request stays untouched but the producer still gets a
/// disruption notification, and the supplier sees the reason.
#[derive(Debug)]
pub enum ApprovalOutcome {
    Approved {
        request: PurchaseRequest,
        notifications: Vec<Notification>,
    },
    Disrupted {
        request: PurchaseRequest,
        reason: String,
        notifications: Vec<Notification>,
    },
}

pub struct RequestService {
    store: LedgerStore,
}

impl RequestService {
    pub fn new(store: LedgerStore) -> Self {
        Self { store }
    }

    /// Producer submits a new request for one fabric. No stock-sufficiency
    /// check happens here: stock may legitimately change before approval,
    /// and only the approval check is authoritative.
    pub fn submit_request(
        &self,
        producer: &Party,
        fabric_id: &str,
        quantity: f64,
        notes: Option<String>,
    ) -> anyhow::Result<(PurchaseRequest, Vec<Notification>)> {
        producer.require_role(Role::Producer)?;
        if quantity <= 0.0 {
            return Err(WorkflowError::NonPositiveQuantity.into());
        }

        let fabric = self
            .store
            .get_fabric(fabric_id)?
            .ok_or_else(|| WorkflowError::NotFound {
                entity: "fabric",
                id: fabric_id.to_string(),
            })?;

        let request = PurchaseRequest {
            id: new_uuid_to_bech32("req_")?,
            producer_id: producer.id.clone(),
            producer_name: producer.name.clone(),
            supplier_id: fabric.supplier_id.clone(),
            supplier_name: fabric.supplier_name.clone(),
            fabric_id: fabric.id.clone(),
            fabric_name: fabric.name.clone(),
            fabric_color: fabric.color.clone(),
            quantity,
            status: RequestStatus::Pending,
            created_at: TimeStamp::now(),
            notes,
            payment_proof: None,
        };
        self.store.put_request(&request)?;

        tracing::info!(request_id = %request.id, fabric_id, quantity, "request submitted");

        let notifications = vec![Notification::info(
            &fabric.supplier_id,
            "New Material Order!",
            format!("{} submitted an order.", producer.name),
        )];
        Ok((request, notifications))
    }

    /// Producer attaches a payment proof; the payload is stored opaquely and
    /// only its content hash is carried on the request.
    pub fn upload_payment_proof(
        &self,
        producer: &Party,
        request_id: &str,
        proof: &[u8],
    ) -> anyhow::Result<(PurchaseRequest, Vec<Notification>)> {
        producer.require_role(Role::Producer)?;
        let mut request = self.load_owned(request_id, &producer.id, Owner::Producer)?;
        ensure_transition(&request, RequestStatus::WaitingVerification)?;

        let previous = request.status;
        let reference = self.store.put_attachment(proof)?;
        request.payment_proof = Some(reference);
        request.status = RequestStatus::WaitingVerification;
        self.store
            .put_request_guarded(&request, previous)
            .map_err(|err| map_stale_request(err, RequestStatus::WaitingVerification))?;

        tracing::info!(request_id = %request.id, "payment proof uploaded");

        let notifications = vec![Notification::info(
            &request.supplier_id,
            "Payment Proof Uploaded",
            format!(
                "{} has uploaded proof for #{}",
                producer.name,
                request.short_id()
            ),
        )];
        Ok((request, notifications))
    }

    /// Supplier verifies payment. On success the requested quantity is
    /// debited from the fabric ledger atomically with the status flip; a
    /// shortfall leaves everything unchanged but still emits a disruption
    /// notification to the producer.
    pub fn approve_request(
        &self,
        supplier: &Party,
        request_id: &str,
    ) -> anyhow::Result<ApprovalOutcome> {
        supplier.require_role(Role::Supplier)?;
        let mut request = self.load_owned(request_id, &supplier.id, Owner::Supplier)?;
        ensure_transition(&request, RequestStatus::Approved)?;

        let previous = request.status;
        request.status = RequestStatus::Approved;

        match self.store.adjust_fabric_and_put_request(
            &request.fabric_id,
            -request.quantity,
            &request,
            previous,
        ) {
            Ok(balance) => {
                tracing::info!(
                    request_id = %request.id,
                    fabric_id = %request.fabric_id,
                    balance,
                    "request approved, fabric debited"
                );
                let notifications = vec![Notification::success(
                    &request.producer_id,
                    "Payment Verified!",
                    format!(
                        "Order #{} verified. Supplier will ship soon.",
                        request.short_id()
                    ),
                )];
                Ok(ApprovalOutcome::Approved {
                    request,
                    notifications,
                })
            }
            Err(err @ LedgerError::InsufficientStock { .. }) => {
                request.status = previous;
                tracing::warn!(request_id = %request.id, %err, "approval blocked by stock");
                let notifications = vec![Notification::error(
                    &request.producer_id,
                    "Order Disruption",
                    format!(
                        "Order #{} couldn't be approved due to stock issues at supplier.",
                        request.short_id()
                    ),
                )];
                Ok(ApprovalOutcome::Disrupted {
                    request,
                    reason: err.to_string(),
                    notifications,
                })
            }
            Err(other) => Err(map_stale_request(other, RequestStatus::Approved)),
        }
    }

    /// Supplier rejects the payment proof. Terminal; no stock was debited.
    pub fn reject_request(
        &self,
        supplier: &Party,
        request_id: &str,
    ) -> anyhow::Result<(PurchaseRequest, Vec<Notification>)> {
        supplier.require_role(Role::Supplier)?;
        let mut request = self.load_owned(request_id, &supplier.id, Owner::Supplier)?;
        ensure_transition(&request, RequestStatus::Rejected)?;

        let previous = request.status;
        request.status = RequestStatus::Rejected;
        self.store
            .put_request_guarded(&request, previous)
            .map_err(|err| map_stale_request(err, RequestStatus::Rejected))?;

        tracing::info!(request_id = %request.id, "request rejected");

        let notifications = vec![Notification::error(
            &request.producer_id,
            "Payment Rejected",
            format!(
                "Payment proof for #{} was rejected. Order cancelled.",
                request.short_id()
            ),
        )];
        Ok((request, notifications))
    }

    /// Supplier marks the approved order as shipped. Stock was already
    /// debited at approval; nothing moves here.
    pub fn ship_request(
        &self,
        supplier: &Party,
        request_id: &str,
    ) -> anyhow::Result<(PurchaseRequest, Vec<Notification>)> {
        supplier.require_role(Role::Supplier)?;
        let mut request = self.load_owned(request_id, &supplier.id, Owner::Supplier)?;
        ensure_transition(&request, RequestStatus::Shipped)?;

        let previous = request.status;
        request.status = RequestStatus::Shipped;
        self.store
            .put_request_guarded(&request, previous)
            .map_err(|err| map_stale_request(err, RequestStatus::Shipped))?;

        tracing::info!(request_id = %request.id, "request shipped");

        let notifications = vec![Notification::info(
            &request.producer_id,
            "Order Shipped",
            format!("Order #{} is on its way.", request.short_id()),
        )];
        Ok((request, notifications))
    }

    /// Supplier voids an approved order. The quantity debited at approval is
    /// credited back to the fabric ledger atomically with the status flip,
    /// so cancelled stock is never stranded.
    pub fn cancel_request(
        &self,
        supplier: &Party,
        request_id: &str,
    ) -> anyhow::Result<(PurchaseRequest, Vec<Notification>)> {
        supplier.require_role(Role::Supplier)?;
        let mut request = self.load_owned(request_id, &supplier.id, Owner::Supplier)?;
        ensure_transition(&request, RequestStatus::Cancelled)?;

        let previous = request.status;
        request.status = RequestStatus::Cancelled;
        let balance = self
            .store
            .adjust_fabric_and_put_request(&request.fabric_id, request.quantity, &request, previous)
            .map_err(|err| map_stale_request(err, RequestStatus::Cancelled))?;

        tracing::info!(
            request_id = %request.id,
            fabric_id = %request.fabric_id,
            balance,
            "request cancelled, fabric restored"
        );

        let notifications = vec![Notification::warning(
            &request.producer_id,
            "Order Cancelled",
            format!(
                "Order #{} was cancelled by the supplier.",
                request.short_id()
            ),
        )];
        Ok((request, notifications))
    }

    /// Producer confirms receipt. The requested quantity is credited to the
    /// producer's raw-material ledger (creating the row on first completion
    /// for this fabric) atomically with the status flip, so a completed
    /// request contributes exactly once.
    pub fn complete_request(
        &self,
        producer: &Party,
        request_id: &str,
    ) -> anyhow::Result<(PurchaseRequest, Vec<Notification>)> {
        producer.require_role(Role::Producer)?;
        let mut request = self.load_owned(request_id, &producer.id, Owner::Producer)?;
        ensure_transition(&request, RequestStatus::Completed)?;

        let previous = request.status;
        request.status = RequestStatus::Completed;
        let meta = RawMaterialMeta {
            name: request.fabric_name.clone(),
            color: request.fabric_color.clone(),
        };
        let balance = self
            .store
            .credit_raw_material_and_put_request(
                &request.producer_id,
                &request.fabric_id,
                request.quantity,
                &meta,
                &request,
                previous,
            )
            .map_err(|err| map_stale_request(err, RequestStatus::Completed))?;

        tracing::info!(
            request_id = %request.id,
            fabric_id = %request.fabric_id,
            balance,
            "request completed, raw material credited"
        );

        let notifications = vec![Notification::success(
            &request.producer_id,
            "Materials Received",
            format!(
                "{} ({}) added to local stock.",
                request.fabric_name, request.fabric_color
            ),
        )];
        Ok((request, notifications))
    }

    pub fn get_request(&self, request_id: &str) -> anyhow::Result<Option<PurchaseRequest>> {
        Ok(self.store.get_request(request_id)?)
    }

    fn load_owned(
        &self,
        request_id: &str,
        party_id: &str,
        owner: Owner,
    ) -> anyhow::Result<PurchaseRequest> {
        let request = self
            .store
            .get_request(request_id)?
            .ok_or_else(|| WorkflowError::NotFound {
                entity: "request",
                id: request_id.to_string(),
            })?;

        let owner_id = match owner {
            Owner::Producer => &request.producer_id,
            Owner::Supplier => &request.supplier_id,
        };
        if owner_id != party_id {
            return Err(WorkflowError::UnauthorizedParty {
                party_id: party_id.to_string(),
                entity: "request",
                id: request_id.to_string(),
            }
            .into());
        }
        Ok(request)
    }
}

enum Owner {
    Producer,
    Supplier,
}

/// A concurrent writer flipped the request between our read and our write.
/// The loser reports the same `InvalidTransition` it would have seen had it
/// read second.
fn map_stale_request(err: LedgerError, to: RequestStatus) -> anyhow::Error {
    match err {
        LedgerError::StaleRequest { id, found, .. } => WorkflowError::InvalidTransition {
            id,
            from: found,
            to,
        }
        .into(),
        other => other.into(),
    }
}

fn ensure_transition(request: &PurchaseRequest, next: RequestStatus) -> anyhow::Result<()> {
    if !request.status.can_transition_to(next) {
        return Err(WorkflowError::InvalidTransition {
            id: request.id.clone(),
            from: request.status,
            to: next,
        }
        .into());
    }
    Ok(())
}
