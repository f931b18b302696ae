//! # Approval State Machine
//!
//! Sensitive actions wait for a supervisor. Each approval carries a payload
//! typed by its action, decoded once when the row is read.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │                    ┌──────────── approve ──────────► APPROVED ■         │
//! │   request ──► PENDING                                                   │
//! │                    └──────────── reject ───────────► REJECTED ■         │
//! │                                                                         │
//! │   ■ terminal: every further decision fails, nothing changes             │
//! │                                                                         │
//! │   REFUND approve → refund execution (same transaction)                  │
//! │   VOID   approve → void execution   (same transaction)                  │
//! │   DISCOUNT_OVERRIDE / PRICE_OVERRIDE approve → status only              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Stored Payload Envelope
//! ```text
//! approvals.payload = {"detail": {...action payload...},
//!                      "rejection": null | {"reason": "...", "rejected_at": "..."}}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::refund::RefundLine;
use crate::types::{ApprovalAction, ApprovalStatus};
use crate::validation::{validate_amount, validate_reason};

// =============================================================================
// Payloads
// =============================================================================

/// Snapshot taken when a refund is requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RefundPayload {
    pub lines: Vec<RefundLine>,
    pub total_amount: Money,
    pub window_days: i64,
    #[ts(as = "String")]
    pub deadline: DateTime<Utc>,
    pub reason: String,
    /// Remaining refundable amount before this request.
    pub remaining_refundable: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DiscountOverridePayload {
    #[serde(default)]
    pub product_id: Option<String>,
    pub discount_amount: Money,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PriceOverridePayload {
    pub product_id: String,
    pub original_price: Money,
    pub override_price: Money,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct VoidPayload {
    pub reason: String,
}

/// Action-specific payload. Serialized without a tag; the action travels
/// in its own column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[serde(untagged)]
#[ts(export)]
pub enum ApprovalPayload {
    Refund(RefundPayload),
    DiscountOverride(DiscountOverridePayload),
    PriceOverride(PriceOverridePayload),
    Void(VoidPayload),
}

impl ApprovalPayload {
    pub fn action(&self) -> ApprovalAction {
        match self {
            ApprovalPayload::Refund(_) => ApprovalAction::Refund,
            ApprovalPayload::DiscountOverride(_) => ApprovalAction::DiscountOverride,
            ApprovalPayload::PriceOverride(_) => ApprovalAction::PriceOverride,
            ApprovalPayload::Void(_) => ApprovalAction::Void,
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            ApprovalPayload::Refund(p) => &p.reason,
            ApprovalPayload::DiscountOverride(p) => &p.reason,
            ApprovalPayload::PriceOverride(p) => &p.reason,
            ApprovalPayload::Void(p) => &p.reason,
        }
    }

    /// Decodes a JSON detail object for the given action.
    pub fn from_value(action: ApprovalAction, detail: Value) -> CoreResult<Self> {
        fn typed<T: serde::de::DeserializeOwned>(detail: Value) -> CoreResult<T> {
            serde_json::from_value(detail).map_err(|e| CoreError::InvalidPayload(e.to_string()))
        }

        Ok(match action {
            ApprovalAction::Refund => ApprovalPayload::Refund(typed(detail)?),
            ApprovalAction::DiscountOverride => ApprovalPayload::DiscountOverride(typed(detail)?),
            ApprovalAction::PriceOverride => ApprovalPayload::PriceOverride(typed(detail)?),
            ApprovalAction::Void => ApprovalPayload::Void(typed(detail)?),
        })
    }

    /// Field checks for payloads submitted through the generic request
    /// endpoint. Trims the reason in place.
    pub fn validate(&mut self) -> CoreResult<()> {
        match self {
            ApprovalPayload::Refund(p) => {
                p.reason = validate_reason("reason", &p.reason)?;
            }
            ApprovalPayload::DiscountOverride(p) => {
                p.reason = validate_reason("payload.reason", &p.reason)?;
                validate_amount("payload.discount_amount", p.discount_amount.amount())?;
            }
            ApprovalPayload::PriceOverride(p) => {
                p.reason = validate_reason("payload.reason", &p.reason)?;
                if p.product_id.trim().is_empty() {
                    return Err(ValidationError::Required {
                        field: "payload.product_id".to_string(),
                    }
                    .into());
                }
                validate_amount("payload.override_price", p.override_price.amount())?;
                validate_amount("payload.original_price", p.original_price.amount())?;
            }
            ApprovalPayload::Void(p) => {
                p.reason = validate_reason("payload.reason", &p.reason)?;
            }
        }
        Ok(())
    }
}

// =============================================================================
// Envelope Codec
// =============================================================================

/// Rejection details recorded when a supervisor declines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Rejection {
    pub reason: String,
    #[ts(as = "String")]
    pub rejected_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct EnvelopeOut<'a> {
    detail: &'a ApprovalPayload,
    rejection: Option<&'a Rejection>,
}

#[derive(Deserialize)]
struct EnvelopeIn {
    detail: Value,
    #[serde(default)]
    rejection: Option<Rejection>,
}

/// Serializes the payload envelope stored in `approvals.payload`.
pub fn encode_payload(payload: &ApprovalPayload, rejection: Option<&Rejection>) -> CoreResult<String> {
    serde_json::to_string(&EnvelopeOut {
        detail: payload,
        rejection,
    })
    .map_err(|e| CoreError::InvalidPayload(e.to_string()))
}

/// Decodes a stored envelope for `action`.
pub fn decode_payload(
    action: ApprovalAction,
    raw: &str,
) -> CoreResult<(ApprovalPayload, Option<Rejection>)> {
    let envelope: EnvelopeIn =
        serde_json::from_str(raw).map_err(|e| CoreError::InvalidPayload(e.to_string()))?;
    let payload = ApprovalPayload::from_value(action, envelope.detail)?;
    Ok((payload, envelope.rejection))
}

// =============================================================================
// Approval
// =============================================================================

/// A supervisor's verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub const fn target_status(&self) -> ApprovalStatus {
        match self {
            Decision::Approve => ApprovalStatus::Approved,
            Decision::Reject => ApprovalStatus::Rejected,
        }
    }
}

/// An approval request with its decoded payload.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export)]
pub struct Approval {
    pub id: String,
    pub action: ApprovalAction,
    pub sale_id: Option<String>,
    pub requested_by: String,
    pub approved_by: Option<String>,
    pub status: ApprovalStatus,
    pub payload: ApprovalPayload,
    pub rejection: Option<Rejection>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub decided_at: Option<DateTime<Utc>>,
}

impl Approval {
    /// Checks that `decision` is a legal transition and returns the new
    /// status. Only PENDING may be decided.
    ///
    /// ## Example
    /// ```rust
    /// use kasir_core::approval::{decide, Decision};
    /// use kasir_core::types::ApprovalStatus;
    ///
    /// assert_eq!(decide("a-1", ApprovalStatus::Pending, Decision::Reject).unwrap(), ApprovalStatus::Rejected);
    /// assert!(decide("a-1", ApprovalStatus::Approved, Decision::Reject).is_err());
    /// ```
    pub fn decide(&self, decision: Decision) -> CoreResult<ApprovalStatus> {
        decide(&self.id, self.status, decision)
    }

    /// The refund snapshot, for REFUND approvals.
    pub fn refund_payload(&self) -> CoreResult<&RefundPayload> {
        match &self.payload {
            ApprovalPayload::Refund(p) => Ok(p),
            other => Err(CoreError::InvalidPayload(format!(
                "expected REFUND payload, found {}",
                other.action()
            ))),
        }
    }
}

/// Transition rule: PENDING → APPROVED | REJECTED, nothing else.
pub fn decide(approval_id: &str, current: ApprovalStatus, decision: Decision) -> CoreResult<ApprovalStatus> {
    if current != ApprovalStatus::Pending {
        return Err(CoreError::ApprovalAlreadyDecided {
            approval_id: approval_id.to_string(),
            status: current.to_string(),
        });
    }
    Ok(decision.target_status())
}

// =============================================================================
// Unit Tests
// =============================================================================
