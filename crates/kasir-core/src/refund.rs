//! # Refund Eligibility
//!
//! Pure rules for refunding a paid sale: the time window, how many units of
//! each line are still refundable, what each refunded line is worth, and the
//! overall amount ceiling.
//!
//! ## Refund Window
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  occurred_at (UTC) ──► local date at business offset (default +07:00)  │
//! │                             │                                           │
//! │                             ▼  + window_days (setting, default 2)       │
//! │                        deadline = that local date, 23:59:59.999         │
//! │                                                                         │
//! │  Sale on Mon 10:00 WIB, window 2 → refundable until Wed 23:59:59.999    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quantity and Amount Accounting
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  per SaleItem:                                                          │
//! │    max_refundable = item.qty − Σ RefundItem.qty                         │
//! │    amount(qty)    = ⌊line_total × qty / item.qty⌋                       │
//! │    amount(last)   = line_total − Σ RefundItem.line_total                │
//! │                                                                         │
//! │  per Sale:                                                              │
//! │    remaining = max(0, subtotal − discount_total − Σ Refund.total)       │
//! │                                                                         │
//! │  Line 3 × Rp 10.000 = 30.000 refunded 1 + 1 + 1:                        │
//! │    10.000 + 10.000 + (30.000 − 20.000) = 30.000 exactly                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use chrono::{DateTime, Days, FixedOffset, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::approval::RefundPayload;
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::settings::DEFAULT_REFUND_WINDOW_DAYS;
use crate::types::{Sale, SaleItem, SaleStatus};
use crate::validation::{item_field, validate_list_size, validate_unique_ids};
use crate::MAX_CART_ITEMS;

/// Default business offset: WIB, UTC+07:00.
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = 420;

// =============================================================================
// Refund Policy
// =============================================================================

/// Window rules injected into the refund request service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RefundPolicy {
    /// Whole days after the sale's local date.
    pub window_days: i64,
    /// Offset of the store's local time from UTC.
    pub utc_offset_minutes: i32,
}

impl Default for RefundPolicy {
    fn default() -> Self {
        RefundPolicy {
            window_days: DEFAULT_REFUND_WINDOW_DAYS,
            utc_offset_minutes: DEFAULT_UTC_OFFSET_MINUTES,
        }
    }
}

impl RefundPolicy {
    pub fn new(window_days: i64, utc_offset_minutes: i32) -> Self {
        RefundPolicy {
            window_days: window_days.max(0),
            utc_offset_minutes,
        }
    }

    fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }

    /// Last instant a sale that happened at `occurred_at` may be refunded.
    ///
    /// ## Example
    /// ```rust
    /// use chrono::{TimeZone, Utc};
    /// use kasir_core::refund::RefundPolicy;
    ///
    /// // 2025-03-03 10:00 WIB
    /// let occurred = Utc.with_ymd_and_hms(2025, 3, 3, 3, 0, 0).unwrap();
    /// let deadline = RefundPolicy::new(2, 420).deadline(occurred);
    /// // 2025-03-05 23:59:59.999 WIB
    /// assert_eq!(deadline.to_rfc3339(), "2025-03-05T16:59:59.999+00:00");
    /// ```
    pub fn deadline(&self, occurred_at: DateTime<Utc>) -> DateTime<Utc> {
        let offset = self.offset();
        let local_date = occurred_at.with_timezone(&offset).date_naive();

        u64::try_from(self.window_days)
            .ok()
            .and_then(|days| local_date.checked_add_days(Days::new(days)))
            .and_then(|date| date.and_hms_milli_opt(23, 59, 59, 999))
            .and_then(|end_of_day| offset.from_local_datetime(&end_of_day).single())
            .map(|deadline| deadline.with_timezone(&Utc))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// Fails once `now` is past `deadline`.
pub fn ensure_window_open(sale_id: &str, deadline: DateTime<Utc>, now: DateTime<Utc>) -> CoreResult<()> {
    if now > deadline {
        return Err(CoreError::RefundWindowExpired {
            sale_id: sale_id.to_string(),
        });
    }
    Ok(())
}

/// Sale must be PAID and carry an occurred_at. Returns occurred_at.
pub fn check_sale_refundable(sale: &Sale) -> CoreResult<DateTime<Utc>> {
    if sale.status != SaleStatus::Paid {
        return Err(CoreError::InvalidSaleStatus {
            sale_id: sale.id.clone(),
            current_status: sale.status.to_string(),
        });
    }

    sale.occurred_at.ok_or_else(|| CoreError::MissingOccurredAt {
        sale_id: sale.id.clone(),
    })
}

// =============================================================================
// Line Accounting
// =============================================================================

/// One line of a refund request.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RefundRequestLine {
    pub sale_item_id: String,
    pub qty: i64,
}

/// What has already been refunded for one sale item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ItemRefundHistory {
    pub refunded_qty: i64,
    pub refunded_amount: Money,
}

/// A priced refund line; snapshotted into the approval payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RefundLine {
    pub sale_item_id: String,
    pub product_id: String,
    pub name: String,
    pub qty: i64,
    /// `⌊line_total / max(item.qty, 1)⌋`.
    pub unit_price: Money,
    pub line_total: Money,
}

fn history_of(history: &HashMap<String, ItemRefundHistory>, sale_item_id: &str) -> ItemRefundHistory {
    history.get(sale_item_id).copied().unwrap_or_default()
}

/// Units of `item` not yet refunded.
pub fn max_refundable_qty(item: &SaleItem, history: &ItemRefundHistory) -> i64 {
    (item.qty - history.refunded_qty).max(0)
}

/// Value of refunding `qty` units of `item`.
///
/// Taking the last remaining units returns whatever is left of the line
/// total, so fully refunded lines sum to exactly `line_total`.
pub fn line_refund_amount(item: &SaleItem, history: &ItemRefundHistory, qty: i64) -> Money {
    if qty >= max_refundable_qty(item, history) {
        (item.line_total() - history.refunded_amount).non_negative()
    } else {
        item.line_total().prorate(qty, item.qty)
    }
}

/// Validates and prices every requested line.
///
/// `items` are the sale's own items; `history` maps sale_item_id to what has
/// been refunded already.
pub fn plan_refund_lines(
    items: &[SaleItem],
    history: &HashMap<String, ItemRefundHistory>,
    request: &[RefundRequestLine],
) -> CoreResult<Vec<RefundLine>> {
    validate_list_size("items", request.len(), MAX_CART_ITEMS)?;
    validate_unique_ids("items", "sale_item_id", request.iter().map(|l| l.sale_item_id.as_str()))?;

    let by_id: HashMap<&str, &SaleItem> = items.iter().map(|i| (i.id.as_str(), i)).collect();

    let mut lines = Vec::with_capacity(request.len());
    for (index, requested) in request.iter().enumerate() {
        if requested.qty <= 0 {
            return Err(ValidationError::MustBePositive {
                field: item_field("items", index, "qty"),
            }
            .into());
        }

        let item = by_id
            .get(requested.sale_item_id.as_str())
            .ok_or_else(|| CoreError::SaleItemNotInSale {
                line: index,
                sale_item_id: requested.sale_item_id.clone(),
            })?;

        let past = history_of(history, &item.id);
        let max_refundable = max_refundable_qty(item, &past);
        if requested.qty > max_refundable {
            return Err(CoreError::RefundQtyExceeded {
                line: index,
                sale_item_id: item.id.clone(),
                requested: requested.qty,
                max_refundable,
            });
        }

        lines.push(RefundLine {
            sale_item_id: item.id.clone(),
            product_id: item.product_id.clone(),
            name: item.name_snapshot.clone(),
            qty: requested.qty,
            unit_price: item.line_total().per_unit(item.qty),
            line_total: line_refund_amount(item, &past, requested.qty),
        });
    }

    Ok(lines)
}

// =============================================================================
// Amount Ceiling
// =============================================================================

/// `max(0, subtotal − discount_total − already_refunded)`.
///
/// ## Example
/// ```rust
/// # use chrono::Utc;
/// # use kasir_core::money::Money;
/// # use kasir_core::refund::remaining_refundable;
/// # use kasir_core::types::{Sale, SaleStatus};
/// # let sale = Sale {
/// #     id: "s".into(), invoice_no: "INV".into(), local_txn_uuid: "u".into(),
/// #     device_id: None, cashier_id: "c".into(), status: SaleStatus::Paid,
/// #     subtotal: 40_000, discount_total: 0, tax_total: 4_400, grand_total: 44_400,
/// #     paid_total: 50_000, change_total: 5_600, occurred_at: Some(Utc::now()),
/// #     synced_at: None, created_at: Utc::now(),
/// # };
/// // Tax is never part of the refundable basis
/// assert_eq!(remaining_refundable(&sale, Money::zero()).amount(), 40_000);
/// assert_eq!(remaining_refundable(&sale, Money::new(18_000)).amount(), 22_000);
/// ```
pub fn remaining_refundable(sale: &Sale, already_refunded: Money) -> Money {
    (sale.refundable_basis() - already_refunded).non_negative()
}

pub fn ensure_within_remaining(total: Money, remaining: Money) -> CoreResult<()> {
    if total > remaining {
        return Err(CoreError::RefundAmountExceeded {
            requested: total,
            remaining,
        });
    }
    Ok(())
}

// =============================================================================
// Re-validation at Approval
// =============================================================================

/// Re-checks a pending refund snapshot against the current state, right
/// before it is executed.
///
/// The deadline is the one recorded in the snapshot, not a fresh
/// computation from today's setting.
pub fn revalidate_refund(
    payload: &RefundPayload,
    sale: &Sale,
    items: &[SaleItem],
    history: &HashMap<String, ItemRefundHistory>,
    already_refunded: Money,
    now: DateTime<Utc>,
) -> CoreResult<()> {
    check_sale_refundable(sale)?;
    ensure_window_open(&sale.id, payload.deadline, now)?;

    let by_id: HashMap<&str, &SaleItem> = items.iter().map(|i| (i.id.as_str(), i)).collect();
    for (index, line) in payload.lines.iter().enumerate() {
        let item = by_id
            .get(line.sale_item_id.as_str())
            .ok_or_else(|| CoreError::SaleItemNotInSale {
                line: index,
                sale_item_id: line.sale_item_id.clone(),
            })?;

        let max_refundable = max_refundable_qty(item, &history_of(history, &item.id));
        if line.qty > max_refundable {
            return Err(CoreError::RefundQtyExceeded {
                line: index,
                sale_item_id: item.id.clone(),
                requested: line.qty,
                max_refundable,
            });
        }
    }

    ensure_within_remaining(payload.total_amount, remaining_refundable(sale, already_refunded))
}

// =============================================================================
// Eligibility Preview
// =============================================================================

/// Per-item view for the terminal's refund screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct ItemEligibility {
    pub sale_item_id: String,
    pub product_id: String,
    pub name: String,
    pub qty: i64,
    pub refunded_qty: i64,
    pub refundable_qty: i64,
    pub line_total: Money,
    pub refunded_amount: Money,
}

/// Read-only summary of what could still be refunded for a sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct RefundEligibility {
    pub sale_id: String,
    pub invoice_no: String,
    pub window_days: i64,
    #[ts(as = "String")]
    pub deadline: DateTime<Utc>,
    pub window_open: bool,
    pub remaining_refundable: Money,
    pub pending_approval_id: Option<String>,
    pub items: Vec<ItemEligibility>,
}

/// Builds the eligibility preview. Fails only for sales that can never be
/// refunded (not PAID, no occurred_at).
pub fn eligibility(
    sale: &Sale,
    items: &[SaleItem],
    history: &HashMap<String, ItemRefundHistory>,
    already_refunded: Money,
    policy: &RefundPolicy,
    pending_approval_id: Option<String>,
    now: DateTime<Utc>,
) -> CoreResult<RefundEligibility> {
    let occurred_at = check_sale_refundable(sale)?;
    let deadline = policy.deadline(occurred_at);

    let items = items
        .iter()
        .map(|item| {
            let past = history_of(history, &item.id);
            ItemEligibility {
                sale_item_id: item.id.clone(),
                product_id: item.product_id.clone(),
                name: item.name_snapshot.clone(),
                qty: item.qty,
                refunded_qty: past.refunded_qty,
                refundable_qty: max_refundable_qty(item, &past),
                line_total: item.line_total(),
                refunded_amount: past.refunded_amount,
            }
        })
        .collect();

    Ok(RefundEligibility {
        sale_id: sale.id.clone(),
        invoice_no: sale.invoice_no.clone(),
        window_days: policy.window_days,
        deadline,
        window_open: now <= deadline,
        remaining_refundable: remaining_refundable(sale, already_refunded),
        pending_approval_id,
        items,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
