//! # Checkout Computation
//!
//! Turns a cart plus a payment instruction into fully priced sale lines and
//! totals. Nothing here touches storage: the engine loads the products,
//! calls [`plan_checkout`], and writes the resulting plan in one transaction.
//!
//! ## Pricing Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  items[i] {product_id, qty, discount_amount?}                          │
//! │       │                                                                 │
//! │       ▼  resolve product (exists? active?)  → error names items.i       │
//! │       ▼  snapshot sku / name / price                                    │
//! │       ▼  gross = price × qty                                            │
//! │       ▼  discount clamped to [0, gross]                                 │
//! │       ▼  line_total = gross − discount                                  │
//! │                                                                         │
//! │  subtotal       = Σ gross                                               │
//! │  discount_total = Σ discount                                            │
//! │  tax_total      = round_half_up((subtotal − discount_total) × rate)     │
//! │  grand_total    = subtotal − discount_total + tax_total                 │
//! │                                                                         │
//! │  CASH:    cash_received ≥ grand_total, change = cash − grand            │
//! │  EWALLET: paid = grand_total, change = 0                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{PaymentMethod, Product, TaxRate};
use crate::validation::{item_field, validate_amount, validate_cart_size, validate_quantity};

// =============================================================================
// Input
// =============================================================================

/// One requested cart line.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartLine {
    pub product_id: String,
    pub qty: i64,
    #[serde(default)]
    pub discount_amount: Option<i64>,
}

/// How the customer pays.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentInstruction {
    pub method: PaymentMethod,
    #[serde(default)]
    pub cash_received: Option<i64>,
    #[serde(default)]
    pub reference: Option<String>,
}

// =============================================================================
// Output
// =============================================================================

/// A priced line with the product snapshot frozen in.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export)]
pub struct PlannedLine {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub unit_price: Money,
    pub qty: i64,
    pub discount_amount: Money,
    pub line_total: Money,
}

/// Sale header totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleTotals {
    pub subtotal: Money,
    pub discount_total: Money,
    pub tax_total: Money,
    pub grand_total: Money,
    pub paid_total: Money,
    pub change_total: Money,
}

/// The single payment row to record.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export)]
pub struct PlannedPayment {
    pub method: PaymentMethod,
    pub amount: Money,
    pub cash_received: Option<Money>,
    pub change_amount: Money,
    pub reference: Option<String>,
}

/// Everything the engine needs to persist a sale.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export)]
pub struct CheckoutPlan {
    pub lines: Vec<PlannedLine>,
    pub totals: SaleTotals,
    pub payment: PlannedPayment,
}

impl CheckoutPlan {
    /// Units requested per product, summed over lines (for stock checks).
    pub fn quantities_by_product(&self) -> HashMap<&str, i64> {
        let mut totals: HashMap<&str, i64> = HashMap::new();
        for line in &self.lines {
            *totals.entry(line.product_id.as_str()).or_default() += line.qty;
        }
        totals
    }
}

// =============================================================================
// Planning
// =============================================================================

/// Prices a cart against the live products and settles the payment.
///
/// `products` maps product id → current product row; a missing entry means
/// the product does not exist.
///
/// ## Errors
/// - [`CoreError::EmptyCart`] for no lines
/// - [`CoreError::Validation`] for qty out of range, too many lines, or a
///   CASH payment without `cash_received`
/// - [`CoreError::ProductNotFound`] / [`CoreError::ProductInactive`] naming
///   the zero-based line index
/// - [`CoreError::Underpayment`] when cash is short
///
/// ## Example
/// ```rust
/// use std::collections::HashMap;
/// use kasir_core::checkout::{plan_checkout, CartLine, PaymentInstruction};
/// use kasir_core::types::{PaymentMethod, TaxRate};
///
/// let plan = plan_checkout(
///     &[],
///     &HashMap::new(),
///     &PaymentInstruction { method: PaymentMethod::Ewallet, cash_received: None, reference: None },
///     TaxRate::from_bps(1100),
/// );
/// assert!(plan.is_err());
/// ```
pub fn plan_checkout(
    cart: &[CartLine],
    products: &HashMap<String, Product>,
    payment: &PaymentInstruction,
    tax_rate: TaxRate,
) -> CoreResult<CheckoutPlan> {
    if cart.is_empty() {
        return Err(CoreError::EmptyCart);
    }
    validate_cart_size(cart.len())?;

    let mut lines = Vec::with_capacity(cart.len());
    for (index, line) in cart.iter().enumerate() {
        lines.push(price_line(index, line, products)?);
    }

    let subtotal: Money = lines
        .iter()
        .map(|l| l.unit_price.multiply_quantity(l.qty))
        .sum();
    let discount_total: Money = lines.iter().map(|l| l.discount_amount).sum();
    let taxable = subtotal - discount_total;
    let tax_total = taxable.calculate_tax(tax_rate);
    let grand_total = taxable + tax_total;

    let payment = settle_payment(payment, grand_total)?;

    Ok(CheckoutPlan {
        lines,
        totals: SaleTotals {
            subtotal,
            discount_total,
            tax_total,
            grand_total,
            paid_total: payment.cash_received.unwrap_or(payment.amount),
            change_total: payment.change_amount,
        },
        payment,
    })
}

fn price_line(
    index: usize,
    line: &CartLine,
    products: &HashMap<String, Product>,
) -> CoreResult<PlannedLine> {
    validate_quantity(&item_field("items", index, "qty"), line.qty)?;

    let product = products
        .get(&line.product_id)
        .ok_or_else(|| CoreError::ProductNotFound {
            line: index,
            product_id: line.product_id.clone(),
        })?;

    if !product.is_active {
        return Err(CoreError::ProductInactive {
            line: index,
            product_id: line.product_id.clone(),
        });
    }

    let unit_price = product.price();
    let gross = unit_price.multiply_quantity(line.qty);
    let discount = Money::new(line.discount_amount.unwrap_or(0))
        .non_negative()
        .min(gross);

    Ok(PlannedLine {
        product_id: product.id.clone(),
        sku: product.sku.clone(),
        name: product.name.clone(),
        unit_price,
        qty: line.qty,
        discount_amount: discount,
        line_total: gross - discount,
    })
}

fn settle_payment(payment: &PaymentInstruction, grand_total: Money) -> CoreResult<PlannedPayment> {
    let reference = payment
        .reference
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string);

    match payment.method {
        PaymentMethod::Cash => {
            let received = payment.cash_received.ok_or_else(|| ValidationError::Required {
                field: "cash_received".to_string(),
            })?;
            validate_amount("cash_received", received)?;
            let received = Money::new(received);

            if received < grand_total {
                return Err(CoreError::Underpayment {
                    grand_total,
                    cash_received: received,
                });
            }

            Ok(PlannedPayment {
                method: PaymentMethod::Cash,
                amount: grand_total,
                cash_received: Some(received),
                change_amount: received - grand_total,
                reference,
            })
        }
        PaymentMethod::Ewallet => Ok(PlannedPayment {
            method: PaymentMethod::Ewallet,
            amount: grand_total,
            cash_received: None,
            change_amount: Money::zero(),
            reference,
        }),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
