//! Immutable invoice snapshot, tax and totals.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use painterp_core::{DomainError, DomainResult, InvoiceId, ProductId, UserId};
use painterp_inventory::ContainerSize;

use crate::cart::PricedCart;

/// GST percentage applied when the caller does not pass one.
pub const DEFAULT_TAX_RATE: Decimal = Decimal::from_parts(18, 0, 0, false, 0);

/// Invoice status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Pending,
    Completed,
    Cancelled,
}

/// Snapshot of a sold line. Name and price are copied at sale time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceLine {
    pub product: ProductId,
    pub product_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<ContainerSize>,
    pub quantity: i64,
    pub price: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvoiceTotals {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

/// `tax = subtotal * rate / 100`, `total = subtotal + tax`. No rounding.
pub fn compute_totals(subtotal: Decimal, tax_rate: Decimal) -> DomainResult<InvoiceTotals> {
    if tax_rate < Decimal::ZERO {
        return Err(DomainError::validation("Tax rate cannot be negative"));
    }
    let tax = subtotal
        .checked_mul(tax_rate)
        .and_then(|t| t.checked_div(Decimal::ONE_HUNDRED))
        .ok_or_else(|| DomainError::validation("Invoice tax overflow"))?;
    let total = subtotal
        .checked_add(tax)
        .ok_or_else(|| DomainError::validation("Invoice total overflow"))?;
    Ok(InvoiceTotals {
        subtotal,
        tax,
        total,
    })
}

/// `INV-{unix millis}-{existing + 1}`.
pub fn invoice_number(now: DateTime<Utc>, existing: u64) -> String {
    format!("INV-{}-{}", now.timestamp_millis(), existing + 1)
}

/// An issued invoice. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    id: InvoiceId,
    invoice_no: String,
    user: UserId,
    items: Vec<InvoiceLine>,
    subtotal: Decimal,
    tax: Decimal,
    tax_rate: Decimal,
    total: Decimal,
    status: InvoiceStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Build a completed invoice from a priced cart.
    pub fn issue(
        id: InvoiceId,
        invoice_no: String,
        user: UserId,
        cart: &PricedCart,
        tax_rate: Decimal,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if cart.lines.is_empty() {
            return Err(DomainError::validation("Invoice must have at least one item"));
        }
        let totals = compute_totals(cart.subtotal, tax_rate)?;

        let items = cart
            .lines
            .iter()
            .map(|line| InvoiceLine {
                product: line.product_id,
                product_name: line.product_name.clone(),
                size: line.size,
                quantity: line.quantity,
                price: line.unit_price,
                total: line.line_total,
            })
            .collect();

        Ok(Self {
            id,
            invoice_no,
            user,
            items,
            subtotal: totals.subtotal,
            tax: totals.tax,
            tax_rate,
            total: totals.total,
            status: InvoiceStatus::Completed,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn id(&self) -> InvoiceId {
        self.id
    }

    pub fn invoice_no(&self) -> &str {
        &self.invoice_no
    }

    pub fn user(&self) -> UserId {
        self.user
    }

    pub fn items(&self) -> &[InvoiceLine] {
        &self.items
    }

    pub fn subtotal(&self) -> Decimal {
        self.subtotal
    }

    pub fn tax(&self) -> Decimal {
        self.tax
    }

    pub fn tax_rate(&self) -> Decimal {
        self.tax_rate
    }

    pub fn total(&self) -> Decimal {
        self.total
    }

    pub fn status(&self) -> InvoiceStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}
