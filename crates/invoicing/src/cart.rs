//! Cart validation and pricing.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use painterp_core::{DomainError, DomainResult, ProductId};
use painterp_inventory::{ContainerSize, Product, StockChange};

/// One requested cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: i64,
    #[serde(default)]
    pub size: Option<ContainerSize>,
    /// Billing-time unit price. Falls back to the catalog price when absent.
    #[serde(default)]
    pub price: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub size: Option<ContainerSize>,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

/// Result of pricing a cart against a stock snapshot.
///
/// `stock_changes` must be applied together with the invoice insert; the
/// store re-checks every change against the stored product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedCart {
    pub lines: Vec<PricedLine>,
    pub subtotal: Decimal,
    pub stock_changes: Vec<(ProductId, StockChange)>,
}

/// Validate and price `lines` against `products` (a snapshot keyed by id).
///
/// Lines are processed in order. Each line's stock removal is applied to a
/// working copy, so later lines for the same product see what earlier lines
/// already took. Inactive products are treated as missing.
pub fn price_cart(
    lines: &[CartLine],
    mut products: BTreeMap<ProductId, Product>,
    now: DateTime<Utc>,
) -> DomainResult<PricedCart> {
    if lines.is_empty() {
        return Err(DomainError::validation("Invoice must have at least one item"));
    }

    let mut priced = Vec::with_capacity(lines.len());
    let mut stock_changes = Vec::with_capacity(lines.len());
    let mut subtotal = Decimal::ZERO;

    for line in lines {
        if line.quantity < 1 {
            return Err(DomainError::validation("Quantity must be at least 1"));
        }
        if line.price.is_some_and(|p| p < Decimal::ZERO) {
            return Err(DomainError::validation("Price cannot be negative"));
        }

        let product = products
            .get_mut(&line.product_id)
            .filter(|p| p.is_active())
            .ok_or_else(|| {
                DomainError::not_found(format!("Product with ID {} not found", line.product_id))
            })?;

        let change = StockChange::Remove {
            size: line.size,
            quantity: line.quantity,
        };
        product.apply_stock_change(change, now)?;

        let unit_price = line.price.unwrap_or_else(|| product.catalog_price(line.size));
        let line_total = Decimal::from(line.quantity)
            .checked_mul(unit_price)
            .ok_or_else(|| DomainError::validation("Line total overflow"))?;
        subtotal = subtotal
            .checked_add(line_total)
            .ok_or_else(|| DomainError::validation("Invoice subtotal overflow"))?;

        priced.push(PricedLine {
            product_id: line.product_id,
            product_name: product.name().to_string(),
            size: line.size,
            quantity: line.quantity,
            unit_price,
            line_total,
        });
        stock_changes.push((line.product_id, change));
    }

    Ok(PricedCart {
        lines: priced,
        subtotal,
        stock_changes,
    })
}
