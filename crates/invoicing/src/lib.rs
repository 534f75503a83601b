//! Invoicing domain module.
//!
//! Cart validation and pricing against live product stock, tax/total
//! computation and the immutable `Invoice` snapshot. Pure domain logic
//! (no IO, no HTTP, no storage).

pub mod cart;
pub mod invoice;

pub use cart::{CartLine, PricedCart, PricedLine, price_cart};
pub use invoice::{
    DEFAULT_TAX_RATE, Invoice, InvoiceLine, InvoiceStatus, InvoiceTotals, compute_totals,
    invoice_number,
};
