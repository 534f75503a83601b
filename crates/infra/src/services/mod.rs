//! Application services composing the domain crates with a `CatalogStore`.

pub mod billing;
pub mod inventory;

pub use billing::{BillingService, DEFAULT_PAGE_LIMIT, InvoicePage, InvoiceView, MAX_PAGE_LIMIT};
pub use inventory::{
    BulkFailure, BulkOutcome, InventoryService, ProductUpdate, ProductView, StockUpdate,
};
