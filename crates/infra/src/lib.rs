//! Infrastructure layer: persistence and application services.

pub mod error;
pub mod services;
pub mod store;

pub use error::{ServiceError, ServiceResult};
pub use services::{
    BillingService, BulkFailure, BulkOutcome, InventoryService, InvoicePage, InvoiceView,
    ProductUpdate, ProductView, StockUpdate,
};
pub use store::{
    CatalogStore, InMemoryCatalogStore, PostgresCatalogStore, ProductFilter, StoreError,
};
