//! Catalog and invoice persistence.
//!
//! `CatalogStore` is the single storage seam. Implementations own atomicity:
//! every product mutation is a read-modify-write inside one critical section
//! (in-memory) or one transaction with row locks (Postgres), and a sale
//! commits its stock changes together with the invoice insert.

pub mod in_memory;
pub mod postgres;

use chrono::{DateTime, Utc};
use thiserror::Error;

use painterp_core::{BrandId, DomainError, InvoiceId, ProductId, UserId};
use painterp_inventory::{Brand, Product, ProductKey, ProductType, StockChange};
use painterp_invoicing::Invoice;

pub use in_memory::InMemoryCatalogStore;
pub use postgres::PostgresCatalogStore;

/// Storage operation error.
///
/// Infrastructure failures (`Backend`, `Serialization`) are kept apart from
/// domain rules that fired inside an atomic unit (`Rejected`) and from
/// uniqueness violations (`Duplicate`).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("stored document could not be (de)serialized: {0}")]
    Serialization(String),

    #[error(transparent)]
    Rejected(#[from] DomainError),

    #[error("{0}")]
    Duplicate(String),
}

/// Mutation applied to a stored product inside the store's atomic unit.
pub type ProductEdit<'a> =
    Box<dyn FnOnce(&mut Product) -> Result<(), DomainError> + Send + 'a>;

/// Filter for active product listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    pub brand: Option<BrandId>,
    pub product_type: Option<String>,
    /// Case-insensitive substring of the product name.
    pub search: Option<String>,
}

impl ProductFilter {
    pub fn matches(&self, product: &Product) -> bool {
        if !product.is_active() {
            return false;
        }
        if self.brand.is_some_and(|b| b != product.brand()) {
            return false;
        }
        if self
            .product_type
            .as_deref()
            .is_some_and(|t| t != product.product_type())
        {
            return false;
        }
        match self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(needle) => product
                .name()
                .to_lowercase()
                .contains(&needle.to_lowercase()),
            None => true,
        }
    }
}

#[async_trait::async_trait]
pub trait CatalogStore: Send + Sync {
    // Brands.

    /// `Duplicate` when the name is taken.
    async fn insert_brand(&self, brand: &Brand) -> Result<(), StoreError>;
    async fn get_brand(&self, id: BrandId) -> Result<Option<Brand>, StoreError>;
    async fn find_brand_by_name(&self, name: &str) -> Result<Option<Brand>, StoreError>;
    /// Active brands sorted by name.
    async fn list_active_brands(&self) -> Result<Vec<Brand>, StoreError>;
    async fn get_brands(&self, ids: &[BrandId]) -> Result<Vec<Brand>, StoreError>;

    // Product types.

    async fn find_product_type(&self, name: &str) -> Result<Option<ProductType>, StoreError>;
    /// Insert or replace by id. `Duplicate` when another record has the name.
    async fn save_product_type(&self, product_type: &ProductType) -> Result<(), StoreError>;
    async fn list_product_types(&self) -> Result<Vec<ProductType>, StoreError>;
    /// Distinct `type` strings on active products, optionally for one brand.
    async fn product_types_in_use(&self, brand: Option<BrandId>) -> Result<Vec<String>, StoreError>;

    // Products.

    /// `Duplicate` when the brand already has a product with the same key.
    async fn insert_product(&self, product: &Product) -> Result<(), StoreError>;
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError>;
    /// Products by id, inactive ones included. Missing ids are skipped.
    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError>;
    /// Any product (active or not) of `brand` holding `key`.
    async fn find_product_by_key(
        &self,
        brand: BrandId,
        key: &ProductKey,
    ) -> Result<Option<Product>, StoreError>;
    /// Active products matching `filter`, sorted by name.
    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, StoreError>;
    /// Atomic read-modify-write of one product.
    ///
    /// `Rejected(NotFound)` when the product does not exist, `Rejected(..)`
    /// when `edit` fails (nothing is written), `Duplicate` when the edited
    /// product collides with another product's key.
    async fn update_product(&self, id: ProductId, edit: ProductEdit<'_>) -> Result<Product, StoreError>;
    /// Set `image` on every other product of `brand` whose code family is
    /// `base_code`. Returns how many products changed.
    async fn propagate_image(
        &self,
        brand: BrandId,
        base_code: &str,
        image: &str,
        except: ProductId,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError>;

    // Invoices.

    async fn count_invoices(&self) -> Result<u64, StoreError>;
    /// Apply every stock change and insert the invoice as one unit.
    ///
    /// Each change is re-validated against the stored product; any failure
    /// leaves every product and the invoice table untouched.
    async fn commit_sale(
        &self,
        invoice: &Invoice,
        changes: &[(ProductId, StockChange)],
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;
    /// Page of the user's invoices, newest first, plus the user's total count.
    async fn list_invoices(
        &self,
        user: UserId,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<Invoice>, u64), StoreError>;
    async fn get_invoice(&self, user: UserId, id: InvoiceId) -> Result<Option<Invoice>, StoreError>;
}

pub(crate) fn product_not_found() -> DomainError {
    DomainError::not_found("Product not found")
}
