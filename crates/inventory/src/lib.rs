//! Inventory domain module.
//!
//! This crate contains the catalog entities (brands, product types, products)
//! and the business rules for container-size based stock, implemented purely
//! as deterministic domain logic (no IO, no HTTP, no storage).

pub mod brand;
pub mod bulk;
pub mod product;
pub mod product_type;
pub mod size;

pub use brand::Brand;
pub use bulk::BulkRow;
pub use product::{NewProduct, Product, ProductKey, ProductPatch, StockChange, base_code_of};
pub use product_type::{ProductType, TypeEntry, merge_type_entries};
pub use size::{ContainerSize, PriceBySize, SizeMap, StockBySize};
