use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{info, instrument, warn};

use painterp_core::{BrandId, DomainError, ProductId, ProductTypeId};
use painterp_inventory::{
    Brand, BulkRow, NewProduct, Product, ProductPatch, ProductType, StockBySize, StockChange,
    TypeEntry, merge_type_entries,
};

use crate::error::{ServiceError, ServiceResult};
use crate::store::{CatalogStore, ProductFilter, StoreError};

/// A product with its brand resolved for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductView {
    pub product: Product,
    /// `None` when the brand record has gone missing.
    pub brand: Option<Brand>,
}

/// Manual stock update request (`PATCH .../stock`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StockUpdate {
    pub stock: Option<i64>,
    pub size: Option<String>,
    /// Count for `size`.
    pub stock_by_size: Option<i64>,
}

/// Partial product update (`PUT /products/:id`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductUpdate {
    pub patch: ProductPatch,
    /// Replaces every size count; wins over `stock`.
    pub stock_by_size: Option<StockBySize>,
    pub stock: Option<i64>,
}

impl ProductUpdate {
    fn stock_change(&self) -> Option<StockChange> {
        match (self.stock_by_size, self.stock) {
            (Some(sizes), _) => Some(StockChange::ReplaceSizes(sizes)),
            (None, Some(count)) => Some(StockChange::SetTotal { count }),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BulkFailure {
    /// The entry exactly as submitted.
    pub row: Value,
    pub reason: String,
}

/// Per-row outcome of a bulk upload. `success.len() + failed.len()` equals
/// the number of submitted rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkOutcome {
    pub success: Vec<ProductView>,
    pub failed: Vec<BulkFailure>,
}

/// Catalog operations: brands, product types, products and manual stock.
#[derive(Clone)]
pub struct InventoryService {
    store: Arc<dyn CatalogStore>,
}

fn brand_not_found() -> DomainError {
    DomainError::not_found("Brand not found")
}

fn product_not_found() -> DomainError {
    DomainError::not_found("Product not found")
}

impl InventoryService {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, image), err)]
    pub async fn create_brand(&self, name: &str, image: Option<String>) -> ServiceResult<Brand> {
        let name = Brand::normalize_name(name)?;
        if self.store.find_brand_by_name(&name).await?.is_some() {
            return Err(DomainError::conflict("Brand with this name already exists").into());
        }

        let brand = Brand::create(BrandId::new(), &name, image, Utc::now())?;
        self.store.insert_brand(&brand).await?;
        info!(brand_id = %brand.id(), name = brand.name(), "brand created");
        Ok(brand)
    }

    pub async fn list_brands(&self) -> ServiceResult<Vec<Brand>> {
        Ok(self.store.list_active_brands().await?)
    }

    async fn require_brand(&self, id: BrandId) -> ServiceResult<Brand> {
        self.store
            .get_brand(id)
            .await?
            .filter(|b| b.is_active())
            .ok_or_else(|| brand_not_found().into())
    }

    /// Create the type, or refresh the icon and re-activate an existing one.
    #[instrument(skip(self, icon), err)]
    pub async fn upsert_product_type(
        &self,
        name: &str,
        icon: Option<String>,
    ) -> ServiceResult<ProductType> {
        let name = ProductType::normalize_name(name)?;
        let now = Utc::now();
        let record = match self.store.find_product_type(&name).await? {
            Some(mut existing) => {
                existing.refresh(icon, now);
                existing
            }
            None => ProductType::create(ProductTypeId::new(), &name, icon, now)?,
        };
        self.store.save_product_type(&record).await?;
        Ok(record)
    }

    /// Explicit records merged with the types found on active products.
    pub async fn list_product_types(&self) -> ServiceResult<Vec<TypeEntry>> {
        let records = self.store.list_product_types().await?;
        let in_use = self.store.product_types_in_use(None).await?;
        Ok(merge_type_entries(&records, in_use.iter().map(String::as_str)))
    }

    /// Like [`Self::list_product_types`], restricted to the brand's products.
    pub async fn list_brand_product_types(&self, brand: BrandId) -> ServiceResult<Vec<TypeEntry>> {
        self.require_brand(brand).await?;
        let records = self.store.list_product_types().await?;
        let in_use = self.store.product_types_in_use(Some(brand)).await?;
        Ok(merge_type_entries(&records, in_use.iter().map(String::as_str)))
    }

    #[instrument(skip(self, new), fields(brand_id = %new.brand), err)]
    pub async fn create_product(&self, new: NewProduct) -> ServiceResult<ProductView> {
        let brand = self.require_brand(new.brand).await?;
        let product = Product::create(ProductId::new(), new, Utc::now())?;
        self.store.insert_product(&product).await?;
        info!(product_id = %product.id(), stock = product.stock(), "product created");
        Ok(ProductView {
            product,
            brand: Some(brand),
        })
    }

    pub async fn list_products(&self, filter: &ProductFilter) -> ServiceResult<Vec<ProductView>> {
        let products = self.store.list_products(filter).await?;
        self.expand(products).await
    }

    /// Active products of one brand, optionally of one type.
    pub async fn list_brand_products(
        &self,
        brand: BrandId,
        product_type: Option<String>,
    ) -> ServiceResult<Vec<ProductView>> {
        let filter = ProductFilter {
            brand: Some(brand),
            product_type,
            search: None,
        };
        self.list_products(&filter).await
    }

    pub async fn get_product(&self, id: ProductId) -> ServiceResult<ProductView> {
        let product = self
            .store
            .get_product(id)
            .await?
            .filter(|p| p.is_active())
            .ok_or_else(product_not_found)?;
        Ok(self.expand(vec![product]).await?.remove(0))
    }

    /// Partial update. A changed image is shared with the product's code family.
    #[instrument(skip(self, update), err)]
    pub async fn update_product(
        &self,
        id: ProductId,
        update: ProductUpdate,
    ) -> ServiceResult<ProductView> {
        if let Some(brand) = update.patch.brand {
            self.require_brand(brand).await?;
        }

        let now = Utc::now();
        let stock_change = update.stock_change();
        let patch = update.patch;
        let mut image_changed = false;
        let flag = &mut image_changed;

        let product = self
            .store
            .update_product(
                id,
                Box::new(move |p: &mut Product| {
                    if !p.is_active() {
                        return Err(product_not_found());
                    }
                    *flag = p.apply_patch(patch, now)?;
                    if let Some(change) = stock_change {
                        p.apply_stock_change(change, now)?;
                    }
                    Ok(())
                }),
            )
            .await?;

        if image_changed {
            if let Some(base) = product.base_code() {
                let shared = self
                    .store
                    .propagate_image(product.brand(), base, product.product_image(), id, now)
                    .await?;
                info!(product_id = %id, base_code = base, shared, "product image propagated");
            }
        }

        Ok(self.expand(vec![product]).await?.remove(0))
    }

    /// Manual stock adjustment in size mode or legacy (total) mode.
    #[instrument(skip(self), err)]
    pub async fn update_stock(&self, id: ProductId, update: StockUpdate) -> ServiceResult<ProductView> {
        let change =
            StockChange::from_request(update.stock, update.size.as_deref(), update.stock_by_size)?;
        let now = Utc::now();

        let product = self
            .store
            .update_product(
                id,
                Box::new(move |p: &mut Product| {
                    if !p.is_active() {
                        return Err(product_not_found());
                    }
                    p.apply_stock_change(change, now)
                }),
            )
            .await?;

        info!(product_id = %id, stock = product.stock(), ?change, "stock updated");
        Ok(self.expand(vec![product]).await?.remove(0))
    }

    /// Soft delete. Invoices keep their snapshots.
    #[instrument(skip(self), err)]
    pub async fn delete_product(&self, id: ProductId) -> ServiceResult<()> {
        let now = Utc::now();
        self.store
            .update_product(
                id,
                Box::new(move |p: &mut Product| {
                    if !p.is_active() {
                        return Err(product_not_found());
                    }
                    p.deactivate(now);
                    Ok(())
                }),
            )
            .await?;
        info!(product_id = %id, "product deactivated");
        Ok(())
    }

    /// Create one product per row. Rows fail independently, including rows
    /// that do not parse; the batch never stops early.
    #[instrument(skip(self, rows), fields(rows = rows.len()), err)]
    pub async fn bulk_upload(
        &self,
        brand: BrandId,
        product_type: &str,
        rows: Vec<Value>,
    ) -> ServiceResult<BulkOutcome> {
        let brand = self.require_brand(brand).await?;
        let product_type = product_type.trim();
        if product_type.is_empty() {
            return Err(DomainError::validation("Product type is required").into());
        }

        let mut outcome = BulkOutcome::default();
        for row in rows {
            match self.create_bulk_row(&brand, product_type, &row).await {
                Ok(product) => outcome.success.push(ProductView {
                    product,
                    brand: Some(brand.clone()),
                }),
                Err(e) => {
                    if let ServiceError::Store(msg) = &e {
                        warn!(error = %msg, "bulk row failed on storage");
                    }
                    outcome.failed.push(BulkFailure {
                        row,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            created = outcome.success.len(),
            failed = outcome.failed.len(),
            "bulk upload finished"
        );
        Ok(outcome)
    }

    async fn create_bulk_row(
        &self,
        brand: &Brand,
        product_type: &str,
        row: &Value,
    ) -> ServiceResult<Product> {
        let row: BulkRow = serde_json::from_value(row.clone())
            .map_err(|e| DomainError::validation(format!("Invalid row: {e}")))?;
        let new = row.into_new_product(brand.id(), product_type)?;
        let product = Product::create(ProductId::new(), new, Utc::now())?;
        self.store
            .insert_product(&product)
            .await
            .map_err(|e| match e {
                StoreError::Duplicate(_) => ServiceError::Domain(DomainError::conflict(format!(
                    "Product code {} already exists for this brand",
                    product.product_code()
                ))),
                other => other.into(),
            })?;
        Ok(product)
    }

    /// Resolve brands for display.
    pub async fn expand(&self, products: Vec<Product>) -> ServiceResult<Vec<ProductView>> {
        let mut ids: Vec<BrandId> = products.iter().map(|p| p.brand()).collect();
        ids.sort();
        ids.dedup();
        let brands: HashMap<BrandId, Brand> = self
            .store
            .get_brands(&ids)
            .await?
            .into_iter()
            .map(|b| (b.id(), b))
            .collect();

        Ok(products
            .into_iter()
            .map(|product| ProductView {
                brand: brands.get(&product.brand()).cloned(),
                product,
            })
            .collect())
    }
}
