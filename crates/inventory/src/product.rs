use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use painterp_core::{BrandId, DomainError, DomainResult, ProductId};

use crate::product_type::check_not_reserved;
use crate::size::{ContainerSize, PriceBySize, StockBySize};

const DEFAULT_UNIT: &str = "L";
const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 5;

/// Catalog product with per-container-size stock.
///
/// Stock is private: every change goes through [`Product::apply_stock_change`],
/// which keeps `stock == sum(stock_by_size)` for all size-aware changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    id: ProductId,
    name: String,
    brand: BrandId,
    price: Decimal,
    stock: i64,
    unit: String,
    product_code: String,
    product_image: String,
    low_stock_threshold: i64,
    stock_by_size: StockBySize,
    price_by_size: PriceBySize,
    #[serde(rename = "type")]
    product_type: String,
    description: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Input for product creation (already parsed, not yet validated).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewProduct {
    pub name: String,
    pub brand: BrandId,
    pub product_type: String,
    pub price: Option<Decimal>,
    pub stock: Option<i64>,
    pub stock_by_size: Option<StockBySize>,
    pub price_by_size: Option<PriceBySize>,
    pub unit: Option<String>,
    pub product_code: Option<String>,
    pub product_image: Option<String>,
    pub low_stock_threshold: Option<i64>,
    pub description: Option<String>,
}

/// Partial update. `None` leaves the field untouched.
///
/// Stock is deliberately absent: stock changes are [`StockChange`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub brand: Option<BrandId>,
    pub product_type: Option<String>,
    pub price: Option<Decimal>,
    pub price_by_size: Option<PriceBySize>,
    pub unit: Option<String>,
    pub product_code: Option<String>,
    pub product_image: Option<String>,
    pub low_stock_threshold: Option<i64>,
    pub description: Option<String>,
}

/// A single stock mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockChange {
    /// Size mode: set one size's count, recompute the total.
    SetSize { size: ContainerSize, count: i64 },
    /// Legacy mode: set the total directly. `stock_by_size` is left untouched,
    /// so the two can drift apart.
    SetTotal { count: i64 },
    /// Replace every size count, recompute the total.
    ReplaceSizes(StockBySize),
    /// Sale: take `quantity` from one size (recomputing the total) or, without
    /// a size, from the total only.
    Remove {
        size: Option<ContainerSize>,
        quantity: i64,
    },
}

impl StockChange {
    /// Build a manual stock update from request fields.
    ///
    /// Size mode needs `size` and `size_count`; legacy mode needs a bare
    /// `stock`. Size mode wins when both are present.
    pub fn from_request(
        stock: Option<i64>,
        size: Option<&str>,
        size_count: Option<i64>,
    ) -> DomainResult<Self> {
        match (size, size_count, stock) {
            (Some(size), Some(count), _) => Ok(StockChange::SetSize {
                size: size.parse()?,
                count,
            }),
            (None, None, Some(count)) => Ok(StockChange::SetTotal { count }),
            _ => Err(DomainError::validation(
                "Provide either stock, or size together with stockBySize",
            )),
        }
    }
}

/// Key a product must be unique on within its brand.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProductKey {
    Code(String),
    Name(String),
}

impl Product {
    /// Validate `new` and build an active product.
    pub fn create(id: ProductId, new: NewProduct, now: DateTime<Utc>) -> DomainResult<Self> {
        let name = normalize_required(&new.name, "Product name is required")?;
        let product_type = normalize_required(&new.product_type, "Product type is required")?;
        check_not_reserved(&product_type)?;

        let price = new.price.unwrap_or(Decimal::ZERO);
        check_price(price)?;
        let price_by_size = new.price_by_size.unwrap_or_default();
        check_price_by_size(&price_by_size)?;

        let low_stock_threshold = new
            .low_stock_threshold
            .unwrap_or(DEFAULT_LOW_STOCK_THRESHOLD);
        check_threshold(low_stock_threshold)?;

        let mut product = Self {
            id,
            name,
            brand: new.brand,
            price,
            stock: 0,
            unit: new
                .unit
                .map(|u| u.trim().to_string())
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| DEFAULT_UNIT.to_string()),
            product_code: new.product_code.map(|c| c.trim().to_string()).unwrap_or_default(),
            product_image: new.product_image.unwrap_or_default(),
            low_stock_threshold,
            stock_by_size: StockBySize::default(),
            price_by_size,
            product_type,
            description: new.description.unwrap_or_default(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let initial = match new.stock_by_size {
            Some(sizes) => StockChange::ReplaceSizes(sizes),
            None => StockChange::SetTotal {
                count: new.stock.unwrap_or(0),
            },
        };
        product.apply_stock_change(initial, now)?;

        Ok(product)
    }

    /// The one place stock is mutated.
    pub fn apply_stock_change(&mut self, change: StockChange, now: DateTime<Utc>) -> DomainResult<()> {
        match change {
            StockChange::SetSize { size, count } => {
                check_count(count)?;
                let mut sizes = self.stock_by_size;
                sizes.set(size, count);
                self.stock = size_total(&sizes)?;
                self.stock_by_size = sizes;
            }
            StockChange::SetTotal { count } => {
                check_count(count)?;
                self.stock = count;
            }
            StockChange::ReplaceSizes(sizes) => {
                if let Some(size) = sizes.first_negative() {
                    return Err(DomainError::validation(format!(
                        "Stock for size {size} cannot be negative"
                    )));
                }
                self.stock = size_total(&sizes)?;
                self.stock_by_size = sizes;
            }
            StockChange::Remove { size, quantity } => {
                if quantity < 1 {
                    return Err(DomainError::validation("Quantity must be at least 1"));
                }
                let available = self.available_stock(size);
                if quantity > available {
                    return Err(DomainError::insufficient_stock(
                        self.display_name(size),
                        available,
                        quantity,
                    ));
                }
                match size {
                    Some(size) => {
                        let mut sizes = self.stock_by_size;
                        sizes.set(size, available - quantity);
                        self.stock = size_total(&sizes)?;
                        self.stock_by_size = sizes;
                    }
                    None => self.stock = available - quantity,
                }
            }
        }
        self.updated_at = now;
        Ok(())
    }

    /// Apply a partial update. Returns `true` when the product image changed.
    pub fn apply_patch(&mut self, patch: ProductPatch, now: DateTime<Utc>) -> DomainResult<bool> {
        // Validate everything before touching state.
        let name = patch
            .name
            .as_deref()
            .map(|n| normalize_required(n, "Product name is required"))
            .transpose()?;
        let product_type = patch
            .product_type
            .as_deref()
            .map(|t| normalize_required(t, "Product type is required"))
            .transpose()?;
        if let Some(t) = &product_type {
            check_not_reserved(t)?;
        }
        if let Some(price) = patch.price {
            check_price(price)?;
        }
        if let Some(prices) = &patch.price_by_size {
            check_price_by_size(prices)?;
        }
        if let Some(threshold) = patch.low_stock_threshold {
            check_threshold(threshold)?;
        }

        if let Some(name) = name {
            self.name = name;
        }
        if let Some(product_type) = product_type {
            self.product_type = product_type;
        }
        if let Some(brand) = patch.brand {
            self.brand = brand;
        }
        if let Some(price) = patch.price {
            self.price = price;
        }
        if let Some(prices) = patch.price_by_size {
            self.price_by_size = prices;
        }
        if let Some(unit) = patch.unit {
            let unit = unit.trim();
            if !unit.is_empty() {
                self.unit = unit.to_string();
            }
        }
        if let Some(code) = patch.product_code {
            self.product_code = code.trim().to_string();
        }
        if let Some(threshold) = patch.low_stock_threshold {
            self.low_stock_threshold = threshold;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }

        let mut image_changed = false;
        if let Some(image) = patch.product_image {
            if image != self.product_image {
                self.product_image = image;
                image_changed = true;
            }
        }

        self.updated_at = now;
        Ok(image_changed)
    }

    /// Share the image of a sibling variant.
    pub fn set_image(&mut self, image: &str, now: DateTime<Utc>) {
        self.product_image = image.to_string();
        self.updated_at = now;
    }

    /// Soft delete.
    pub fn deactivate(&mut self, now: DateTime<Utc>) {
        self.is_active = false;
        self.updated_at = now;
    }

    /// Stock at the given granularity (`None` → total).
    pub fn available_stock(&self, size: Option<ContainerSize>) -> i64 {
        match size {
            Some(size) => self.stock_by_size.get(size),
            None => self.stock,
        }
    }

    /// Catalog price for a sale line: the per-size price when one is set,
    /// otherwise the base price.
    pub fn catalog_price(&self, size: Option<ContainerSize>) -> Decimal {
        size.map(|s| self.price_by_size.get(s))
            .filter(|p| !p.is_zero())
            .unwrap_or(self.price)
    }

    /// Product code family: everything before the first `-`.
    ///
    /// `None` when the product has no code.
    pub fn base_code(&self) -> Option<&str> {
        base_code_of(&self.product_code)
    }

    pub fn uniqueness_key(&self) -> ProductKey {
        ProductKey::for_parts(&self.name, &self.product_code)
    }

    pub fn is_low_stock(&self) -> bool {
        self.stock <= self.low_stock_threshold
    }

    fn display_name(&self, size: Option<ContainerSize>) -> String {
        match size {
            Some(size) => format!("{} ({size})", self.name),
            None => self.name.clone(),
        }
    }

    pub fn id(&self) -> ProductId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn brand(&self) -> BrandId {
        self.brand
    }

    pub fn price(&self) -> Decimal {
        self.price
    }

    pub fn stock(&self) -> i64 {
        self.stock
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn product_code(&self) -> &str {
        &self.product_code
    }

    pub fn product_image(&self) -> &str {
        &self.product_image
    }

    pub fn low_stock_threshold(&self) -> i64 {
        self.low_stock_threshold
    }

    pub fn stock_by_size(&self) -> &StockBySize {
        &self.stock_by_size
    }

    pub fn price_by_size(&self) -> &PriceBySize {
        &self.price_by_size
    }

    pub fn product_type(&self) -> &str {
        &self.product_type
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl ProductKey {
    /// Code when present, otherwise the trimmed name.
    pub fn for_parts(name: &str, product_code: &str) -> Self {
        let code = product_code.trim();
        if code.is_empty() {
            ProductKey::Name(name.trim().to_string())
        } else {
            ProductKey::Code(code.to_string())
        }
    }

    /// Flat form used by persistent stores for their unique index.
    pub fn storage_key(&self) -> String {
        match self {
            ProductKey::Code(code) => format!("code:{code}"),
            ProductKey::Name(name) => format!("name:{name}"),
        }
    }

    pub fn conflict_message(&self) -> String {
        match self {
            ProductKey::Code(code) => {
                format!("Product with code {code} already exists for this brand")
            }
            ProductKey::Name(_) => "Product with this name already exists for this brand".to_string(),
        }
    }
}

pub fn base_code_of(code: &str) -> Option<&str> {
    let base = code.split('-').next().unwrap_or_default().trim();
    if base.is_empty() { None } else { Some(base) }
}

fn normalize_required(value: &str, message: &str) -> DomainResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(DomainError::validation(message));
    }
    Ok(value.to_string())
}

fn check_count(count: i64) -> DomainResult<()> {
    if count < 0 {
        return Err(DomainError::validation("Stock cannot be negative"));
    }
    Ok(())
}

fn size_total(sizes: &StockBySize) -> DomainResult<i64> {
    sizes
        .total()
        .ok_or_else(|| DomainError::validation("Total stock is too large"))
}

fn check_price(price: Decimal) -> DomainResult<()> {
    if price < Decimal::ZERO {
        return Err(DomainError::validation("Price cannot be negative"));
    }
    Ok(())
}

fn check_price_by_size(prices: &PriceBySize) -> DomainResult<()> {
    match prices.first_negative() {
        Some(size) => Err(DomainError::validation(format!(
            "Price for size {size} cannot be negative"
        ))),
        None => Ok(()),
    }
}

fn check_threshold(threshold: i64) -> DomainResult<()> {
    if threshold < 0 {
        return Err(DomainError::validation("Low stock threshold cannot be negative"));
    }
    Ok(())
}
