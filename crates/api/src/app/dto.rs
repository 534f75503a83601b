use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Value, json};

use painterp_core::{BrandId, DomainError};
use painterp_infra::{BulkOutcome, InvoicePage, InvoiceView, ProductUpdate, ProductView, StockUpdate};
use painterp_inventory::{Brand, NewProduct, PriceBySize, ProductPatch, StockBySize};
use painterp_invoicing::CartLine;

use crate::app::errors::ApiError;
use crate::context::PrincipalContext;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateBrandRequest {
    pub name: String,
    pub image: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpsertProductTypeRequest {
    pub name: String,
    pub icon: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateProductRequest {
    pub name: String,
    pub brand: Option<String>,
    #[serde(rename = "type")]
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

impl CreateProductRequest {
    pub fn into_new_product(self) -> Result<NewProduct, ApiError> {
        let brand = self
            .brand
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .ok_or_else(|| ApiError::bad_request("Brand is required"))?;

        Ok(NewProduct {
            name: self.name,
            brand: parse_id(brand)?,
            product_type: self.product_type,
            price: self.price,
            stock: self.stock,
            stock_by_size: self.stock_by_size,
            price_by_size: self.price_by_size,
            unit: self.unit,
            product_code: self.product_code,
            product_image: self.product_image,
            low_stock_threshold: self.low_stock_threshold,
            description: self.description,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub brand: Option<String>,
    #[serde(rename = "type")]
    pub product_type: Option<String>,
    pub price: Option<Decimal>,
    pub price_by_size: Option<PriceBySize>,
    pub stock: Option<i64>,
    pub stock_by_size: Option<StockBySize>,
    pub unit: Option<String>,
    pub product_code: Option<String>,
    pub product_image: Option<String>,
    pub low_stock_threshold: Option<i64>,
    pub description: Option<String>,
}

impl UpdateProductRequest {
    pub fn into_update(self) -> Result<ProductUpdate, ApiError> {
        let brand = self.brand.as_deref().map(parse_id::<BrandId>).transpose()?;
        Ok(ProductUpdate {
            patch: ProductPatch {
                name: self.name,
                brand,
                product_type: self.product_type,
                price: self.price,
                price_by_size: self.price_by_size,
                unit: self.unit,
                product_code: self.product_code,
                product_image: self.product_image,
                low_stock_threshold: self.low_stock_threshold,
                description: self.description,
            },
            stock_by_size: self.stock_by_size,
            stock: self.stock,
        })
    }
}

/// `PATCH /inventory/products/:id/stock`. `stockBySize` is the count for `size`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateStockRequest {
    pub stock: Option<i64>,
    pub size: Option<String>,
    pub stock_by_size: Option<i64>,
}

impl From<UpdateStockRequest> for StockUpdate {
    fn from(req: UpdateStockRequest) -> Self {
        StockUpdate {
            stock: req.stock,
            size: req.size,
            stock_by_size: req.stock_by_size,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BulkUploadRequest {
    /// Parsed row by row so one malformed entry only fails itself.
    pub products: Vec<Value>,
    pub brand_id: Option<String>,
    pub product_type: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProductListQuery {
    pub brand: Option<String>,
    #[serde(rename = "type")]
    pub product_type: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateInvoiceRequest {
    pub items: Vec<CartLine>,
    pub tax_rate: Option<Decimal>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PageQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

pub fn parse_id<T>(raw: &str) -> Result<T, ApiError>
where
    T: FromStr<Err = DomainError>,
{
    raw.trim().parse::<T>().map_err(ApiError::from)
}

// -------------------------
// Response envelope
// -------------------------

pub fn success(data: Value) -> Value {
    json!({ "success": true, "data": data })
}

pub fn success_with_message(message: &str, data: Value) -> Value {
    json!({ "success": true, "message": message, "data": data })
}

// -------------------------
// Response mapping
// -------------------------

pub fn brand_summary(brand: Option<&Brand>) -> Value {
    match brand {
        Some(b) => json!({ "id": b.id(), "name": b.name(), "image": b.image() }),
        None => Value::Null,
    }
}

/// Product with its brand expanded to `{id, name, image}`.
pub fn product_to_json(view: &ProductView) -> Value {
    let mut value = json!(view.product);
    value["brand"] = brand_summary(view.brand.as_ref());
    value["lowStock"] = json!(view.product.is_low_stock());
    value
}

pub fn products_to_json(views: &[ProductView]) -> Value {
    Value::Array(views.iter().map(product_to_json).collect())
}

/// Invoice with product references expanded to `{id, name, brand, price}`
/// and the user expanded from the authenticated principal.
pub fn invoice_to_json(view: &InvoiceView, principal: &PrincipalContext) -> Value {
    let mut value = json!(view.invoice);
    value["user"] = json!({
        "id": principal.user_id(),
        "name": principal.name(),
        "email": principal.email(),
    });

    if let Some(items) = value["items"].as_array_mut() {
        for (item, line) in items.iter_mut().zip(view.invoice.items()) {
            if let Some(product) = view.products.get(&line.product) {
                item["product"] = json!({
                    "id": product.id(),
                    "name": product.name(),
                    "brand": product.brand(),
                    "price": product.price(),
                });
            }
        }
    }
    value
}

pub fn invoice_page_to_json(page: &InvoicePage, principal: &PrincipalContext) -> Value {
    let items: Vec<Value> = page
        .items
        .iter()
        .map(|view| invoice_to_json(view, principal))
        .collect();
    json!({
        "success": true,
        "data": items,
        "pagination": {
            "page": page.page,
            "limit": page.limit,
            "total": page.total,
            "pages": page.pages,
        },
    })
}

pub fn bulk_outcome_to_json(outcome: &BulkOutcome) -> Value {
    let failed: Vec<Value> = outcome
        .failed
        .iter()
        .map(|f| match &f.row {
            Value::Object(fields) => {
                let mut row = fields.clone();
                row.insert("reason".into(), json!(f.reason));
                Value::Object(row)
            }
            other => json!({ "row": other, "reason": f.reason }),
        })
        .collect();
    json!({
        "success": products_to_json(&outcome.success),
        "failed": failed,
    })
}
