use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    routing::{get, patch, post},
};
use serde_json::{Value, json};

use painterp_core::{BrandId, ProductId};
use painterp_infra::ProductFilter;

use crate::app::dto::{self, parse_id};
use crate::app::errors::{ApiError, ServiceResultExt};
use crate::app::extract::{ApiJson, ApiQuery};
use crate::app::services::AppServices;

type ApiResult = Result<(StatusCode, Json<Value>), ApiError>;

pub fn router() -> Router {
    Router::new()
        .route("/brands", get(list_brands).post(create_brand))
        .route("/types", get(list_product_types).post(upsert_product_type))
        .route("/types/:brand_id", get(list_brand_product_types))
        .route("/products", get(list_products).post(create_product))
        .route("/products/bulk", post(bulk_upload))
        // `:id` is a brand id for GET and a product id for PUT/DELETE.
        .route(
            "/products/:id",
            get(list_brand_products)
                .put(update_product)
                .delete(delete_product),
        )
        .route("/products/:id/stock", patch(update_stock))
        .route("/products/:id/:product_type", get(list_brand_type_products))
}

pub async fn list_brands(Extension(services): Extension<Arc<AppServices>>) -> ApiResult {
    let brands = services
        .inventory
        .list_brands()
        .await
        .or_api("Error fetching brands")?;
    Ok((StatusCode::OK, Json(dto::success(json!(brands)))))
}

pub async fn create_brand(
    Extension(services): Extension<Arc<AppServices>>,
    ApiJson(body): ApiJson<dto::CreateBrandRequest>,
) -> ApiResult {
    let brand = services
        .inventory
        .create_brand(&body.name, body.image)
        .await
        .or_api("Error creating brand")?;
    Ok((
        StatusCode::CREATED,
        Json(dto::success_with_message("Brand created successfully", json!(brand))),
    ))
}

pub async fn list_product_types(Extension(services): Extension<Arc<AppServices>>) -> ApiResult {
    let types = services
        .inventory
        .list_product_types()
        .await
        .or_api("Error fetching product types")?;
    Ok((StatusCode::OK, Json(dto::success(json!(types)))))
}

pub async fn list_brand_product_types(
    Extension(services): Extension<Arc<AppServices>>,
    Path(brand_id): Path<String>,
) -> ApiResult {
    let brand: BrandId = parse_id(&brand_id)?;
    let types = services
        .inventory
        .list_brand_product_types(brand)
        .await
        .or_api("Error fetching product types")?;
    Ok((StatusCode::OK, Json(dto::success(json!(types)))))
}

pub async fn upsert_product_type(
    Extension(services): Extension<Arc<AppServices>>,
    ApiJson(body): ApiJson<dto::UpsertProductTypeRequest>,
) -> ApiResult {
    let record = services
        .inventory
        .upsert_product_type(&body.name, body.icon)
        .await
        .or_api("Error saving product type")?;
    Ok((
        StatusCode::CREATED,
        Json(dto::success_with_message("Product type saved successfully", json!(record))),
    ))
}

pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
    ApiQuery(query): ApiQuery<dto::ProductListQuery>,
) -> ApiResult {
    let brand = query
        .brand
        .as_deref()
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(parse_id::<BrandId>)
        .transpose()?;
    let filter = ProductFilter {
        brand,
        product_type: query.product_type.filter(|t| !t.trim().is_empty()),
        search: query.search,
    };

    let products = services
        .inventory
        .list_products(&filter)
        .await
        .or_api("Error fetching products")?;
    Ok((StatusCode::OK, Json(dto::success(dto::products_to_json(&products)))))
}

pub async fn list_brand_products(
    Extension(services): Extension<Arc<AppServices>>,
    Path(brand_id): Path<String>,
) -> ApiResult {
    let brand: BrandId = parse_id(&brand_id)?;
    let products = services
        .inventory
        .list_brand_products(brand, None)
        .await
        .or_api("Error fetching products")?;
    Ok((StatusCode::OK, Json(dto::success(dto::products_to_json(&products)))))
}

pub async fn list_brand_type_products(
    Extension(services): Extension<Arc<AppServices>>,
    Path((brand_id, product_type)): Path<(String, String)>,
) -> ApiResult {
    let brand: BrandId = parse_id(&brand_id)?;
    let products = services
        .inventory
        .list_brand_products(brand, Some(product_type))
        .await
        .or_api("Error fetching products")?;
    Ok((StatusCode::OK, Json(dto::success(dto::products_to_json(&products)))))
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    ApiJson(body): ApiJson<dto::CreateProductRequest>,
) -> ApiResult {
    let new = body.into_new_product()?;
    let view = services
        .inventory
        .create_product(new)
        .await
        .or_api("Error creating product")?;
    Ok((
        StatusCode::CREATED,
        Json(dto::success_with_message(
            "Product created successfully",
            dto::product_to_json(&view),
        )),
    ))
}

pub async fn update_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<dto::UpdateProductRequest>,
) -> ApiResult {
    let id: ProductId = parse_id(&id)?;
    let update = body.into_update()?;
    let view = services
        .inventory
        .update_product(id, update)
        .await
        .or_api("Error updating product")?;
    Ok((
        StatusCode::OK,
        Json(dto::success_with_message(
            "Product updated successfully",
            dto::product_to_json(&view),
        )),
    ))
}

pub async fn delete_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> ApiResult {
    let id: ProductId = parse_id(&id)?;
    services
        .inventory
        .delete_product(id)
        .await
        .or_api("Error deleting product")?;
    Ok((
        StatusCode::OK,
        Json(json!({ "success": true, "message": "Product deleted successfully" })),
    ))
}

pub async fn update_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<dto::UpdateStockRequest>,
) -> ApiResult {
    let id: ProductId = parse_id(&id)?;
    let view = services
        .inventory
        .update_stock(id, body.into())
        .await
        .or_api("Error updating stock")?;
    Ok((
        StatusCode::OK,
        Json(dto::success_with_message(
            "Stock updated successfully",
            dto::product_to_json(&view),
        )),
    ))
}

pub async fn bulk_upload(
    Extension(services): Extension<Arc<AppServices>>,
    ApiJson(body): ApiJson<dto::BulkUploadRequest>,
) -> ApiResult {
    let brand = body
        .brand_id
        .as_deref()
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .ok_or_else(|| ApiError::bad_request("Brand ID and product type are required"))?;
    let brand: BrandId = parse_id(brand)?;
    if body.product_type.trim().is_empty() {
        return Err(ApiError::bad_request("Brand ID and product type are required"));
    }

    let submitted = body.products.len();
    let outcome = services
        .inventory
        .bulk_upload(brand, &body.product_type, body.products)
        .await
        .or_api("Error uploading products")?;

    let message = format!(
        "Processed {submitted} products: {} created, {} failed",
        outcome.success.len(),
        outcome.failed.len()
    );
    Ok((
        StatusCode::OK,
        Json(dto::success_with_message(&message, dto::bulk_outcome_to_json(&outcome))),
    ))
}
