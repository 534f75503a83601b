use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    routing::get,
};
use serde_json::Value;

use painterp_core::InvoiceId;

use crate::app::dto::{self, parse_id};
use crate::app::errors::{ApiError, ServiceResultExt};
use crate::app::extract::{ApiJson, ApiQuery};
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

type ApiResult = Result<(StatusCode, Json<Value>), ApiError>;

pub fn router() -> Router {
    Router::new()
        .route("/invoices", get(list_invoices).post(create_invoice))
        .route("/invoices/:invoice_id", get(get_invoice))
}

pub async fn create_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    ApiJson(body): ApiJson<dto::CreateInvoiceRequest>,
) -> ApiResult {
    let view = services
        .billing
        .create_invoice(principal.user_id(), body.items, body.tax_rate)
        .await
        .or_api("Error creating invoice")?;
    Ok((
        StatusCode::CREATED,
        Json(dto::success_with_message(
            "Invoice created successfully",
            dto::invoice_to_json(&view, &principal),
        )),
    ))
}

pub async fn list_invoices(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    ApiQuery(query): ApiQuery<dto::PageQuery>,
) -> ApiResult {
    let page = services
        .billing
        .list_invoices(principal.user_id(), query.page, query.limit)
        .await
        .or_api("Error fetching invoices")?;
    Ok((StatusCode::OK, Json(dto::invoice_page_to_json(&page, &principal))))
}

pub async fn get_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(invoice_id): Path<String>,
) -> ApiResult {
    let id: InvoiceId = parse_id(&invoice_id)?;
    let view = services
        .billing
        .get_invoice(principal.user_id(), id)
        .await
        .or_api("Error fetching invoice")?;
    Ok((StatusCode::OK, Json(dto::success(dto::invoice_to_json(&view, &principal)))))
}
