use axum::{
    Json, Router,
    extract::{Path, State},
    http::HeaderMap,
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::payments::{
        CreateInvoiceRequest, CreateVirtualAccountRequest, PaymentCharge, WebhookPayload,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Payment,
    response::ApiResponse,
    services::payment_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/invoice", post(create_invoice))
        .route("/virtual-account", post(create_virtual_account))
        .route("/webhook", post(webhook))
        .route("/order/{order_id}", get(list_order_payments))
}

#[utoipa::path(
    post,
    path = "/api/payments/invoice",
    request_body = CreateInvoiceRequest,
    responses(
        (status = 200, description = "Invoice charge created", body = ApiResponse<PaymentCharge>),
        (status = 400, description = "Order not payable"),
        (status = 409, description = "Payment already initiated"),
    ),
    tag = "Payments"
)]
pub async fn create_invoice(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateInvoiceRequest>,
) -> AppResult<Json<ApiResponse<PaymentCharge>>> {
    let res = payment_service::create_invoice(&state, &user, payload).await?;
    Ok(Json(res))
}

#[utoipa::path(
    post,
    path = "/api/payments/virtual-account",
    request_body = CreateVirtualAccountRequest,
    responses(
        (status = 200, description = "Virtual account charge created", body = ApiResponse<PaymentCharge>),
        (status = 400, description = "Order not payable"),
        (status = 409, description = "Payment already initiated"),
    ),
    tag = "Payments"
)]
pub async fn create_virtual_account(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateVirtualAccountRequest>,
) -> AppResult<Json<ApiResponse<PaymentCharge>>> {
    let res = payment_service::create_virtual_account(&state, &user, payload).await?;
    Ok(Json(res))
}

#[utoipa::path(
    post,
    path = "/api/payments/webhook",
    request_body = WebhookPayload,
    params(
        ("x-callback-token" = String, Header, description = "Shared provider callback token")
    ),
    responses(
        (status = 200, description = "Webhook processed", body = ApiResponse<Payment>),
        (status = 403, description = "Bad callback token"),
        (status = 404, description = "Unknown external id"),
    ),
    tag = "Payments"
)]
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<WebhookPayload>,
) -> AppResult<Json<ApiResponse<Payment>>> {
    let expected = std::env::var("GATEWAY_CALLBACK_TOKEN")
        .map_err(|_| AppError::Internal(anyhow::anyhow!("GATEWAY_CALLBACK_TOKEN is not set")))?;
    let provided = headers
        .get("x-callback-token")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if provided != expected {
        return Err(AppError::Forbidden);
    }

    let res = payment_service::handle_webhook(&state, payload).await?;
    Ok(Json(res))
}

#[utoipa::path(
    get,
    path = "/api/payments/order/{order_id}",
    params(
        ("order_id" = Uuid, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Payments for the order", body = ApiResponse<Vec<Payment>>),
        (status = 403, description = "Not the order's owner"),
    ),
    tag = "Payments"
)]
pub async fn list_order_payments(
    State(state): State<AppState>,
    user: AuthUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Vec<Payment>>>> {
    let res = payment_service::list_order_payments(&state, &user, order_id).await?;
    Ok(Json(res))
}
