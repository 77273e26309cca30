use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get, patch, post},
};
use uuid::Uuid;

use crate::{
    dto::addresses::{AddressList, CreateAddressRequest, UpdateAddressRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    models::ShippingAddress,
    response::ApiResponse,
    services::address_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_addresses))
        .route("/", post(create_address))
        .route("/primary", get(get_primary_address))
        .route("/{id}", patch(update_address))
        .route("/{id}", delete(remove_address))
        .route("/{id}/set-primary", patch(set_primary_address))
}

#[utoipa::path(
    post,
    path = "/api/shipping-addresses",
    request_body = CreateAddressRequest,
    responses(
        (status = 200, description = "Address created", body = ApiResponse<ShippingAddress>)
    ),
    tag = "Shipping addresses"
)]
pub async fn create_address(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateAddressRequest>,
) -> AppResult<Json<ApiResponse<ShippingAddress>>> {
    let res = address_service::create_address(&state.pool, &user, payload).await?;
    Ok(Json(res))
}

#[utoipa::path(
    get,
    path = "/api/shipping-addresses",
    responses(
        (status = 200, description = "Caller's address book", body = ApiResponse<AddressList>)
    ),
    tag = "Shipping addresses"
)]
pub async fn list_addresses(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<AddressList>>> {
    let res = address_service::list_addresses(&state.pool, &user).await?;
    Ok(Json(res))
}

#[utoipa::path(
    get,
    path = "/api/shipping-addresses/primary",
    responses(
        (status = 200, description = "Primary address", body = ApiResponse<ShippingAddress>),
        (status = 404, description = "No addresses yet"),
    ),
    tag = "Shipping addresses"
)]
pub async fn get_primary_address(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<ShippingAddress>>> {
    let res = address_service::get_primary_address(&state.pool, &user).await?;
    Ok(Json(res))
}

#[utoipa::path(
    patch,
    path = "/api/shipping-addresses/{id}",
    params(
        ("id" = Uuid, Path, description = "Address ID")
    ),
    request_body = UpdateAddressRequest,
    responses(
        (status = 200, description = "Address updated", body = ApiResponse<ShippingAddress>),
        (status = 404, description = "Not the caller's address"),
    ),
    tag = "Shipping addresses"
)]
pub async fn update_address(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateAddressRequest>,
) -> AppResult<Json<ApiResponse<ShippingAddress>>> {
    let res = address_service::update_address(&state.pool, &user, id, payload).await?;
    Ok(Json(res))
}

#[utoipa::path(
    patch,
    path = "/api/shipping-addresses/{id}/set-primary",
    params(
        ("id" = Uuid, Path, description = "Address ID")
    ),
    responses(
        (status = 200, description = "Primary flag moved", body = ApiResponse<ShippingAddress>),
        (status = 404, description = "Not the caller's address"),
    ),
    tag = "Shipping addresses"
)]
pub async fn set_primary_address(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<ShippingAddress>>> {
    let res = address_service::set_primary_address(&state.pool, &user, id).await?;
    Ok(Json(res))
}

#[utoipa::path(
    delete,
    path = "/api/shipping-addresses/{id}",
    params(
        ("id" = Uuid, Path, description = "Address ID")
    ),
    responses(
        (status = 200, description = "Address removed"),
        (status = 400, description = "Sole address cannot be removed"),
    ),
    tag = "Shipping addresses"
)]
pub async fn remove_address(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let res = address_service::remove_address(&state.pool, &user, id).await?;
    Ok(Json(res))
}
