use axum::{
    extract::{rejection::JsonRejection, Json, Path, State},
    response::IntoResponse,
};
use tracing::info;

use crate::{
    errors::ApiError,
    handlers::common::{
        created_response, json_body, map_service_error, success_response, validate_input,
    },
    models::CreateCouponRequest,
    AppState,
};

/// List every coupon, ordered by code
pub async fn list_coupons(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let coupons = state.coupons.list().await.map_err(map_service_error)?;
    Ok(success_response(coupons))
}

/// Create a coupon
pub async fn create_coupon(
    State(state): State<AppState>,
    payload: Result<Json<CreateCouponRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = json_body(payload)?;
    validate_input(&payload)?;

    let coupon = state
        .coupons
        .create(payload)
        .await
        .map_err(map_service_error)?;

    info!(code = %coupon.code, "coupon created via API");
    Ok(created_response(coupon))
}

/// Look up a coupon by its exact code
pub async fn get_coupon(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let coupon = state.coupons.lookup(&code).await.map_err(map_service_error)?;
    Ok(success_response(coupon))
}

/// Record one use of a coupon for a finalized order
pub async fn record_coupon_usage(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let coupon = state
        .coupons
        .record_usage(&code)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(coupon))
}
