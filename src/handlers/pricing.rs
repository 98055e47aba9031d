use axum::{
    extract::{rejection::JsonRejection, Json, State},
    response::IntoResponse,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    errors::ApiError,
    handlers::common::{json_body, map_service_error, success_response},
    AppState,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    pub base_amount: Decimal,
    #[serde(default)]
    pub coupon_code: Option<String>,
}

impl QuoteRequest {
    /// Coupon code with surrounding whitespace removed; blank means none.
    pub fn coupon(&self) -> Option<&str> {
        self.coupon_code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
    }
}

/// Price a base amount, optionally against a coupon
pub async fn quote_price(
    State(state): State<AppState>,
    payload: Result<Json<QuoteRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = json_body(payload)?;

    let quote = state
        .pricing
        .quote(payload.base_amount, payload.coupon(), Utc::now())
        .await
        .map_err(map_service_error)?;

    Ok(success_response(quote))
}
