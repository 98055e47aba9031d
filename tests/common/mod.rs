#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use storefront::{
    config::AppConfig,
    models::{Coupon, CouponKind},
    services::{CouponDirectory, InMemoryCouponDirectory},
    AppState,
};
use tower::ServiceExt;

/// Router over a fresh in-memory coupon directory.
pub struct TestApp {
    router: Router,
    pub coupons: Arc<InMemoryCouponDirectory>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_coupons(Vec::new())
    }

    pub fn with_coupons(coupons: Vec<Coupon>) -> Self {
        let directory = Arc::new(
            InMemoryCouponDirectory::with_coupons(coupons).expect("seed coupons should be valid"),
        );
        let shared: Arc<dyn CouponDirectory> = directory.clone();
        let config = AppConfig::new(
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
            "http://127.0.0.1:18080/api".to_string(),
        );
        Self {
            router: storefront::app(AppState::new(config, shared)),
            coupons: directory,
        }
    }

    /// Sends a request and returns the status, the request id header and the JSON body.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> (StatusCode, Option<String>, Value) {
        let mut builder = Request::builder().method(method).uri(path);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let request_id = response
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, request_id, json)
    }

    pub async fn get(&self, path: &str) -> (StatusCode, Value) {
        let (status, _, body) = self.send(Method::GET, path, None).await;
        (status, body)
    }

    pub async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let (status, _, body) = self.send(Method::POST, path, Some(body)).await;
        (status, body)
    }
}

/// A well-formed coupon active for a week either side of `now`.
pub fn coupon(code: &str, kind: CouponKind, value: Decimal) -> Coupon {
    coupon_at(code, kind, value, Utc::now())
}

pub fn coupon_at(code: &str, kind: CouponKind, value: Decimal, now: DateTime<Utc>) -> Coupon {
    Coupon {
        id: None,
        code: code.to_string(),
        kind,
        value,
        starts_at: now - Duration::days(7),
        ends_at: now + Duration::days(7),
        usage_limit: None,
        used_count: 0,
        min_purchase: None,
    }
}

/// Parses a decimal rendered either as a JSON string or number.
pub fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => s.parse().unwrap(),
        Value::Number(n) => n.to_string().parse().unwrap(),
        other => panic!("not a decimal: {other}"),
    }
}
