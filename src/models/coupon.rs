use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use validator::{Validate, ValidationError};

use super::validation::{validate_decimal_min_zero, validate_positive_decimal};
use crate::errors::ServiceError;

/// Upper bound for a percentage coupon's value.
pub const MAX_PERCENTAGE: Decimal = Decimal::ONE_HUNDRED;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
pub enum CouponKind {
    #[serde(alias = "percentage")]
    #[strum(to_string = "Percentage", serialize = "percentage")]
    Percentage,
    #[serde(alias = "fixed", alias = "FixedAmount")]
    #[strum(to_string = "Fixed", serialize = "fixed", serialize = "FixedAmount")]
    Fixed,
}

/// Why a well-formed coupon cannot be used right now.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum NotApplicableReason {
    #[strum(serialize = "not yet active")]
    NotYetActive,
    #[strum(serialize = "expired")]
    Expired,
    #[strum(serialize = "usage exhausted")]
    UsageExhausted,
    #[strum(serialize = "below minimum purchase")]
    BelowMinimumPurchase,
}

/// A named discount rule.
///
/// The wire form is the `couponType`/`couponValue` shape used by the coupon
/// administration endpoints. Records written with `discountType`/`discount`
/// are read through the aliases and re-emitted in the canonical shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub code: String,
    #[serde(rename = "couponType", alias = "discountType")]
    pub kind: CouponKind,
    #[serde(rename = "couponValue", alias = "discount")]
    pub value: Decimal,
    #[serde(rename = "startsFrom")]
    pub starts_at: DateTime<Utc>,
    #[serde(rename = "endsOn")]
    pub ends_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_limit: Option<u32>,
    #[serde(default)]
    pub used_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_purchase: Option<Decimal>,
}

impl Coupon {
    /// Checks the coupon's own data invariants, independent of time and amount.
    pub fn ensure_well_formed(&self) -> Result<(), ServiceError> {
        if self.code.trim().is_empty() {
            return Err(ServiceError::InvalidCoupon("code must not be empty".into()));
        }
        check_value(self.kind, self.value)
            .map_err(|msg| ServiceError::InvalidCoupon(format!("{}: {}", self.code, msg)))?;
        if self.starts_at >= self.ends_at {
            return Err(ServiceError::InvalidCoupon(format!(
                "{}: validity window must start before it ends",
                self.code
            )));
        }
        if let Some(limit) = self.usage_limit {
            if limit == 0 {
                return Err(ServiceError::InvalidCoupon(format!(
                    "{}: usage limit must be positive",
                    self.code
                )));
            }
            if self.used_count > limit {
                return Err(ServiceError::InvalidCoupon(format!(
                    "{}: used count {} exceeds usage limit {}",
                    self.code, self.used_count, limit
                )));
            }
        }
        if matches!(self.min_purchase, Some(min) if min.is_sign_negative()) {
            return Err(ServiceError::InvalidCoupon(format!(
                "{}: minimum purchase must not be negative",
                self.code
            )));
        }
        Ok(())
    }

    /// Window bounds are inclusive.
    pub fn window_check(&self, now: DateTime<Utc>) -> Result<(), NotApplicableReason> {
        if now < self.starts_at {
            Err(NotApplicableReason::NotYetActive)
        } else if now > self.ends_at {
            Err(NotApplicableReason::Expired)
        } else {
            Ok(())
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self.usage_limit, Some(limit) if self.used_count >= limit)
    }

    pub fn remaining_uses(&self) -> Option<u32> {
        self.usage_limit
            .map(|limit| limit.saturating_sub(self.used_count))
    }

    /// Applicability of this coupon against `base_amount` at `now`.
    pub fn applicability(
        &self,
        base_amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<(), NotApplicableReason> {
        self.window_check(now)?;
        if self.is_exhausted() {
            return Err(NotApplicableReason::UsageExhausted);
        }
        if matches!(self.min_purchase, Some(min) if base_amount < min) {
            return Err(NotApplicableReason::BelowMinimumPurchase);
        }
        Ok(())
    }

    /// Short label such as `10% off` or `50.00 off`.
    pub fn label(&self) -> String {
        match self.kind {
            CouponKind::Percentage => format!("{}% off", self.value.normalize()),
            CouponKind::Fixed => format!("{:.2} off", self.value),
        }
    }
}

fn check_value(kind: CouponKind, value: Decimal) -> Result<(), &'static str> {
    if value <= Decimal::ZERO {
        return Err("value must be greater than 0");
    }
    if kind == CouponKind::Percentage && value > MAX_PERCENTAGE {
        return Err("percentage must not exceed 100");
    }
    Ok(())
}

/// Administrative request to create a coupon.
#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_create_coupon"))]
pub struct CreateCouponRequest {
    #[validate(length(min = 1, max = 64))]
    pub code: String,
    #[serde(rename = "couponType")]
    pub kind: CouponKind,
    #[serde(rename = "couponValue")]
    #[validate(custom = "validate_positive_decimal")]
    pub value: Decimal,
    #[serde(rename = "startsFrom")]
    pub starts_at: DateTime<Utc>,
    #[serde(rename = "endsOn")]
    pub ends_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1))]
    pub usage_limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(custom = "validate_decimal_min_zero")]
    pub min_purchase: Option<Decimal>,
}

fn validate_create_coupon(request: &CreateCouponRequest) -> Result<(), ValidationError> {
    if request.code.chars().any(char::is_whitespace) {
        let mut err = ValidationError::new("code");
        err.message = Some("Coupon code must not contain whitespace".into());
        return Err(err);
    }
    if request.kind == CouponKind::Percentage && request.value > MAX_PERCENTAGE {
        let mut err = ValidationError::new("percentage");
        err.message = Some("Percentage coupons cannot exceed 100".into());
        return Err(err);
    }
    if request.ends_at <= request.starts_at {
        let mut err = ValidationError::new("validity_window");
        err.message = Some("End date must be after start date".into());
        return Err(err);
    }
    Ok(())
}

impl CreateCouponRequest {
    pub fn into_coupon(self) -> Coupon {
        Coupon {
            id: None,
            code: self.code,
            kind: self.kind,
            value: self.value,
            starts_at: self.starts_at,
            ends_at: self.ends_at,
            usage_limit: self.usage_limit,
            used_count: 0,
            min_purchase: self.min_purchase,
        }
    }
}
