use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::{
    errors::ServiceError,
    models::coupon::{Coupon, CouponKind},
    services::coupons::CouponDirectory,
};

/// Fractional digits of the currency's minor unit.
pub const MINOR_UNIT_SCALE: u32 = 2;

/// Result of pricing a base amount, with or without a coupon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub base_amount: Decimal,
    /// Always `base_amount - final_amount`.
    pub discount: Decimal,
    pub final_amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coupon_code: Option<String>,
}

impl PriceQuote {
    fn undiscounted(base_amount: Decimal) -> Self {
        Self {
            base_amount,
            discount: Decimal::ZERO,
            final_amount: base_amount,
            coupon_code: None,
        }
    }

    pub fn has_discount(&self) -> bool {
        self.discount > Decimal::ZERO
    }
}

/// Rejects negative amounts and amounts finer than the minor unit.
pub fn validate_base_amount(base_amount: Decimal) -> Result<(), ServiceError> {
    if base_amount.is_sign_negative() && !base_amount.is_zero() {
        return Err(ServiceError::InvalidInput(format!(
            "base amount must not be negative, got {}",
            base_amount
        )));
    }
    if base_amount.normalize().scale() > MINOR_UNIT_SCALE {
        return Err(ServiceError::InvalidInput(format!(
            "base amount {} has more than {} decimal places",
            base_amount, MINOR_UNIT_SCALE
        )));
    }
    Ok(())
}

/// Rounds to the minor unit, half away from zero (half-up for the
/// non-negative amounts handled here).
pub fn round_to_minor_unit(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MINOR_UNIT_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Discount `coupon` grants on `base_amount`, clamped to `[0, base_amount]`.
fn clamped_discount(coupon: &Coupon, base_amount: Decimal) -> Decimal {
    let raw = match coupon.kind {
        // The factor is at most 1, so the product never exceeds the base.
        CouponKind::Percentage => base_amount * (coupon.value / Decimal::ONE_HUNDRED),
        CouponKind::Fixed => coupon.value,
    };
    raw.max(Decimal::ZERO).min(base_amount)
}

/// Computes the amount payable for `base_amount` after `coupon`, evaluated at `now`.
///
/// Pure: the coupon's used-count is read, never changed.
pub fn compute_final_price_at(
    base_amount: Decimal,
    coupon: Option<&Coupon>,
    now: DateTime<Utc>,
) -> Result<PriceQuote, ServiceError> {
    validate_base_amount(base_amount)?;

    let Some(coupon) = coupon else {
        return Ok(PriceQuote::undiscounted(base_amount));
    };

    coupon.ensure_well_formed()?;
    coupon
        .applicability(base_amount, now)
        .map_err(ServiceError::CouponNotApplicable)?;

    let discount = clamped_discount(coupon, base_amount);
    let final_amount = round_to_minor_unit(base_amount - discount);

    debug!(
        code = %coupon.code,
        kind = %coupon.kind,
        %base_amount,
        %final_amount,
        "coupon applied"
    );

    Ok(PriceQuote {
        base_amount,
        discount: base_amount - final_amount,
        final_amount,
        coupon_code: Some(coupon.code.clone()),
    })
}

/// [`compute_final_price_at`] evaluated against the wall clock.
pub fn compute_final_price(
    base_amount: Decimal,
    coupon: Option<&Coupon>,
) -> Result<PriceQuote, ServiceError> {
    compute_final_price_at(base_amount, coupon, Utc::now())
}

/// Prices amounts against coupons resolved by code.
#[derive(Clone)]
pub struct PricingService {
    coupons: Arc<dyn CouponDirectory>,
}

impl PricingService {
    pub fn new(coupons: Arc<dyn CouponDirectory>) -> Self {
        Self { coupons }
    }

    pub fn directory(&self) -> &Arc<dyn CouponDirectory> {
        &self.coupons
    }

    /// Quotes `base_amount`, resolving `coupon_code` through the directory.
    ///
    /// The base amount is validated before any lookup so a malformed amount
    /// never reports an unknown coupon instead.
    #[instrument(skip(self))]
    pub async fn quote(
        &self,
        base_amount: Decimal,
        coupon_code: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<PriceQuote, ServiceError> {
        validate_base_amount(base_amount)?;
        let coupon = match coupon_code {
            Some(code) => Some(self.coupons.lookup(code).await?),
            None => None,
        };
        compute_final_price_at(base_amount, coupon.as_ref(), now)
    }
}
