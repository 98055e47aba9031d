use chrono::{DateTime, Utc};
use tracing::{info, instrument};

use crate::{
    errors::ServiceError,
    models::{cart::Cart, coupon::Coupon},
    services::pricing::{PriceQuote, PricingService},
};

/// Prices carts and finalizes orders.
#[derive(Clone)]
pub struct CheckoutService {
    pricing: PricingService,
}

impl CheckoutService {
    pub fn new(pricing: PricingService) -> Self {
        Self { pricing }
    }

    /// Quotes the cart total with an optional coupon. The cart is not changed.
    #[instrument(skip(self, cart), fields(cart_id = %cart.id))]
    pub async fn price_cart(
        &self,
        cart: &Cart,
        coupon_code: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<PriceQuote, ServiceError> {
        if cart.is_empty() {
            return Err(ServiceError::InvalidInput(format!(
                "cart {} has no items",
                cart.id
            )));
        }
        let total = cart.computed_total()?;
        self.pricing.quote(total, coupon_code, now).await
    }

    /// Writes a quote's discount onto the cart.
    pub fn apply_quote(cart: &mut Cart, quote: &PriceQuote) {
        cart.total_price = quote.base_amount;
        cart.discount_price = Some(quote.discount);
        cart.final_price = Some(quote.final_amount);
    }

    /// Records coupon usage for a finalized order. This is the only place the
    /// used-count changes.
    #[instrument(skip(self, quote))]
    pub async fn complete_order(
        &self,
        order_ref: &str,
        quote: &PriceQuote,
    ) -> Result<Option<Coupon>, ServiceError> {
        let Some(code) = quote.coupon_code.as_deref() else {
            return Ok(None);
        };
        let coupon = self.pricing.directory().record_usage(code).await?;
        info!(
            order_ref,
            code,
            used = coupon.used_count,
            "coupon usage recorded"
        );
        Ok(Some(coupon))
    }
}
