use chrono::{DateTime, Utc};
use tracing::{info, instrument};
use validator::Validate;

use crate::{
    errors::ServiceError,
    models::{
        client::{ClientRegistrationRequest, RegisteredClient},
        subscription::SubscriptionOffer,
    },
    services::{
        pricing::{PriceQuote, PricingService},
        subscriptions::find_offer,
    },
};

/// Registers clients onto subscription offers.
#[derive(Clone)]
pub struct RegistrationService {
    pricing: PricingService,
}

impl RegistrationService {
    pub fn new(pricing: PricingService) -> Self {
        Self { pricing }
    }

    /// Prices an offer's selling price with an optional coupon.
    pub async fn quote(
        &self,
        offer: &SubscriptionOffer,
        coupon_code: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<PriceQuote, ServiceError> {
        self.pricing
            .quote(offer.selling_price, coupon_code, now)
            .await
    }

    /// Validates and prices a registration, then consumes the coupon.
    #[instrument(skip(self, request, offers), fields(subscription_id = %request.subscription_id))]
    pub async fn register(
        &self,
        request: &ClientRegistrationRequest,
        offers: &[SubscriptionOffer],
        now: DateTime<Utc>,
    ) -> Result<RegisteredClient, ServiceError> {
        request.validate()?;

        let offer = find_offer(offers, &request.subscription_id).ok_or_else(|| {
            ServiceError::NotFound(format!("subscription {}", request.subscription_id))
        })?;

        let quote = self.quote(offer, request.coupon(), now).await?;
        if let Some(code) = quote.coupon_code.as_deref() {
            self.pricing.directory().record_usage(code).await?;
        }

        info!(
            client = %request.email,
            plan = offer.plan_name(),
            total = %quote.final_amount,
            "client registered"
        );

        Ok(RegisteredClient {
            id: None,
            name: request.name.trim().to_string(),
            email: request.email.clone(),
            subscription_name: offer.plan_name().to_string(),
            display_price: offer.display_price,
            selling_price: offer.selling_price,
            coupon_code: quote.coupon_code,
            total_price: quote.final_amount,
            registered_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        coupon::{CouponKind, CreateCouponRequest},
        subscription::PlanRef,
    };
    use crate::services::coupons::{CouponDirectory, InMemoryCouponDirectory};
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn offers() -> Vec<SubscriptionOffer> {
        vec![SubscriptionOffer {
            id: "o-gold".into(),
            master_subscription: Some(PlanRef {
                id: "plan-gold".into(),
                name: "GOLD".into(),
            }),
            validity_in_days: 365,
            max_employees: 25,
            display_price: dec!(12000),
            selling_price: dec!(9999),
            wef: Utc::now() - Duration::days(10),
        }]
    }

    async fn service() -> (RegistrationService, Arc<InMemoryCouponDirectory>) {
        let directory = Arc::new(InMemoryCouponDirectory::new());
        let now = Utc::now();
        directory
            .create(CreateCouponRequest {
                code: "LAUNCH15".into(),
                kind: CouponKind::Percentage,
                value: dec!(15),
                starts_at: now - Duration::days(1),
                ends_at: now + Duration::days(30),
                usage_limit: None,
                min_purchase: None,
            })
            .await
            .unwrap();
        (
            RegistrationService::new(PricingService::new(directory.clone())),
            directory,
        )
    }

    fn request(coupon: Option<&str>) -> ClientRegistrationRequest {
        ClientRegistrationRequest {
            name: "Contoso".into(),
            email: "billing@contoso.example".into(),
            subscription_id: "o-gold".into(),
            coupon_code: coupon.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn registration_applies_coupon_to_selling_price() {
        let (service, directory) = service().await;
        let client = service
            .register(&request(Some("LAUNCH15")), &offers(), Utc::now())
            .await
            .unwrap();

        // 9999 * 0.85 = 8499.15
        assert_eq!(client.total_price, dec!(8499.15));
        assert_eq!(client.subscription_name, "GOLD");
        assert_eq!(client.coupon_code.as_deref(), Some("LAUNCH15"));
        assert_eq!(directory.lookup("LAUNCH15").await.unwrap().used_count, 1);
    }

    #[tokio::test]
    async fn unknown_coupon_fails_registration() {
        let (service, _) = service().await;
        let err = service
            .register(&request(Some("NOPE")), &offers(), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::CouponNotFound(_)));
    }

    #[tokio::test]
    async fn unknown_offer_is_not_found() {
        let (service, _) = service().await;
        let mut r = request(None);
        r.subscription_id = "o-missing".into();
        let err = service.register(&r, &offers(), Utc::now()).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn quote_does_not_consume_coupon() {
        let (service, directory) = service().await;
        let quote = service
            .quote(&offers()[0], Some("LAUNCH15"), Utc::now())
            .await
            .unwrap();
        assert_eq!(quote.discount, dec!(1499.85));
        assert_eq!(directory.lookup("LAUNCH15").await.unwrap().used_count, 0);
    }
}
