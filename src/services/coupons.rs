use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::{
    errors::ServiceError,
    models::coupon::{Coupon, CreateCouponRequest, NotApplicableReason},
};

/// Source of coupons consulted at checkout and registration time.
#[async_trait]
pub trait CouponDirectory: Send + Sync {
    /// Finds a coupon by its exact, case-sensitive code.
    async fn lookup(&self, code: &str) -> Result<Coupon, ServiceError>;

    /// Increments the used-count once an order is finalized.
    async fn record_usage(&self, code: &str) -> Result<Coupon, ServiceError>;

    /// All coupons, ordered by code.
    async fn list(&self) -> Result<Vec<Coupon>, ServiceError>;

    /// Number of coupons held.
    async fn count(&self) -> Result<usize, ServiceError>;

    async fn create(&self, request: CreateCouponRequest) -> Result<Coupon, ServiceError>;
}

/// Coupon directory held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryCouponDirectory {
    coupons: DashMap<String, Coupon>,
}

impl InMemoryCouponDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the directory, rejecting malformed or duplicate coupons.
    pub fn with_coupons(coupons: impl IntoIterator<Item = Coupon>) -> Result<Self, ServiceError> {
        let directory = Self::new();
        for coupon in coupons {
            coupon.ensure_well_formed()?;
            match directory.coupons.entry(coupon.code.clone()) {
                Entry::Occupied(_) => {
                    return Err(ServiceError::Conflict(format!(
                        "coupon {} already exists",
                        coupon.code
                    )))
                }
                Entry::Vacant(slot) => {
                    slot.insert(coupon);
                }
            }
        }
        Ok(directory)
    }

    pub fn len(&self) -> usize {
        self.coupons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coupons.is_empty()
    }
}

#[async_trait]
impl CouponDirectory for InMemoryCouponDirectory {
    async fn lookup(&self, code: &str) -> Result<Coupon, ServiceError> {
        self.coupons
            .get(code)
            .map(|c| c.value().clone())
            .ok_or_else(|| ServiceError::CouponNotFound(code.to_string()))
    }

    #[instrument(skip(self))]
    async fn record_usage(&self, code: &str) -> Result<Coupon, ServiceError> {
        // get_mut holds the shard lock, so the limit check and the increment
        // cannot interleave with another caller.
        let mut entry = self
            .coupons
            .get_mut(code)
            .ok_or_else(|| ServiceError::CouponNotFound(code.to_string()))?;

        if entry.is_exhausted() {
            warn!("Coupon {} has reached its usage limit", code);
            return Err(ServiceError::CouponNotApplicable(
                NotApplicableReason::UsageExhausted,
            ));
        }
        entry.used_count += 1;
        Ok(entry.value().clone())
    }

    async fn list(&self) -> Result<Vec<Coupon>, ServiceError> {
        let mut coupons: Vec<Coupon> = self.coupons.iter().map(|c| c.value().clone()).collect();
        coupons.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(coupons)
    }

    async fn count(&self) -> Result<usize, ServiceError> {
        Ok(self.coupons.len())
    }

    #[instrument(skip(self, request), fields(code = %request.code))]
    async fn create(&self, request: CreateCouponRequest) -> Result<Coupon, ServiceError> {
        request.validate()?;
        let coupon = request.into_coupon();

        match self.coupons.entry(coupon.code.clone()) {
            Entry::Occupied(_) => Err(ServiceError::Conflict(format!(
                "coupon {} already exists",
                coupon.code
            ))),
            Entry::Vacant(slot) => {
                slot.insert(coupon.clone());
                info!(kind = %coupon.kind, value = %coupon.value, "coupon created");
                Ok(coupon)
            }
        }
    }
}
