pub mod checkout;
pub mod coupons;
pub mod pricing;
pub mod registration;
pub mod subscriptions;

pub use checkout::CheckoutService;
pub use coupons::{CouponDirectory, InMemoryCouponDirectory};
pub use pricing::{compute_final_price, compute_final_price_at, PriceQuote, PricingService};
pub use registration::RegistrationService;
