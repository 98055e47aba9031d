pub mod cart;
pub mod client;
pub mod coupon;
pub mod product;
pub mod subscription;
pub mod user;
mod validation;

pub use cart::{Cart, CartLine, Reference};
pub use client::{ClientRegistrationRequest, RegisteredClient};
pub use coupon::{Coupon, CouponKind, CreateCouponRequest, NotApplicableReason};
pub use product::{Product, ProductRequest};
pub use subscription::{
    CreatePlanRequest, PlanRef, RegisterOfferRequest, SubscriptionOffer, SubscriptionPlan,
};
pub use user::{LoginRequest, LoginResponse};
