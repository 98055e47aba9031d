pub mod common;
pub mod coupons;
pub mod health;
pub mod pricing;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;
