use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::validation::{validate_decimal_min_zero, validate_not_blank};

/// Master record of a subscription plan.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionPlan {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub descriptions: Vec<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePlanRequest {
    #[validate(length(min = 1, max = 120), custom = "validate_not_blank")]
    pub name: String,
    #[validate(length(min = 1), custom = "validate_descriptions")]
    pub descriptions: Vec<String>,
}

fn validate_descriptions(descriptions: &[String]) -> Result<(), ValidationError> {
    if descriptions.iter().any(|d| d.trim().is_empty()) {
        let mut err = ValidationError::new("descriptions");
        err.message = Some("Descriptions must not be blank".into());
        return Err(err);
    }
    Ok(())
}

impl CreatePlanRequest {
    /// Trims entries and drops blanks, the way the plan editor collects them.
    pub fn new(name: impl Into<String>, descriptions: impl IntoIterator<Item = String>) -> Self {
        Self {
            name: name.into().trim().to_string(),
            descriptions: descriptions
                .into_iter()
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty())
                .collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanRef {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
}

/// A priced version of a plan, effective from `wef`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionOffer {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_subscription: Option<PlanRef>,
    pub validity_in_days: u32,
    pub max_employees: u32,
    pub display_price: Decimal,
    pub selling_price: Decimal,
    pub wef: DateTime<Utc>,
}

impl SubscriptionOffer {
    pub fn plan_name(&self) -> &str {
        self.master_subscription
            .as_ref()
            .map(|p| p.name.as_str())
            .unwrap_or("N/A")
    }

    pub fn is_effective(&self, at: DateTime<Utc>) -> bool {
        self.wef <= at
    }

    /// Difference between display and selling price.
    pub fn markdown(&self) -> Decimal {
        self.display_price - self.selling_price
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_offer_prices"))]
pub struct RegisterOfferRequest {
    #[validate(length(min = 1))]
    pub master_subscription_id: String,
    #[validate(range(min = 1))]
    pub validity_in_days: u32,
    #[validate(range(min = 1))]
    pub max_employees: u32,
    #[validate(custom = "validate_decimal_min_zero")]
    pub display_price: Decimal,
    #[validate(custom = "validate_decimal_min_zero")]
    pub selling_price: Decimal,
    pub wef: DateTime<Utc>,
}

fn validate_offer_prices(request: &RegisterOfferRequest) -> Result<(), ValidationError> {
    if request.selling_price >= request.display_price {
        let mut err = ValidationError::new("selling_price");
        err.message = Some("Selling price must be less than display price".into());
        return Err(err);
    }
    Ok(())
}
