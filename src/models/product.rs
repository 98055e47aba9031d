use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::validation::{validate_decimal_min_zero, validate_not_blank};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub image: String,
}

impl Product {
    pub fn in_stock(&self) -> bool {
        self.stock > 0
    }

    /// Clamps a requested purchase quantity to `1..=stock`.
    ///
    /// Returns `None` when the product is out of stock.
    pub fn clamp_quantity(&self, requested: u32) -> Option<u32> {
        if !self.in_stock() {
            return None;
        }
        Some(requested.clamp(1, self.stock))
    }
}

/// Body for both product creation and product update.
#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProductRequest {
    #[validate(length(min = 1, max = 200), custom = "validate_not_blank")]
    pub name: String,
    #[validate(custom = "validate_decimal_min_zero")]
    pub price: Decimal,
    #[validate(custom = "validate_not_blank")]
    pub description: String,
    #[validate(custom = "validate_not_blank")]
    pub category: String,
    pub stock: u32,
    #[validate(url)]
    pub image: String,
}

impl From<&Product> for ProductRequest {
    fn from(product: &Product) -> Self {
        Self {
            name: product.name.clone(),
            price: product.price,
            description: product.description.clone(),
            category: product.category.clone(),
            stock: product.stock,
            image: product.image.clone(),
        }
    }
}
