use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::product::Product;
use crate::errors::ServiceError;

/// A reference the remote API returns either as a bare id or populated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reference<T> {
    Id(String),
    Populated(T),
}

/// Populated user reference inside a cart.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserRef {
    #[serde(rename = "_id")]
    pub id: String,
}

impl Reference<UserRef> {
    pub fn id(&self) -> &str {
        match self {
            Reference::Id(id) => id,
            Reference::Populated(user) => &user.id,
        }
    }
}

impl Reference<Product> {
    pub fn id(&self) -> &str {
        match self {
            Reference::Id(id) => id,
            Reference::Populated(product) => &product.id,
        }
    }

    pub fn product(&self) -> Option<&Product> {
        match self {
            Reference::Id(_) => None,
            Reference::Populated(product) => Some(product),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    #[serde(rename = "productId")]
    pub product: Reference<Product>,
    pub quantity: u32,
}

impl CartLine {
    /// Price times quantity; `Ok(None)` when the product is not populated.
    pub fn line_total(&self) -> Result<Option<Decimal>, ServiceError> {
        self.product
            .product()
            .map(|p| {
                p.price
                    .checked_mul(Decimal::from(self.quantity))
                    .ok_or_else(|| {
                        ServiceError::InvalidInput(format!(
                            "line total for product {} is out of range",
                            p.id
                        ))
                    })
            })
            .transpose()
    }
}

/// Sum of populated line totals, or `fallback` when any line is not populated.
fn total_of(lines: &[CartLine], fallback: Decimal) -> Result<Decimal, ServiceError> {
    let mut total = Decimal::ZERO;
    for line in lines {
        let Some(amount) = line.line_total()? else {
            return Ok(fallback);
        };
        total = total
            .checked_add(amount)
            .ok_or_else(|| ServiceError::InvalidInput("cart total is out of range".into()))?;
    }
    Ok(total)
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "userId")]
    pub owner: Reference<UserRef>,
    #[serde(default, rename = "products")]
    pub lines: Vec<CartLine>,
    #[serde(default)]
    pub total_price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_price: Option<Decimal>,
}

impl Cart {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn belongs_to(&self, user_id: &str) -> bool {
        self.owner.id() == user_id
    }

    pub fn line(&self, product_id: &str) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.product.id() == product_id)
    }

    /// Sum of populated line totals, falling back to the server's total
    /// when any line is not populated. Fails when the sum is out of range.
    pub fn computed_total(&self) -> Result<Decimal, ServiceError> {
        total_of(&self.lines, self.total_price)
    }

    /// Sets a line's quantity; zero removes the line. Returns the quantity
    /// that was there before, if the product was in the cart.
    ///
    /// The cart is left untouched when the new total would be out of range.
    pub fn set_quantity(
        &mut self,
        product_id: &str,
        quantity: u32,
    ) -> Result<Option<u32>, ServiceError> {
        let Some(index) = self.lines.iter().position(|l| l.product.id() == product_id) else {
            return Ok(None);
        };
        let previous = self.lines[index].quantity;

        let mut lines = self.lines.clone();
        if quantity == 0 {
            lines.remove(index);
        } else {
            lines[index].quantity = quantity;
        }
        let total = total_of(&lines, self.total_price)?;

        self.lines = lines;
        self.total_price = total;
        self.discount_price = None;
        self.final_price = None;
        Ok(Some(previous))
    }

    /// Quantity after applying `change` to the current line, saturating at 0.
    pub fn adjusted_quantity(&self, product_id: &str, change: i64) -> Option<u32> {
        let current = i64::from(self.line(product_id)?.quantity);
        let next = (current + change).clamp(0, i64::from(u32::MAX));
        u32::try_from(next).ok()
    }

    /// Amount payable, taking an applied coupon into account.
    pub fn payable(&self) -> Decimal {
        self.final_price.unwrap_or(self.total_price)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CartItemRequest {
    #[validate(length(min = 1))]
    pub product_id: String,
    #[validate(range(min = 1))]
    pub quantity: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCartRequest {
    #[validate(length(min = 1))]
    pub user_id: String,
    #[validate(length(min = 1))]
    pub products: Vec<CartItemRequest>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQuantityRequest {
    #[validate(range(min = 1))]
    pub quantity: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ApplyCouponRequest {
    #[validate(length(min = 1))]
    pub coupon_code: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApplyCouponResponse {
    pub cart: Cart,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn cart() -> Cart {
        serde_json::from_value(serde_json::json!({
            "_id": "c-1",
            "userId": { "_id": "u-1", "name": "Asha" },
            "products": [
                { "productId": { "_id": "p-1", "name": "Lamp", "price": 250 }, "quantity": 2 },
                { "productId": { "_id": "p-2", "name": "Mat", "price": "99.50" }, "quantity": 1 }
            ],
            "totalPrice": 599.5
        }))
        .unwrap()
    }

    #[test]
    fn parses_populated_cart() {
        let cart = cart();
        assert!(cart.belongs_to("u-1"));
        assert_eq!(cart.computed_total().unwrap(), dec!(599.50));
        assert_eq!(cart.line("p-2").map(|l| l.quantity), Some(1));
    }

    #[test]
    fn owner_may_be_a_bare_id() {
        let cart: Cart = serde_json::from_value(serde_json::json!({
            "_id": "c-2",
            "userId": "u-9",
            "products": [{ "productId": "p-1", "quantity": 1 }],
            "totalPrice": 10
        }))
        .unwrap();
        assert!(cart.belongs_to("u-9"));
        assert_eq!(cart.computed_total().unwrap(), dec!(10));
    }

    #[test]
    fn zero_quantity_removes_line() {
        let mut cart = cart();
        assert_eq!(cart.set_quantity("p-1", 0).unwrap(), Some(2));
        assert!(cart.line("p-1").is_none());
        assert_eq!(cart.total_price, dec!(99.50));
        assert_eq!(cart.set_quantity("missing", 1).unwrap(), None);
    }

    #[test]
    fn quantity_change_clears_applied_coupon() {
        let mut cart = cart();
        cart.discount_price = Some(dec!(59.95));
        cart.final_price = Some(dec!(539.55));
        assert_eq!(cart.payable(), dec!(539.55));

        cart.set_quantity("p-2", 3).unwrap();
        assert_eq!(cart.final_price, None);
        assert_eq!(cart.payable(), dec!(798.50));
    }

    #[test]
    fn adjusted_quantity_saturates_at_zero() {
        let cart = cart();
        assert_eq!(cart.adjusted_quantity("p-1", -5), Some(0));
        assert_eq!(cart.adjusted_quantity("p-1", 1), Some(3));
        assert_eq!(cart.adjusted_quantity("nope", 1), None);
    }

    #[test]
    fn oversized_totals_are_rejected() {
        let huge: Cart = serde_json::from_value(serde_json::json!({
            "_id": "c-3",
            "userId": "u-1",
            "products": [
                { "productId": { "_id": "p-1", "name": "Yacht", "price": "100000000000000000000" }, "quantity": 4000000000u32 }
            ],
            "totalPrice": 0
        }))
        .unwrap();
        assert!(matches!(
            huge.computed_total(),
            Err(ServiceError::InvalidInput(_))
        ));

        // each line fits but the sum does not
        let mut cart = cart();
        let max_line = CartLine {
            product: Reference::Populated(Product {
                id: "p-max".into(),
                name: "Max".into(),
                price: Decimal::MAX,
                description: String::new(),
                category: String::new(),
                stock: 1,
                image: String::new(),
            }),
            quantity: 1,
        };
        cart.lines.push(max_line);
        assert!(cart.computed_total().is_err());

        // a failed update leaves the cart as it was
        let before = cart.clone();
        assert!(cart.set_quantity("p-1", 3).is_err());
        assert_eq!(cart, before);
    }
}
