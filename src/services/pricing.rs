use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::config::AppConfig;
use crate::models::{CartLineItem, Product};

/// Bulk-discount rule for credit purchases: the flat multiplier applies only
/// when the product is discount-eligible and the quantity reaches the
/// threshold. The resulting price is computed once, at add-to-cart time, and
/// never recomputed afterwards.
#[derive(Debug, Clone)]
pub struct PricingPolicy {
    pub threshold: u32,
    pub multiplier: Decimal,
}

impl PricingPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            threshold: config.discount_threshold,
            multiplier: config.discount_multiplier,
        }
    }

    pub fn discount_applies(&self, quantity: u32, discount_eligible: bool) -> bool {
        discount_eligible && quantity >= self.threshold
    }

    /// Total for `quantity` units at `unit_price`.
    pub fn quantity_total(
        &self,
        unit_price: Decimal,
        quantity: u32,
        discount_eligible: bool,
    ) -> Decimal {
        let total = unit_price * Decimal::from(quantity);
        if self.discount_applies(quantity, discount_eligible) {
            total * self.multiplier
        } else {
            total
        }
    }

    /// Builds the cart line for a credit purchase, recording how the price
    /// was derived in the item details.
    pub fn credit_line_item(&self, product: &Product, quantity: u32) -> CartLineItem {
        let price = self.quantity_total(product.unit_price, quantity, product.discount_eligible);
        let mut details = BTreeMap::new();
        details.insert("credits".to_string(), quantity.to_string());
        details.insert("unit_price".to_string(), product.unit_price.to_string());
        details.insert(
            "discount_applied".to_string(),
            self.discount_applies(quantity, product.discount_eligible)
                .to_string(),
        );
        CartLineItem::new(product.name.clone(), price).with_details(details)
    }
}
