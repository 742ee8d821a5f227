//! Pricing policies for metered calls.
//!
//! A [`PricingPolicy`] maps a call's method name and optional invoice to the
//! price the caller must pay for it. Policies are pure so the same call always
//! validates the same way; the variant is chosen once at startup from
//! [`PricingConfig`].

use crate::config::PricingConfig;
use crate::types::{Invoice, ValidationError};
use ethers::types::U256;
use std::{collections::HashMap, sync::Arc};

pub trait PricingPolicy: Send + Sync {
    /// Returns the price required for a call to `method`.
    ///
    /// Fails with [`ValidationError::InvalidArgument`] when the call carries
    /// too little metadata to be priced.
    fn price(&self, method: &str, invoice: Option<&Invoice>) -> Result<U256, ValidationError>;
}

/// Fixed price per method, with an optional fallback for unlisted methods.
#[derive(Clone, Debug, Default)]
pub struct FixedPricing {
    default_price: Option<U256>,
    method_prices: HashMap<String, U256>,
}

impl FixedPricing {
    /// Same price for every method.
    pub fn new(price: U256) -> Self {
        Self {
            default_price: Some(price),
            method_prices: HashMap::new(),
        }
    }

    /// Only the methods added with [`FixedPricing::with_method_price`] are priced.
    pub fn per_method() -> Self {
        Self::default()
    }

    pub fn with_method_price(mut self, method: impl Into<String>, price: U256) -> Self {
        self.method_prices.insert(method.into(), price);
        self
    }
}

impl PricingPolicy for FixedPricing {
    fn price(&self, method: &str, _invoice: Option<&Invoice>) -> Result<U256, ValidationError> {
        self.method_prices
            .get(method)
            .copied()
            .or(self.default_price)
            .ok_or_else(|| ValidationError::InvalidArgument(format!("no price for method {method}")))
    }
}

/// Price is whatever the caller's invoice says.
#[derive(Clone, Copy, Debug, Default)]
pub struct InvoicePricing;

impl PricingPolicy for InvoicePricing {
    fn price(&self, method: &str, invoice: Option<&Invoice>) -> Result<U256, ValidationError> {
        match invoice {
            Some(invoice) if !invoice.id.is_empty() => Ok(invoice.price),
            Some(_) => Err(ValidationError::InvalidArgument(
                "invoice id is empty".to_string(),
            )),
            None => Err(ValidationError::InvalidArgument(format!(
                "call to {method} requires an invoice"
            ))),
        }
    }
}

pub fn from_config(config: &PricingConfig) -> Arc<dyn PricingPolicy> {
    match config {
        PricingConfig::FixedPrice {
            price,
            method_prices,
        } => {
            let pricing = match price {
                Some(price) => FixedPricing::new(U256::from(*price)),
                None => FixedPricing::per_method(),
            };
            let pricing = method_prices
                .iter()
                .fold(pricing, |pricing, (method, price)| {
                    pricing.with_method_price(method.clone(), U256::from(*price))
                });
            Arc::new(pricing)
        }
        PricingConfig::Invoice => Arc::new(InvoicePricing),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoice(id: &str, price: u64) -> Invoice {
        Invoice {
            id: id.to_string(),
            price: U256::from(price),
        }
    }

    #[test]
    fn test_fixed_price_applies_to_every_method() {
        let pricing = FixedPricing::new(U256::from(10));

        assert_eq!(pricing.price("/svc/add", None), Ok(U256::from(10)));
        assert_eq!(pricing.price("/svc/mul", None), Ok(U256::from(10)));
    }

    #[test]
    fn test_method_override_wins_over_default() {
        let pricing =
            FixedPricing::new(U256::from(10)).with_method_price("/svc/train", U256::from(500));

        assert_eq!(pricing.price("/svc/train", None), Ok(U256::from(500)));
        assert_eq!(pricing.price("/svc/add", None), Ok(U256::from(10)));
    }

    #[test]
    fn test_unlisted_method_without_default_is_unresolvable() {
        let pricing = FixedPricing::per_method().with_method_price("/svc/add", U256::from(1));

        assert!(matches!(
            pricing.price("/svc/mul", None),
            Err(ValidationError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_fixed_price_ignores_invoice() {
        let pricing = FixedPricing::new(U256::from(10));

        assert_eq!(
            pricing.price("/svc/add", Some(&invoice("inv-1", 1))),
            Ok(U256::from(10))
        );
    }

    #[test]
    fn test_invoice_price() {
        let pricing = InvoicePricing;

        assert_eq!(
            pricing.price("/svc/add", Some(&invoice("inv-1", 42))),
            Ok(U256::from(42))
        );
        assert!(matches!(
            pricing.price("/svc/add", None),
            Err(ValidationError::InvalidArgument(_))
        ));
        assert!(matches!(
            pricing.price("/svc/add", Some(&invoice("", 42))),
            Err(ValidationError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_from_config() {
        let config = PricingConfig::FixedPrice {
            price: None,
            method_prices: HashMap::from([("/svc/add".to_string(), 7)]),
        };
        let pricing = from_config(&config);
        assert_eq!(pricing.price("/svc/add", None), Ok(U256::from(7)));
        assert!(pricing.price("/svc/mul", None).is_err());

        let pricing = from_config(&PricingConfig::Invoice);
        assert_eq!(
            pricing.price("/svc/add", Some(&invoice("inv-1", 3))),
            Ok(U256::from(3))
        );
    }
}
