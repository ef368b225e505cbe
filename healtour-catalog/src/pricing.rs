use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use healtour_core::{CoreError, CoreResult};

use crate::package::Package;

/// Price components for a prospective booking, in minor units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub base_price: i64,
    pub additional_services: i64,
    pub discounts: i64,
    pub taxes: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Applied to the discounted subtotal, e.g. 0.18 for 18% VAT
    pub tax_rate: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self { tax_rate: 0.0 }
    }
}

/// Turns a package's list price into a quote for a party of travelers
pub struct PricingEngine {
    config: PricingConfig,
}

impl PricingEngine {
    pub fn new(config: PricingConfig) -> Self {
        Self { config }
    }

    /// Best percentage among the discounts live at `now`. Discounts do not stack.
    pub fn active_discount_percentage(&self, package: &Package, now: DateTime<Utc>) -> u8 {
        package
            .pricing
            .discounts
            .iter()
            .filter(|d| d.is_active_at(now))
            .map(|d| d.percentage.min(100))
            .max()
            .unwrap_or(0)
    }

    /// Quote for `paying_travelers` (adults and children; infants travel free).
    ///
    /// Selected services must exist on the package. Services already included
    /// cost nothing extra.
    pub fn quote(
        &self,
        package: &Package,
        paying_travelers: u32,
        selected_services: &[String],
        now: DateTime<Utc>,
    ) -> CoreResult<PriceQuote> {
        if paying_travelers == 0 {
            return Err(CoreError::validation("at least one paying traveler is required"));
        }
        let travelers = paying_travelers as i64;

        let base_price = package
            .pricing
            .base_price
            .checked_mul(travelers)
            .ok_or_else(overflow)?;

        let mut per_traveler_extras: i64 = 0;
        for name in selected_services {
            let service = package.service(name).ok_or_else(|| {
                CoreError::validation(format!("service '{}' is not offered by this package", name))
            })?;
            if !service.included {
                per_traveler_extras = per_traveler_extras
                    .checked_add(service.additional_cost)
                    .ok_or_else(overflow)?;
            }
        }
        let additional_services = per_traveler_extras.checked_mul(travelers).ok_or_else(overflow)?;

        let percentage = self.active_discount_percentage(package, now) as i64;
        let discounts = base_price
            .checked_mul(percentage)
            .and_then(|v| v.checked_add(50))
            .ok_or_else(overflow)?
            / 100;

        let taxable = base_price
            .checked_add(additional_services)
            .ok_or_else(overflow)?
            .saturating_sub(discounts)
            .max(0);
        let taxes = (taxable as f64 * self.config.tax_rate).round() as i64;

        Ok(PriceQuote {
            base_price,
            additional_services,
            discounts,
            taxes,
            currency: package.pricing.currency.clone(),
        })
    }
}

fn overflow() -> CoreError {
    CoreError::validation("price is too large")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::{fixtures, Discount, PackageService};
    use chrono::Duration;

    fn package_with_services() -> Package {
        let mut package = fixtures::package("Antalya", "Turkey", 100_000, 5);
        package.services = vec![
            PackageService {
                name: "Airport Transfer".to_string(),
                description: None,
                included: true,
                additional_cost: 0,
            },
            PackageService {
                name: "Teeth Whitening".to_string(),
                description: None,
                included: false,
                additional_cost: 15_000,
            },
        ];
        package
    }

    #[test]
    fn test_quote_without_discount() {
        let engine = PricingEngine::new(PricingConfig { tax_rate: 0.1 });
        let package = package_with_services();

        let quote = engine
            .quote(&package, 2, &["teeth whitening".to_string(), "Airport Transfer".to_string()], Utc::now())
            .unwrap();

        assert_eq!(quote.base_price, 200_000);
        assert_eq!(quote.additional_services, 30_000);
        assert_eq!(quote.discounts, 0);
        assert_eq!(quote.taxes, 23_000);
        assert_eq!(quote.currency, "USD");
    }

    #[test]
    fn test_best_active_discount_wins() {
        let engine = PricingEngine::new(PricingConfig::default());
        let mut package = package_with_services();
        let now = Utc::now();
        package.pricing.discounts = vec![
            Discount { label: None, percentage: 10, valid_from: None, valid_until: None },
            Discount {
                label: Some("Spring".to_string()),
                percentage: 25,
                valid_from: Some(now - Duration::days(1)),
                valid_until: Some(now + Duration::days(1)),
            },
            Discount {
                label: Some("Expired".to_string()),
                percentage: 50,
                valid_from: None,
                valid_until: Some(now - Duration::days(1)),
            },
        ];

        assert_eq!(engine.active_discount_percentage(&package, now), 25);
        let quote = engine.quote(&package, 1, &[], now).unwrap();
        assert_eq!(quote.discounts, 25_000);
    }

    #[test]
    fn test_unknown_service_is_rejected() {
        let engine = PricingEngine::new(PricingConfig::default());
        let package = package_with_services();
        let result = engine.quote(&package, 1, &["Hot Air Balloon".to_string()], Utc::now());
        assert!(matches!(result, Err(CoreError::ValidationFailed(_))));
    }

    #[test]
    fn test_oversized_prices_are_rejected() {
        let engine = PricingEngine::new(PricingConfig::default());
        let now = Utc::now();

        let mut package = package_with_services();
        package.services[1].additional_cost = i64::MAX / 2;
        let whitening = ["Teeth Whitening".to_string()];
        assert!(engine.quote(&package, 1, &whitening, now).is_ok());
        assert!(matches!(
            engine.quote(&package, 3, &whitening, now),
            Err(CoreError::ValidationFailed(_))
        ));

        let mut package = package_with_services();
        package.pricing.base_price = i64::MAX / 10;
        package.pricing.discounts = vec![Discount { label: None, percentage: 20, valid_from: None, valid_until: None }];
        assert!(matches!(engine.quote(&package, 1, &[], now), Err(CoreError::ValidationFailed(_))));
    }
}
