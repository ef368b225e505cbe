use serde::Deserialize;
use std::env;
use healtour_booking::LifecycleConfig;
use healtour_catalog::query::ListingLimits;
use healtour_catalog::PricingConfig;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub kafka: Option<KafkaConfig>,
    #[serde(default)]
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 { 5 }

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
    /// Prepended to every event topic, e.g. "healtour." gives "healtour.booking.created"
    #[serde(default)]
    pub topic_prefix: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    #[serde(default)]
    pub tax_rate: f64,
    #[serde(default = "default_attempts")]
    pub booking_number_attempts: u32,
    #[serde(default = "default_true")]
    pub gate_capacity_on_create: bool,
    #[serde(default = "default_page_limit")]
    pub default_page_limit: u32,
    #[serde(default = "default_max_page_limit")]
    pub max_page_limit: u32,
    #[serde(default = "default_currency")]
    pub default_currency: String,
}

fn default_attempts() -> u32 { 5 }
fn default_true() -> bool { true }
fn default_page_limit() -> u32 { 12 }
fn default_max_page_limit() -> u32 { 100 }
fn default_currency() -> String { "USD".to_string() }

impl Default for BusinessRules {
    fn default() -> Self {
        Self {
            tax_rate: 0.0,
            booking_number_attempts: default_attempts(),
            gate_capacity_on_create: true,
            default_page_limit: default_page_limit(),
            max_page_limit: default_max_page_limit(),
            default_currency: default_currency(),
        }
    }
}

impl BusinessRules {
    pub fn pricing(&self) -> PricingConfig {
        PricingConfig { tax_rate: self.tax_rate }
    }

    pub fn lifecycle(&self) -> LifecycleConfig {
        LifecycleConfig {
            booking_number_attempts: self.booking_number_attempts,
            gate_capacity_on_create: self.gate_capacity_on_create,
        }
    }

    pub fn listing_limits(&self) -> ListingLimits {
        ListingLimits {
            default_limit: self.default_page_limit,
            max_limit: self.max_page_limit,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // optional per-environment overrides
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. HEALTOUR__DATABASE__URL
            .add_source(config::Environment::with_prefix("HEALTOUR").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
