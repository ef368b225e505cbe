use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use tracing::{info, warn};
use serde_json::Value;
use healtour_core::CoreError;

use crate::app_config::{BusinessRules, DatabaseConfig};

const UNIQUE_VIOLATION: &str = "23505";

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

impl DbClient {
    pub async fn new(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.url)
            .await?;

        Ok(Self { pool })
    }

    /// Only called from the admin tool, never at service start.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&self.pool)
            .await?;
        info!("Migrations completed successfully.");
        Ok(())
    }

    /// Rules stored in the `business_rules` table override the file config.
    /// Rows look like `("tax_rate", {"value": 0.18})`.
    pub async fn fetch_business_rules(&self, defaults: BusinessRules) -> Result<BusinessRules, sqlx::Error> {
        let rows: Vec<(String, Value)> = sqlx::query_as("SELECT rule_key, rule_value FROM business_rules")
            .fetch_all(&self.pool)
            .await?;

        let mut rules = defaults;
        for (key, value) in rows {
            if !apply_rule(&mut rules, &key, &value) {
                warn!("Ignoring unrecognized business rule {}: {}", key, value);
            }
        }
        Ok(rules)
    }
}

fn apply_rule(rules: &mut BusinessRules, key: &str, row: &Value) -> bool {
    let Some(v) = row.get("value") else {
        return false;
    };
    match key {
        "tax_rate" => v.as_f64().map(|f| rules.tax_rate = f).is_some(),
        "booking_number_attempts" => v
            .as_u64()
            .and_then(|u| u32::try_from(u).ok())
            .map(|u| rules.booking_number_attempts = u)
            .is_some(),
        "gate_capacity_on_create" => v.as_bool().map(|b| rules.gate_capacity_on_create = b).is_some(),
        "default_page_limit" => v
            .as_u64()
            .and_then(|u| u32::try_from(u).ok())
            .map(|u| rules.default_page_limit = u)
            .is_some(),
        "max_page_limit" => v
            .as_u64()
            .and_then(|u| u32::try_from(u).ok())
            .map(|u| rules.max_page_limit = u)
            .is_some(),
        "default_currency" => v.as_str().map(|s| rules.default_currency = s.to_string()).is_some(),
        _ => false,
    }
}

/// Unique violations become `DuplicateConstraint`; everything else is a
/// storage failure.
pub(crate) fn map_sqlx(err: sqlx::Error) -> CoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
            return CoreError::DuplicateConstraint(
                db.constraint().unwrap_or("unique constraint").to_string(),
            );
        }
    }
    CoreError::Storage(err.to_string())
}
