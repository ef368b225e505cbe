use serde::Deserialize;
use std::path::Path;
use uuid::Uuid;
use tracing::info;
use healtour_catalog::package::{
    AvailabilityWindow, Discount, Facility, IncludedServices, Location, PackagePricing, PackageService, StayDuration,
};
use healtour_catalog::{Package, PackageCategory, PackageRepository};
use healtour_core::{CoreError, CoreResult};

/// One catalog entry in a seed file. Counters and ratings always start at zero.
#[derive(Debug, Clone, Deserialize)]
pub struct PackageSeed {
    /// Fixed id makes re-running the seed a no-op for this entry
    pub id: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub location: Location,
    pub duration: StayDuration,
    pub base_price: i64,
    pub currency: Option<String>,
    #[serde(default)]
    pub includes: IncludedServices,
    #[serde(default)]
    pub discounts: Vec<Discount>,
    pub category: PackageCategory,
    #[serde(default)]
    pub services: Vec<PackageService>,
    #[serde(default)]
    pub experience_types: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub facility: Option<Facility>,
    pub max_capacity: u32,
    #[serde(default)]
    pub availability: AvailabilityWindow,
    #[serde(default)]
    pub is_featured: bool,
}

impl PackageSeed {
    pub fn into_package(self, default_currency: &str) -> Package {
        let mut package = Package::new(
            self.title,
            self.description,
            self.location,
            self.duration,
            PackagePricing {
                base_price: self.base_price,
                currency: self.currency.unwrap_or_else(|| default_currency.to_string()),
                includes: self.includes,
                discounts: self.discounts,
            },
            self.category,
            self.max_capacity,
        );
        if let Some(id) = self.id {
            package.id = id;
        }
        package.services = self.services;
        package.experience_types = self.experience_types;
        package.tags = self.tags;
        package.facility = self.facility;
        package.availability = self.availability;
        package.is_featured = self.is_featured;
        package
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub inserted: usize,
    pub skipped: usize,
}

pub fn parse_seed(json: &str) -> CoreResult<Vec<PackageSeed>> {
    serde_json::from_str(json).map_err(|e| CoreError::validation(format!("invalid seed file: {}", e)))
}

pub async fn load_seed_file(path: &Path) -> CoreResult<Vec<PackageSeed>> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| CoreError::Storage(format!("cannot read {}: {}", path.display(), e)))?;
    parse_seed(&contents)
}

/// Inserts the catalog entries. Explicit administrative step; nothing calls
/// this at startup. Entries whose id already exists are skipped.
pub async fn seed_catalog(
    packages: &dyn PackageRepository,
    seeds: Vec<PackageSeed>,
    default_currency: &str,
) -> CoreResult<SeedReport> {
    let mut report = SeedReport::default();
    for seed in seeds {
        let package = seed.into_package(default_currency);
        package.validate()?;

        if packages.get_package(package.id).await?.is_some() {
            report.skipped += 1;
            continue;
        }
        packages.create_package(&package).await?;
        info!(package_id = %package.id, title = %package.title, "Seeded package");
        report.inserted += 1;
    }
    info!(inserted = report.inserted, skipped = report.skipped, "Catalog seeding finished");
    Ok(report)
}
