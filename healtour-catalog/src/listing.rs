use std::sync::Arc;
use uuid::Uuid;
use healtour_core::listing::Page;
use healtour_core::{CoreError, CoreResult};

use crate::package::Package;
use crate::query::{CatalogFilters, CatalogQueryBuilder, ListingLimits};
use crate::repository::PackageRepository;

/// Read side of the catalog: storefront and back-office listings
#[derive(Clone)]
pub struct CatalogListing {
    packages: Arc<dyn PackageRepository>,
    limits: ListingLimits,
}

impl CatalogListing {
    pub fn new(packages: Arc<dyn PackageRepository>, limits: ListingLimits) -> Self {
        Self { packages, limits }
    }

    pub async fn list_public(&self, filters: &CatalogFilters) -> CoreResult<Page<Package>> {
        let query = CatalogQueryBuilder::from_filters(filters, self.limits)?.build_public();
        self.packages.find_packages(&query).await
    }

    pub async fn list_admin(&self, filters: &CatalogFilters) -> CoreResult<Page<Package>> {
        let query = CatalogQueryBuilder::from_filters(filters, self.limits)?.build_admin();
        self.packages.find_packages(&query).await
    }

    /// Storefront detail view. Retired packages are hidden.
    pub async fn get_public(&self, id: Uuid) -> CoreResult<Package> {
        self.packages
            .get_package(id)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| CoreError::not_found("package", id))
    }
}
