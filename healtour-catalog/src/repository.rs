use async_trait::async_trait;
use uuid::Uuid;
use healtour_core::listing::Page;
use healtour_core::CoreResult;

use crate::package::{Package, RatingSummary};
use crate::query::CatalogQuery;
use crate::review::Review;

/// Storage port for packages
#[async_trait]
pub trait PackageRepository: Send + Sync {
    async fn create_package(&self, package: &Package) -> CoreResult<Uuid>;

    async fn get_package(&self, id: Uuid) -> CoreResult<Option<Package>>;

    async fn find_packages(&self, query: &CatalogQuery) -> CoreResult<Page<Package>>;

    async fn update_package(&self, package: &Package) -> CoreResult<()>;

    async fn delete_package(&self, id: Uuid) -> CoreResult<()>;

    /// Adds one booking only while `current_bookings < max_capacity`, as a
    /// single atomic step. `Ok(None)` means the package is full.
    async fn increment_bookings_within_capacity(&self, id: Uuid) -> CoreResult<Option<u32>>;

    /// Removes one booking, never going below zero. Returns the new count.
    async fn decrement_bookings(&self, id: Uuid) -> CoreResult<u32>;

    async fn set_rating(&self, id: Uuid, rating: RatingSummary) -> CoreResult<()>;
}

/// Storage port for reviews. One review per (user, package) is enforced here.
#[async_trait]
pub trait ReviewRepository: Send + Sync {
    /// `DuplicateConstraint` if the author already reviewed the package
    async fn create_review(&self, review: &Review) -> CoreResult<()>;

    async fn get_review(&self, id: Uuid) -> CoreResult<Option<Review>>;

    async fn find_by_author(&self, user_id: Uuid, package_id: Uuid) -> CoreResult<Option<Review>>;

    async fn list_for_package(&self, package_id: Uuid) -> CoreResult<Vec<Review>>;

    async fn update_review(&self, review: &Review) -> CoreResult<()>;

    async fn delete_review(&self, id: Uuid) -> CoreResult<()>;

    /// Atomic and idempotent per voter. `Ok(false)` if the vote was already counted.
    async fn add_helpful_vote(&self, review_id: Uuid, user_id: Uuid) -> CoreResult<bool>;
}
