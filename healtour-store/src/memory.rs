use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;
use healtour_booking::{Booking, BookingRepository, BookingStatus};
use healtour_catalog::{Package, PackageRepository, RatingSummary, Review, ReviewRepository};
use healtour_catalog::query::CatalogQuery;
use healtour_core::listing::{Page, PageRequest};
use healtour_core::users::{UserDirectory, UserProfile};
use healtour_core::{CoreError, CoreResult};

/// Process-local package store. Every mutation runs under one write lock,
/// so the capacity check-and-increment is atomic.
#[derive(Default)]
pub struct MemoryPackageRepository {
    packages: RwLock<HashMap<Uuid, Package>>,
}

impl MemoryPackageRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PackageRepository for MemoryPackageRepository {
    async fn create_package(&self, package: &Package) -> CoreResult<Uuid> {
        package.validate()?;
        let mut packages = self.packages.write().await;
        if packages.contains_key(&package.id) {
            return Err(CoreError::DuplicateConstraint(format!("package {}", package.id)));
        }
        packages.insert(package.id, package.clone());
        Ok(package.id)
    }

    async fn get_package(&self, id: Uuid) -> CoreResult<Option<Package>> {
        Ok(self.packages.read().await.get(&id).cloned())
    }

    async fn find_packages(&self, query: &CatalogQuery) -> CoreResult<Page<Package>> {
        let packages = self.packages.read().await;
        let mut hits: Vec<&Package> = packages.values().filter(|p| query.predicate.matches(p)).collect();
        hits.sort_by(|a, b| query.sort.compare(a, b).then(a.id.cmp(&b.id)));

        let total = hits.len() as u64;
        let items = hits
            .into_iter()
            .skip(query.page.offset() as usize)
            .take(query.page.limit as usize)
            .cloned()
            .collect();
        Ok(Page::new(items, total, query.page))
    }

    async fn update_package(&self, package: &Package) -> CoreResult<()> {
        package.validate()?;
        let mut packages = self.packages.write().await;
        let existing = packages
            .get_mut(&package.id)
            .ok_or_else(|| CoreError::not_found("package", package.id))?;
        // counter and rating belong to their own writers
        let capacity_bookings = existing.capacity.current_bookings;
        let rating = existing.rating;
        *existing = package.clone();
        existing.capacity.current_bookings = capacity_bookings;
        existing.rating = rating;
        Ok(())
    }

    async fn delete_package(&self, id: Uuid) -> CoreResult<()> {
        self.packages
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| CoreError::not_found("package", id))
    }

    async fn increment_bookings_within_capacity(&self, id: Uuid) -> CoreResult<Option<u32>> {
        let mut packages = self.packages.write().await;
        let package = packages.get_mut(&id).ok_or_else(|| CoreError::not_found("package", id))?;
        if package.capacity.current_bookings >= package.capacity.max_capacity {
            return Ok(None);
        }
        package.capacity.current_bookings += 1;
        Ok(Some(package.capacity.current_bookings))
    }

    async fn decrement_bookings(&self, id: Uuid) -> CoreResult<u32> {
        let mut packages = self.packages.write().await;
        let package = packages.get_mut(&id).ok_or_else(|| CoreError::not_found("package", id))?;
        package.capacity.current_bookings = package.capacity.current_bookings.saturating_sub(1);
        Ok(package.capacity.current_bookings)
    }

    async fn set_rating(&self, id: Uuid, rating: RatingSummary) -> CoreResult<()> {
        let mut packages = self.packages.write().await;
        let package = packages.get_mut(&id).ok_or_else(|| CoreError::not_found("package", id))?;
        package.rating = rating;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryBookingRepository {
    bookings: RwLock<HashMap<Uuid, Booking>>,
}

impl MemoryBookingRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BookingRepository for MemoryBookingRepository {
    async fn create_booking(&self, booking: &Booking) -> CoreResult<()> {
        let mut bookings = self.bookings.write().await;
        if bookings.values().any(|b| b.booking_number == booking.booking_number) {
            return Err(CoreError::DuplicateConstraint(format!(
                "booking number {}",
                booking.booking_number
            )));
        }
        bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn get_booking(&self, id: Uuid) -> CoreResult<Option<Booking>> {
        Ok(self.bookings.read().await.get(&id).cloned())
    }

    async fn find_by_number(&self, booking_number: &str) -> CoreResult<Option<Booking>> {
        Ok(self
            .bookings
            .read()
            .await
            .values()
            .find(|b| b.booking_number == booking_number)
            .cloned())
    }

    async fn list_for_user(&self, user_id: Uuid, page: PageRequest) -> CoreResult<Page<Booking>> {
        let bookings = self.bookings.read().await;
        let mut mine: Vec<&Booking> = bookings.values().filter(|b| b.user_id == Some(user_id)).collect();
        mine.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = mine.len() as u64;
        let items = mine
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit as usize)
            .cloned()
            .collect();
        Ok(Page::new(items, total, page))
    }

    async fn update_booking(&self, booking: &Booking, expected_version: u64) -> CoreResult<()> {
        let mut bookings = self.bookings.write().await;
        let existing = bookings
            .get_mut(&booking.id)
            .ok_or_else(|| CoreError::not_found("booking", booking.id))?;
        if existing.booking_number != booking.booking_number {
            return Err(CoreError::validation("booking number cannot be changed"));
        }
        if existing.version != expected_version {
            return Err(CoreError::Conflict(format!("booking {}", booking.booking_number)));
        }
        *existing = booking.clone();
        Ok(())
    }

    async fn delete_booking(&self, id: Uuid) -> CoreResult<()> {
        self.bookings
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| CoreError::not_found("booking", id))
    }

    async fn user_has_booking_in(
        &self,
        user_id: Uuid,
        package_id: Uuid,
        statuses: &[BookingStatus],
    ) -> CoreResult<bool> {
        Ok(self.bookings.read().await.values().any(|b| {
            b.user_id == Some(user_id) && b.package_id == package_id && statuses.contains(&b.status)
        }))
    }
}

#[derive(Default)]
pub struct MemoryReviewRepository {
    reviews: RwLock<HashMap<Uuid, Review>>,
}

impl MemoryReviewRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReviewRepository for MemoryReviewRepository {
    async fn create_review(&self, review: &Review) -> CoreResult<()> {
        let mut reviews = self.reviews.write().await;
        if reviews
            .values()
            .any(|r| r.user_id == review.user_id && r.package_id == review.package_id)
        {
            return Err(CoreError::DuplicateConstraint(
                "you have already reviewed this package".to_string(),
            ));
        }
        reviews.insert(review.id, review.clone());
        Ok(())
    }

    async fn get_review(&self, id: Uuid) -> CoreResult<Option<Review>> {
        Ok(self.reviews.read().await.get(&id).cloned())
    }

    async fn find_by_author(&self, user_id: Uuid, package_id: Uuid) -> CoreResult<Option<Review>> {
        Ok(self
            .reviews
            .read()
            .await
            .values()
            .find(|r| r.user_id == user_id && r.package_id == package_id)
            .cloned())
    }

    async fn list_for_package(&self, package_id: Uuid) -> CoreResult<Vec<Review>> {
        let reviews = self.reviews.read().await;
        let mut list: Vec<Review> = reviews.values().filter(|r| r.package_id == package_id).cloned().collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(list)
    }

    async fn update_review(&self, review: &Review) -> CoreResult<()> {
        let mut reviews = self.reviews.write().await;
        let existing = reviews
            .get_mut(&review.id)
            .ok_or_else(|| CoreError::not_found("review", review.id))?;
        // votes are only changed through add_helpful_vote
        let voters = std::mem::take(&mut existing.helpful_voters);
        *existing = review.clone();
        existing.helpful_votes = voters.len() as u32;
        existing.helpful_voters = voters;
        Ok(())
    }

    async fn delete_review(&self, id: Uuid) -> CoreResult<()> {
        self.reviews
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| CoreError::not_found("review", id))
    }

    async fn add_helpful_vote(&self, review_id: Uuid, user_id: Uuid) -> CoreResult<bool> {
        let mut reviews = self.reviews.write().await;
        let review = reviews
            .get_mut(&review_id)
            .ok_or_else(|| CoreError::not_found("review", review_id))?;
        Ok(review.vote_helpful(user_id))
    }
}

/// Fixed set of accounts standing in for the identity service
#[derive(Default)]
pub struct MemoryUserDirectory {
    users: RwLock<HashMap<Uuid, UserProfile>>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, profile: UserProfile) {
        self.users.write().await.insert(profile.id, profile);
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn find_user(&self, id: Uuid) -> CoreResult<Option<UserProfile>> {
        Ok(self.users.read().await.get(&id).cloned())
    }
}
