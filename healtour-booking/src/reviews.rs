use std::sync::Arc;
use uuid::Uuid;
use chrono::Utc;
use tracing::{error, info, warn};
use healtour_catalog::{PackageRepository, RatingAggregator, Review, ReviewDraft, ReviewRepository};
use healtour_core::events::EventPublisher;
use healtour_core::{CoreError, CoreResult};
use healtour_shared::models::events::{DomainEvent, ReviewAction, ReviewChangedEvent};

use crate::models::BookingStatus;
use crate::repository::BookingRepository;

/// Review writes. Each one is followed by a rating recompute for the
/// package; a failed recompute is logged and the write stands.
pub struct ReviewService {
    reviews: Arc<dyn ReviewRepository>,
    packages: Arc<dyn PackageRepository>,
    bookings: Arc<dyn BookingRepository>,
    events: Arc<dyn EventPublisher>,
    ratings: RatingAggregator,
}

impl ReviewService {
    pub fn new(
        reviews: Arc<dyn ReviewRepository>,
        packages: Arc<dyn PackageRepository>,
        bookings: Arc<dyn BookingRepository>,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            ratings: RatingAggregator::new(packages.clone(), reviews.clone()),
            reviews,
            packages,
            bookings,
            events,
        }
    }

    pub async fn create(&self, user_id: Uuid, package_id: Uuid, draft: ReviewDraft) -> CoreResult<Review> {
        draft.validate()?;
        if self.packages.get_package(package_id).await?.is_none() {
            return Err(CoreError::not_found("package", package_id));
        }
        if self.reviews.find_by_author(user_id, package_id).await?.is_some() {
            return Err(CoreError::DuplicateConstraint(
                "you have already reviewed this package".to_string(),
            ));
        }

        let verified_statuses: Vec<BookingStatus> = BookingStatus::ALL
            .into_iter()
            .filter(|s| s.counts_as_confirmed())
            .collect();
        let is_verified = self
            .bookings
            .user_has_booking_in(user_id, package_id, &verified_statuses)
            .await?;

        let review = Review::new(package_id, user_id, draft, is_verified);
        self.reviews.create_review(&review).await?;
        info!(review_id = %review.id, %package_id, verified = is_verified, "Review created");

        self.after_write(&review, ReviewAction::Created).await;
        Ok(review)
    }

    pub async fn update(&self, review_id: Uuid, user_id: Uuid, draft: ReviewDraft) -> CoreResult<Review> {
        draft.validate()?;
        let mut review = self.owned(review_id, user_id).await?;
        review.apply(draft);
        self.reviews.update_review(&review).await?;
        info!(review_id = %review.id, package_id = %review.package_id, "Review updated");

        self.after_write(&review, ReviewAction::Updated).await;
        Ok(review)
    }

    pub async fn delete(&self, review_id: Uuid, user_id: Uuid) -> CoreResult<()> {
        let review = self.owned(review_id, user_id).await?;
        self.reviews.delete_review(review_id).await?;
        info!(%review_id, package_id = %review.package_id, "Review deleted");

        self.after_write(&review, ReviewAction::Deleted).await;
        Ok(())
    }

    /// Counts a helpful vote once per user. Voting twice is a no-op.
    pub async fn mark_helpful(&self, review_id: Uuid, user_id: Uuid) -> CoreResult<Review> {
        let review = self.get(review_id).await?;
        if review.user_id == user_id {
            return Err(CoreError::validation("you cannot vote on your own review"));
        }
        if !self.reviews.add_helpful_vote(review_id, user_id).await? {
            info!(%review_id, "Helpful vote already counted");
        }
        self.get(review_id).await
    }

    pub async fn get(&self, review_id: Uuid) -> CoreResult<Review> {
        self.reviews
            .get_review(review_id)
            .await?
            .ok_or_else(|| CoreError::not_found("review", review_id))
    }

    pub async fn list_for_package(&self, package_id: Uuid) -> CoreResult<Vec<Review>> {
        self.reviews.list_for_package(package_id).await
    }

    async fn owned(&self, review_id: Uuid, user_id: Uuid) -> CoreResult<Review> {
        let review = self.get(review_id).await?;
        if review.user_id != user_id {
            return Err(CoreError::Forbidden("only the author can change a review".to_string()));
        }
        Ok(review)
    }

    async fn after_write(&self, review: &Review, action: ReviewAction) {
        if let Err(e) = self.ratings.recompute(review.package_id).await {
            error!(package_id = %review.package_id, "Rating recompute failed: {}", e);
        }

        let event = DomainEvent::ReviewChanged(ReviewChangedEvent {
            review_id: review.id,
            package_id: review.package_id,
            action,
            timestamp: Utc::now().timestamp_millis(),
        });
        if let Err(e) = self.events.publish(&event).await {
            warn!(topic = event.topic(), "Failed to publish event: {}", e);
        }
    }
}
