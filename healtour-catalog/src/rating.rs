use std::sync::Arc;
use uuid::Uuid;
use healtour_core::{CoreError, CoreResult};
use tracing::info;

use crate::package::RatingSummary;
use crate::repository::{PackageRepository, ReviewRepository};
use crate::review::Review;

/// Recomputes a package's rating from its reviews. Runs after every
/// review create, update and delete.
#[derive(Clone)]
pub struct RatingAggregator {
    packages: Arc<dyn PackageRepository>,
    reviews: Arc<dyn ReviewRepository>,
}

impl RatingAggregator {
    pub fn new(packages: Arc<dyn PackageRepository>, reviews: Arc<dyn ReviewRepository>) -> Self {
        Self { packages, reviews }
    }

    pub async fn recompute(&self, package_id: Uuid) -> CoreResult<RatingSummary> {
        if self.packages.get_package(package_id).await?.is_none() {
            return Err(CoreError::not_found("package", package_id));
        }

        let reviews = self.reviews.list_for_package(package_id).await?;
        let summary = summarize(&reviews);
        self.packages.set_rating(package_id, summary).await?;

        info!(%package_id, average = summary.average, count = summary.count, "Rating recomputed");
        Ok(summary)
    }
}

/// Mean rounded to one decimal place. No reviews gives 0.0 / 0.
pub fn summarize(reviews: &[Review]) -> RatingSummary {
    if reviews.is_empty() {
        return RatingSummary::default();
    }
    let total: u32 = reviews.iter().map(|r| r.rating as u32).sum();
    let mean = total as f64 / reviews.len() as f64;
    RatingSummary {
        average: (mean * 10.0).round() / 10.0,
        count: reviews.len() as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review::ReviewDraft;

    fn review(rating: u8) -> Review {
        Review::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            ReviewDraft {
                rating,
                title: "Stay".to_string(),
                comment: "Fine".to_string(),
            },
            false,
        )
    }

    #[test]
    fn test_summarize_mean_and_count() {
        let summary = summarize(&[review(5), review(3)]);
        assert_eq!(summary.count, 2);
        assert_eq!(summary.average, 4.0);
    }

    #[test]
    fn test_summarize_rounds_to_one_decimal() {
        let summary = summarize(&[review(5), review(4), review(4)]);
        assert_eq!(summary.average, 4.3);

        let summary = summarize(&[review(5), review(5), review(4)]);
        assert_eq!(summary.average, 4.7);
    }

    #[test]
    fn test_summarize_empty() {
        assert_eq!(summarize(&[]), RatingSummary { average: 0.0, count: 0 });
    }
}
