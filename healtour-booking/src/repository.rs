use async_trait::async_trait;
use uuid::Uuid;
use healtour_core::listing::{Page, PageRequest};
use healtour_core::CoreResult;

use crate::models::{Booking, BookingStatus};

/// Storage port for bookings. `booking_number` must be unique; a clash on
/// insert is reported as `DuplicateConstraint`.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn create_booking(&self, booking: &Booking) -> CoreResult<()>;

    async fn get_booking(&self, id: Uuid) -> CoreResult<Option<Booking>>;

    async fn find_by_number(&self, booking_number: &str) -> CoreResult<Option<Booking>>;

    async fn list_for_user(&self, user_id: Uuid, page: PageRequest) -> CoreResult<Page<Booking>>;

    /// Stores `booking` only if the stored copy is still at
    /// `expected_version`; otherwise `Conflict`.
    async fn update_booking(&self, booking: &Booking, expected_version: u64) -> CoreResult<()>;

    /// Administrative hard delete
    async fn delete_booking(&self, id: Uuid) -> CoreResult<()>;

    /// Whether `user_id` has a booking for `package_id` in any of `statuses`
    async fn user_has_booking_in(
        &self,
        user_id: Uuid,
        package_id: Uuid,
        statuses: &[BookingStatus],
    ) -> CoreResult<bool>;
}
