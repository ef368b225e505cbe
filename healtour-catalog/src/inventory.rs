use uuid::Uuid;
use std::sync::Arc;
use chrono::{DateTime, Utc};
use healtour_core::{CoreError, CoreResult};
use tracing::{info, warn};

use crate::package::Package;
use crate::repository::PackageRepository;

/// Keeps each package's booking counter in step with booking status.
///
/// The ceiling check happens inside the repository's atomic increment, so
/// two confirmations racing for the last slot cannot both succeed.
#[derive(Clone)]
pub struct InventoryTracker {
    packages: Arc<dyn PackageRepository>,
}

impl InventoryTracker {
    pub fn new(packages: Arc<dyn PackageRepository>) -> Self {
        Self { packages }
    }

    /// Take one slot. Fails with `CapacityExhausted` when the package is full.
    pub async fn reserve(&self, package_id: Uuid) -> CoreResult<u32> {
        match self.packages.increment_bookings_within_capacity(package_id).await? {
            Some(current) => {
                info!(%package_id, current_bookings = current, "Inventory reserved");
                Ok(current)
            }
            None => {
                warn!(%package_id, "Reservation rejected: package is fully booked");
                Err(CoreError::CapacityExhausted(package_id))
            }
        }
    }

    /// Give one slot back. Releasing an empty counter is clamped, not an error.
    pub async fn release(&self, package_id: Uuid) -> CoreResult<u32> {
        let current = self.packages.decrement_bookings(package_id).await?;
        info!(%package_id, current_bookings = current, "Inventory released");
        Ok(current)
    }

    /// Advisory check for display. Not a guarantee that `reserve` will succeed.
    pub fn is_available(package: &Package, now: DateTime<Utc>) -> bool {
        if !package.is_active || package.capacity.is_full() {
            return false;
        }

        let today = now.date_naive();
        let window = &package.availability;
        if window.start_date.is_some_and(|start| today < start) {
            return false;
        }
        if window.end_date.is_some_and(|end| today > end) {
            return false;
        }
        !window.blackout_dates.contains(&today)
    }

    /// Share of capacity taken, 0.0 to 1.0
    pub fn utilization(package: &Package) -> f64 {
        let capacity = package.capacity;
        if capacity.max_capacity == 0 {
            1.0
        } else {
            (capacity.current_bookings as f64 / capacity.max_capacity as f64).min(1.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::fixtures;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_availability_requires_active_and_free_capacity() {
        let now = Utc::now();
        let mut package = fixtures::package("Istanbul", "Turkey", 1000, 5);
        package.capacity.max_capacity = 1;
        assert!(InventoryTracker::is_available(&package, now));

        package.capacity.current_bookings = 1;
        assert!(!InventoryTracker::is_available(&package, now));

        package.capacity.current_bookings = 0;
        package.is_active = false;
        assert!(!InventoryTracker::is_available(&package, now));
    }

    #[test]
    fn test_availability_window_and_blackouts() {
        let now = Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap();
        let today = now.date_naive();
        let mut package = fixtures::package("Istanbul", "Turkey", 1000, 5);

        package.availability.start_date = Some(today - Duration::days(10));
        package.availability.end_date = Some(today + Duration::days(10));
        assert!(InventoryTracker::is_available(&package, now));

        package.availability.blackout_dates = vec![today];
        assert!(!InventoryTracker::is_available(&package, now));

        package.availability.blackout_dates.clear();
        package.availability.start_date = Some(today + Duration::days(1));
        assert!(!InventoryTracker::is_available(&package, now));

        package.availability.start_date = None;
        package.availability.end_date = Some(today - Duration::days(1));
        assert!(!InventoryTracker::is_available(&package, now));
    }

    #[test]
    fn test_utilization() {
        let mut package = fixtures::package("Istanbul", "Turkey", 1000, 5);
        package.capacity.max_capacity = 4;
        package.capacity.current_bookings = 1;
        assert!((InventoryTracker::utilization(&package) - 0.25).abs() < f64::EPSILON);
    }
}
