#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;
use healtour_booking::models::{PersonalInfo, TravelDates, TravelerCount};
use healtour_booking::{Booking, BookingRepository, BookingRequest, BookingStatus};
use healtour_catalog::package::{
    IncludedServices, Location, PackagePricing, PackageService, StayDuration,
};
use healtour_catalog::query::CatalogQuery;
use healtour_catalog::{Package, PackageCategory, PackageRepository, RatingSummary};
use healtour_core::events::EventPublisher;
use healtour_core::listing::{Page, PageRequest};
use healtour_core::users::UserProfile;
use healtour_core::{CoreError, CoreResult};
use healtour_shared::models::events::DomainEvent;
use healtour_shared::Masked;
use healtour_store::app_config::BusinessRules;
use healtour_store::memory::MemoryUserDirectory;
use healtour_store::{AppContext, Repositories};

pub struct Harness {
    pub ctx: AppContext,
    pub users: Arc<MemoryUserDirectory>,
}

pub fn harness() -> Harness {
    harness_with(BusinessRules::default())
}

pub fn harness_with(rules: BusinessRules) -> Harness {
    let users = Arc::new(MemoryUserDirectory::new());
    let ctx = AppContext::in_memory(&rules, users.clone());
    Harness { ctx, users }
}

/// In-memory harness with some of the ports swapped out
pub fn harness_wrapping<F>(events: Arc<dyn EventPublisher>, wrap: F) -> Harness
where
    F: FnOnce(Repositories) -> Repositories,
{
    let users = Arc::new(MemoryUserDirectory::new());
    let repositories = wrap(Repositories::in_memory(users.clone()));
    let ctx = AppContext::new(repositories, &BusinessRules::default(), events);
    Harness { ctx, users }
}

/// Broker that is always down
pub struct UnreachableBroker;

#[async_trait]
impl EventPublisher for UnreachableBroker {
    async fn publish(&self, _event: &DomainEvent) -> CoreResult<()> {
        Err(CoreError::Storage("broker unreachable".to_string()))
    }
}

/// Keeps the topic of every published event
#[derive(Default)]
pub struct RecordedTopics(pub std::sync::Mutex<Vec<&'static str>>);

impl RecordedTopics {
    pub fn topics(&self) -> Vec<&'static str> {
        self.0.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventPublisher for RecordedTopics {
    async fn publish(&self, event: &DomainEvent) -> CoreResult<()> {
        self.0.lock().unwrap().push(event.topic());
        Ok(())
    }
}

/// Booking store whose reads take a while, so concurrent callers interleave
/// between reading a booking and saving it
pub struct SlowBookingReads(pub Arc<dyn BookingRepository>);

#[async_trait]
impl BookingRepository for SlowBookingReads {
    async fn create_booking(&self, booking: &Booking) -> CoreResult<()> {
        self.0.create_booking(booking).await
    }

    async fn get_booking(&self, id: Uuid) -> CoreResult<Option<Booking>> {
        let booking = self.0.get_booking(id).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        booking
    }

    async fn find_by_number(&self, booking_number: &str) -> CoreResult<Option<Booking>> {
        self.0.find_by_number(booking_number).await
    }

    async fn list_for_user(&self, user_id: Uuid, page: PageRequest) -> CoreResult<Page<Booking>> {
        self.0.list_for_user(user_id, page).await
    }

    async fn update_booking(&self, booking: &Booking, expected_version: u64) -> CoreResult<()> {
        self.0.update_booking(booking, expected_version).await
    }

    async fn delete_booking(&self, id: Uuid) -> CoreResult<()> {
        self.0.delete_booking(id).await
    }

    async fn user_has_booking_in(
        &self,
        user_id: Uuid,
        package_id: Uuid,
        statuses: &[BookingStatus],
    ) -> CoreResult<bool> {
        self.0.user_has_booking_in(user_id, package_id, statuses).await
    }
}

/// Package store that cannot write ratings
pub struct RatingsOffline(pub Arc<dyn PackageRepository>);

#[async_trait]
impl PackageRepository for RatingsOffline {
    async fn create_package(&self, package: &Package) -> CoreResult<Uuid> {
        self.0.create_package(package).await
    }

    async fn get_package(&self, id: Uuid) -> CoreResult<Option<Package>> {
        self.0.get_package(id).await
    }

    async fn find_packages(&self, query: &CatalogQuery) -> CoreResult<Page<Package>> {
        self.0.find_packages(query).await
    }

    async fn update_package(&self, package: &Package) -> CoreResult<()> {
        self.0.update_package(package).await
    }

    async fn delete_package(&self, id: Uuid) -> CoreResult<()> {
        self.0.delete_package(id).await
    }

    async fn increment_bookings_within_capacity(&self, id: Uuid) -> CoreResult<Option<u32>> {
        self.0.increment_bookings_within_capacity(id).await
    }

    async fn decrement_bookings(&self, id: Uuid) -> CoreResult<u32> {
        self.0.decrement_bookings(id).await
    }

    async fn set_rating(&self, _id: Uuid, _rating: RatingSummary) -> CoreResult<()> {
        Err(CoreError::Storage("ratings table locked".to_string()))
    }
}

pub fn package(city: &str, country: &str, base_price: i64, max_capacity: u32) -> Package {
    let mut package = Package::new(
        format!("Dental Implants in {}", city),
        "Full-mouth implants with a recovery stay",
        Location {
            city: city.to_string(),
            country: country.to_string(),
            coordinates: None,
        },
        StayDuration { days: 7, nights: 6 },
        PackagePricing {
            base_price,
            currency: "USD".to_string(),
            includes: IncludedServices::default(),
            discounts: Vec::new(),
        },
        PackageCategory::Dental,
        max_capacity,
    );
    package.services = vec![PackageService {
        name: "Teeth Whitening".to_string(),
        description: None,
        included: false,
        additional_cost: 10_000,
    }];
    package
}

pub async fn add_package(h: &Harness, package: Package) -> Uuid {
    h.ctx.repositories.packages.create_package(&package).await.unwrap()
}

pub async fn add_user(h: &Harness) -> Uuid {
    let id = Uuid::new_v4();
    h.users
        .insert(UserProfile {
            id,
            first_name: "Zeynep".to_string(),
            last_name: "Aydin".to_string(),
            email: format!("{}@example.com", id.simple()),
            phone: None,
            date_of_birth: None,
            nationality: Some("TR".to_string()),
        })
        .await;
    id
}

pub fn guest_info() -> PersonalInfo {
    PersonalInfo {
        first_name: "Anna".to_string(),
        last_name: "Schmidt".to_string(),
        email: Masked::new("anna@example.com".to_string()),
        phone: Some(Masked::new("+491701234567".to_string())),
        date_of_birth: None,
        nationality: Some("DE".to_string()),
        passport_number: None,
        emergency_contact: None,
    }
}

pub fn request(package_id: Uuid, user_id: Option<Uuid>) -> BookingRequest {
    let start = NaiveDate::from_ymd_opt(2025, 10, 6).unwrap();
    BookingRequest {
        package_id,
        user_id,
        booking_number: None,
        personal_info: if user_id.is_some() { None } else { Some(guest_info()) },
        travel_dates: TravelDates {
            start_date: start,
            end_date: start + chrono::Duration::days(6),
            flexible: false,
        },
        travelers: TravelerCount { adults: 1, children: 0, infants: 0 },
        selected_services: Vec::new(),
        special_requests: None,
        payment_method: None,
    }
}

pub async fn current_bookings(h: &Harness, package_id: Uuid) -> u32 {
    h.ctx
        .repositories
        .packages
        .get_package(package_id)
        .await
        .unwrap()
        .unwrap()
        .capacity
        .current_bookings
}
