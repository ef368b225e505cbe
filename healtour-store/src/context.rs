use std::sync::Arc;
use tracing::info;
use healtour_booking::{BookingLifecycle, BookingRepository, ReviewService};
use healtour_catalog::{CatalogListing, PackageRepository, PricingEngine, ReviewRepository};
use healtour_core::events::{EventPublisher, TracingEventPublisher};
use healtour_core::users::UserDirectory;
use healtour_core::CoreResult;

use crate::app_config::{BusinessRules, Config, KafkaConfig};
use crate::booking_repo::StoreBookingRepository;
use crate::database::{map_sqlx, DbClient};
use crate::memory::{MemoryBookingRepository, MemoryPackageRepository, MemoryReviewRepository, MemoryUserDirectory};
use crate::package_repo::StorePackageRepository;
use crate::review_repo::StoreReviewRepository;

/// The storage ports, wired once and shared by every service
#[derive(Clone)]
pub struct Repositories {
    pub packages: Arc<dyn PackageRepository>,
    pub bookings: Arc<dyn BookingRepository>,
    pub reviews: Arc<dyn ReviewRepository>,
    pub users: Arc<dyn UserDirectory>,
}

impl Repositories {
    pub fn postgres(db: &DbClient, users: Arc<dyn UserDirectory>) -> Self {
        Self {
            packages: Arc::new(StorePackageRepository::new(db.pool.clone())),
            bookings: Arc::new(StoreBookingRepository::new(db.pool.clone())),
            reviews: Arc::new(StoreReviewRepository::new(db.pool.clone())),
            users,
        }
    }

    pub fn in_memory(users: Arc<MemoryUserDirectory>) -> Self {
        Self {
            packages: Arc::new(MemoryPackageRepository::new()),
            bookings: Arc::new(MemoryBookingRepository::new()),
            reviews: Arc::new(MemoryReviewRepository::new()),
            users,
        }
    }
}

/// Kafka when a broker is configured and the `kafka` feature is built in,
/// the log otherwise.
pub fn event_publisher(kafka: Option<&KafkaConfig>) -> CoreResult<Arc<dyn EventPublisher>> {
    match kafka {
        #[cfg(feature = "kafka")]
        Some(kafka) => {
            let publisher = crate::events::KafkaEventPublisher::new(kafka)
                .map_err(|e| healtour_core::CoreError::Storage(format!("kafka producer: {}", e)))?;
            info!(brokers = %kafka.brokers, "Publishing domain events to Kafka");
            Ok(Arc::new(publisher))
        }
        #[cfg(not(feature = "kafka"))]
        Some(kafka) => {
            tracing::warn!(brokers = %kafka.brokers, "Kafka is configured but not built in; events go to the log");
            Ok(Arc::new(TracingEventPublisher))
        }
        None => {
            info!("No broker configured; events go to the log");
            Ok(Arc::new(TracingEventPublisher))
        }
    }
}

/// Reservation core entry points
pub struct AppContext {
    pub repositories: Repositories,
    pub rules: BusinessRules,
    pub lifecycle: BookingLifecycle,
    pub reviews: ReviewService,
    pub listing: CatalogListing,
}

impl AppContext {
    pub fn new(repositories: Repositories, rules: &BusinessRules, events: Arc<dyn EventPublisher>) -> Self {
        let lifecycle = BookingLifecycle::new(
            repositories.bookings.clone(),
            repositories.packages.clone(),
            repositories.users.clone(),
            events.clone(),
            PricingEngine::new(rules.pricing()),
            rules.lifecycle(),
        );
        let reviews = ReviewService::new(
            repositories.reviews.clone(),
            repositories.packages.clone(),
            repositories.bookings.clone(),
            events,
        );
        let listing = CatalogListing::new(repositories.packages.clone(), rules.listing_limits());

        Self { repositories, rules: rules.clone(), lifecycle, reviews, listing }
    }

    /// Everything in process memory, events to the log
    pub fn in_memory(rules: &BusinessRules, users: Arc<MemoryUserDirectory>) -> Self {
        Self::new(Repositories::in_memory(users), rules, Arc::new(TracingEventPublisher))
    }

    /// Postgres-backed context. Rules stored in the database override the
    /// file config; the event channel follows `config.kafka`.
    pub async fn from_db(db: &DbClient, config: &Config, users: Arc<dyn UserDirectory>) -> CoreResult<Self> {
        let rules = db
            .fetch_business_rules(config.business_rules.clone())
            .await
            .map_err(map_sqlx)?;
        let events = event_publisher(config.kafka.as_ref())?;
        Ok(Self::new(Repositories::postgres(db, users), &rules, events))
    }

    /// Connects with `config.database`, then as [`AppContext::from_db`]
    pub async fn from_config(config: &Config, users: Arc<dyn UserDirectory>) -> CoreResult<Self> {
        let db = DbClient::new(&config.database).await.map_err(map_sqlx)?;
        Self::from_db(&db, config, users).await
    }
}
