pub mod app_config;
pub mod booking_repo;
pub mod context;
pub mod database;
#[cfg(feature = "kafka")]
pub mod events;
pub mod memory;
pub mod package_repo;
pub mod review_repo;
pub mod seed;

pub use context::{AppContext, Repositories};
pub use database::DbClient;
#[cfg(feature = "kafka")]
pub use events::KafkaEventPublisher;
