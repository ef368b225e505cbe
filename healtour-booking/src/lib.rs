pub mod identifier;
pub mod ledger;
pub mod lifecycle;
pub mod models;
pub mod repository;
pub mod reviews;

pub use identifier::IdentifierGenerator;
pub use ledger::PricingLedger;
pub use lifecycle::{BookingLifecycle, InventoryEffect, LifecycleConfig};
pub use models::{Booking, BookingRequest, BookingStatus};
pub use repository::BookingRepository;
pub use reviews::ReviewService;
