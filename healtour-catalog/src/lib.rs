pub mod inventory;
pub mod listing;
pub mod package;
pub mod pricing;
pub mod query;
pub mod rating;
pub mod repository;
pub mod review;

pub use inventory::InventoryTracker;
pub use listing::CatalogListing;
pub use package::{Package, PackageCategory, RatingSummary};
pub use pricing::{PriceQuote, PricingConfig, PricingEngine};
pub use query::{CatalogFilters, CatalogQuery, CatalogQueryBuilder, Predicate};
pub use rating::RatingAggregator;
pub use repository::{PackageRepository, ReviewRepository};
pub use review::{Review, ReviewDraft};
