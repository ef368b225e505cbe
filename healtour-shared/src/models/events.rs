use uuid::Uuid;

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct BookingCreatedEvent {
    pub booking_id: Uuid,
    pub booking_number: String,
    pub package_id: Uuid,
    pub user_id: Option<Uuid>,
    pub total_price: i64,
    pub currency: String,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct BookingStatusChangedEvent {
    pub booking_id: Uuid,
    pub booking_number: String,
    pub package_id: Uuid,
    pub from: String,
    pub to: String,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct BookingCancelledEvent {
    pub booking_id: Uuid,
    pub booking_number: String,
    pub package_id: Uuid,
    pub reason: String,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReviewAction {
    Created,
    Updated,
    Deleted,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct ReviewChangedEvent {
    pub review_id: Uuid,
    pub package_id: Uuid,
    pub action: ReviewAction,
    pub timestamp: i64,
}

/// Everything the reservation core announces to the outside world
/// (notification senders, reporting consumers).
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum DomainEvent {
    BookingCreated(BookingCreatedEvent),
    BookingStatusChanged(BookingStatusChangedEvent),
    BookingCancelled(BookingCancelledEvent),
    ReviewChanged(ReviewChangedEvent),
}

impl DomainEvent {
    pub fn topic(&self) -> &'static str {
        match self {
            DomainEvent::BookingCreated(_) => "booking.created",
            DomainEvent::BookingStatusChanged(_) => "booking.status_changed",
            DomainEvent::BookingCancelled(_) => "booking.cancelled",
            DomainEvent::ReviewChanged(_) => "review.changed",
        }
    }

    /// Partition key. Events about one package stay ordered.
    pub fn key(&self) -> String {
        match self {
            DomainEvent::BookingCreated(e) => e.package_id.to_string(),
            DomainEvent::BookingStatusChanged(e) => e.package_id.to_string(),
            DomainEvent::BookingCancelled(e) => e.package_id.to_string(),
            DomainEvent::ReviewChanged(e) => e.package_id.to_string(),
        }
    }
}
