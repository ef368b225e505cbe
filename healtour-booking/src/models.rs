use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, NaiveDate, Utc};
use std::fmt;
use std::str::FromStr;
use healtour_core::payment::{PaymentMethod, PaymentStatus, PaymentTransaction};
use healtour_core::{CoreError, CoreResult};
use healtour_shared::Masked;

/// Booking status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum BookingStatus {
    PendingConfirmation,
    Confirmed,
    PaymentPending,
    PaymentCompleted,
    DocumentsRequired,
    DocumentsReceived,
    PreTravelConsultation,
    TravelReady,
    InProgress,
    Completed,
    Cancelled,
    Refunded,
}

use BookingStatus::*;

impl BookingStatus {
    pub const ALL: [BookingStatus; 12] = [
        PendingConfirmation,
        Confirmed,
        PaymentPending,
        PaymentCompleted,
        DocumentsRequired,
        DocumentsReceived,
        PreTravelConsultation,
        TravelReady,
        InProgress,
        Completed,
        Cancelled,
        Refunded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PendingConfirmation => "pending-confirmation",
            Confirmed => "confirmed",
            PaymentPending => "payment-pending",
            PaymentCompleted => "payment-completed",
            DocumentsRequired => "documents-required",
            DocumentsReceived => "documents-received",
            PreTravelConsultation => "pre-travel-consultation",
            TravelReady => "travel-ready",
            InProgress => "in-progress",
            Completed => "completed",
            Cancelled => "cancelled",
            Refunded => "refunded",
        }
    }

    /// States a booking may enter this one from. The initial state has none.
    pub fn allowed_predecessors(&self) -> &'static [BookingStatus] {
        match self {
            PendingConfirmation => &[],
            Confirmed => &[PendingConfirmation],
            PaymentPending => &[Confirmed],
            PaymentCompleted => &[Confirmed, PaymentPending],
            DocumentsRequired => &[PaymentCompleted],
            DocumentsReceived => &[DocumentsRequired],
            PreTravelConsultation => &[PaymentCompleted, DocumentsReceived],
            TravelReady => &[PaymentCompleted, DocumentsReceived, PreTravelConsultation],
            InProgress => &[TravelReady],
            Completed => &[InProgress],
            Cancelled => &[
                PendingConfirmation,
                Confirmed,
                PaymentPending,
                PaymentCompleted,
                DocumentsRequired,
                DocumentsReceived,
                PreTravelConsultation,
                TravelReady,
            ],
            Refunded => &[Cancelled],
        }
    }

    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        next.allowed_predecessors().contains(self)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Completed | Cancelled | Refunded)
    }

    /// Entering this status takes a slot from the package
    pub fn claims_capacity(&self) -> bool {
        matches!(self, Confirmed | PaymentCompleted)
    }

    /// Confirmed or further along, and not called off. Drives review verification.
    pub fn counts_as_confirmed(&self) -> bool {
        !matches!(self, PendingConfirmation | Cancelled | Refunded)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BookingStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s.trim())
            .ok_or_else(|| CoreError::InvalidStatus(s.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmergencyContact {
    pub name: String,
    pub relationship: String,
    pub phone: Masked<String>,
}

/// Traveler details as they were when the booking was made. Later profile
/// edits do not touch it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersonalInfo {
    pub first_name: String,
    pub last_name: String,
    pub email: Masked<String>,
    pub phone: Option<Masked<String>>,
    pub date_of_birth: Option<NaiveDate>,
    pub nationality: Option<String>,
    pub passport_number: Option<Masked<String>>,
    pub emergency_contact: Option<EmergencyContact>,
}

impl PersonalInfo {
    pub fn validate(&self) -> CoreResult<()> {
        if self.first_name.trim().is_empty() || self.last_name.trim().is_empty() {
            return Err(CoreError::validation("traveler first and last name are required"));
        }
        let email = self.email.expose().trim();
        if email.is_empty() || !email.contains('@') {
            return Err(CoreError::validation("a valid contact email is required"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TravelDates {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub flexible: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TravelerCount {
    pub adults: u32,
    #[serde(default)]
    pub children: u32,
    #[serde(default)]
    pub infants: u32,
}

impl TravelerCount {
    /// Infants travel free
    pub fn paying(&self) -> u32 {
        self.adults + self.children
    }
}

/// Price components in minor units. `total_price` is derived and
/// overwritten on every save.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PricingBreakdown {
    pub base_price: i64,
    pub additional_services: i64,
    pub discounts: i64,
    pub taxes: i64,
    pub total_price: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PaymentLedger {
    pub status: PaymentStatus,
    pub method: Option<PaymentMethod>,
    #[serde(default)]
    pub transactions: Vec<PaymentTransaction>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingDocument {
    pub id: Uuid,
    /// e.g. "passport", "medical-report", "visa"
    pub kind: String,
    pub name: String,
    pub url: String,
    pub verified: bool,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum CommunicationChannel {
    Email,
    Phone,
    Whatsapp,
    InternalNote,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommunicationEntry {
    pub id: Uuid,
    pub channel: CommunicationChannel,
    pub author: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MedicalAppointment {
    pub id: Uuid,
    pub provider: String,
    pub specialty: String,
    pub scheduled_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItineraryDay {
    pub day: u32,
    pub date: Option<NaiveDate>,
    pub title: String,
    #[serde(default)]
    pub activities: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TripFeedback {
    pub rating: u8,
    pub comment: String,
    pub would_recommend: bool,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CancellationRecord {
    pub reason: String,
    pub previous_status: BookingStatus,
    pub cancelled_by: Option<Uuid>,
    pub cancelled_at: DateTime<Utc>,
}

/// A customer's reservation against a package
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: Uuid,
    pub booking_number: String,
    pub package_id: Uuid,
    pub user_id: Option<Uuid>,
    pub personal_info: PersonalInfo,
    pub travel_dates: TravelDates,
    pub travelers: TravelerCount,
    #[serde(default)]
    pub selected_services: Vec<String>,
    pub special_requests: Option<String>,
    pub pricing: PricingBreakdown,
    pub payment: PaymentLedger,
    pub status: BookingStatus,
    /// Whether this booking currently occupies one of the package's slots
    #[serde(default)]
    pub inventory_held: bool,
    /// Bumped on every save; updates only land on the version they read
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub documents: Vec<BookingDocument>,
    #[serde(default)]
    pub communications: Vec<CommunicationEntry>,
    #[serde(default)]
    pub medical_appointments: Vec<MedicalAppointment>,
    #[serde(default)]
    pub itinerary: Vec<ItineraryDay>,
    pub feedback: Option<TripFeedback>,
    pub cancellation: Option<CancellationRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input to `BookingLifecycle::create`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRequest {
    pub package_id: Uuid,
    pub user_id: Option<Uuid>,
    /// Pre-assigned number, e.g. when importing. Generated when absent.
    pub booking_number: Option<String>,
    /// Falls back to the user's profile when absent
    pub personal_info: Option<PersonalInfo>,
    pub travel_dates: TravelDates,
    pub travelers: TravelerCount,
    #[serde(default)]
    pub selected_services: Vec<String>,
    pub special_requests: Option<String>,
    pub payment_method: Option<PaymentMethod>,
}

impl BookingRequest {
    pub fn validate(&self) -> CoreResult<()> {
        if self.travelers.adults < 1 {
            return Err(CoreError::validation("at least one adult traveler is required"));
        }
        if self.travel_dates.start_date > self.travel_dates.end_date {
            return Err(CoreError::validation("travel end date must not precede the start date"));
        }
        if let Some(number) = &self.booking_number {
            if number.trim().is_empty() {
                return Err(CoreError::validation("booking number cannot be blank"));
            }
        }
        if let Some(info) = &self.personal_info {
            info.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_path_is_allowed() {
        let path = [
            PendingConfirmation,
            Confirmed,
            PaymentPending,
            PaymentCompleted,
            DocumentsRequired,
            DocumentsReceived,
            PreTravelConsultation,
            TravelReady,
            InProgress,
            Completed,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_illegal_jumps_are_rejected() {
        assert!(!PendingConfirmation.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Confirmed));
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(!Confirmed.can_transition_to(Refunded));
        assert!(Cancelled.can_transition_to(Refunded));
    }

    #[test]
    fn test_terminal_states_have_no_successors() {
        for terminal in BookingStatus::ALL.into_iter().filter(|s| s.is_terminal() && *s != Cancelled) {
            for next in BookingStatus::ALL {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("payment-completed".parse::<BookingStatus>().unwrap(), PaymentCompleted);
        assert!(matches!(
            "shipped".parse::<BookingStatus>(),
            Err(CoreError::InvalidStatus(_))
        ));
        assert_eq!(serde_json::to_string(&PreTravelConsultation).unwrap(), "\"pre-travel-consultation\"");
    }

    #[test]
    fn test_request_validation() {
        let start = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();
        let mut request = BookingRequest {
            package_id: Uuid::new_v4(),
            user_id: None,
            booking_number: None,
            personal_info: None,
            travel_dates: TravelDates { start_date: start, end_date: start, flexible: false },
            travelers: TravelerCount { adults: 1, children: 0, infants: 1 },
            selected_services: vec![],
            special_requests: None,
            payment_method: None,
        };
        assert!(request.validate().is_ok());
        assert_eq!(request.travelers.paying(), 1);

        request.travelers.adults = 0;
        assert!(request.validate().is_err());

        request.travelers.adults = 2;
        request.travel_dates.end_date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        assert!(request.validate().is_err());
    }
}
