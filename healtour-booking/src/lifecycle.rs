use std::sync::Arc;
use uuid::Uuid;
use chrono::Utc;
use tracing::{error, info, warn};
use healtour_catalog::{InventoryTracker, PackageRepository, PricingEngine};
use healtour_core::events::EventPublisher;
use healtour_core::listing::{Page, PageRequest};
use healtour_core::payment::PaymentTransaction;
use healtour_core::users::{UserDirectory, UserProfile};
use healtour_core::{CoreError, CoreResult};
use healtour_shared::models::events::{
    BookingCancelledEvent, BookingCreatedEvent, BookingStatusChangedEvent, DomainEvent,
};
use healtour_shared::Masked;

use crate::identifier::IdentifierGenerator;
use crate::ledger::PricingLedger;
use crate::models::*;
use crate::repository::BookingRepository;

#[derive(Debug, Clone, Copy)]
pub struct LifecycleConfig {
    /// Tries at a fresh booking number before giving up on a collision
    pub booking_number_attempts: u32,
    /// Refuse new bookings for packages that are inactive, full or outside
    /// their sale window
    pub gate_capacity_on_create: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self { booking_number_attempts: 5, gate_capacity_on_create: true }
    }
}

/// Re-reads of a booking after losing a concurrent update
const CONFLICT_ATTEMPTS: u32 = 3;

/// What a status change does to the package counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InventoryEffect {
    Reserve,
    Release,
    Unchanged,
}

impl InventoryEffect {
    /// `held` is whether the booking already occupies a slot, so
    /// confirmed followed by payment-completed takes only one.
    pub fn for_status(status: BookingStatus, held: bool) -> Self {
        match status {
            s if s.claims_capacity() && !held => InventoryEffect::Reserve,
            BookingStatus::Cancelled | BookingStatus::Refunded if held => InventoryEffect::Release,
            _ => InventoryEffect::Unchanged,
        }
    }
}

/// Owns the booking state machine and keeps pricing, inventory and the
/// event stream in step with it.
pub struct BookingLifecycle {
    bookings: Arc<dyn BookingRepository>,
    packages: Arc<dyn PackageRepository>,
    users: Arc<dyn UserDirectory>,
    events: Arc<dyn EventPublisher>,
    inventory: InventoryTracker,
    pricing: PricingEngine,
    identifiers: IdentifierGenerator,
    config: LifecycleConfig,
}

impl BookingLifecycle {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        packages: Arc<dyn PackageRepository>,
        users: Arc<dyn UserDirectory>,
        events: Arc<dyn EventPublisher>,
        pricing: PricingEngine,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            bookings,
            inventory: InventoryTracker::new(packages.clone()),
            packages,
            users,
            events,
            pricing,
            identifiers: IdentifierGenerator::new(),
            config,
        }
    }

    pub fn with_identifiers(mut self, identifiers: IdentifierGenerator) -> Self {
        self.identifiers = identifiers;
        self
    }

    /// New booking in `pending-confirmation`. Inventory is untouched until
    /// the booking is confirmed.
    pub async fn create(&self, request: BookingRequest) -> CoreResult<Booking> {
        request.validate()?;

        let package = self
            .packages
            .get_package(request.package_id)
            .await?
            .ok_or_else(|| CoreError::not_found("package", request.package_id))?;

        let now = Utc::now();
        if self.config.gate_capacity_on_create && !InventoryTracker::is_available(&package, now) {
            return Err(CoreError::validation(format!(
                "package '{}' is not available for booking",
                package.title
            )));
        }

        let personal_info = match request.personal_info.clone() {
            Some(info) => info,
            None => self.snapshot_from_profile(request.user_id).await?,
        };

        let quote = self.pricing.quote(
            &package,
            request.travelers.paying(),
            &request.selected_services,
            now,
        )?;

        let mut booking = Booking {
            id: Uuid::new_v4(),
            booking_number: String::new(),
            package_id: package.id,
            user_id: request.user_id,
            personal_info,
            travel_dates: request.travel_dates,
            travelers: request.travelers,
            selected_services: request.selected_services,
            special_requests: request.special_requests,
            pricing: PricingLedger::breakdown(quote),
            payment: PaymentLedger {
                method: request.payment_method,
                ..PaymentLedger::default()
            },
            status: BookingStatus::PendingConfirmation,
            inventory_held: false,
            version: 0,
            documents: Vec::new(),
            communications: Vec::new(),
            medical_appointments: Vec::new(),
            itinerary: Vec::new(),
            feedback: None,
            cancellation: None,
            created_at: now,
            updated_at: now,
        };
        PricingLedger::normalize(&mut booking.pricing);

        match request.booking_number {
            Some(number) => {
                booking.booking_number = number.trim().to_string();
                self.bookings.create_booking(&booking).await?;
            }
            None => self.insert_with_fresh_number(&mut booking).await?,
        }

        info!(
            booking_number = %booking.booking_number,
            package_id = %booking.package_id,
            total_price = booking.pricing.total_price,
            currency = %booking.pricing.currency,
            contact = %booking.personal_info.email.hint(),
            "Booking created"
        );

        self.publish(DomainEvent::BookingCreated(BookingCreatedEvent {
            booking_id: booking.id,
            booking_number: booking.booking_number.clone(),
            package_id: booking.package_id,
            user_id: booking.user_id,
            total_price: booking.pricing.total_price,
            currency: booking.pricing.currency.clone(),
            timestamp: now.timestamp_millis(),
        }))
        .await;

        Ok(booking)
    }

    pub async fn get(&self, id: Uuid) -> CoreResult<Booking> {
        self.bookings
            .get_booking(id)
            .await?
            .ok_or_else(|| CoreError::not_found("booking", id))
    }

    pub async fn get_by_number(&self, booking_number: &str) -> CoreResult<Booking> {
        self.bookings
            .find_by_number(booking_number.trim())
            .await?
            .ok_or_else(|| CoreError::not_found("booking", booking_number))
    }

    pub async fn list_for_user(&self, user_id: Uuid, page: PageRequest) -> CoreResult<Page<Booking>> {
        self.bookings.list_for_user(user_id, page).await
    }

    /// Moves the booking along the transition table. Asking for the status
    /// it already has changes nothing.
    pub async fn transition(&self, id: Uuid, next: BookingStatus) -> CoreResult<Booking> {
        let mut attempt = 1;
        loop {
            let booking = self.get(id).await?;
            if booking.status == next {
                return Ok(booking);
            }
            if !booking.status.can_transition_to(next) {
                warn!(
                    booking_number = %booking.booking_number,
                    from = %booking.status,
                    to = %next,
                    "Rejected status transition"
                );
                return Err(CoreError::InvalidTransition {
                    from: booking.status.to_string(),
                    to: next.to_string(),
                });
            }
            let result = if next == BookingStatus::Cancelled {
                self.cancel_loaded(booking, "status changed to cancelled".to_string(), None).await
            } else {
                self.apply_status(booking, next).await
            };
            if !retry_after_conflict(&result, attempt) {
                return result;
            }
            attempt += 1;
        }
    }

    /// Parses a wire status name before transitioning
    pub async fn transition_named(&self, id: Uuid, next: &str) -> CoreResult<Booking> {
        let next: BookingStatus = next.parse()?;
        self.transition(id, next).await
    }

    pub async fn cancel(&self, id: Uuid, reason: &str, cancelled_by: Option<Uuid>) -> CoreResult<Booking> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(CoreError::validation("a cancellation reason is required"));
        }
        let mut attempt = 1;
        loop {
            let booking = self.get(id).await?;
            if booking.status == BookingStatus::Cancelled {
                return Ok(booking);
            }
            if !booking.status.can_transition_to(BookingStatus::Cancelled) {
                return Err(CoreError::InvalidTransition {
                    from: booking.status.to_string(),
                    to: BookingStatus::Cancelled.to_string(),
                });
            }
            let result = self.cancel_loaded(booking, reason.to_string(), cancelled_by).await;
            if !retry_after_conflict(&result, attempt) {
                return result;
            }
            attempt += 1;
        }
    }

    /// Administrative override. Skips the transition table, still keeps the
    /// package counter consistent.
    pub async fn force_status(&self, id: Uuid, next: BookingStatus) -> CoreResult<Booking> {
        let mut attempt = 1;
        loop {
            let booking = self.get(id).await?;
            if booking.status == next {
                return Ok(booking);
            }
            warn!(
                booking_number = %booking.booking_number,
                from = %booking.status,
                to = %next,
                "Forcing booking status"
            );
            let result = if next == BookingStatus::Cancelled {
                self.cancel_loaded(booking, "status forced to cancelled".to_string(), None).await
            } else {
                self.apply_status(booking, next).await
            };
            if !retry_after_conflict(&result, attempt) {
                return result;
            }
            attempt += 1;
        }
    }

    /// Appends a payment record. Booking status is never changed here.
    pub async fn record_transaction(&self, id: Uuid, transaction: PaymentTransaction) -> CoreResult<Booking> {
        if transaction.amount < 0 {
            return Err(CoreError::validation("transaction amount cannot be negative"));
        }
        let booking = self
            .modify(id, |booking| {
                PricingLedger::record(booking, transaction.clone());
                Ok(())
            })
            .await?;

        info!(
            booking_number = %booking.booking_number,
            payment_status = ?booking.payment.status,
            progress = PricingLedger::payment_progress(&booking),
            "Payment transaction recorded"
        );
        Ok(booking)
    }

    pub async fn payment_progress(&self, id: Uuid) -> CoreResult<u8> {
        let booking = self.get(id).await?;
        Ok(PricingLedger::payment_progress(&booking))
    }

    pub async fn add_communication(
        &self,
        id: Uuid,
        channel: CommunicationChannel,
        author: &str,
        message: &str,
    ) -> CoreResult<Booking> {
        if message.trim().is_empty() {
            return Err(CoreError::validation("message cannot be empty"));
        }
        self.modify(id, |booking| {
            booking.communications.push(CommunicationEntry {
                id: Uuid::new_v4(),
                channel,
                author: author.trim().to_string(),
                message: message.trim().to_string(),
                created_at: Utc::now(),
            });
            Ok(())
        })
        .await
    }

    pub async fn add_document(&self, id: Uuid, kind: &str, name: &str, url: &str) -> CoreResult<Booking> {
        if kind.trim().is_empty() || url.trim().is_empty() {
            return Err(CoreError::validation("document kind and url are required"));
        }
        self.modify(id, |booking| {
            booking.documents.push(BookingDocument {
                id: Uuid::new_v4(),
                kind: kind.trim().to_string(),
                name: name.trim().to_string(),
                url: url.trim().to_string(),
                verified: false,
                uploaded_at: Utc::now(),
            });
            Ok(())
        })
        .await
    }

    pub async fn verify_document(&self, id: Uuid, document_id: Uuid) -> CoreResult<Booking> {
        self.modify(id, |booking| {
            let document = booking
                .documents
                .iter_mut()
                .find(|d| d.id == document_id)
                .ok_or_else(|| CoreError::not_found("document", document_id))?;
            document.verified = true;
            Ok(())
        })
        .await
    }

    pub async fn add_medical_appointment(&self, id: Uuid, appointment: MedicalAppointment) -> CoreResult<Booking> {
        if appointment.provider.trim().is_empty() {
            return Err(CoreError::validation("appointment provider is required"));
        }
        self.modify(id, |booking| {
            booking.medical_appointments.push(appointment.clone());
            booking.medical_appointments.sort_by_key(|a| a.scheduled_at);
            Ok(())
        })
        .await
    }

    pub async fn set_itinerary(&self, id: Uuid, mut days: Vec<ItineraryDay>) -> CoreResult<Booking> {
        days.sort_by_key(|d| d.day);
        if days.windows(2).any(|w| w[0].day == w[1].day) {
            return Err(CoreError::validation("itinerary has duplicate days"));
        }
        self.modify(id, |booking| {
            booking.itinerary = days.clone();
            Ok(())
        })
        .await
    }

    /// Post-trip feedback, accepted once the trip is completed
    pub async fn submit_feedback(
        &self,
        id: Uuid,
        rating: u8,
        comment: &str,
        would_recommend: bool,
    ) -> CoreResult<Booking> {
        if !(1..=5).contains(&rating) {
            return Err(CoreError::validation("rating must be between 1 and 5"));
        }
        self.modify(id, |booking| {
            if booking.status != BookingStatus::Completed {
                return Err(CoreError::validation("feedback can only be left for completed trips"));
            }
            booking.feedback = Some(TripFeedback {
                rating,
                comment: comment.trim().to_string(),
                would_recommend,
                submitted_at: Utc::now(),
            });
            Ok(())
        })
        .await
    }

    /// Administrative hard delete. Gives back any slot the booking held.
    pub async fn purge(&self, id: Uuid) -> CoreResult<()> {
        let booking = self.get(id).await?;
        self.bookings.delete_booking(id).await?;
        if booking.inventory_held {
            self.inventory.release(booking.package_id).await?;
        }
        warn!(booking_number = %booking.booking_number, "Booking purged");
        Ok(())
    }

    async fn cancel_loaded(
        &self,
        mut booking: Booking,
        reason: String,
        cancelled_by: Option<Uuid>,
    ) -> CoreResult<Booking> {
        booking.cancellation = Some(CancellationRecord {
            reason: reason.clone(),
            previous_status: booking.status,
            cancelled_by,
            cancelled_at: Utc::now(),
        });
        let booking = self.apply_status(booking, BookingStatus::Cancelled).await?;

        self.publish(DomainEvent::BookingCancelled(BookingCancelledEvent {
            booking_id: booking.id,
            booking_number: booking.booking_number.clone(),
            package_id: booking.package_id,
            reason,
            timestamp: Utc::now().timestamp_millis(),
        }))
        .await;
        Ok(booking)
    }

    /// Sets the status and runs the inventory hook. A slot is reserved
    /// before the save and handed back if the save fails or loses a race;
    /// a slot is released only once the save has landed.
    async fn apply_status(&self, mut booking: Booking, next: BookingStatus) -> CoreResult<Booking> {
        let previous = booking.status;
        let effect = InventoryEffect::for_status(next, booking.inventory_held);

        match effect {
            InventoryEffect::Reserve => {
                self.inventory.reserve(booking.package_id).await?;
                booking.inventory_held = true;
            }
            InventoryEffect::Release => booking.inventory_held = false,
            InventoryEffect::Unchanged => {}
        }

        booking.status = next;
        if let Err(e) = self.save(&mut booking).await {
            if effect == InventoryEffect::Reserve {
                if let Err(release_err) = self.inventory.release(booking.package_id).await {
                    error!(
                        booking_number = %booking.booking_number,
                        "Failed to hand back reservation after save error: {}", release_err
                    );
                }
            }
            return Err(e);
        }

        if effect == InventoryEffect::Release {
            if let Err(e) = self.inventory.release(booking.package_id).await {
                error!(
                    booking_number = %booking.booking_number,
                    package_id = %booking.package_id,
                    "Booking saved as {} but its slot was not released: {}", next, e
                );
            }
        }

        info!(
            booking_number = %booking.booking_number,
            from = %previous,
            to = %next,
            inventory = ?effect,
            "Booking status changed"
        );

        self.publish(DomainEvent::BookingStatusChanged(BookingStatusChangedEvent {
            booking_id: booking.id,
            booking_number: booking.booking_number.clone(),
            package_id: booking.package_id,
            from: previous.to_string(),
            to: next.to_string(),
            timestamp: Utc::now().timestamp_millis(),
        }))
        .await;

        Ok(booking)
    }

    /// Read-change-save, re-applying `change` to a fresh copy when another
    /// writer got there first.
    async fn modify<F>(&self, id: Uuid, mut change: F) -> CoreResult<Booking>
    where
        F: FnMut(&mut Booking) -> CoreResult<()> + Send,
    {
        let mut attempt = 1;
        loop {
            let mut booking = self.get(id).await?;
            change(&mut booking)?;
            let result = self.save(&mut booking).await.map(|_| booking);
            if !retry_after_conflict(&result, attempt) {
                return result;
            }
            attempt += 1;
        }
    }

    async fn save(&self, booking: &mut Booking) -> CoreResult<()> {
        PricingLedger::normalize(&mut booking.pricing);
        booking.updated_at = Utc::now();
        let expected = booking.version;
        booking.version = expected + 1;
        let result = self.bookings.update_booking(booking, expected).await;
        if result.is_err() {
            booking.version = expected;
        }
        result
    }

    async fn insert_with_fresh_number(&self, booking: &mut Booking) -> CoreResult<()> {
        let attempts = self.config.booking_number_attempts.max(1);
        for attempt in 1..=attempts {
            booking.booking_number = self.identifiers.next();
            match self.bookings.create_booking(booking).await {
                Ok(()) => return Ok(()),
                Err(CoreError::DuplicateConstraint(detail)) => {
                    warn!(
                        attempt,
                        booking_number = %booking.booking_number,
                        "Booking number collision ({}), retrying", detail
                    );
                }
                Err(e) => return Err(e),
            }
        }
        error!(attempts, "Could not allocate a unique booking number");
        Err(CoreError::DuplicateConstraint(format!(
            "no unique booking number after {} attempts",
            attempts
        )))
    }

    async fn snapshot_from_profile(&self, user_id: Option<Uuid>) -> CoreResult<PersonalInfo> {
        let user_id = user_id
            .ok_or_else(|| CoreError::validation("personal information is required for guest bookings"))?;
        let profile = self
            .users
            .find_user(user_id)
            .await?
            .ok_or_else(|| CoreError::not_found("user", user_id))?;
        let info = personal_info_from(profile);
        info.validate()?;
        Ok(info)
    }

    async fn publish(&self, event: DomainEvent) {
        if let Err(e) = self.events.publish(&event).await {
            warn!(topic = event.topic(), "Failed to publish event: {}", e);
        }
    }
}

fn retry_after_conflict(result: &CoreResult<Booking>, attempt: u32) -> bool {
    match result {
        Err(CoreError::Conflict(detail)) if attempt < CONFLICT_ATTEMPTS => {
            warn!(attempt, "Booking changed underneath us ({}), re-reading", detail);
            true
        }
        _ => false,
    }
}

fn personal_info_from(profile: UserProfile) -> PersonalInfo {
    PersonalInfo {
        first_name: profile.first_name,
        last_name: profile.last_name,
        email: Masked::new(profile.email),
        phone: profile.phone.map(Masked::new),
        date_of_birth: profile.date_of_birth,
        nationality: profile.nationality,
        passport_number: None,
        emergency_contact: None,
    }
}
