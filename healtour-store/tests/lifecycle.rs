mod common;

use std::sync::Arc;
use common::*;
use healtour_booking::models::{CommunicationChannel, ItineraryDay};
use healtour_booking::{BookingStatus, IdentifierGenerator, PricingLedger};
use healtour_catalog::InventoryTracker;
use healtour_core::payment::{PaymentMethod, PaymentStatus, PaymentTransaction, TransactionStatus};
use healtour_core::CoreError;
use healtour_core::events::TracingEventPublisher;
use healtour_store::app_config::BusinessRules;
use healtour_store::Repositories;
use uuid::Uuid;

#[tokio::test]
async fn test_create_prices_and_numbers_booking() {
    let h = harness_with(BusinessRules { tax_rate: 0.1, ..BusinessRules::default() });
    let package_id = add_package(&h, package("Izmir", "Turkey", 100_000, 5)).await;

    let mut req = request(package_id, None);
    req.travelers.adults = 2;
    req.travelers.infants = 1;
    req.selected_services = vec!["Teeth Whitening".to_string()];

    let booking = h.ctx.lifecycle.create(req).await.unwrap();

    assert_eq!(booking.status, BookingStatus::PendingConfirmation);
    assert!(IdentifierGenerator::is_well_formed(&booking.booking_number));
    assert_eq!(booking.pricing.base_price, 200_000);
    assert_eq!(booking.pricing.additional_services, 20_000);
    assert_eq!(booking.pricing.taxes, 22_000);
    assert_eq!(booking.pricing.total_price, 242_000);
    assert!(!booking.inventory_held);

    // creation leaves inventory alone
    assert_eq!(current_bookings(&h, package_id).await, 0);
}

#[tokio::test]
async fn test_create_unknown_package() {
    let h = harness();
    let result = h.ctx.lifecycle.create(request(Uuid::new_v4(), None)).await;
    assert!(matches!(result, Err(CoreError::NotFound { entity: "package", .. })));
}

#[tokio::test]
async fn test_create_fills_traveler_from_profile() {
    let h = harness();
    let package_id = add_package(&h, package("Izmir", "Turkey", 100_000, 5)).await;
    let user_id = add_user(&h).await;

    let booking = h.ctx.lifecycle.create(request(package_id, Some(user_id))).await.unwrap();
    assert_eq!(booking.personal_info.first_name, "Zeynep");
    assert_eq!(booking.user_id, Some(user_id));

    // a guest must supply traveler details
    let mut guest = request(package_id, None);
    guest.personal_info = None;
    assert!(matches!(
        h.ctx.lifecycle.create(guest).await,
        Err(CoreError::ValidationFailed(_))
    ));
}

#[tokio::test]
async fn test_supplied_booking_number_is_kept_and_unique() {
    let h = harness();
    let package_id = add_package(&h, package("Izmir", "Turkey", 100_000, 5)).await;

    let mut req = request(package_id, None);
    req.booking_number = Some("HT2025010042".to_string());
    let booking = h.ctx.lifecycle.create(req.clone()).await.unwrap();
    assert_eq!(booking.booking_number, "HT2025010042");

    let found = h.ctx.lifecycle.get_by_number("HT2025010042").await.unwrap();
    assert_eq!(found.id, booking.id);

    assert!(matches!(
        h.ctx.lifecycle.create(req).await,
        Err(CoreError::DuplicateConstraint(_))
    ));
}

#[tokio::test]
async fn test_generated_number_collision_is_retried() {
    let h = harness();
    let package_id = add_package(&h, package("Izmir", "Turkey", 100_000, 5)).await;

    // two generators with the same seed produce the same sequence
    let rules = BusinessRules::default();
    let first = healtour_booking::BookingLifecycle::new(
        h.ctx.repositories.bookings.clone(),
        h.ctx.repositories.packages.clone(),
        h.ctx.repositories.users.clone(),
        Arc::new(healtour_core::events::TracingEventPublisher),
        healtour_catalog::PricingEngine::new(rules.pricing()),
        rules.lifecycle(),
    )
    .with_identifiers(IdentifierGenerator::seeded(9));
    let second = healtour_booking::BookingLifecycle::new(
        h.ctx.repositories.bookings.clone(),
        h.ctx.repositories.packages.clone(),
        h.ctx.repositories.users.clone(),
        Arc::new(healtour_core::events::TracingEventPublisher),
        healtour_catalog::PricingEngine::new(rules.pricing()),
        rules.lifecycle(),
    )
    .with_identifiers(IdentifierGenerator::seeded(9));

    let a = first.create(request(package_id, None)).await.unwrap();
    let b = second.create(request(package_id, None)).await.unwrap();
    assert_ne!(a.booking_number, b.booking_number);
}

#[tokio::test]
async fn test_confirm_and_cancel_move_inventory_by_one() {
    let h = harness();
    let package_id = add_package(&h, package("Istanbul", "Turkey", 100_000, 1)).await;
    let booking = h.ctx.lifecycle.create(request(package_id, None)).await.unwrap();

    let confirmed = h.ctx.lifecycle.transition(booking.id, BookingStatus::Confirmed).await.unwrap();
    assert!(confirmed.inventory_held);
    assert_eq!(current_bookings(&h, package_id).await, 1);

    let package = h.ctx.repositories.packages.get_package(package_id).await.unwrap().unwrap();
    assert!(!InventoryTracker::is_available(&package, chrono::Utc::now()));

    // same transition again is a no-op
    h.ctx.lifecycle.transition(booking.id, BookingStatus::Confirmed).await.unwrap();
    assert_eq!(current_bookings(&h, package_id).await, 1);

    let cancelled = h.ctx.lifecycle.cancel(booking.id, "changed plans", None).await.unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    assert_eq!(cancelled.cancellation.as_ref().unwrap().previous_status, BookingStatus::Confirmed);
    assert_eq!(current_bookings(&h, package_id).await, 0);

    let package = h.ctx.repositories.packages.get_package(package_id).await.unwrap().unwrap();
    assert!(InventoryTracker::is_available(&package, chrono::Utc::now()));
}

#[tokio::test]
async fn test_payment_completed_after_confirmation_counts_once() {
    let h = harness();
    let package_id = add_package(&h, package("Istanbul", "Turkey", 100_000, 3)).await;
    let booking = h.ctx.lifecycle.create(request(package_id, None)).await.unwrap();

    h.ctx.lifecycle.transition(booking.id, BookingStatus::Confirmed).await.unwrap();
    h.ctx.lifecycle.transition(booking.id, BookingStatus::PaymentPending).await.unwrap();
    h.ctx.lifecycle.transition(booking.id, BookingStatus::PaymentCompleted).await.unwrap();
    assert_eq!(current_bookings(&h, package_id).await, 1);

    h.ctx.lifecycle.cancel(booking.id, "medical advice", None).await.unwrap();
    assert_eq!(current_bookings(&h, package_id).await, 0);
}

#[tokio::test]
async fn test_cancelling_unconfirmed_booking_keeps_counter() {
    let h = harness();
    let package_id = add_package(&h, package("Istanbul", "Turkey", 100_000, 3)).await;
    let held = h.ctx.lifecycle.create(request(package_id, None)).await.unwrap();
    h.ctx.lifecycle.transition(held.id, BookingStatus::Confirmed).await.unwrap();

    let pending = h.ctx.lifecycle.create(request(package_id, None)).await.unwrap();
    h.ctx.lifecycle.cancel(pending.id, "duplicate request", None).await.unwrap();

    assert_eq!(current_bookings(&h, package_id).await, 1);
}

#[tokio::test]
async fn test_full_package_rejects_confirmation() {
    let h = harness_with(BusinessRules { gate_capacity_on_create: false, ..BusinessRules::default() });
    let package_id = add_package(&h, package("Seoul", "South Korea", 100_000, 1)).await;

    let a = h.ctx.lifecycle.create(request(package_id, None)).await.unwrap();
    let b = h.ctx.lifecycle.create(request(package_id, None)).await.unwrap();

    h.ctx.lifecycle.transition(a.id, BookingStatus::Confirmed).await.unwrap();
    let result = h.ctx.lifecycle.transition(b.id, BookingStatus::Confirmed).await;
    assert!(matches!(result, Err(CoreError::CapacityExhausted(id)) if id == package_id));

    let b = h.ctx.lifecycle.get(b.id).await.unwrap();
    assert_eq!(b.status, BookingStatus::PendingConfirmation);
    assert_eq!(current_bookings(&h, package_id).await, 1);
}

#[tokio::test]
async fn test_create_is_gated_on_availability() {
    let h = harness();
    let mut full = package("Seoul", "South Korea", 100_000, 1);
    full.capacity.current_bookings = 1;
    let full_id = add_package(&h, full).await;

    let result = h.ctx.lifecycle.create(request(full_id, None)).await;
    assert!(matches!(result, Err(CoreError::ValidationFailed(_))));
}

#[tokio::test]
async fn test_concurrent_confirmations_never_oversell() {
    let h = Arc::new(harness_with(BusinessRules {
        gate_capacity_on_create: false,
        ..BusinessRules::default()
    }));
    let package_id = add_package(&h, package("Bangkok", "Thailand", 100_000, 3)).await;

    let mut ids = Vec::new();
    for _ in 0..10 {
        ids.push(h.ctx.lifecycle.create(request(package_id, None)).await.unwrap().id);
    }

    let mut handles = Vec::new();
    for id in ids {
        let h = h.clone();
        handles.push(tokio::spawn(async move {
            h.ctx.lifecycle.transition(id, BookingStatus::Confirmed).await.is_ok()
        }));
    }
    let mut confirmed = 0;
    for handle in handles {
        if handle.await.unwrap() {
            confirmed += 1;
        }
    }

    assert_eq!(confirmed, 3);
    assert_eq!(current_bookings(&h, package_id).await, 3);
}

#[tokio::test]
async fn test_racing_confirmations_of_one_booking_hold_one_slot() {
    let h = harness_wrapping(Arc::new(TracingEventPublisher), |repos| Repositories {
        bookings: Arc::new(SlowBookingReads(repos.bookings.clone())),
        ..repos
    });
    let package_id = add_package(&h, package("Bangkok", "Thailand", 100_000, 3)).await;
    let booking = h.ctx.lifecycle.create(request(package_id, None)).await.unwrap();

    let (a, b) = tokio::join!(
        h.ctx.lifecycle.transition(booking.id, BookingStatus::Confirmed),
        h.ctx.lifecycle.transition(booking.id, BookingStatus::Confirmed),
    );
    assert_eq!(a.unwrap().status, BookingStatus::Confirmed);
    assert_eq!(b.unwrap().status, BookingStatus::Confirmed);
    assert_eq!(current_bookings(&h, package_id).await, 1);

    h.ctx.lifecycle.cancel(booking.id, "changed plans", None).await.unwrap();
    assert_eq!(current_bookings(&h, package_id).await, 0);
}

#[tokio::test]
async fn test_racing_cancellations_release_once() {
    let h = harness_wrapping(Arc::new(TracingEventPublisher), |repos| Repositories {
        bookings: Arc::new(SlowBookingReads(repos.bookings.clone())),
        ..repos
    });
    let package_id = add_package(&h, package("Bangkok", "Thailand", 100_000, 3)).await;
    let kept = h.ctx.lifecycle.create(request(package_id, None)).await.unwrap();
    let booking = h.ctx.lifecycle.create(request(package_id, None)).await.unwrap();
    h.ctx.lifecycle.transition(kept.id, BookingStatus::Confirmed).await.unwrap();
    h.ctx.lifecycle.transition(booking.id, BookingStatus::Confirmed).await.unwrap();
    assert_eq!(current_bookings(&h, package_id).await, 2);

    let (a, b) = tokio::join!(
        h.ctx.lifecycle.cancel(booking.id, "duplicate request", None),
        h.ctx.lifecycle.cancel(booking.id, "duplicate request", None),
    );
    assert!(a.is_ok() && b.is_ok());
    assert_eq!(current_bookings(&h, package_id).await, 1);
}

#[tokio::test]
async fn test_concurrent_notes_are_all_kept() {
    let h = harness_wrapping(Arc::new(TracingEventPublisher), |repos| Repositories {
        bookings: Arc::new(SlowBookingReads(repos.bookings.clone())),
        ..repos
    });
    let package_id = add_package(&h, package("Bangkok", "Thailand", 100_000, 3)).await;
    let booking = h.ctx.lifecycle.create(request(package_id, None)).await.unwrap();

    let (a, b) = tokio::join!(
        h.ctx.lifecycle.add_communication(booking.id, CommunicationChannel::Email, "agent", "Flights booked"),
        h.ctx.lifecycle.add_communication(booking.id, CommunicationChannel::Phone, "agent", "Called the clinic"),
    );
    a.unwrap();
    b.unwrap();
    assert_eq!(h.ctx.lifecycle.get(booking.id).await.unwrap().communications.len(), 2);
}

#[tokio::test]
async fn test_stale_copy_is_refused_by_the_store() {
    let h = harness();
    let package_id = add_package(&h, package("Istanbul", "Turkey", 100_000, 3)).await;
    let booking = h.ctx.lifecycle.create(request(package_id, None)).await.unwrap();
    h.ctx.lifecycle.transition(booking.id, BookingStatus::Confirmed).await.unwrap();

    let result = h.ctx.repositories.bookings.update_booking(&booking, booking.version).await;
    assert!(matches!(result, Err(CoreError::Conflict(_))));
}

#[tokio::test]
async fn test_bookings_still_written_when_broker_is_down() {
    let h = harness_wrapping(Arc::new(UnreachableBroker), |repos| repos);
    let package_id = add_package(&h, package("Istanbul", "Turkey", 100_000, 3)).await;

    let booking = h.ctx.lifecycle.create(request(package_id, None)).await.unwrap();
    let confirmed = h.ctx.lifecycle.transition(booking.id, BookingStatus::Confirmed).await.unwrap();
    assert_eq!(confirmed.status, BookingStatus::Confirmed);
    h.ctx.lifecycle.cancel(booking.id, "changed plans", None).await.unwrap();

    let stored = h.ctx.lifecycle.get(booking.id).await.unwrap();
    assert_eq!(stored.status, BookingStatus::Cancelled);
    assert_eq!(current_bookings(&h, package_id).await, 0);
}

#[tokio::test]
async fn test_forced_cancellation_is_recorded() {
    let events = Arc::new(RecordedTopics::default());
    let h = harness_wrapping(events.clone(), |repos| repos);
    let package_id = add_package(&h, package("Antalya", "Turkey", 100_000, 3)).await;
    let booking = h.ctx.lifecycle.create(request(package_id, None)).await.unwrap();
    h.ctx.lifecycle.transition(booking.id, BookingStatus::InProgress).await.unwrap_err();
    h.ctx.lifecycle.force_status(booking.id, BookingStatus::InProgress).await.unwrap();

    let cancelled = h.ctx.lifecycle.force_status(booking.id, BookingStatus::Cancelled).await.unwrap();
    let record = cancelled.cancellation.expect("cancellation metadata");
    assert_eq!(record.previous_status, BookingStatus::InProgress);
    assert!(events.topics().contains(&"booking.cancelled"));
}

#[tokio::test]
async fn test_illegal_transitions_are_rejected() {
    let h = harness();
    let package_id = add_package(&h, package("Istanbul", "Turkey", 100_000, 3)).await;
    let booking = h.ctx.lifecycle.create(request(package_id, None)).await.unwrap();

    let result = h.ctx.lifecycle.transition(booking.id, BookingStatus::Completed).await;
    assert!(matches!(result, Err(CoreError::InvalidTransition { .. })));

    let result = h.ctx.lifecycle.transition_named(booking.id, "shipped").await;
    assert!(matches!(result, Err(CoreError::InvalidStatus(_))));

    let result = h.ctx.lifecycle.transition(Uuid::new_v4(), BookingStatus::Confirmed).await;
    assert!(matches!(result, Err(CoreError::NotFound { entity: "booking", .. })));
}

#[tokio::test]
async fn test_walk_to_completion_and_feedback() {
    let h = harness();
    let package_id = add_package(&h, package("Antalya", "Turkey", 100_000, 3)).await;
    let booking = h.ctx.lifecycle.create(request(package_id, None)).await.unwrap();

    let early = h.ctx.lifecycle.submit_feedback(booking.id, 5, "Great", true).await;
    assert!(matches!(early, Err(CoreError::ValidationFailed(_))));

    for status in [
        BookingStatus::Confirmed,
        BookingStatus::PaymentCompleted,
        BookingStatus::TravelReady,
        BookingStatus::InProgress,
        BookingStatus::Completed,
    ] {
        h.ctx.lifecycle.transition_named(booking.id, status.as_str()).await.unwrap();
    }

    let done = h.ctx.lifecycle.submit_feedback(booking.id, 5, "Great care", true).await.unwrap();
    assert_eq!(done.feedback.as_ref().unwrap().rating, 5);

    // completed trips cannot be cancelled
    let result = h.ctx.lifecycle.cancel(booking.id, "too late", None).await;
    assert!(matches!(result, Err(CoreError::InvalidTransition { .. })));
    assert_eq!(current_bookings(&h, package_id).await, 1);
}

#[tokio::test]
async fn test_refund_only_after_cancellation() {
    let h = harness();
    let package_id = add_package(&h, package("Antalya", "Turkey", 100_000, 3)).await;
    let booking = h.ctx.lifecycle.create(request(package_id, None)).await.unwrap();
    h.ctx.lifecycle.transition(booking.id, BookingStatus::Confirmed).await.unwrap();

    assert!(h.ctx.lifecycle.transition(booking.id, BookingStatus::Refunded).await.is_err());

    h.ctx.lifecycle.transition(booking.id, BookingStatus::Cancelled).await.unwrap();
    let refunded = h.ctx.lifecycle.transition(booking.id, BookingStatus::Refunded).await.unwrap();
    assert_eq!(refunded.status, BookingStatus::Refunded);
    assert_eq!(current_bookings(&h, package_id).await, 0);
}

#[tokio::test]
async fn test_forced_status_keeps_inventory_consistent() {
    let h = harness();
    let package_id = add_package(&h, package("Antalya", "Turkey", 100_000, 3)).await;
    let booking = h.ctx.lifecycle.create(request(package_id, None)).await.unwrap();

    let forced = h.ctx.lifecycle.force_status(booking.id, BookingStatus::PaymentCompleted).await.unwrap();
    assert!(forced.inventory_held);
    assert_eq!(current_bookings(&h, package_id).await, 1);

    h.ctx.lifecycle.force_status(booking.id, BookingStatus::Refunded).await.unwrap();
    assert_eq!(current_bookings(&h, package_id).await, 0);
}

#[tokio::test]
async fn test_transactions_track_progress_without_changing_status() {
    let h = harness();
    let package_id = add_package(&h, package("Antalya", "Turkey", 100_000, 3)).await;
    let booking = h.ctx.lifecycle.create(request(package_id, None)).await.unwrap();
    assert_eq!(booking.pricing.total_price, 100_000);

    let booking = h
        .ctx
        .lifecycle
        .record_transaction(
            booking.id,
            PaymentTransaction::new(40_000, "USD", TransactionStatus::Completed)
                .with_method(PaymentMethod::Installment),
        )
        .await
        .unwrap();
    assert_eq!(booking.payment.status, PaymentStatus::Partial);
    assert_eq!(booking.payment.method, Some(PaymentMethod::Installment));
    assert_eq!(booking.status, BookingStatus::PendingConfirmation);
    assert_eq!(h.ctx.lifecycle.payment_progress(booking.id).await.unwrap(), 40);

    let booking = h
        .ctx
        .lifecycle
        .record_transaction(booking.id, PaymentTransaction::new(60_000, "USD", TransactionStatus::Completed))
        .await
        .unwrap();
    assert_eq!(PricingLedger::payment_progress(&booking), 100);
    assert_eq!(booking.payment.status, PaymentStatus::Completed);
    assert_eq!(booking.status, BookingStatus::PendingConfirmation);
}

#[tokio::test]
async fn test_notes_and_itinerary() {
    let h = harness();
    let package_id = add_package(&h, package("Antalya", "Turkey", 100_000, 3)).await;
    let booking = h.ctx.lifecycle.create(request(package_id, None)).await.unwrap();

    h.ctx
        .lifecycle
        .add_communication(booking.id, CommunicationChannel::Whatsapp, "coordinator", "Flight details received")
        .await
        .unwrap();
    let with_doc = h
        .ctx
        .lifecycle
        .add_document(booking.id, "passport", "passport.pdf", "https://files.example.com/p.pdf")
        .await
        .unwrap();
    let doc_id = with_doc.documents[0].id;
    let verified = h.ctx.lifecycle.verify_document(booking.id, doc_id).await.unwrap();
    assert!(verified.documents[0].verified);
    assert_eq!(verified.communications.len(), 1);

    let day = |n: u32| ItineraryDay { day: n, date: None, title: format!("Day {}", n), activities: vec![] };
    let planned = h.ctx.lifecycle.set_itinerary(booking.id, vec![day(2), day(1)]).await.unwrap();
    assert_eq!(planned.itinerary[0].day, 1);

    let duplicate = h.ctx.lifecycle.set_itinerary(booking.id, vec![day(1), day(1)]).await;
    assert!(matches!(duplicate, Err(CoreError::ValidationFailed(_))));
}

#[tokio::test]
async fn test_purge_releases_held_slot() {
    let h = harness();
    let package_id = add_package(&h, package("Antalya", "Turkey", 100_000, 3)).await;
    let booking = h.ctx.lifecycle.create(request(package_id, None)).await.unwrap();
    h.ctx.lifecycle.transition(booking.id, BookingStatus::Confirmed).await.unwrap();

    h.ctx.lifecycle.purge(booking.id).await.unwrap();
    assert_eq!(current_bookings(&h, package_id).await, 0);
    assert!(h.ctx.lifecycle.get(booking.id).await.is_err());
}

#[tokio::test]
async fn test_list_for_user() {
    let h = harness();
    let package_id = add_package(&h, package("Antalya", "Turkey", 100_000, 10)).await;
    let user_id = add_user(&h).await;
    for _ in 0..3 {
        h.ctx.lifecycle.create(request(package_id, Some(user_id))).await.unwrap();
    }
    h.ctx.lifecycle.create(request(package_id, None)).await.unwrap();

    let page = h
        .ctx
        .lifecycle
        .list_for_user(user_id, healtour_core::listing::PageRequest { page: 1, limit: 2 })
        .await
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.items.len(), 2);
}
