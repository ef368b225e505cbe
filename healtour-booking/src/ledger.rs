use healtour_catalog::PriceQuote;
use healtour_core::payment::{PaymentStatus, PaymentTransaction, TransactionStatus};
use tracing::warn;

use crate::models::{Booking, PricingBreakdown};

/// Price and payment bookkeeping for a booking. Records what happened,
/// never moves money.
pub struct PricingLedger;

impl PricingLedger {
    pub fn compute_total(base_price: i64, additional_services: i64, taxes: i64, discounts: i64) -> i64 {
        base_price
            .saturating_add(additional_services)
            .saturating_add(taxes)
            .saturating_sub(discounts)
    }

    pub fn breakdown(quote: PriceQuote) -> PricingBreakdown {
        let total_price =
            Self::compute_total(quote.base_price, quote.additional_services, quote.taxes, quote.discounts);
        PricingBreakdown {
            base_price: quote.base_price,
            additional_services: quote.additional_services,
            discounts: quote.discounts,
            taxes: quote.taxes,
            total_price,
            currency: quote.currency,
        }
    }

    /// Overwrites `total_price` from the components. Called before every save,
    /// so a stale or hand-edited total never reaches storage.
    pub fn normalize(pricing: &mut PricingBreakdown) {
        pricing.total_price = Self::compute_total(
            pricing.base_price,
            pricing.additional_services,
            pricing.taxes,
            pricing.discounts,
        );
    }

    pub fn completed_amount(booking: &Booking) -> i64 {
        booking
            .payment
            .transactions
            .iter()
            .filter(|tx| tx.is_completed())
            .fold(0i64, |paid, tx| paid.saturating_add(tx.amount))
    }

    /// Whole percent of the total covered by completed transactions, 0 to 100.
    /// A free booking is fully paid.
    pub fn payment_progress(booking: &Booking) -> u8 {
        let total = booking.pricing.total_price;
        if total <= 0 {
            return 100;
        }
        let paid = Self::completed_amount(booking) as f64;
        (paid * 100.0 / total as f64).round().clamp(0.0, 100.0) as u8
    }

    pub fn derive_status(booking: &Booking) -> PaymentStatus {
        let transactions = &booking.payment.transactions;
        let has_completed = transactions.iter().any(|tx| tx.is_completed());
        let has_refund = transactions.iter().any(|tx| tx.status == TransactionStatus::Refunded);
        if has_refund && !has_completed {
            return PaymentStatus::Refunded;
        }
        if !has_completed && transactions.last().is_some_and(|tx| tx.status == TransactionStatus::Failed) {
            return PaymentStatus::Failed;
        }

        match Self::payment_progress(booking) {
            0 => PaymentStatus::Pending,
            100 => PaymentStatus::Completed,
            _ => PaymentStatus::Partial,
        }
    }

    /// Appends to the history and refreshes the sub-ledger status. Booking
    /// status is left alone.
    pub fn record(booking: &mut Booking, transaction: PaymentTransaction) {
        if transaction.currency != booking.pricing.currency {
            warn!(
                booking_number = %booking.booking_number,
                booking_currency = %booking.pricing.currency,
                transaction_currency = %transaction.currency,
                "Transaction currency differs from booking currency; amounts are not converted"
            );
        }
        if booking.payment.method.is_none() {
            booking.payment.method = transaction.method;
        }
        booking.payment.transactions.push(transaction);
        booking.payment.status = Self::derive_status(booking);
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::models::*;
    use chrono::{NaiveDate, Utc};
    use healtour_shared::Masked;
    use uuid::Uuid;

    pub fn booking(total_price: i64) -> Booking {
        let start = NaiveDate::from_ymd_opt(2025, 9, 1).unwrap();
        let now = Utc::now();
        Booking {
            id: Uuid::new_v4(),
            booking_number: "HT2025090001".to_string(),
            package_id: Uuid::new_v4(),
            user_id: None,
            personal_info: PersonalInfo {
                first_name: "Elif".to_string(),
                last_name: "Kaya".to_string(),
                email: Masked::new("elif@example.com".to_string()),
                phone: None,
                date_of_birth: None,
                nationality: None,
                passport_number: None,
                emergency_contact: None,
            },
            travel_dates: TravelDates { start_date: start, end_date: start, flexible: false },
            travelers: TravelerCount { adults: 1, children: 0, infants: 0 },
            selected_services: vec![],
            special_requests: None,
            pricing: PricingBreakdown {
                base_price: total_price,
                additional_services: 0,
                discounts: 0,
                taxes: 0,
                total_price,
                currency: "USD".to_string(),
            },
            payment: PaymentLedger::default(),
            status: BookingStatus::PendingConfirmation,
            inventory_held: false,
            version: 0,
            documents: vec![],
            communications: vec![],
            medical_appointments: vec![],
            itinerary: vec![],
            feedback: None,
            cancellation: None,
            created_at: now,
            updated_at: now,
        }
    }
}
