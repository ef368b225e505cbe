use chrono::{DateTime, Datelike, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

const PREFIX: &str = "HT";

/// Issues booking numbers of the form `HT<YYYY><MM><4 random digits>`.
///
/// Numbers are not guaranteed unique on their own; the booking store's
/// unique constraint catches collisions and the lifecycle retries.
pub struct IdentifierGenerator {
    rng: Mutex<StdRng>,
}

impl IdentifierGenerator {
    pub fn new() -> Self {
        Self { rng: Mutex::new(StdRng::from_entropy()) }
    }

    /// Deterministic sequence, for tests
    pub fn seeded(seed: u64) -> Self {
        Self { rng: Mutex::new(StdRng::seed_from_u64(seed)) }
    }

    pub fn next(&self) -> String {
        self.next_at(Utc::now())
    }

    pub fn next_at(&self, now: DateTime<Utc>) -> String {
        let suffix: u16 = match self.rng.lock() {
            Ok(mut rng) => rng.gen_range(0..10_000),
            // a poisoned lock still holds a usable generator
            Err(poisoned) => poisoned.into_inner().gen_range(0..10_000),
        };
        format!("{}{:04}{:02}{:04}", PREFIX, now.year(), now.month(), suffix)
    }

    pub fn is_well_formed(number: &str) -> bool {
        number.len() == 12
            && number.starts_with(PREFIX)
            && number[PREFIX.len()..].bytes().all(|b| b.is_ascii_digit())
    }
}

impl Default for IdentifierGenerator {
    fn default() -> Self {
        Self::new()
    }
}
