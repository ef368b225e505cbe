use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, NaiveDate, Utc};
use healtour_core::{CoreError, CoreResult};
use std::fmt;
use std::str::FromStr;

/// Package categories in the catalog
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum PackageCategory {
    MedicalTreatment,
    Dental,
    CosmeticSurgery,
    Wellness,
    Spa,
    Rehabilitation,
    Fertility,
    HealthCheckup,
}

impl PackageCategory {
    pub const ALL: [PackageCategory; 8] = [
        PackageCategory::MedicalTreatment,
        PackageCategory::Dental,
        PackageCategory::CosmeticSurgery,
        PackageCategory::Wellness,
        PackageCategory::Spa,
        PackageCategory::Rehabilitation,
        PackageCategory::Fertility,
        PackageCategory::HealthCheckup,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PackageCategory::MedicalTreatment => "medical-treatment",
            PackageCategory::Dental => "dental",
            PackageCategory::CosmeticSurgery => "cosmetic-surgery",
            PackageCategory::Wellness => "wellness",
            PackageCategory::Spa => "spa",
            PackageCategory::Rehabilitation => "rehabilitation",
            PackageCategory::Fertility => "fertility",
            PackageCategory::HealthCheckup => "health-checkup",
        }
    }
}

impl fmt::Display for PackageCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PackageCategory {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        PackageCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == needle)
            .ok_or_else(|| CoreError::validation(format!("unknown package category '{}'", s)))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Location {
    pub city: String,
    pub country: String,
    pub coordinates: Option<Coordinates>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StayDuration {
    pub days: u32,
    pub nights: u32,
}

/// What the package price already covers
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IncludedServices {
    pub accommodation: bool,
    pub airport_transfer: bool,
    pub meals: bool,
    pub medical_consultation: bool,
    pub translator: bool,
    pub travel_insurance: bool,
}

/// Percentage discount, optionally bounded in time
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Discount {
    pub label: Option<String>,
    pub percentage: u8,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
}

impl Discount {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.valid_from.map_or(true, |from| now >= from)
            && self.valid_until.map_or(true, |until| now <= until)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PackagePricing {
    /// Per paying traveler, minor units of `currency`
    pub base_price: i64,
    pub currency: String,
    #[serde(default)]
    pub includes: IncludedServices,
    #[serde(default)]
    pub discounts: Vec<Discount>,
}

/// A named treatment or amenity. Optional ones carry a per-traveler cost.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PackageService {
    pub name: String,
    pub description: Option<String>,
    pub included: bool,
    #[serde(default)]
    pub additional_cost: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Facility {
    pub name: String,
    #[serde(default)]
    pub accreditations: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Capacity {
    pub max_capacity: u32,
    pub current_bookings: u32,
}

impl Capacity {
    pub fn remaining(&self) -> u32 {
        self.max_capacity.saturating_sub(self.current_bookings)
    }

    pub fn is_full(&self) -> bool {
        self.current_bookings >= self.max_capacity
    }
}

/// Sale window and blackout days. Empty means always bookable.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AvailabilityWindow {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub blackout_dates: Vec<NaiveDate>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct RatingSummary {
    pub average: f64,
    pub count: u32,
}

/// Core package structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Package {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub location: Location,
    pub duration: StayDuration,
    pub pricing: PackagePricing,
    pub category: PackageCategory,
    #[serde(default)]
    pub services: Vec<PackageService>,
    #[serde(default)]
    pub experience_types: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub facility: Option<Facility>,
    pub capacity: Capacity,
    #[serde(default)]
    pub availability: AvailabilityWindow,
    #[serde(default)]
    pub rating: RatingSummary,
    pub is_active: bool,
    #[serde(default)]
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Package {
    /// Fresh, active package with an empty booking counter and no reviews.
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        location: Location,
        duration: StayDuration,
        pricing: PackagePricing,
        category: PackageCategory,
        max_capacity: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: description.into(),
            location,
            duration,
            pricing,
            category,
            services: Vec::new(),
            experience_types: Vec::new(),
            tags: Vec::new(),
            facility: None,
            capacity: Capacity { max_capacity, current_bookings: 0 },
            availability: AvailabilityWindow::default(),
            rating: RatingSummary::default(),
            is_active: true,
            is_featured: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn service(&self, name: &str) -> Option<&PackageService> {
        self.services.iter().find(|s| s.name.eq_ignore_ascii_case(name))
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.title.trim().is_empty() {
            return Err(CoreError::validation("package title is required"));
        }
        if self.location.city.trim().is_empty() || self.location.country.trim().is_empty() {
            return Err(CoreError::validation("package city and country are required"));
        }
        if self.duration.days < 1 {
            return Err(CoreError::validation("package duration must be at least one day"));
        }
        if self.pricing.base_price < 0 {
            return Err(CoreError::validation("base price cannot be negative"));
        }
        if self.pricing.currency.trim().is_empty() {
            return Err(CoreError::validation("currency is required"));
        }
        for discount in &self.pricing.discounts {
            if discount.percentage > 100 {
                return Err(CoreError::validation("discount percentage must be between 0 and 100"));
            }
            if let (Some(from), Some(until)) = (discount.valid_from, discount.valid_until) {
                if from > until {
                    return Err(CoreError::validation("discount window ends before it starts"));
                }
            }
        }
        if self.services.iter().any(|s| s.additional_cost < 0) {
            return Err(CoreError::validation("service cost cannot be negative"));
        }
        if let (Some(start), Some(end)) = (self.availability.start_date, self.availability.end_date) {
            if start > end {
                return Err(CoreError::validation("availability window ends before it starts"));
            }
        }
        if !(0.0..=5.0).contains(&self.rating.average) {
            return Err(CoreError::validation("rating average must be between 0 and 5"));
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn package(city: &str, country: &str, base_price: i64, days: u32) -> Package {
        Package::new(
            "Dental Implant Journey",
            "Implants with a seaside recovery stay",
            Location {
                city: city.to_string(),
                country: country.to_string(),
                coordinates: None,
            },
            StayDuration { days, nights: days.saturating_sub(1) },
            PackagePricing {
                base_price,
                currency: "USD".to_string(),
                includes: IncludedServices::default(),
                discounts: Vec::new(),
            },
            PackageCategory::Dental,
            10,
        )
    }
}
