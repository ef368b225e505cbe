use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;
use healtour_core::listing::{PageRequest, SortDirection};
use healtour_core::{CoreError, CoreResult};

use crate::package::{Package, PackageCategory};

/// Free-text columns a text match can target
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TextField {
    Title,
    Description,
    City,
    Country,
    FacilityName,
    Tags,
    Category,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum NumericField {
    BasePrice,
    DurationDays,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SetField {
    ExperienceTypes,
    ServiceNames,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FlagField {
    Active,
    Featured,
}

/// Storage-agnostic filter tree. Adapters either evaluate it in memory
/// (`matches`) or translate it into their own query language.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Predicate {
    Always,
    /// Case-insensitive substring match
    TextMatch { field: TextField, needle: String },
    CategoryEq(PackageCategory),
    FlagEq { field: FlagField, value: bool },
    /// Inclusive bounds, each optional
    Range { field: NumericField, min: Option<i64>, max: Option<i64> },
    /// True when any of the package's values is in `values` (case-insensitive)
    AnyOf { field: SetField, values: Vec<String> },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    pub fn and(mut parts: Vec<Predicate>) -> Predicate {
        parts.retain(|p| *p != Predicate::Always);
        match parts.len() {
            0 => Predicate::Always,
            1 => parts.remove(0),
            _ => Predicate::And(parts),
        }
    }

    pub fn or(mut parts: Vec<Predicate>) -> Predicate {
        match parts.len() {
            1 => parts.remove(0),
            _ => Predicate::Or(parts),
        }
    }

    pub fn matches(&self, package: &Package) -> bool {
        match self {
            Predicate::Always => true,
            Predicate::TextMatch { field, needle } => {
                let needle = needle.to_lowercase();
                let contains = |haystack: &str| haystack.to_lowercase().contains(&needle);
                match field {
                    TextField::Title => contains(&package.title),
                    TextField::Description => contains(&package.description),
                    TextField::City => contains(&package.location.city),
                    TextField::Country => contains(&package.location.country),
                    TextField::FacilityName => package.facility.as_ref().is_some_and(|f| contains(&f.name)),
                    TextField::Tags => package.tags.iter().any(|t| contains(t)),
                    TextField::Category => contains(package.category.as_str()),
                }
            }
            Predicate::CategoryEq(category) => package.category == *category,
            Predicate::FlagEq { field, value } => match field {
                FlagField::Active => package.is_active == *value,
                FlagField::Featured => package.is_featured == *value,
            },
            Predicate::Range { field, min, max } => {
                let actual = match field {
                    NumericField::BasePrice => package.pricing.base_price,
                    NumericField::DurationDays => package.duration.days as i64,
                };
                min.map_or(true, |m| actual >= m) && max.map_or(true, |m| actual <= m)
            }
            Predicate::AnyOf { field, values } => {
                let wanted: Vec<String> = values.iter().map(|v| v.to_lowercase()).collect();
                let hit = |v: &str| wanted.contains(&v.to_lowercase());
                match field {
                    SetField::ExperienceTypes => package.experience_types.iter().any(|e| hit(e)),
                    SetField::ServiceNames => package.services.iter().any(|s| hit(&s.name)),
                }
            }
            Predicate::And(parts) => parts.iter().all(|p| p.matches(package)),
            Predicate::Or(parts) => parts.iter().any(|p| p.matches(package)),
        }
    }
}

/// Fixed duration filter ranges, in days
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DurationBucket {
    #[serde(rename = "1-3")]
    Short,
    #[serde(rename = "4-7")]
    Week,
    #[serde(rename = "8-14")]
    Extended,
    #[serde(rename = "15+")]
    Long,
}

impl DurationBucket {
    pub fn bounds(&self) -> (i64, Option<i64>) {
        match self {
            DurationBucket::Short => (1, Some(3)),
            DurationBucket::Week => (4, Some(7)),
            DurationBucket::Extended => (8, Some(14)),
            DurationBucket::Long => (15, None),
        }
    }
}

impl FromStr for DurationBucket {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1-3" => Ok(DurationBucket::Short),
            "4-7" => Ok(DurationBucket::Week),
            "8-14" => Ok(DurationBucket::Extended),
            "15+" => Ok(DurationBucket::Long),
            other => Err(CoreError::validation(format!("unknown duration range '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SortKey {
    CreatedAt,
    Price,
    Rating,
    Duration,
    Popularity,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogSort {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl Default for CatalogSort {
    fn default() -> Self {
        Self { key: SortKey::CreatedAt, direction: SortDirection::Desc }
    }
}

impl CatalogSort {
    pub fn compare(&self, a: &Package, b: &Package) -> Ordering {
        let ordering = match self.key {
            SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
            SortKey::Price => a.pricing.base_price.cmp(&b.pricing.base_price),
            SortKey::Rating => a
                .rating
                .average
                .partial_cmp(&b.rating.average)
                .unwrap_or(Ordering::Equal)
                .then(a.rating.count.cmp(&b.rating.count)),
            SortKey::Duration => a.duration.days.cmp(&b.duration.days),
            SortKey::Popularity => a.capacity.current_bookings.cmp(&b.capacity.current_bookings),
        };
        match self.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

impl FromStr for CatalogSort {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key, direction) = match s.trim() {
            "newest" => (SortKey::CreatedAt, SortDirection::Desc),
            "oldest" => (SortKey::CreatedAt, SortDirection::Asc),
            "price-asc" => (SortKey::Price, SortDirection::Asc),
            "price-desc" => (SortKey::Price, SortDirection::Desc),
            "rating" => (SortKey::Rating, SortDirection::Desc),
            "duration" => (SortKey::Duration, SortDirection::Asc),
            "popular" => (SortKey::Popularity, SortDirection::Desc),
            other => return Err(CoreError::validation(format!("unknown sort order '{}'", other))),
        };
        Ok(Self { key, direction })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ListingScope {
    /// Storefront: active packages only
    Public,
    /// Back office: everything, including retired packages
    Admin,
}

/// A built query, ready for a `PackageRepository`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogQuery {
    pub predicate: Predicate,
    pub page: PageRequest,
    pub sort: CatalogSort,
    pub scope: ListingScope,
}

/// Raw listing parameters as they arrive from the HTTP layer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CatalogFilters {
    pub search: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub price_min: Option<i64>,
    pub price_max: Option<i64>,
    pub duration: Option<String>,
    pub experience_types: Vec<String>,
    pub services: Vec<String>,
    pub featured: Option<bool>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ListingLimits {
    pub default_limit: u32,
    pub max_limit: u32,
}

impl Default for ListingLimits {
    fn default() -> Self {
        Self { default_limit: 12, max_limit: 100 }
    }
}

/// Composes typed predicate fragments into one conjunctive catalog query
#[derive(Debug, Clone, Default)]
pub struct CatalogQueryBuilder {
    clauses: Vec<Predicate>,
    page: PageRequest,
    sort: CatalogSort,
}

impl CatalogQueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_filters(filters: &CatalogFilters, limits: ListingLimits) -> CoreResult<Self> {
        let mut builder = Self::new();

        if let Some(search) = non_blank(&filters.search) {
            builder = builder.text(search);
        }
        if let Some(category) = non_blank(&filters.category) {
            builder = builder.category(category.parse()?);
        }
        if let Some(location) = non_blank(&filters.location) {
            builder = builder.location(location);
        }
        builder = builder.price_range(filters.price_min, filters.price_max)?;
        if let Some(duration) = non_blank(&filters.duration) {
            builder = builder.duration(duration.parse()?);
        }
        builder = builder
            .experience_types(filters.experience_types.clone())
            .services(filters.services.clone());
        if let Some(featured) = filters.featured {
            builder = builder.featured(featured);
        }
        if let Some(sort) = non_blank(&filters.sort) {
            builder = builder.sort(sort.parse()?);
        }

        let page = PageRequest::bounded(
            filters.page.unwrap_or(1),
            filters.limit.unwrap_or(0),
            limits.default_limit,
            limits.max_limit,
        );
        Ok(builder.page(page))
    }

    /// OR across title, description, city, country, facility, tags, category
    pub fn text(mut self, term: &str) -> Self {
        let needle = term.trim().to_string();
        if needle.is_empty() {
            return self;
        }
        let fields = [
            TextField::Title,
            TextField::Description,
            TextField::City,
            TextField::Country,
            TextField::FacilityName,
            TextField::Tags,
            TextField::Category,
        ];
        self.clauses.push(Predicate::or(
            fields
                .into_iter()
                .map(|field| Predicate::TextMatch { field, needle: needle.clone() })
                .collect(),
        ));
        self
    }

    pub fn category(mut self, category: PackageCategory) -> Self {
        self.clauses.push(Predicate::CategoryEq(category));
        self
    }

    /// `"City, Country"` requires both; a single token may match either.
    pub fn location(mut self, location: &str) -> Self {
        let (city, country) = match location.split_once(',') {
            Some((city, country)) => (city.trim(), country.trim()),
            None => (location.trim(), ""),
        };

        let clause = match (city.is_empty(), country.is_empty()) {
            (false, false) => Predicate::And(vec![
                Predicate::TextMatch { field: TextField::City, needle: city.to_string() },
                Predicate::TextMatch { field: TextField::Country, needle: country.to_string() },
            ]),
            (true, true) => return self,
            _ => {
                let token = if city.is_empty() { country } else { city };
                Predicate::Or(vec![
                    Predicate::TextMatch { field: TextField::City, needle: token.to_string() },
                    Predicate::TextMatch { field: TextField::Country, needle: token.to_string() },
                ])
            }
        };
        self.clauses.push(clause);
        self
    }

    pub fn price_range(mut self, min: Option<i64>, max: Option<i64>) -> CoreResult<Self> {
        if let (Some(lo), Some(hi)) = (min, max) {
            if lo > hi {
                return Err(CoreError::validation("priceMin cannot exceed priceMax"));
            }
        }
        if min.is_some() || max.is_some() {
            self.clauses.push(Predicate::Range { field: NumericField::BasePrice, min, max });
        }
        Ok(self)
    }

    pub fn duration(mut self, bucket: DurationBucket) -> Self {
        let (min, max) = bucket.bounds();
        self.clauses.push(Predicate::Range {
            field: NumericField::DurationDays,
            min: Some(min),
            max,
        });
        self
    }

    pub fn experience_types(self, values: Vec<String>) -> Self {
        self.any_of(SetField::ExperienceTypes, values)
    }

    pub fn services(self, values: Vec<String>) -> Self {
        self.any_of(SetField::ServiceNames, values)
    }

    pub fn featured(mut self, value: bool) -> Self {
        self.clauses.push(Predicate::FlagEq { field: FlagField::Featured, value });
        self
    }

    pub fn page(mut self, page: PageRequest) -> Self {
        self.page = page;
        self
    }

    pub fn sort(mut self, sort: CatalogSort) -> Self {
        self.sort = sort;
        self
    }

    pub fn build_public(self) -> CatalogQuery {
        self.build(ListingScope::Public)
    }

    pub fn build_admin(self) -> CatalogQuery {
        self.build(ListingScope::Admin)
    }

    fn build(self, scope: ListingScope) -> CatalogQuery {
        let mut clauses = Vec::with_capacity(self.clauses.len() + 1);
        if scope == ListingScope::Public {
            clauses.push(Predicate::FlagEq { field: FlagField::Active, value: true });
        }
        clauses.extend(self.clauses);

        CatalogQuery {
            predicate: Predicate::and(clauses),
            page: self.page,
            sort: self.sort,
            scope,
        }
    }

    fn any_of(mut self, field: SetField, values: Vec<String>) -> Self {
        let values: Vec<String> = values
            .into_iter()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect();
        if !values.is_empty() {
            self.clauses.push(Predicate::AnyOf { field, values });
        }
        self
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
