use async_trait::async_trait;
use uuid::Uuid;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use healtour_catalog::query::{CatalogQuery, CatalogSort, FlagField, NumericField, SetField, SortKey, TextField};
use healtour_catalog::{Package, PackageRepository, Predicate, RatingSummary};
use healtour_core::listing::{Page, SortDirection};
use healtour_core::{CoreError, CoreResult};

use crate::database::map_sqlx;

pub struct StorePackageRepository {
    pool: PgPool,
}

impl StorePackageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Columns written by the counter and rating updates win over the document
#[derive(sqlx::FromRow)]
struct PackageRow {
    data: Json<Package>,
    max_capacity: i32,
    current_bookings: i32,
    rating_average: f64,
    rating_count: i32,
}

impl PackageRow {
    fn into_package(self) -> Package {
        let mut package = self.data.0;
        package.capacity.max_capacity = self.max_capacity.max(0) as u32;
        package.capacity.current_bookings = self.current_bookings.max(0) as u32;
        package.rating = RatingSummary {
            average: self.rating_average,
            count: self.rating_count.max(0) as u32,
        };
        package
    }
}

const SELECT_PACKAGE: &str =
    "SELECT data, max_capacity, current_bookings, rating_average, rating_count FROM packages";

#[async_trait]
impl PackageRepository for StorePackageRepository {
    async fn create_package(&self, package: &Package) -> CoreResult<Uuid> {
        package.validate()?;
        let services: Vec<String> = package.services.iter().map(|s| s.name.clone()).collect();

        sqlx::query(
            r#"
            INSERT INTO packages (id, title, description, city, country, facility_name, category, tags,
                experience_types, service_names, base_price, duration_days, max_capacity, current_bookings,
                rating_average, rating_count, is_active, is_featured, data, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21)
            "#,
        )
        .bind(package.id)
        .bind(&package.title)
        .bind(&package.description)
        .bind(&package.location.city)
        .bind(&package.location.country)
        .bind(package.facility.as_ref().map(|f| f.name.clone()))
        .bind(package.category.as_str())
        .bind(&package.tags)
        .bind(&package.experience_types)
        .bind(&services)
        .bind(package.pricing.base_price)
        .bind(package.duration.days as i32)
        .bind(package.capacity.max_capacity as i32)
        .bind(package.capacity.current_bookings as i32)
        .bind(package.rating.average)
        .bind(package.rating.count as i32)
        .bind(package.is_active)
        .bind(package.is_featured)
        .bind(Json(package))
        .bind(package.created_at)
        .bind(package.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(package.id)
    }

    async fn get_package(&self, id: Uuid) -> CoreResult<Option<Package>> {
        let row: Option<PackageRow> = sqlx::query_as(&format!("{} WHERE id = $1", SELECT_PACKAGE))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(row.map(PackageRow::into_package))
    }

    async fn find_packages(&self, query: &CatalogQuery) -> CoreResult<Page<Package>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM packages WHERE ");
        push_predicate(&mut count, &query.predicate);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx)?;

        let mut select = QueryBuilder::<Postgres>::new(SELECT_PACKAGE);
        select.push(" WHERE ");
        push_predicate(&mut select, &query.predicate);
        push_order(&mut select, &query.sort);
        select
            .push(" LIMIT ")
            .push_bind(query.page.limit as i64)
            .push(" OFFSET ")
            .push_bind(query.page.offset() as i64);

        let rows: Vec<PackageRow> = select
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;

        Ok(Page::new(
            rows.into_iter().map(PackageRow::into_package).collect(),
            total.max(0) as u64,
            query.page,
        ))
    }

    async fn update_package(&self, package: &Package) -> CoreResult<()> {
        package.validate()?;
        let services: Vec<String> = package.services.iter().map(|s| s.name.clone()).collect();

        // current_bookings and the rating columns are left to their own writers
        let result = sqlx::query(
            r#"
            UPDATE packages
            SET title = $2, description = $3, city = $4, country = $5, facility_name = $6, category = $7,
                tags = $8, experience_types = $9, service_names = $10, base_price = $11, duration_days = $12,
                max_capacity = $13, is_active = $14, is_featured = $15, data = $16, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(package.id)
        .bind(&package.title)
        .bind(&package.description)
        .bind(&package.location.city)
        .bind(&package.location.country)
        .bind(package.facility.as_ref().map(|f| f.name.clone()))
        .bind(package.category.as_str())
        .bind(&package.tags)
        .bind(&package.experience_types)
        .bind(&services)
        .bind(package.pricing.base_price)
        .bind(package.duration.days as i32)
        .bind(package.capacity.max_capacity as i32)
        .bind(package.is_active)
        .bind(package.is_featured)
        .bind(Json(package))
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("package", package.id));
        }
        Ok(())
    }

    async fn delete_package(&self, id: Uuid) -> CoreResult<()> {
        let result = sqlx::query("DELETE FROM packages WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("package", id));
        }
        Ok(())
    }

    async fn increment_bookings_within_capacity(&self, id: Uuid) -> CoreResult<Option<u32>> {
        let updated: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE packages
            SET current_bookings = current_bookings + 1, updated_at = NOW()
            WHERE id = $1 AND current_bookings < max_capacity
            RETURNING current_bookings
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        match updated {
            Some(current) => Ok(Some(current.max(0) as u32)),
            None => {
                // full, or not there at all
                if self.get_package(id).await?.is_none() {
                    return Err(CoreError::not_found("package", id));
                }
                Ok(None)
            }
        }
    }

    async fn decrement_bookings(&self, id: Uuid) -> CoreResult<u32> {
        let updated: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE packages
            SET current_bookings = GREATEST(current_bookings - 1, 0), updated_at = NOW()
            WHERE id = $1
            RETURNING current_bookings
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        updated
            .map(|current| current.max(0) as u32)
            .ok_or_else(|| CoreError::not_found("package", id))
    }

    async fn set_rating(&self, id: Uuid, rating: RatingSummary) -> CoreResult<()> {
        let result = sqlx::query(
            "UPDATE packages SET rating_average = $2, rating_count = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(rating.average)
        .bind(rating.count as i32)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("package", id));
        }
        Ok(())
    }
}

/// Renders a predicate tree as a parenthesized SQL boolean expression with
/// every user value bound as a parameter.
pub(crate) fn push_predicate(qb: &mut QueryBuilder<'_, Postgres>, predicate: &Predicate) {
    match predicate {
        Predicate::Always => {
            qb.push("TRUE");
        }
        Predicate::TextMatch { field, needle } => {
            let pattern = like_pattern(needle);
            match text_column(*field) {
                Some(column) => {
                    qb.push("COALESCE(").push(column).push(", '') ILIKE ").push_bind(pattern);
                }
                None => {
                    qb.push("EXISTS (SELECT 1 FROM unnest(tags) AS t WHERE t ILIKE ")
                        .push_bind(pattern)
                        .push(")");
                }
            }
        }
        Predicate::CategoryEq(category) => {
            qb.push("category = ").push_bind(category.as_str());
        }
        Predicate::FlagEq { field, value } => {
            let column = match field {
                FlagField::Active => "is_active",
                FlagField::Featured => "is_featured",
            };
            qb.push(column).push(" = ").push_bind(*value);
        }
        Predicate::Range { field, min, max } => {
            let column = match field {
                NumericField::BasePrice => "base_price",
                NumericField::DurationDays => "duration_days",
            };
            qb.push("(TRUE");
            if let Some(min) = min {
                qb.push(" AND ").push(column).push(" >= ").push_bind(*min);
            }
            if let Some(max) = max {
                qb.push(" AND ").push(column).push(" <= ").push_bind(*max);
            }
            qb.push(")");
        }
        Predicate::AnyOf { field, values } => {
            let column = match field {
                SetField::ExperienceTypes => "experience_types",
                SetField::ServiceNames => "service_names",
            };
            let lowered: Vec<String> = values.iter().map(|v| v.to_lowercase()).collect();
            qb.push("EXISTS (SELECT 1 FROM unnest(")
                .push(column)
                .push(") AS v WHERE lower(v) = ANY(")
                .push_bind(lowered)
                .push("))");
        }
        Predicate::And(parts) => push_group(qb, parts, " AND ", "TRUE"),
        Predicate::Or(parts) => push_group(qb, parts, " OR ", "FALSE"),
    }
}

fn push_group(qb: &mut QueryBuilder<'_, Postgres>, parts: &[Predicate], joiner: &str, empty: &str) {
    if parts.is_empty() {
        qb.push(empty);
        return;
    }
    qb.push("(");
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            qb.push(joiner);
        }
        push_predicate(qb, part);
    }
    qb.push(")");
}

fn push_order(qb: &mut QueryBuilder<'_, Postgres>, sort: &CatalogSort) {
    let direction = match sort.direction {
        SortDirection::Asc => "ASC",
        SortDirection::Desc => "DESC",
    };
    qb.push(" ORDER BY ");
    match sort.key {
        SortKey::CreatedAt => qb.push("created_at ").push(direction),
        SortKey::Price => qb.push("base_price ").push(direction),
        SortKey::Rating => qb
            .push("rating_average ")
            .push(direction)
            .push(", rating_count ")
            .push(direction),
        SortKey::Duration => qb.push("duration_days ").push(direction),
        SortKey::Popularity => qb.push("current_bookings ").push(direction),
    };
    qb.push(", id ASC");
}

/// `None` for tags, which need an array scan
fn text_column(field: TextField) -> Option<&'static str> {
    match field {
        TextField::Title => Some("title"),
        TextField::Description => Some("description"),
        TextField::City => Some("city"),
        TextField::Country => Some("country"),
        TextField::FacilityName => Some("facility_name"),
        TextField::Category => Some("category"),
        TextField::Tags => None,
    }
}

fn like_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}
