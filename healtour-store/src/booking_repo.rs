use async_trait::async_trait;
use uuid::Uuid;
use sqlx::types::Json;
use sqlx::PgPool;
use healtour_booking::{Booking, BookingRepository, BookingStatus};
use healtour_core::listing::{Page, PageRequest};
use healtour_core::{CoreError, CoreResult};

use crate::database::map_sqlx;

pub struct StoreBookingRepository {
    pool: PgPool,
}

impl StoreBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    data: Json<Booking>,
}

#[async_trait]
impl BookingRepository for StoreBookingRepository {
    async fn create_booking(&self, booking: &Booking) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO bookings (id, booking_number, package_id, user_id, status, version, data, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(booking.id)
        .bind(&booking.booking_number)
        .bind(booking.package_id)
        .bind(booking.user_id)
        .bind(booking.status.as_str())
        .bind(booking.version as i64)
        .bind(Json(booking))
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn get_booking(&self, id: Uuid) -> CoreResult<Option<Booking>> {
        let row: Option<BookingRow> = sqlx::query_as("SELECT data FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(row.map(|r| r.data.0))
    }

    async fn find_by_number(&self, booking_number: &str) -> CoreResult<Option<Booking>> {
        let row: Option<BookingRow> = sqlx::query_as("SELECT data FROM bookings WHERE booking_number = $1")
            .bind(booking_number)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(row.map(|r| r.data.0))
    }

    async fn list_for_user(&self, user_id: Uuid, page: PageRequest) -> CoreResult<Page<Booking>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bookings WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx)?;

        let rows: Vec<BookingRow> = sqlx::query_as(
            "SELECT data FROM bookings WHERE user_id = $1 ORDER BY created_at DESC, id LIMIT $2 OFFSET $3",
        )
        .bind(user_id)
        .bind(page.limit as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(Page::new(
            rows.into_iter().map(|r| r.data.0).collect(),
            total.max(0) as u64,
            page,
        ))
    }

    async fn update_booking(&self, booking: &Booking, expected_version: u64) -> CoreResult<()> {
        // booking_number is never rewritten
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET user_id = $2, status = $3, data = $4, updated_at = $5, version = $7
            WHERE id = $1 AND booking_number = $6 AND version = $8
            "#,
        )
        .bind(booking.id)
        .bind(booking.user_id)
        .bind(booking.status.as_str())
        .bind(Json(booking))
        .bind(booking.updated_at)
        .bind(&booking.booking_number)
        .bind(booking.version as i64)
        .bind(expected_version as i64)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        if result.rows_affected() > 0 {
            return Ok(());
        }
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM bookings WHERE id = $1)")
            .bind(booking.id)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx)?;
        if exists {
            Err(CoreError::Conflict(format!("booking {}", booking.booking_number)))
        } else {
            Err(CoreError::not_found("booking", booking.id))
        }
    }

    async fn delete_booking(&self, id: Uuid) -> CoreResult<()> {
        let result = sqlx::query("DELETE FROM bookings WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("booking", id));
        }
        Ok(())
    }

    async fn user_has_booking_in(
        &self,
        user_id: Uuid,
        package_id: Uuid,
        statuses: &[BookingStatus],
    ) -> CoreResult<bool> {
        let names: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM bookings WHERE user_id = $1 AND package_id = $2 AND status = ANY($3))",
        )
        .bind(user_id)
        .bind(package_id)
        .bind(names)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)
    }
}
