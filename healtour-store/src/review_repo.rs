use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use sqlx::PgPool;
use healtour_catalog::{Review, ReviewRepository};
use healtour_core::{CoreError, CoreResult};

use crate::database::map_sqlx;

pub struct StoreReviewRepository {
    pool: PgPool,
}

impl StoreReviewRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ReviewRow {
    id: Uuid,
    package_id: Uuid,
    user_id: Uuid,
    rating: i16,
    title: String,
    comment: String,
    is_verified: bool,
    helpful_voters: Vec<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ReviewRow> for Review {
    fn from(row: ReviewRow) -> Self {
        Review {
            id: row.id,
            package_id: row.package_id,
            user_id: row.user_id,
            rating: row.rating.clamp(0, 5) as u8,
            title: row.title,
            comment: row.comment,
            is_verified: row.is_verified,
            helpful_votes: row.helpful_voters.len() as u32,
            helpful_voters: row.helpful_voters,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const SELECT_REVIEW: &str = "SELECT id, package_id, user_id, rating, title, comment, is_verified, \
     helpful_voters, created_at, updated_at FROM reviews";

#[async_trait]
impl ReviewRepository for StoreReviewRepository {
    async fn create_review(&self, review: &Review) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO reviews (id, package_id, user_id, rating, title, comment, is_verified, helpful_voters, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(review.id)
        .bind(review.package_id)
        .bind(review.user_id)
        .bind(review.rating as i16)
        .bind(&review.title)
        .bind(&review.comment)
        .bind(review.is_verified)
        .bind(&review.helpful_voters)
        .bind(review.created_at)
        .bind(review.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match map_sqlx(e) {
            CoreError::DuplicateConstraint(_) => {
                CoreError::DuplicateConstraint("you have already reviewed this package".to_string())
            }
            other => other,
        })?;
        Ok(())
    }

    async fn get_review(&self, id: Uuid) -> CoreResult<Option<Review>> {
        let row: Option<ReviewRow> = sqlx::query_as(&format!("{} WHERE id = $1", SELECT_REVIEW))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(row.map(Review::from))
    }

    async fn find_by_author(&self, user_id: Uuid, package_id: Uuid) -> CoreResult<Option<Review>> {
        let row: Option<ReviewRow> =
            sqlx::query_as(&format!("{} WHERE user_id = $1 AND package_id = $2", SELECT_REVIEW))
                .bind(user_id)
                .bind(package_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx)?;
        Ok(row.map(Review::from))
    }

    async fn list_for_package(&self, package_id: Uuid) -> CoreResult<Vec<Review>> {
        let rows: Vec<ReviewRow> =
            sqlx::query_as(&format!("{} WHERE package_id = $1 ORDER BY created_at DESC", SELECT_REVIEW))
                .bind(package_id)
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx)?;
        Ok(rows.into_iter().map(Review::from).collect())
    }

    async fn update_review(&self, review: &Review) -> CoreResult<()> {
        let result = sqlx::query(
            "UPDATE reviews SET rating = $2, title = $3, comment = $4, updated_at = $5 WHERE id = $1",
        )
        .bind(review.id)
        .bind(review.rating as i16)
        .bind(&review.title)
        .bind(&review.comment)
        .bind(review.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("review", review.id));
        }
        Ok(())
    }

    async fn delete_review(&self, id: Uuid) -> CoreResult<()> {
        let result = sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("review", id));
        }
        Ok(())
    }

    async fn add_helpful_vote(&self, review_id: Uuid, user_id: Uuid) -> CoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE reviews
            SET helpful_voters = array_append(helpful_voters, $2)
            WHERE id = $1 AND NOT ($2 = ANY(helpful_voters))
            "#,
        )
        .bind(review_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }
        if self.get_review(review_id).await?.is_none() {
            return Err(CoreError::not_found("review", review_id));
        }
        Ok(false)
    }
}
