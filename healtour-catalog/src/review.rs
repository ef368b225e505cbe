use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use healtour_core::{CoreError, CoreResult};

const MAX_TITLE_LEN: usize = 100;
const MAX_COMMENT_LEN: usize = 1000;

/// What a traveler submits when writing or editing a review
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewDraft {
    pub rating: u8,
    pub title: String,
    pub comment: String,
}

impl ReviewDraft {
    pub fn validate(&self) -> CoreResult<()> {
        if !(1..=5).contains(&self.rating) {
            return Err(CoreError::validation("rating must be between 1 and 5"));
        }
        let title = self.title.trim();
        if title.is_empty() || title.chars().count() > MAX_TITLE_LEN {
            return Err(CoreError::validation(format!(
                "review title must be 1-{} characters",
                MAX_TITLE_LEN
            )));
        }
        let comment = self.comment.trim();
        if comment.is_empty() || comment.chars().count() > MAX_COMMENT_LEN {
            return Err(CoreError::validation(format!(
                "review comment must be 1-{} characters",
                MAX_COMMENT_LEN
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Review {
    pub id: Uuid,
    pub package_id: Uuid,
    pub user_id: Uuid,
    pub rating: u8,
    pub title: String,
    pub comment: String,
    /// Author has a confirmed or completed booking for the package
    pub is_verified: bool,
    pub helpful_votes: u32,
    #[serde(default)]
    pub helpful_voters: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Review {
    pub fn new(package_id: Uuid, user_id: Uuid, draft: ReviewDraft, is_verified: bool) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            package_id,
            user_id,
            rating: draft.rating,
            title: draft.title.trim().to_string(),
            comment: draft.comment.trim().to_string(),
            is_verified,
            helpful_votes: 0,
            helpful_voters: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, draft: ReviewDraft) {
        self.rating = draft.rating;
        self.title = draft.title.trim().to_string();
        self.comment = draft.comment.trim().to_string();
        self.updated_at = Utc::now();
    }

    /// Returns false if `user_id` already voted.
    pub fn vote_helpful(&mut self, user_id: Uuid) -> bool {
        if self.helpful_voters.contains(&user_id) {
            return false;
        }
        self.helpful_voters.push(user_id);
        self.helpful_votes = self.helpful_voters.len() as u32;
        true
    }
}
