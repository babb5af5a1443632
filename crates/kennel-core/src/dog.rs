use crate::types::{DogId, DogStatus};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Dog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dog {
    pub id: DogId,
    pub name: String,
    /// Training weeks credited before the dog entered this system.
    pub initial_training_weeks: u32,
    /// Cached derivation. Written only by the lifecycle engine (and the
    /// dropout operation, which it treats as terminal input).
    pub status: DogStatus,
    /// Monday the dog is (or was) recalled into formal training.
    pub recall_week_start_date: Option<NaiveDate>,
    /// Monday the dropout takes effect; assignments from here on are gone.
    pub dropout_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Dog {
    pub fn new(id: DogId, name: impl Into<String>, initial_training_weeks: u32) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            initial_training_weeks,
            status: DogStatus::Paused,
            recall_week_start_date: None,
            dropout_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
