use crate::calendar;
use crate::types::{ClassId, DogId, TrainerId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Class
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Class {
    pub id: ClassId,
    /// Monday of the class's first week.
    pub start_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl Class {
    pub fn new(id: ClassId, start_date: NaiveDate) -> Self {
        Self {
            id,
            start_date: calendar::monday_of(start_date),
            created_at: Utc::now(),
        }
    }

    /// The Mondays this class occupies.
    pub fn weeks(&self, duration_weeks: u32) -> Vec<NaiveDate> {
        calendar::week_starts(self.start_date, duration_weeks)
    }
}

// ---------------------------------------------------------------------------
// ClassAssignment
// ---------------------------------------------------------------------------

/// Durable record of a dog/trainer pair belonging to a class, independent
/// of the weekly assignment rows the class materializes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassAssignment {
    pub class_id: ClassId,
    pub dog_id: DogId,
    pub trainer_id: TrainerId,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn class_start_is_normalized_to_monday() {
        let class = Class::new(ClassId(1), d(2024, 3, 6));
        assert_eq!(class.start_date, d(2024, 3, 4));
    }

    #[test]
    fn class_weeks_span_duration() {
        let class = Class::new(ClassId(1), d(2024, 3, 4));
        assert_eq!(class.weeks(2), vec![d(2024, 3, 4), d(2024, 3, 11)]);
    }
}
