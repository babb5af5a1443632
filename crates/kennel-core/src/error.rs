use crate::types::{ClassId, DogId, TrainerId};
use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KennelError {
    #[error("dog not found: {0}")]
    DogNotFound(DogId),

    #[error("trainer not found: {0}")]
    TrainerNotFound(TrainerId),

    #[error("class not found: {0}")]
    ClassNotFound(ClassId),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("invalid week date '{0}': expected YYYY-MM-DD")]
    InvalidWeekDate(String),

    #[error("invalid dog status: {0}")]
    InvalidStatus(String),

    #[error("invalid assignment type: {0}")]
    InvalidAssignmentType(String),

    #[error("trainer {trainer} is at capacity for week {week}: {current}/{max}")]
    AtCapacity {
        trainer: String,
        week: NaiveDate,
        current: u32,
        max: u32,
    },

    #[error("trainer {trainer} is unavailable for week {week}: teaching a class")]
    TrainerUnavailable { trainer: String, week: NaiveDate },

    #[error("consistency violation: {0}")]
    Consistency(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl KennelError {
    /// Expected, caller-recoverable conditions (resubmit with different
    /// input). Everything else is either a missing reference or an
    /// internal failure and must not be retried.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            KennelError::Validation(_)
                | KennelError::InvalidWeekDate(_)
                | KennelError::AtCapacity { .. }
                | KennelError::TrainerUnavailable { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, KennelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_message_carries_counts() {
        let err = KennelError::AtCapacity {
            trainer: "Sam".to_string(),
            week: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            current: 6,
            max: 6,
        };
        let msg = err.to_string();
        assert!(msg.contains("Sam"));
        assert!(msg.contains("6/6"));
        assert!(msg.contains("2024-01-01"));
    }

    #[test]
    fn recoverable_classification() {
        assert!(KennelError::Validation("bad".into()).is_recoverable());
        assert!(KennelError::TrainerUnavailable {
            trainer: "Sam".into(),
            week: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        }
        .is_recoverable());
        assert!(!KennelError::DogNotFound(DogId(7)).is_recoverable());
        assert!(!KennelError::Consistency("dup".into()).is_recoverable());
    }
}
