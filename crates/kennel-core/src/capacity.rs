//! Per-trainer, per-week capacity rules.

use crate::calendar;
use crate::config::ProgramConfig;
use crate::error::KennelError;
use crate::store::Tables;
use crate::types::{AssignmentType, DogId, TrainerId};
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CapacityCheck {
    pub valid: bool,
    pub current_count: u32,
    pub max_count: u32,
}

impl CapacityCheck {
    /// `max_count == 0` is the hard case: the trainer is in class that
    /// week, not merely full.
    pub fn trainer_unavailable(&self) -> bool {
        !self.valid && self.max_count == 0
    }

    pub fn to_error(&self, trainer_name: &str, week_start: NaiveDate) -> KennelError {
        if self.trainer_unavailable() {
            KennelError::TrainerUnavailable {
                trainer: trainer_name.to_string(),
                week: week_start,
            }
        } else {
            KennelError::AtCapacity {
                trainer: trainer_name.to_string(),
                week: week_start,
                current: self.current_count,
                max: self.max_count,
            }
        }
    }
}

/// Decide whether `trainer` can take one more dog of the given type for
/// the week. `exclude_dog` re-validates a dog that is being moved rather
/// than added, so it does not count against itself.
///
/// Callers scheduling a span of weeks must run this once per affected
/// week; a trainer free in week 1 can be full or in class by week 7.
pub fn check(
    tables: &Tables,
    cfg: &ProgramConfig,
    trainer_id: TrainerId,
    week_start: NaiveDate,
    assignment_type: AssignmentType,
    exclude_dog: Option<DogId>,
) -> CapacityCheck {
    let week = calendar::monday_of(week_start);

    // A trainer teaching a class cannot take training dogs that week.
    if assignment_type == AssignmentType::Training
        && tables.count_for_trainer_week(trainer_id, week, AssignmentType::Class, None) > 0
    {
        return CapacityCheck {
            valid: false,
            current_count: 0,
            max_count: 0,
        };
    }

    let max_count = match assignment_type {
        AssignmentType::Training => cfg.max_training_dogs_per_trainer,
        AssignmentType::Class => cfg.max_class_dogs_per_trainer,
        // Parking-lot rows are uncapped.
        AssignmentType::Paused => {
            return CapacityCheck {
                valid: true,
                current_count: 0,
                max_count: u32::MAX,
            }
        }
    };

    let current_count = tables.count_for_trainer_week(trainer_id, week, assignment_type, exclude_dog);

    CapacityCheck {
        valid: current_count < max_count,
        current_count,
        max_count,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn full_trainer_is_invalid_at_exactly_max() {
        let mut t = Tables::new();
        let cfg = ProgramConfig::default();
        let tr = t.create_trainer("Sam");
        for i in 0..6 {
            let dog = t.create_dog(format!("dog-{i}"), 0);
            t.upsert_assignment(dog, d(2024, 1, 1), Some(tr), AssignmentType::Training);
        }

        let check = check(&t, &cfg, tr, d(2024, 1, 1), AssignmentType::Training, None);
        assert_eq!(
            check,
            CapacityCheck {
                valid: false,
                current_count: 6,
                max_count: 6
            }
        );
        assert!(!check.trainer_unavailable());
    }

    #[test]
    fn one_below_max_is_valid() {
        let mut t = Tables::new();
        let cfg = ProgramConfig::default();
        let tr = t.create_trainer("Sam");
        for i in 0..5 {
            let dog = t.create_dog(format!("dog-{i}"), 0);
            t.upsert_assignment(dog, d(2024, 1, 1), Some(tr), AssignmentType::Training);
        }
        let check = check(&t, &cfg, tr, d(2024, 1, 1), AssignmentType::Training, None);
        assert!(check.valid);
        assert_eq!(check.current_count, 5);
    }

    #[test]
    fn class_week_blocks_training_regardless_of_count() {
        let mut t = Tables::new();
        let cfg = ProgramConfig::default();
        let tr = t.create_trainer("Sam");
        let dog = t.create_dog("ClassDog", 0);
        t.upsert_assignment(dog, d(2024, 1, 1), Some(tr), AssignmentType::Class);

        let check = check(&t, &cfg, tr, d(2024, 1, 1), AssignmentType::Training, None);
        assert!(!check.valid);
        assert_eq!(check.max_count, 0);
        assert!(check.trainer_unavailable());

        // The adjacent week is unaffected.
        let next = check_next_week(&t, &cfg, tr);
        assert!(next.valid);
    }

    fn check_next_week(t: &Tables, cfg: &ProgramConfig, tr: TrainerId) -> CapacityCheck {
        check(t, cfg, tr, d(2024, 1, 8), AssignmentType::Training, None)
    }

    #[test]
    fn class_capacity_uses_class_limit() {
        let mut t = Tables::new();
        let cfg = ProgramConfig::default();
        let tr = t.create_trainer("Sam");
        for i in 0..cfg.max_class_dogs_per_trainer {
            let dog = t.create_dog(format!("dog-{i}"), 0);
            t.upsert_assignment(dog, d(2024, 1, 1), Some(tr), AssignmentType::Class);
        }
        let check = check(&t, &cfg, tr, d(2024, 1, 1), AssignmentType::Class, None);
        assert!(!check.valid);
        assert_eq!(check.max_count, cfg.max_class_dogs_per_trainer);
    }

    #[test]
    fn exclude_dog_frees_its_own_slot() {
        let mut t = Tables::new();
        let cfg = ProgramConfig::default();
        let tr = t.create_trainer("Sam");
        let mut moved = None;
        for i in 0..6 {
            let dog = t.create_dog(format!("dog-{i}"), 0);
            t.upsert_assignment(dog, d(2024, 1, 1), Some(tr), AssignmentType::Training);
            moved.get_or_insert(dog);
        }

        let check = check(
            &t,
            &cfg,
            tr,
            d(2024, 1, 1),
            AssignmentType::Training,
            moved,
        );
        assert!(check.valid);
        assert_eq!(check.current_count, 5);
    }

    #[test]
    fn error_shape_matches_failure_mode() {
        let soft = CapacityCheck {
            valid: false,
            current_count: 6,
            max_count: 6,
        };
        assert!(matches!(
            soft.to_error("Sam", d(2024, 1, 1)),
            KennelError::AtCapacity { current: 6, max: 6, .. }
        ));

        let hard = CapacityCheck {
            valid: false,
            current_count: 0,
            max_count: 0,
        };
        assert!(matches!(
            hard.to_error("Sam", d(2024, 1, 1)),
            KennelError::TrainerUnavailable { .. }
        ));
    }
}
