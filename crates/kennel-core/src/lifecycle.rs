//! Status derivation. A dog's status is a cached field recomputed from
//! its assignment history and lifecycle dates; nothing else may write it.

use crate::calendar;
use crate::config::ProgramConfig;
use crate::dog::Dog;
use crate::error::Result;
use crate::store::Tables;
use crate::types::{AssignmentType, DogId, DogStatus};
use chrono::NaiveDate;

/// Derive the status a dog should have as of `today`. Pure: reads stored
/// facts, writes nothing.
///
/// Order matters: dropout is terminal, a future recall date overrides
/// everything else (editing the recall date moves a dog back to
/// not-yet-IFT), an active or finished class overrides training progress,
/// and only then do cumulative training weeks decide readiness.
pub fn derive_status(
    tables: &Tables,
    cfg: &ProgramConfig,
    dog: &Dog,
    today: NaiveDate,
) -> DogStatus {
    if dog.status.is_terminal() {
        return DogStatus::Dropout;
    }

    let current_week = calendar::monday_of(today);

    if let Some(recall) = dog.recall_week_start_date {
        if calendar::monday_of(recall) > current_week {
            return DogStatus::NotYetIft;
        }
    }

    let latest_class_week = tables
        .assignments_for_dog(dog.id)
        .filter(|a| a.assignment_type == AssignmentType::Class && a.week_start_date <= current_week)
        .map(|a| a.week_start_date)
        .max();
    if let Some(class_week) = latest_class_week {
        let class_end = calendar::add_weeks(class_week, i64::from(cfg.class_duration_weeks));
        return if current_week >= class_end {
            DogStatus::Graduated
        } else {
            DogStatus::InClass
        };
    }

    let ever_trained = tables
        .assignments_for_dog(dog.id)
        .any(|a| a.assignment_type == AssignmentType::Training);
    if !ever_trained {
        return if dog.initial_training_weeks >= cfg.min_training_weeks {
            DogStatus::ReadyForClass
        } else {
            DogStatus::Paused
        };
    }

    let completed_weeks =
        dog.initial_training_weeks + tables.training_weeks_through(dog.id, current_week);
    if completed_weeks >= cfg.min_training_weeks {
        return DogStatus::ReadyForClass;
    }

    let training_this_week = tables
        .assignment_for_dog_week(dog.id, current_week)
        .map(|a| a.assignment_type == AssignmentType::Training)
        .unwrap_or(false);
    if training_this_week {
        DogStatus::InTraining
    } else {
        DogStatus::Paused
    }
}

/// Recompute and store one dog's status. Idempotent: with no intervening
/// writes a second call derives the same value.
pub fn recompute(
    tables: &mut Tables,
    cfg: &ProgramConfig,
    dog_id: DogId,
    today: NaiveDate,
) -> Result<DogStatus> {
    let dog = tables.dog(dog_id)?.clone();
    let status = derive_status(tables, cfg, &dog, today);
    if status != dog.status {
        let stored = tables.dog_mut(dog_id)?;
        stored.status = status;
        stored.touch();
    }
    Ok(status)
}

/// Operator-triggered reconciliation across every dog.
pub fn recompute_all(tables: &mut Tables, cfg: &ProgramConfig, today: NaiveDate) -> Result<()> {
    let ids: Vec<DogId> = tables.dogs.keys().copied().collect();
    for id in ids {
        recompute(tables, cfg, id, today)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
