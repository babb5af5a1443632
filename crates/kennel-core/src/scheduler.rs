//! Class scheduling: validate, surface displaced training dogs, commit.
//!
//! The workflow is two-phase. `preview` is read-only and tells the caller
//! whether the class fits and which training dogs would lose their slot;
//! `commit` materializes the class after the caller has resolved every
//! displacement.

use crate::calendar;
use crate::class::ClassAssignment;
use crate::config::ProgramConfig;
use crate::error::{KennelError, Result};
use crate::lifecycle;
use crate::store::Tables;
use crate::types::{AssignmentType, ClassId, DisplacedResolution, DogId, TrainerId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ---------------------------------------------------------------------------
// Inputs and outputs
// ---------------------------------------------------------------------------

/// One requested dog/trainer pairing for a class.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClassSeat {
    pub dog_id: DogId,
    pub trainer_id: TrainerId,
}

/// A training dog that would lose its trainer to a class week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplacedDog {
    pub dog_id: DogId,
    pub dog_name: String,
    pub trainer_id: TrainerId,
    pub trainer_name: String,
    pub week_start_date: NaiveDate,
}

/// The caller's decision for one displaced dog/week.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DisplacedAction {
    pub dog_id: DogId,
    pub week_start_date: NaiveDate,
    pub resolution: DisplacedResolution,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchedulePreview {
    pub valid: bool,
    pub errors: Vec<String>,
    pub displaced_dogs: Vec<DisplacedDog>,
}

// ---------------------------------------------------------------------------
// Validate
// ---------------------------------------------------------------------------

/// Per-trainer headcount against the class limit. Returns human-readable
/// errors; nothing is written on failure or success.
pub fn validate(
    tables: &Tables,
    cfg: &ProgramConfig,
    start_date: NaiveDate,
    seats: &[ClassSeat],
) -> Result<Vec<String>> {
    if seats.is_empty() {
        return Err(KennelError::Validation(
            "at least one dog/trainer pair is required".to_string(),
        ));
    }
    let start = calendar::monday_of(start_date);

    for seat in seats {
        tables.dog(seat.dog_id)?;
        tables.trainer(seat.trainer_id)?;
    }

    let mut errors = Vec::new();
    let trainer_ids: BTreeSet<TrainerId> = seats.iter().map(|s| s.trainer_id).collect();
    for trainer_id in trainer_ids {
        let count = seats.iter().filter(|s| s.trainer_id == trainer_id).count() as u32;
        if count > cfg.max_class_dogs_per_trainer {
            let trainer = tables.trainer(trainer_id)?;
            errors.push(format!(
                "trainer {} has {} dogs assigned for the {} class (max {})",
                trainer.name,
                count,
                calendar::format_week_date(start),
                cfg.max_class_dogs_per_trainer
            ));
        }
    }
    Ok(errors)
}

// ---------------------------------------------------------------------------
// Displacement
// ---------------------------------------------------------------------------

/// Training rows that collide with the class weeks. Dogs in the class's
/// own seat list are excluded globally, not per trainer: a class dog that
/// previously trained under a *different* class trainer the same week is
/// not displaced, its row is simply overwritten by the class.
pub fn find_displaced(
    tables: &Tables,
    cfg: &ProgramConfig,
    start_date: NaiveDate,
    seats: &[ClassSeat],
) -> Result<Vec<DisplacedDog>> {
    let start = calendar::monday_of(start_date);
    let class_dogs: BTreeSet<DogId> = seats.iter().map(|s| s.dog_id).collect();
    let trainer_ids: BTreeSet<TrainerId> = seats.iter().map(|s| s.trainer_id).collect();

    let mut displaced = Vec::new();
    for w in 0..i64::from(cfg.class_duration_weeks) {
        let week = calendar::add_weeks(start, w);
        for &trainer_id in &trainer_ids {
            for a in tables.find_for_trainer_week(trainer_id, week) {
                if a.assignment_type != AssignmentType::Training
                    || class_dogs.contains(&a.dog_id)
                {
                    continue;
                }
                let dog = tables.dogs.get(&a.dog_id).ok_or_else(|| {
                    KennelError::Consistency(format!(
                        "assignment for week {week} references missing dog {}",
                        a.dog_id
                    ))
                })?;
                let trainer = tables.trainer(trainer_id)?;
                displaced.push(DisplacedDog {
                    dog_id: dog.id,
                    dog_name: dog.name.clone(),
                    trainer_id,
                    trainer_name: trainer.name.clone(),
                    week_start_date: week,
                });
            }
        }
    }
    Ok(displaced)
}

/// The read-only first phase: capacity errors, or the displacement list.
pub fn preview(
    tables: &Tables,
    cfg: &ProgramConfig,
    start_date: NaiveDate,
    seats: &[ClassSeat],
) -> Result<SchedulePreview> {
    let errors = validate(tables, cfg, start_date, seats)?;
    if !errors.is_empty() {
        return Ok(SchedulePreview {
            valid: false,
            errors,
            displaced_dogs: Vec::new(),
        });
    }
    Ok(SchedulePreview {
        valid: true,
        errors: Vec::new(),
        displaced_dogs: find_displaced(tables, cfg, start_date, seats)?,
    })
}

// ---------------------------------------------------------------------------
// Commit / update / delete
// ---------------------------------------------------------------------------

/// Write the roster rows, the per-week class assignments, and the
/// displacement resolutions for one class. Returns every dog whose
/// status needs recomputing.
fn apply_seats(
    tables: &mut Tables,
    cfg: &ProgramConfig,
    class_id: ClassId,
    start: NaiveDate,
    seats: &[ClassSeat],
    actions: &[DisplacedAction],
) -> BTreeSet<DogId> {
    let class_dogs: BTreeSet<DogId> = seats.iter().map(|s| s.dog_id).collect();

    for seat in seats {
        tables.class_assignments.push(ClassAssignment {
            class_id,
            dog_id: seat.dog_id,
            trainer_id: seat.trainer_id,
        });
        for w in 0..i64::from(cfg.class_duration_weeks) {
            tables.upsert_assignment(
                seat.dog_id,
                calendar::add_weeks(start, w),
                Some(seat.trainer_id),
                AssignmentType::Class,
            );
        }
    }

    let mut affected = class_dogs.clone();
    for action in actions {
        // The class row always wins over a displacement resolution.
        if class_dogs.contains(&action.dog_id) {
            continue;
        }
        match action.resolution {
            DisplacedResolution::Pause => tables.upsert_assignment(
                action.dog_id,
                action.week_start_date,
                None,
                AssignmentType::Paused,
            ),
            DisplacedResolution::Remove => {
                tables.delete_assignment(action.dog_id, action.week_start_date);
            }
        }
        affected.insert(action.dog_id);
    }
    affected
}

pub fn commit(
    tables: &mut Tables,
    cfg: &ProgramConfig,
    start_date: NaiveDate,
    seats: &[ClassSeat],
    actions: &[DisplacedAction],
    today: NaiveDate,
) -> Result<ClassId> {
    let errors = validate(tables, cfg, start_date, seats)?;
    if !errors.is_empty() {
        return Err(KennelError::Validation(errors.join("; ")));
    }
    let start = calendar::monday_of(start_date);

    let class_id = tables.create_class(start);
    let affected = apply_seats(tables, cfg, class_id, start, seats, actions);
    for dog_id in affected {
        lifecycle::recompute(tables, cfg, dog_id, today)?;
    }
    Ok(class_id)
}

/// Reschedule an existing class. Teardown runs against the class's OLD
/// stored start date; recreation runs against the new one.
pub fn update(
    tables: &mut Tables,
    cfg: &ProgramConfig,
    class_id: ClassId,
    new_start_date: NaiveDate,
    seats: &[ClassSeat],
    actions: &[DisplacedAction],
    today: NaiveDate,
) -> Result<()> {
    let errors = validate(tables, cfg, new_start_date, seats)?;
    if !errors.is_empty() {
        return Err(KennelError::Validation(errors.join("; ")));
    }
    let new_start = calendar::monday_of(new_start_date);
    let old_start = tables.class(class_id)?.start_date;

    let old_roster = tables.roster(class_id);
    let mut affected: BTreeSet<DogId> = old_roster.iter().map(|ca| ca.dog_id).collect();
    for ca in &old_roster {
        for w in 0..i64::from(cfg.class_duration_weeks) {
            tables.delete_assignment(ca.dog_id, calendar::add_weeks(old_start, w));
        }
    }
    tables.remove_roster(class_id);
    tables.class_mut(class_id)?.start_date = new_start;

    affected.extend(apply_seats(tables, cfg, class_id, new_start, seats, actions));
    for dog_id in affected {
        lifecycle::recompute(tables, cfg, dog_id, today)?;
    }
    Ok(())
}

pub fn delete(
    tables: &mut Tables,
    cfg: &ProgramConfig,
    class_id: ClassId,
    today: NaiveDate,
) -> Result<()> {
    let start = tables.class(class_id)?.start_date;
    let roster = tables.roster(class_id);

    for ca in &roster {
        for w in 0..i64::from(cfg.class_duration_weeks) {
            tables.delete_assignment(ca.dog_id, calendar::add_weeks(start, w));
        }
    }
    tables.remove_roster(class_id);
    tables.classes.remove(&class_id);

    for ca in &roster {
        lifecycle::recompute(tables, cfg, ca.dog_id, today)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DogStatus;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn seat(dog_id: DogId, trainer_id: TrainerId) -> ClassSeat {
        ClassSeat { dog_id, trainer_id }
    }

    #[test]
    fn validate_rejects_empty_seat_list() {
        let t = Tables::new();
        let cfg = ProgramConfig::default();
        assert!(matches!(
            validate(&t, &cfg, d(2024, 3, 4), &[]),
            Err(KennelError::Validation(_))
        ));
    }

    #[test]
    fn validate_reports_overloaded_trainer() {
        let mut t = Tables::new();
        let cfg = ProgramConfig::default();
        let tr = t.create_trainer("Sam");
        let seats: Vec<ClassSeat> = (0..cfg.max_class_dogs_per_trainer + 1)
            .map(|i| seat(t.create_dog(format!("dog-{i}"), 14), tr))
            .collect();

        let errors = validate(&t, &cfg, d(2024, 3, 4), &seats).unwrap();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Sam"));
        assert!(errors[0].contains("max 3"));
    }

    #[test]
    fn validate_fails_whole_operation_on_unknown_trainer() {
        let mut t = Tables::new();
        let cfg = ProgramConfig::default();
        let dog = t.create_dog("Biscuit", 14);
        assert!(matches!(
            validate(&t, &cfg, d(2024, 3, 4), &[seat(dog, TrainerId(99))]),
            Err(KennelError::TrainerNotFound(TrainerId(99)))
        ));
    }

    #[test]
    fn displaced_reported_for_every_class_week() {
        let mut t = Tables::new();
        let cfg = ProgramConfig::default();
        let t2 = t.create_trainer("T2");
        let class_dog = t.create_dog("ClassDog", 14);
        let d2 = t.create_dog("D2", 4);
        let start = d(2024, 3, 4);
        // D2 trains with T2 for both class weeks but is not in the class.
        t.upsert_assignment(d2, start, Some(t2), AssignmentType::Training);
        t.upsert_assignment(d2, d(2024, 3, 11), Some(t2), AssignmentType::Training);

        let displaced = find_displaced(&t, &cfg, start, &[seat(class_dog, t2)]).unwrap();
        assert_eq!(displaced.len(), 2);
        assert!(displaced.iter().all(|x| x.dog_id == d2 && x.trainer_id == t2));
        let weeks: Vec<NaiveDate> = displaced.iter().map(|x| x.week_start_date).collect();
        assert_eq!(weeks, vec![start, d(2024, 3, 11)]);
    }

    #[test]
    fn class_dog_with_other_class_trainer_is_not_displaced() {
        let mut t = Tables::new();
        let cfg = ProgramConfig::default();
        let t1 = t.create_trainer("T1");
        let t2 = t.create_trainer("T2");
        let a = t.create_dog("A", 14);
        let b = t.create_dog("B", 14);
        let start = d(2024, 3, 4);
        // A previously trained with T2, but both A and B are in the class
        // (A under T1): A must not be flagged.
        t.upsert_assignment(a, start, Some(t2), AssignmentType::Training);

        let displaced =
            find_displaced(&t, &cfg, start, &[seat(a, t1), seat(b, t2)]).unwrap();
        assert!(displaced.is_empty());
    }

    #[test]
    fn commit_materializes_all_class_weeks_and_roster() {
        let mut t = Tables::new();
        let cfg = ProgramConfig::default();
        let tr = t.create_trainer("Sam");
        let dog = t.create_dog("Biscuit", 14);
        let start = d(2024, 3, 4);

        let class_id = commit(&mut t, &cfg, start, &[seat(dog, tr)], &[], start).unwrap();

        assert_eq!(t.roster(class_id).len(), 1);
        for w in 0..2 {
            let a = t
                .assignment_for_dog_week(dog, calendar::add_weeks(start, w))
                .unwrap();
            assert_eq!(a.assignment_type, AssignmentType::Class);
            assert_eq!(a.trainer_id, Some(tr));
        }
        assert_eq!(t.dog(dog).unwrap().status, DogStatus::InClass);
    }

    #[test]
    fn commit_refuses_over_capacity_seats() {
        let mut t = Tables::new();
        let cfg = ProgramConfig::default();
        let tr = t.create_trainer("Sam");
        let seats: Vec<ClassSeat> = (0..cfg.max_class_dogs_per_trainer + 1)
            .map(|i| seat(t.create_dog(format!("dog-{i}"), 14), tr))
            .collect();

        let err = commit(&mut t, &cfg, d(2024, 3, 4), &seats, &[], d(2024, 3, 4)).unwrap_err();
        assert!(matches!(err, KennelError::Validation(_)));
        assert!(t.classes.is_empty());
    }

    #[test]
    fn pause_resolution_keeps_trainerless_row_and_pauses_dog() {
        let mut t = Tables::new();
        let cfg = ProgramConfig::default();
        let t2 = t.create_trainer("T2");
        let class_dog = t.create_dog("ClassDog", 14);
        let d2 = t.create_dog("D2", 4);
        let start = d(2024, 3, 4);
        let week2 = d(2024, 3, 11);
        t.upsert_assignment(d2, start, Some(t2), AssignmentType::Training);
        t.upsert_assignment(d2, week2, Some(t2), AssignmentType::Training);

        let actions = [
            DisplacedAction {
                dog_id: d2,
                week_start_date: start,
                resolution: DisplacedResolution::Pause,
            },
            DisplacedAction {
                dog_id: d2,
                week_start_date: week2,
                resolution: DisplacedResolution::Pause,
            },
        ];
        commit(&mut t, &cfg, start, &[seat(class_dog, t2)], &actions, start).unwrap();

        for week in [start, week2] {
            let a = t.assignment_for_dog_week(d2, week).unwrap();
            assert_eq!(a.trainer_id, None);
            assert_eq!(a.assignment_type, AssignmentType::Paused);
        }
        assert_eq!(t.dog(d2).unwrap().status, DogStatus::Paused);
    }

    #[test]
    fn remove_resolution_deletes_the_row() {
        let mut t = Tables::new();
        let cfg = ProgramConfig::default();
        let t2 = t.create_trainer("T2");
        let class_dog = t.create_dog("ClassDog", 14);
        let d2 = t.create_dog("D2", 4);
        let start = d(2024, 3, 4);
        t.upsert_assignment(d2, start, Some(t2), AssignmentType::Training);

        let actions = [DisplacedAction {
            dog_id: d2,
            week_start_date: start,
            resolution: DisplacedResolution::Remove,
        }];
        commit(&mut t, &cfg, start, &[seat(class_dog, t2)], &actions, start).unwrap();

        assert!(t.assignment_for_dog_week(d2, start).is_none());
    }

    #[test]
    fn resolution_never_overwrites_a_class_dog() {
        let mut t = Tables::new();
        let cfg = ProgramConfig::default();
        let tr = t.create_trainer("Sam");
        let dog = t.create_dog("Biscuit", 14);
        let start = d(2024, 3, 4);

        // A stale action targeting a dog that ended up in the class.
        let actions = [DisplacedAction {
            dog_id: dog,
            week_start_date: start,
            resolution: DisplacedResolution::Remove,
        }];
        commit(&mut t, &cfg, start, &[seat(dog, tr)], &actions, start).unwrap();

        let a = t.assignment_for_dog_week(dog, start).unwrap();
        assert_eq!(a.assignment_type, AssignmentType::Class);
    }

    #[test]
    fn update_tears_down_old_weeks_and_builds_new() {
        let mut t = Tables::new();
        let cfg = ProgramConfig::default();
        let tr = t.create_trainer("Sam");
        let dog = t.create_dog("Biscuit", 14);
        let old_start = d(2024, 3, 4);
        let new_start = d(2024, 4, 1);

        let class_id =
            commit(&mut t, &cfg, old_start, &[seat(dog, tr)], &[], old_start).unwrap();
        update(
            &mut t,
            &cfg,
            class_id,
            new_start,
            &[seat(dog, tr)],
            &[],
            old_start,
        )
        .unwrap();

        assert!(t.assignment_for_dog_week(dog, old_start).is_none());
        assert!(t.assignment_for_dog_week(dog, d(2024, 3, 11)).is_none());
        for w in 0..2 {
            let a = t
                .assignment_for_dog_week(dog, calendar::add_weeks(new_start, w))
                .unwrap();
            assert_eq!(a.assignment_type, AssignmentType::Class);
        }
        assert_eq!(t.class(class_id).unwrap().start_date, new_start);
    }

    #[test]
    fn update_can_drop_a_dog_from_the_roster() {
        let mut t = Tables::new();
        let cfg = ProgramConfig::default();
        let tr = t.create_trainer("Sam");
        let kept = t.create_dog("Kept", 14);
        let dropped = t.create_dog("Dropped", 14);
        let start = d(2024, 3, 4);

        let class_id = commit(
            &mut t,
            &cfg,
            start,
            &[seat(kept, tr), seat(dropped, tr)],
            &[],
            start,
        )
        .unwrap();
        update(&mut t, &cfg, class_id, start, &[seat(kept, tr)], &[], start).unwrap();

        assert!(t.assignment_for_dog_week(dropped, start).is_none());
        assert!(t.assignment_for_dog_week(kept, start).is_some());
        assert_eq!(t.roster(class_id).len(), 1);
        // The dropped dog is no longer in class.
        assert_eq!(t.dog(dropped).unwrap().status, DogStatus::ReadyForClass);
    }

    #[test]
    fn delete_removes_rows_roster_and_class() {
        let mut t = Tables::new();
        let cfg = ProgramConfig::default();
        let tr = t.create_trainer("Sam");
        let dog = t.create_dog("Biscuit", 14);
        let start = d(2024, 3, 4);

        let class_id = commit(&mut t, &cfg, start, &[seat(dog, tr)], &[], start).unwrap();
        delete(&mut t, &cfg, class_id, start).unwrap();

        assert!(t.classes.is_empty());
        assert!(t.class_assignments.is_empty());
        assert!(t.assignment_for_dog_week(dog, start).is_none());
        assert_eq!(t.dog(dog).unwrap().status, DogStatus::ReadyForClass);
    }

    #[test]
    fn delete_unknown_class_errors() {
        let mut t = Tables::new();
        let cfg = ProgramConfig::default();
        assert!(matches!(
            delete(&mut t, &cfg, ClassId(9), d(2024, 3, 4)),
            Err(KennelError::ClassNotFound(ClassId(9)))
        ));
    }
}
