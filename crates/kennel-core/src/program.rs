//! The operation surface consumed by the presentation layer. Every
//! mutation runs in one repository transaction (capacity check, write,
//! status recompute against a single snapshot) and recomputes the status
//! of every dog it touched.

use crate::calendar;
use crate::capacity;
use crate::class::{Class, ClassAssignment};
use crate::config::ProgramConfig;
use crate::dog::Dog;
use crate::error::{KennelError, Result};
use crate::forecast::{self, ForecastData};
use crate::lifecycle;
use crate::scheduler::{self, ClassSeat, DisplacedAction, SchedulePreview};
use crate::store::Repository;
use crate::trainer::Trainer;
use crate::types::{AssignmentType, ClassId, DogId, DogStatus, TrainerId};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ---------------------------------------------------------------------------
// Inputs and views
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NewAssignment {
    pub dog_id: DogId,
    pub trainer_id: Option<TrainerId>,
    pub week_start_date: NaiveDate,
    pub assignment_type: AssignmentType,
}

/// One dog entering the program through a recall.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecallDog {
    pub name: String,
    /// `None` means "trainer undecided": the dog is created without any
    /// assignments and surfaces through the recall rows.
    pub trainer_id: Option<TrainerId>,
    pub initial_training_weeks: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadyDog {
    pub dog_id: DogId,
    pub name: String,
    pub training_weeks: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct AvailableDog {
    pub dog_id: DogId,
    pub name: String,
    /// Effective status for the requested week, not the stored status.
    pub status_for_week: DogStatus,
}

// ---------------------------------------------------------------------------
// Program
// ---------------------------------------------------------------------------

pub struct Program<R: Repository> {
    repo: R,
    config: ProgramConfig,
    today: Option<NaiveDate>,
}

impl<R: Repository> Program<R> {
    pub fn new(repo: R, config: ProgramConfig) -> Self {
        Self {
            repo,
            config,
            today: None,
        }
    }

    /// Pin the evaluation date used for status derivation. Without this,
    /// operations derive against the wall clock.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn config(&self) -> &ProgramConfig {
        &self.config
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Utc::now().date_naive())
    }

    // -----------------------------------------------------------------------
    // Trainers
    // -----------------------------------------------------------------------

    pub fn create_trainer(&self, name: &str) -> Result<TrainerId> {
        validate_name(name)?;
        let id = self
            .repo
            .with_transaction(|t| Ok(t.create_trainer(name)))?;
        tracing::info!(trainer = %id, name, "trainer created");
        Ok(id)
    }

    pub fn rename_trainer(&self, id: TrainerId, name: &str) -> Result<()> {
        validate_name(name)?;
        self.repo.with_transaction(|t| {
            t.trainer_mut(id)?.name = name.to_string();
            Ok(())
        })
    }

    /// Removing a trainer keeps its assignment rows, orphaned to
    /// `trainer: None`; the dogs drop into the parking lot instead of
    /// losing their history.
    pub fn delete_trainer(&self, id: TrainerId) -> Result<()> {
        let today = self.today();
        let cfg = &self.config;
        let orphaned = self.repo.with_transaction(|t| {
            t.trainer(id)?;
            let mut affected = BTreeSet::new();
            for a in t.assignments.values_mut() {
                if a.trainer_id == Some(id) {
                    a.trainer_id = None;
                    affected.insert(a.dog_id);
                }
            }
            t.class_assignments.retain(|ca| ca.trainer_id != id);
            t.trainers.remove(&id);
            for dog_id in &affected {
                lifecycle::recompute(t, cfg, *dog_id, today)?;
            }
            Ok(affected.len())
        })?;
        tracing::info!(trainer = %id, orphaned, "trainer deleted");
        Ok(())
    }

    pub fn trainers(&self) -> Vec<Trainer> {
        self.repo.read(|t| {
            let mut list: Vec<Trainer> = t.trainers.values().cloned().collect();
            list.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
            list
        })
    }

    // -----------------------------------------------------------------------
    // Dogs
    // -----------------------------------------------------------------------

    pub fn create_dog(
        &self,
        name: &str,
        initial_training_weeks: u32,
        recall_week_start_date: Option<NaiveDate>,
    ) -> Result<DogId> {
        validate_name(name)?;
        validate_initial_weeks(&self.config, initial_training_weeks)?;
        let today = self.today();
        let cfg = &self.config;
        let id = self.repo.with_transaction(|t| {
            let id = t.create_dog(name, initial_training_weeks);
            if let Some(recall) = recall_week_start_date {
                t.dog_mut(id)?.recall_week_start_date = Some(calendar::monday_of(recall));
            }
            lifecycle::recompute(t, cfg, id, today)?;
            Ok(id)
        })?;
        tracing::info!(dog = %id, name, "dog created");
        Ok(id)
    }

    /// Editing the recall date is how an operator moves a dog back to
    /// not-yet-IFT; the recompute below re-derives it.
    pub fn update_dog(
        &self,
        id: DogId,
        name: &str,
        initial_training_weeks: u32,
        recall_week_start_date: Option<NaiveDate>,
    ) -> Result<DogStatus> {
        validate_name(name)?;
        validate_initial_weeks(&self.config, initial_training_weeks)?;
        let today = self.today();
        let cfg = &self.config;
        self.repo.with_transaction(|t| {
            let dog = t.dog_mut(id)?;
            dog.name = name.to_string();
            dog.initial_training_weeks = initial_training_weeks;
            dog.recall_week_start_date = recall_week_start_date.map(calendar::monday_of);
            dog.touch();
            lifecycle::recompute(t, cfg, id, today)
        })
    }

    pub fn delete_dog(&self, id: DogId) -> Result<()> {
        self.repo.with_transaction(|t| {
            t.dog(id)?;
            t.delete_assignments_for_dog(id);
            t.class_assignments.retain(|ca| ca.dog_id != id);
            t.dogs.remove(&id);
            Ok(())
        })?;
        tracing::info!(dog = %id, "dog deleted");
        Ok(())
    }

    /// Dropout is terminal. Assignments from the effective week on are
    /// deleted; the week defaults to the current one.
    pub fn mark_dropout(&self, id: DogId, effective: Option<NaiveDate>) -> Result<()> {
        let week = calendar::monday_of(effective.unwrap_or_else(|| self.today()));
        let removed = self.repo.with_transaction(|t| {
            t.dog(id)?;
            let removed = t.delete_assignments_from(id, week);
            let dog = t.dog_mut(id)?;
            dog.status = DogStatus::Dropout;
            dog.dropout_date = Some(week);
            dog.touch();
            Ok(removed)
        })?;
        tracing::info!(dog = %id, week = %week, removed, "dog dropped out");
        Ok(())
    }

    pub fn dog(&self, id: DogId) -> Result<Dog> {
        self.repo.read(|t| t.dog(id).cloned())
    }

    pub fn dogs(&self) -> Vec<Dog> {
        self.repo.read(|t| {
            let mut list: Vec<Dog> = t.dogs.values().cloned().collect();
            list.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
            list
        })
    }

    pub fn dog_training_weeks(&self, id: DogId) -> Result<u32> {
        self.repo.read(|t| {
            let dog = t.dog(id)?;
            Ok(dog.initial_training_weeks + t.training_weeks_through(id, NaiveDate::MAX))
        })
    }

    /// Dogs whose cumulative weeks before `as_of` meet the minimum.
    pub fn dogs_ready_for_class(&self, as_of: NaiveDate) -> Vec<ReadyDog> {
        let through = calendar::add_weeks(calendar::monday_of(as_of), -1);
        self.repo.read(|t| {
            let mut ready: Vec<ReadyDog> = t
                .dogs
                .values()
                .filter(|d| {
                    matches!(d.status, DogStatus::InTraining | DogStatus::ReadyForClass)
                })
                .map(|d| ReadyDog {
                    dog_id: d.id,
                    name: d.name.clone(),
                    training_weeks: d.initial_training_weeks
                        + t.training_weeks_through(d.id, through),
                })
                .filter(|r| r.training_weeks >= self.config.min_training_weeks)
                .collect();
            ready.sort_by(|a, b| a.name.cmp(&b.name));
            ready
        })
    }

    /// Dogs an operator could still place in the given week, with the
    /// status they effectively hold for that week.
    pub fn available_dogs_for_week(&self, week_start: NaiveDate) -> Vec<AvailableDog> {
        let week = calendar::monday_of(week_start);
        self.repo.read(|t| {
            let mut out = Vec::new();
            for dog in t.dogs.values() {
                if matches!(dog.status, DogStatus::Dropout | DogStatus::Graduated) {
                    continue;
                }
                if t.assignment_for_dog_week(dog.id, week).is_some() {
                    continue;
                }
                let recall = dog.recall_week_start_date.map(calendar::monday_of);
                if dog.status == DogStatus::NotYetIft && recall.is_some_and(|r| r > week) {
                    continue;
                }
                let earliest = t.earliest_assignment_week(dog.id);
                let status_for_week = if dog.status == DogStatus::NotYetIft
                    && recall.is_some_and(|r| r <= week)
                    && earliest.is_none()
                {
                    // Recall week arrived but nothing scheduled yet.
                    DogStatus::InTraining
                } else if earliest.is_some_and(|e| e <= week)
                    || recall.is_some_and(|r| r <= week)
                {
                    // Started, idle this week.
                    DogStatus::Paused
                } else {
                    dog.status
                };
                out.push(AvailableDog {
                    dog_id: dog.id,
                    name: dog.name.clone(),
                    status_for_week,
                });
            }
            out.sort_by(|a, b| a.name.cmp(&b.name));
            out
        })
    }

    // -----------------------------------------------------------------------
    // Recall scheduling
    // -----------------------------------------------------------------------

    /// Bring a batch of dogs into the program starting at `week_start`.
    /// Each dog with a trainer is scheduled for its remaining weeks up to
    /// the training minimum; every touched (trainer, week) is validated
    /// before anything is written, and one failure aborts the batch.
    pub fn schedule_recall(&self, week_start: NaiveDate, dogs: &[RecallDog]) -> Result<Vec<DogId>> {
        if dogs.is_empty() {
            return Err(KennelError::Validation(
                "at least one dog is required".to_string(),
            ));
        }
        for rd in dogs {
            validate_name(&rd.name)?;
            validate_initial_weeks(&self.config, rd.initial_training_weeks)?;
        }
        let week = calendar::monday_of(week_start);
        let today = self.today();
        let cfg = &self.config;

        let ids = self.repo.with_transaction(|t| {
            let mut planned: BTreeMap<(TrainerId, NaiveDate), u32> = BTreeMap::new();
            for rd in dogs {
                if let Some(trainer_id) = rd.trainer_id {
                    t.trainer(trainer_id)?;
                    let weeks_needed =
                        cfg.min_training_weeks.saturating_sub(rd.initial_training_weeks);
                    for w in 0..i64::from(weeks_needed) {
                        *planned
                            .entry((trainer_id, calendar::add_weeks(week, w)))
                            .or_default() += 1;
                    }
                }
            }

            for (&(trainer_id, w), &added) in &planned {
                let trainer_name = t.trainer(trainer_id)?.name.clone();
                let check =
                    capacity::check(t, cfg, trainer_id, w, AssignmentType::Training, None);
                if check.trainer_unavailable() {
                    return Err(KennelError::TrainerUnavailable {
                        trainer: trainer_name,
                        week: w,
                    });
                }
                if check.current_count + added > check.max_count {
                    return Err(KennelError::AtCapacity {
                        trainer: trainer_name,
                        week: w,
                        current: check.current_count + added,
                        max: check.max_count,
                    });
                }
            }

            let mut ids = Vec::with_capacity(dogs.len());
            for rd in dogs {
                let id = t.create_dog(&rd.name, rd.initial_training_weeks);
                t.dog_mut(id)?.recall_week_start_date = Some(week);
                if let Some(trainer_id) = rd.trainer_id {
                    let weeks_needed =
                        cfg.min_training_weeks.saturating_sub(rd.initial_training_weeks);
                    for w in 0..i64::from(weeks_needed) {
                        t.upsert_assignment(
                            id,
                            calendar::add_weeks(week, w),
                            Some(trainer_id),
                            AssignmentType::Training,
                        );
                    }
                }
                lifecycle::recompute(t, cfg, id, today)?;
                ids.push(id);
            }
            Ok(ids)
        })?;
        tracing::info!(count = ids.len(), week = %week, "recall scheduled");
        Ok(ids)
    }

    // -----------------------------------------------------------------------
    // Assignments
    // -----------------------------------------------------------------------

    pub fn create_assignment(
        &self,
        dog_id: DogId,
        trainer_id: Option<TrainerId>,
        week_start: NaiveDate,
        assignment_type: AssignmentType,
    ) -> Result<()> {
        let week = calendar::monday_of(week_start);
        let today = self.today();
        let cfg = &self.config;
        self.repo.with_transaction(|t| {
            t.dog(dog_id)?;
            if let Some(trainer_id) = trainer_id {
                let trainer_name = t.trainer(trainer_id)?.name.clone();
                if matches!(
                    assignment_type,
                    AssignmentType::Training | AssignmentType::Class
                ) {
                    let check = capacity::check(
                        t,
                        cfg,
                        trainer_id,
                        week,
                        assignment_type,
                        Some(dog_id),
                    );
                    if !check.valid {
                        return Err(check.to_error(&trainer_name, week));
                    }
                }
            }
            t.upsert_assignment(dog_id, week, trainer_id, assignment_type);
            lifecycle::recompute(t, cfg, dog_id, today)?;
            Ok(())
        })?;
        tracing::info!(dog = %dog_id, week = %week, kind = %assignment_type, "assignment upserted");
        Ok(())
    }

    pub fn delete_assignment(&self, dog_id: DogId, week_start: NaiveDate) -> Result<()> {
        let week = calendar::monday_of(week_start);
        let today = self.today();
        let cfg = &self.config;
        self.repo.with_transaction(|t| {
            t.dog(dog_id)?;
            t.delete_assignment(dog_id, week);
            lifecycle::recompute(t, cfg, dog_id, today)?;
            Ok(())
        })?;
        tracing::info!(dog = %dog_id, week = %week, "assignment deleted");
        Ok(())
    }

    /// Batch upsert with all-then-write validation: capacity is checked
    /// for every entry, counting the batch's own additions, before the
    /// first write, so a failure anywhere leaves nothing behind.
    pub fn bulk_create_assignments(&self, batch: &[NewAssignment]) -> Result<()> {
        if batch.is_empty() {
            return Err(KennelError::Validation(
                "at least one assignment is required".to_string(),
            ));
        }
        let today = self.today();
        let cfg = &self.config;
        self.repo.with_transaction(|t| {
            // Upsert semantics within the batch: last entry per dog/week wins.
            let mut dedup: BTreeMap<(DogId, NaiveDate), NewAssignment> = BTreeMap::new();
            for a in batch {
                let week = calendar::monday_of(a.week_start_date);
                dedup.insert(
                    (a.dog_id, week),
                    NewAssignment {
                        week_start_date: week,
                        ..*a
                    },
                );
            }

            let mut planned: BTreeMap<(TrainerId, NaiveDate, AssignmentType), u32> =
                BTreeMap::new();
            for ((dog_id, week), a) in &dedup {
                t.dog(*dog_id)?;
                let Some(trainer_id) = a.trainer_id else {
                    continue;
                };
                let trainer_name = t.trainer(trainer_id)?.name.clone();
                if !matches!(
                    a.assignment_type,
                    AssignmentType::Training | AssignmentType::Class
                ) {
                    continue;
                }
                // A class row planned by this very batch blocks training
                // rows for the same trainer/week.
                if a.assignment_type == AssignmentType::Training
                    && planned
                        .get(&(trainer_id, *week, AssignmentType::Class))
                        .copied()
                        .unwrap_or(0)
                        > 0
                {
                    return Err(KennelError::TrainerUnavailable {
                        trainer: trainer_name,
                        week: *week,
                    });
                }
                let check =
                    capacity::check(t, cfg, trainer_id, *week, a.assignment_type, Some(*dog_id));
                if check.trainer_unavailable() {
                    return Err(check.to_error(&trainer_name, *week));
                }
                let extra = planned
                    .get(&(trainer_id, *week, a.assignment_type))
                    .copied()
                    .unwrap_or(0);
                if check.current_count + extra >= check.max_count {
                    return Err(KennelError::AtCapacity {
                        trainer: trainer_name,
                        week: *week,
                        current: check.current_count + extra,
                        max: check.max_count,
                    });
                }
                *planned
                    .entry((trainer_id, *week, a.assignment_type))
                    .or_default() += 1;
            }

            let mut affected = BTreeSet::new();
            for ((dog_id, week), a) in &dedup {
                t.upsert_assignment(*dog_id, *week, a.trainer_id, a.assignment_type);
                affected.insert(*dog_id);
            }
            for dog_id in affected {
                lifecycle::recompute(t, cfg, dog_id, today)?;
            }
            Ok(())
        })?;
        tracing::info!(count = batch.len(), "assignments bulk created");
        Ok(())
    }

    /// Park a dog for one week: a trainerless paused row.
    pub fn move_to_parking_lot(&self, dog_id: DogId, week_start: NaiveDate) -> Result<()> {
        let week = calendar::monday_of(week_start);
        let today = self.today();
        let cfg = &self.config;
        self.repo.with_transaction(|t| {
            t.dog(dog_id)?;
            t.upsert_assignment(dog_id, week, None, AssignmentType::Paused);
            lifecycle::recompute(t, cfg, dog_id, today)?;
            Ok(())
        })?;
        tracing::info!(dog = %dog_id, week = %week, "dog parked");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Classes
    // -----------------------------------------------------------------------

    /// Phase one: read-only capacity check plus the displacement list.
    pub fn schedule_class(
        &self,
        start_date: NaiveDate,
        seats: &[ClassSeat],
    ) -> Result<SchedulePreview> {
        self.repo
            .read(|t| scheduler::preview(t, &self.config, start_date, seats))
    }

    /// Phase two: materialize the class and apply the caller's
    /// displacement resolutions.
    pub fn confirm_class(
        &self,
        start_date: NaiveDate,
        seats: &[ClassSeat],
        actions: &[DisplacedAction],
    ) -> Result<ClassId> {
        let today = self.today();
        let cfg = &self.config;
        let id = self
            .repo
            .with_transaction(|t| scheduler::commit(t, cfg, start_date, seats, actions, today))?;
        tracing::info!(class = %id, week = %calendar::monday_of(start_date), "class confirmed");
        Ok(id)
    }

    pub fn update_class(
        &self,
        class_id: ClassId,
        start_date: NaiveDate,
        seats: &[ClassSeat],
        actions: &[DisplacedAction],
    ) -> Result<()> {
        let today = self.today();
        let cfg = &self.config;
        self.repo.with_transaction(|t| {
            scheduler::update(t, cfg, class_id, start_date, seats, actions, today)
        })?;
        tracing::info!(class = %class_id, week = %calendar::monday_of(start_date), "class rescheduled");
        Ok(())
    }

    pub fn delete_class(&self, class_id: ClassId) -> Result<()> {
        let today = self.today();
        let cfg = &self.config;
        self.repo
            .with_transaction(|t| scheduler::delete(t, cfg, class_id, today))?;
        tracing::info!(class = %class_id, "class deleted");
        Ok(())
    }

    pub fn classes(&self) -> Vec<Class> {
        self.repo.read(|t| {
            let mut list: Vec<Class> = t.classes.values().cloned().collect();
            list.sort_by(|a, b| b.start_date.cmp(&a.start_date));
            list
        })
    }

    pub fn class_roster(&self, class_id: ClassId) -> Result<Vec<ClassAssignment>> {
        self.repo.read(|t| {
            t.class(class_id)?;
            Ok(t.roster(class_id))
        })
    }

    // -----------------------------------------------------------------------
    // Status sync
    // -----------------------------------------------------------------------

    pub fn sync_dog_status(&self, dog_id: DogId) -> Result<DogStatus> {
        let today = self.today();
        let cfg = &self.config;
        self.repo
            .with_transaction(|t| lifecycle::recompute(t, cfg, dog_id, today))
    }

    pub fn sync_all_dogs_status(&self) -> Result<()> {
        let today = self.today();
        let cfg = &self.config;
        self.repo
            .with_transaction(|t| lifecycle::recompute_all(t, cfg, today))?;
        tracing::info!("all dog statuses reconciled");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Forecast
    // -----------------------------------------------------------------------

    pub fn forecast(&self, start_date: NaiveDate, week_count: u32) -> ForecastData {
        self.repo
            .read(|t| forecast::project(t, &self.config, start_date, week_count))
    }
}

// ---------------------------------------------------------------------------
// Input validation
// ---------------------------------------------------------------------------

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(KennelError::Validation("name is required".to_string()));
    }
    if name.len() > 100 {
        return Err(KennelError::Validation(
            "name must be at most 100 characters".to_string(),
        ));
    }
    Ok(())
}

fn validate_initial_weeks(cfg: &ProgramConfig, weeks: u32) -> Result<()> {
    if weeks > cfg.max_training_weeks {
        return Err(KennelError::Validation(format!(
            "initial training weeks must be at most {}",
            cfg.max_training_weeks
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
