//! Entity tables and the repository seam.
//!
//! Assignments are keyed by `(dog, week)` so the one-row-per-dog-week
//! invariant holds by construction and upsert is create-or-replace. All
//! week parameters are normalized to Monday before touching a map.

use crate::calendar;
use crate::class::{Class, ClassAssignment};
use crate::dog::Dog;
use crate::error::{KennelError, Result};
use crate::trainer::Trainer;
use crate::types::{AssignmentType, ClassId, DogId, TrainerId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// Assignment
// ---------------------------------------------------------------------------

/// One dog/week slot. `trainer_id: None` is a parking-lot row: the dog is
/// on the board for that week without a trainer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub dog_id: DogId,
    pub week_start_date: NaiveDate,
    pub trainer_id: Option<TrainerId>,
    pub assignment_type: AssignmentType,
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct Tables {
    pub dogs: BTreeMap<DogId, Dog>,
    pub trainers: BTreeMap<TrainerId, Trainer>,
    pub assignments: BTreeMap<(DogId, NaiveDate), Assignment>,
    pub classes: BTreeMap<ClassId, Class>,
    pub class_assignments: Vec<ClassAssignment>,
    next_dog_id: u32,
    next_trainer_id: u32,
    next_class_id: u32,
}

impl Tables {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Entity accessors
    // -----------------------------------------------------------------------

    pub fn dog(&self, id: DogId) -> Result<&Dog> {
        self.dogs.get(&id).ok_or(KennelError::DogNotFound(id))
    }

    pub fn dog_mut(&mut self, id: DogId) -> Result<&mut Dog> {
        self.dogs.get_mut(&id).ok_or(KennelError::DogNotFound(id))
    }

    pub fn trainer(&self, id: TrainerId) -> Result<&Trainer> {
        self.trainers
            .get(&id)
            .ok_or(KennelError::TrainerNotFound(id))
    }

    pub fn trainer_mut(&mut self, id: TrainerId) -> Result<&mut Trainer> {
        self.trainers
            .get_mut(&id)
            .ok_or(KennelError::TrainerNotFound(id))
    }

    pub fn class(&self, id: ClassId) -> Result<&Class> {
        self.classes.get(&id).ok_or(KennelError::ClassNotFound(id))
    }

    pub fn class_mut(&mut self, id: ClassId) -> Result<&mut Class> {
        self.classes
            .get_mut(&id)
            .ok_or(KennelError::ClassNotFound(id))
    }

    pub fn create_dog(&mut self, name: impl Into<String>, initial_training_weeks: u32) -> DogId {
        self.next_dog_id += 1;
        let id = DogId(self.next_dog_id);
        self.dogs.insert(id, Dog::new(id, name, initial_training_weeks));
        id
    }

    pub fn create_trainer(&mut self, name: impl Into<String>) -> TrainerId {
        self.next_trainer_id += 1;
        let id = TrainerId(self.next_trainer_id);
        self.trainers.insert(id, Trainer::new(id, name));
        id
    }

    pub fn create_class(&mut self, start_date: NaiveDate) -> ClassId {
        self.next_class_id += 1;
        let id = ClassId(self.next_class_id);
        self.classes.insert(id, Class::new(id, start_date));
        id
    }

    // -----------------------------------------------------------------------
    // Assignment store
    // -----------------------------------------------------------------------

    /// Create-or-replace the row for `(dog, week)`.
    pub fn upsert_assignment(
        &mut self,
        dog_id: DogId,
        week_start: NaiveDate,
        trainer_id: Option<TrainerId>,
        assignment_type: AssignmentType,
    ) {
        let week = calendar::monday_of(week_start);
        self.assignments.insert(
            (dog_id, week),
            Assignment {
                dog_id,
                week_start_date: week,
                trainer_id,
                assignment_type,
            },
        );
    }

    /// Returns true if a row existed.
    pub fn delete_assignment(&mut self, dog_id: DogId, week_start: NaiveDate) -> bool {
        let week = calendar::monday_of(week_start);
        self.assignments.remove(&(dog_id, week)).is_some()
    }

    /// Delete the given week and every later week for the dog. Used for
    /// dropout and for recall-date edits. Returns the number removed.
    pub fn delete_assignments_from(&mut self, dog_id: DogId, week_start: NaiveDate) -> usize {
        let week = calendar::monday_of(week_start);
        let keys: Vec<_> = self
            .assignments
            .range((dog_id, week)..=(dog_id, NaiveDate::MAX))
            .map(|(k, _)| *k)
            .collect();
        for k in &keys {
            self.assignments.remove(k);
        }
        keys.len()
    }

    /// Delete every row for the dog. Returns the number removed.
    pub fn delete_assignments_for_dog(&mut self, dog_id: DogId) -> usize {
        let keys: Vec<_> = self
            .assignments
            .range((dog_id, NaiveDate::MIN)..=(dog_id, NaiveDate::MAX))
            .map(|(k, _)| *k)
            .collect();
        for k in &keys {
            self.assignments.remove(k);
        }
        keys.len()
    }

    pub fn assignments_for_dog(&self, dog_id: DogId) -> impl Iterator<Item = &Assignment> {
        self.assignments
            .range((dog_id, NaiveDate::MIN)..=(dog_id, NaiveDate::MAX))
            .map(|(_, a)| a)
    }

    pub fn assignment_for_dog_week(&self, dog_id: DogId, week_start: NaiveDate) -> Option<&Assignment> {
        self.assignments
            .get(&(dog_id, calendar::monday_of(week_start)))
    }

    /// Rows for one dog in `[from, to)`, weeks normalized.
    pub fn find_for_dog_range(
        &self,
        dog_id: DogId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Vec<&Assignment> {
        let from = calendar::monday_of(from);
        let to = calendar::monday_of(to);
        self.assignments
            .range((dog_id, from)..(dog_id, to))
            .map(|(_, a)| a)
            .collect()
    }

    pub fn find_for_trainer_week(
        &self,
        trainer_id: TrainerId,
        week_start: NaiveDate,
    ) -> Vec<&Assignment> {
        let week = calendar::monday_of(week_start);
        self.assignments
            .values()
            .filter(|a| a.trainer_id == Some(trainer_id) && a.week_start_date == week)
            .collect()
    }

    pub fn count_for_trainer_week(
        &self,
        trainer_id: TrainerId,
        week_start: NaiveDate,
        assignment_type: AssignmentType,
        exclude_dog: Option<DogId>,
    ) -> u32 {
        let week = calendar::monday_of(week_start);
        self.assignments
            .values()
            .filter(|a| {
                a.trainer_id == Some(trainer_id)
                    && a.week_start_date == week
                    && a.assignment_type == assignment_type
                    && Some(a.dog_id) != exclude_dog
            })
            .count() as u32
    }

    /// Training rows with `week_start <= through`, the cumulative-counter
    /// input shared by the lifecycle engine and the forecast.
    pub fn training_weeks_through(&self, dog_id: DogId, through: NaiveDate) -> u32 {
        let through = calendar::monday_of(through);
        self.assignments_for_dog(dog_id)
            .filter(|a| {
                a.assignment_type == AssignmentType::Training && a.week_start_date <= through
            })
            .count() as u32
    }

    pub fn earliest_assignment_week(&self, dog_id: DogId) -> Option<NaiveDate> {
        self.assignments_for_dog(dog_id)
            .map(|a| a.week_start_date)
            .next()
    }

    pub fn latest_assignment_week(&self, dog_id: DogId) -> Option<NaiveDate> {
        self.assignments_for_dog(dog_id)
            .map(|a| a.week_start_date)
            .last()
    }

    // -----------------------------------------------------------------------
    // Class membership
    // -----------------------------------------------------------------------

    pub fn roster(&self, class_id: ClassId) -> Vec<ClassAssignment> {
        self.class_assignments
            .iter()
            .filter(|ca| ca.class_id == class_id)
            .cloned()
            .collect()
    }

    pub fn remove_roster(&mut self, class_id: ClassId) {
        self.class_assignments.retain(|ca| ca.class_id != class_id);
    }
}

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

/// Transactional access to the tables, implemented by the excluded
/// persistence layer. `with_transaction` must be atomic: if the closure
/// errors, no write it made may survive.
pub trait Repository {
    fn with_transaction<T>(&self, f: impl FnOnce(&mut Tables) -> Result<T>) -> Result<T>;

    fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> T;
}

/// In-memory reference implementation. A single mutex serializes writers,
/// which is strictly coarser than the per-(trainer, week) serialization
/// the capacity check requires. Rollback is clone-on-entry,
/// restore-on-error.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    tables: Mutex<Tables>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Repository for MemoryRepository {
    fn with_transaction<T>(&self, f: impl FnOnce(&mut Tables) -> Result<T>) -> Result<T> {
        let mut guard = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        let snapshot = guard.clone();
        match f(&mut guard) {
            Ok(value) => Ok(value),
            Err(err) => {
                *guard = snapshot;
                Err(err)
            }
        }
    }

    fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> T {
        let guard = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        f(&guard)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
