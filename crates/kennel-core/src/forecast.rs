//! Read-only projection of the weekly board: one row per trainer plus the
//! four synthetic rows, over a caller-chosen window of weeks.
//!
//! Row membership is exclusive per (dog, week). Rows are resolved in
//! precedence order (trainer rows, then Dropped Out, Graduated, Not Yet
//! IFT) and the Parking Lot is computed last as everything that started
//! but landed nowhere else.

use crate::calendar;
use crate::config::ProgramConfig;
use crate::dog::Dog;
use crate::store::Tables;
use crate::types::{AssignmentType, DogId, DogStatus, TrainerId};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

// ---------------------------------------------------------------------------
// Grid types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Training,
    Class,
    Paused,
    Graduated,
    Dropout,
    NotYetIft,
}

impl From<AssignmentType> for EntryKind {
    fn from(ty: AssignmentType) -> Self {
        match ty {
            AssignmentType::Training => EntryKind::Training,
            AssignmentType::Class => EntryKind::Class,
            AssignmentType::Paused => EntryKind::Paused,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DogEntry {
    pub dog_id: DogId,
    pub name: String,
    pub kind: EntryKind,
    /// Cumulative training weeks through this column, seeded at the dog's
    /// initial credit.
    pub training_weeks: u32,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Cell {
    pub dogs: Vec<DogEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Row {
    /// `None` for the synthetic rows.
    pub trainer_id: Option<TrainerId>,
    pub label: String,
    pub weeks: BTreeMap<NaiveDate, Cell>,
}

impl Row {
    fn new(trainer_id: Option<TrainerId>, label: impl Into<String>, weeks: &[NaiveDate]) -> Self {
        Self {
            trainer_id,
            label: label.into(),
            weeks: weeks.iter().map(|w| (*w, Cell::default())).collect(),
        }
    }

    fn push(&mut self, week: NaiveDate, entry: DogEntry) {
        if let Some(cell) = self.weeks.get_mut(&week) {
            cell.dogs.push(entry);
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ForecastData {
    pub week_starts: Vec<NaiveDate>,
    pub trainers: Vec<Row>,
    pub parking_lot: Row,
    pub not_yet_ift: Row,
    pub graduated: Row,
    pub dropped_out: Row,
    /// Weeks in the window where at least one recall lands.
    pub recall_week_starts: Vec<NaiveDate>,
    pub recall_count_by_week: BTreeMap<NaiveDate, u32>,
    /// Weeks occupied by a scheduled class, for highlighting only.
    pub class_week_starts: Vec<NaiveDate>,
}

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

pub fn project(
    tables: &Tables,
    cfg: &ProgramConfig,
    start_date: NaiveDate,
    week_count: u32,
) -> ForecastData {
    let weeks = calendar::week_starts(start_date, week_count);
    let mut seen: BTreeMap<NaiveDate, BTreeSet<DogId>> =
        weeks.iter().map(|w| (*w, BTreeSet::new())).collect();

    let cumulative = |dog: &Dog, week: NaiveDate| {
        dog.initial_training_weeks + tables.training_weeks_through(dog.id, week)
    };

    // Trainer rows, alphabetical.
    let mut trainer_list: Vec<_> = tables.trainers.values().collect();
    trainer_list.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));

    let mut trainer_rows = Vec::with_capacity(trainer_list.len());
    for trainer in trainer_list {
        let mut row = Row::new(Some(trainer.id), trainer.name.clone(), &weeks);
        for &week in &weeks {
            for a in tables.find_for_trainer_week(trainer.id, week) {
                // Projection is best-effort: skip rows whose dog vanished.
                let Some(dog) = tables.dogs.get(&a.dog_id) else {
                    continue;
                };
                row.push(
                    week,
                    DogEntry {
                        dog_id: dog.id,
                        name: dog.name.clone(),
                        kind: a.assignment_type.into(),
                        training_weeks: cumulative(dog, week),
                    },
                );
                seen.entry(week).or_default().insert(dog.id);
            }
        }
        trainer_rows.push(row);
    }

    // Dropped Out: from the dropout date, or the week after the dog's last
    // surviving assignment, or forever if it has neither.
    let mut dropped_out = Row::new(None, "Dropped Out", &weeks);
    for dog in tables.dogs.values().filter(|d| d.status == DogStatus::Dropout) {
        let from = dog
            .dropout_date
            .map(calendar::monday_of)
            .or_else(|| {
                tables
                    .latest_assignment_week(dog.id)
                    .map(|w| calendar::add_weeks(w, 1))
            });
        for &week in &weeks {
            if from.is_some_and(|f| week < f) {
                continue;
            }
            if seen.entry(week).or_default().insert(dog.id) {
                dropped_out.push(
                    week,
                    DogEntry {
                        dog_id: dog.id,
                        name: dog.name.clone(),
                        kind: EntryKind::Dropout,
                        training_weeks: 0,
                    },
                );
            }
        }
    }

    // Graduated: the week after the dog's latest class week, onward.
    let mut graduated = Row::new(None, "Graduated", &weeks);
    for dog in tables.dogs.values().filter(|d| d.status != DogStatus::Dropout) {
        let latest_class_week = tables
            .assignments_for_dog(dog.id)
            .filter(|a| a.assignment_type == AssignmentType::Class)
            .map(|a| a.week_start_date)
            .max();
        let Some(latest) = latest_class_week else {
            continue;
        };
        let graduation_week = calendar::add_weeks(latest, 1);
        let total_weeks =
            dog.initial_training_weeks + tables.training_weeks_through(dog.id, NaiveDate::MAX);
        for &week in &weeks {
            if week >= graduation_week && seen.entry(week).or_default().insert(dog.id) {
                graduated.push(
                    week,
                    DogEntry {
                        dog_id: dog.id,
                        name: dog.name.clone(),
                        kind: EntryKind::Graduated,
                        training_weeks: total_weeks,
                    },
                );
            }
        }
    }

    // Not Yet IFT: weeks strictly before the dog's recall week.
    let mut not_yet_ift = Row::new(None, "Not Yet IFT", &weeks);
    for dog in tables.dogs.values() {
        let Some(recall) = dog.recall_week_start_date.map(calendar::monday_of) else {
            continue;
        };
        for &week in &weeks {
            if recall > week && seen.entry(week).or_default().insert(dog.id) {
                not_yet_ift.push(
                    week,
                    DogEntry {
                        dog_id: dog.id,
                        name: dog.name.clone(),
                        kind: EntryKind::NotYetIft,
                        training_weeks: 0,
                    },
                );
            }
        }
    }

    // Parking Lot, last. First the explicit trainerless rows...
    let mut parking_lot = Row::new(None, "Parking Lot", &weeks);
    for a in tables.assignments.values().filter(|a| a.trainer_id.is_none()) {
        let week = a.week_start_date;
        let Some(seen_week) = seen.get_mut(&week) else {
            continue; // outside the window
        };
        let Some(dog) = tables.dogs.get(&a.dog_id) else {
            continue;
        };
        if seen_week.insert(dog.id) {
            parking_lot.push(
                week,
                DogEntry {
                    dog_id: dog.id,
                    name: dog.name.clone(),
                    kind: a.assignment_type.into(),
                    training_weeks: cumulative(dog, week),
                },
            );
        }
    }

    // ...then the implicit ones: dogs that have started (first assignment
    // or recall week at or before this column) but landed in no row.
    for dog in tables.dogs.values() {
        let earliest = tables.earliest_assignment_week(dog.id);
        let recall = dog.recall_week_start_date.map(calendar::monday_of);
        for &week in &weeks {
            let started = earliest.is_some_and(|e| e <= week)
                || recall.is_some_and(|r| r <= week);
            if !started {
                continue;
            }
            if seen.entry(week).or_default().insert(dog.id) {
                parking_lot.push(
                    week,
                    DogEntry {
                        dog_id: dog.id,
                        name: dog.name.clone(),
                        kind: EntryKind::Paused,
                        training_weeks: cumulative(dog, week),
                    },
                );
            }
        }
    }

    // Recall metadata.
    let mut recall_count_by_week = BTreeMap::new();
    for &week in &weeks {
        let count = tables
            .dogs
            .values()
            .filter(|d| d.recall_week_start_date.map(calendar::monday_of) == Some(week))
            .count() as u32;
        recall_count_by_week.insert(week, count);
    }
    let recall_week_starts: Vec<NaiveDate> = weeks
        .iter()
        .copied()
        .filter(|w| recall_count_by_week.get(w).copied().unwrap_or(0) > 0)
        .collect();

    // Class-week highlighting.
    let window: BTreeSet<NaiveDate> = weeks.iter().copied().collect();
    let mut class_week_set = BTreeSet::new();
    for class in tables.classes.values() {
        for week in class.weeks(cfg.class_duration_weeks) {
            if window.contains(&week) {
                class_week_set.insert(week);
            }
        }
    }

    ForecastData {
        week_starts: weeks,
        trainers: trainer_rows,
        parking_lot,
        not_yet_ift,
        graduated,
        dropped_out,
        recall_week_starts,
        recall_count_by_week,
        class_week_starts: class_week_set.into_iter().collect(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
