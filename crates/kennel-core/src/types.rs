use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Entity ids
// ---------------------------------------------------------------------------

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.parse()?))
            }
        }
    };
}

id_newtype!(DogId);
id_newtype!(TrainerId);
id_newtype!(ClassId);

// ---------------------------------------------------------------------------
// DogStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DogStatus {
    NotYetIft,
    InTraining,
    ReadyForClass,
    InClass,
    Graduated,
    Paused,
    Dropout,
}

impl DogStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DogStatus::NotYetIft => "not_yet_ift",
            DogStatus::InTraining => "in_training",
            DogStatus::ReadyForClass => "ready_for_class",
            DogStatus::InClass => "in_class",
            DogStatus::Graduated => "graduated",
            DogStatus::Paused => "paused",
            DogStatus::Dropout => "dropout",
        }
    }

    /// Dropout never leaves the program; every other status is re-derived.
    pub fn is_terminal(self) -> bool {
        matches!(self, DogStatus::Dropout)
    }
}

impl fmt::Display for DogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DogStatus {
    type Err = crate::error::KennelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_yet_ift" => Ok(DogStatus::NotYetIft),
            "in_training" => Ok(DogStatus::InTraining),
            "ready_for_class" => Ok(DogStatus::ReadyForClass),
            "in_class" => Ok(DogStatus::InClass),
            "graduated" => Ok(DogStatus::Graduated),
            "paused" => Ok(DogStatus::Paused),
            "dropout" => Ok(DogStatus::Dropout),
            _ => Err(crate::error::KennelError::InvalidStatus(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// AssignmentType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentType {
    Training,
    Class,
    Paused,
}

impl AssignmentType {
    pub fn as_str(self) -> &'static str {
        match self {
            AssignmentType::Training => "training",
            AssignmentType::Class => "class",
            AssignmentType::Paused => "paused",
        }
    }
}

impl fmt::Display for AssignmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssignmentType {
    type Err = crate::error::KennelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "training" => Ok(AssignmentType::Training),
            "class" => Ok(AssignmentType::Class),
            "paused" => Ok(AssignmentType::Paused),
            _ => Err(crate::error::KennelError::InvalidAssignmentType(
                s.to_string(),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// DisplacedResolution
// ---------------------------------------------------------------------------

/// How to resolve a training dog whose trainer was pulled into a class week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplacedResolution {
    /// Keep the dog on the board without a trainer for that week.
    Pause,
    /// Delete the assignment outright.
    Remove,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
