use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// ProgramConfig
// ---------------------------------------------------------------------------

/// Boundary constants for the training program. Injected everywhere so
/// tests can exercise limits without recompiling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramConfig {
    /// Cumulative training weeks before a dog is ready for class.
    #[serde(default = "default_min_training_weeks")]
    pub min_training_weeks: u32,
    /// Display-warning threshold; also caps `initial_training_weeks`.
    #[serde(default = "default_max_training_weeks")]
    pub max_training_weeks: u32,
    #[serde(default = "default_max_training_dogs")]
    pub max_training_dogs_per_trainer: u32,
    #[serde(default = "default_max_class_dogs")]
    pub max_class_dogs_per_trainer: u32,
    #[serde(default = "default_class_duration_weeks")]
    pub class_duration_weeks: u32,
}

fn default_min_training_weeks() -> u32 {
    14
}

fn default_max_training_weeks() -> u32 {
    22
}

fn default_max_training_dogs() -> u32 {
    6
}

fn default_max_class_dogs() -> u32 {
    3
}

fn default_class_duration_weeks() -> u32 {
    2
}

impl Default for ProgramConfig {
    fn default() -> Self {
        Self {
            min_training_weeks: default_min_training_weeks(),
            max_training_weeks: default_max_training_weeks(),
            max_training_dogs_per_trainer: default_max_training_dogs(),
            max_class_dogs_per_trainer: default_max_class_dogs(),
            class_duration_weeks: default_class_duration_weeks(),
        }
    }
}

impl ProgramConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let cfg: ProgramConfig = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(path, &data)
    }

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.class_duration_weeks == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "class_duration_weeks must be at least 1".to_string(),
            });
        }
        if self.max_training_dogs_per_trainer == 0 || self.max_class_dogs_per_trainer == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "trainer capacities must be at least 1".to_string(),
            });
        }
        if self.min_training_weeks == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "min_training_weeks=0 makes every dog ready for class".to_string(),
            });
        }
        if self.max_training_weeks < self.min_training_weeks {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "max_training_weeks={} is below min_training_weeks={}",
                    self.max_training_weeks, self.min_training_weeks
                ),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults() {
        let cfg = ProgramConfig::default();
        assert_eq!(cfg.min_training_weeks, 14);
        assert_eq!(cfg.max_training_weeks, 22);
        assert_eq!(cfg.max_training_dogs_per_trainer, 6);
        assert_eq!(cfg.max_class_dogs_per_trainer, 3);
        assert_eq!(cfg.class_duration_weeks, 2);
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let cfg: ProgramConfig = serde_yaml::from_str("min_training_weeks: 1\n").unwrap();
        assert_eq!(cfg.min_training_weeks, 1);
        assert_eq!(cfg.class_duration_weeks, 2);
    }

    #[test]
    fn save_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("program.yaml");
        let cfg = ProgramConfig {
            min_training_weeks: 10,
            ..ProgramConfig::default()
        };
        cfg.save(&path).unwrap();
        let loaded = ProgramConfig::load(&path).unwrap();
        assert_eq!(loaded.min_training_weeks, 10);
        assert_eq!(loaded.max_training_dogs_per_trainer, 6);
    }

    #[test]
    fn validate_flags_zero_duration_and_capacity() {
        let cfg = ProgramConfig {
            class_duration_weeks: 0,
            max_class_dogs_per_trainer: 0,
            ..ProgramConfig::default()
        };
        let warnings = cfg.validate();
        assert!(warnings.iter().any(|w| w.level == WarnLevel::Error
            && w.message.contains("class_duration_weeks")));
        assert!(warnings
            .iter()
            .any(|w| w.message.contains("capacities")));
    }

    #[test]
    fn validate_clean_config_is_quiet() {
        assert!(ProgramConfig::default().validate().is_empty());
    }

    #[test]
    fn validate_warns_on_inverted_week_bounds() {
        let cfg = ProgramConfig {
            min_training_weeks: 20,
            max_training_weeks: 10,
            ..ProgramConfig::default()
        };
        assert!(cfg
            .validate()
            .iter()
            .any(|w| w.level == WarnLevel::Warning && w.message.contains("below")));
    }
}
