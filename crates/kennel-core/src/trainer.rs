use crate::types::TrainerId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trainer {
    pub id: TrainerId,
    pub name: String,
}

impl Trainer {
    pub fn new(id: TrainerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}
