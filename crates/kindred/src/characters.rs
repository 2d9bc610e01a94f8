// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Character provider backed by the `[[characters]]` config section.

use std::collections::HashMap;

use async_trait::async_trait;
use kindred_config::model::CharacterConfig;
use kindred_core::{Character, CharacterProvider, KindredError};

/// Serves the characters declared in configuration. The set is fixed for
/// the life of the process.
pub struct ConfiguredCharacters {
    by_id: HashMap<u64, Character>,
}

impl ConfiguredCharacters {
    pub fn new(configs: &[CharacterConfig]) -> Self {
        let by_id = configs
            .iter()
            .map(|config| (config.id, Character::from(config)))
            .collect();
        Self { by_id }
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

#[async_trait]
impl CharacterProvider for ConfiguredCharacters {
    async fn get(&self, id: u64, _user_id: Option<&str>) -> Result<Character, KindredError> {
        self.by_id
            .get(&id)
            .cloned()
            .ok_or_else(|| KindredError::character_not_found(id))
    }
}
