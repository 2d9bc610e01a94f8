// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixed character catalogue.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use kindred_core::{Character, CharacterProvider, KindredError};

pub struct MockCharacters {
    characters: HashMap<u64, Character>,
    panic_on_get: AtomicBool,
}

impl MockCharacters {
    /// Catalogue with one character, id 1, no greeting.
    pub fn new() -> Self {
        Self::with(vec![Self::character(1, "Test Character")])
    }

    pub fn with(characters: Vec<Character>) -> Self {
        Self {
            characters: characters.into_iter().map(|c| (c.id, c)).collect(),
            panic_on_get: AtomicBool::new(false),
        }
    }

    pub fn empty() -> Self {
        Self::with(Vec::new())
    }

    /// Convenience constructor for a plain character.
    pub fn character(id: u64, name: &str) -> Character {
        Character {
            id,
            name: name.to_string(),
            persona: format!("You are {name}."),
            greeting: None,
            voice_type: Some("alloy".to_string()),
        }
    }

    /// Panic inside `get`, for exercising panic isolation. Set it after the
    /// client connects; the connect path also looks the character up.
    pub fn set_panicking(&self, panic: bool) {
        self.panic_on_get.store(panic, Ordering::SeqCst);
    }
}

impl Default for MockCharacters {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CharacterProvider for MockCharacters {
    async fn get(&self, id: u64, _user_id: Option<&str>) -> Result<Character, KindredError> {
        if self.panic_on_get.load(Ordering::SeqCst) {
            panic!("mock character provider panicked");
        }
        self.characters
            .get(&id)
            .cloned()
            .ok_or_else(|| KindredError::character_not_found(id))
    }
}
