//! Participant directory
//!
//! Display lookup only. Nothing in allocation, netting or the ledger
//! depends on it.

use ledger_core::ParticipantId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Participant profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Participant ID
    pub id: ParticipantId,

    /// Display name
    pub name: String,

    /// Contact email; empty when unknown
    #[serde(default)]
    pub email: String,
}

impl Participant {
    /// Create new profile
    pub fn new(id: impl Into<ParticipantId>, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: email.into(),
        }
    }

    /// Stand-in for an ID with no profile
    pub fn placeholder(id: &ParticipantId) -> Self {
        Self {
            id: id.clone(),
            name: format!("User {}", id),
            email: String::new(),
        }
    }
}

/// Known participant profiles
#[derive(Debug, Clone, Default)]
pub struct ParticipantDirectory {
    profiles: HashMap<ParticipantId, Participant>,
}

impl ParticipantDirectory {
    /// Empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a profile
    pub fn insert(&mut self, participant: Participant) {
        self.profiles.insert(participant.id.clone(), participant);
    }

    /// Known profile, without fallback
    pub fn get(&self, id: &ParticipantId) -> Option<&Participant> {
        self.profiles.get(id)
    }

    /// Known profile, or a placeholder for unknown IDs
    pub fn resolve(&self, id: &ParticipantId) -> Participant {
        match self.profiles.get(id) {
            Some(profile) => profile.clone(),
            None => {
                tracing::warn!("No profile for participant {}, using placeholder", id);
                Participant::placeholder(id)
            }
        }
    }

    /// Display name for an ID
    pub fn display_name(&self, id: &ParticipantId) -> String {
        self.resolve(id).name
    }

    /// Number of known profiles
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Whether no profiles are known
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

impl FromIterator<Participant> for ParticipantDirectory {
    fn from_iter<I: IntoIterator<Item = Participant>>(iter: I) -> Self {
        let mut directory = Self::new();
        for participant in iter {
            directory.insert(participant);
        }
        directory
    }
}
