// Source of weekly demand and availability profiles
use std::collections::BTreeMap;

use crate::error::{GridError, Result};
use crate::models::profile::{Profile, WeekId};

/// Supplies the profile of a week to the solver and the game facade.
///
/// Implementations are shared between batch workers, hence `Send + Sync`.
pub trait ProfileLoader: Send + Sync {
    /// Fails with `NotFound` for weeks the loader has no data for.
    fn load_week(&self, week: WeekId) -> Result<Profile>;

    fn available_weeks(&self) -> Vec<WeekId>;
}

/// Profiles held in memory, keyed by their week.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLoader {
    profiles: BTreeMap<WeekId, Profile>,
}

impl InMemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.insert(profile);
        self
    }

    /// Replaces any profile already stored for the same week.
    pub fn insert(&mut self, profile: Profile) {
        self.profiles.insert(profile.week, profile);
    }
}

impl FromIterator<Profile> for InMemoryLoader {
    fn from_iter<I: IntoIterator<Item = Profile>>(iter: I) -> Self {
        Self {
            profiles: iter.into_iter().map(|p| (p.week, p)).collect(),
        }
    }
}

impl ProfileLoader for InMemoryLoader {
    fn load_week(&self, week: WeekId) -> Result<Profile> {
        self.profiles.get(&week).cloned().ok_or(GridError::NotFound(week))
    }

    fn available_weeks(&self) -> Vec<WeekId> {
        self.profiles.keys().copied().collect()
    }
}
