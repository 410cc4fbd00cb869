use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{DialogueCategory, DialogueEntry};
use crate::types::{CatalogError, CompanionId, TimeOfDay};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionLines {
    #[serde(default)]
    pub start: Vec<DialogueEntry>,
    #[serde(default)]
    pub during: Vec<DialogueEntry>,
    #[serde(default)]
    pub end: Vec<DialogueEntry>,
    #[serde(default, rename = "break")]
    pub on_break: Vec<DialogueEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimeOfDayLines {
    #[serde(default)]
    pub morning: Vec<DialogueEntry>,
    #[serde(default)]
    pub afternoon: Vec<DialogueEntry>,
    #[serde(default)]
    pub evening: Vec<DialogueEntry>,
    #[serde(default)]
    pub night: Vec<DialogueEntry>,
}

/// Every line one companion can say, grouped by category.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompanionLines {
    #[serde(default)]
    pub greeting: Vec<DialogueEntry>,
    #[serde(default)]
    pub farewell: Vec<DialogueEntry>,
    #[serde(default)]
    pub encouragement: Vec<DialogueEntry>,
    #[serde(default)]
    pub achievement: Vec<DialogueEntry>,
    #[serde(default)]
    pub streak: Vec<DialogueEntry>,
    #[serde(default)]
    pub affinity: Vec<DialogueEntry>,
    #[serde(default)]
    pub session: SessionLines,
    #[serde(default)]
    pub time_of_day: TimeOfDayLines,
}

impl CompanionLines {
    pub fn entries(&self, category: DialogueCategory) -> &[DialogueEntry] {
        match category {
            DialogueCategory::Greeting => &self.greeting,
            DialogueCategory::Farewell => &self.farewell,
            DialogueCategory::Encouragement => &self.encouragement,
            DialogueCategory::Achievement => &self.achievement,
            DialogueCategory::Streak => &self.streak,
            DialogueCategory::Affinity => &self.affinity,
            DialogueCategory::SessionStart => &self.session.start,
            DialogueCategory::SessionDuring => &self.session.during,
            DialogueCategory::SessionEnd => &self.session.end,
            DialogueCategory::SessionBreak => &self.session.on_break,
            DialogueCategory::TimeOfDay(TimeOfDay::Morning) => &self.time_of_day.morning,
            DialogueCategory::TimeOfDay(TimeOfDay::Afternoon) => &self.time_of_day.afternoon,
            DialogueCategory::TimeOfDay(TimeOfDay::Evening) => &self.time_of_day.evening,
            DialogueCategory::TimeOfDay(TimeOfDay::Night) => &self.time_of_day.night,
        }
    }

    pub fn len(&self) -> usize {
        self.greeting.len()
            + self.farewell.len()
            + self.encouragement.len()
            + self.achievement.len()
            + self.streak.len()
            + self.affinity.len()
            + self.session.start.len()
            + self.session.during.len()
            + self.session.end.len()
            + self.session.on_break.len()
            + self.time_of_day.morning.len()
            + self.time_of_day.afternoon.len()
            + self.time_of_day.evening.len()
            + self.time_of_day.night.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DialogueCatalog(BTreeMap<CompanionId, CompanionLines>);

impl DialogueCatalog {
    /// Parse a catalog. Every companion must have at least one line.
    pub fn from_yaml(yaml: &str) -> Result<Self, CatalogError> {
        let catalog: DialogueCatalog = serde_yaml::from_str(yaml)?;
        for companion in CompanionId::ALL {
            if catalog.lines(companion).map_or(true, CompanionLines::is_empty) {
                return Err(CatalogError::MissingCompanion(companion));
            }
        }
        Ok(catalog)
    }

    pub fn lines(&self, companion: CompanionId) -> Option<&CompanionLines> {
        self.0.get(&companion)
    }
}
