//! Repair for unlock lists written before unlocks became append-if-absent.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use super::{find_achievement, UnlockedAchievement};

/// Keep the first record per id, preserving order. Returns the number removed.
pub fn dedupe_unlocked(records: &mut Vec<UnlockedAchievement>) -> usize {
    let before = records.len();
    let mut seen = HashSet::new();
    records.retain(|r| seen.insert(r.id.clone()));
    before - records.len()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AchievementDiagnostics {
    pub total: usize,
    pub unique: usize,
    /// Ids that appear more than once, with their counts
    pub duplicates: Vec<(String, usize)>,
    /// Records with an empty id
    pub invalid: usize,
    /// Ids that are not in the catalog, e.g. goal reward unlocks
    pub uncataloged: Vec<String>,
}

impl AchievementDiagnostics {
    pub fn is_clean(&self) -> bool {
        self.duplicates.is_empty() && self.invalid == 0
    }
}

pub fn diagnose(records: &[UnlockedAchievement]) -> AchievementDiagnostics {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order = Vec::new();
    let mut invalid = 0;

    for record in records {
        if record.id.is_empty() {
            invalid += 1;
            continue;
        }
        let count = counts.entry(record.id.as_str()).or_insert(0);
        if *count == 0 {
            order.push(record.id.as_str());
        }
        *count += 1;
    }

    AchievementDiagnostics {
        total: records.len(),
        unique: order.len(),
        duplicates: order
            .iter()
            .filter(|id| counts[**id] > 1)
            .map(|id| (id.to_string(), counts[*id]))
            .collect(),
        invalid,
        uncataloged: order
            .iter()
            .filter(|id| find_achievement(id).is_none())
            .map(|id| id.to_string())
            .collect(),
    }
}
