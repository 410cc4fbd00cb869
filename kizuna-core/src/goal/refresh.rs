//! Expiry and reassignment of system goals.

use chrono::Utc;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use super::catalog::{all_challenge_templates, templates_of_type, GoalTemplate};
use super::{new_goal_id, Goal, GoalOrigin, GoalType};
use crate::calendar::{days_after, end_of_day, end_of_week, LocalTime, Timestamp};
use crate::types::CompanionId;

/// A category that must always hold one active goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GoalSlot {
    Daily,
    Weekly,
    /// Challenge owned by the selected companion
    CompanionChallenge,
    /// Challenge with no companion
    FreeChallenge,
}

impl GoalSlot {
    pub const ALL: [GoalSlot; 4] = [
        Self::Daily,
        Self::Weekly,
        Self::FreeChallenge,
        Self::CompanionChallenge,
    ];

    /// The slot an active goal fills, if any.
    pub fn of(goal: &Goal, selected: CompanionId) -> Option<Self> {
        match goal.goal_type {
            GoalType::Daily => Some(Self::Daily),
            GoalType::Weekly => Some(Self::Weekly),
            GoalType::Challenge if goal.companion_id == Some(selected) => {
                Some(Self::CompanionChallenge)
            }
            GoalType::Challenge if goal.companion_id.is_none() => Some(Self::FreeChallenge),
            _ => None,
        }
    }
}

/// Outcome of a refresh pass.
#[derive(Debug, Clone, Default)]
pub struct GoalRefresh {
    pub goals: Vec<Goal>,
    pub removed: Vec<String>,
    pub created: Vec<String>,
}

impl GoalRefresh {
    pub fn changed(&self) -> bool {
        !self.removed.is_empty() || !self.created.is_empty()
    }
}

fn synthesize(
    template: &GoalTemplate,
    id_prefix: &str,
    companion: Option<CompanionId>,
    deadline: Timestamp,
    now: Timestamp,
) -> Goal {
    Goal {
        id: new_goal_id(id_prefix),
        title: template.title.to_string(),
        description: template.description.to_string(),
        target_minutes: template.target_minutes,
        current_minutes: 0,
        deadline,
        created_at: now,
        completed: false,
        goal_type: template.goal_type,
        origin: GoalOrigin::System,
        companion_id: companion,
        reward: Some(template.reward()),
        completed_at: None,
    }
}

fn draw_for_slot<R: Rng + ?Sized>(
    slot: GoalSlot,
    selected: CompanionId,
    now: &LocalTime,
    rng: &mut R,
) -> Option<Goal> {
    let now_utc = now.with_timezone(&Utc);
    match slot {
        GoalSlot::Daily => templates_of_type(selected, GoalType::Daily)
            .choose(rng)
            .map(|t| synthesize(t, "daily", Some(selected), end_of_day(now), now_utc)),
        GoalSlot::Weekly => templates_of_type(selected, GoalType::Weekly)
            .choose(rng)
            .map(|t| synthesize(t, "weekly", Some(selected), end_of_week(now), now_utc)),
        GoalSlot::FreeChallenge => all_challenge_templates()
            .choose(rng)
            .map(|t| synthesize(t, "challenge", None, days_after(now, 21), now_utc)),
        GoalSlot::CompanionChallenge => templates_of_type(selected, GoalType::Challenge)
            .choose(rng)
            .map(|t| {
                let prefix = format!("challenge_{}", selected);
                synthesize(t, &prefix, Some(selected), days_after(now, 14), now_utc)
            }),
    }
}

/// Drop expired open goals, keep everything completed, and top up each
/// [`GoalSlot`] that no longer has an active goal.
///
/// Calling this twice without time passing creates nothing the second time.
pub fn refresh_goals<R: Rng + ?Sized>(
    goals: Vec<Goal>,
    selected: CompanionId,
    now: &LocalTime,
    rng: &mut R,
) -> GoalRefresh {
    let now_utc = now.with_timezone(&Utc);
    let mut refresh = GoalRefresh::default();
    let mut covered = Vec::with_capacity(GoalSlot::ALL.len());

    for goal in goals {
        if goal.completed {
            refresh.goals.push(goal);
            continue;
        }
        if goal.is_expired(now_utc) {
            refresh.removed.push(goal.id);
            continue;
        }
        if let Some(slot) = GoalSlot::of(&goal, selected) {
            covered.push(slot);
        }
        refresh.goals.push(goal);
    }

    for slot in GoalSlot::ALL {
        if covered.contains(&slot) {
            continue;
        }
        if let Some(goal) = draw_for_slot(slot, selected, now, rng) {
            debug!(?slot, goal_id = %goal.id, title = %goal.title, "Assigned replacement goal");
            refresh.created.push(goal.id.clone());
            refresh.goals.push(goal);
        }
    }

    refresh
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, FixedOffset, TimeZone};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn wednesday_morning() -> LocalTime {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 6, 9, 30, 0)
            .unwrap()
    }

    fn count(refresh: &GoalRefresh, goal_type: GoalType) -> usize {
        refresh
            .goals
            .iter()
            .filter(|g| g.goal_type == goal_type && !g.completed)
            .count()
    }

    #[test]
    fn test_empty_list_fills_every_slot() {
        let mut rng = StdRng::seed_from_u64(1);
        let now = wednesday_morning();
        let refresh = refresh_goals(Vec::new(), CompanionId::Natsuki, &now, &mut rng);

        assert_eq!(count(&refresh, GoalType::Daily), 1);
        assert_eq!(count(&refresh, GoalType::Weekly), 1);
        // one free challenge and one natsuki challenge
        assert_eq!(count(&refresh, GoalType::Challenge), 2);
        assert_eq!(refresh.created.len(), 4);
        assert!(refresh.goals.iter().all(|g| g.origin == GoalOrigin::System));

        let free = refresh
            .goals
            .iter()
            .find(|g| g.goal_type == GoalType::Challenge && g.companion_id.is_none())
            .unwrap();
        assert!(free.id.starts_with("challenge_"));
        assert_eq!(free.deadline, days_after(&now, 21));
    }

    #[test]
    fn test_companion_without_challenges_gets_no_companion_challenge() {
        let mut rng = StdRng::seed_from_u64(2);
        let refresh = refresh_goals(Vec::new(), CompanionId::Sayori, &wednesday_morning(), &mut rng);
        assert_eq!(count(&refresh, GoalType::Challenge), 1);
        assert_eq!(refresh.created.len(), 3);
    }

    #[test]
    fn test_refresh_is_idempotent_for_coverage() {
        let mut rng = StdRng::seed_from_u64(3);
        let now = wednesday_morning();
        let first = refresh_goals(Vec::new(), CompanionId::Yuri, &now, &mut rng);
        let second = refresh_goals(first.goals.clone(), CompanionId::Yuri, &now, &mut rng);

        assert!(!second.changed());
        assert_eq!(second.goals, first.goals);
    }

    #[test]
    fn test_expired_daily_is_replaced() {
        let mut rng = StdRng::seed_from_u64(4);
        let now = wednesday_morning();
        let first = refresh_goals(Vec::new(), CompanionId::Yuri, &now, &mut rng);
        let stale_daily = first
            .goals
            .iter()
            .find(|g| g.goal_type == GoalType::Daily)
            .unwrap()
            .id
            .clone();

        let tomorrow = now + Duration::days(1);
        let second = refresh_goals(first.goals.clone(), CompanionId::Yuri, &tomorrow, &mut rng);

        assert_eq!(second.removed, vec![stale_daily.clone()]);
        assert_eq!(second.created.len(), 1);
        assert_eq!(count(&second, GoalType::Daily), 1);
        let fresh = second
            .goals
            .iter()
            .find(|g| g.goal_type == GoalType::Daily)
            .unwrap();
        assert_ne!(fresh.id, stale_daily);
        assert_eq!(fresh.deadline, end_of_day(&tomorrow));
    }

    #[test]
    fn test_completed_goals_survive_but_do_not_cover() {
        let mut rng = StdRng::seed_from_u64(5);
        let now = wednesday_morning();
        let mut first = refresh_goals(Vec::new(), CompanionId::Monika, &now, &mut rng);
        for goal in first.goals.iter_mut().filter(|g| g.goal_type == GoalType::Weekly) {
            goal.force_complete(now.with_timezone(&Utc));
        }

        let later = now + Duration::days(30);
        let second = refresh_goals(first.goals, CompanionId::Monika, &later, &mut rng);
        assert_eq!(
            second
                .goals
                .iter()
                .filter(|g| g.goal_type == GoalType::Weekly && g.completed)
                .count(),
            1
        );
        assert_eq!(count(&second, GoalType::Weekly), 1);
    }

    #[test]
    fn test_user_goals_never_fill_slots() {
        let mut rng = StdRng::seed_from_u64(6);
        let now = wednesday_morning();
        let user_goal = Goal::user(
            super::super::NewGoal {
                title: "Thesis".to_string(),
                description: String::new(),
                target_minutes: 600,
                deadline: now.with_timezone(&Utc) + Duration::days(3),
            },
            now.with_timezone(&Utc),
        )
        .unwrap();

        let refresh = refresh_goals(vec![user_goal], CompanionId::Natsuki, &now, &mut rng);
        assert_eq!(refresh.goals.len(), 5);
        assert_eq!(count(&refresh, GoalType::Custom), 1);
    }
}
