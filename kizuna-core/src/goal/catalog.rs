//! Static per-companion goal templates.

use rand::seq::SliceRandom;
use rand::Rng;

use super::{Goal, GoalReward, GoalType};
use crate::calendar::Timestamp;
use crate::types::CompanionId;

#[derive(Debug, Clone, Copy)]
pub enum TemplateReward {
    Affinity(u32),
    Achievement(&'static str),
    Background(&'static str),
}

/// A goal a companion can hand out.
#[derive(Debug, Clone, Copy)]
pub struct GoalTemplate {
    pub title: &'static str,
    pub description: &'static str,
    pub target_minutes: u32,
    pub goal_type: GoalType,
    pub reward: TemplateReward,
}

impl GoalTemplate {
    pub fn reward(&self) -> GoalReward {
        match self.reward {
            TemplateReward::Affinity(points) => GoalReward::Affinity(points),
            TemplateReward::Achievement(id) => GoalReward::Achievement(id.to_string()),
            TemplateReward::Background(id) => GoalReward::Background(id.to_string()),
        }
    }
}

const fn template(
    title: &'static str,
    description: &'static str,
    target_minutes: u32,
    goal_type: GoalType,
    reward: TemplateReward,
) -> GoalTemplate {
    GoalTemplate {
        title,
        description,
        target_minutes,
        goal_type,
        reward,
    }
}

use super::GoalType::{Challenge, Daily, Weekly};
use self::TemplateReward::{Achievement, Affinity, Background};

static SAYORI_GOALS: [GoalTemplate; 4] = [
    template("Morning Study Session", "Complete a 25-minute focus session before noon!", 25, Daily, Affinity(5)),
    template("Positive Start", "Complete your first focus session within an hour of waking up", 20, Daily, Affinity(3)),
    template("Friendship Study Circle", "Complete 3 focus sessions in one day - like studying with friends!", 60, Daily, Achievement("study_circle")),
    template("Breakfast Club Challenge", "Complete a full week of morning study sessions", 120, Weekly, Background("sunrise_bg")),
];

static NATSUKI_GOALS: [GoalTemplate; 4] = [
    template("Quick and Focused", "Complete 3 focus sessions in one day!", 75, Daily, Affinity(5)),
    template("Baking Timer Challenge", "Complete a 25-minute session without any breaks - just like waiting for cupcakes to bake!", 25, Daily, Affinity(4)),
    template("Manga Reading Marathon", "Complete a 2-hour study session with proper breaks", 120, Challenge, Achievement("reading_marathon")),
    template("Perfectionist's Challenge", "Complete 5 perfect focus sessions in a row without distractions", 100, Weekly, Background("kitchen_bg")),
];

static YURI_GOALS: [GoalTemplate; 4] = [
    template("Deep Focus Challenge", "Complete a 50-minute focus session without breaks", 50, Challenge, Background("library_bg")),
    template("Evening Reading", "Complete a focus session in the evening hours", 40, Daily, Affinity(5)),
    template("Literary Analysis", "Complete a series of 3 long focus sessions in one day", 120, Daily, Achievement("deep_thinker")),
    template("Novel Completion", "Accumulate 5 hours of focus time in a week", 300, Weekly, Background("bookstore_bg")),
];

static MONIKA_GOALS: [GoalTemplate; 4] = [
    template("Weekly Dedication", "Accumulate 3 hours of focus time this week", 180, Weekly, Affinity(10)),
    template("Productivity Analysis", "Complete focus sessions at different times of day to analyze your productivity patterns", 75, Daily, Affinity(5)),
    template("Perfect Week Challenge", "Complete at least one focus session every day for a week", 175, Weekly, Achievement("perfect_attendance")),
    template("Presidential Efficiency", "Complete 10 focused study sessions in a single week", 250, Weekly, Background("classroom_bg")),
];

pub fn templates_for(companion: CompanionId) -> &'static [GoalTemplate] {
    match companion {
        CompanionId::Sayori => &SAYORI_GOALS,
        CompanionId::Natsuki => &NATSUKI_GOALS,
        CompanionId::Yuri => &YURI_GOALS,
        CompanionId::Monika => &MONIKA_GOALS,
    }
}

pub fn templates_of_type(companion: CompanionId, goal_type: GoalType) -> Vec<&'static GoalTemplate> {
    templates_for(companion)
        .iter()
        .filter(|t| t.goal_type == goal_type)
        .collect()
}

/// Challenge templates across every companion.
pub fn all_challenge_templates() -> Vec<&'static GoalTemplate> {
    CompanionId::ALL
        .into_iter()
        .flat_map(|c| templates_of_type(c, Challenge))
        .collect()
}

/// Draw a challenge from the companion's catalog, or from its whole catalog when
/// it has no challenges, and hand it out as a two week challenge.
pub fn assign_random_companion_goal<R: Rng + ?Sized>(
    companion: CompanionId,
    now: Timestamp,
    rng: &mut R,
) -> Option<Goal> {
    let challenges = templates_of_type(companion, Challenge);
    let picked = if challenges.is_empty() {
        templates_for(companion).choose(rng)
    } else {
        challenges.choose(rng).copied()
    }?;

    let mut goal = Goal::for_companion(picked, companion, now);
    goal.goal_type = Challenge;
    Some(goal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_every_companion_has_four_templates() {
        for companion in CompanionId::ALL {
            assert_eq!(templates_for(companion).len(), 4);
            assert!(!templates_of_type(companion, Daily).is_empty());
        }
    }

    #[test]
    fn test_free_challenges_pool() {
        let titles: Vec<_> = all_challenge_templates().iter().map(|t| t.title).collect();
        assert_eq!(titles, vec!["Manga Reading Marathon", "Deep Focus Challenge"]);
    }

    #[test]
    fn test_assign_random_companion_goal() {
        let mut rng = StdRng::seed_from_u64(7);
        let now = Utc::now();

        let goal = assign_random_companion_goal(CompanionId::Yuri, now, &mut rng).unwrap();
        assert_eq!(goal.title, "Deep Focus Challenge");
        assert_eq!(goal.goal_type, Challenge);
        assert_eq!(goal.deadline, now + Duration::days(14));

        // Sayori has no challenge templates, so any of hers is forced into one
        let goal = assign_random_companion_goal(CompanionId::Sayori, now, &mut rng).unwrap();
        assert_eq!(goal.goal_type, Challenge);
        assert_eq!(goal.companion_id, Some(CompanionId::Sayori));
        assert!(templates_for(CompanionId::Sayori).iter().any(|t| t.title == goal.title));
    }
}
