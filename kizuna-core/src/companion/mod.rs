//! Companion state: affinity, mood, unlockables and fire-once dialogue events.
//!
//! All transitions here are one-way where it matters: unlockables only ever
//! flip to unlocked, dialogue events only ever flip to seen, and affinity is
//! clamped to `0..=100`.

pub mod messages;

use chrono::Utc;
use serde::{Deserialize, Serialize};

#[cfg(feature = "typescript")]
use ts_rs::TS;

use crate::calendar::{day_gap, LocalTime, Timestamp};
use crate::types::{CompanionId, CompanionMood, Result, ValidationError};

pub const MAX_AFFINITY: u32 = 100;

/// Affinity granted for completing one of the companion's own goals.
pub const COMPANION_GOAL_AFFINITY: u32 = 5;
/// Affinity granted for any other completed goal while the companion is selected.
pub const OTHER_GOAL_AFFINITY: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotivationStyle {
    Cheerful,
    Calm,
    Tough,
    Analytical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Personality {
    pub traits: Vec<String>,
    pub interests: Vec<String>,
    pub motivation_style: MotivationStyle,
    pub speaking_style: String,
}

impl Personality {
    fn build(traits: &[&str], interests: &[&str], style: MotivationStyle, speaking: &str) -> Self {
        Self {
            traits: traits.iter().map(|s| s.to_string()).collect(),
            interests: interests.iter().map(|s| s.to_string()).collect(),
            motivation_style: style,
            speaking_style: speaking.to_string(),
        }
    }

    pub fn of(companion: CompanionId) -> Self {
        match companion {
            CompanionId::Sayori => Self::build(
                &["cheerful", "optimistic", "caring", "energetic"],
                &["baking", "helping others", "cute things", "friendship"],
                MotivationStyle::Cheerful,
                "Enthusiastic and encouraging, uses lots of exclamations!",
            ),
            CompanionId::Yuri => Self::build(
                &["intelligent", "thoughtful", "reserved", "detail-oriented"],
                &["literature", "tea", "horror", "philosophy"],
                MotivationStyle::Calm,
                "Eloquent and thoughtful, uses sophisticated vocabulary and metaphors.",
            ),
            CompanionId::Natsuki => Self::build(
                &["determined", "direct", "passionate", "resilient"],
                &["manga", "baking", "cute things", "proving herself"],
                MotivationStyle::Tough,
                "Blunt and straightforward, occasionally tsundere with tough love.",
            ),
            CompanionId::Monika => Self::build(
                &["ambitious", "confident", "organized", "perfectionist"],
                &["piano", "literature", "self-improvement", "leadership"],
                MotivationStyle::Analytical,
                "Articulate and motivational, focuses on strategy and improvement.",
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum UnlockableKind {
    Sprite,
    Background,
    Gift,
    Dialogue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Unlockable {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: UnlockableKind,
    pub description: String,
    pub required_affinity: u32,
    pub unlocked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum EventTrigger {
    Affinity,
    Streak,
    Inactivity,
    Achievement,
    Daily,
}

impl EventTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Affinity => "affinity",
            Self::Streak => "streak",
            Self::Inactivity => "inactivity",
            Self::Achievement => "achievement",
            Self::Daily => "daily",
        }
    }
}

/// A story beat shown once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct DialogueEvent {
    pub id: String,
    pub trigger: EventTrigger,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_value: Option<u32>,
    pub title: String,
    pub content: Vec<String>,
    pub seen: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct CompanionStats {
    /// Seconds spent in sessions with this companion
    pub total_interaction_time: u64,
    pub consecutive_days: u32,
    #[serde(default)]
    pub last_daily_interaction: Option<Timestamp>,
    pub sessions_completed: u32,
    pub goals_completed: u32,
    pub gifts_received: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct CompanionData {
    pub id: CompanionId,
    pub name: String,
    #[cfg_attr(feature = "typescript", ts(skip))]
    pub personality: Personality,
    pub unlockables: Vec<Unlockable>,
    pub dialogue_events: Vec<DialogueEvent>,
    pub stats: CompanionStats,
    pub affinity_level: u32,
    pub mood: CompanionMood,
    pub last_interaction: Timestamp,
}

/// Result of handing a gift over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GiftOutcome {
    Accepted { affinity_gained: u32, message: String },
    /// The same gift was given before. Nothing changes.
    AlreadyGiven { message: String },
}

fn unlockable(
    id: String,
    name: &str,
    kind: UnlockableKind,
    description: String,
    required_affinity: u32,
) -> Unlockable {
    Unlockable {
        id,
        name: name.to_string(),
        kind,
        description,
        required_affinity,
        unlocked: false,
    }
}

fn default_unlockables(companion: CompanionId) -> Vec<Unlockable> {
    let c = companion.as_str();
    let mut items = vec![
        unlockable(format!("{c}_casual"), "Casual Outfit", UnlockableKind::Sprite, format!("{}'s casual weekend outfit", companion.display_name()), 20),
        unlockable(format!("{c}_special"), "Special Outfit", UnlockableKind::Sprite, "A special outfit for special occasions".into(), 50),
        unlockable(format!("{c}_bg_classroom"), "Classroom", UnlockableKind::Background, "Study together in the literature club classroom".into(), 15),
        unlockable(format!("{c}_bg_library"), "Library", UnlockableKind::Background, "A quiet library for focused study sessions".into(), 30),
        unlockable(format!("{c}_gift_cupcake"), "Cupcake", UnlockableKind::Gift, "A sweet treat to brighten their day".into(), 10),
        unlockable(format!("{c}_gift_book"), "Poetry Book", UnlockableKind::Gift, "A thoughtful gift for your companion".into(), 25),
    ];
    // the cupcake is available from the first meeting
    items[4].unlocked = true;

    let signature = match companion {
        CompanionId::Sayori => unlockable("sayori_gift_plushie".into(), "Cow Plushie", UnlockableKind::Gift, "A cute plushie that Sayori would love".into(), 40),
        CompanionId::Yuri => unlockable("yuri_gift_tea".into(), "Jasmine Tea Set", UnlockableKind::Gift, "A sophisticated tea set for Yuri".into(), 40),
        CompanionId::Natsuki => unlockable("natsuki_gift_manga".into(), "Manga Collection", UnlockableKind::Gift, "The latest volume of Natsuki's favorite manga".into(), 40),
        CompanionId::Monika => unlockable("monika_gift_pen".into(), "Fountain Pen", UnlockableKind::Gift, "An elegant pen for writing poetry".into(), 40),
    };
    items.push(signature);
    items
}

fn event(id: String, trigger: EventTrigger, value: Option<u32>, title: &str, content: &[&str]) -> DialogueEvent {
    DialogueEvent {
        id,
        trigger,
        trigger_value: value,
        title: title.to_string(),
        content: content.iter().map(|s| s.to_string()).collect(),
        seen: false,
    }
}

fn default_dialogue_events(companion: CompanionId) -> Vec<DialogueEvent> {
    let c = companion.as_str();
    let welcome = format!(
        "Hi there! I'm {}. I'm excited to help you stay productive!",
        companion.display_name()
    );
    let mut events = vec![
        event(format!("{c}_welcome"), EventTrigger::Affinity, Some(0), "First Meeting", &[&welcome, "Let's work hard together, okay?"]),
        event(format!("{c}_affinity_10"), EventTrigger::Affinity, Some(10), "Getting to Know You", &["I've really enjoyed our time together so far.", "I think we're going to make a great team!"]),
        event(format!("{c}_streak_7"), EventTrigger::Streak, Some(7), "One Week Streak", &["Wow, you've been consistent for a whole week!", "That's really impressive. Keep it up!"]),
    ];

    events.push(match companion {
        CompanionId::Sayori => event("sayori_inactivity".into(), EventTrigger::Inactivity, Some(3), "Missing You", &["Heyyy, where have you been? I've missed seeing you!", "Don't worry though, I'm just happy you're back now!"]),
        CompanionId::Yuri => event("yuri_achievement".into(), EventTrigger::Achievement, None, "Thoughtful Analysis", &["I've been reflecting on your progress...", "The way you've been developing your habits shows real dedication. It's... quite admirable."]),
        CompanionId::Natsuki => event("natsuki_daily".into(), EventTrigger::Daily, None, "Morning Motivation", &["Don't expect me to be impressed just because you showed up today!", "...but I guess it's good that you're here. Let's make today count, okay?"]),
        CompanionId::Monika => event("monika_affinity_25".into(), EventTrigger::Affinity, Some(25), "Special Connection", &["I've noticed something special about our connection.", "The way you approach your goals is fascinating. I feel like I understand you better now."]),
    });
    events
}

/// Mood from elapsed whole days since the last interaction.
pub fn mood_for(days_since_interaction: i64, consecutive_days: u32) -> CompanionMood {
    if days_since_interaction > 7 {
        CompanionMood::Sad
    } else if days_since_interaction > 3 {
        CompanionMood::Annoyed
    } else if days_since_interaction == 0 && consecutive_days > 2 {
        CompanionMood::Happy
    } else {
        CompanionMood::Neutral
    }
}

/// One point per minute for completed sessions, half that otherwise.
pub fn session_affinity_gain(duration_secs: u64, completed: bool) -> u32 {
    let per_point = if completed { 60 } else { 120 };
    u32::try_from(duration_secs / per_point).unwrap_or(u32::MAX)
}

impl CompanionData {
    /// First-reference state for a companion.
    pub fn initial(id: CompanionId, now: Timestamp) -> Self {
        Self {
            id,
            name: id.display_name().to_string(),
            personality: Personality::of(id),
            unlockables: default_unlockables(id),
            dialogue_events: default_dialogue_events(id),
            stats: CompanionStats::default(),
            affinity_level: 0,
            mood: CompanionMood::Happy,
            last_interaction: now,
        }
    }

    /// Add affinity, clamped. Returns the points actually gained.
    pub fn add_affinity(&mut self, points: u32) -> u32 {
        let before = self.affinity_level;
        self.affinity_level = before.saturating_add(points).min(MAX_AFFINITY);
        self.affinity_level - before
    }

    pub fn days_since_interaction(&self, now: &LocalTime) -> i64 {
        (now.with_timezone(&Utc) - self.last_interaction).num_days().max(0)
    }

    pub fn refresh_mood(&mut self, now: &LocalTime) -> CompanionMood {
        self.mood = mood_for(self.days_since_interaction(now), self.stats.consecutive_days);
        self.mood
    }

    fn touch_daily(&mut self, now: &LocalTime) {
        self.stats.consecutive_days = match self.stats.last_daily_interaction {
            None => 1,
            Some(last) => match day_gap(&last, now) {
                0 => self.stats.consecutive_days.max(1),
                1 => self.stats.consecutive_days + 1,
                _ => 1,
            },
        };
        self.stats.last_daily_interaction = Some(now.with_timezone(&Utc));
    }

    /// Apply a finished focus session. Returns the affinity gained.
    pub fn record_session(&mut self, duration_secs: u64, completed: bool, now: &LocalTime) -> u32 {
        let gained = self.add_affinity(session_affinity_gain(duration_secs, completed));
        self.stats.total_interaction_time += duration_secs;
        if completed {
            self.stats.sessions_completed += 1;
        }
        self.touch_daily(now);
        self.last_interaction = now.with_timezone(&Utc);
        self.refresh_mood(now);
        gained
    }

    /// Apply a completed goal. Returns the affinity gained.
    pub fn record_goal_completion(&mut self, is_companion_goal: bool, now: &LocalTime) -> u32 {
        self.stats.goals_completed += 1;
        let points = if is_companion_goal {
            COMPANION_GOAL_AFFINITY
        } else {
            OTHER_GOAL_AFFINITY
        };
        self.last_interaction = now.with_timezone(&Utc);
        self.add_affinity(points)
    }

    /// Flip every unlockable the current affinity now reaches. Returns their ids.
    pub fn unlock_eligible(&mut self) -> Vec<String> {
        let affinity = self.affinity_level;
        self.unlockables
            .iter_mut()
            .filter(|u| !u.unlocked && u.required_affinity <= affinity)
            .map(|u| {
                u.unlocked = true;
                u.id.clone()
            })
            .collect()
    }

    /// Mark and return the most significant unseen affinity or streak event.
    pub fn next_dialogue_event(&mut self) -> Option<DialogueEvent> {
        let affinity = self.affinity_level;
        let streak = self.stats.consecutive_days;

        let index = self
            .dialogue_events
            .iter()
            .enumerate()
            .filter(|(_, e)| !e.seen)
            .filter_map(|(i, e)| {
                let value = e.trigger_value?;
                let reached = match e.trigger {
                    EventTrigger::Affinity => value <= affinity,
                    EventTrigger::Streak => value <= streak,
                    _ => false,
                };
                reached.then_some((i, value))
            })
            // first of the highest trigger values wins
            .fold(None, |best: Option<(usize, u32)>, (i, value)| match best {
                Some((_, best_value)) if best_value >= value => best,
                _ => Some((i, value)),
            })
            .map(|(i, _)| i)?;

        let event = &mut self.dialogue_events[index];
        event.seen = true;
        Some(event.clone())
    }

    pub fn find_unlockable(&self, id: &str) -> Option<&Unlockable> {
        self.unlockables.iter().find(|u| u.id == id)
    }

    pub fn has_received(&self, gift_id: &str) -> bool {
        self.stats.gifts_received.iter().any(|g| g == gift_id)
    }

    /// Hand a gift over. Unknown or locked gifts are rejected.
    pub fn give_gift(&mut self, gift_id: &str) -> Result<GiftOutcome> {
        let gift = self
            .unlockables
            .iter()
            .find(|u| u.id == gift_id && u.kind == UnlockableKind::Gift)
            .ok_or_else(|| ValidationError::UnknownGift(gift_id.to_string()))?;
        if !gift.unlocked {
            return Err(ValidationError::LockedGift(gift_id.to_string()));
        }

        if self.has_received(gift_id) {
            return Ok(GiftOutcome::AlreadyGiven {
                message: "Thank you for the gift again!".to_string(),
            });
        }

        let message = messages::gift_thanks(self.id, &gift.name);
        let points = gift.required_affinity / 5;
        let affinity_gained = self.add_affinity(points);
        self.stats.gifts_received.push(gift_id.to_string());
        Ok(GiftOutcome::Accepted {
            affinity_gained,
            message,
        })
    }
}
