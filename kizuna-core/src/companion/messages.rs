//! Fixed per-companion lines used outside the dialogue catalog.

use chrono::Timelike;

use crate::calendar::LocalTime;
use crate::types::CompanionId;

/// Days away before a reminder is shown.
pub const INACTIVITY_REMINDER_DAYS: i64 = 2;

fn greeting_band(hour: u32) -> &'static str {
    if hour < 12 {
        "morning"
    } else if hour < 18 {
        "afternoon"
    } else {
        "evening"
    }
}

pub fn greeting(companion: CompanionId, now: &LocalTime) -> String {
    let hour = now.hour();
    let band = greeting_band(hour);
    match companion {
        CompanionId::Sayori if hour < 10 => {
            "Good morning! I'm still a bit sleepy, but ready to help you be productive!".to_string()
        }
        CompanionId::Sayori => format!("Good {band}! Let's make today super productive together!"),
        CompanionId::Yuri => {
            format!("Good {band}. I hope you're finding some peace amidst your busy schedule.")
        }
        CompanionId::Natsuki if hour < 10 => {
            "Morning... *yawn* Don't expect me to be all peppy this early!".to_string()
        }
        CompanionId::Natsuki => format!("Hey there! Ready to get some work done this {band}?"),
        CompanionId::Monika => format!(
            "Good {band}! I've been waiting for you. Let's make the most of our time together."
        ),
    }
}

pub fn session_start(companion: CompanionId) -> &'static str {
    match companion {
        CompanionId::Sayori => "Yay! Let's do our best together! I believe in you!",
        CompanionId::Yuri => "Take a deep breath... focus your mind... I'll be here with you.",
        CompanionId::Natsuki => "Alright, let's show everyone what you're made of! No slacking!",
        CompanionId::Monika => {
            "I've prepared everything for a productive session. Let's make every minute count!"
        }
    }
}

pub fn session_complete(companion: CompanionId) -> &'static str {
    match companion {
        CompanionId::Sayori => "Woohoo! You did it! I'm so proud of you!",
        CompanionId::Yuri => "Excellent work. The way you maintained focus was... impressive.",
        CompanionId::Natsuki => "Not bad at all! See what happens when you actually try?",
        CompanionId::Monika => "Perfect execution! Your dedication is truly inspiring.",
    }
}

pub fn gift_thanks(companion: CompanionId, gift_name: &str) -> String {
    match companion {
        CompanionId::Sayori => format!("Waaaah! A {gift_name}?! For me?! Thank you so much!!"),
        CompanionId::Yuri => {
            format!("Oh my... a {gift_name}. That's very thoughtful of you. I'll treasure it.")
        }
        CompanionId::Natsuki => format!(
            "A {gift_name}? I mean, it's not like I wanted one or anything... but thanks."
        ),
        CompanionId::Monika => format!(
            "A {gift_name}! How did you know? You really do pay attention to the details."
        ),
    }
}

/// Reminder after [`INACTIVITY_REMINDER_DAYS`] or more days away.
pub fn inactivity_reminder(companion: CompanionId, days_away: i64) -> Option<String> {
    if days_away < INACTIVITY_REMINDER_DAYS {
        return None;
    }
    let line = match companion {
        CompanionId::Sayori => {
            "Heyyy! I haven't seen you in a while! I miss our productive time together!".to_string()
        }
        CompanionId::Yuri => "I've noticed your absence lately... I hope everything is alright. Perhaps we could resume our focus sessions soon?".to_string(),
        CompanionId::Natsuki => {
            format!("{days_away} days without showing up? You better have a good excuse!")
        }
        CompanionId::Monika => "I've been keeping track, and it's been a while since our last session. Your goals are still waiting for you!".to_string(),
    };
    Some(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    fn at(h: u32) -> LocalTime {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 6, h, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_greeting_varies_by_hour() {
        assert!(greeting(CompanionId::Natsuki, &at(8)).contains("*yawn*"));
        assert_eq!(
            greeting(CompanionId::Natsuki, &at(15)),
            "Hey there! Ready to get some work done this afternoon?"
        );
        assert!(greeting(CompanionId::Yuri, &at(19)).starts_with("Good evening."));
    }

    #[test]
    fn test_inactivity_reminder_threshold() {
        assert!(inactivity_reminder(CompanionId::Natsuki, 1).is_none());
        assert_eq!(
            inactivity_reminder(CompanionId::Natsuki, 4).unwrap(),
            "4 days without showing up? You better have a good excuse!"
        );
    }
}
