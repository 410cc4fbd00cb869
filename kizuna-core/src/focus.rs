//! Focus sessions and the aggregate counters kept on the user document.

use chrono::Duration;
use serde::{Deserialize, Serialize};

#[cfg(feature = "typescript")]
use ts_rs::TS;

use crate::calendar::{day_gap, same_week, LocalTime, Timestamp};
use crate::types::CompanionId;

/// Default cap on `recentSessions`.
pub const RECENT_SESSIONS_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct BreakStats {
    pub count: u32,
    /// Seconds
    pub total_duration: u64,
}

/// One finished timer run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct FocusSession {
    pub id: String,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    /// Seconds
    pub duration: u64,
    pub completed: bool,
    pub companion_id: CompanionId,
    #[serde(default)]
    pub breaks: BreakStats,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl FocusSession {
    /// A session that ended at `end_time` after `duration_secs`.
    pub fn finished(companion_id: CompanionId, end_time: Timestamp, duration_secs: u64, completed: bool) -> Self {
        let span = i64::try_from(duration_secs).unwrap_or(i64::MAX);
        Self {
            id: format!("session_{}", uuid::Uuid::new_v4().simple()),
            start_time: end_time - Duration::seconds(span),
            end_time,
            duration: duration_secs,
            completed,
            companion_id,
            breaks: BreakStats::default(),
            tags: Vec::new(),
        }
    }

    pub fn with_breaks(mut self, count: u32, total_duration: u64) -> Self {
        self.breaks = BreakStats { count, total_duration };
        self
    }

    /// Minutes credited to goals and achievements. Partial minutes are dropped.
    pub fn whole_minutes(&self) -> u32 {
        u32::try_from(self.duration / 60).unwrap_or(u32::MAX)
    }
}

/// Counters are in seconds unless named otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct FocusStats {
    pub total_focus_time: u64,
    pub todays_focus_time: u64,
    pub weekly_focus_time: u64,
    pub total_sessions: u32,
    pub completed_sessions: u32,
    pub daily_streak: u32,
    pub longest_streak: u32,
    /// Percentage of sessions completed
    pub task_completion_rate: u32,
    pub total_breaks: u32,
    pub average_session_duration: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_session_date: Option<Timestamp>,
}

impl FocusStats {
    fn is_first_session(&self) -> bool {
        self.last_session_date.is_none() || (self.total_sessions == 0 && self.total_focus_time == 0)
    }

    /// Fold one session into the counters. `now` decides day and week
    /// boundaries.
    pub fn record(&mut self, session: &FocusSession, now: &LocalTime) {
        let first = self.is_first_session();
        let gap = match (first, self.last_session_date.as_ref()) {
            (false, Some(last)) => day_gap(last, now),
            _ => 0,
        };
        let new_week = first
            || self
                .last_session_date
                .as_ref()
                .map_or(true, |last| !same_week(last, now));

        self.daily_streak = if first || gap > 1 {
            1
        } else if gap == 1 {
            self.daily_streak + 1
        } else {
            self.daily_streak.max(1)
        };
        self.longest_streak = self.longest_streak.max(self.daily_streak);

        self.todays_focus_time = if first || gap != 0 {
            session.duration
        } else {
            self.todays_focus_time + session.duration
        };
        self.weekly_focus_time = if new_week {
            session.duration
        } else {
            self.weekly_focus_time + session.duration
        };

        self.total_sessions += 1;
        self.total_focus_time += session.duration;
        if session.completed {
            self.completed_sessions += 1;
        }
        self.average_session_duration =
            (self.total_focus_time as f64 / f64::from(self.total_sessions)).round() as u64;
        self.task_completion_rate =
            (f64::from(self.completed_sessions) * 100.0 / f64::from(self.total_sessions)).round() as u32;
        self.total_breaks += session.breaks.count;
        self.last_session_date = Some(session.end_time);
    }

    pub fn total_focus_minutes(&self) -> u32 {
        u32::try_from(self.total_focus_time / 60).unwrap_or(u32::MAX)
    }
}

/// Newest first, capped at `limit`.
pub fn push_recent(recent: &mut Vec<FocusSession>, session: FocusSession, limit: usize) {
    recent.insert(0, session);
    recent.truncate(limit);
}
