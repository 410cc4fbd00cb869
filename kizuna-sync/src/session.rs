//! End of a focus session, fanned out to every store.

use rand::Rng;
use serde::Serialize;
use tracing::{info, warn};

use kizuna_core::dialogue::FocusSnapshot;
use kizuna_core::{AchievementCheck, CompanionId, DialogueLine, FocusSession};

use crate::error::Result;
use crate::stores::Stores;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub companion: CompanionId,
    /// Affinity with the selected companion after the session
    pub affinity: u32,
    pub affinity_gained: u32,
    /// Goals this session completed
    pub completed_goals: Vec<String>,
    /// Achievements unlocked by the session or by the goals it completed
    pub unlocked: Vec<String>,
    pub line: String,
    /// False when any store failed its closing sync; the updates stay queued
    pub synced: bool,
}

/// Record a finished session everywhere and force a sync.
///
/// Every step is optimistic. A failed sync at the end leaves the updates
/// queued for the next attempt and is reported through `synced`.
pub async fn complete_focus_session<R: Rng + ?Sized>(
    stores: &Stores,
    session: FocusSession,
    rng: &mut R,
) -> Result<SessionSummary> {
    let ctx = stores.user.core().ctx().clone();
    let unlocked_before = stores.achievements.unlocked_ids().await;
    let selected = stores.user.selected_companion().await;
    let session_minutes = session.whole_minutes();

    let stats = stores.user.record_focus_session(session.clone()).await?;

    let change = stores
        .companion
        .after_session(selected, session.duration, session.completed)
        .await?;

    stores
        .achievements
        .check(AchievementCheck::Session {
            started_at: ctx.to_local(session.start_time),
            session_minutes,
            total_minutes: stats.total_focus_minutes(),
            total_sessions: stats.total_sessions,
        })
        .await?;
    stores
        .achievements
        .check(AchievementCheck::Streak {
            days: stats.daily_streak,
        })
        .await?;
    stores
        .achievements
        .check(AchievementCheck::Companion {
            companion: selected,
            affinity: change.affinity,
            all_affinities: Some(stores.companion.affinities().await),
        })
        .await?;

    let completed_goals = stores.goals.add_focus_minutes(session_minutes).await?;

    let unlocked: Vec<String> = stores
        .achievements
        .unlocked()
        .await
        .into_iter()
        .map(|a| a.id)
        .filter(|id| !unlocked_before.contains(id))
        .collect();

    let mood = stores
        .companion
        .get(selected)
        .await
        .map(|c| c.mood)
        .unwrap_or_default();
    let snapshot = FocusSnapshot {
        current_session_time: session_minutes,
        daily_focus_time: u32::try_from(stats.todays_focus_time / 60).unwrap_or(u32::MAX),
        breaks_taken: session.breaks.count,
        total_sessions: Some(stats.total_sessions),
    };
    let DialogueLine { text: line, .. } = stores.companion.engine().session_complete_line(
        selected,
        mood,
        change.affinity,
        snapshot,
        ctx.local_now(),
        rng,
    );

    let mut synced = true;
    for (store, result) in stores.handles().iter().zip(stores.sync_all(true).await) {
        if let Err(err) = result {
            warn!(store = store.name(), error = %err, "Closing sync failed, updates stay queued");
            synced = false;
        }
    }

    info!(
        session = %session.id,
        minutes = session_minutes,
        goals = completed_goals.len(),
        unlocked = unlocked.len(),
        "Focus session completed"
    );
    Ok(SessionSummary {
        companion: selected,
        affinity: change.affinity,
        affinity_gained: change.gained,
        completed_goals,
        unlocked,
        line,
        synced,
    })
}
