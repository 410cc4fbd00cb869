use serde_json::json;
use tracing::{debug, info, warn};

use kizuna_core::companion::{session_affinity_gain, COMPANION_GOAL_AFFINITY, MAX_AFFINITY, OTHER_GOAL_AFFINITY};
use kizuna_core::{CompanionData, CompanionId, GiftOutcome};

use super::Remote;
use crate::error::{Result, SyncError};
use crate::gateway::FieldUpdate;
use crate::queue::{PendingKind, PendingUpdate};

/// Replay a queued companion change against the remote document.
pub async fn replay(remote: &Remote, update: &PendingUpdate) -> Result<()> {
    match &update.kind {
        PendingKind::UpdateCompanionAfterSession {
            companion,
            duration_secs,
            completed,
        } => {
            let now = remote.ctx().to_local(update.enqueued_at);
            apply(remote, update, *companion, |data| {
                let gained = data.record_session(*duration_secs, *completed, &now);
                debug!(%companion, gained, "Session affinity replayed");
                Some(Counters {
                    affinity: session_affinity_gain(*duration_secs, *completed),
                    interaction_secs: *duration_secs,
                    sessions: u32::from(*completed),
                    ..Counters::default()
                })
            })
            .await
        }
        PendingKind::UpdateCompanionAfterGoal {
            companion,
            is_companion_goal,
        } => {
            let now = remote.ctx().to_local(update.enqueued_at);
            apply(remote, update, *companion, |data| {
                data.record_goal_completion(*is_companion_goal, &now);
                Some(Counters {
                    affinity: if *is_companion_goal {
                        COMPANION_GOAL_AFFINITY
                    } else {
                        OTHER_GOAL_AFFINITY
                    },
                    goals: 1,
                    ..Counters::default()
                })
            })
            .await
        }
        PendingKind::GiveGift { companion, gift_id } => {
            apply(remote, update, *companion, |data| match data.give_gift(gift_id) {
                Ok(GiftOutcome::Accepted { affinity_gained, .. }) => {
                    info!(%companion, gift = %gift_id, affinity_gained, "Gift accepted");
                    Some(Counters {
                        affinity: data.find_unlockable(gift_id).map_or(0, |u| u.required_affinity / 5),
                        gift: Some(gift_id.clone()),
                        ..Counters::default()
                    })
                }
                Ok(GiftOutcome::AlreadyGiven { .. }) => None,
                Err(err) => {
                    warn!(%companion, gift = %gift_id, error = %err, "Stored companion rejects the gift, dropping it");
                    None
                }
            })
            .await
        }
        other => Err(SyncError::UnsupportedUpdate {
            store: "companion",
            kind: other.name(),
        }),
    }
}

/// Counter movement of one companion change, written as increments so a
/// goal reward landing on the same companion in between is kept.
#[derive(Debug, Default)]
struct Counters {
    /// Nominal points, clamped by the store
    affinity: u32,
    interaction_secs: u64,
    sessions: u32,
    goals: u32,
    gift: Option<String>,
}

/// Run `change` against the stored companion and write back only the fields
/// it moved. A companion missing from the document is written whole.
async fn apply<F>(remote: &Remote, update: &PendingUpdate, companion: CompanionId, change: F) -> Result<()>
where
    F: FnOnce(&mut CompanionData) -> Option<Counters>,
{
    let doc = remote.document().await?;
    let stored = doc.companions.get(&companion).cloned();
    let mut data = stored
        .clone()
        .unwrap_or_else(|| CompanionData::initial(companion, remote.now()));

    let Some(counters) = change(&mut data) else {
        return Ok(());
    };
    for id in data.unlock_eligible() {
        info!(%companion, unlockable = %id, "Unlockable unlocked");
    }
    if let Some(event) = data.next_dialogue_event() {
        debug!(%companion, event = %event.id, "Dialogue event marked seen");
    }

    let base = format!("companions.{companion}");
    let writes = match stored {
        None => FieldUpdate::keyed(update.operation_key()).set_json(base, &data)?,
        Some(before) => field_writes(FieldUpdate::keyed(update.operation_key()), &base, &before, &data, counters)?,
    };
    if writes.is_empty() {
        return Ok(());
    }
    remote.write(writes).await?;
    Ok(())
}

fn field_writes(
    mut writes: FieldUpdate,
    base: &str,
    before: &CompanionData,
    after: &CompanionData,
    counters: Counters,
) -> Result<FieldUpdate> {
    if counters.affinity > 0 {
        writes = writes.increment_capped(
            format!("{base}.affinityLevel"),
            i64::from(counters.affinity),
            i64::from(MAX_AFFINITY),
        );
    }
    if counters.interaction_secs > 0 {
        let secs = i64::try_from(counters.interaction_secs).unwrap_or(i64::MAX);
        writes = writes.increment(format!("{base}.stats.totalInteractionTime"), secs);
    }
    if counters.sessions > 0 {
        writes = writes.increment(format!("{base}.stats.sessionsCompleted"), i64::from(counters.sessions));
    }
    if counters.goals > 0 {
        writes = writes.increment(format!("{base}.stats.goalsCompleted"), i64::from(counters.goals));
    }
    if let Some(gift) = counters.gift {
        writes = writes.array_union(format!("{base}.stats.giftsReceived"), vec![json!(gift)]);
    }

    // The companion store is the only writer of the fields below.
    if after.stats.consecutive_days != before.stats.consecutive_days {
        writes = writes.set(format!("{base}.stats.consecutiveDays"), json!(after.stats.consecutive_days));
    }
    if after.stats.last_daily_interaction != before.stats.last_daily_interaction {
        writes = writes.set_json(format!("{base}.stats.lastDailyInteraction"), &after.stats.last_daily_interaction)?;
    }
    if after.last_interaction != before.last_interaction {
        writes = writes.set_json(format!("{base}.lastInteraction"), &after.last_interaction)?;
    }
    if after.mood != before.mood {
        writes = writes.set_json(format!("{base}.mood"), &after.mood)?;
    }
    if after.unlockables != before.unlockables {
        writes = writes.set_json(format!("{base}.unlockables"), &after.unlockables)?;
    }
    if after.dialogue_events != before.dialogue_events {
        writes = writes.set_json(format!("{base}.dialogueEvents"), &after.dialogue_events)?;
    }
    Ok(writes)
}
