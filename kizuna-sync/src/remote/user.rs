use tracing::{debug, info};

use kizuna_core::focus::push_recent;
use kizuna_core::{CompanionId, FocusSession, SettingsUpdate, UserDocument};

use super::Remote;
use crate::error::{Result, SyncError};
use crate::gateway::FieldUpdate;
use crate::queue::{PendingKind, PendingUpdate};

/// Replay a queued focus session or settings change.
pub async fn replay(remote: &Remote, update: &PendingUpdate) -> Result<()> {
    match &update.kind {
        PendingKind::RecordFocusSession { session } => record_session(remote, update, session).await,
        PendingKind::UpdateSettings { update: settings } => update_settings(remote, update, settings).await,
        other => Err(SyncError::UnsupportedUpdate {
            store: "user",
            kind: other.name(),
        }),
    }
}

/// Create the owner's document if it does not exist yet. Returns whether it
/// was created.
pub async fn ensure_document(remote: &Remote, email: &str, selected: CompanionId) -> Result<bool> {
    let doc = UserDocument::initial(remote.owner(), email, selected, remote.now());
    let created = remote.gateway().create_document(remote.owner(), &doc).await?;
    if created {
        info!(owner = %remote.owner(), companion = %selected, "User document created");
    } else {
        debug!(owner = %remote.owner(), "User document already exists");
    }
    Ok(created)
}

async fn record_session(remote: &Remote, update: &PendingUpdate, session: &FocusSession) -> Result<()> {
    let doc = remote.document().await?;
    let mut stats = doc.focus_stats;
    stats.record(session, &remote.ctx().to_local(update.enqueued_at));

    let mut recent = doc.recent_sessions;
    let limit = remote.ctx().config().user.recent_sessions_limit;
    push_recent(&mut recent, session.clone(), limit);

    let writes = FieldUpdate::keyed(update.operation_key())
        .set_json("focusStats", &stats)?
        .set_json("recentSessions", &recent)?
        .set_json("base.lastActive", &remote.now())?;
    remote.write(writes).await?;
    debug!(session = %session.id, total = stats.total_sessions, "Focus session stored");
    Ok(())
}

async fn update_settings(remote: &Remote, update: &PendingUpdate, settings: &SettingsUpdate) -> Result<()> {
    let mut writes = FieldUpdate::keyed(update.operation_key());
    if let Some(companion) = settings.selected_companion {
        writes = writes.set_json("settings.selectedCompanion", &companion)?;
    }
    if let Some(timer) = &settings.timer_settings {
        writes = writes.set_json("settings.timerSettings", timer)?;
    }
    if let Some(theme) = &settings.theme {
        writes = writes.set_json("settings.theme", theme)?;
    }
    if writes.is_empty() {
        return Ok(());
    }
    remote.write(writes).await?;
    Ok(())
}
