use std::collections::BTreeMap;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use kizuna_core::companion::{messages, DialogueEvent};
use kizuna_core::dialogue::{DialogueContext, DialogueEngine};
use kizuna_core::{CompanionData, CompanionId, DialogueRequest, GiftOutcome, UserDocument};

use crate::error::Result;
use crate::queue::{PendingKind, PendingUpdate};
use crate::remote::{self, Remote};
use crate::sync::{Domain, DomainStore, StoreSnapshot, SyncCore, SyncReport};

pub type Companions = BTreeMap<CompanionId, CompanionData>;

pub struct CompanionDomain;

#[async_trait]
impl Domain for CompanionDomain {
    type Data = Companions;

    fn name(&self) -> &'static str {
        "companion"
    }

    async fn replay(&self, remote: &Remote, update: &PendingUpdate) -> Result<()> {
        remote::companion::replay(remote, update).await
    }

    fn pull(&self, doc: &UserDocument) -> Self::Data {
        doc.companions.clone()
    }
}

/// What a session or goal did to a companion.
#[derive(Debug, Clone, PartialEq)]
pub struct CompanionChange {
    pub affinity: u32,
    pub gained: u32,
    /// Unlockables that flipped with this change
    pub unlocked: Vec<String>,
    /// Dialogue event that fired, if any
    pub event: Option<DialogueEvent>,
}

fn settle(data: &mut CompanionData, gained: u32) -> CompanionChange {
    let unlocked = data.unlock_eligible();
    let event = data.next_dialogue_event();
    CompanionChange {
        affinity: data.affinity_level,
        gained,
        unlocked,
        event,
    }
}

pub struct CompanionStore {
    core: SyncCore<CompanionDomain>,
    engine: DialogueEngine,
}

impl CompanionStore {
    pub fn new(remote: Remote) -> Result<Self> {
        let config = remote.ctx().config();
        let cooldown = config.companion.cooldown();
        let engine = DialogueEngine::builtin()?.with_sampling(config.dialogue.sampling);
        Ok(Self {
            core: SyncCore::new(CompanionDomain, remote, cooldown, Companions::new()),
            engine,
        })
    }

    pub fn core(&self) -> &SyncCore<CompanionDomain> {
        &self.core
    }

    pub fn engine(&self) -> &DialogueEngine {
        &self.engine
    }

    pub async fn get(&self, companion: CompanionId) -> Option<CompanionData> {
        self.core.read(|state| state.data.get(&companion).cloned()).await
    }

    pub async fn affinity(&self, companion: CompanionId) -> u32 {
        self.core
            .read(|state| state.data.get(&companion).map_or(0, |c| c.affinity_level))
            .await
    }

    pub async fn affinities(&self) -> BTreeMap<CompanionId, u32> {
        self.core
            .read(|state| state.data.iter().map(|(id, c)| (*id, c.affinity_level)).collect())
            .await
    }

    /// Credit a finished focus session to a companion.
    pub async fn after_session(&self, companion: CompanionId, duration_secs: u64, completed: bool) -> Result<CompanionChange> {
        let now = self.core.ctx().local_now();
        let created = self.core.ctx().now();
        self.core
            .mutate(|data, intents| {
                let entry = data
                    .entry(companion)
                    .or_insert_with(|| CompanionData::initial(companion, created));
                let gained = entry.record_session(duration_secs, completed, &now);
                let change = settle(entry, gained);
                intents.push(PendingKind::UpdateCompanionAfterSession {
                    companion,
                    duration_secs,
                    completed,
                });
                debug!(%companion, gained, affinity = change.affinity, "Session recorded for companion");
                Ok(change)
            })
            .await
    }

    /// Credit a completed goal. Companion goals are worth more.
    pub async fn after_goal(&self, companion: CompanionId, is_companion_goal: bool) -> Result<CompanionChange> {
        let now = self.core.ctx().local_now();
        let created = self.core.ctx().now();
        self.core
            .mutate(|data, intents| {
                let entry = data
                    .entry(companion)
                    .or_insert_with(|| CompanionData::initial(companion, created));
                let gained = entry.record_goal_completion(is_companion_goal, &now);
                let change = settle(entry, gained);
                intents.push(PendingKind::UpdateCompanionAfterGoal {
                    companion,
                    is_companion_goal,
                });
                Ok(change)
            })
            .await
    }

    /// Give an unlocked gift. Unknown and locked gifts are rejected; a gift
    /// already given is acknowledged without queueing anything.
    pub async fn give_gift(&self, companion: CompanionId, gift_id: &str) -> Result<GiftOutcome> {
        let created = self.core.ctx().now();
        self.core
            .mutate(|data, intents| {
                let entry = data
                    .entry(companion)
                    .or_insert_with(|| CompanionData::initial(companion, created));
                let outcome = entry.give_gift(gift_id)?;
                match &outcome {
                    GiftOutcome::Accepted { affinity_gained, .. } => {
                        entry.unlock_eligible();
                        intents.push(PendingKind::GiveGift {
                            companion,
                            gift_id: gift_id.to_string(),
                        });
                        info!(%companion, gift = %gift_id, affinity_gained, "Gift given");
                    }
                    GiftOutcome::AlreadyGiven { .. } => {
                        warn!(%companion, gift = %gift_id, "Gift already given");
                    }
                }
                Ok(outcome)
            })
            .await
    }

    /// Dialogue request seeded from the companion's current state.
    pub async fn request(&self, companion: CompanionId) -> DialogueRequest {
        let now = self.core.ctx().local_now();
        self.core
            .read(|state| match state.data.get(&companion) {
                Some(data) => DialogueRequest::new(companion, data.mood, data.affinity_level, now)
                    .with_streak(data.stats.consecutive_days),
                None => DialogueRequest::new(companion, Default::default(), 0, now),
            })
            .await
    }

    pub async fn speak<R: rand::Rng + ?Sized>(
        &self,
        companion: CompanionId,
        context: Option<DialogueContext>,
        rng: &mut R,
    ) -> kizuna_core::DialogueLine {
        let mut request = self.request(companion).await;
        request.context = context;
        self.engine.select(&request, rng)
    }

    pub fn greeting(&self, companion: CompanionId) -> String {
        messages::greeting(companion, &self.core.ctx().local_now())
    }

    /// Nudge for a companion left alone for two days or more.
    pub async fn inactivity_reminder(&self, companion: CompanionId) -> Option<String> {
        let now = self.core.ctx().local_now();
        let days_away = self.get(companion).await?.days_since_interaction(&now);
        messages::inactivity_reminder(companion, days_away)
    }

    pub async fn export_state(&self) -> StoreSnapshot<Companions> {
        self.core.export_state().await
    }

    pub async fn restore_state(&self, snapshot: StoreSnapshot<Companions>) {
        self.core.restore_state(snapshot).await
    }
}

#[async_trait]
impl DomainStore for CompanionStore {
    fn name(&self) -> &'static str {
        self.core.name()
    }

    async fn sync(&self, force: bool) -> Result<SyncReport> {
        self.core.sync(force).await
    }

    async fn pending_len(&self) -> usize {
        self.core.pending_len().await
    }

    async fn last_error(&self) -> Option<String> {
        self.core.last_error().await
    }
}
