//! Process-local store. Used by tests and when no database is configured.

use super::{
    ActionCatalog, EventStore, HistoryProvider, PlanStore, StateStore, StoreResult,
    TriggerDateStore, UserProfile,
};
use crate::analytics::alerts::ProactiveAlert;
use crate::domain::crisis::{CrisisDetectionResult, CrisisEvent};
use crate::domain::metrics::DatedCheckin;
use crate::domain::plan::{ActionTemplate, DailyPlan};
use crate::domain::trigger_date::TriggerDate;
use crate::error::StoreError;
use crate::services::adaptive_mode::AdaptiveModeState;
use crate::services::adherence::AdherenceState;
use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Record families that can be switched off to simulate an outage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    Checkins,
    CrisisEvents,
    TriggerDates,
    Plans,
    Catalog,
    State,
}

#[derive(Default)]
struct Inner {
    checkins: HashMap<Uuid, BTreeMap<NaiveDate, DatedCheckin>>,
    crisis_events: HashMap<Uuid, Vec<CrisisEvent>>,
    trigger_dates: HashMap<Uuid, Vec<TriggerDate>>,
    plans: HashMap<(Uuid, NaiveDate), DailyPlan>,
    templates: Vec<ActionTemplate>,
    profiles: HashMap<Uuid, UserProfile>,
    modes: HashMap<Uuid, AdaptiveModeState>,
    adherence: HashMap<Uuid, AdherenceState>,
    alerts: HashMap<Uuid, ProactiveAlert>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    down: RwLock<HashSet<Family>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_catalog(templates: Vec<ActionTemplate>) -> Self {
        Self {
            inner: RwLock::new(Inner {
                templates,
                ..Inner::default()
            }),
            down: RwLock::new(HashSet::new()),
        }
    }

    pub async fn set_unavailable(&self, family: Family, unavailable: bool) {
        let mut down = self.down.write().await;
        if unavailable {
            down.insert(family);
        } else {
            down.remove(&family);
        }
    }

    async fn guard(&self, family: Family) -> StoreResult<()> {
        if self.down.read().await.contains(&family) {
            return Err(StoreError::Unavailable(format!("{:?} store is offline", family)));
        }
        Ok(())
    }
}

#[async_trait]
impl HistoryProvider for MemoryStore {
    async fn recent_checkins(
        &self,
        user_id: Uuid,
        today: NaiveDate,
        days: i64,
    ) -> StoreResult<Vec<DatedCheckin>> {
        self.guard(Family::Checkins).await?;
        let inner = self.inner.read().await;
        let Some(days_map) = inner.checkins.get(&user_id) else {
            return Ok(Vec::new());
        };
        let from = today - Duration::days(days.max(1) - 1);
        Ok(days_map
            .range(from..=today)
            .rev()
            .map(|(_, checkin)| *checkin)
            .collect())
    }

    async fn upsert_checkin(&self, user_id: Uuid, checkin: DatedCheckin) -> StoreResult<()> {
        self.guard(Family::Checkins).await?;
        self.inner
            .write()
            .await
            .checkins
            .entry(user_id)
            .or_default()
            .insert(checkin.date, checkin);
        Ok(())
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn has_recent_crisis_event(&self, user_id: Uuid, cooldown_hours: i64) -> StoreResult<bool> {
        self.guard(Family::CrisisEvents).await?;
        let cutoff = Utc::now() - Duration::hours(cooldown_hours);
        Ok(self
            .inner
            .read()
            .await
            .crisis_events
            .get(&user_id)
            .map(|events| events.iter().any(|e| e.created_at >= cutoff))
            .unwrap_or(false))
    }

    async fn create_crisis_event(
        &self,
        user_id: Uuid,
        checkin_date: NaiveDate,
        result: &CrisisDetectionResult,
    ) -> StoreResult<Uuid> {
        self.guard(Family::CrisisEvents).await?;
        let event = CrisisEvent::from_result(user_id, checkin_date, result).ok_or_else(|| {
            StoreError::Corrupt("crisis event without a positive detection".to_string())
        })?;
        let id = event.id;
        self.inner
            .write()
            .await
            .crisis_events
            .entry(user_id)
            .or_default()
            .push(event);
        Ok(id)
    }

    async fn acknowledge_crisis_event(&self, user_id: Uuid, event_id: Uuid) -> StoreResult<()> {
        self.guard(Family::CrisisEvents).await?;
        let mut inner = self.inner.write().await;
        let event = inner
            .crisis_events
            .get_mut(&user_id)
            .and_then(|events| events.iter_mut().find(|e| e.id == event_id))
            .ok_or(StoreError::NotFound)?;
        event.acknowledged = true;
        Ok(())
    }

    async fn list_crisis_events(&self, user_id: Uuid) -> StoreResult<Vec<CrisisEvent>> {
        self.guard(Family::CrisisEvents).await?;
        let mut events = self
            .inner
            .read()
            .await
            .crisis_events
            .get(&user_id)
            .cloned()
            .unwrap_or_default();
        events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(events)
    }
}

#[async_trait]
impl TriggerDateStore for MemoryStore {
    async fn list_trigger_dates(&self, user_id: Uuid) -> StoreResult<Vec<TriggerDate>> {
        self.guard(Family::TriggerDates).await?;
        let mut dates = self
            .inner
            .read()
            .await
            .trigger_dates
            .get(&user_id)
            .cloned()
            .unwrap_or_default();
        dates.sort_by_key(|t| t.date);
        Ok(dates)
    }

    async fn create_trigger_date(&self, user_id: Uuid, trigger: &TriggerDate) -> StoreResult<()> {
        self.guard(Family::TriggerDates).await?;
        self.inner
            .write()
            .await
            .trigger_dates
            .entry(user_id)
            .or_default()
            .push(trigger.clone());
        Ok(())
    }

    async fn update_trigger_date(&self, user_id: Uuid, trigger: &TriggerDate) -> StoreResult<()> {
        self.guard(Family::TriggerDates).await?;
        let mut inner = self.inner.write().await;
        let existing = inner
            .trigger_dates
            .get_mut(&user_id)
            .and_then(|dates| dates.iter_mut().find(|t| t.id == trigger.id))
            .ok_or(StoreError::NotFound)?;
        *existing = trigger.clone();
        Ok(())
    }

    async fn delete_trigger_date(&self, user_id: Uuid, trigger_id: Uuid) -> StoreResult<()> {
        self.guard(Family::TriggerDates).await?;
        let mut inner = self.inner.write().await;
        let dates = inner
            .trigger_dates
            .get_mut(&user_id)
            .ok_or(StoreError::NotFound)?;
        let before = dates.len();
        dates.retain(|t| t.id != trigger_id);
        if dates.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl PlanStore for MemoryStore {
    async fn get_plan(&self, user_id: Uuid, plan_date: NaiveDate) -> StoreResult<Option<DailyPlan>> {
        self.guard(Family::Plans).await?;
        Ok(self
            .inner
            .read()
            .await
            .plans
            .get(&(user_id, plan_date))
            .cloned())
    }

    async fn save_plan(&self, plan: &DailyPlan) -> StoreResult<()> {
        self.guard(Family::Plans).await?;
        self.inner
            .write()
            .await
            .plans
            .insert((plan.user_id, plan.plan_date), plan.clone());
        Ok(())
    }
}

#[async_trait]
impl ActionCatalog for MemoryStore {
    async fn active_templates(&self) -> StoreResult<Vec<ActionTemplate>> {
        self.guard(Family::Catalog).await?;
        Ok(self
            .inner
            .read()
            .await
            .templates
            .iter()
            .filter(|t| t.active)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn load_profile(&self, user_id: Uuid) -> StoreResult<UserProfile> {
        self.guard(Family::State).await?;
        Ok(self
            .inner
            .read()
            .await
            .profiles
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn save_profile(&self, user_id: Uuid, profile: &UserProfile) -> StoreResult<()> {
        self.guard(Family::State).await?;
        self.inner
            .write()
            .await
            .profiles
            .insert(user_id, profile.clone());
        Ok(())
    }

    async fn load_mode(&self, user_id: Uuid) -> StoreResult<AdaptiveModeState> {
        self.guard(Family::State).await?;
        Ok(self
            .inner
            .read()
            .await
            .modes
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn save_mode(&self, user_id: Uuid, state: &AdaptiveModeState) -> StoreResult<()> {
        self.guard(Family::State).await?;
        self.inner.write().await.modes.insert(user_id, state.clone());
        Ok(())
    }

    async fn load_adherence(&self, user_id: Uuid) -> StoreResult<AdherenceState> {
        self.guard(Family::State).await?;
        Ok(self
            .inner
            .read()
            .await
            .adherence
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn save_adherence(&self, user_id: Uuid, state: &AdherenceState) -> StoreResult<()> {
        self.guard(Family::State).await?;
        self.inner
            .write()
            .await
            .adherence
            .insert(user_id, state.clone());
        Ok(())
    }

    async fn load_alert(&self, user_id: Uuid) -> StoreResult<Option<ProactiveAlert>> {
        self.guard(Family::State).await?;
        Ok(self.inner.read().await.alerts.get(&user_id).cloned())
    }

    async fn replace_alert(&self, user_id: Uuid, alert: Option<&ProactiveAlert>) -> StoreResult<()> {
        self.guard(Family::State).await?;
        let mut inner = self.inner.write().await;
        match alert {
            Some(alert) => {
                inner.alerts.insert(user_id, alert.clone());
            }
            None => {
                inner.alerts.remove(&user_id);
            }
        }
        Ok(())
    }

    async fn known_users(&self) -> StoreResult<Vec<Uuid>> {
        self.guard(Family::State).await?;
        let inner = self.inner.read().await;
        let users: BTreeSet<Uuid> = inner
            .checkins
            .keys()
            .chain(inner.modes.keys())
            .chain(inner.profiles.keys())
            .copied()
            .collect();
        Ok(users.into_iter().collect())
    }
}
