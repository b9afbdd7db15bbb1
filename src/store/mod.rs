//! Narrow read/write contracts the engine uses to reach durable storage.
//!
//! The engine never talks to a database directly. Each trait covers one
//! record family; [`memory::MemoryStore`] and [`crate::db::PgStore`]
//! implement all of them.

pub mod memory;

use crate::analytics::alerts::ProactiveAlert;
use crate::domain::crisis::{CrisisDetectionResult, CrisisEvent};
use crate::domain::metrics::DatedCheckin;
use crate::domain::plan::{ActionTemplate, DailyPlan};
use crate::domain::trigger_date::TriggerDate;
use crate::error::StoreError;
use crate::services::adaptive_mode::AdaptiveModeState;
use crate::services::adherence::AdherenceState;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait HistoryProvider: Send + Sync {
    /// Check-ins for the `days` calendar days ending at `today`, most recent
    /// first, one per day.
    async fn recent_checkins(
        &self,
        user_id: Uuid,
        today: NaiveDate,
        days: i64,
    ) -> StoreResult<Vec<DatedCheckin>>;

    /// Store a check-in; a second one for the same day replaces the first.
    async fn upsert_checkin(&self, user_id: Uuid, checkin: DatedCheckin) -> StoreResult<()>;
}

#[async_trait]
pub trait EventStore: Send + Sync {
    async fn has_recent_crisis_event(&self, user_id: Uuid, cooldown_hours: i64) -> StoreResult<bool>;

    /// Appends an audit record. Only detection metadata reaches this call.
    async fn create_crisis_event(
        &self,
        user_id: Uuid,
        checkin_date: NaiveDate,
        result: &CrisisDetectionResult,
    ) -> StoreResult<Uuid>;

    async fn acknowledge_crisis_event(&self, user_id: Uuid, event_id: Uuid) -> StoreResult<()>;

    async fn list_crisis_events(&self, user_id: Uuid) -> StoreResult<Vec<CrisisEvent>>;
}

#[async_trait]
pub trait TriggerDateStore: Send + Sync {
    async fn list_trigger_dates(&self, user_id: Uuid) -> StoreResult<Vec<TriggerDate>>;
    async fn create_trigger_date(&self, user_id: Uuid, trigger: &TriggerDate) -> StoreResult<()>;
    async fn update_trigger_date(&self, user_id: Uuid, trigger: &TriggerDate) -> StoreResult<()>;
    async fn delete_trigger_date(&self, user_id: Uuid, trigger_id: Uuid) -> StoreResult<()>;
}

#[async_trait]
pub trait PlanStore: Send + Sync {
    async fn get_plan(&self, user_id: Uuid, plan_date: NaiveDate) -> StoreResult<Option<DailyPlan>>;
    async fn save_plan(&self, plan: &DailyPlan) -> StoreResult<()>;
}

#[async_trait]
pub trait ActionCatalog: Send + Sync {
    async fn active_templates(&self) -> StoreResult<Vec<ActionTemplate>>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    #[serde(default)]
    pub focus_areas: Vec<String>,
    /// IANA name or UTC offset; `None` means the service default.
    #[serde(default)]
    pub timezone: Option<String>,
}

/// Per-user mutable state: adaptive mode, adherence counters, the live alert
/// slot and the profile.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load_profile(&self, user_id: Uuid) -> StoreResult<UserProfile>;
    async fn save_profile(&self, user_id: Uuid, profile: &UserProfile) -> StoreResult<()>;

    async fn load_mode(&self, user_id: Uuid) -> StoreResult<AdaptiveModeState>;
    async fn save_mode(&self, user_id: Uuid, state: &AdaptiveModeState) -> StoreResult<()>;

    async fn load_adherence(&self, user_id: Uuid) -> StoreResult<AdherenceState>;
    async fn save_adherence(&self, user_id: Uuid, state: &AdherenceState) -> StoreResult<()>;

    async fn load_alert(&self, user_id: Uuid) -> StoreResult<Option<ProactiveAlert>>;
    /// Replaces whatever alert was live; `None` clears the slot.
    async fn replace_alert(&self, user_id: Uuid, alert: Option<&ProactiveAlert>) -> StoreResult<()>;

    /// Users with any engine state, for scheduled sweeps.
    async fn known_users(&self) -> StoreResult<Vec<Uuid>>;
}

/// Everything the engine needs from storage, in one bound.
pub trait EngineStore:
    HistoryProvider + EventStore + TriggerDateStore + PlanStore + ActionCatalog + StateStore
{
}

impl<T> EngineStore for T where
    T: HistoryProvider + EventStore + TriggerDateStore + PlanStore + ActionCatalog + StateStore
{
}
