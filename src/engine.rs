//! Orchestration of one user's check-in and everything that hangs off it.
//!
//! Crisis detection and plan generation run side by side; the adaptive mode
//! check and the proactive alert run after both. Persistence failures in one
//! branch are reported in [`CheckinOutcome::failures`] and never abort the
//! other branch.

use crate::analytics::alerts::{generate_alert, AlertContext, ProactiveAlert};
use crate::analytics::patterns::{
    analyze_day_of_week, detect_trigger_patterns, predict_tomorrow, DayOfWeekPattern,
    MoodPrediction, TriggerPattern,
};
use crate::config::EngineConfig;
use crate::domain::crisis::{CrisisDetectionResult, CrisisEvent};
use crate::domain::metrics::{CheckinMetrics, DatedCheckin};
use crate::domain::plan::{ActionStatus, DailyPlan};
use crate::domain::trigger_date::TriggerDate;
use crate::error::{EngineError, EngineResult, StoreError};
use crate::services::adaptive_mode::{
    apply_reduced_load, check_conditions, AdaptiveModeState, ModeInputs, ModeTransition,
};
use crate::services::adherence::{self, AdherenceState, Insight};
use crate::services::crisis::{resources_for, CrisisDetector, SupportResource};
use crate::services::planner::{
    generate_plan, swap_candidate, PlanContext, RandomSource, ThreadRandom, RECENT_DAYS,
};
use crate::store::{
    ActionCatalog, EngineStore, EventStore, HistoryProvider, PlanStore, StateStore,
    TriggerDateStore, UserProfile,
};
use crate::time_utils::{self, LocalClock};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

/// Scores a swap when the day has no check-in to score against.
const NEUTRAL_METRICS: CheckinMetrics = CheckinMetrics {
    mood: 5,
    stress: 5,
    sleep: 5,
    energy: 5,
    focus: 5,
    anxiety: 5,
};

#[derive(Debug, Clone)]
pub struct CheckinSubmission {
    pub date: NaiveDate,
    pub metrics: CheckinMetrics,
    /// Scanned for crisis language, then dropped. Never stored.
    pub journal_text: Option<String>,
    pub sos_invoked: bool,
}

/// A persistence step that failed while the rest of the check-in went on.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BranchFailure {
    pub branch: &'static str,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckinOutcome {
    pub crisis: CrisisDetectionResult,
    pub crisis_event_id: Option<Uuid>,
    pub resources: Vec<SupportResource>,
    pub plan: Option<DailyPlan>,
    pub mode: Option<ModeTransition>,
    pub alert: Option<ProactiveAlert>,
    pub failures: Vec<BranchFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsReport {
    pub checkins_considered: usize,
    pub day_of_week: Vec<DayOfWeekPattern>,
    pub prediction: Option<MoodPrediction>,
    pub trigger_patterns: Vec<TriggerPattern>,
}

pub struct Engine {
    history: Arc<dyn HistoryProvider>,
    events: Arc<dyn EventStore>,
    trigger_dates: Arc<dyn TriggerDateStore>,
    plans: Arc<dyn PlanStore>,
    catalog: Arc<dyn ActionCatalog>,
    state: Arc<dyn StateStore>,
    detector: CrisisDetector,
    rng: Arc<dyn RandomSource>,
    config: EngineConfig,
}

impl Engine {
    pub fn new<S>(store: Arc<S>, config: EngineConfig) -> Self
    where
        S: EngineStore + 'static,
    {
        Self {
            history: store.clone(),
            events: store.clone(),
            trigger_dates: store.clone(),
            plans: store.clone(),
            catalog: store.clone(),
            state: store,
            detector: CrisisDetector::new(),
            rng: Arc::new(ThreadRandom),
            config,
        }
    }

    pub fn with_random(mut self, rng: Arc<dyn RandomSource>) -> Self {
        self.rng = rng;
        self
    }

    /// The user's own day and hour at `instant`.
    pub async fn local_clock(&self, user_id: Uuid, instant: DateTime<Utc>) -> LocalClock {
        let timezone = match self.state.load_profile(user_id).await {
            Ok(profile) => profile.timezone,
            Err(e) => {
                tracing::warn!("Falling back to default timezone for {}: {}", user_id, e);
                None
            }
        };
        let zone = timezone.unwrap_or_else(|| self.config.default_timezone.clone());
        time_utils::local_clock(&zone, instant)
    }

    // ------------------------------------------------------------------
    // Check-in
    // ------------------------------------------------------------------

    pub async fn submit_checkin(
        &self,
        user_id: Uuid,
        submission: CheckinSubmission,
    ) -> EngineResult<CheckinOutcome> {
        submission.metrics.validate()?;
        let date = submission.date;
        let today = DatedCheckin::new(date, submission.metrics);
        let mut failures = Vec::new();

        if let Err(e) = self.history.upsert_checkin(user_id, today).await {
            tracing::error!("Failed to store check-in for {}: {}", user_id, e);
            failures.push(failure("checkin", &e));
        }

        let history = match self
            .history
            .recent_checkins(user_id, date, self.config.history_days)
            .await
        {
            Ok(history) => with_today(history, today),
            Err(e) => {
                tracing::error!("Failed to load history for {}: {}", user_id, e);
                failures.push(failure("history", &e));
                vec![today]
            }
        };

        let (crisis, plan) = futures::join!(
            self.crisis_branch(user_id, &submission, &history),
            self.plan_branch(user_id, date, &submission.metrics),
        );

        let (crisis, crisis_event) = crisis;
        let crisis_event_id = match crisis_event {
            Ok(id) => id,
            Err(e) => {
                tracing::error!("Failed to record crisis event for {}: {}", user_id, e);
                failures.push(failure("crisis_event", &e));
                None
            }
        };

        let (mut plan, plan_is_fresh) = match plan {
            Ok((plan, fresh)) => (Some(plan), fresh),
            Err(e) => {
                tracing::error!("Failed to build plan for {}: {}", user_id, e);
                failures.push(BranchFailure {
                    branch: "plan",
                    error: e.to_string(),
                });
                (None, false)
            }
        };

        let trigger_dates = match self.trigger_dates.list_trigger_dates(user_id).await {
            Ok(dates) => dates,
            Err(e) => {
                failures.push(failure("trigger_dates", &e));
                Vec::new()
            }
        };

        // A plan generated seconds ago cannot have missed anything yet.
        let missed_actions = match (&plan, plan_is_fresh) {
            (Some(plan), false) => {
                let clock = self.local_clock(user_id, Utc::now()).await;
                if clock.date == date {
                    plan.missed_count(clock.hour)
                } else {
                    0
                }
            }
            _ => 0,
        };

        let escalate = submission.sos_invoked || crisis.is_high();
        let mode = match self
            .transition_mode(
                user_id,
                ModeInputs {
                    today: date,
                    today_checkin: Some(&submission.metrics),
                    missed_actions,
                    trigger_dates: &trigger_dates,
                },
                escalate,
            )
            .await
        {
            Ok(transition) => Some(transition),
            Err(e) => {
                tracing::error!("Adaptive mode check failed for {}: {}", user_id, e);
                failures.push(failure("mode", &e));
                None
            }
        };

        let reduced_load_active = mode.as_ref().map(|m| m.state.active).unwrap_or(false);
        if let Some(current) = plan.as_ref().filter(|p| reduced_load_active && !p.reduced_load) {
            let reduced = apply_reduced_load(current);
            match self.plans.save_plan(&reduced).await {
                Ok(()) => plan = Some(reduced),
                Err(e) => failures.push(failure("plan", &e)),
            }
        }

        let alert = match self
            .regenerate_alert(user_id, date, &history, &trigger_dates, reduced_load_active)
            .await
        {
            Ok(alert) => alert,
            Err(e) => {
                failures.push(failure("alert", &e));
                None
            }
        };

        Ok(CheckinOutcome {
            resources: resources_for(&crisis),
            crisis,
            crisis_event_id,
            plan,
            mode,
            alert,
            failures,
        })
    }

    async fn crisis_branch(
        &self,
        user_id: Uuid,
        submission: &CheckinSubmission,
        history: &[DatedCheckin],
    ) -> (CrisisDetectionResult, Result<Option<Uuid>, StoreError>) {
        let result = if submission.sos_invoked {
            self.detector.explicit_request()
        } else {
            self.detector.detect(
                submission.journal_text.as_deref(),
                &submission.metrics,
                history,
            )
        };

        if !result.detected {
            return (result, Ok(None));
        }

        tracing::warn!(
            user_id = %user_id,
            severity = ?result.severity,
            method = ?result.detection_method,
            "Crisis signal detected"
        );
        let persisted = self.record_crisis_event(user_id, submission.date, &result).await;
        (result, persisted)
    }

    async fn record_crisis_event(
        &self,
        user_id: Uuid,
        checkin_date: NaiveDate,
        result: &CrisisDetectionResult,
    ) -> Result<Option<Uuid>, StoreError> {
        if self
            .events
            .has_recent_crisis_event(user_id, self.config.crisis_cooldown_hours)
            .await?
        {
            tracing::info!(
                "Crisis event for {} suppressed, one exists within {}h",
                user_id,
                self.config.crisis_cooldown_hours
            );
            return Ok(None);
        }
        let id = self
            .events
            .create_crisis_event(user_id, checkin_date, result)
            .await?;
        Ok(Some(id))
    }

    /// Today's plan and whether it was generated just now. A plan the user
    /// already made progress on is kept as it is.
    async fn plan_branch(
        &self,
        user_id: Uuid,
        date: NaiveDate,
        metrics: &CheckinMetrics,
    ) -> EngineResult<(DailyPlan, bool)> {
        if let Some(existing) = self.plans.get_plan(user_id, date).await? {
            if existing.actions.iter().any(|a| !a.is_pending()) {
                return Ok((existing, false));
            }
        }

        let templates = self.catalog.active_templates().await?;
        let mut adherence = self.state.load_adherence(user_id).await?;
        let ctx = self.plan_context(user_id, date, &adherence).await?;

        let plan = generate_plan(user_id, date, &templates, metrics, &ctx, self.rng.as_ref());
        self.plans.save_plan(&plan).await?;

        adherence.record_assigned(&plan);
        if let Err(e) = self.state.save_adherence(user_id, &adherence).await {
            tracing::warn!("Failed to update assigned counts for {}: {}", user_id, e);
        }

        tracing::info!(
            "Generated plan for {} on {} with {} actions",
            user_id,
            date,
            plan.actions.len()
        );
        Ok((plan, true))
    }

    async fn plan_context(
        &self,
        user_id: Uuid,
        date: NaiveDate,
        adherence: &AdherenceState,
    ) -> EngineResult<PlanContext> {
        let profile = self.state.load_profile(user_id).await?;
        let mut recent_template_ids = HashSet::new();
        for offset in 1..=RECENT_DAYS {
            let day = date - Duration::days(offset);
            match self.plans.get_plan(user_id, day).await {
                Ok(Some(plan)) => {
                    recent_template_ids.extend(plan.template_ids().map(str::to_string))
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("Skipping recent plan {} for {}: {}", day, user_id, e),
            }
        }

        Ok(PlanContext {
            focus_areas: profile.focus_areas,
            recent_template_ids,
            simplify: adherence.categories_to_simplify(),
        })
    }

    // ------------------------------------------------------------------
    // Plan mutations
    // ------------------------------------------------------------------

    pub async fn plan(&self, user_id: Uuid, date: NaiveDate) -> EngineResult<Option<DailyPlan>> {
        Ok(self.plans.get_plan(user_id, date).await?)
    }

    pub async fn set_plan(&self, user_id: Uuid, plan: DailyPlan) -> EngineResult<DailyPlan> {
        if plan.user_id != user_id {
            return Err(EngineError::ForeignPlan);
        }
        self.plans.save_plan(&plan).await?;
        Ok(plan)
    }

    pub async fn complete_action(
        &self,
        user_id: Uuid,
        date: NaiveDate,
        action_id: Uuid,
    ) -> EngineResult<DailyPlan> {
        self.mark_action(user_id, date, action_id, ActionStatus::Completed)
            .await
    }

    pub async fn skip_action(
        &self,
        user_id: Uuid,
        date: NaiveDate,
        action_id: Uuid,
    ) -> EngineResult<DailyPlan> {
        self.mark_action(user_id, date, action_id, ActionStatus::Skipped)
            .await
    }

    async fn mark_action(
        &self,
        user_id: Uuid,
        date: NaiveDate,
        action_id: Uuid,
        status: ActionStatus,
    ) -> EngineResult<DailyPlan> {
        let mut plan = self
            .plans
            .get_plan(user_id, date)
            .await?
            .ok_or(EngineError::PlanNotFound)?;
        let action = plan
            .action_mut(action_id)
            .ok_or(EngineError::ActionNotFound(action_id))?;

        if action.status == status {
            return Ok(plan);
        }
        action.status = status;
        let category = action.category;

        // Counters first: a failed plan write leaves the action pending, so a
        // retry records it exactly once.
        let previous = self.state.load_adherence(user_id).await?;
        let mut adherence = previous.clone();
        match status {
            ActionStatus::Completed => adherence.record_completion(category),
            ActionStatus::Skipped => adherence.record_skip(category),
            ActionStatus::Pending => {}
        }
        self.state.save_adherence(user_id, &adherence).await?;

        if let Err(e) = self.plans.save_plan(&plan).await {
            if let Err(restore) = self.state.save_adherence(user_id, &previous).await {
                tracing::error!(
                    "Adherence for {} may be ahead of its plan: {}",
                    user_id,
                    restore
                );
            }
            return Err(e.into());
        }
        Ok(plan)
    }

    pub async fn swap_action(
        &self,
        user_id: Uuid,
        date: NaiveDate,
        action_id: Uuid,
    ) -> EngineResult<DailyPlan> {
        let mut plan = self
            .plans
            .get_plan(user_id, date)
            .await?
            .ok_or(EngineError::PlanNotFound)?;
        let index = plan
            .actions
            .iter()
            .position(|a| a.id == action_id)
            .ok_or(EngineError::ActionNotFound(action_id))?;
        if !plan.actions[index].is_pending() {
            return Err(EngineError::ActionNotPending(action_id));
        }

        let metrics = self
            .history
            .recent_checkins(user_id, date, 1)
            .await?
            .into_iter()
            .find(|c| c.date == date)
            .map(|c| c.metrics)
            .unwrap_or(NEUTRAL_METRICS);
        let templates = self.catalog.active_templates().await?;
        let adherence = self.state.load_adherence(user_id).await?;
        let ctx = self.plan_context(user_id, date, &adherence).await?;

        let replacement = swap_candidate(&plan, action_id, &templates, &metrics, &ctx)
            .ok_or(EngineError::NoSwapCandidate)?;
        plan.actions[index] = replacement;
        self.plans.save_plan(&plan).await?;
        Ok(plan)
    }

    pub async fn insights(&self, user_id: Uuid, date: NaiveDate) -> EngineResult<Vec<Insight>> {
        let adherence = self.state.load_adherence(user_id).await?;
        let plan = self.plans.get_plan(user_id, date).await?;
        Ok(adherence::insights(&adherence, plan.as_ref()))
    }

    // ------------------------------------------------------------------
    // Adaptive mode
    // ------------------------------------------------------------------

    pub async fn mode(&self, user_id: Uuid) -> EngineResult<AdaptiveModeState> {
        Ok(self.state.load_mode(user_id).await?)
    }

    /// Re-evaluate the mode at the user's local `clock`, then shrink today's
    /// plan if the mode is on.
    pub async fn check_bad_day_mode(
        &self,
        user_id: Uuid,
        clock: LocalClock,
    ) -> EngineResult<ModeTransition> {
        let today_checkin = self
            .history
            .recent_checkins(user_id, clock.date, 1)
            .await?
            .into_iter()
            .find(|c| c.date == clock.date)
            .map(|c| c.metrics);
        let plan = self.plans.get_plan(user_id, clock.date).await?;
        let trigger_dates = self.trigger_dates.list_trigger_dates(user_id).await?;

        let transition = self
            .transition_mode(
                user_id,
                ModeInputs {
                    today: clock.date,
                    today_checkin: today_checkin.as_ref(),
                    missed_actions: plan.as_ref().map(|p| p.missed_count(clock.hour)).unwrap_or(0),
                    trigger_dates: &trigger_dates,
                },
                false,
            )
            .await?;

        if let Some(plan) = plan.filter(|p| transition.state.active && !p.reduced_load) {
            self.plans.save_plan(&apply_reduced_load(&plan)).await?;
        }
        Ok(transition)
    }

    async fn transition_mode(
        &self,
        user_id: Uuid,
        inputs: ModeInputs<'_>,
        escalate: bool,
    ) -> Result<ModeTransition, StoreError> {
        let mut state = self.state.load_mode(user_id).await?;
        if escalate {
            state = state.record_sos(inputs.today);
        }
        let transition = check_conditions(state, &inputs);
        self.state.save_mode(user_id, &transition.state).await?;
        Ok(transition)
    }

    /// Manual override back to the normal plan.
    pub async fn deactivate_bad_day_mode(
        &self,
        user_id: Uuid,
        today: NaiveDate,
    ) -> EngineResult<AdaptiveModeState> {
        let state = self.state.load_mode(user_id).await?.deactivate(today);
        self.state.save_mode(user_id, &state).await?;
        tracing::info!("Reduced-load mode switched off by {}", user_id);
        Ok(state)
    }

    // ------------------------------------------------------------------
    // Alerts and analytics
    // ------------------------------------------------------------------

    pub async fn refresh_alert(
        &self,
        user_id: Uuid,
        today: NaiveDate,
    ) -> EngineResult<Option<ProactiveAlert>> {
        let history = self
            .history
            .recent_checkins(user_id, today, self.config.history_days)
            .await?;
        let trigger_dates = self.trigger_dates.list_trigger_dates(user_id).await?;
        let mode = self.state.load_mode(user_id).await?;
        Ok(self
            .regenerate_alert(user_id, today, &history, &trigger_dates, mode.active)
            .await?)
    }

    async fn regenerate_alert(
        &self,
        user_id: Uuid,
        today: NaiveDate,
        history: &[DatedCheckin],
        trigger_dates: &[TriggerDate],
        reduced_load_active: bool,
    ) -> Result<Option<ProactiveAlert>, StoreError> {
        let prediction = predict_tomorrow(history, today);
        let patterns = detect_trigger_patterns(history);
        let mut alert = generate_alert(&AlertContext {
            today,
            prediction: prediction.as_ref(),
            patterns: &patterns,
            trigger_dates,
            recent_history: history,
            reduced_load_active,
        });

        let previous = self.state.load_alert(user_id).await?;
        if let (Some(alert), Some(previous)) = (alert.as_mut(), previous.as_ref()) {
            if previous.dismissed && alert.same_condition(previous) {
                alert.dismissed = true;
            }
        }
        self.state.replace_alert(user_id, alert.as_ref()).await?;
        Ok(alert)
    }

    /// The live alert, unless the user dismissed it.
    pub async fn current_alert(&self, user_id: Uuid) -> EngineResult<Option<ProactiveAlert>> {
        Ok(self
            .state
            .load_alert(user_id)
            .await?
            .filter(|alert| !alert.dismissed))
    }

    pub async fn dismiss_alert(&self, user_id: Uuid) -> EngineResult<Option<ProactiveAlert>> {
        let Some(mut alert) = self.state.load_alert(user_id).await? else {
            return Ok(None);
        };
        alert.dismissed = true;
        self.state.replace_alert(user_id, Some(&alert)).await?;
        Ok(Some(alert))
    }

    pub async fn analytics(&self, user_id: Uuid, today: NaiveDate) -> EngineResult<AnalyticsReport> {
        let history = self
            .history
            .recent_checkins(user_id, today, self.config.history_days)
            .await?;
        Ok(AnalyticsReport {
            checkins_considered: history.len(),
            day_of_week: analyze_day_of_week(&history),
            prediction: predict_tomorrow(&history, today),
            trigger_patterns: detect_trigger_patterns(&history),
        })
    }

    // ------------------------------------------------------------------
    // Trigger dates, crisis audit trail, profile
    // ------------------------------------------------------------------

    pub async fn trigger_dates(&self, user_id: Uuid) -> EngineResult<Vec<TriggerDate>> {
        Ok(self.trigger_dates.list_trigger_dates(user_id).await?)
    }

    pub async fn add_trigger_date(
        &self,
        user_id: Uuid,
        date: NaiveDate,
        label: String,
        repeat_annually: bool,
    ) -> EngineResult<TriggerDate> {
        let trigger = TriggerDate::new(date, label.trim(), repeat_annually);
        self.trigger_dates
            .create_trigger_date(user_id, &trigger)
            .await?;
        Ok(trigger)
    }

    pub async fn update_trigger_date(
        &self,
        user_id: Uuid,
        trigger: TriggerDate,
    ) -> EngineResult<TriggerDate> {
        self.trigger_dates
            .update_trigger_date(user_id, &trigger)
            .await?;
        Ok(trigger)
    }

    pub async fn delete_trigger_date(&self, user_id: Uuid, trigger_id: Uuid) -> EngineResult<()> {
        Ok(self
            .trigger_dates
            .delete_trigger_date(user_id, trigger_id)
            .await?)
    }

    pub async fn crisis_events(&self, user_id: Uuid) -> EngineResult<Vec<CrisisEvent>> {
        Ok(self.events.list_crisis_events(user_id).await?)
    }

    pub async fn acknowledge_crisis_event(&self, user_id: Uuid, event_id: Uuid) -> EngineResult<()> {
        Ok(self
            .events
            .acknowledge_crisis_event(user_id, event_id)
            .await?)
    }

    pub async fn profile(&self, user_id: Uuid) -> EngineResult<UserProfile> {
        Ok(self.state.load_profile(user_id).await?)
    }

    pub async fn update_profile(
        &self,
        user_id: Uuid,
        mut profile: UserProfile,
    ) -> EngineResult<UserProfile> {
        if let Some(raw) = profile.timezone.take() {
            let normalized = time_utils::normalize_timezone(&raw)
                .ok_or_else(|| EngineError::InvalidTimezone(raw.clone()))?;
            profile.timezone = Some(normalized);
        }
        profile.focus_areas = profile
            .focus_areas
            .iter()
            .map(|area| area.trim().to_lowercase())
            .filter(|area| !area.is_empty())
            .collect();
        self.state.save_profile(user_id, &profile).await?;
        Ok(profile)
    }

    // ------------------------------------------------------------------
    // Scheduled sweep
    // ------------------------------------------------------------------

    /// Mode expiry and alert regeneration for every known user. Returns how
    /// many users were processed without error.
    pub async fn run_daily_sweep(&self, now: DateTime<Utc>) -> EngineResult<usize> {
        let users = self.state.known_users().await?;
        let mut processed = 0;
        for user_id in users {
            let clock = self.local_clock(user_id, now).await;
            let mode = self.check_bad_day_mode(user_id, clock).await;
            let alert = self.refresh_alert(user_id, clock.date).await;
            match (mode, alert) {
                (Ok(_), Ok(_)) => processed += 1,
                (Err(e), _) | (_, Err(e)) => {
                    tracing::error!("Daily sweep failed for {}: {}", user_id, e);
                }
            }
        }
        Ok(processed)
    }
}

fn failure(branch: &'static str, error: &StoreError) -> BranchFailure {
    BranchFailure {
        branch,
        error: error.to_string(),
    }
}

/// Stored history with today's check-in guaranteed at the front, even when
/// writing it failed.
fn with_today(history: Vec<DatedCheckin>, today: DatedCheckin) -> Vec<DatedCheckin> {
    let mut merged = Vec::with_capacity(history.len() + 1);
    merged.push(today);
    merged.extend(history.into_iter().filter(|c| c.date != today.date));
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::alerts::{AlertSeverity, AlertType};
    use crate::db::seed::default_catalog;
    use crate::domain::crisis::Severity;
    use crate::domain::metrics::metrics;
    use crate::domain::plan::{ActionCategory, Difficulty};
    use crate::services::adaptive_mode::{BadDayTrigger, DeactivationReason, ModeChange};
    use crate::services::crisis::ResourceKind;
    use crate::services::planner::SeededRandom;
    use crate::store::memory::{Family, MemoryStore};
    use pretty_assertions::assert_eq;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    fn engine() -> (Engine, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::with_catalog(default_catalog()));
        let engine = Engine::new(store.clone(), EngineConfig::default())
            .with_random(Arc::new(SeededRandom::new(7)));
        (engine, store)
    }

    fn submission(date: NaiveDate, metrics: CheckinMetrics) -> CheckinSubmission {
        CheckinSubmission {
            date,
            metrics,
            journal_text: None,
            sos_invoked: false,
        }
    }

    fn calm() -> CheckinMetrics {
        metrics(6, 3, 7, 7)
    }

    fn clock(date: NaiveDate, hour: u32) -> LocalClock {
        LocalClock { date, hour }
    }

    #[tokio::test]
    async fn calm_checkin_builds_a_full_plan() {
        let (engine, _) = engine();
        let user = Uuid::new_v4();
        let outcome = engine
            .submit_checkin(user, submission(day(2), calm()))
            .await
            .unwrap();

        assert!(!outcome.crisis.detected);
        assert!(outcome.resources.is_empty());
        assert!(outcome.failures.is_empty());
        let plan = outcome.plan.unwrap();
        let categories: Vec<ActionCategory> = plan.actions.iter().map(|a| a.category).collect();
        assert_eq!(categories, ActionCategory::ALL.to_vec());
        assert_eq!(outcome.mode.unwrap().change, ModeChange::Unchanged);
        assert_eq!(engine.plan(user, day(2)).await.unwrap(), Some(plan));
    }

    #[tokio::test]
    async fn out_of_range_metrics_are_rejected_before_anything_runs() {
        let (engine, store) = engine();
        let user = Uuid::new_v4();
        let mut bad = calm();
        bad.stress = 11;

        let err = engine.submit_checkin(user, submission(day(2), bad)).await;
        assert!(matches!(err, Err(EngineError::Validation(_))));
        assert!(store.recent_checkins(user, day(2), 30).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn high_risk_checkin_records_event_and_shrinks_the_day() {
        let (engine, _) = engine();
        let user = Uuid::new_v4();
        let outcome = engine
            .submit_checkin(user, submission(day(3), metrics(1, 9, 2, 2)))
            .await
            .unwrap();

        assert_eq!(outcome.crisis.severity, Some(Severity::High));
        assert!(outcome.crisis_event_id.is_some());
        assert!(outcome
            .resources
            .iter()
            .any(|r| r.kind == ResourceKind::Emergency));

        let mode = outcome.mode.unwrap();
        assert_eq!(mode.change, ModeChange::Activated);
        assert!(mode.state.triggers.contains(&BadDayTrigger::SosInvoked));
        assert!(mode
            .state
            .triggers
            .contains(&BadDayTrigger::LowMood { mood: 1 }));

        let plan = outcome.plan.unwrap();
        assert!(plan.reduced_load);
        assert_eq!(plan.actions.len(), 1);
    }

    #[tokio::test]
    async fn cooldown_suppresses_a_second_event() {
        let (engine, _) = engine();
        let user = Uuid::new_v4();
        let first = engine
            .submit_checkin(user, submission(day(3), metrics(1, 9, 2, 2)))
            .await
            .unwrap();
        let second = engine
            .submit_checkin(user, submission(day(4), metrics(1, 9, 2, 2)))
            .await
            .unwrap();

        assert!(first.crisis_event_id.is_some());
        assert!(second.crisis.detected);
        assert_eq!(second.crisis_event_id, None);
        assert_eq!(engine.crisis_events(user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn journal_text_never_reaches_the_audit_trail() {
        let (engine, _) = engine();
        let user = Uuid::new_v4();
        let text = "I want to kill myself tonight";
        let outcome = engine
            .submit_checkin(
                user,
                CheckinSubmission {
                    journal_text: Some(text.to_string()),
                    ..submission(day(5), calm())
                },
            )
            .await
            .unwrap();
        assert!(outcome.crisis.is_high());

        let events = engine.crisis_events(user).await.unwrap();
        assert_eq!(events.len(), 1);
        let serialized = serde_json::to_string(&events[0]).unwrap();
        assert!(!serialized.contains("kill"));
        assert!(!serialized.contains("tonight"));
    }

    #[tokio::test]
    async fn sos_flag_is_an_explicit_high_request() {
        let (engine, _) = engine();
        let user = Uuid::new_v4();
        let outcome = engine
            .submit_checkin(
                user,
                CheckinSubmission {
                    sos_invoked: true,
                    ..submission(day(5), calm())
                },
            )
            .await
            .unwrap();

        assert!(outcome.crisis.is_high());
        assert_eq!(outcome.mode.unwrap().change, ModeChange::Activated);
    }

    #[tokio::test]
    async fn plan_outage_does_not_block_crisis_persistence() {
        let (engine, store) = engine();
        let user = Uuid::new_v4();
        store.set_unavailable(Family::Plans, true).await;

        let outcome = engine
            .submit_checkin(user, submission(day(6), metrics(1, 9, 2, 2)))
            .await
            .unwrap();

        assert!(outcome.plan.is_none());
        assert!(outcome.crisis_event_id.is_some());
        assert!(outcome.failures.iter().any(|f| f.branch == "plan"));
        assert!(outcome.mode.is_some());
    }

    #[tokio::test]
    async fn event_store_outage_does_not_block_the_plan() {
        let (engine, store) = engine();
        let user = Uuid::new_v4();
        store.set_unavailable(Family::CrisisEvents, true).await;

        let outcome = engine
            .submit_checkin(user, submission(day(6), metrics(1, 9, 2, 2)))
            .await
            .unwrap();

        assert!(outcome.crisis.is_high());
        assert!(outcome.crisis_event_id.is_none());
        assert!(outcome.plan.is_some());
        assert_eq!(
            outcome
                .failures
                .iter()
                .map(|f| f.branch)
                .collect::<Vec<_>>(),
            vec!["crisis_event"]
        );
    }

    #[tokio::test]
    async fn repeated_skips_make_the_next_plan_easier() {
        let (engine, _) = engine();
        let user = Uuid::new_v4();

        for d in [10, 11] {
            let plan = engine
                .submit_checkin(user, submission(day(d), calm()))
                .await
                .unwrap()
                .plan
                .unwrap();
            let coping = plan
                .actions
                .iter()
                .find(|a| a.category == ActionCategory::Coping)
                .unwrap();
            engine.skip_action(user, day(d), coping.id).await.unwrap();
        }

        let plan = engine
            .submit_checkin(user, submission(day(12), calm()))
            .await
            .unwrap()
            .plan
            .unwrap();
        let coping = plan
            .actions
            .iter()
            .find(|a| a.category == ActionCategory::Coping)
            .unwrap();
        assert!(coping.simplified);
        assert_eq!(coping.difficulty, Difficulty::Easy);

        let tips = engine.insights(user, day(12)).await.unwrap();
        assert!(tips
            .iter()
            .any(|t| t.category == Some(ActionCategory::Coping)));
    }

    #[tokio::test]
    async fn skip_then_complete_resets_the_streak() {
        let (engine, store) = engine();
        let user = Uuid::new_v4();
        let plan = engine
            .submit_checkin(user, submission(day(8), calm()))
            .await
            .unwrap()
            .plan
            .unwrap();
        let action = plan.actions[0].clone();

        engine.skip_action(user, day(8), action.id).await.unwrap();
        let plan = engine.complete_action(user, day(8), action.id).await.unwrap();
        assert_eq!(plan.action(action.id).unwrap().status, ActionStatus::Completed);

        let adherence = store.load_adherence(user).await.unwrap();
        let stats = adherence.get(action.category);
        assert_eq!(stats.consecutive_skips, 0);
        assert!(!stats.needs_simplification);
        assert_eq!(plan.counts().completed, 1);
    }

    #[tokio::test]
    async fn skip_during_state_outage_is_counted_on_retry() {
        let (engine, store) = engine();
        let user = Uuid::new_v4();
        let plan = engine
            .submit_checkin(user, submission(day(8), calm()))
            .await
            .unwrap()
            .plan
            .unwrap();
        let action = plan.actions[0].clone();

        store.set_unavailable(Family::State, true).await;
        let first = engine.skip_action(user, day(8), action.id).await;
        assert!(matches!(first, Err(EngineError::Store(_))));
        let stored = engine.plan(user, day(8)).await.unwrap().unwrap();
        assert_eq!(stored.action(action.id).unwrap().status, ActionStatus::Pending);

        store.set_unavailable(Family::State, false).await;
        engine.skip_action(user, day(8), action.id).await.unwrap();
        let stats = *store.load_adherence(user).await.unwrap().get(action.category);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.consecutive_skips, 1);
    }

    #[tokio::test]
    async fn plan_outage_leaves_the_counters_untouched() {
        let (engine, store) = engine();
        let user = Uuid::new_v4();
        let plan = engine
            .submit_checkin(user, submission(day(8), calm()))
            .await
            .unwrap()
            .plan
            .unwrap();
        let action = plan.actions[0].clone();
        let before = store.load_adherence(user).await.unwrap();

        store.set_unavailable(Family::Plans, true).await;
        assert!(engine.complete_action(user, day(8), action.id).await.is_err());
        assert_eq!(store.load_adherence(user).await.unwrap(), before);
    }

    #[tokio::test]
    async fn unknown_plan_or_action_is_reported() {
        let (engine, _) = engine();
        let user = Uuid::new_v4();
        assert!(matches!(
            engine.complete_action(user, day(1), Uuid::new_v4()).await,
            Err(EngineError::PlanNotFound)
        ));

        engine
            .submit_checkin(user, submission(day(1), calm()))
            .await
            .unwrap();
        let missing = Uuid::new_v4();
        assert!(matches!(
            engine.skip_action(user, day(1), missing).await,
            Err(EngineError::ActionNotFound(id)) if id == missing
        ));
    }

    #[tokio::test]
    async fn swap_keeps_category_and_anchor() {
        let (engine, _) = engine();
        let user = Uuid::new_v4();
        let plan = engine
            .submit_checkin(user, submission(day(9), calm()))
            .await
            .unwrap()
            .plan
            .unwrap();
        let original = plan.actions[0].clone();

        let swapped = engine.swap_action(user, day(9), original.id).await.unwrap();
        let replacement = &swapped.actions[0];
        assert_eq!(replacement.category, original.category);
        assert_ne!(replacement.template_id, original.template_id);
        if original.anchor.is_some() {
            assert_eq!(replacement.anchor, original.anchor);
        }
        assert_eq!(swapped.actions.len(), plan.actions.len());

        engine
            .complete_action(user, day(9), replacement.id)
            .await
            .unwrap();
        assert!(matches!(
            engine.swap_action(user, day(9), replacement.id).await,
            Err(EngineError::ActionNotPending(_))
        ));
    }

    #[tokio::test]
    async fn set_plan_rejects_another_users_plan() {
        let (engine, _) = engine();
        let plan = DailyPlan::new(Uuid::new_v4(), day(1), Vec::new());
        assert!(matches!(
            engine.set_plan(Uuid::new_v4(), plan).await,
            Err(EngineError::ForeignPlan)
        ));
    }

    #[tokio::test]
    async fn same_day_recovery_lifts_the_mode() {
        let (engine, _) = engine();
        let user = Uuid::new_v4();
        let low = engine
            .submit_checkin(user, submission(day(14), metrics(1, 3, 7, 7)))
            .await
            .unwrap();
        assert_eq!(low.mode.unwrap().change, ModeChange::Activated);

        let better = engine
            .submit_checkin(user, submission(day(14), metrics(3, 3, 7, 7)))
            .await
            .unwrap();
        assert_eq!(
            better.mode.unwrap().change,
            ModeChange::Deactivated {
                reason: DeactivationReason::MoodImproved
            }
        );
    }

    #[tokio::test]
    async fn mode_expires_after_more_than_a_day() {
        let (engine, _) = engine();
        let user = Uuid::new_v4();
        engine
            .submit_checkin(user, submission(day(14), metrics(1, 3, 7, 7)))
            .await
            .unwrap();

        let later = engine
            .check_bad_day_mode(user, clock(day(16), 9))
            .await
            .unwrap();
        assert_eq!(
            later.change,
            ModeChange::Deactivated {
                reason: DeactivationReason::Expired
            }
        );
        assert!(!engine.mode(user).await.unwrap().active);
    }

    #[tokio::test]
    async fn missed_anchors_activate_reduced_load() {
        let (engine, _) = engine();
        let user = Uuid::new_v4();
        let mut plan = DailyPlan::new(user, day(20), Vec::new());
        for (i, anchor) in ["morning", "after lunch", "evening"].into_iter().enumerate() {
            let mut action =
                crate::domain::plan::PlannedAction::from_template(&default_catalog()[i]);
            action.anchor = Some(anchor.to_string());
            plan.actions.push(action);
        }
        engine.set_plan(user, plan).await.unwrap();

        let early = engine.check_bad_day_mode(user, clock(day(20), 13)).await.unwrap();
        assert_eq!(early.change, ModeChange::Unchanged);

        let late = engine.check_bad_day_mode(user, clock(day(20), 23)).await.unwrap();
        assert_eq!(late.change, ModeChange::Activated);
        assert_eq!(
            late.state.triggers,
            vec![BadDayTrigger::MissedActions { count: 3 }]
        );
        let reduced = engine.plan(user, day(20)).await.unwrap().unwrap();
        assert!(reduced.reduced_load);
        assert_eq!(reduced.actions.len(), 1);
    }

    #[tokio::test]
    async fn manual_override_holds_for_the_day() {
        let (engine, _) = engine();
        let user = Uuid::new_v4();
        engine
            .add_trigger_date(user, day(18), "anniversary".into(), false)
            .await
            .unwrap();
        let on = engine.check_bad_day_mode(user, clock(day(18), 8)).await.unwrap();
        assert_eq!(on.change, ModeChange::Activated);

        engine.deactivate_bad_day_mode(user, day(18)).await.unwrap();
        let again = engine.check_bad_day_mode(user, clock(day(18), 9)).await.unwrap();
        assert_eq!(again.change, ModeChange::Unchanged);
        assert!(!again.state.active);
    }

    #[tokio::test]
    async fn dismissal_survives_regeneration_of_the_same_alert() {
        let (engine, _) = engine();
        let user = Uuid::new_v4();
        engine
            .add_trigger_date(user, day(21), "exam".into(), false)
            .await
            .unwrap();

        let alert = engine.refresh_alert(user, day(20)).await.unwrap().unwrap();
        assert_eq!(alert.alert_type, AlertType::TriggerApproaching);
        assert_eq!(alert.severity, AlertSeverity::Critical);

        engine.dismiss_alert(user).await.unwrap();
        assert_eq!(engine.current_alert(user).await.unwrap(), None);

        let regenerated = engine.refresh_alert(user, day(20)).await.unwrap().unwrap();
        assert!(regenerated.dismissed);
        assert_eq!(engine.current_alert(user).await.unwrap(), None);

        let next_day = engine.refresh_alert(user, day(21)).await.unwrap().unwrap();
        assert!(!next_day.dismissed);
    }

    #[tokio::test]
    async fn analytics_need_history() {
        let (engine, _) = engine();
        let user = Uuid::new_v4();
        let empty = engine.analytics(user, day(28)).await.unwrap();
        assert_eq!(empty.checkins_considered, 0);
        assert!(empty.prediction.is_none());
        assert!(empty.day_of_week.is_empty());

        for d in 1..=10 {
            engine
                .submit_checkin(user, submission(day(d), metrics(4, 5, 6, 6)))
                .await
                .unwrap();
        }
        let report = engine.analytics(user, day(10)).await.unwrap();
        assert_eq!(report.checkins_considered, 10);
        assert!(report.prediction.is_some());
        assert!(!report.day_of_week.is_empty());
    }

    #[tokio::test]
    async fn profile_timezone_is_validated_and_drives_the_clock() {
        let (engine, _) = engine();
        let user = Uuid::new_v4();
        let err = engine
            .update_profile(
                user,
                UserProfile {
                    focus_areas: vec![],
                    timezone: Some("Atlantis/Lost".into()),
                },
            )
            .await;
        assert!(matches!(err, Err(EngineError::InvalidTimezone(_))));

        let saved = engine
            .update_profile(
                user,
                UserProfile {
                    focus_areas: vec![" Sleep ".into(), "".into()],
                    timezone: Some("UTC+3".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(saved.focus_areas, vec!["sleep".to_string()]);

        let instant = DateTime::parse_from_rfc3339("2026-03-10T22:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let local = engine.local_clock(user, instant).await;
        assert_eq!(local, clock(day(11), 1));
    }

    #[tokio::test]
    async fn daily_sweep_expires_stale_modes() {
        let (engine, _) = engine();
        let user = Uuid::new_v4();
        engine
            .submit_checkin(user, submission(day(1), metrics(1, 3, 7, 7)))
            .await
            .unwrap();
        assert!(engine.mode(user).await.unwrap().active);

        let now = DateTime::parse_from_rfc3339("2026-03-04T03:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(engine.run_daily_sweep(now).await.unwrap(), 1);
        assert!(!engine.mode(user).await.unwrap().active);
    }
}
