//! Normal <-> reduced-load ("bad day") mode.
//!
//! State is an explicit per-user value: every operation takes the current
//! [`AdaptiveModeState`] and hands back the next one. Persisting it is the
//! caller's job.

use crate::domain::metrics::CheckinMetrics;
use crate::domain::plan::DailyPlan;
use crate::domain::trigger_date::TriggerDate;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const LOW_MOOD_BELOW: i16 = 2;
pub const RECOVERED_MOOD: i16 = 3;
pub const MISSED_ACTIONS_THRESHOLD: usize = 3;
/// Days after activation past which the mode ends no matter what.
pub const MAX_ACTIVE_DAYS: i64 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BadDayTrigger {
    LowMood { mood: i16 },
    SosInvoked,
    MissedActions { count: usize },
    TriggerDate { label: String },
}

impl BadDayTrigger {
    pub fn is_low_mood(&self) -> bool {
        matches!(self, BadDayTrigger::LowMood { .. })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdaptiveModeState {
    pub active: bool,
    pub activated_date: Option<NaiveDate>,
    pub triggers: Vec<BadDayTrigger>,
    /// Day the user last switched the mode off by hand; no automatic
    /// re-activation happens on that day.
    #[serde(default)]
    pub manual_override_date: Option<NaiveDate>,
    /// Day the SOS / crisis flow was last invoked.
    #[serde(default)]
    pub last_sos_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeactivationReason {
    MoodImproved,
    Expired,
    Manual,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum ModeChange {
    Unchanged,
    Activated,
    Deactivated { reason: DeactivationReason },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModeTransition {
    pub state: AdaptiveModeState,
    pub change: ModeChange,
}

/// What the controller looks at on a given day.
pub struct ModeInputs<'a> {
    pub today: NaiveDate,
    pub today_checkin: Option<&'a CheckinMetrics>,
    pub missed_actions: usize,
    pub trigger_dates: &'a [TriggerDate],
}

impl AdaptiveModeState {
    pub fn record_sos(mut self, today: NaiveDate) -> Self {
        self.last_sos_date = Some(today);
        self
    }

    pub fn activate(mut self, today: NaiveDate, triggers: Vec<BadDayTrigger>) -> Self {
        self.active = true;
        self.activated_date = Some(today);
        self.triggers = triggers;
        self
    }

    /// Manual override; always available.
    pub fn deactivate(mut self, today: NaiveDate) -> Self {
        self.active = false;
        self.activated_date = None;
        self.triggers.clear();
        self.manual_override_date = Some(today);
        self
    }

    fn clear(mut self) -> Self {
        self.active = false;
        self.activated_date = None;
        self.triggers.clear();
        self
    }
}

/// Every reason that holds today. Several can co-occur.
pub fn activation_triggers(state: &AdaptiveModeState, inputs: &ModeInputs<'_>) -> Vec<BadDayTrigger> {
    let mut triggers = Vec::new();

    if let Some(checkin) = inputs.today_checkin {
        if checkin.mood < LOW_MOOD_BELOW {
            triggers.push(BadDayTrigger::LowMood { mood: checkin.mood });
        }
    }

    if state.last_sos_date == Some(inputs.today) {
        triggers.push(BadDayTrigger::SosInvoked);
    }

    if inputs.missed_actions >= MISSED_ACTIONS_THRESHOLD {
        triggers.push(BadDayTrigger::MissedActions {
            count: inputs.missed_actions,
        });
    }

    for trigger_date in inputs.trigger_dates.iter().filter(|t| t.matches(inputs.today)) {
        triggers.push(BadDayTrigger::TriggerDate {
            label: trigger_date.label.clone(),
        });
    }

    triggers
}

pub fn check_conditions(state: AdaptiveModeState, inputs: &ModeInputs<'_>) -> ModeTransition {
    if state.active {
        return check_active(state, inputs);
    }

    if state.manual_override_date == Some(inputs.today) {
        return ModeTransition {
            state,
            change: ModeChange::Unchanged,
        };
    }

    let triggers = activation_triggers(&state, inputs);
    if triggers.is_empty() {
        return ModeTransition {
            state,
            change: ModeChange::Unchanged,
        };
    }

    tracing::info!(
        triggers = triggers.len(),
        date = %inputs.today,
        "Reduced-load mode activated"
    );
    ModeTransition {
        state: state.activate(inputs.today, triggers),
        change: ModeChange::Activated,
    }
}

fn check_active(state: AdaptiveModeState, inputs: &ModeInputs<'_>) -> ModeTransition {
    let elapsed = state
        .activated_date
        .map(|activated| (inputs.today - activated).num_days());

    let Some(elapsed) = elapsed.filter(|e| (0..=MAX_ACTIVE_DAYS).contains(e)) else {
        tracing::info!(?elapsed, "Reduced-load mode expired");
        return expire(state, inputs);
    };

    let improved = inputs
        .today_checkin
        .map(|c| c.mood >= RECOVERED_MOOD)
        .unwrap_or(false);
    if !improved {
        return ModeTransition {
            state,
            change: ModeChange::Unchanged,
        };
    }

    // Mood recovered. Stay on for today's reasons the mood cannot clear.
    let remaining: Vec<BadDayTrigger> = activation_triggers(&state, inputs)
        .into_iter()
        .filter(|t| !t.is_low_mood())
        .collect();
    if !remaining.is_empty() {
        let mut state = state;
        state.activated_date = Some(inputs.today);
        state.triggers = remaining;
        return ModeTransition {
            state,
            change: ModeChange::Unchanged,
        };
    }

    tracing::info!(elapsed, "Reduced-load mode lifted after mood improved");
    ModeTransition {
        state: state.clear(),
        change: ModeChange::Deactivated {
            reason: DeactivationReason::MoodImproved,
        },
    }
}

/// The old activation is over; today's own triggers start a new one.
fn expire(state: AdaptiveModeState, inputs: &ModeInputs<'_>) -> ModeTransition {
    let state = state.clear();
    let triggers = activation_triggers(&state, inputs);
    if triggers.is_empty() || state.manual_override_date == Some(inputs.today) {
        return ModeTransition {
            state,
            change: ModeChange::Deactivated {
                reason: DeactivationReason::Expired,
            },
        };
    }

    tracing::info!(
        triggers = triggers.len(),
        date = %inputs.today,
        "Reduced-load mode re-activated after expiry"
    );
    ModeTransition {
        state: state.activate(inputs.today, triggers),
        change: ModeChange::Activated,
    }
}

/// Shrink the day to a single action: an already simplified one if present,
/// otherwise the shortest. The rest are dropped, not skipped.
pub fn apply_reduced_load(plan: &DailyPlan) -> DailyPlan {
    let keep = plan
        .actions
        .iter()
        .find(|a| a.simplified)
        .or_else(|| plan.actions.iter().min_by_key(|a| a.duration_minutes))
        .cloned();

    DailyPlan {
        id: plan.id,
        user_id: plan.user_id,
        plan_date: plan.plan_date,
        actions: keep.into_iter().collect(),
        reduced_load: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::metrics::metrics;
    use crate::domain::plan::{ActionCategory, ActionStatus, Difficulty, PlannedAction};
    use chrono::Duration;
    use uuid::Uuid;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 10).unwrap()
    }

    fn inputs<'a>(
        day: NaiveDate,
        checkin: Option<&'a CheckinMetrics>,
        missed: usize,
        dates: &'a [TriggerDate],
    ) -> ModeInputs<'a> {
        ModeInputs {
            today: day,
            today_checkin: checkin,
            missed_actions: missed,
            trigger_dates: dates,
        }
    }

    fn action(minutes: i16, simplified: bool) -> PlannedAction {
        PlannedAction {
            id: Uuid::new_v4(),
            template_id: format!("t{minutes}"),
            title: format!("{minutes} minutes"),
            description: String::new(),
            category: ActionCategory::Coping,
            duration_minutes: minutes,
            difficulty: Difficulty::Easy,
            status: ActionStatus::Pending,
            anchor: None,
            simplified,
        }
    }

    #[test]
    fn very_low_mood_activates() {
        let low = metrics(1, 5, 5, 5);
        let t = check_conditions(AdaptiveModeState::default(), &inputs(today(), Some(&low), 0, &[]));
        assert_eq!(t.change, ModeChange::Activated);
        assert_eq!(t.state.triggers, vec![BadDayTrigger::LowMood { mood: 1 }]);
        assert_eq!(t.state.activated_date, Some(today()));

        let fine = metrics(2, 5, 5, 5);
        let t = check_conditions(AdaptiveModeState::default(), &inputs(today(), Some(&fine), 0, &[]));
        assert_eq!(t.change, ModeChange::Unchanged);
    }

    #[test]
    fn co_occurring_reasons_are_all_recorded() {
        let low = metrics(1, 5, 5, 5);
        let dates = vec![TriggerDate::new(NaiveDate::from_ymd_opt(2020, 3, 10).unwrap(), "loss", true)];
        let state = AdaptiveModeState::default().record_sos(today());
        let t = check_conditions(state, &inputs(today(), Some(&low), 3, &dates));
        assert_eq!(t.state.triggers.len(), 4);
        assert!(t.state.triggers.contains(&BadDayTrigger::SosInvoked));
        assert!(t
            .state
            .triggers
            .contains(&BadDayTrigger::MissedActions { count: 3 }));
    }

    #[test]
    fn same_day_improvement_deactivates() {
        let low = metrics(1, 5, 5, 5);
        let active = check_conditions(AdaptiveModeState::default(), &inputs(today(), Some(&low), 0, &[])).state;

        let better = metrics(3, 5, 5, 5);
        let t = check_conditions(active, &inputs(today(), Some(&better), 0, &[]));
        assert_eq!(
            t.change,
            ModeChange::Deactivated {
                reason: DeactivationReason::MoodImproved
            }
        );
        assert!(!t.state.active);
    }

    #[test]
    fn improvement_does_not_clear_a_trigger_date_the_same_day() {
        let dates = vec![TriggerDate::new(today(), "exam", false)];
        let active = check_conditions(AdaptiveModeState::default(), &inputs(today(), None, 0, &dates)).state;
        assert!(active.active);

        let good = metrics(6, 3, 6, 6);
        let t = check_conditions(active, &inputs(today(), Some(&good), 0, &dates));
        assert_eq!(t.change, ModeChange::Unchanged);
        assert!(t.state.active);
    }

    #[test]
    fn next_day_requires_improved_mood() {
        let low = metrics(1, 5, 5, 5);
        let active = check_conditions(AdaptiveModeState::default(), &inputs(today(), Some(&low), 0, &[])).state;
        let tomorrow = today() + Duration::days(1);

        let t = check_conditions(active.clone(), &inputs(tomorrow, None, 0, &[]));
        assert!(t.state.active);

        let better = metrics(4, 5, 5, 5);
        let t = check_conditions(active, &inputs(tomorrow, Some(&better), 0, &[]));
        assert!(!t.state.active);
    }

    #[test]
    fn two_days_later_expires_without_new_triggers() {
        let low = metrics(1, 5, 5, 5);
        let active = check_conditions(AdaptiveModeState::default(), &inputs(today(), Some(&low), 0, &[])).state;
        let t = check_conditions(active, &inputs(today() + Duration::days(2), None, 0, &[]));
        assert_eq!(
            t.change,
            ModeChange::Deactivated {
                reason: DeactivationReason::Expired
            }
        );
    }

    #[test]
    fn sos_the_day_after_keeps_the_mode_on() {
        let low = metrics(1, 5, 5, 5);
        let active = check_conditions(AdaptiveModeState::default(), &inputs(today(), Some(&low), 0, &[])).state;
        let tomorrow = today() + Duration::days(1);

        let better = metrics(5, 5, 5, 5);
        let t = check_conditions(active.record_sos(tomorrow), &inputs(tomorrow, Some(&better), 0, &[]));
        assert_eq!(t.change, ModeChange::Unchanged);
        assert!(t.state.active);
        assert_eq!(t.state.triggers, vec![BadDayTrigger::SosInvoked]);
        assert_eq!(t.state.activated_date, Some(tomorrow));
    }

    #[test]
    fn missed_actions_the_day_after_keep_the_mode_on() {
        let low = metrics(1, 5, 5, 5);
        let active = check_conditions(AdaptiveModeState::default(), &inputs(today(), Some(&low), 0, &[])).state;
        let tomorrow = today() + Duration::days(1);

        let better = metrics(6, 5, 5, 5);
        let t = check_conditions(active, &inputs(tomorrow, Some(&better), 3, &[]));
        assert!(t.state.active);
        assert_eq!(
            t.state.triggers,
            vec![BadDayTrigger::MissedActions { count: 3 }]
        );
    }

    #[test]
    fn expiry_reactivates_when_today_is_bad_again() {
        let low = metrics(1, 5, 5, 5);
        let active = check_conditions(AdaptiveModeState::default(), &inputs(today(), Some(&low), 0, &[])).state;
        let later = today() + Duration::days(2);

        let t = check_conditions(active.record_sos(later), &inputs(later, Some(&low), 0, &[]));
        assert_eq!(t.change, ModeChange::Activated);
        assert!(t.state.active);
        assert_eq!(t.state.activated_date, Some(later));
        assert_eq!(
            t.state.triggers,
            vec![BadDayTrigger::LowMood { mood: 1 }, BadDayTrigger::SosInvoked]
        );
    }

    #[test]
    fn manual_override_holds_for_the_day() {
        let low = metrics(1, 5, 5, 5);
        let active = check_conditions(AdaptiveModeState::default(), &inputs(today(), Some(&low), 0, &[])).state;
        let off = active.deactivate(today());
        assert!(!off.active);

        let t = check_conditions(off.clone(), &inputs(today(), Some(&low), 0, &[]));
        assert_eq!(t.change, ModeChange::Unchanged);

        let t = check_conditions(off, &inputs(today() + Duration::days(1), Some(&low), 0, &[]));
        assert_eq!(t.change, ModeChange::Activated);
    }

    #[test]
    fn reduced_load_keeps_one_action() {
        let plan = DailyPlan::new(
            Uuid::new_v4(),
            today(),
            vec![action(15, false), action(5, false), action(10, false)],
        );
        let reduced = apply_reduced_load(&plan);
        assert!(reduced.reduced_load);
        assert_eq!(reduced.actions.len(), 1);
        assert_eq!(reduced.actions[0].duration_minutes, 5);
        assert_eq!(reduced.actions[0].status, ActionStatus::Pending);

        let plan = DailyPlan::new(
            Uuid::new_v4(),
            today(),
            vec![action(15, false), action(5, false), action(10, true)],
        );
        assert_eq!(apply_reduced_load(&plan).actions[0].duration_minutes, 10);
    }
}
