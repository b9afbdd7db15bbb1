use crate::analytics::patterns::{MoodPrediction, TriggerPattern};
use crate::domain::crisis::Severity;
use crate::domain::metrics::DatedCheckin;
use crate::domain::trigger_date::TriggerDate;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const TRIGGER_LOOKAHEAD_DAYS: i64 = 2;
const RECOVERY_WINDOW: usize = 3;
const RECOVERY_LOW_DAYS: usize = 2;
const RECOVERY_MOOD_MAX: i16 = 2;
const HARD_DAY_MOOD_BELOW: f64 = 3.0;
const HARD_DAY_MIN_CONFIDENCE: f64 = 0.6;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    TriggerApproaching,
    RecoveryMode,
    TomorrowHard,
    PatternDetected,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

/// The single live alert for a user. Regeneration replaces it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProactiveAlert {
    pub id: Uuid,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub title: String,
    pub message: String,
    pub actionable: bool,
    pub trigger_date_id: Option<Uuid>,
    pub generated_for: NaiveDate,
    #[serde(default)]
    pub dismissed: bool,
}

impl ProactiveAlert {
    fn new(
        alert_type: AlertType,
        severity: AlertSeverity,
        title: impl Into<String>,
        message: impl Into<String>,
        actionable: bool,
        generated_for: NaiveDate,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            alert_type,
            severity,
            title: title.into(),
            message: message.into(),
            actionable,
            trigger_date_id: None,
            generated_for,
            dismissed: false,
        }
    }

    /// Same condition on the same day; a dismissal carries over to it.
    pub fn same_condition(&self, other: &ProactiveAlert) -> bool {
        self.alert_type == other.alert_type
            && self.generated_for == other.generated_for
            && self.trigger_date_id == other.trigger_date_id
    }
}

pub struct AlertContext<'a> {
    pub today: NaiveDate,
    pub prediction: Option<&'a MoodPrediction>,
    pub patterns: &'a [TriggerPattern],
    pub trigger_dates: &'a [TriggerDate],
    /// Most-recent-first.
    pub recent_history: &'a [DatedCheckin],
    pub reduced_load_active: bool,
}

/// First matching rule wins, in priority order.
pub fn generate_alert(ctx: &AlertContext<'_>) -> Option<ProactiveAlert> {
    trigger_approaching(ctx)
        .or_else(|| recovery_mode(ctx))
        .or_else(|| tomorrow_hard(ctx))
        .or_else(|| pattern_detected(ctx))
}

fn trigger_approaching(ctx: &AlertContext<'_>) -> Option<ProactiveAlert> {
    let (trigger, days) = ctx
        .trigger_dates
        .iter()
        .filter_map(|t| t.days_until(ctx.today).map(|d| (t, d)))
        .filter(|(_, d)| *d <= TRIGGER_LOOKAHEAD_DAYS)
        .min_by_key(|(_, d)| *d)?;

    let severity = if days <= 1 {
        AlertSeverity::Critical
    } else {
        AlertSeverity::Warning
    };
    let when = match days {
        0 => "today".to_string(),
        1 => "tomorrow".to_string(),
        n => format!("in {n} days"),
    };
    let mut alert = ProactiveAlert::new(
        AlertType::TriggerApproaching,
        severity,
        format!("{} is {when}", trigger.label),
        "Plan something gentle around it and line up someone you can check in with.",
        true,
        ctx.today,
    );
    alert.trigger_date_id = Some(trigger.id);
    Some(alert)
}

fn recovery_mode(ctx: &AlertContext<'_>) -> Option<ProactiveAlert> {
    let low_days = ctx
        .recent_history
        .iter()
        .take(RECOVERY_WINDOW)
        .filter(|c| c.mood() <= RECOVERY_MOOD_MAX)
        .count();
    if low_days < RECOVERY_LOW_DAYS {
        return None;
    }
    let message = if ctx.reduced_load_active {
        "Your plan is already trimmed to one small step. Rest counts as progress."
    } else {
        "The last few days have been heavy. Consider switching to a lighter plan."
    };
    Some(ProactiveAlert::new(
        AlertType::RecoveryMode,
        AlertSeverity::Warning,
        "Time to go easy",
        message,
        true,
        ctx.today,
    ))
}

fn tomorrow_hard(ctx: &AlertContext<'_>) -> Option<ProactiveAlert> {
    let prediction = ctx.prediction?;
    if prediction.predicted_mood >= HARD_DAY_MOOD_BELOW
        || prediction.confidence <= HARD_DAY_MIN_CONFIDENCE
    {
        return None;
    }
    Some(ProactiveAlert::new(
        AlertType::TomorrowHard,
        AlertSeverity::Info,
        "Tomorrow may be tough",
        "Pick one small comfort for tomorrow morning and keep the evening light.",
        true,
        ctx.today,
    ))
}

fn pattern_detected(ctx: &AlertContext<'_>) -> Option<ProactiveAlert> {
    if ctx.prediction.is_some() {
        return None;
    }
    let pattern = ctx.patterns.iter().find(|p| p.severity == Severity::High)?;
    Some(ProactiveAlert::new(
        AlertType::PatternDetected,
        AlertSeverity::Info,
        "A pattern worth knowing",
        pattern.description.clone(),
        false,
        ctx.today,
    ))
}
