use crate::domain::metrics::MetricKind;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ActionCategory {
    Coping,
    Lifestyle,
    Connection,
}

impl ActionCategory {
    pub const ALL: [ActionCategory; 3] = [
        ActionCategory::Coping,
        ActionCategory::Lifestyle,
        ActionCategory::Connection,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionCategory::Coping => "coping",
            ActionCategory::Lifestyle => "lifestyle",
            ActionCategory::Connection => "connection",
        }
    }
}

impl TryFrom<&str> for ActionCategory {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_lowercase().as_str() {
            "coping" => Ok(ActionCategory::Coping),
            "lifestyle" => Ok(ActionCategory::Lifestyle),
            "connection" => Ok(ActionCategory::Connection),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl TryFrom<&str> for Difficulty {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TargetCondition {
    Low,
    High,
}

/// "Helps when `metric` is `condition` relative to `threshold`."
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetricTarget {
    pub metric: MetricKind,
    pub condition: TargetCondition,
    pub threshold: i16,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionTemplate {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: ActionCategory,
    pub duration_minutes: i16,
    pub targets: Vec<MetricTarget>,
    pub focus_tags: Vec<String>,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub default_anchor: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    #[default]
    Pending,
    Completed,
    Skipped,
}

/// Routine moments a planned action can hang off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorWindow {
    Morning,
    Afternoon,
    Evening,
}

impl AnchorWindow {
    pub fn parse(raw: &str) -> Option<Self> {
        let lowered = raw.trim().to_lowercase();
        if lowered.contains("morning") || lowered.contains("breakfast") || lowered.contains("wake") {
            Some(AnchorWindow::Morning)
        } else if lowered.contains("afternoon") || lowered.contains("lunch") {
            Some(AnchorWindow::Afternoon)
        } else if lowered.contains("evening")
            || lowered.contains("dinner")
            || lowered.contains("bed")
        {
            Some(AnchorWindow::Evening)
        } else {
            None
        }
    }

    /// Local hour after which a still-pending action counts as missed.
    pub fn end_hour(&self) -> u32 {
        match self {
            AnchorWindow::Morning => 12,
            AnchorWindow::Afternoon => 17,
            AnchorWindow::Evening => 22,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlannedAction {
    pub id: Uuid,
    pub template_id: String,
    pub title: String,
    pub description: String,
    pub category: ActionCategory,
    pub duration_minutes: i16,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub status: ActionStatus,
    #[serde(default)]
    pub anchor: Option<String>,
    #[serde(default)]
    pub simplified: bool,
}

impl PlannedAction {
    pub fn from_template(template: &ActionTemplate) -> Self {
        Self {
            id: Uuid::new_v4(),
            template_id: template.id.clone(),
            title: template.title.clone(),
            description: template.description.clone(),
            category: template.category,
            duration_minutes: template.duration_minutes,
            difficulty: template.difficulty,
            status: ActionStatus::Pending,
            anchor: template.default_anchor.clone(),
            simplified: false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == ActionStatus::Pending
    }

    /// Pending and past the end of its anchor window.
    pub fn is_missed(&self, local_hour: u32) -> bool {
        if !self.is_pending() {
            return false;
        }
        self.anchor
            .as_deref()
            .and_then(AnchorWindow::parse)
            .map(|window| local_hour >= window.end_hour())
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PlanCounts {
    pub total: usize,
    pub completed: usize,
    pub skipped: usize,
    pub pending: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DailyPlan {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_date: NaiveDate,
    pub actions: Vec<PlannedAction>,
    #[serde(default)]
    pub reduced_load: bool,
}

impl DailyPlan {
    pub fn new(user_id: Uuid, plan_date: NaiveDate, actions: Vec<PlannedAction>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            plan_date,
            actions,
            reduced_load: false,
        }
    }

    pub fn counts(&self) -> PlanCounts {
        let mut counts = PlanCounts {
            total: self.actions.len(),
            ..PlanCounts::default()
        };
        for action in &self.actions {
            match action.status {
                ActionStatus::Pending => counts.pending += 1,
                ActionStatus::Completed => counts.completed += 1,
                ActionStatus::Skipped => counts.skipped += 1,
            }
        }
        counts
    }

    pub fn action(&self, action_id: Uuid) -> Option<&PlannedAction> {
        self.actions.iter().find(|a| a.id == action_id)
    }

    pub fn action_mut(&mut self, action_id: Uuid) -> Option<&mut PlannedAction> {
        self.actions.iter_mut().find(|a| a.id == action_id)
    }

    pub fn template_ids(&self) -> impl Iterator<Item = &str> {
        self.actions.iter().map(|a| a.template_id.as_str())
    }

    pub fn missed_count(&self, local_hour: u32) -> usize {
        self.actions.iter().filter(|a| a.is_missed(local_hour)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(anchor: Option<&str>, status: ActionStatus) -> PlannedAction {
        PlannedAction {
            id: Uuid::new_v4(),
            template_id: "walk".into(),
            title: "Walk".into(),
            description: "Ten minutes outside".into(),
            category: ActionCategory::Lifestyle,
            duration_minutes: 10,
            difficulty: Difficulty::Easy,
            status,
            anchor: anchor.map(str::to_string),
            simplified: false,
        }
    }

    #[test]
    fn anchors_parse_into_windows() {
        assert_eq!(AnchorWindow::parse("after breakfast"), Some(AnchorWindow::Morning));
        assert_eq!(AnchorWindow::parse("Lunch break"), Some(AnchorWindow::Afternoon));
        assert_eq!(AnchorWindow::parse("before bed"), Some(AnchorWindow::Evening));
        assert_eq!(AnchorWindow::parse("whenever"), None);
    }

    #[test]
    fn only_pending_anchored_actions_can_be_missed() {
        assert!(action(Some("morning"), ActionStatus::Pending).is_missed(13));
        assert!(!action(Some("morning"), ActionStatus::Pending).is_missed(11));
        assert!(!action(Some("morning"), ActionStatus::Completed).is_missed(23));
        assert!(!action(Some("morning"), ActionStatus::Skipped).is_missed(23));
        assert!(!action(None, ActionStatus::Pending).is_missed(23));
        assert!(!action(Some("when the kettle boils"), ActionStatus::Pending).is_missed(23));
    }

    #[test]
    fn counts_follow_statuses() {
        let plan = DailyPlan::new(
            Uuid::new_v4(),
            NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            vec![
                action(None, ActionStatus::Completed),
                action(None, ActionStatus::Skipped),
                action(None, ActionStatus::Pending),
            ],
        );
        assert_eq!(
            plan.counts(),
            PlanCounts {
                total: 3,
                completed: 1,
                skipped: 1,
                pending: 1
            }
        );
    }

    #[test]
    fn category_parses_loosely() {
        assert_eq!(ActionCategory::try_from(" Coping "), Ok(ActionCategory::Coping));
        assert!(ActionCategory::try_from("sleep").is_err());
    }
}
