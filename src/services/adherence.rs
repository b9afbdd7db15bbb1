use crate::domain::plan::{ActionCategory, DailyPlan};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Consecutive skips in a category before it gets simplified.
pub const SKIP_THRESHOLD: u32 = 2;
const ENCOURAGE_MIN_COMPLETIONS: u32 = 3;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryStats {
    pub assigned: u32,
    pub completed: u32,
    pub skipped: u32,
    pub consecutive_skips: u32,
    pub needs_simplification: bool,
}

/// Per-user counters across days, one bucket per category.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdherenceState {
    pub coping: CategoryStats,
    pub lifestyle: CategoryStats,
    pub connection: CategoryStats,
}

impl AdherenceState {
    pub fn get(&self, category: ActionCategory) -> &CategoryStats {
        match category {
            ActionCategory::Coping => &self.coping,
            ActionCategory::Lifestyle => &self.lifestyle,
            ActionCategory::Connection => &self.connection,
        }
    }

    fn get_mut(&mut self, category: ActionCategory) -> &mut CategoryStats {
        match category {
            ActionCategory::Coping => &mut self.coping,
            ActionCategory::Lifestyle => &mut self.lifestyle,
            ActionCategory::Connection => &mut self.connection,
        }
    }

    pub fn record_assigned(&mut self, plan: &DailyPlan) {
        for action in &plan.actions {
            self.get_mut(action.category).assigned += 1;
        }
    }

    pub fn record_completion(&mut self, category: ActionCategory) {
        let stats = self.get_mut(category);
        stats.completed += 1;
        stats.consecutive_skips = 0;
        stats.needs_simplification = false;
    }

    pub fn record_skip(&mut self, category: ActionCategory) {
        let stats = self.get_mut(category);
        stats.skipped += 1;
        stats.consecutive_skips += 1;
        if stats.consecutive_skips >= SKIP_THRESHOLD {
            stats.needs_simplification = true;
        }
    }

    pub fn categories_to_simplify(&self) -> HashSet<ActionCategory> {
        ActionCategory::ALL
            .iter()
            .copied()
            .filter(|c| self.get(*c).needs_simplification)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    Simplify,
    Anchor,
    Encourage,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Insight {
    pub kind: InsightKind,
    pub category: Option<ActionCategory>,
    pub action_id: Option<Uuid>,
    pub message: String,
}

/// Coaching tips for today's plan. Recomputed on every call, never stored.
pub fn insights(state: &AdherenceState, plan: Option<&DailyPlan>) -> Vec<Insight> {
    let mut out: Vec<Insight> = ActionCategory::ALL
        .iter()
        .filter(|c| state.get(**c).needs_simplification)
        .map(|c| Insight {
            kind: InsightKind::Simplify,
            category: Some(*c),
            action_id: None,
            message: format!(
                "{} actions have been skipped a few times in a row. We'll suggest a smaller version.",
                capitalize(c.as_str())
            ),
        })
        .collect();

    if let Some(action) = plan.and_then(|p| p.actions.iter().find(|a| a.anchor.is_none())) {
        out.push(Insight {
            kind: InsightKind::Anchor,
            category: Some(action.category),
            action_id: Some(action.id),
            message: format!(
                "Tie \"{}\" to something you already do, like after breakfast or before bed.",
                action.title
            ),
        });
    }

    if let Some(category) = ActionCategory::ALL.iter().find(|c| {
        let stats = state.get(**c);
        stats.consecutive_skips == 0 && stats.completed > ENCOURAGE_MIN_COMPLETIONS
    }) {
        out.push(Insight {
            kind: InsightKind::Encourage,
            category: Some(*category),
            action_id: None,
            message: format!(
                "You've completed {} {} actions. That consistency is paying off.",
                state.get(*category).completed,
                category.as_str()
            ),
        });
    }

    out
}

fn capitalize(raw: &str) -> String {
    let mut chars = raw.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
