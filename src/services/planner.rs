use crate::domain::metrics::CheckinMetrics;
use crate::domain::plan::{
    ActionCategory, ActionTemplate, DailyPlan, Difficulty, PlannedAction, TargetCondition,
};
use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::sync::Mutex;
use uuid::Uuid;

/// Final pick is uniform among this many best-scored candidates.
pub const TOP_K: usize = 3;
/// Templates used within this many days are avoided when possible.
pub const RECENT_DAYS: i64 = 3;

/// Source of the final top-k pick. Injected so tests can pin it down.
pub trait RandomSource: Send + Sync {
    /// Uniform index in `0..len`. `len` is never zero.
    fn pick_index(&self, len: usize) -> usize;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn pick_index(&self, len: usize) -> usize {
        rand::thread_rng().gen_range(0..len)
    }
}

pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandom {
    fn pick_index(&self, len: usize) -> usize {
        match self.rng.lock() {
            Ok(mut rng) => rng.gen_range(0..len),
            Err(poisoned) => poisoned.into_inner().gen_range(0..len),
        }
    }
}

/// Everything about the user that shapes today's plan besides the catalog.
#[derive(Debug, Clone, Default)]
pub struct PlanContext {
    pub focus_areas: Vec<String>,
    /// Template ids used in the last [`RECENT_DAYS`] days.
    pub recent_template_ids: HashSet<String>,
    /// Categories the adherence tracker wants made easier.
    pub simplify: HashSet<ActionCategory>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredTemplate<'a> {
    pub template: &'a ActionTemplate,
    pub score: i32,
}

/// Count of {energy <= 4, stress >= 7, mood <= 4}: two or more is easy,
/// one is medium, none is hard.
pub fn difficulty_tier(metrics: &CheckinMetrics) -> Difficulty {
    let strain = [metrics.energy <= 4, metrics.stress >= 7, metrics.mood <= 4]
        .iter()
        .filter(|hit| **hit)
        .count();
    match strain {
        0 => Difficulty::Hard,
        1 => Difficulty::Medium,
        _ => Difficulty::Easy,
    }
}

/// How well a template's declared targets fit today's numbers.
pub fn score_template(template: &ActionTemplate, metrics: &CheckinMetrics) -> i32 {
    template
        .targets
        .iter()
        .map(|target| {
            let value = metrics.value(target.metric) as i32;
            let threshold = target.threshold as i32;
            match target.condition {
                TargetCondition::Low if value <= threshold => (threshold - value + 1) * 2,
                TargetCondition::High if value >= threshold => (value - threshold + 1) * 2,
                _ => 0,
            }
        })
        .sum()
}

/// Apply `keep`, falling back to the unfiltered pool when nothing survives.
fn narrow<'a>(
    candidates: Vec<&'a ActionTemplate>,
    keep: impl Fn(&ActionTemplate) -> bool,
) -> Vec<&'a ActionTemplate> {
    let filtered: Vec<&ActionTemplate> = candidates.iter().copied().filter(|t| keep(*t)).collect();
    if filtered.is_empty() {
        candidates
    } else {
        filtered
    }
}

/// Candidates for one category, best first. Ties keep catalog order.
pub fn rank_candidates<'a>(
    templates: &'a [ActionTemplate],
    category: ActionCategory,
    metrics: &CheckinMetrics,
    ctx: &PlanContext,
) -> Vec<ScoredTemplate<'a>> {
    let in_category: Vec<&ActionTemplate> = templates
        .iter()
        .filter(|t| t.active && t.category == category)
        .collect();
    if in_category.is_empty() {
        return Vec::new();
    }

    let focus: HashSet<String> = ctx.focus_areas.iter().map(|f| f.to_lowercase()).collect();
    let tier = if ctx.simplify.contains(&category) {
        Difficulty::Easy
    } else {
        difficulty_tier(metrics)
    };

    let candidates = narrow(in_category, |t| {
        t.focus_tags.iter().any(|tag| focus.contains(&tag.to_lowercase()))
    });
    let candidates = narrow(candidates, |t| t.difficulty == tier);
    let candidates = narrow(candidates, |t| !ctx.recent_template_ids.contains(&t.id));

    let mut scored: Vec<ScoredTemplate<'a>> = candidates
        .into_iter()
        .map(|template| ScoredTemplate {
            template,
            score: score_template(template, metrics),
        })
        .collect();
    scored.sort_by(|a, b| b.score.cmp(&a.score));
    scored
}

pub fn select_action<'a>(
    templates: &'a [ActionTemplate],
    category: ActionCategory,
    metrics: &CheckinMetrics,
    ctx: &PlanContext,
    rng: &dyn RandomSource,
) -> Option<&'a ActionTemplate> {
    let ranked = rank_candidates(templates, category, metrics, ctx);
    if ranked.is_empty() {
        return None;
    }
    let top = ranked.len().min(TOP_K);
    Some(ranked[rng.pick_index(top)].template)
}

/// One action per category, in category order. Categories with no active
/// template are left out.
pub fn generate_plan(
    user_id: Uuid,
    plan_date: NaiveDate,
    templates: &[ActionTemplate],
    metrics: &CheckinMetrics,
    ctx: &PlanContext,
    rng: &dyn RandomSource,
) -> DailyPlan {
    let actions = ActionCategory::ALL
        .iter()
        .filter_map(|category| {
            let template = select_action(templates, *category, metrics, ctx, rng)?;
            let mut action = PlannedAction::from_template(template);
            action.simplified = ctx.simplify.contains(category);
            Some(action)
        })
        .collect();

    DailyPlan::new(user_id, plan_date, actions)
}

/// Best-scored replacement for `action_id`, excluding templates already in
/// the plan. The anchor carries over.
pub fn swap_candidate(
    plan: &DailyPlan,
    action_id: Uuid,
    templates: &[ActionTemplate],
    metrics: &CheckinMetrics,
    ctx: &PlanContext,
) -> Option<PlannedAction> {
    let current = plan.action(action_id)?;
    let in_plan: HashSet<&str> = plan.template_ids().collect();
    let pool: Vec<ActionTemplate> = templates
        .iter()
        .filter(|t| !in_plan.contains(t.id.as_str()))
        .cloned()
        .collect();

    let ranked = rank_candidates(&pool, current.category, metrics, ctx);
    let best = ranked.first()?;
    let mut replacement = PlannedAction::from_template(best.template);
    if current.anchor.is_some() {
        replacement.anchor = current.anchor.clone();
    }
    replacement.simplified = current.simplified;
    Some(replacement)
}
