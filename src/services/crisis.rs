//! Layered crisis detection over a single check-in.
//!
//! Three independent layers feed one verdict:
//!
//! - **text**: tiered regex patterns over the lowercased journal entry, with a
//!   negation set that vetoes the whole text layer when it matches;
//! - **metrics**: additive threshold score over the six scales;
//! - **history**: a run of low-mood days across the most recent check-ins.
//!
//! The detector is heuristic. It is tuned so that a false positive costs a
//! gentle prompt towards resources, while a false negative is the failure to
//! avoid. Negation only ever silences the text layer: a metrics-confirmed high
//! verdict stands regardless of what the text says.

use crate::domain::crisis::{CrisisDetectionResult, CrisisTrigger, DetectionMethod, Severity};
use crate::domain::metrics::{CheckinMetrics, DatedCheckin};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Number of most recent check-ins the history layer inspects.
pub const CONSECUTIVE_LOW_WINDOW: usize = 3;
const CONSECUTIVE_LOW_MOOD: i16 = 3;

struct PatternEntry {
    tag: &'static str,
    regex: Regex,
}

fn compile(entries: &[(&'static str, &str)]) -> Vec<PatternEntry> {
    entries
        .iter()
        .map(|&(tag, pattern)| PatternEntry {
            tag,
            regex: Regex::new(pattern).expect("hardcoded regex must compile"),
        })
        .collect()
}

static HIGH_PATTERNS: Lazy<Vec<PatternEntry>> = Lazy::new(|| {
    compile(&[
        ("self_harm_intent", r"\b(kill|killing|hurt|hurting|harm|harming|cut|cutting)\s+myself\b"),
        ("suicidal_ideation", r"\bsuicid(e|al)\b"),
        ("wish_to_die", r"\b(want|wanna|going|plan|planning|ready)\s+to\s+die\b"),
        ("end_life", r"\bend\s+(my\s+life|it\s+all|everything)\b"),
        ("take_own_life", r"\btake\s+my\s+(own\s+)?life\b"),
        ("no_will_to_live", r"\b(don'?t|do\s+not)\s+want\s+to\s+(live|be\s+alive|exist|wake\s+up)\b"),
        ("better_off_dead", r"\bbetter\s+off\s+dead\b"),
        ("no_reason_to_live", r"\bno\s+(reason|point)\s+(to|in)\s+(live|living)\b"),
    ])
});

static MEDIUM_PATTERNS: Lazy<Vec<PatternEntry>> = Lazy::new(|| {
    compile(&[
        ("hopelessness", r"\bhopeless(ness)?\b"),
        (
            "cannot_cope",
            r"\bcan'?t\s+(cope|go\s+on|keep\s+going|take\s+(it|this)\s+any\s*more|do\s+this\s+any\s*more)\b",
        ),
        ("no_way_out", r"\bno\s+way\s+out\b"),
        ("worthless", r"\b(worthless|useless|a\s+burden)\b"),
        ("nobody_cares", r"\b(nobody|no\s+one)\s+(would\s+)?(care|cares|notice|miss\s+me)\b"),
        ("giving_up", r"\bgiv(e|ing)\s+up\s+on\s+(everything|life|myself)\b"),
        ("better_without_me", r"\bbetter\s+off\s+without\s+me\b"),
        ("trapped", r"\b(trapped|unbearable)\b"),
    ])
});

static LOW_PATTERNS: Lazy<Vec<PatternEntry>> = Lazy::new(|| {
    compile(&[
        ("overwhelmed", r"\b(overwhelmed|exhausted|drained|miserable)\b"),
        ("low_mood", r"\b(depressed|feeling\s+down|empty|numb)\b"),
        ("anxious", r"\b(anxious|panic|panicking|panicky)\b"),
        ("falling_apart", r"\bfall(ing)?\s+apart\b"),
        ("cannot_function", r"\bcan'?t\s+(sleep|focus|stop\s+crying|get\s+out\s+of\s+bed)\b"),
        ("intense_sadness", r"\b(so|really|very|incredibly)\s+(sad|lonely|tired|alone)\b"),
        ("struggling", r"\bstruggl(e|ing)\b"),
    ])
});

/// Checked before any positive pattern; a hit silences the text layer.
static NEGATION_PATTERNS: Lazy<Vec<PatternEntry>> = Lazy::new(|| {
    compile(&[
        (
            "explicit_denial",
            r"\b(don'?t|do\s+not|never|wouldn'?t|would\s+never)\s+(want\s+to\s+)?(die|kill\s+myself|hurt\s+myself|harm\s+myself|end\s+my\s+life)\b",
        ),
        ("not_suicidal", r"\b(not|never|isn'?t|wasn'?t|no\s+longer)\s+(feeling\s+)?suicidal\b"),
        ("no_thoughts", r"\bno\s+(suicidal\s+thoughts|thoughts\s+of\s+(suicide|self[-\s]?harm|dying))\b"),
        ("past_framing", r"\b(used\s+to|years\s+ago|in\s+the\s+past|back\s+then)\b"),
        ("hypothetical", r"\b(what\s+if|hypothetically|in\s+a\s+(movie|book|show|story|game))\b"),
        ("idiom", r"\b(killing\s+it|dying\s+to\s+(see|try|know|go)|dying\s+of\s+laughter)\b"),
    ])
});

/// Outcome of the text layer alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextAssessment {
    pub severity: Option<Severity>,
    pub negated: bool,
    pub matched: Vec<&'static str>,
}

/// Outcome of the metric layer alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricAssessment {
    pub score: i32,
    pub severity: Option<Severity>,
    pub factors: Vec<&'static str>,
}

pub fn detect_crisis_from_text(text: &str) -> TextAssessment {
    let lowered = text.to_lowercase().replace('\u{2019}', "'");
    if lowered.trim().is_empty() {
        return TextAssessment {
            severity: None,
            negated: false,
            matched: Vec::new(),
        };
    }

    let negations: Vec<&'static str> = NEGATION_PATTERNS
        .iter()
        .filter(|p| p.regex.is_match(&lowered))
        .map(|p| p.tag)
        .collect();
    if !negations.is_empty() {
        return TextAssessment {
            severity: None,
            negated: true,
            matched: negations,
        };
    }

    let tiers: [(Severity, &Lazy<Vec<PatternEntry>>); 3] = [
        (Severity::High, &HIGH_PATTERNS),
        (Severity::Medium, &MEDIUM_PATTERNS),
        (Severity::Low, &LOW_PATTERNS),
    ];
    for (severity, patterns) in tiers {
        let matched: Vec<&'static str> = patterns
            .iter()
            .filter(|p| p.regex.is_match(&lowered))
            .map(|p| p.tag)
            .collect();
        if !matched.is_empty() {
            return TextAssessment {
                severity: Some(severity),
                negated: false,
                matched,
            };
        }
    }

    TextAssessment {
        severity: None,
        negated: false,
        matched: Vec::new(),
    }
}

pub fn detect_crisis_from_metrics(metrics: &CheckinMetrics) -> MetricAssessment {
    let mut score = 0;
    let mut factors = Vec::new();

    if metrics.mood <= 2 {
        score += 3;
        factors.push("mood_very_low");
    } else if metrics.mood <= 4 {
        score += 1;
        factors.push("mood_low");
    }

    if metrics.stress >= 9 {
        score += 2;
        factors.push("stress_extreme");
    } else if metrics.stress >= 7 {
        score += 1;
        factors.push("stress_high");
    }

    if metrics.anxiety >= 8 {
        score += 2;
        factors.push("anxiety_severe");
    } else if metrics.anxiety >= 6 {
        score += 1;
        factors.push("anxiety_elevated");
    }

    if metrics.sleep <= 2 {
        score += 1;
        factors.push("sleep_very_poor");
    }

    if metrics.energy <= 2 {
        score += 1;
        factors.push("energy_depleted");
    }

    if metrics.mood <= 3 && metrics.stress >= 8 {
        score += 2;
        factors.push("low_mood_high_stress");
    }

    if metrics.mood <= 3 && metrics.energy <= 3 && metrics.sleep <= 3 {
        score += 2;
        factors.push("depletion_cluster");
    }

    let severity = if score >= 6 {
        Some(Severity::High)
    } else if score >= 4 {
        Some(Severity::Medium)
    } else if score >= 2 {
        Some(Severity::Low)
    } else {
        None
    };

    MetricAssessment {
        score,
        severity,
        factors,
    }
}

/// Medium when every one of the most recent check-ins has mood <= 3.
/// `recent` is ordered most-recent-first.
pub fn detect_consecutive_low(recent: &[DatedCheckin]) -> Option<Severity> {
    if recent.len() < CONSECUTIVE_LOW_WINDOW {
        return None;
    }
    recent
        .iter()
        .take(CONSECUTIVE_LOW_WINDOW)
        .all(|c| c.mood() <= CONSECUTIVE_LOW_MOOD)
        .then_some(Severity::Medium)
}

#[derive(Debug, Clone, Default)]
pub struct CrisisDetector;

impl CrisisDetector {
    pub fn new() -> Self {
        Self
    }

    pub fn detect(
        &self,
        text: Option<&str>,
        metrics: &CheckinMetrics,
        recent: &[DatedCheckin],
    ) -> CrisisDetectionResult {
        let text = text
            .map(detect_crisis_from_text)
            .filter(|t| t.severity.is_some());
        let metric = detect_crisis_from_metrics(metrics);
        let history = detect_consecutive_low(recent);

        let text_factors = || -> Vec<String> {
            text.as_ref()
                .map(|t| t.matched.iter().map(|tag| format!("text:{tag}")).collect())
                .unwrap_or_default()
        };
        let metric_factors = || -> Vec<String> {
            metric.factors.iter().map(|f| f.to_string()).collect()
        };

        let text_severity = text.as_ref().and_then(|t| t.severity);

        if text_severity == Some(Severity::High) {
            let mut factors = text_factors();
            factors.extend(metric_factors());
            return CrisisDetectionResult::detected(
                Severity::High,
                CrisisTrigger::Keyword,
                DetectionMethod::TextPattern,
                factors,
            );
        }

        if metric.severity == Some(Severity::High) {
            let mut factors = metric_factors();
            factors.extend(text_factors());
            let method = if text_severity.is_some() {
                DetectionMethod::Combined
            } else {
                DetectionMethod::MetricThreshold
            };
            return CrisisDetectionResult::detected(
                Severity::High,
                CrisisTrigger::MetricPattern,
                method,
                factors,
            );
        }

        if text_severity == Some(Severity::Medium) && metric.severity.is_some() {
            let mut factors = text_factors();
            factors.extend(metric_factors());
            factors.push("escalated:text_and_metrics".to_string());
            return CrisisDetectionResult::detected(
                Severity::High,
                CrisisTrigger::Keyword,
                DetectionMethod::Combined,
                factors,
            );
        }

        // Highest remaining signal wins; ties prefer text, then history.
        let mut best: Option<(Severity, CrisisTrigger, DetectionMethod)> = None;
        let candidates = [
            text_severity.map(|s| (s, CrisisTrigger::Keyword, DetectionMethod::TextPattern)),
            history.map(|s| (s, CrisisTrigger::ConsecutiveLow, DetectionMethod::HistoryPattern)),
            metric
                .severity
                .map(|s| (s, CrisisTrigger::MetricPattern, DetectionMethod::MetricThreshold)),
        ];
        for candidate in candidates.into_iter().flatten() {
            if best.map_or(true, |(s, _, _)| candidate.0 > s) {
                best = Some(candidate);
            }
        }

        match best {
            Some((severity, trigger, method)) => {
                let mut factors = text_factors();
                if history.is_some() {
                    factors.push("history:consecutive_low_mood".to_string());
                }
                factors.extend(metric_factors());
                CrisisDetectionResult::detected(severity, trigger, method, factors)
            }
            None => CrisisDetectionResult::not_detected(),
        }
    }

    /// The user reached for the SOS flow themselves.
    pub fn explicit_request(&self) -> CrisisDetectionResult {
        CrisisDetectionResult::detected(
            Severity::High,
            CrisisTrigger::ExplicitRequest,
            DetectionMethod::SosRequest,
            vec!["sos_requested".to_string()],
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Emergency,
    Supportive,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SupportResource {
    pub kind: ResourceKind,
    pub title: String,
    pub description: String,
    pub contact: Option<String>,
}

/// High always surfaces emergency resources; medium and low stay supportive.
pub fn resources_for(result: &CrisisDetectionResult) -> Vec<SupportResource> {
    let Some(severity) = result.severity.filter(|_| result.detected) else {
        return Vec::new();
    };

    let supportive = vec![
        SupportResource {
            kind: ResourceKind::Supportive,
            title: "Grounding exercise".into(),
            description: "Name 5 things you see, 4 you hear, 3 you can touch, 2 you smell, 1 you taste."
                .into(),
            contact: None,
        },
        SupportResource {
            kind: ResourceKind::Supportive,
            title: "Reach out".into(),
            description: "Send a short message to someone you trust and let them know today is hard."
                .into(),
            contact: None,
        },
    ];

    if severity < Severity::High {
        return supportive;
    }

    let mut resources = vec![
        SupportResource {
            kind: ResourceKind::Emergency,
            title: "Crisis line".into(),
            description: "Talk to a trained counsellor right now, any time of day.".into(),
            contact: Some("988".into()),
        },
        SupportResource {
            kind: ResourceKind::Emergency,
            title: "Emergency services".into(),
            description: "If you are in immediate danger, call your local emergency number.".into(),
            contact: Some("112 / 911".into()),
        },
        SupportResource {
            kind: ResourceKind::Emergency,
            title: "Crisis text line".into(),
            description: "Prefer typing? Text HOME to reach a volunteer crisis counsellor.".into(),
            contact: Some("741741".into()),
        },
    ];
    resources.extend(supportive);
    resources
}
