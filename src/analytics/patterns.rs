use crate::domain::crisis::Severity;
use crate::domain::metrics::DatedCheckin;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// Minimum history for weekday statistics and trigger patterns.
pub const MIN_PATTERN_HISTORY: usize = 7;
/// Minimum history for a next-day forecast.
pub const MIN_PREDICTION_HISTORY: usize = 3;
/// Samples a weekday needs before its average is trusted as a forecast base.
pub const MIN_WEEKDAY_SAMPLES: usize = 3;

const HARDER_MOOD_BELOW: f64 = 3.0;
const HARDER_STRESS_ABOVE: f64 = 3.0;
const PREDICTION_MIN: f64 = 1.0;
const PREDICTION_MAX: f64 = 5.0;
const TREND_MIN_MAGNITUDE: f64 = 1.0;
const WEEKDAY_TREND_WEIGHT: f64 = 0.3;
const RECENT_TREND_WEIGHT: f64 = 0.5;
const WEEKDAY_CONFIDENCE_CAP: f64 = 0.85;
const RECENT_CONFIDENCE: f64 = 0.5;

const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DayOfWeekPattern {
    pub weekday: Weekday,
    pub day_name: String,
    pub average_mood: f64,
    pub average_stress: f64,
    pub sample_count: usize,
    pub is_harder: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PredictionBasis {
    Weekday,
    RecentTrend,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MoodPrediction {
    pub target_date: NaiveDate,
    pub predicted_mood: f64,
    pub confidence: f64,
    pub basis: PredictionBasis,
    pub sample_count: usize,
    pub reasoning: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TriggerPatternKind {
    DayOfWeek,
    ConsecutiveLow,
    HighStress,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TriggerPattern {
    pub kind: TriggerPatternKind,
    pub severity: Severity,
    pub description: String,
    pub occurrences: usize,
    pub max_run: Option<usize>,
    pub weekday: Option<Weekday>,
}

pub fn day_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Per-weekday mood and stress averages. Weekdays without records are
/// omitted. Empty below [`MIN_PATTERN_HISTORY`] records.
pub fn analyze_day_of_week(history: &[DatedCheckin]) -> Vec<DayOfWeekPattern> {
    if history.len() < MIN_PATTERN_HISTORY {
        return Vec::new();
    }

    WEEK.iter()
        .filter_map(|weekday| {
            let samples: Vec<&DatedCheckin> =
                history.iter().filter(|c| c.weekday() == *weekday).collect();
            if samples.is_empty() {
                return None;
            }
            let count = samples.len() as f64;
            let average_mood = samples.iter().map(|c| c.mood() as f64).sum::<f64>() / count;
            let average_stress = samples.iter().map(|c| c.stress() as f64).sum::<f64>() / count;
            Some(DayOfWeekPattern {
                weekday: *weekday,
                day_name: day_name(*weekday).to_string(),
                average_mood,
                average_stress,
                sample_count: samples.len(),
                is_harder: average_mood < HARDER_MOOD_BELOW || average_stress > HARDER_STRESS_ABOVE,
            })
        })
        .collect()
}

/// Forecast mood for the day after `today`. `history` is most-recent-first.
///
/// The result is clamped to [1, 5]: forecasts stay deliberately conservative
/// and never promise a great day.
pub fn predict_tomorrow(history: &[DatedCheckin], today: NaiveDate) -> Option<MoodPrediction> {
    if history.len() < MIN_PREDICTION_HISTORY {
        return None;
    }

    let target_date = today + Duration::days(1);
    let target_weekday = target_date.weekday();
    let recent = &history[..MIN_PREDICTION_HISTORY];
    let trend = (recent[0].mood() - recent[MIN_PREDICTION_HISTORY - 1].mood()) as f64;

    let weekday_samples: Vec<f64> = history
        .iter()
        .filter(|c| c.weekday() == target_weekday)
        .map(|c| c.mood() as f64)
        .collect();

    let mut reasoning = Vec::new();
    let (base, trend_weight, confidence, basis, sample_count) =
        if weekday_samples.len() >= MIN_WEEKDAY_SAMPLES {
            reasoning.push(format!("{}_average", day_name(target_weekday).to_lowercase()));
            let count = weekday_samples.len();
            (
                weekday_samples.iter().sum::<f64>() / count as f64,
                WEEKDAY_TREND_WEIGHT,
                (count as f64 / 10.0).min(WEEKDAY_CONFIDENCE_CAP),
                PredictionBasis::Weekday,
                count,
            )
        } else {
            reasoning.push("recent_average".to_string());
            (
                recent.iter().map(|c| c.mood() as f64).sum::<f64>() / recent.len() as f64,
                RECENT_TREND_WEIGHT,
                RECENT_CONFIDENCE,
                PredictionBasis::RecentTrend,
                recent.len(),
            )
        };

    let mut predicted = base;
    if trend.abs() > TREND_MIN_MAGNITUDE {
        predicted += trend * trend_weight;
        reasoning.push(if trend > 0.0 { "trend_up" } else { "trend_down" }.to_string());
    }

    Some(MoodPrediction {
        target_date,
        predicted_mood: predicted.clamp(PREDICTION_MIN, PREDICTION_MAX),
        confidence,
        basis,
        sample_count,
        reasoning,
    })
}

/// Recurring difficulty signals in the history (most-recent-first). Empty
/// below [`MIN_PATTERN_HISTORY`] records.
pub fn detect_trigger_patterns(history: &[DatedCheckin]) -> Vec<TriggerPattern> {
    if history.len() < MIN_PATTERN_HISTORY {
        return Vec::new();
    }

    let mut patterns: Vec<TriggerPattern> = analyze_day_of_week(history)
        .into_iter()
        .filter(|day| day.is_harder && day.sample_count >= MIN_WEEKDAY_SAMPLES)
        .map(|day| TriggerPattern {
            kind: TriggerPatternKind::DayOfWeek,
            severity: Severity::Medium,
            description: format!(
                "{}s tend to be harder (mood {:.1}, stress {:.1})",
                day.day_name, day.average_mood, day.average_stress
            ),
            occurrences: day.sample_count,
            max_run: None,
            weekday: Some(day.weekday),
        })
        .collect();

    patterns.extend(consecutive_low_pattern(history));
    patterns.extend(high_stress_pattern(history));
    patterns
}

fn consecutive_low_pattern(history: &[DatedCheckin]) -> Option<TriggerPattern> {
    let mut chronological: Vec<&DatedCheckin> = history.iter().collect();
    chronological.sort_by_key(|c| c.date);

    let mut runs = Vec::new();
    let mut current = 0usize;
    let mut previous: Option<NaiveDate> = None;
    for checkin in chronological {
        let contiguous = previous.map_or(false, |p| checkin.date - p == Duration::days(1));
        if !contiguous {
            if current >= 2 {
                runs.push(current);
            }
            current = 0;
        }
        if checkin.mood() <= 2 {
            current += 1;
        } else {
            if current >= 2 {
                runs.push(current);
            }
            current = 0;
        }
        previous = Some(checkin.date);
    }
    if current >= 2 {
        runs.push(current);
    }

    let max_run = runs.iter().copied().max()?;
    let severity = if max_run >= 4 {
        Severity::High
    } else if max_run >= 3 {
        Severity::Medium
    } else {
        Severity::Low
    };

    Some(TriggerPattern {
        kind: TriggerPatternKind::ConsecutiveLow,
        severity,
        description: format!(
            "{} stretch(es) of consecutive very low mood days, longest {} days",
            runs.len(),
            max_run
        ),
        occurrences: runs.len(),
        max_run: Some(max_run),
        weekday: None,
    })
}

fn high_stress_pattern(history: &[DatedCheckin]) -> Option<TriggerPattern> {
    let count = history.iter().filter(|c| c.stress() >= 4).count();
    if count < 3 {
        return None;
    }
    let severity = if count >= 7 {
        Severity::High
    } else if count >= 5 {
        Severity::Medium
    } else {
        Severity::Low
    };
    Some(TriggerPattern {
        kind: TriggerPatternKind::HighStress,
        severity,
        description: format!("Elevated stress on {count} recent days"),
        occurrences: count,
        max_run: None,
        weekday: None,
    })
}
