use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const METRIC_MIN: i16 = 1;
pub const METRIC_MAX: i16 = 10;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetricError {
    #[error("{metric} must be between 1 and 10, got {value}")]
    OutOfRange { metric: &'static str, value: i16 },
    #[error("invalid check-in date: {0}")]
    InvalidDate(String),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Mood,
    Stress,
    Sleep,
    Energy,
    Focus,
    Anxiety,
}

impl MetricKind {
    pub const ALL: [MetricKind; 6] = [
        MetricKind::Mood,
        MetricKind::Stress,
        MetricKind::Sleep,
        MetricKind::Energy,
        MetricKind::Focus,
        MetricKind::Anxiety,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Mood => "mood",
            MetricKind::Stress => "stress",
            MetricKind::Sleep => "sleep",
            MetricKind::Energy => "energy",
            MetricKind::Focus => "focus",
            MetricKind::Anxiety => "anxiety",
        }
    }
}

/// One day's self-reported snapshot. Every scale runs 1..=10.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckinMetrics {
    pub mood: i16,
    pub stress: i16,
    pub sleep: i16,
    pub energy: i16,
    pub focus: i16,
    pub anxiety: i16,
}

impl CheckinMetrics {
    pub fn new(
        mood: i16,
        stress: i16,
        sleep: i16,
        energy: i16,
        focus: i16,
        anxiety: i16,
    ) -> Result<Self, MetricError> {
        let metrics = Self {
            mood,
            stress,
            sleep,
            energy,
            focus,
            anxiety,
        };
        metrics.validate()?;
        Ok(metrics)
    }

    pub fn validate(&self) -> Result<(), MetricError> {
        for kind in MetricKind::ALL {
            let value = self.value(kind);
            if !(METRIC_MIN..=METRIC_MAX).contains(&value) {
                return Err(MetricError::OutOfRange {
                    metric: kind.as_str(),
                    value,
                });
            }
        }
        Ok(())
    }

    pub fn value(&self, kind: MetricKind) -> i16 {
        match kind {
            MetricKind::Mood => self.mood,
            MetricKind::Stress => self.stress,
            MetricKind::Sleep => self.sleep,
            MetricKind::Energy => self.energy,
            MetricKind::Focus => self.focus,
            MetricKind::Anxiety => self.anxiety,
        }
    }
}

/// A check-in together with the calendar day it belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DatedCheckin {
    pub date: NaiveDate,
    pub metrics: CheckinMetrics,
}

impl DatedCheckin {
    pub fn new(date: NaiveDate, metrics: CheckinMetrics) -> Self {
        Self { date, metrics }
    }

    pub fn weekday(&self) -> Weekday {
        self.date.weekday()
    }

    pub fn mood(&self) -> i16 {
        self.metrics.mood
    }

    pub fn stress(&self) -> i16 {
        self.metrics.stress
    }
}

pub fn parse_checkin_date(raw: &str) -> Result<NaiveDate, MetricError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| MetricError::InvalidDate(raw.to_string()))
}

#[cfg(test)]
pub(crate) fn metrics(mood: i16, stress: i16, sleep: i16, energy: i16) -> CheckinMetrics {
    CheckinMetrics {
        mood,
        stress,
        sleep,
        energy,
        focus: 5,
        anxiety: 3,
    }
}
