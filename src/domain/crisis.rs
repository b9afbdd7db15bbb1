use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Three-level ordinal shared by crisis detection and trigger patterns.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl TryFrom<&str> for Severity {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CrisisTrigger {
    Keyword,
    MetricPattern,
    ConsecutiveLow,
    ExplicitRequest,
}

impl CrisisTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrisisTrigger::Keyword => "keyword",
            CrisisTrigger::MetricPattern => "metric_pattern",
            CrisisTrigger::ConsecutiveLow => "consecutive_low",
            CrisisTrigger::ExplicitRequest => "explicit_request",
        }
    }
}

impl TryFrom<&str> for CrisisTrigger {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "keyword" => Ok(CrisisTrigger::Keyword),
            "metric_pattern" => Ok(CrisisTrigger::MetricPattern),
            "consecutive_low" => Ok(CrisisTrigger::ConsecutiveLow),
            "explicit_request" => Ok(CrisisTrigger::ExplicitRequest),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    TextPattern,
    MetricThreshold,
    HistoryPattern,
    Combined,
    SosRequest,
}

impl DetectionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionMethod::TextPattern => "text_pattern",
            DetectionMethod::MetricThreshold => "metric_threshold",
            DetectionMethod::HistoryPattern => "history_pattern",
            DetectionMethod::Combined => "combined",
            DetectionMethod::SosRequest => "sos_request",
        }
    }
}

impl TryFrom<&str> for DetectionMethod {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "text_pattern" => Ok(DetectionMethod::TextPattern),
            "metric_threshold" => Ok(DetectionMethod::MetricThreshold),
            "history_pattern" => Ok(DetectionMethod::HistoryPattern),
            "combined" => Ok(DetectionMethod::Combined),
            "sos_request" => Ok(DetectionMethod::SosRequest),
            _ => Err(()),
        }
    }
}

/// Verdict of the crisis detector. `risk_factors` are pattern tags such as
/// `mood_very_low` or `text:self_harm_intent`; never user text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CrisisDetectionResult {
    pub detected: bool,
    pub severity: Option<Severity>,
    pub trigger_type: Option<CrisisTrigger>,
    pub detection_method: Option<DetectionMethod>,
    pub risk_factors: Vec<String>,
}

impl CrisisDetectionResult {
    pub fn not_detected() -> Self {
        Self {
            detected: false,
            severity: None,
            trigger_type: None,
            detection_method: None,
            risk_factors: Vec::new(),
        }
    }

    pub fn detected(
        severity: Severity,
        trigger_type: CrisisTrigger,
        detection_method: DetectionMethod,
        risk_factors: Vec<String>,
    ) -> Self {
        Self {
            detected: true,
            severity: Some(severity),
            trigger_type: Some(trigger_type),
            detection_method: Some(detection_method),
            risk_factors,
        }
    }

    pub fn is_high(&self) -> bool {
        self.severity == Some(Severity::High)
    }
}

/// Audit record of a detection. Deliberately has no field for journal text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CrisisEvent {
    pub id: Uuid,
    pub user_id: Uuid,
    pub checkin_date: NaiveDate,
    pub severity: Severity,
    pub trigger_type: CrisisTrigger,
    pub detection_method: DetectionMethod,
    pub risk_factors: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub acknowledged: bool,
}

impl CrisisEvent {
    /// Build an event from a positive verdict; `None` when nothing fired.
    pub fn from_result(
        user_id: Uuid,
        checkin_date: NaiveDate,
        result: &CrisisDetectionResult,
    ) -> Option<Self> {
        if !result.detected {
            return None;
        }
        Some(Self {
            id: Uuid::new_v4(),
            user_id,
            checkin_date,
            severity: result.severity?,
            trigger_type: result.trigger_type?,
            detection_method: result.detection_method?,
            risk_factors: result.risk_factors.clone(),
            created_at: Utc::now(),
            acknowledged: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_orders_low_to_high() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert_eq!(
            [Severity::Medium, Severity::High, Severity::Low].iter().max(),
            Some(&Severity::High)
        );
    }

    #[test]
    fn negative_verdict_builds_no_event() {
        let result = CrisisDetectionResult::not_detected();
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        assert!(CrisisEvent::from_result(Uuid::new_v4(), date, &result).is_none());
    }

    #[test]
    fn labels_round_trip_through_strings() {
        for trigger in [
            CrisisTrigger::Keyword,
            CrisisTrigger::MetricPattern,
            CrisisTrigger::ConsecutiveLow,
            CrisisTrigger::ExplicitRequest,
        ] {
            assert_eq!(CrisisTrigger::try_from(trigger.as_str()), Ok(trigger));
        }
        assert_eq!(Severity::try_from("medium"), Ok(Severity::Medium));
        assert_eq!(
            DetectionMethod::try_from("combined"),
            Ok(DetectionMethod::Combined)
        );
    }
}
