pub mod crisis;
pub mod metrics;
pub mod plan;
pub mod trigger_date;

pub use crisis::{CrisisDetectionResult, CrisisEvent, CrisisTrigger, DetectionMethod, Severity};
pub use metrics::{CheckinMetrics, DatedCheckin, MetricError, MetricKind};
pub use plan::{
    ActionCategory, ActionStatus, ActionTemplate, DailyPlan, Difficulty, MetricTarget,
    PlannedAction, TargetCondition,
};
pub use trigger_date::TriggerDate;
