pub mod alerts;
pub mod patterns;

pub use alerts::{generate_alert, AlertContext, AlertSeverity, AlertType, ProactiveAlert};
pub use patterns::{
    analyze_day_of_week, detect_trigger_patterns, predict_tomorrow, DayOfWeekPattern,
    MoodPrediction, TriggerPattern,
};
