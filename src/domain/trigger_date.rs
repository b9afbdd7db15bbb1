use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A calendar day the user expects to be hard (anniversaries, deadlines).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TriggerDate {
    pub id: Uuid,
    pub date: NaiveDate,
    pub label: String,
    pub repeat_annually: bool,
}

impl TriggerDate {
    pub fn new(date: NaiveDate, label: impl Into<String>, repeat_annually: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            date,
            label: label.into(),
            repeat_annually,
        }
    }

    /// Exact match, or (month, day) match for annual dates.
    pub fn matches(&self, day: NaiveDate) -> bool {
        if self.repeat_annually {
            self.date.month() == day.month() && self.date.day() == day.day()
        } else {
            self.date == day
        }
    }

    /// Days from `today` to the next occurrence, if one lies ahead (or is
    /// today). A Feb 29 anniversary only occurs in leap years.
    pub fn days_until(&self, today: NaiveDate) -> Option<i64> {
        if !self.repeat_annually {
            let days = (self.date - today).num_days();
            return (days >= 0).then_some(days);
        }

        (today.year()..=today.year() + 4)
            .filter_map(|year| NaiveDate::from_ymd_opt(year, self.date.month(), self.date.day()))
            .find(|occurrence| *occurrence >= today)
            .map(|occurrence| (occurrence - today).num_days())
    }
}
