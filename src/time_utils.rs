use chrono::{DateTime, FixedOffset, NaiveDate, Timelike, Utc};
use chrono_tz::Tz;

/// A user's timezone: an IANA name or a bare UTC offset such as `+02:00`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Zone {
    Named(Tz),
    Fixed(FixedOffset),
}

/// The user's calendar day and hour at some instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalClock {
    pub date: NaiveDate,
    pub hour: u32,
}

fn parse_offset(raw: &str) -> Option<FixedOffset> {
    let raw = raw.trim();
    let (sign, rest) = match raw.chars().next()? {
        '+' => (1, &raw[1..]),
        '-' => (-1, &raw[1..]),
        _ => return None,
    };

    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h.parse::<i32>().ok()?, m.parse::<i32>().ok()?),
        None if rest.len() > 2 => {
            let (h, m) = rest.split_at(rest.len() - 2);
            (h.parse::<i32>().ok()?, m.parse::<i32>().ok()?)
        }
        None => (rest.parse::<i32>().ok()?, 0),
    };

    if hours > 14 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

fn canonical_name(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("utc") || trimmed.eq_ignore_ascii_case("gmt") {
        "UTC".to_string()
    } else if trimmed == "Europe/Kiev" {
        "Europe/Kyiv".to_string()
    } else {
        trimmed.to_string()
    }
}

impl Zone {
    pub fn parse(raw: &str) -> Option<Self> {
        let name = canonical_name(raw);
        if name.is_empty() {
            return None;
        }
        if name == "UTC" {
            return FixedOffset::east_opt(0).map(Zone::Fixed);
        }

        let upper = name.to_uppercase();
        if upper.starts_with("UTC") || upper.starts_with("GMT") {
            return parse_offset(&name[3..]).map(Zone::Fixed);
        }
        if name.starts_with('+') || name.starts_with('-') {
            return parse_offset(&name).map(Zone::Fixed);
        }

        name.parse::<Tz>().ok().map(Zone::Named)
    }

    pub fn clock_at(&self, instant: DateTime<Utc>) -> LocalClock {
        match self {
            Zone::Named(tz) => {
                let local = instant.with_timezone(tz);
                LocalClock {
                    date: local.date_naive(),
                    hour: local.hour(),
                }
            }
            Zone::Fixed(offset) => {
                let local = instant.with_timezone(offset);
                LocalClock {
                    date: local.date_naive(),
                    hour: local.hour(),
                }
            }
        }
    }
}

/// Canonical spelling of a timezone the engine can resolve, or `None`.
pub fn normalize_timezone(raw: &str) -> Option<String> {
    Zone::parse(raw).map(|_| canonical_name(raw))
}

/// Local day and hour for `raw_tz`; unknown zones read as UTC.
pub fn local_clock(raw_tz: &str, instant: DateTime<Utc>) -> LocalClock {
    match Zone::parse(raw_tz) {
        Some(zone) => zone.clock_at(instant),
        None => LocalClock {
            date: instant.date_naive(),
            hour: instant.hour(),
        },
    }
}
