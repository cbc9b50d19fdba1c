//! Relative time handling for new log entries.
//!
//! Event descriptors may carry an ISO-8601 duration (`P1DT2H`, `PT30M`,
//! `P1Y2M`, `PT1.5S`) telling how far after "now" the event happens. A token
//! that does not parse leaves the base instant unchanged: a bad delta must
//! never block ingestion.

use chrono::{DateTime, Duration, Months, TimeZone, Utc};

/// Parsed components of an ISO-8601 duration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoryDuration {
    pub years: u32,
    pub months: u32,
    pub weeks: u32,
    pub days: u32,
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
    pub nanos: u32,
}

impl StoryDuration {
    /// Apply to `base`, calendar parts first. `None` on overflow.
    pub fn add_to(&self, base: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let total_months = self.years.checked_mul(12)?.checked_add(self.months)?;
        let shifted = base.checked_add_months(Months::new(total_months))?;
        let clock = Duration::try_weeks(i64::from(self.weeks))?
            .checked_add(&Duration::try_days(i64::from(self.days))?)?
            .checked_add(&Duration::try_hours(i64::from(self.hours))?)?
            .checked_add(&Duration::try_minutes(i64::from(self.minutes))?)?
            .checked_add(&Duration::try_seconds(i64::from(self.seconds))?)?
            .checked_add(&Duration::nanoseconds(i64::from(self.nanos)))?;
        shifted.checked_add_signed(clock)
    }
}

/// Parse `P[nY][nM][nW][nD][T[nH][nM][n[.f]S]]`. At least one component is
/// required, components must appear in order, and `T` must be followed by a
/// time component. Only the seconds field may carry a fraction.
pub fn parse_duration(token: &str) -> Option<StoryDuration> {
    let rest = token.trim().strip_prefix('P')?;
    let (date_part, time_part) = match rest.split_once('T') {
        Some((date, time)) => {
            if time.is_empty() {
                return None;
            }
            (date, Some(time))
        }
        None => (rest, None),
    };

    let mut out = StoryDuration::default();
    let mut seen_any = false;

    let mut order = 0usize;
    for (number, unit) in components(date_part)? {
        let slot = match unit {
            'Y' => 0,
            'M' => 1,
            'W' => 2,
            'D' => 3,
            _ => return None,
        };
        if slot < order || number.contains('.') {
            return None;
        }
        order = slot + 1;
        let value: u32 = number.parse().ok()?;
        match unit {
            'Y' => out.years = value,
            'M' => out.months = value,
            'W' => out.weeks = value,
            _ => out.days = value,
        }
        seen_any = true;
    }

    if let Some(time_part) = time_part {
        let mut order = 0usize;
        let mut any_time = false;
        for (number, unit) in components(time_part)? {
            let slot = match unit {
                'H' => 0,
                'M' => 1,
                'S' => 2,
                _ => return None,
            };
            if slot < order {
                return None;
            }
            order = slot + 1;
            match unit {
                'S' => {
                    let (secs, nanos) = parse_seconds(number)?;
                    out.seconds = secs;
                    out.nanos = nanos;
                }
                _ => {
                    if number.contains('.') {
                        return None;
                    }
                    let value: u32 = number.parse().ok()?;
                    if unit == 'H' {
                        out.hours = value;
                    } else {
                        out.minutes = value;
                    }
                }
            }
            any_time = true;
        }
        if !any_time {
            return None;
        }
        seen_any = true;
    }

    seen_any.then_some(out)
}

/// Split `"1Y2M"` into `[("1", 'Y'), ("2", 'M')]`. `None` on stray text.
fn components(part: &str) -> Option<Vec<(&str, char)>> {
    let mut out = Vec::new();
    let mut start = 0usize;
    for (idx, ch) in part.char_indices() {
        if ch.is_ascii_digit() || ch == '.' {
            continue;
        }
        let number = &part[start..idx];
        if number.is_empty() {
            return None;
        }
        out.push((number, ch));
        start = idx + ch.len_utf8();
    }
    if start != part.len() {
        return None;
    }
    Some(out)
}

fn parse_seconds(number: &str) -> Option<(u32, u32)> {
    match number.split_once('.') {
        None => Some((number.parse().ok()?, 0)),
        Some((whole, frac)) => {
            if whole.is_empty() || frac.is_empty() || frac.len() > 9 {
                return None;
            }
            if !frac.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            let secs: u32 = whole.parse().ok()?;
            let padded = format!("{:0<9}", frac);
            Some((secs, padded.parse().ok()?))
        }
    }
}

/// Advance `base` by `token` when it is a valid duration; otherwise return
/// `base` unchanged.
pub fn resolve_time(base: DateTime<Utc>, token: Option<&str>) -> DateTime<Utc> {
    token
        .and_then(parse_duration)
        .and_then(|d| d.add_to(base))
        .unwrap_or(base)
}

/// Render an instant as story-clock text, e.g. `Monday, 3 March, 2025, 4:05 pm`.
pub fn format_story_time<Tz>(instant: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    instant.format("%A, %-d %B, %Y, %-I:%M %P").to_string()
}
