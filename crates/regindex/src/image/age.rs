//! Calendar-aware age of an image.
//!
//! An age is decomposed the way a person reads a calendar: whole months first
//! (clamping to the end of shorter months), then the remaining days and time
//! of day. Only the largest non-zero unit is ever shown.

use std::fmt;

use chrono::{DateTime, Datelike, Months, TimeDelta, Utc};
use serde::{Serialize, Serializer};

const MICROS_PER_SECOND: i64 = 1_000_000;
const MICROS_PER_MINUTE: i64 = 60 * MICROS_PER_SECOND;
const MICROS_PER_HOUR: i64 = 60 * MICROS_PER_MINUTE;
const MICROS_PER_DAY: i64 = 24 * MICROS_PER_HOUR;

/// Text used when an age has no positive component.
pub const UNKNOWN_AGE: &str = "n/a";

/// Difference between two instants in calendar units.
///
/// All components share the sign of `now - then`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CalendarDelta {
    pub years: i64,
    pub months: i64,
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
    pub microseconds: i64,
}

impl CalendarDelta {
    /// Decompose `now - then`.
    pub fn between(now: DateTime<Utc>, then: DateTime<Utc>) -> Self {
        let mut months = i64::from(now.year() - then.year()) * 12 + i64::from(now.month())
            - i64::from(then.month());
        let mut anchor = shift_months(then, months);
        if now >= then {
            while anchor > now {
                months -= 1;
                anchor = shift_months(then, months);
            }
        } else {
            while anchor < now {
                months += 1;
                anchor = shift_months(then, months);
            }
        }

        // less than a month remains, so this always fits
        let rest = (now - anchor).num_microseconds().unwrap_or(0);

        Self {
            years: months / 12,
            months: months % 12,
            days: rest / MICROS_PER_DAY,
            hours: rest % MICROS_PER_DAY / MICROS_PER_HOUR,
            minutes: rest % MICROS_PER_HOUR / MICROS_PER_MINUTE,
            seconds: rest % MICROS_PER_MINUTE / MICROS_PER_SECOND,
            microseconds: rest % MICROS_PER_SECOND,
        }
    }

    /// Whole weeks contained in the day component.
    #[must_use]
    pub fn weeks(&self) -> i64 {
        self.days / 7
    }

    /// Apply the delta backwards: months first, then the fixed-length part.
    #[must_use]
    pub fn subtract_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let shifted = shift_months(now, -(self.years * 12 + self.months));
        let fixed = self.days * MICROS_PER_DAY
            + self.hours * MICROS_PER_HOUR
            + self.minutes * MICROS_PER_MINUTE
            + self.seconds * MICROS_PER_SECOND
            + self.microseconds;
        shifted - TimeDelta::microseconds(fixed)
    }

    /// Single-unit description such as `"3 weeks"` or `"1 year"`.
    ///
    /// Units are tried from largest to smallest. There is no minute unit and
    /// the minute component is dropped, so 5m3s reads `"3 seconds"` and an
    /// age of whole minutes is `"n/a"`.
    #[must_use]
    pub fn humanize(&self) -> String {
        let candidates = [
            (self.years, "year"),
            (self.months, "month"),
            (self.weeks(), "week"),
            (self.days, "day"),
            (self.hours, "hour"),
            (self.seconds, "second"),
        ];
        candidates
            .into_iter()
            .find(|(count, _)| *count > 0)
            .map(|(count, unit)| format!("{} {}", count, plural_or_not(count, unit)))
            .unwrap_or_else(|| UNKNOWN_AGE.to_string())
    }

    fn is_negative(&self) -> bool {
        [
            self.years,
            self.months,
            self.days,
            self.hours,
            self.minutes,
            self.seconds,
            self.microseconds,
        ]
        .iter()
        .any(|c| *c < 0)
    }
}

/// Append an `s` when `count` is greater than one.
pub fn plural_or_not(count: i64, unit: &str) -> String {
    if count > 1 {
        format!("{unit}s")
    } else {
        unit.to_string()
    }
}

/// Canonical form, e.g. `1y 2mo 3d 4h 5m 6.000007s`; `0s` when empty.
impl fmt::Display for CalendarDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_negative() {
            f.write_str("-")?;
        }
        let mut parts: Vec<String> = [
            (self.years, "y"),
            (self.months, "mo"),
            (self.days, "d"),
            (self.hours, "h"),
            (self.minutes, "m"),
        ]
        .iter()
        .filter(|(count, _)| *count != 0)
        .map(|(count, unit)| format!("{}{}", count.abs(), unit))
        .collect();

        if self.microseconds != 0 {
            parts.push(format!(
                "{}.{:06}s",
                self.seconds.abs(),
                self.microseconds.abs()
            ));
        } else if self.seconds != 0 || parts.is_empty() {
            parts.push(format!("{}s", self.seconds.abs()));
        }

        f.write_str(&parts.join(" "))
    }
}

impl Serialize for CalendarDelta {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

fn shift_months(ts: DateTime<Utc>, months: i64) -> DateTime<Utc> {
    let magnitude = Months::new(u32::try_from(months.unsigned_abs()).unwrap_or(u32::MAX));
    let shifted = if months >= 0 {
        ts.checked_add_months(magnitude)
    } else {
        ts.checked_sub_months(magnitude)
    };
    shifted.unwrap_or(ts)
}
