//! Five-field cron expressions
//!
//! Supports `*`, single values, ranges (`1-5`), steps (`*/15`, `0-30/10`), lists
//! (`1,15,30`) and three-letter month/day names. Day-of-week accepts `0`-`7`
//! where both `0` and `7` are Sunday. When both day-of-month and day-of-week are
//! restricted (neither starts with `*`) a day matches if either field matches.

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, NaiveDateTime, TimeZone, Timelike};
use std::fmt;
use std::str::FromStr;

const MONTH_NAMES: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];
const DAY_NAMES: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

/// Upper bound on how far ahead a trigger is searched for (e.g. `0 0 30 2 *` never fires)
const SEARCH_LIMIT_DAYS: i64 = 366 * 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronParseError(String);

impl fmt::Display for CronParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid cron expression: {}", self.0)
    }
}

impl std::error::Error for CronParseError {}

/// Bitset of allowed values for one field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FieldSet {
    bits: u64,
    restricted: bool,
}

impl FieldSet {
    fn contains(&self, value: u32) -> bool {
        self.bits & (1u64 << value) != 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    expression: String,
    minutes: FieldSet,
    hours: FieldSet,
    days_of_month: FieldSet,
    months: FieldSet,
    days_of_week: FieldSet,
}

impl CronSchedule {
    pub fn parse(expression: &str) -> Result<Self, CronParseError> {
        let fields: Vec<&str> = expression.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(CronParseError(format!(
                "expected 5 fields, found {} in '{}'",
                fields.len(),
                expression
            )));
        }

        let mut days_of_week = parse_field(fields[4], 0, 7, Some(&DAY_NAMES))?;
        // 7 is an alias for Sunday
        if days_of_week.contains(7) {
            days_of_week.bits = (days_of_week.bits | 1) & !(1u64 << 7);
        }

        Ok(Self {
            expression: fields.join(" "),
            minutes: parse_field(fields[0], 0, 59, None)?,
            hours: parse_field(fields[1], 0, 23, None)?,
            days_of_month: parse_field(fields[2], 1, 31, None)?,
            months: parse_field(fields[3], 1, 12, Some(&MONTH_NAMES))?,
            days_of_week,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// First trigger strictly after `after`, in local time
    pub fn next_after(&self, after: DateTime<Local>) -> Option<DateTime<Local>> {
        let naive = after.naive_local();
        // Start at the next whole minute
        let mut candidate = naive.with_second(0)?.with_nanosecond(0)? + Duration::minutes(1);
        let limit = naive + Duration::days(SEARCH_LIMIT_DAYS);

        while candidate <= limit {
            if !self.months.contains(candidate.month()) {
                candidate = first_of_next_month(candidate)?;
                continue;
            }
            if !self.day_matches(candidate.date()) {
                candidate = (candidate.date() + Duration::days(1)).and_hms_opt(0, 0, 0)?;
                continue;
            }
            if !self.hours.contains(candidate.hour()) {
                candidate = candidate.with_minute(0)? + Duration::hours(1);
                continue;
            }
            if !self.minutes.contains(candidate.minute()) {
                candidate += Duration::minutes(1);
                continue;
            }

            // Skip local times that do not exist (DST gaps)
            if let Some(resolved) = Local.from_local_datetime(&candidate).earliest() {
                if resolved > after {
                    return Some(resolved);
                }
            }
            candidate += Duration::minutes(1);
        }

        None
    }

    fn day_matches(&self, date: NaiveDate) -> bool {
        let dom = self.days_of_month.contains(date.day());
        let dow = self
            .days_of_week
            .contains(date.weekday().num_days_from_sunday());

        if self.days_of_month.restricted && self.days_of_week.restricted {
            dom || dow
        } else {
            dom && dow
        }
    }
}

impl FromStr for CronSchedule {
    type Err = CronParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

fn first_of_next_month(dt: NaiveDateTime) -> Option<NaiveDateTime> {
    let (year, month) = if dt.month() == 12 {
        (dt.year() + 1, 1)
    } else {
        (dt.year(), dt.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)?.and_hms_opt(0, 0, 0)
}

fn parse_field(
    field: &str,
    min: u32,
    max: u32,
    names: Option<&[&str]>,
) -> Result<FieldSet, CronParseError> {
    let mut bits = 0u64;
    // Any field starting with `*` counts as unrestricted, `*/2` included
    let restricted = !field.starts_with('*');

    for part in field.split(',') {
        let (range, step) = match part.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step
                    .parse()
                    .map_err(|_| CronParseError(format!("invalid step '{}'", step)))?;
                if step == 0 || step > max {
                    return Err(CronParseError(format!("step out of range in '{}'", part)));
                }
                (range, Some(step))
            }
            None => (part, None),
        };

        let (start, end) = if range == "*" {
            (min, max)
        } else if let Some((lo, hi)) = range.split_once('-') {
            (parse_value(lo, min, max, names)?, parse_value(hi, min, max, names)?)
        } else {
            let value = parse_value(range, min, max, names)?;
            // `5/15` means "from 5 to the end, every 15"
            (value, if step.is_some() { max } else { value })
        };

        if start > end {
            return Err(CronParseError(format!("range {}-{} is reversed", start, end)));
        }

        for value in (start..=end).step_by(step.unwrap_or(1) as usize) {
            bits |= 1u64 << value;
        }
    }

    Ok(FieldSet { bits, restricted })
}

fn parse_value(
    token: &str,
    min: u32,
    max: u32,
    names: Option<&[&str]>,
) -> Result<u32, CronParseError> {
    let lower = token.to_ascii_lowercase();
    let value = match names.and_then(|n| n.iter().position(|name| *name == lower)) {
        // Month names start at 1, day names at 0
        Some(index) => index as u32 + min,
        None => token
            .parse::<u32>()
            .map_err(|_| CronParseError(format!("invalid value '{}'", token)))?,
    };

    if value < min || value > max {
        return Err(CronParseError(format!(
            "value {} out of range {}-{}",
            value, min, max
        )));
    }
    Ok(value)
}
