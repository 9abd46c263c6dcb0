//! Partial-precision temporal values and calendar arithmetic
//!
//! Date, DateTime and Time store their components as optional fields from
//! coarsest to finest; non-contiguous precision is unrepresentable by
//! construction. Comparisons return `None` (unknown) when the operands do
//! not share the precision the comparison needs, never a fabricated
//! default.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Precision of a temporal component
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateTimePrecision {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    Millisecond,
}

impl fmt::Display for DateTimePrecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Year => write!(f, "year"),
            Self::Month => write!(f, "month"),
            Self::Day => write!(f, "day"),
            Self::Hour => write!(f, "hour"),
            Self::Minute => write!(f, "minute"),
            Self::Second => write!(f, "second"),
            Self::Millisecond => write!(f, "millisecond"),
        }
    }
}

impl DateTimePrecision {
    /// Map a boundary digit count to a Date precision (4 = year, 6 = month,
    /// 8 = day)
    pub fn from_date_digits(digits: i64) -> Option<Self> {
        match digits {
            4 => Some(Self::Year),
            6 => Some(Self::Month),
            8 => Some(Self::Day),
            _ => None,
        }
    }

    /// Map a boundary digit count to a DateTime precision
    pub fn from_datetime_digits(digits: i64) -> Option<Self> {
        match digits {
            4 => Some(Self::Year),
            6 => Some(Self::Month),
            8 => Some(Self::Day),
            10 => Some(Self::Hour),
            12 => Some(Self::Minute),
            14 => Some(Self::Second),
            17 => Some(Self::Millisecond),
            _ => None,
        }
    }

    /// Map a boundary digit count to a Time precision
    pub fn from_time_digits(digits: i64) -> Option<Self> {
        match digits {
            2 => Some(Self::Hour),
            4 => Some(Self::Minute),
            6 => Some(Self::Second),
            9 => Some(Self::Millisecond),
            _ => None,
        }
    }
}

/// A calendar or UCUM duration unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CalendarUnit {
    Year,
    Month,
    Week,
    Day,
    Hour,
    Minute,
    Second,
    Millisecond,
}

impl CalendarUnit {
    /// Parse a unit name: singular/plural calendar names and their UCUM
    /// equivalents (`a`, `mo`, `wk`, `d`, `h`, `min`, `s`, `ms`)
    pub fn parse(unit: &str) -> Option<Self> {
        match unit.trim() {
            "year" | "years" | "a" => Some(Self::Year),
            "month" | "months" | "mo" => Some(Self::Month),
            "week" | "weeks" | "wk" => Some(Self::Week),
            "day" | "days" | "d" => Some(Self::Day),
            "hour" | "hours" | "h" => Some(Self::Hour),
            "minute" | "minutes" | "min" => Some(Self::Minute),
            "second" | "seconds" | "s" => Some(Self::Second),
            "millisecond" | "milliseconds" | "ms" => Some(Self::Millisecond),
            _ => None,
        }
    }

    /// Milliseconds per unit for the exact (non-calendar) units
    pub fn millis(self) -> Option<i64> {
        match self {
            Self::Year | Self::Month => None,
            Self::Week => Some(7 * 86_400_000),
            Self::Day => Some(86_400_000),
            Self::Hour => Some(3_600_000),
            Self::Minute => Some(60_000),
            Self::Second => Some(1_000),
            Self::Millisecond => Some(1),
        }
    }

    /// Whether addition of this unit depends on the calendar date
    pub fn is_calendar(self) -> bool {
        matches!(self, Self::Year | Self::Month)
    }

    /// The precision this unit corresponds to (week maps to day)
    pub fn precision(self) -> DateTimePrecision {
        match self {
            Self::Year => DateTimePrecision::Year,
            Self::Month => DateTimePrecision::Month,
            Self::Week | Self::Day => DateTimePrecision::Day,
            Self::Hour => DateTimePrecision::Hour,
            Self::Minute => DateTimePrecision::Minute,
            Self::Second => DateTimePrecision::Second,
            Self::Millisecond => DateTimePrecision::Millisecond,
        }
    }
}

/// Number of days in a month, leap-year aware
pub fn days_in_month(year: i32, month: u8) -> u8 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
        _ => 31,
    }
}

/// Gregorian leap-year test
pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || (year % 400 == 0)
}

// ============================================================================
// Date
// ============================================================================

/// A date with partial precision: year, optional month, optional day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CqlDate {
    /// Year component (required)
    pub year: i32,
    /// Month component (1-12, optional)
    pub month: Option<u8>,
    /// Day component (1-31, optional)
    pub day: Option<u8>,
}

impl CqlDate {
    /// Minimum representable date
    pub const MIN: Self = Self {
        year: 1,
        month: Some(1),
        day: Some(1),
    };

    /// Maximum representable date
    pub const MAX: Self = Self {
        year: 9999,
        month: Some(12),
        day: Some(31),
    };

    /// Full-precision date
    pub fn new(year: i32, month: u8, day: u8) -> Self {
        Self {
            year,
            month: Some(month),
            day: Some(day),
        }
    }

    /// Year-only date
    pub fn year_only(year: i32) -> Self {
        Self {
            year,
            month: None,
            day: None,
        }
    }

    /// Year-month date
    pub fn year_month(year: i32, month: u8) -> Self {
        Self {
            year,
            month: Some(month),
            day: None,
        }
    }

    /// The precision of this date
    pub fn precision(&self) -> DateTimePrecision {
        match (self.month, self.day) {
            (None, _) => DateTimePrecision::Year,
            (Some(_), None) => DateTimePrecision::Month,
            (Some(_), Some(_)) => DateTimePrecision::Day,
        }
    }

    /// Convert to a chrono date when fully precise
    pub fn to_naive_date(&self) -> Option<NaiveDate> {
        match (self.month, self.day) {
            (Some(month), Some(day)) => {
                NaiveDate::from_ymd_opt(self.year, month as u32, day as u32)
            }
            _ => None,
        }
    }

    /// Build from a chrono date
    pub fn from_naive_date(date: NaiveDate) -> Self {
        Self::new(date.year(), date.month() as u8, date.day() as u8)
    }

    /// Parse an ISO 8601 date, with or without the CQL `@` prefix
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.strip_prefix('@').unwrap_or(s);
        let parts: Vec<&str> = s.split('-').collect();
        match parts.len() {
            1 => Some(Self::year_only(parts[0].parse().ok()?)),
            2 => {
                let month: u8 = parts[1].parse().ok()?;
                if !(1..=12).contains(&month) {
                    return None;
                }
                Some(Self::year_month(parts[0].parse().ok()?, month))
            }
            3 => {
                let year: i32 = parts[0].parse().ok()?;
                let month: u8 = parts[1].parse().ok()?;
                let day: u8 = parts[2].parse().ok()?;
                if !(1..=12).contains(&month) || day < 1 || day > days_in_month(year, month) {
                    return None;
                }
                Some(Self::new(year, month, day))
            }
            _ => None,
        }
    }

    /// Fill components down to `precision` with minimum (low) or maximum
    /// (high) values
    pub fn boundary(&self, precision: DateTimePrecision, high: bool) -> Self {
        let mut result = *self;
        if precision >= DateTimePrecision::Month && result.month.is_none() {
            result.month = Some(if high { 12 } else { 1 });
        }
        if precision >= DateTimePrecision::Day && result.day.is_none() {
            let month = result.month.unwrap_or(1);
            result.day = Some(if high {
                days_in_month(result.year, month)
            } else {
                1
            });
        }
        result
    }

    /// Digit count of this date's precision (4, 6 or 8)
    pub fn precision_digits(&self) -> i64 {
        match self.precision() {
            DateTimePrecision::Year => 4,
            DateTimePrecision::Month => 6,
            _ => 8,
        }
    }

    /// Add a signed amount of a calendar unit, at this date's precision.
    ///
    /// Year and month additions are calendar additions: day-of-month is
    /// preserved, clamped to the last valid day. Amounts finer than this
    /// date's precision are converted with the standard truncation factors
    /// (1 year = 12 months = 365 days, 1 month = 30 days).
    pub fn add(&self, amount: i64, unit: CalendarUnit) -> Option<Self> {
        match (unit, self.precision()) {
            (CalendarUnit::Year, DateTimePrecision::Year) => {
                Some(Self::year_only(checked_year(self.year as i64 + amount)?))
            }
            (CalendarUnit::Month, DateTimePrecision::Year) => {
                // Truncate to whole years
                Some(Self::year_only(checked_year(self.year as i64 + amount / 12)?))
            }
            (CalendarUnit::Year, _) | (CalendarUnit::Month, _) => {
                let months = if unit == CalendarUnit::Year {
                    amount.checked_mul(12)?
                } else {
                    amount
                };
                let total = (self.year as i64) * 12 + (self.month.unwrap() as i64 - 1) + months;
                let year = checked_year(total.div_euclid(12))?;
                let month = (total.rem_euclid(12) + 1) as u8;
                let day = self
                    .day
                    .map(|d| d.min(days_in_month(year, month)));
                Some(Self {
                    year,
                    month: Some(month),
                    day,
                })
            }
            (_, DateTimePrecision::Day) => {
                let days = match unit {
                    CalendarUnit::Week => amount.checked_mul(7)?,
                    CalendarUnit::Day => amount,
                    // Sub-day amounts truncate to whole days
                    _ => amount / (86_400_000 / unit.millis()?),
                };
                let date = self.to_naive_date()?;
                let shifted = date.checked_add_signed(chrono::Duration::days(days))?;
                if shifted.year() < 1 || shifted.year() > 9999 {
                    return None;
                }
                Some(Self::from_naive_date(shifted))
            }
            // Finer-than-precision amounts on partial dates truncate via
            // the standard factors
            (_, DateTimePrecision::Month) => {
                let days = match unit {
                    CalendarUnit::Week => amount.checked_mul(7)?,
                    CalendarUnit::Day => amount,
                    _ => amount / (86_400_000 / unit.millis()?),
                };
                self.add(days / 30, CalendarUnit::Month)
            }
            (_, DateTimePrecision::Year) => {
                let days = match unit {
                    CalendarUnit::Week => amount.checked_mul(7)?,
                    CalendarUnit::Day => amount,
                    _ => amount / (86_400_000 / unit.millis()?),
                };
                self.add(days / 365, CalendarUnit::Year)
            }
            _ => None,
        }
    }

    /// The next value at this date's natural granularity, clamped at the
    /// type maximum
    pub fn successor(&self) -> Self {
        let unit = match self.precision() {
            DateTimePrecision::Year => CalendarUnit::Year,
            DateTimePrecision::Month => CalendarUnit::Month,
            _ => CalendarUnit::Day,
        };
        self.add(1, unit).unwrap_or(Self::MAX)
    }

    /// The previous value at this date's natural granularity, clamped at
    /// the type minimum
    pub fn predecessor(&self) -> Self {
        let unit = match self.precision() {
            DateTimePrecision::Year => CalendarUnit::Year,
            DateTimePrecision::Month => CalendarUnit::Month,
            _ => CalendarUnit::Day,
        };
        self.add(-1, unit).unwrap_or(Self::MIN)
    }

    fn components(&self) -> [Option<i64>; 3] {
        [
            Some(self.year as i64),
            self.month.map(i64::from),
            self.day.map(i64::from),
        ]
    }
}

fn checked_year(year: i64) -> Option<i32> {
    if (1..=9999).contains(&year) {
        Some(year as i32)
    } else {
        None
    }
}

impl fmt::Display for CqlDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.year)?;
        if let Some(month) = self.month {
            write!(f, "-{:02}", month)?;
            if let Some(day) = self.day {
                write!(f, "-{:02}", day)?;
            }
        }
        Ok(())
    }
}

impl PartialOrd for CqlDate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        compare_components(&self.components(), &other.components())
    }
}

// ============================================================================
// DateTime
// ============================================================================

/// A date-time with partial precision and optional timezone offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CqlDateTime {
    pub year: i32,
    pub month: Option<u8>,
    pub day: Option<u8>,
    pub hour: Option<u8>,
    pub minute: Option<u8>,
    pub second: Option<u8>,
    pub millisecond: Option<u16>,
    /// Timezone offset in minutes east of UTC
    pub timezone_offset: Option<i16>,
}

impl CqlDateTime {
    /// Minimum representable date-time
    pub const MIN: Self = Self {
        year: 1,
        month: Some(1),
        day: Some(1),
        hour: Some(0),
        minute: Some(0),
        second: Some(0),
        millisecond: Some(0),
        timezone_offset: None,
    };

    /// Maximum representable date-time
    pub const MAX: Self = Self {
        year: 9999,
        month: Some(12),
        day: Some(31),
        hour: Some(23),
        minute: Some(59),
        second: Some(59),
        millisecond: Some(999),
        timezone_offset: None,
    };

    /// Full-precision date-time
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        year: i32,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
        millisecond: u16,
        timezone_offset: Option<i16>,
    ) -> Self {
        Self {
            year,
            month: Some(month),
            day: Some(day),
            hour: Some(hour),
            minute: Some(minute),
            second: Some(second),
            millisecond: Some(millisecond),
            timezone_offset,
        }
    }

    /// Date-time carrying only the date components
    pub fn from_date(date: CqlDate) -> Self {
        Self {
            year: date.year,
            month: date.month,
            day: date.day,
            hour: None,
            minute: None,
            second: None,
            millisecond: None,
            timezone_offset: None,
        }
    }

    /// The precision of this date-time
    pub fn precision(&self) -> DateTimePrecision {
        if self.millisecond.is_some() {
            DateTimePrecision::Millisecond
        } else if self.second.is_some() {
            DateTimePrecision::Second
        } else if self.minute.is_some() {
            DateTimePrecision::Minute
        } else if self.hour.is_some() {
            DateTimePrecision::Hour
        } else if self.day.is_some() {
            DateTimePrecision::Day
        } else if self.month.is_some() {
            DateTimePrecision::Month
        } else {
            DateTimePrecision::Year
        }
    }

    /// The date portion
    pub fn date(&self) -> CqlDate {
        CqlDate {
            year: self.year,
            month: self.month,
            day: self.day,
        }
    }

    /// The time portion, when any time component is present
    pub fn time(&self) -> Option<CqlTime> {
        self.hour.map(|hour| CqlTime {
            hour,
            minute: self.minute,
            second: self.second,
            millisecond: self.millisecond,
        })
    }

    /// Parse an ISO 8601 date-time, with or without the CQL `@` prefix
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.strip_prefix('@').unwrap_or(s);

        let (datetime_str, tz_offset) = split_timezone(s)?;
        let mut parts = datetime_str.splitn(2, 'T');
        let date_str = parts.next()?;
        let time_str = parts.next().filter(|t| !t.is_empty());

        let date = CqlDate::parse(date_str)?;
        let time = match time_str {
            Some(t) => Some(CqlTime::parse(t)?),
            None => None,
        };

        Some(Self {
            year: date.year,
            month: date.month,
            day: date.day,
            hour: time.map(|t| t.hour),
            minute: time.and_then(|t| t.minute),
            second: time.and_then(|t| t.second),
            millisecond: time.and_then(|t| t.millisecond),
            timezone_offset: tz_offset,
        })
    }

    /// Fill components down to `precision` with minimum or maximum values
    pub fn boundary(&self, precision: DateTimePrecision, high: bool) -> Self {
        let date = self.date().boundary(precision.min(DateTimePrecision::Day), high);
        let mut result = Self {
            year: date.year,
            month: date.month,
            day: date.day,
            ..*self
        };
        if precision >= DateTimePrecision::Hour && result.hour.is_none() {
            result.hour = Some(if high { 23 } else { 0 });
        }
        if precision >= DateTimePrecision::Minute && result.minute.is_none() {
            result.minute = Some(if high { 59 } else { 0 });
        }
        if precision >= DateTimePrecision::Second && result.second.is_none() {
            result.second = Some(if high { 59 } else { 0 });
        }
        if precision >= DateTimePrecision::Millisecond && result.millisecond.is_none() {
            result.millisecond = Some(if high { 999 } else { 0 });
        }
        result
    }

    /// Digit count of this date-time's precision
    pub fn precision_digits(&self) -> i64 {
        match self.precision() {
            DateTimePrecision::Year => 4,
            DateTimePrecision::Month => 6,
            DateTimePrecision::Day => 8,
            DateTimePrecision::Hour => 10,
            DateTimePrecision::Minute => 12,
            DateTimePrecision::Second => 14,
            DateTimePrecision::Millisecond => 17,
        }
    }

    /// Shift to UTC. Partial date-times without time components drop the
    /// offset unchanged; a missing offset reads as UTC.
    pub fn normalized_to_utc(&self) -> Self {
        let offset = match self.timezone_offset {
            Some(o) if o != 0 && self.hour.is_some() => o,
            _ => {
                let mut result = *self;
                result.timezone_offset = self.timezone_offset.map(|_| 0);
                return result;
            }
        };

        // Work at minute granularity from a fully low-filled value, then
        // restore the original precision
        let filled = self.boundary(DateTimePrecision::Millisecond, false);
        let date = NaiveDate::from_ymd_opt(
            filled.year,
            filled.month.unwrap() as u32,
            filled.day.unwrap() as u32,
        );
        let Some(date) = date else { return *self };
        let minutes = filled.hour.unwrap() as i64 * 60 + filled.minute.unwrap() as i64
            - offset as i64;
        let (day_shift, minutes) = (minutes.div_euclid(1440), minutes.rem_euclid(1440));
        let Some(date) = date.checked_add_signed(chrono::Duration::days(day_shift)) else {
            return *self;
        };

        let precision = self.precision();
        let mut result = Self {
            year: date.year(),
            month: Some(date.month() as u8),
            day: Some(date.day() as u8),
            hour: Some((minutes / 60) as u8),
            minute: Some((minutes % 60) as u8),
            second: filled.second,
            millisecond: filled.millisecond,
            timezone_offset: Some(0),
        };
        if precision < DateTimePrecision::Millisecond {
            result.millisecond = None;
        }
        if precision < DateTimePrecision::Second {
            result.second = None;
        }
        if precision < DateTimePrecision::Minute {
            result.minute = None;
        }
        result
    }

    /// Milliseconds since the common epoch, when fully precise (missing
    /// finer components read as zero after UTC normalization)
    pub fn epoch_millis(&self) -> Option<i64> {
        let utc = self.normalized_to_utc();
        let date = NaiveDate::from_ymd_opt(
            utc.year,
            utc.month? as u32,
            utc.day? as u32,
        )?;
        let days = date
            .signed_duration_since(NaiveDate::from_ymd_opt(1970, 1, 1)?)
            .num_days();
        let ms = utc.hour.unwrap_or(0) as i64 * 3_600_000
            + utc.minute.unwrap_or(0) as i64 * 60_000
            + utc.second.unwrap_or(0) as i64 * 1_000
            + utc.millisecond.unwrap_or(0) as i64;
        Some(days * 86_400_000 + ms)
    }

    /// Add a signed amount of a calendar unit, at this value's precision
    pub fn add(&self, amount: i64, unit: CalendarUnit) -> Option<Self> {
        let precision = self.precision();

        // Date-precision values defer to date arithmetic
        if precision <= DateTimePrecision::Day {
            let date = self.date().add(amount, unit)?;
            let mut result = Self::from_date(date);
            result.timezone_offset = self.timezone_offset;
            return Some(result);
        }

        match unit {
            CalendarUnit::Year | CalendarUnit::Month => {
                let date = CqlDate::new(self.year, self.month?, self.day?).add(amount, unit)?;
                Some(Self {
                    year: date.year,
                    month: date.month,
                    day: date.day,
                    ..*self
                })
            }
            _ => {
                let unit_ms = unit.millis()?;
                let base = self.boundary(DateTimePrecision::Millisecond, false);
                let total = base_epoch_local(&base)?.checked_add(amount.checked_mul(unit_ms)?)?;
                let shifted = from_epoch_local(total, self.timezone_offset)?;
                Some(truncate_datetime(&shifted, precision))
            }
        }
    }

    /// The next value at this value's granularity, clamped at the maximum.
    /// Full-precision values step by one millisecond.
    pub fn successor(&self) -> Self {
        let unit = precision_step_unit(self.precision());
        self.add(1, unit).unwrap_or(Self::MAX)
    }

    /// The previous value at this value's granularity, clamped at the
    /// minimum
    pub fn predecessor(&self) -> Self {
        let unit = precision_step_unit(self.precision());
        self.add(-1, unit).unwrap_or(Self::MIN)
    }

    fn components_utc(&self) -> [Option<i64>; 7] {
        let utc = self.normalized_to_utc();
        [
            Some(utc.year as i64),
            utc.month.map(i64::from),
            utc.day.map(i64::from),
            utc.hour.map(i64::from),
            utc.minute.map(i64::from),
            utc.second.map(i64::from),
            utc.millisecond.map(i64::from),
        ]
    }
}

fn precision_step_unit(precision: DateTimePrecision) -> CalendarUnit {
    match precision {
        DateTimePrecision::Year => CalendarUnit::Year,
        DateTimePrecision::Month => CalendarUnit::Month,
        DateTimePrecision::Day => CalendarUnit::Day,
        DateTimePrecision::Hour => CalendarUnit::Hour,
        DateTimePrecision::Minute => CalendarUnit::Minute,
        DateTimePrecision::Second => CalendarUnit::Second,
        DateTimePrecision::Millisecond => CalendarUnit::Millisecond,
    }
}

/// Local-time epoch millis of a fully filled date-time (offset ignored)
fn base_epoch_local(dt: &CqlDateTime) -> Option<i64> {
    let date = NaiveDate::from_ymd_opt(dt.year, dt.month? as u32, dt.day? as u32)?;
    let days = date
        .signed_duration_since(NaiveDate::from_ymd_opt(1970, 1, 1)?)
        .num_days();
    Some(
        days * 86_400_000
            + dt.hour? as i64 * 3_600_000
            + dt.minute? as i64 * 60_000
            + dt.second? as i64 * 1_000
            + dt.millisecond? as i64,
    )
}

fn from_epoch_local(millis: i64, timezone_offset: Option<i16>) -> Option<CqlDateTime> {
    let days = millis.div_euclid(86_400_000);
    let rem = millis.rem_euclid(86_400_000);
    let date = NaiveDate::from_ymd_opt(1970, 1, 1)?
        .checked_add_signed(chrono::Duration::days(days))?;
    if date.year() < 1 || date.year() > 9999 {
        return None;
    }
    Some(CqlDateTime {
        year: date.year(),
        month: Some(date.month() as u8),
        day: Some(date.day() as u8),
        hour: Some((rem / 3_600_000) as u8),
        minute: Some((rem % 3_600_000 / 60_000) as u8),
        second: Some((rem % 60_000 / 1_000) as u8),
        millisecond: Some((rem % 1_000) as u16),
        timezone_offset,
    })
}

fn truncate_datetime(dt: &CqlDateTime, precision: DateTimePrecision) -> CqlDateTime {
    let mut result = *dt;
    if precision < DateTimePrecision::Millisecond {
        result.millisecond = None;
    }
    if precision < DateTimePrecision::Second {
        result.second = None;
    }
    if precision < DateTimePrecision::Minute {
        result.minute = None;
    }
    if precision < DateTimePrecision::Hour {
        result.hour = None;
    }
    if precision < DateTimePrecision::Day {
        result.day = None;
    }
    if precision < DateTimePrecision::Month {
        result.month = None;
    }
    result
}

fn split_timezone(s: &str) -> Option<(&str, Option<i16>)> {
    if let Some(stripped) = s.strip_suffix('Z') {
        return Some((stripped, Some(0)));
    }
    // An offset sign can only follow the time portion
    if let Some(t_idx) = s.find('T') {
        let time_part = &s[t_idx + 1..];
        for (i, c) in time_part.char_indices() {
            if c == '+' || c == '-' {
                let offset_str = &time_part[i + 1..];
                let clean = offset_str.replace(':', "");
                if clean.len() < 2 {
                    return None;
                }
                let hours: i16 = clean[..2].parse().ok()?;
                let mins: i16 = if clean.len() >= 4 {
                    clean[2..4].parse().ok()?
                } else {
                    0
                };
                let offset = hours * 60 + mins;
                let offset = if c == '-' { -offset } else { offset };
                return Some((&s[..t_idx + 1 + i], Some(offset)));
            }
        }
    }
    Some((s, None))
}

impl fmt::Display for CqlDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.date())?;
        if let Some(hour) = self.hour {
            write!(f, "T{:02}", hour)?;
            if let Some(minute) = self.minute {
                write!(f, ":{:02}", minute)?;
                if let Some(second) = self.second {
                    write!(f, ":{:02}", second)?;
                    if let Some(ms) = self.millisecond {
                        write!(f, ".{:03}", ms)?;
                    }
                }
            }
            if let Some(offset) = self.timezone_offset {
                if offset == 0 {
                    write!(f, "Z")?;
                } else {
                    let sign = if offset >= 0 { '+' } else { '-' };
                    write!(f, "{}{:02}:{:02}", sign, offset.abs() / 60, offset.abs() % 60)?;
                }
            }
        }
        Ok(())
    }
}

impl PartialOrd for CqlDateTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        compare_components(&self.components_utc(), &other.components_utc())
    }
}

// ============================================================================
// Time
// ============================================================================

/// A time of day with partial precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CqlTime {
    /// Hour component (0-23, required)
    pub hour: u8,
    pub minute: Option<u8>,
    pub second: Option<u8>,
    pub millisecond: Option<u16>,
}

impl CqlTime {
    /// Minimum representable time
    pub const MIN: Self = Self {
        hour: 0,
        minute: Some(0),
        second: Some(0),
        millisecond: Some(0),
    };

    /// Maximum representable time
    pub const MAX: Self = Self {
        hour: 23,
        minute: Some(59),
        second: Some(59),
        millisecond: Some(999),
    };

    /// Full-precision time
    pub fn new(hour: u8, minute: u8, second: u8, millisecond: u16) -> Self {
        Self {
            hour,
            minute: Some(minute),
            second: Some(second),
            millisecond: Some(millisecond),
        }
    }

    /// Hour-only time
    pub fn hour_only(hour: u8) -> Self {
        Self {
            hour,
            minute: None,
            second: None,
            millisecond: None,
        }
    }

    /// The precision of this time
    pub fn precision(&self) -> DateTimePrecision {
        if self.millisecond.is_some() {
            DateTimePrecision::Millisecond
        } else if self.second.is_some() {
            DateTimePrecision::Second
        } else if self.minute.is_some() {
            DateTimePrecision::Minute
        } else {
            DateTimePrecision::Hour
        }
    }

    /// Parse an ISO 8601 time, with or without the CQL `@T` prefix
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.strip_prefix("@T").unwrap_or(s);
        let s = s.strip_prefix('T').unwrap_or(s);

        let (time_str, ms) = match s.find('.') {
            Some(dot) => {
                let frac = &s[dot + 1..];
                // Pad or trim the fraction to milliseconds
                let padded = format!("{:0<3}", frac);
                let ms: u16 = padded[..3].parse().ok()?;
                (&s[..dot], Some(ms))
            }
            None => (s, None),
        };

        let parts: Vec<&str> = time_str.split(':').collect();
        let hour: u8 = parts.first()?.parse().ok()?;
        if hour > 23 {
            return None;
        }
        let minute: Option<u8> = match parts.get(1) {
            Some(p) => {
                let m = p.parse().ok()?;
                if m > 59 {
                    return None;
                }
                Some(m)
            }
            None => None,
        };
        let second: Option<u8> = match parts.get(2) {
            Some(p) => {
                let sec = p.parse().ok()?;
                if sec > 59 {
                    return None;
                }
                Some(sec)
            }
            None => None,
        };
        if ms.is_some() && second.is_none() {
            return None;
        }

        Some(Self {
            hour,
            minute,
            second,
            millisecond: ms,
        })
    }

    /// Fill components down to `precision` with minimum or maximum values
    pub fn boundary(&self, precision: DateTimePrecision, high: bool) -> Self {
        let mut result = *self;
        if precision >= DateTimePrecision::Minute && result.minute.is_none() {
            result.minute = Some(if high { 59 } else { 0 });
        }
        if precision >= DateTimePrecision::Second && result.second.is_none() {
            result.second = Some(if high { 59 } else { 0 });
        }
        if precision >= DateTimePrecision::Millisecond && result.millisecond.is_none() {
            result.millisecond = Some(if high { 999 } else { 0 });
        }
        result
    }

    /// Digit count of this time's precision (2, 4, 6 or 9)
    pub fn precision_digits(&self) -> i64 {
        match self.precision() {
            DateTimePrecision::Hour => 2,
            DateTimePrecision::Minute => 4,
            DateTimePrecision::Second => 6,
            _ => 9,
        }
    }

    /// Total milliseconds since midnight, missing components as zero
    pub fn to_millis(&self) -> i64 {
        self.hour as i64 * 3_600_000
            + self.minute.unwrap_or(0) as i64 * 60_000
            + self.second.unwrap_or(0) as i64 * 1_000
            + self.millisecond.unwrap_or(0) as i64
    }

    /// Add a signed amount of an exact unit, wrapping around midnight
    pub fn add(&self, amount: i64, unit: CalendarUnit) -> Option<Self> {
        let unit_ms = unit.millis()?;
        let total = (self.to_millis() + amount.checked_mul(unit_ms)?).rem_euclid(86_400_000);
        let full = Self {
            hour: (total / 3_600_000) as u8,
            minute: Some((total % 3_600_000 / 60_000) as u8),
            second: Some((total % 60_000 / 1_000) as u8),
            millisecond: Some((total % 1_000) as u16),
        };
        Some(truncate_time(&full, self.precision()))
    }

    /// The next value at this time's granularity, clamped at the maximum
    pub fn successor(&self) -> Self {
        let step = precision_step_unit(self.precision());
        if self.boundary(DateTimePrecision::Millisecond, false).to_millis()
            + step.millis().unwrap_or(1)
            > 86_399_999
        {
            return Self::MAX;
        }
        self.add(1, step).unwrap_or(Self::MAX)
    }

    /// The previous value at this time's granularity, clamped at the
    /// minimum
    pub fn predecessor(&self) -> Self {
        let step = precision_step_unit(self.precision());
        if self.boundary(DateTimePrecision::Millisecond, false).to_millis()
            < step.millis().unwrap_or(1)
        {
            return Self::MIN;
        }
        self.add(-1, step).unwrap_or(Self::MIN)
    }

    fn components(&self) -> [Option<i64>; 4] {
        [
            Some(self.hour as i64),
            self.minute.map(i64::from),
            self.second.map(i64::from),
            self.millisecond.map(i64::from),
        ]
    }
}

fn truncate_time(t: &CqlTime, precision: DateTimePrecision) -> CqlTime {
    let mut result = *t;
    if precision < DateTimePrecision::Millisecond {
        result.millisecond = None;
    }
    if precision < DateTimePrecision::Second {
        result.second = None;
    }
    if precision < DateTimePrecision::Minute {
        result.minute = None;
    }
    result
}

impl fmt::Display for CqlTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.hour)?;
        if let Some(minute) = self.minute {
            write!(f, ":{:02}", minute)?;
            if let Some(second) = self.second {
                write!(f, ":{:02}", second)?;
                if let Some(ms) = self.millisecond {
                    write!(f, ".{:03}", ms)?;
                }
            }
        }
        Ok(())
    }
}

impl PartialOrd for CqlTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        compare_components(&self.components(), &other.components())
    }
}

// ============================================================================
// Shared comparison and duration machinery
// ============================================================================

/// Compare component vectors from coarsest to finest.
///
/// Differing values decide; a missing-vs-present pair below the decided
/// prefix yields `None` (unknown), per the partial-precision contract.
fn compare_components(a: &[Option<i64>], b: &[Option<i64>]) -> Option<Ordering> {
    for (left, right) in a.iter().zip(b.iter()) {
        match (left, right) {
            (Some(l), Some(r)) => match l.cmp(r) {
                Ordering::Equal => continue,
                other => return Some(other),
            },
            (None, None) => return Some(Ordering::Equal),
            _ => return None,
        }
    }
    Some(Ordering::Equal)
}

/// Whole completed calendar units between two dates; `None` when the
/// operands lack the precision the unit requires
pub fn duration_between_dates(a: &CqlDate, b: &CqlDate, unit: CalendarUnit) -> Option<i64> {
    match unit {
        CalendarUnit::Year => {
            let base = b.year as i64 - a.year as i64;
            adjust_completed(base, &a.components()[1..], &b.components()[1..])
        }
        CalendarUnit::Month => {
            let (am, bm) = (a.month?, b.month?);
            let base =
                (b.year as i64 * 12 + bm as i64) - (a.year as i64 * 12 + am as i64);
            adjust_completed(base, &a.components()[2..], &b.components()[2..])
        }
        CalendarUnit::Week => duration_between_dates(a, b, CalendarUnit::Day).map(|d| d / 7),
        CalendarUnit::Day => {
            let days = b
                .to_naive_date()?
                .signed_duration_since(a.to_naive_date()?)
                .num_days();
            Some(days)
        }
        // Sub-day durations between bare dates read the dates as midnight
        _ => {
            let ms =
                duration_between_dates(a, b, CalendarUnit::Day)?.checked_mul(86_400_000)?;
            Some(ms / unit.millis()?)
        }
    }
}

/// Whole completed units between two date-times
pub fn duration_between_datetimes(
    a: &CqlDateTime,
    b: &CqlDateTime,
    unit: CalendarUnit,
) -> Option<i64> {
    let ua = a.normalized_to_utc();
    let ub = b.normalized_to_utc();
    match unit {
        CalendarUnit::Year => {
            let base = ub.year as i64 - ua.year as i64;
            adjust_completed(base, &ua.components_utc()[1..], &ub.components_utc()[1..])
        }
        CalendarUnit::Month => {
            let (am, bm) = (ua.month?, ub.month?);
            let base =
                (ub.year as i64 * 12 + bm as i64) - (ua.year as i64 * 12 + am as i64);
            adjust_completed(base, &ua.components_utc()[2..], &ub.components_utc()[2..])
        }
        CalendarUnit::Week => {
            duration_between_datetimes(a, b, CalendarUnit::Day).map(|d| d / 7)
        }
        _ => {
            let required = unit.precision();
            if ua.precision() < required || ub.precision() < required {
                return None;
            }
            let ms = ub.epoch_millis()?.checked_sub(ua.epoch_millis()?)?;
            Some(ms / unit.millis()?)
        }
    }
}

/// Whole completed units between two times
pub fn duration_between_times(a: &CqlTime, b: &CqlTime, unit: CalendarUnit) -> Option<i64> {
    let required = unit.precision();
    if required < DateTimePrecision::Hour {
        return None;
    }
    if a.precision() < required || b.precision() < required {
        return None;
    }
    let ms = b.to_millis() - a.to_millis();
    Some(ms / unit.millis()?)
}

/// Completed-unit adjustment: subtract one when the finer components of the
/// end fall before those of the start (mirrored for negative spans).
/// Mismatched finer precision makes the result unknown.
fn adjust_completed(base: i64, finer_a: &[Option<i64>], finer_b: &[Option<i64>]) -> Option<i64> {
    match compare_components(finer_b, finer_a) {
        Some(Ordering::Less) if base > 0 => Some(base - 1),
        Some(Ordering::Greater) if base < 0 => Some(base + 1),
        Some(_) => Some(base),
        None => None,
    }
}

/// Boundary-count difference between two dates: both operands truncate to
/// the target precision with low fills, then boundaries are counted
pub fn difference_between_dates(a: &CqlDate, b: &CqlDate, unit: CalendarUnit) -> Option<i64> {
    match unit {
        CalendarUnit::Year => Some(b.year as i64 - a.year as i64),
        CalendarUnit::Month => Some(
            (b.year as i64 * 12 + b.month.unwrap_or(1) as i64)
                - (a.year as i64 * 12 + a.month.unwrap_or(1) as i64),
        ),
        CalendarUnit::Week => difference_between_dates(a, b, CalendarUnit::Day).map(|d| d / 7),
        _ => {
            let la = a.boundary(DateTimePrecision::Day, false).to_naive_date()?;
            let lb = b.boundary(DateTimePrecision::Day, false).to_naive_date()?;
            let days = lb.signed_duration_since(la).num_days();
            match unit {
                CalendarUnit::Day => Some(days),
                _ => Some(days.checked_mul(86_400_000)? / unit.millis()?),
            }
        }
    }
}

/// Boundary-count difference between two date-times
pub fn difference_between_datetimes(
    a: &CqlDateTime,
    b: &CqlDateTime,
    unit: CalendarUnit,
) -> Option<i64> {
    let ua = a.normalized_to_utc();
    let ub = b.normalized_to_utc();
    match unit {
        CalendarUnit::Year => Some(ub.year as i64 - ua.year as i64),
        CalendarUnit::Month => Some(
            (ub.year as i64 * 12 + ub.month.unwrap_or(1) as i64)
                - (ua.year as i64 * 12 + ua.month.unwrap_or(1) as i64),
        ),
        CalendarUnit::Week => {
            difference_between_datetimes(a, b, CalendarUnit::Day).map(|d| d / 7)
        }
        _ => {
            let unit_ms = unit.millis()?;
            let precision = unit.precision();
            let la = ua.boundary(DateTimePrecision::Millisecond, false);
            let lb = ub.boundary(DateTimePrecision::Millisecond, false);
            let la = truncate_to_unit(la.epoch_millis()?, precision);
            let lb = truncate_to_unit(lb.epoch_millis()?, precision);
            Some((lb - la) / unit_ms)
        }
    }
}

/// Boundary-count difference between two times
pub fn difference_between_times(a: &CqlTime, b: &CqlTime, unit: CalendarUnit) -> Option<i64> {
    let precision = unit.precision();
    if precision < DateTimePrecision::Hour {
        return None;
    }
    let la = truncate_to_unit(a.to_millis(), precision);
    let lb = truncate_to_unit(b.to_millis(), precision);
    Some((lb - la) / unit.millis()?)
}

fn truncate_to_unit(millis: i64, precision: DateTimePrecision) -> i64 {
    let unit_ms = match precision {
        DateTimePrecision::Hour => 3_600_000,
        DateTimePrecision::Minute => 60_000,
        DateTimePrecision::Second => 1_000,
        _ => 1,
    };
    millis.div_euclid(unit_ms) * unit_ms
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_date_parse_and_display() {
        assert_eq!(CqlDate::parse("@2020-06").unwrap(), CqlDate::year_month(2020, 6));
        assert_eq!(CqlDate::parse("2024-01-15").unwrap().to_string(), "2024-01-15");
        assert_eq!(CqlDate::parse("2024").unwrap().to_string(), "2024");
        assert!(CqlDate::parse("2024-02-30").is_none());
    }

    #[test]
    fn test_date_partial_comparison() {
        let year_only = CqlDate::year_only(2020);
        let with_month = CqlDate::year_month(2020, 6);
        // Same year, differing precision below it: unknown
        assert_eq!(year_only.partial_cmp(&with_month), None);
        // Decided at the year component regardless of finer precision
        assert_eq!(
            CqlDate::year_only(2019).partial_cmp(&with_month),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn test_calendar_month_addition_clamps() {
        let jan31 = CqlDate::new(2024, 1, 31);
        assert_eq!(jan31.add(1, CalendarUnit::Month).unwrap(), CqlDate::new(2024, 2, 29));
        assert_eq!(jan31.add(3, CalendarUnit::Month).unwrap(), CqlDate::new(2024, 4, 30));
    }

    #[test]
    fn test_leap_day_year_addition() {
        let leap = CqlDate::new(2020, 2, 29);
        assert_eq!(leap.add(1, CalendarUnit::Year).unwrap(), CqlDate::new(2021, 2, 28));
        assert_eq!(leap.add(4, CalendarUnit::Year).unwrap(), CqlDate::new(2024, 2, 29));
    }

    #[test]
    fn test_partial_date_addition_keeps_precision() {
        let ym = CqlDate::year_month(2020, 6);
        assert_eq!(ym.add(1, CalendarUnit::Year).unwrap(), CqlDate::year_month(2021, 6));
        assert_eq!(ym.add(8, CalendarUnit::Month).unwrap(), CqlDate::year_month(2021, 2));
    }

    #[test]
    fn test_duration_between_completed_years() {
        let a = CqlDate::new(2000, 1, 15);
        assert_eq!(
            duration_between_dates(&a, &CqlDate::new(2001, 1, 14), CalendarUnit::Year),
            Some(0)
        );
        assert_eq!(
            duration_between_dates(&a, &CqlDate::new(2001, 1, 15), CalendarUnit::Year),
            Some(1)
        );
    }

    #[test]
    fn test_duration_days_and_weeks() {
        let a = CqlDate::new(2024, 1, 1);
        let b = CqlDate::new(2024, 1, 16);
        assert_eq!(duration_between_dates(&a, &b, CalendarUnit::Day), Some(15));
        assert_eq!(duration_between_dates(&a, &b, CalendarUnit::Week), Some(2));
    }

    #[test]
    fn test_duration_insufficient_precision() {
        let a = CqlDate::year_only(2020);
        let b = CqlDate::new(2024, 1, 1);
        assert_eq!(duration_between_dates(&a, &b, CalendarUnit::Month), None);
        assert_eq!(duration_between_dates(&a, &b, CalendarUnit::Day), None);
    }

    #[test]
    fn test_difference_vs_duration() {
        // 2023-12-31 to 2024-01-01: zero completed years, one boundary
        let a = CqlDate::new(2023, 12, 31);
        let b = CqlDate::new(2024, 1, 1);
        assert_eq!(duration_between_dates(&a, &b, CalendarUnit::Year), Some(0));
        assert_eq!(difference_between_dates(&a, &b, CalendarUnit::Year), Some(1));
    }

    #[test]
    fn test_date_successor_predecessor() {
        assert_eq!(CqlDate::new(2024, 12, 31).successor(), CqlDate::new(2025, 1, 1));
        assert_eq!(CqlDate::year_month(2024, 12).successor(), CqlDate::year_month(2025, 1));
        assert_eq!(CqlDate::year_only(2024).predecessor(), CqlDate::year_only(2023));
        // Clamped at the boundary
        assert_eq!(CqlDate::MAX.successor(), CqlDate::MAX);
    }

    #[test]
    fn test_successor_predecessor_roundtrip() {
        let d = CqlDate::new(2024, 3, 1);
        assert_eq!(d.predecessor().successor(), d);
        let dt = CqlDateTime::new(2024, 3, 1, 10, 30, 0, 0, None);
        assert_eq!(dt.predecessor().successor(), dt);
    }

    #[test]
    fn test_date_boundaries() {
        let ym = CqlDate::year_month(2024, 2);
        assert_eq!(ym.boundary(DateTimePrecision::Day, false), CqlDate::new(2024, 2, 1));
        assert_eq!(ym.boundary(DateTimePrecision::Day, true), CqlDate::new(2024, 2, 29));
    }

    #[test]
    fn test_datetime_parse_with_timezone() {
        let dt = CqlDateTime::parse("@2024-01-15T14:30:00.000Z").unwrap();
        assert_eq!(dt.timezone_offset, Some(0));
        assert_eq!(dt.hour, Some(14));

        let dt = CqlDateTime::parse("2024-01-15T14:30-05:00").unwrap();
        assert_eq!(dt.timezone_offset, Some(-300));
    }

    #[test]
    fn test_datetime_utc_normalization_in_comparison() {
        // 14:30-05:00 == 19:30Z
        let a = CqlDateTime::parse("2024-01-15T14:30-05:00").unwrap();
        let b = CqlDateTime::parse("2024-01-15T19:30Z").unwrap();
        assert_eq!(a.partial_cmp(&b), Some(Ordering::Equal));
    }

    #[test]
    fn test_datetime_cross_precision_comparison_unknown() {
        let a = CqlDateTime::parse("2024-01-15T14").unwrap();
        let b = CqlDateTime::parse("2024-01-15T14:30").unwrap();
        assert_eq!(a.partial_cmp(&b), None);
    }

    #[test]
    fn test_datetime_add_hours_rolls_days() {
        let dt = CqlDateTime::new(2024, 1, 15, 23, 0, 0, 0, None);
        let shifted = dt.add(2, CalendarUnit::Hour).unwrap();
        assert_eq!(shifted.day, Some(16));
        assert_eq!(shifted.hour, Some(1));
    }

    #[test]
    fn test_datetime_duration_hours() {
        let a = CqlDateTime::new(2024, 1, 15, 10, 0, 0, 0, None);
        let b = CqlDateTime::new(2024, 1, 15, 13, 30, 0, 0, None);
        assert_eq!(duration_between_datetimes(&a, &b, CalendarUnit::Hour), Some(3));
        assert_eq!(duration_between_datetimes(&a, &b, CalendarUnit::Minute), Some(210));
    }

    #[test]
    fn test_time_parse_and_ordering() {
        let t1 = CqlTime::parse("@T10:30").unwrap();
        let t2 = CqlTime::parse("14:00:05.250").unwrap();
        assert_eq!(t1.partial_cmp(&t2), Some(Ordering::Less));
        assert!(CqlTime::parse("25:00").is_none());
    }

    #[test]
    fn test_time_add_wraps_midnight() {
        let t = CqlTime::new(23, 30, 0, 0);
        let shifted = t.add(1, CalendarUnit::Hour).unwrap();
        assert_eq!(shifted.hour, 0);
        assert_eq!(shifted.minute, Some(30));
    }

    #[test]
    fn test_unit_aliases() {
        assert_eq!(CalendarUnit::parse("years"), Some(CalendarUnit::Year));
        assert_eq!(CalendarUnit::parse("a"), Some(CalendarUnit::Year));
        assert_eq!(CalendarUnit::parse("mo"), Some(CalendarUnit::Month));
        assert_eq!(CalendarUnit::parse("wk"), Some(CalendarUnit::Week));
        assert_eq!(CalendarUnit::parse("ms"), Some(CalendarUnit::Millisecond));
        assert_eq!(CalendarUnit::parse("furlong"), None);
    }
}
