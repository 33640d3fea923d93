//! [`CalendarTime`]: a timestamp whose fields may be out of range.
//!
//! Wrap-mode offsets produce ordinary normalised timestamps, but clamp-mode
//! offsets add to each field without carrying (23:00 + 3 hours is hour 26 of
//! the same day). `CalendarTime` stores the six fields raw so that both
//! results are representable, and normalises leniently on demand.
//!
//! All arithmetic is checked; leaving chrono's representable range is an
//! error, never a panic.

use std::fmt;

use chrono::{Datelike, Months, NaiveDate, NaiveDateTime, TimeDelta, Timelike};

use crate::error::TimingError;
use crate::field::TimingField;

/// Accepted timestamp layouts, tried in order.
const TIMESTAMP_FORMATS: [&str; 3] = ["%Y-%m-%d_%H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// Six raw calendar fields: year, month (1-based), day (1-based), hour,
/// minute, second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CalendarTime {
    /// Calendar year.
    year: i64,
    /// Month, 1-based when normalised.
    month: i64,
    /// Day of month, 1-based when normalised.
    day: i64,
    /// Hour of day.
    hour: i64,
    /// Minute of hour.
    minute: i64,
    /// Second of minute.
    second: i64,
}

impl CalendarTime {
    /// Build a timestamp from raw fields. No validation is performed.
    pub const fn new(year: i64, month: i64, day: i64, hour: i64, minute: i64, second: i64) -> Self {
        Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
        }
    }

    /// Build a timestamp from a normalised chrono value.
    pub fn from_datetime(value: NaiveDateTime) -> Self {
        Self {
            year: i64::from(value.year()),
            month: i64::from(value.month()),
            day: i64::from(value.day()),
            hour: i64::from(value.hour()),
            minute: i64::from(value.minute()),
            second: i64::from(value.second()),
        }
    }

    /// Parse `YYYY-MM-DD_HH:MM:SS` (a `T` or a space may replace the `_`).
    ///
    /// # Errors
    ///
    /// Returns [`TimingError::InvalidTimestamp`] if no layout matches.
    pub fn parse(text: &str) -> Result<Self, TimingError> {
        let trimmed = text.trim();
        TIMESTAMP_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
            .map(Self::from_datetime)
            .ok_or_else(|| TimingError::InvalidTimestamp {
                text: text.to_owned(),
            })
    }

    /// Read one field.
    pub const fn get(&self, field: TimingField) -> i64 {
        match field {
            TimingField::Year => self.year,
            TimingField::Month => self.month,
            TimingField::Day => self.day,
            TimingField::Hour => self.hour,
            TimingField::Minute => self.minute,
            TimingField::Second => self.second,
        }
    }

    /// Return a copy with one field replaced. The result is not normalised.
    #[must_use]
    pub const fn with(mut self, field: TimingField, value: i64) -> Self {
        match field {
            TimingField::Year => self.year = value,
            TimingField::Month => self.month = value,
            TimingField::Day => self.day = value,
            TimingField::Hour => self.hour = value,
            TimingField::Minute => self.minute = value,
            TimingField::Second => self.second = value,
        }
        self
    }

    /// Normalise leniently into a chrono value, carrying every out-of-range
    /// field into the next larger one (month 13 is January of the next year,
    /// hour 26 is 02:00 of the next day, day 0 is the last day of the
    /// previous month).
    ///
    /// # Errors
    ///
    /// Returns [`TimingError::OutOfRange`] if the result is not
    /// representable.
    pub fn to_datetime(&self) -> Result<NaiveDateTime, TimingError> {
        let overflow = || TimingError::out_of_range(format!("cannot normalise {self}"));

        let total_months = self
            .year
            .checked_mul(12)
            .and_then(|months| months.checked_add(self.month.checked_sub(1)?))
            .ok_or_else(overflow)?;
        let year = total_months
            .checked_div_euclid(12)
            .and_then(|year| i32::try_from(year).ok())
            .ok_or_else(overflow)?;
        let month = total_months
            .checked_rem_euclid(12)
            .and_then(|month| month.checked_add(1))
            .and_then(|month| u32::try_from(month).ok())
            .ok_or_else(overflow)?;

        let month_start = NaiveDate::from_ymd_opt(year, month, 1)
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .ok_or_else(overflow)?;

        let elapsed = self
            .day
            .checked_sub(1)
            .and_then(TimeDelta::try_days)
            .and_then(|delta| delta.checked_add(&TimeDelta::try_hours(self.hour)?))
            .and_then(|delta| delta.checked_add(&TimeDelta::try_minutes(self.minute)?))
            .and_then(|delta| delta.checked_add(&TimeDelta::try_seconds(self.second)?))
            .ok_or_else(overflow)?;

        month_start.checked_add_signed(elapsed).ok_or_else(overflow)
    }

    /// Return the normalised equivalent of this timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`TimingError::OutOfRange`] if the result is not
    /// representable.
    pub fn normalized(&self) -> Result<Self, TimingError> {
        self.to_datetime().map(Self::from_datetime)
    }

    /// Whether every field is already within its normal range.
    pub fn is_normalized(&self) -> bool {
        self.normalized().is_ok_and(|normal| normal == *self)
    }

    /// Add `amount` units of `field` with calendar rollover.
    ///
    /// The timestamp is normalised first. Adding years or months keeps the
    /// day of month where possible and pins it to the last day of a shorter
    /// target month (Jan 31 + 1 month = Feb 28/29). Smaller fields are exact
    /// durations.
    ///
    /// # Errors
    ///
    /// Returns [`TimingError::OutOfRange`] on overflow.
    pub fn add_wrapping(&self, field: TimingField, amount: i64) -> Result<Self, TimingError> {
        let base = self.to_datetime()?;
        let overflow = || TimingError::out_of_range(format!("{self} + {amount} {}", field.key()));
        let shifted = match field {
            TimingField::Year => amount
                .checked_mul(12)
                .and_then(|months| add_months(base, months)),
            TimingField::Month => add_months(base, amount),
            TimingField::Day => TimeDelta::try_days(amount).and_then(|delta| base.checked_add_signed(delta)),
            TimingField::Hour => TimeDelta::try_hours(amount).and_then(|delta| base.checked_add_signed(delta)),
            TimingField::Minute => {
                TimeDelta::try_minutes(amount).and_then(|delta| base.checked_add_signed(delta))
            }
            TimingField::Second => {
                TimeDelta::try_seconds(amount).and_then(|delta| base.checked_add_signed(delta))
            }
        };
        shifted.map(Self::from_datetime).ok_or_else(overflow)
    }

    /// Add `amount` to `field` without carrying into larger fields.
    ///
    /// The result may be out of range (hour 26, minute -15); no other field
    /// changes.
    ///
    /// # Errors
    ///
    /// Returns [`TimingError::OutOfRange`] if the field itself overflows
    /// `i64`.
    pub fn add_clamped(&self, field: TimingField, amount: i64) -> Result<Self, TimingError> {
        self.get(field)
            .checked_add(amount)
            .map(|value| self.with(field, value))
            .ok_or_else(|| TimingError::out_of_range(format!("{self} + {amount} {} (clamped)", field.key())))
    }
}

/// Add a signed number of months, pinning the day to the end of the month.
fn add_months(base: NaiveDateTime, months: i64) -> Option<NaiveDateTime> {
    let magnitude = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
    if months >= 0 {
        base.checked_add_months(magnitude)
    } else {
        base.checked_sub_months(magnitude)
    }
}

impl fmt::Display for CalendarTime {
    /// Formats as `YYYY-MM-DD_HH:MM:SS`, the layout WRF namelists use.
    /// Out-of-range fields are printed as they are.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}_{:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

impl From<NaiveDateTime> for CalendarTime {
    fn from(value: NaiveDateTime) -> Self {
        Self::from_datetime(value)
    }
}
