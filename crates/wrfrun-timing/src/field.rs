//! The six calendar fields a timing pipeline operates on.

use std::fmt;
use std::str::FromStr;

use crate::error::TimingError;

/// A calendar field, ordered from largest to smallest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimingField {
    /// Calendar year.
    Year,
    /// Month of the year (1-12).
    Month,
    /// Day of the month (1-31).
    Day,
    /// Hour of the day (0-23).
    Hour,
    /// Minute of the hour (0-59).
    Minute,
    /// Second of the minute (0-59).
    Second,
}

impl TimingField {
    /// Every field, largest first. Offsets are applied in this order.
    pub const ALL: [Self; 6] = [
        Self::Year,
        Self::Month,
        Self::Day,
        Self::Hour,
        Self::Minute,
        Self::Second,
    ];

    /// Parameter key used for per-field values (`"hours"`, ...).
    pub const fn key(self) -> &'static str {
        match self {
            Self::Year => "years",
            Self::Month => "months",
            Self::Day => "days",
            Self::Hour => "hours",
            Self::Minute => "minutes",
            Self::Second => "seconds",
        }
    }

    /// Singular name (`"hour"`, ...).
    pub const fn singular(self) -> &'static str {
        match self {
            Self::Year => "year",
            Self::Month => "month",
            Self::Day => "day",
            Self::Hour => "hour",
            Self::Minute => "minute",
            Self::Second => "second",
        }
    }

    /// Lowest legal value of the field: 1 for month and day, 0 otherwise.
    pub const fn origin(self) -> i64 {
        match self {
            Self::Month | Self::Day => 1,
            Self::Year | Self::Hour | Self::Minute | Self::Second => 0,
        }
    }

    /// Whether `self` is a smaller unit than `other`.
    pub fn is_finer_than(self, other: Self) -> bool {
        self > other
    }

    /// Look up a field by singular or plural name, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        let lowered = name.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|field| field.singular() == lowered || field.key() == lowered)
    }
}

impl fmt::Display for TimingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.singular())
    }
}

impl FromStr for TimingField {
    type Err = TimingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| TimingError::UnknownField { name: s.to_owned() })
    }
}
