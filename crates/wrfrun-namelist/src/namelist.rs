//! [`Namelist`] and [`NamelistGroup`]: ordered groups of keyed value lists.
//!
//! Group and key names are case-insensitive in Fortran; both are stored
//! lower-cased. Groups and keys keep the order they were read or inserted in,
//! so a rewritten file diffs cleanly against its source.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;

use crate::error::NamelistError;
use crate::parse;
use crate::value::NamelistValue;

/// One `&name ... /` block: keys mapped to their value lists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamelistGroup {
    entries: IndexMap<String, Vec<NamelistValue>>,
}

impl NamelistGroup {
    /// Create an empty group.
    pub fn new() -> Self {
        Self::default()
    }

    /// Values for `key`.
    pub fn get(&self, key: &str) -> Option<&[NamelistValue]> {
        self.entries
            .get(key.to_ascii_lowercase().as_str())
            .map(Vec::as_slice)
    }

    /// First value for `key`, if it is an integer.
    pub fn first_integer(&self, key: &str) -> Option<i64> {
        self.get(key)?.first()?.as_i64()
    }

    /// Replace the values for `key`, keeping its position if it exists.
    pub fn set(&mut self, key: &str, values: Vec<NamelistValue>) -> Option<Vec<NamelistValue>> {
        self.entries.insert(key.to_ascii_lowercase(), values)
    }

    /// Remove `key`, preserving the order of the remaining entries.
    pub fn remove(&mut self, key: &str) -> Option<Vec<NamelistValue>> {
        self.entries.shift_remove(key.to_ascii_lowercase().as_str())
    }

    /// Whether `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key.to_ascii_lowercase().as_str())
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the group has no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[NamelistValue])> {
        self.entries
            .iter()
            .map(|(key, values)| (key.as_str(), values.as_slice()))
    }
}

/// A parsed namelist file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Namelist {
    groups: IndexMap<String, NamelistGroup>,
}

impl Namelist {
    /// Create an empty namelist.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse namelist text.
    ///
    /// # Errors
    ///
    /// Returns [`NamelistError::Parse`] with the offending line.
    pub fn parse(text: &str) -> Result<Self, NamelistError> {
        parse::parse(text)
    }

    /// Look up a group.
    pub fn group(&self, name: &str) -> Option<&NamelistGroup> {
        self.groups.get(name.to_ascii_lowercase().as_str())
    }

    /// Look up a group for modification.
    pub fn group_mut(&mut self, name: &str) -> Option<&mut NamelistGroup> {
        self.groups.get_mut(name.to_ascii_lowercase().as_str())
    }

    /// The named group, appended empty if missing.
    pub fn group_or_insert(&mut self, name: &str) -> &mut NamelistGroup {
        self.groups.entry(name.to_ascii_lowercase()).or_default()
    }

    /// Add or replace a whole group.
    pub fn insert_group(&mut self, name: &str, group: NamelistGroup) -> Option<NamelistGroup> {
        self.groups.insert(name.to_ascii_lowercase(), group)
    }

    /// Values for `key` in `group`.
    pub fn get(&self, group: &str, key: &str) -> Option<&[NamelistValue]> {
        self.group(group)?.get(key)
    }

    /// First value for `key` in `group`, if it is an integer.
    pub fn first_integer(&self, group: &str, key: &str) -> Option<i64> {
        self.group(group)?.first_integer(key)
    }

    /// Set `key` in `group`, creating the group if needed.
    pub fn set(&mut self, group: &str, key: &str, values: Vec<NamelistValue>) {
        self.group_or_insert(group).set(key, values);
    }

    /// Number of groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether there are no groups.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Groups in order.
    pub fn groups(&self) -> impl Iterator<Item = (&str, &NamelistGroup)> {
        self.groups.iter().map(|(name, group)| (name.as_str(), group))
    }
}

impl FromStr for Namelist {
    type Err = NamelistError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Namelist {
    /// Writes the namelist in the layout WRF ships its own files in: one
    /// `key = v1, v2,` line per entry, keys padded to a common width.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, group) in self.groups() {
            writeln!(f, "&{name}")?;
            let width = group.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
            for (key, values) in group.iter() {
                write!(f, " {key:<width$} =")?;
                for value in values {
                    write!(f, " {value},")?;
                }
                if values.is_empty() {
                    f.write_str(" ,")?;
                }
                writeln!(f)?;
            }
            writeln!(f, "/")?;
            writeln!(f)?;
        }
        Ok(())
    }
}
