//! Locations inside a document tree.
//!
//! A location is written as dot-separated object keys, where a `[*]` suffix
//! fans out over every element of the array found at that key:
//!
//! ```text
//! Extra.Databases[*].Tablespaces[*].Name
//! ```
//!
//! `[*]` may also open a location when the document root is an array. A
//! location always ends with a key, which names the field rewritten in place.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const EACH: &str = "[*]";

/// One step of a location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Descend into an object field.
    Key(String),
    /// Apply the remaining steps to every element of an array.
    Each,
}

/// Why a location string failed to parse.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid path '{path}': {reason}")]
pub struct ParseLocationError {
    pub path: String,
    pub reason: String,
}

impl From<ParseLocationError> for hostanon_common::Error {
    fn from(e: ParseLocationError) -> Self {
        hostanon_common::Error::PathSyntax {
            path: e.path,
            reason: e.reason,
        }
    }
}

/// A parsed location. Invariant: non-empty and ending with [`Step::Key`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    steps: Vec<Step>,
}

impl Location {
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Steps leading to the object that holds the leaf field.
    pub fn parent(&self) -> &[Step] {
        &self.steps[..self.steps.len() - 1]
    }

    /// Name of the field rewritten at each resolved site.
    pub fn leaf(&self) -> &str {
        match self.steps.last() {
            Some(Step::Key(key)) => key,
            _ => unreachable!("location always ends with a key"),
        }
    }
}

impl FromStr for Location {
    type Err = ParseLocationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fail = |reason: &str| ParseLocationError {
            path: s.to_string(),
            reason: reason.to_string(),
        };

        if s.is_empty() {
            return Err(fail("empty path"));
        }

        let mut steps = Vec::new();
        for (n, segment) in s.split('.').enumerate() {
            let key_end = segment.find('[').unwrap_or(segment.len());
            let (key, mut rest) = segment.split_at(key_end);

            if key.is_empty() {
                // Only the very first segment may be a bare `[*]` (array root).
                if n > 0 || rest.is_empty() {
                    return Err(fail("empty key"));
                }
            } else {
                steps.push(Step::Key(key.to_string()));
            }

            while !rest.is_empty() {
                rest = rest
                    .strip_prefix(EACH)
                    .ok_or_else(|| fail("only [*] is supported inside brackets"))?;
                steps.push(Step::Each);
            }
        }

        if !matches!(steps.last(), Some(Step::Key(_))) {
            return Err(fail("path must end with a key"));
        }

        Ok(Location { steps })
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            match step {
                Step::Key(key) => {
                    if i > 0 {
                        f.write_str(".")?;
                    }
                    f.write_str(key)?;
                }
                Step::Each => f.write_str(EACH)?,
            }
        }
        Ok(())
    }
}

impl Serialize for Location {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Location {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
