//! Four-slot numeric versions (`major.minor.build.revision`).
//!
//! Slots not supplied in the text hold [`ABSENT`], which sorts below every
//! real component, so `1.2 < 1.2.0 < 1.2.0.0`.

use crate::error::{PatchError, Result};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Sentinel stored in trailing slots that were not present in the text.
pub const ABSENT: i64 = -1;

/// Maximum number of dot-separated components.
pub const MAX_COMPONENTS: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Version {
    slots: [i64; MAX_COMPONENTS],
}

impl Version {
    /// Parse `1` to `4` dot-separated non-negative integers.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Err(PatchError::format("empty version"));
        }

        let mut slots = [ABSENT; MAX_COMPONENTS];
        for (i, field) in text.split('.').enumerate() {
            if i >= MAX_COMPONENTS {
                return Err(PatchError::format(format!(
                    "version '{}' has more than {} components",
                    text, MAX_COMPONENTS
                )));
            }
            // Digits only: no sign, no inner whitespace.
            if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
                return Err(PatchError::format(format!("invalid version '{}'", text)));
            }
            let value: i32 = field
                .parse()
                .map_err(|_| PatchError::format(format!("version component out of range in '{}'", text)))?;
            slots[i] = i64::from(value);
        }
        Ok(Version { slots })
    }

    pub fn major(&self) -> Option<u32> {
        self.slot(0)
    }

    pub fn minor(&self) -> Option<u32> {
        self.slot(1)
    }

    pub fn build(&self) -> Option<u32> {
        self.slot(2)
    }

    pub fn revision(&self) -> Option<u32> {
        self.slot(3)
    }

    fn slot(&self, i: usize) -> Option<u32> {
        u32::try_from(self.slots[i]).ok()
    }

    /// Number of components supplied when parsed.
    pub fn components(&self) -> usize {
        self.slots.iter().take_while(|&&s| s != ABSENT).count()
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.slots.iter().zip(other.slots.iter()) {
            match a.cmp(b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for Version {
    type Err = PatchError;

    fn from_str(s: &str) -> Result<Self> {
        Version::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for slot in self.slots.iter().take_while(|&&s| s != ABSENT) {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{}", slot)?;
            first = false;
        }
        Ok(())
    }
}
