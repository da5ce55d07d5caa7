//! Listing identifiers and the configured scan range.
//!
//! An identifier is a token of the form `1-3000001`: a fixed prefix plus the
//! listing's ordinal number. Only odd numbers are valid members of a range,
//! which always uses step 2.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Fixed identifier prefix used by the target site.
pub const ID_PREFIX: &str = "1";

/// One fetchable listing identifier, ordered by its embedded number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ListingId(u64);

impl ListingId {
    pub fn from_number(n: u64) -> Self {
        Self(n)
    }

    pub fn number(&self) -> u64 {
        self.0
    }

    /// Parse a user-supplied identifier.
    ///
    /// Accepts `1-2890001`, with or without a trailing slash, and full URL
    /// forms like `https://www.aruodas.lt/1-2890001/`.
    pub fn normalize(raw: &str) -> Result<Self, Error> {
        let mut s = raw.trim();
        if s.is_empty() {
            return Err(Error::InvalidId("missing id".to_string()));
        }
        if let Some(rest) = s.split_once("://").map(|(_, rest)| rest) {
            s = rest;
        }
        let s = s.trim_matches('/');
        let last = s.rsplit('/').next().unwrap_or(s);

        let (prefix, digits) = last
            .split_once('-')
            .ok_or_else(|| Error::InvalidId(format!("bad id format: {raw:?} (expected e.g. 1-2890001)")))?;
        if prefix != ID_PREFIX || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidId(format!("bad id format: {raw:?} (expected e.g. 1-2890001)")));
        }
        let n: u64 = digits
            .parse()
            .map_err(|_| Error::InvalidId(format!("id number out of range: {raw:?}")))?;
        Ok(Self(n))
    }
}

impl fmt::Display for ListingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", ID_PREFIX, self.0)
    }
}

impl TryFrom<String> for ListingId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Error> {
        Self::normalize(&value)
    }
}

impl From<ListingId> for String {
    fn from(id: ListingId) -> Self {
        id.to_string()
    }
}

/// Parse a range boundary given as a raw number, a digit string, or an
/// identifier-shaped string.
pub fn parse_range_value(value: &serde_json::Value) -> Result<u64, Error> {
    match value {
        serde_json::Value::Number(n) => {
            if let Some(v) = n.as_u64() {
                return Ok(v);
            }
            if let Some(f) = n.as_f64()
                && f >= 0.0
                && f.fract() == 0.0
            {
                return Ok(f as u64);
            }
            Err(Error::InvalidRange(format!("bad start/end value: {n}")))
        }
        serde_json::Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return Err(Error::InvalidRange("empty start/end value".to_string()));
            }
            if s.bytes().all(|b| b.is_ascii_digit()) {
                return s
                    .parse()
                    .map_err(|_| Error::InvalidRange(format!("start/end number out of range: {s:?}")));
            }
            ListingId::normalize(s).map(|id| id.number()).map_err(|_| {
                Error::InvalidRange(format!("bad start/end format: {s:?} (use a number or an id like 1-3000001)"))
            })
        }
        serde_json::Value::Null => Err(Error::InvalidRange("missing start or end value".to_string())),
        other => Err(Error::InvalidRange(format!("bad start/end value: {other}"))),
    }
}

/// Number of members of `[start, end]` with the given step; 0 when empty.
pub fn range_count(start: u64, end: u64, step: u64) -> u64 {
    if start > end || step == 0 {
        return 0;
    }
    (end - start) / step + 1
}

/// Contiguous set of valid identifiers: `[start, end]`, odd only, step 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRange {
    pub start: u64,
    pub end: u64,
    pub step: u64,
}

impl IdRange {
    /// Validate and normalize range bounds.
    ///
    /// Even boundaries are corrected inward to the nearest odd number. The
    /// member count is capped at `max_items`. Only step 2 is supported.
    pub fn normalized(start: u64, end: u64, step: u64, max_items: u64) -> Result<Self, Error> {
        if step != 2 {
            return Err(Error::InvalidRange("only step=2 (odd ids) is supported".to_string()));
        }
        if start > end {
            return Err(Error::InvalidRange("start must not exceed end".to_string()));
        }

        let start = if start % 2 == 0 { start + 1 } else { start };
        let end = if end % 2 == 0 {
            // end == 0 has no odd number below it
            end.checked_sub(1)
                .ok_or_else(|| Error::InvalidRange("range is empty after odd-boundary correction".to_string()))?
        } else {
            end
        };
        if start > end {
            return Err(Error::InvalidRange("range is empty after odd-boundary correction".to_string()));
        }

        let count = range_count(start, end, step);
        if count > max_items {
            return Err(Error::InvalidRange(format!("range too large: {count} ids, max {max_items}")));
        }

        Ok(Self { start, end, step })
    }

    pub fn count(&self) -> u64 {
        range_count(self.start, self.end, self.step)
    }

    /// Whether `n` is a valid member: inside the bounds and odd.
    pub fn contains(&self, n: u64) -> bool {
        self.start <= n && n <= self.end && n % 2 == 1
    }
}
