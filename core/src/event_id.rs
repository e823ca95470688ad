//! Composite event identifiers with a total, append-consistent ordering.
//!
//! Every activity event carries an [`EventId`] made of the millisecond
//! timestamp at which the store accepted it and a tie-break counter for
//! events accepted within the same millisecond. Ids compare as the
//! `(timestamp, counter)` tuple, and the string encoding is zero-padded so
//! that lexical order on the wire agrees with the tuple order.
//!
//! # Example
//!
//! ```
//! use pulsefeed_core::EventId;
//!
//! let a = EventId::new(1_700_000_000_000, 0);
//! let b = EventId::new(1_700_000_000_000, 1);
//! assert!(a < b);
//! assert_eq!(a.to_string(), "1700000000000-0000");
//!
//! let parsed: EventId = "1700000000000-0001".parse().unwrap();
//! assert_eq!(parsed, b);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for [`EventId`] parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid event id: {0}")]
pub struct ParseEventIdError(String);

/// Unique, monotonically increasing identifier for an activity event.
///
/// The id is a composite key: the millisecond timestamp at acceptance time
/// plus a counter that breaks ties between events accepted within the same
/// millisecond. The derived `Ord` is the tuple ordering, which is exactly
/// the append order assigned by the store.
///
/// # Wire encoding
///
/// `{timestamp:013}-{counter:04}`, e.g. `1700000000000-0002`. The zero
/// padding keeps lexical comparison of encoded ids consistent with the
/// numeric tuple ordering for any realistic timestamp and counter, so
/// resume tokens can be compared as opaque strings by other tooling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EventId {
    timestamp_ms: u64,
    counter: u32,
}

impl EventId {
    /// Create an event id from its components.
    #[must_use]
    pub const fn new(timestamp_ms: u64, counter: u32) -> Self {
        Self {
            timestamp_ms,
            counter,
        }
    }

    /// Millisecond timestamp component.
    #[must_use]
    pub const fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    /// Tie-break counter component.
    #[must_use]
    pub const fn counter(&self) -> u32 {
        self.counter
    }

    /// The id that follows `self` given the current wall-clock millisecond.
    ///
    /// If the clock has advanced past this id's timestamp the counter resets
    /// to zero; otherwise the counter bumps, keeping ids strictly increasing
    /// even when the clock stalls or steps backwards.
    #[must_use]
    pub const fn next(&self, now_ms: u64) -> Self {
        if now_ms > self.timestamp_ms {
            Self::new(now_ms, 0)
        } else {
            Self::new(self.timestamp_ms, self.counter + 1)
        }
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:013}-{:04}", self.timestamp_ms, self.counter)
    }
}

impl FromStr for EventId {
    type Err = ParseEventIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (ts, counter) = s
            .split_once('-')
            .ok_or_else(|| ParseEventIdError(format!("missing separator in {s:?}")))?;
        let timestamp_ms = ts
            .parse::<u64>()
            .map_err(|e| ParseEventIdError(format!("bad timestamp in {s:?}: {e}")))?;
        let counter = counter
            .parse::<u32>()
            .map_err(|e| ParseEventIdError(format!("bad counter in {s:?}: {e}")))?;
        Ok(Self::new(timestamp_ms, counter))
    }
}

impl From<EventId> for String {
    fn from(id: EventId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for EventId {
    type Error = ParseEventIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn display_is_zero_padded() {
        let id = EventId::new(1_700_000_000_000, 7);
        assert_eq!(id.to_string(), "1700000000000-0007");
    }

    #[test]
    fn roundtrip_through_string() {
        let id = EventId::new(1_700_000_000_123, 42);
        let parsed: EventId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn rejects_malformed_input() {
        assert!("".parse::<EventId>().is_err());
        assert!("1700000000000".parse::<EventId>().is_err());
        assert!("abc-0001".parse::<EventId>().is_err());
        assert!("1700000000000-xyz".parse::<EventId>().is_err());
    }

    #[test]
    fn ordering_follows_tuple() {
        let a = EventId::new(1, 5);
        let b = EventId::new(2, 0);
        let c = EventId::new(2, 1);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn next_advances_with_clock() {
        let id = EventId::new(100, 3);
        assert_eq!(id.next(200), EventId::new(200, 0));
    }

    #[test]
    fn next_bumps_counter_on_stalled_clock() {
        let id = EventId::new(100, 3);
        assert_eq!(id.next(100), EventId::new(100, 4));
        // Clock stepping backwards must not mint a smaller id.
        assert_eq!(id.next(50), EventId::new(100, 4));
    }

    proptest! {
        #[test]
        fn encoded_order_matches_tuple_order(
            ts_a in 0u64..10_000_000_000_000,
            ct_a in 0u32..10_000,
            ts_b in 0u64..10_000_000_000_000,
            ct_b in 0u32..10_000,
        ) {
            let a = EventId::new(ts_a, ct_a);
            let b = EventId::new(ts_b, ct_b);
            prop_assert_eq!(a.cmp(&b), a.to_string().cmp(&b.to_string()));
        }
    }
}
