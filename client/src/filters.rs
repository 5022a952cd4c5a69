//! Navigation state ⇄ filter value.
//!
//! The query string of the current location is the only place filters are
//! kept. Views re-derive a [`FilterValue`] from it on every use and change it
//! only through [`encode`] (or [`FilterStore::set_filter`]), so two views
//! sharing a location can never disagree about the active filters.

use nftel_protocol::FilterKey;
use nftel_protocol::FilterValue;
use serde::Serialize;
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::watch;
use url::form_urlencoded;

/// Values that mean "drop the key and let the service decide".
pub const DEFAULT_SENTINELS: [&str; 2] = ["all", "default"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct FilterOption {
    pub label: &'static str,
    pub value: &'static str,
}

pub const WINDOW_OPTIONS: [FilterOption; 5] = [
    FilterOption { label: "7 days", value: "7" },
    FilterOption { label: "30 days", value: "30" },
    FilterOption { label: "90 days", value: "90" },
    FilterOption { label: "180 days", value: "180" },
    FilterOption { label: "All time", value: "all" },
];

pub const LIMIT_OPTIONS: [FilterOption; 6] = [
    FilterOption { label: "Default", value: "default" },
    FilterOption { label: "5", value: "5" },
    FilterOption { label: "10", value: "10" },
    FilterOption { label: "25", value: "25" },
    FilterOption { label: "50", value: "50" },
    FilterOption { label: "100", value: "100" },
];

/// Ordered query-string pairs, as found in a shareable link.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NavState {
    pairs: Vec<(String, String)>,
}

impl NavState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a query string. A leading `?` is accepted.
    pub fn parse(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let pairs = form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        Self { pairs }
    }

    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Replace the first occurrence in place, drop any later duplicates, or
    /// append when the key is new.
    pub fn set(&mut self, key: &str, value: &str) {
        let mut seen = false;
        self.pairs.retain_mut(|(k, v)| {
            if k != key {
                return true;
            }
            if seen {
                return false;
            }
            seen = true;
            *v = value.to_string();
            true
        });
        if !seen {
            self.pairs.push((key.to_string(), value.to_string()));
        }
    }

    pub fn remove(&mut self, key: &str) {
        self.pairs.retain(|(k, _)| k != key);
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn to_query_string(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.pairs.iter())
            .finish()
    }
}

impl FromStr for NavState {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for NavState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query_string())
    }
}

/// Read the recognized filter keys. Anything that is not a positive base-10
/// integer counts as unset.
pub fn decode(state: &NavState) -> FilterValue {
    let mut filters = FilterValue::default();
    for key in FilterKey::ALL {
        filters.set(key, state.get(key.as_str()).and_then(parse_positive));
    }
    filters
}

/// Return `state` with `key` set to `new_value` verbatim, or removed when
/// `new_value` is exactly empty or a default sentinel. Other keys are left as
/// they were.
pub fn encode(state: &NavState, key: FilterKey, new_value: &str) -> NavState {
    let mut next = state.clone();
    if new_value.is_empty() || DEFAULT_SENTINELS.contains(&new_value) {
        next.remove(key.as_str());
    } else {
        next.set(key.as_str(), new_value);
    }
    next
}

/// Typed form of [`encode`]: `None` clears the key.
pub fn encode_value(state: &NavState, key: FilterKey, value: Option<NonZeroU32>) -> NavState {
    match value {
        Some(value) => encode(state, key, &value.to_string()),
        None => encode(state, key, ""),
    }
}

/// Navigation state for a filter value, in canonical key order.
pub fn to_nav_state(filters: &FilterValue) -> NavState {
    filters
        .fields()
        .fold(NavState::new(), |state, (key, value)| {
            encode_value(&state, key, Some(value))
        })
}

fn parse_positive(raw: &str) -> Option<NonZeroU32> {
    let raw = raw.trim();
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse::<u32>().ok().and_then(NonZeroU32::new)
}

/// Shared, observable navigation state.
///
/// Every change is a read-modify-write against the latest state, so edits to
/// different keys from different places never overwrite each other.
#[derive(Clone, Debug)]
pub struct FilterStore {
    tx: Arc<watch::Sender<NavState>>,
}

impl Default for FilterStore {
    fn default() -> Self {
        Self::new(NavState::new())
    }
}

impl FilterStore {
    pub fn new(initial: NavState) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    pub fn from_query(query: &str) -> Self {
        Self::new(NavState::parse(query))
    }

    pub fn state(&self) -> NavState {
        self.tx.borrow().clone()
    }

    /// Filters as currently encoded in the navigation state.
    pub fn filters(&self) -> FilterValue {
        decode(&self.tx.borrow())
    }

    /// Apply [`encode`] atomically and return the resulting filters.
    pub fn set_filter(&self, key: FilterKey, new_value: &str) -> FilterValue {
        let mut filters = FilterValue::default();
        self.tx.send_modify(|state| {
            *state = encode(state, key, new_value);
            filters = decode(state);
        });
        filters
    }

    pub fn set_value(&self, key: FilterKey, value: Option<NonZeroU32>) -> FilterValue {
        let mut filters = FilterValue::default();
        self.tx.send_modify(|state| {
            *state = encode_value(state, key, value);
            filters = decode(state);
        });
        filters
    }

    /// Receiver that is notified on every filter change.
    pub fn subscribe(&self) -> watch::Receiver<NavState> {
        self.tx.subscribe()
    }

    pub fn query_string(&self) -> String {
        self.tx.borrow().to_query_string()
    }
}
