use serde::Deserialize;
use serde::Serialize;
use serde_with::skip_serializing_none;
use std::fmt;
use std::num::NonZeroU32;

/// The three filters shared by every view.
///
/// A `None` field means "let the service pick its default". Equality and
/// hashing only look at which fields are set and to what, so two values built
/// in different orders are the same cache key.
#[skip_serializing_none]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterValue {
    pub window_days: Option<NonZeroU32>,
    pub limit: Option<NonZeroU32>,
    pub min_samples: Option<NonZeroU32>,
}

/// Names of the recognized filter fields, in canonical request order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKey {
    WindowDays,
    Limit,
    MinSamples,
}

impl FilterKey {
    pub const ALL: [FilterKey; 3] = [FilterKey::WindowDays, FilterKey::Limit, FilterKey::MinSamples];

    pub fn as_str(self) -> &'static str {
        match self {
            FilterKey::WindowDays => "window_days",
            FilterKey::Limit => "limit",
            FilterKey::MinSamples => "min_samples",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        FilterKey::ALL.into_iter().find(|key| key.as_str() == name)
    }
}

impl fmt::Display for FilterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FilterValue {
    pub fn get(&self, key: FilterKey) -> Option<NonZeroU32> {
        match key {
            FilterKey::WindowDays => self.window_days,
            FilterKey::Limit => self.limit,
            FilterKey::MinSamples => self.min_samples,
        }
    }

    pub fn set(&mut self, key: FilterKey, value: Option<NonZeroU32>) {
        let slot = match key {
            FilterKey::WindowDays => &mut self.window_days,
            FilterKey::Limit => &mut self.limit,
            FilterKey::MinSamples => &mut self.min_samples,
        };
        *slot = value;
    }

    pub fn with(mut self, key: FilterKey, value: Option<NonZeroU32>) -> Self {
        self.set(key, value);
        self
    }

    pub fn is_empty(&self) -> bool {
        FilterKey::ALL.into_iter().all(|key| self.get(key).is_none())
    }

    /// Set fields in canonical order.
    pub fn fields(&self) -> impl Iterator<Item = (FilterKey, NonZeroU32)> + '_ {
        FilterKey::ALL
            .into_iter()
            .filter_map(|key| self.get(key).map(|value| (key, value)))
    }
}
