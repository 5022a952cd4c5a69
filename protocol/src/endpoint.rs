use serde::Deserialize;
use serde::Serialize;
use std::str::FromStr;
use strum_macros::Display;
use strum_macros::IntoStaticStr;
use thiserror::Error;

const PATH_PREFIX: &str = "/metrics/processes";

/// The closed set of aggregation endpoints.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
    IntoStaticStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Endpoint {
    Summary,
    Retries,
    ResourcesByAttempt,
    Failures,
    FailureSignatures,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown metrics endpoint `{0}`")]
pub struct ParseEndpointError(pub String);

impl Endpoint {
    pub const ALL: [Endpoint; 5] = [
        Endpoint::Summary,
        Endpoint::Retries,
        Endpoint::ResourcesByAttempt,
        Endpoint::Failures,
        Endpoint::FailureSignatures,
    ];

    /// Identifier used in cache keys and on the command line.
    pub fn as_str(self) -> &'static str {
        self.into()
    }

    /// Fixed server path, relative to the service root.
    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Summary => "/metrics/processes/summary",
            Endpoint::Retries => "/metrics/processes/retries",
            Endpoint::ResourcesByAttempt => "/metrics/processes/resources-by-attempt",
            Endpoint::Failures => "/metrics/processes/failures",
            Endpoint::FailureSignatures => "/metrics/processes/failure-signatures",
        }
    }
}

impl FromStr for Endpoint {
    type Err = ParseEndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let name = trimmed
            .strip_prefix(PATH_PREFIX)
            .map(|rest| rest.trim_start_matches('/'))
            .unwrap_or(trimmed);
        Endpoint::ALL
            .into_iter()
            .find(|endpoint| endpoint.as_str() == name)
            .ok_or_else(|| ParseEndpointError(s.to_string()))
    }
}
