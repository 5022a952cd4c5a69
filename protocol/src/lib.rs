//! Wire types shared by the process-metrics client and its consumers.
//!
//! The aggregation service exposes five read-only endpoints under
//! `/metrics/processes`. Each one answers with a JSON document carrying a
//! generation timestamp, the effective lookback window, and one or more
//! ordered row sequences. This crate models those documents, the filter
//! value that parameterizes every request, and the cross-field invariants
//! the service is expected to uphold.

mod endpoint;
mod filters;
mod invariants;
mod responses;

pub use endpoint::Endpoint;
pub use endpoint::ParseEndpointError;
pub use filters::FilterKey;
pub use filters::FilterValue;
pub use invariants::PERCENT_DECIMALS;
pub use invariants::RowViolation;
pub use invariants::percent;
pub use responses::EventMixRow;
pub use responses::FailureRow;
pub use responses::FailureSignatureRow;
pub use responses::FailureSignaturesResponse;
pub use responses::FailuresResponse;
pub use responses::MetricsPayload;
pub use responses::MetricsResponse;
pub use responses::ResourceRow;
pub use responses::ResourcesResponse;
pub use responses::RetriesResponse;
pub use responses::RetryByAttemptRow;
pub use responses::RetryByProcessRow;
pub use responses::RetrySummary;
pub use responses::SummaryCards;
pub use responses::SummaryResponse;
pub use responses::TopExitCodeRow;
pub use responses::TopFailureRow;
pub use responses::TopRetryRow;
