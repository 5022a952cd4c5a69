use crate::Endpoint;
use crate::RowViolation;
use crate::invariants::check_le;
use crate::invariants::check_percent;
use crate::invariants::check_percent_range;
use crate::invariants::check_sum_le;
use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Ties a response document to the endpoint that produces it.
pub trait MetricsResponse:
    Clone + std::fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    const ENDPOINT: Endpoint;

    fn from_payload(payload: &MetricsPayload) -> Option<&Self>;

    /// Cross-field rules broken by any row of this document.
    fn violations(&self) -> Vec<RowViolation>;
}

// ---------------------------------------------------------------------------
// GET /metrics/processes/summary
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SummaryCards {
    pub process_completed_rows: u64,
    pub distinct_runs: u64,
    pub distinct_processes: u64,
    pub success_rows: u64,
    pub failure_rows: u64,
    pub failure_pct: Option<f64>,
    pub retried_rows: u64,
    pub retry_pct: Option<f64>,
    pub retry_success_pct: Option<f64>,
    pub latest_process_completed_utc: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EventMixRow {
    pub event: String,
    pub rows: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TopFailureRow {
    pub process: String,
    pub total_completed: u64,
    pub failed: u64,
    pub failure_pct: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TopRetryRow {
    pub process: String,
    pub total_completed: u64,
    pub retried: u64,
    pub retried_pct: Option<f64>,
    pub retried_success: u64,
    pub retried_failed: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TopExitCodeRow {
    pub exit_code: String,
    pub failures: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SummaryResponse {
    pub generated_at_utc: String,
    pub window_days: Option<u32>,
    pub cards: SummaryCards,
    pub event_mix: Vec<EventMixRow>,
    pub top_failures: Vec<TopFailureRow>,
    pub top_retries: Vec<TopRetryRow>,
    pub top_failure_exit_codes: Vec<TopExitCodeRow>,
}

impl SummaryCards {
    pub fn violations(&self) -> Vec<RowViolation> {
        let mut out = Vec::new();
        let total = ("process_completed_rows", self.process_completed_rows);
        check_sum_le(
            &mut out,
            "cards",
            ("success_rows+failure_rows", self.success_rows, self.failure_rows),
            total,
        );
        check_le(&mut out, "cards", ("retried_rows", self.retried_rows), total);
        check_percent(
            &mut out,
            "cards",
            "failure_pct",
            self.failure_pct,
            self.failure_rows,
            self.process_completed_rows,
        );
        check_percent(
            &mut out,
            "cards",
            "retry_pct",
            self.retry_pct,
            self.retried_rows,
            self.process_completed_rows,
        );
        check_percent_range(&mut out, "cards", "retry_success_pct", self.retry_success_pct);
        out
    }
}

impl TopFailureRow {
    pub fn violations(&self) -> Vec<RowViolation> {
        let mut out = Vec::new();
        check_le(
            &mut out,
            &self.process,
            ("failed", self.failed),
            ("total_completed", self.total_completed),
        );
        check_percent(
            &mut out,
            &self.process,
            "failure_pct",
            self.failure_pct,
            self.failed,
            self.total_completed,
        );
        out
    }
}

impl TopRetryRow {
    pub fn violations(&self) -> Vec<RowViolation> {
        retry_row_violations(
            &self.process,
            self.total_completed,
            self.retried,
            self.retried_pct,
            self.retried_success,
            self.retried_failed,
        )
    }
}

impl SummaryResponse {
    pub fn violations(&self) -> Vec<RowViolation> {
        let mut out = self.cards.violations();
        out.extend(self.top_failures.iter().flat_map(TopFailureRow::violations));
        out.extend(self.top_retries.iter().flat_map(TopRetryRow::violations));
        out
    }
}

// ---------------------------------------------------------------------------
// GET /metrics/processes/retries
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RetrySummary {
    pub process_completed_rows: u64,
    pub retried_rows: u64,
    pub retried_pct: Option<f64>,
    pub retry_success_rows: u64,
    pub retry_failure_rows: u64,
    pub retry_success_pct: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RetryByAttemptRow {
    pub attempt: u32,
    pub rows: u64,
    pub success: u64,
    pub failed: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RetryByProcessRow {
    pub process: String,
    pub total_completed: u64,
    pub retried: u64,
    pub retried_pct: Option<f64>,
    pub retried_success: u64,
    pub retried_failed: u64,
    pub max_attempt: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RetriesResponse {
    pub generated_at_utc: String,
    pub window_days: Option<u32>,
    pub summary: RetrySummary,
    pub by_attempt: Vec<RetryByAttemptRow>,
    pub by_process: Vec<RetryByProcessRow>,
}

impl RetrySummary {
    pub fn violations(&self) -> Vec<RowViolation> {
        let mut out = Vec::new();
        check_le(
            &mut out,
            "summary",
            ("retried_rows", self.retried_rows),
            ("process_completed_rows", self.process_completed_rows),
        );
        check_sum_le(
            &mut out,
            "summary",
            (
                "retry_success_rows+retry_failure_rows",
                self.retry_success_rows,
                self.retry_failure_rows,
            ),
            ("retried_rows", self.retried_rows),
        );
        check_percent(
            &mut out,
            "summary",
            "retried_pct",
            self.retried_pct,
            self.retried_rows,
            self.process_completed_rows,
        );
        check_percent(
            &mut out,
            "summary",
            "retry_success_pct",
            self.retry_success_pct,
            self.retry_success_rows,
            self.retried_rows,
        );
        out
    }
}

impl RetryByAttemptRow {
    pub fn violations(&self) -> Vec<RowViolation> {
        let mut out = Vec::new();
        check_sum_le(
            &mut out,
            &format!("attempt {}", self.attempt),
            ("success+failed", self.success, self.failed),
            ("rows", self.rows),
        );
        out
    }
}

impl RetryByProcessRow {
    pub fn violations(&self) -> Vec<RowViolation> {
        retry_row_violations(
            &self.process,
            self.total_completed,
            self.retried,
            self.retried_pct,
            self.retried_success,
            self.retried_failed,
        )
    }
}

impl RetriesResponse {
    pub fn violations(&self) -> Vec<RowViolation> {
        let mut out = self.summary.violations();
        out.extend(self.by_attempt.iter().flat_map(RetryByAttemptRow::violations));
        out.extend(self.by_process.iter().flat_map(RetryByProcessRow::violations));
        out
    }
}

fn retry_row_violations(
    process: &str,
    total_completed: u64,
    retried: u64,
    retried_pct: Option<f64>,
    retried_success: u64,
    retried_failed: u64,
) -> Vec<RowViolation> {
    let mut out = Vec::new();
    check_le(
        &mut out,
        process,
        ("retried", retried),
        ("total_completed", total_completed),
    );
    check_sum_le(
        &mut out,
        process,
        ("retried_success+retried_failed", retried_success, retried_failed),
        ("retried", retried),
    );
    check_percent(
        &mut out,
        process,
        "retried_pct",
        retried_pct,
        retried,
        total_completed,
    );
    out
}

// ---------------------------------------------------------------------------
// GET /metrics/processes/resources-by-attempt
// ---------------------------------------------------------------------------

/// Resource usage for one (process, attempt) group. Every statistic is null
/// when the trace never reported the underlying field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ResourceRow {
    pub process: String,
    pub attempt: u32,
    pub rows: u64,
    pub success: u64,
    pub failed: u64,
    pub avg_requested_cpus: Option<f64>,
    pub avg_requested_memory_gb: Option<f64>,
    pub avg_requested_time_min: Option<f64>,
    pub avg_pct_cpu: Option<f64>,
    pub p95_pct_cpu: Option<f64>,
    pub avg_pct_mem: Option<f64>,
    pub p95_pct_mem: Option<f64>,
    pub avg_peak_rss_gb: Option<f64>,
    pub p95_peak_rss_gb: Option<f64>,
    pub avg_read_gb: Option<f64>,
    pub avg_write_gb: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ResourcesResponse {
    pub generated_at_utc: String,
    pub window_days: Option<u32>,
    pub rows: Vec<ResourceRow>,
}

impl ResourceRow {
    pub fn violations(&self) -> Vec<RowViolation> {
        let mut out = Vec::new();
        let label = format!("{} (attempt {})", self.process, self.attempt);
        check_sum_le(
            &mut out,
            &label,
            ("success+failed", self.success, self.failed),
            ("rows", self.rows),
        );
        // %cpu is per core and routinely exceeds 100; memory share cannot.
        check_percent_range(&mut out, &label, "avg_pct_mem", self.avg_pct_mem);
        check_percent_range(&mut out, &label, "p95_pct_mem", self.p95_pct_mem);
        out
    }
}

impl ResourcesResponse {
    pub fn violations(&self) -> Vec<RowViolation> {
        self.rows.iter().flat_map(ResourceRow::violations).collect()
    }
}

// ---------------------------------------------------------------------------
// GET /metrics/processes/failures
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FailureRow {
    pub process: String,
    pub total_completed: u64,
    pub success: u64,
    pub failed: u64,
    pub failure_pct: Option<f64>,
    pub modal_failure_exit_code: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FailuresResponse {
    pub generated_at_utc: String,
    pub window_days: Option<u32>,
    pub rows: Vec<FailureRow>,
}

impl FailureRow {
    pub fn violations(&self) -> Vec<RowViolation> {
        let mut out = Vec::new();
        let total = ("total_completed", self.total_completed);
        check_le(&mut out, &self.process, ("failed", self.failed), total);
        check_sum_le(
            &mut out,
            &self.process,
            ("success+failed", self.success, self.failed),
            total,
        );
        check_percent(
            &mut out,
            &self.process,
            "failure_pct",
            self.failure_pct,
            self.failed,
            self.total_completed,
        );
        out
    }
}

impl FailuresResponse {
    pub fn violations(&self) -> Vec<RowViolation> {
        self.rows.iter().flat_map(FailureRow::violations).collect()
    }
}

// ---------------------------------------------------------------------------
// GET /metrics/processes/failure-signatures
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FailureSignatureRow {
    pub process: String,
    pub exit_code: String,
    pub failures: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FailureSignaturesResponse {
    pub generated_at_utc: String,
    pub window_days: Option<u32>,
    pub rows: Vec<FailureSignatureRow>,
}

impl FailureSignaturesResponse {
    pub fn violations(&self) -> Vec<RowViolation> {
        Vec::new()
    }
}

// ---------------------------------------------------------------------------
// Payload union
// ---------------------------------------------------------------------------

/// A decoded response from any endpoint.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricsPayload {
    Summary(SummaryResponse),
    Retries(RetriesResponse),
    Resources(ResourcesResponse),
    Failures(FailuresResponse),
    FailureSignatures(FailureSignaturesResponse),
}

impl MetricsPayload {
    /// Decodes a response body using the shape fixed by `endpoint`.
    pub fn decode(endpoint: Endpoint, body: &[u8]) -> Result<Self, serde_json::Error> {
        Ok(match endpoint {
            Endpoint::Summary => Self::Summary(serde_json::from_slice(body)?),
            Endpoint::Retries => Self::Retries(serde_json::from_slice(body)?),
            Endpoint::ResourcesByAttempt => Self::Resources(serde_json::from_slice(body)?),
            Endpoint::Failures => Self::Failures(serde_json::from_slice(body)?),
            Endpoint::FailureSignatures => Self::FailureSignatures(serde_json::from_slice(body)?),
        })
    }

    pub fn endpoint(&self) -> Endpoint {
        match self {
            Self::Summary(_) => Endpoint::Summary,
            Self::Retries(_) => Endpoint::Retries,
            Self::Resources(_) => Endpoint::ResourcesByAttempt,
            Self::Failures(_) => Endpoint::Failures,
            Self::FailureSignatures(_) => Endpoint::FailureSignatures,
        }
    }

    pub fn generated_at_utc(&self) -> &str {
        match self {
            Self::Summary(r) => &r.generated_at_utc,
            Self::Retries(r) => &r.generated_at_utc,
            Self::Resources(r) => &r.generated_at_utc,
            Self::Failures(r) => &r.generated_at_utc,
            Self::FailureSignatures(r) => &r.generated_at_utc,
        }
    }

    /// Effective lookback window echoed by the service; `None` is all time.
    pub fn window_days(&self) -> Option<u32> {
        match self {
            Self::Summary(r) => r.window_days,
            Self::Retries(r) => r.window_days,
            Self::Resources(r) => r.window_days,
            Self::Failures(r) => r.window_days,
            Self::FailureSignatures(r) => r.window_days,
        }
    }

    pub fn violations(&self) -> Vec<RowViolation> {
        match self {
            Self::Summary(r) => r.violations(),
            Self::Retries(r) => r.violations(),
            Self::Resources(r) => r.violations(),
            Self::Failures(r) => r.violations(),
            Self::FailureSignatures(r) => r.violations(),
        }
    }

    /// JSON schema of the document `endpoint` returns.
    pub fn schema(endpoint: Endpoint) -> schemars::schema::RootSchema {
        match endpoint {
            Endpoint::Summary => schemars::schema_for!(SummaryResponse),
            Endpoint::Retries => schemars::schema_for!(RetriesResponse),
            Endpoint::ResourcesByAttempt => schemars::schema_for!(ResourcesResponse),
            Endpoint::Failures => schemars::schema_for!(FailuresResponse),
            Endpoint::FailureSignatures => schemars::schema_for!(FailureSignaturesResponse),
        }
    }
}

macro_rules! metrics_response {
    ($ty:ident, $endpoint:ident, $variant:ident) => {
        impl MetricsResponse for $ty {
            const ENDPOINT: Endpoint = Endpoint::$endpoint;

            fn from_payload(payload: &MetricsPayload) -> Option<&Self> {
                match payload {
                    MetricsPayload::$variant(inner) => Some(inner),
                    _ => None,
                }
            }

            fn violations(&self) -> Vec<RowViolation> {
                $ty::violations(self)
            }
        }
    };
}

metrics_response!(SummaryResponse, Summary, Summary);
metrics_response!(RetriesResponse, Retries, Retries);
metrics_response!(ResourcesResponse, ResourcesByAttempt, Resources);
metrics_response!(FailuresResponse, Failures, Failures);
metrics_response!(FailureSignaturesResponse, FailureSignatures, FailureSignatures);
