use anyhow::Context;
use anyhow::Result;
use nftel_client::CacheError;
use nftel_client::ClientConfig;
use nftel_client::FilterStore;
use nftel_client::MetricsGateway;
use nftel_client::QueryCache;
use nftel_client::filters::FilterOption;
use nftel_client::filters::LIMIT_OPTIONS;
use nftel_client::filters::WINDOW_OPTIONS;
use nftel_protocol::Endpoint;
use nftel_protocol::FilterValue;
use nftel_protocol::MetricsPayload;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use std::sync::Arc;
use tracing::info;
use tracing::warn;

/// Views shown on their own by the dashboard; failures and failure
/// signatures are loaded together as one view.
const DASHBOARD: [Endpoint; 3] = [
    Endpoint::Summary,
    Endpoint::Retries,
    Endpoint::ResourcesByAttempt,
];

#[derive(Serialize)]
struct Presets {
    window_days: &'static [FilterOption],
    limit: &'static [FilterOption],
}

pub(crate) fn print_options() -> Result<()> {
    print_json(&Presets {
        window_days: &WINDOW_OPTIONS,
        limit: &LIMIT_OPTIONS,
    })
}

pub(crate) fn print_schema(endpoint: Endpoint) -> Result<()> {
    print_json(&MetricsPayload::schema(endpoint))
}

/// Fetch one endpoint and print its document.
pub(crate) async fn show(config: &ClientConfig, endpoint: Endpoint, store: &FilterStore) -> Result<()> {
    let cache = nftel_client::connect(config)?;
    let filters = store.filters();
    let payload = fetch(&cache, endpoint, &filters)
        .await
        .with_context(|| format!("failed to load {endpoint}"))?;
    print_json(payload.as_ref())
}

/// Failure statistics and failure signatures, loaded concurrently through
/// one cache.
pub(crate) async fn failures(config: &ClientConfig, store: &FilterStore) -> Result<()> {
    let cache = nftel_client::connect(config)?;
    let filters = store.filters();
    let view = failures_view(&cache, &filters).await?;
    info!(stats = ?cache.stats(), "failures loaded");
    view.print()
}

/// Fetch every dashboard view concurrently through one cache. A view that
/// fails is rendered as an error object; the others are still printed.
pub(crate) async fn dashboard(config: &ClientConfig, store: &FilterStore) -> Result<()> {
    let cache = nftel_client::connect(config)?;
    let filters = store.filters();
    let [summary, retries, resources] = DASHBOARD.map(|endpoint| fetch(&cache, endpoint, &filters));
    let (summary, retries, resources, failures) = tokio::join!(
        summary,
        retries,
        resources,
        failures_view(&cache, &filters)
    );

    let mut view = View::default();
    view.document
        .insert("query".to_string(), Value::String(store.query_string()));
    for (endpoint, result) in DASHBOARD.into_iter().zip([summary, retries, resources]) {
        view.insert(endpoint, result)?;
    }
    view.nest(Endpoint::Failures, failures?);
    info!(stats = ?cache.stats(), "dashboard loaded");
    view.print()
}

async fn failures_view(cache: &QueryCache<MetricsGateway>, filters: &FilterValue) -> Result<View> {
    let (failures, signatures) = tokio::join!(
        fetch(cache, Endpoint::Failures, filters),
        fetch(cache, Endpoint::FailureSignatures, filters)
    );
    let mut view = View::default();
    view.insert(Endpoint::Failures, failures)?;
    view.insert(Endpoint::FailureSignatures, signatures)?;
    Ok(view)
}

/// A JSON object of loaded documents, with `{"error": ...}` in place of each
/// part that failed.
#[derive(Default)]
struct View {
    document: Map<String, Value>,
    parts: usize,
    failed: usize,
}

impl View {
    fn insert(&mut self, endpoint: Endpoint, result: Result<Arc<MetricsPayload>, CacheError>) -> Result<()> {
        let part = match result {
            Ok(payload) => serde_json::to_value(payload.as_ref())?,
            Err(err) => {
                self.failed += 1;
                json!({ "error": err.to_string() })
            }
        };
        self.parts += 1;
        self.document.insert(endpoint.as_str().to_string(), part);
        Ok(())
    }

    fn nest(&mut self, endpoint: Endpoint, inner: View) {
        self.parts += inner.parts;
        self.failed += inner.failed;
        self.document
            .insert(endpoint.as_str().to_string(), Value::Object(inner.document));
    }

    /// Print the object, then fail if any part did not load.
    fn print(self) -> Result<()> {
        print_json(&self.document)?;
        if self.failed > 0 {
            anyhow::bail!("{} of {} views failed to load", self.failed, self.parts);
        }
        Ok(())
    }
}

async fn fetch(
    cache: &QueryCache<MetricsGateway>,
    endpoint: Endpoint,
    filters: &FilterValue,
) -> Result<Arc<MetricsPayload>, CacheError> {
    let payload = cache.get(endpoint, filters).await?;
    for violation in payload.violations() {
        warn!(endpoint = %endpoint, "row invariant violated: {violation}");
    }
    Ok(payload)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let output = serde_json::to_string_pretty(value)?;
    println!("{output}");
    Ok(())
}
