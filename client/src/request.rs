use nftel_protocol::Endpoint;
use nftel_protocol::FilterValue;
use url::Url;
use url::form_urlencoded;

/// A fully determined GET against one endpoint.
///
/// Parameters are kept in canonical order (`window_days`, `limit`,
/// `min_samples`) so equal filters always render byte-identical query
/// strings.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MetricsRequest {
    endpoint: Endpoint,
    query: Vec<(&'static str, String)>,
}

pub fn build(endpoint: Endpoint, filters: &FilterValue) -> MetricsRequest {
    let query = filters
        .fields()
        .map(|(key, value)| (key.as_str(), value.to_string()))
        .collect();
    MetricsRequest { endpoint, query }
}

impl MetricsRequest {
    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    pub fn path(&self) -> &'static str {
        self.endpoint.path()
    }

    pub fn query(&self) -> &[(&'static str, String)] {
        &self.query
    }

    /// Encoded query without the leading `?`; empty when no filter is set.
    pub fn query_string(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.query.iter().map(|(k, v)| (*k, v.as_str())))
            .finish()
    }

    pub fn path_and_query(&self) -> String {
        let query = self.query_string();
        if query.is_empty() {
            self.path().to_string()
        } else {
            format!("{}?{query}", self.path())
        }
    }

    /// Absolute URL under `base`. A path prefix on `base` is kept, so a
    /// service mounted at `https://host/api/` is reached at
    /// `https://host/api/metrics/processes/...`.
    pub fn url(&self, base: &Url) -> Url {
        let mut url = base.clone();
        let prefix = base.path().trim_end_matches('/');
        url.set_path(&format!("{prefix}{}", self.path()));
        let query = self.query_string();
        url.set_query((!query.is_empty()).then_some(query.as_str()));
        url.set_fragment(None);
        url
    }
}
