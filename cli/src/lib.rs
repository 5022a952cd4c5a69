pub mod tracing_setup;
mod views;

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use clap::Subcommand;
use nftel_client::ClientConfig;
use nftel_client::FilterStore;
use nftel_protocol::Endpoint;
use nftel_protocol::FilterKey;
use std::path::PathBuf;
use tracing_setup::Verbosity;

/// Inspect process-level pipeline metrics from the aggregation service.
#[derive(Debug, Parser)]
#[command(name = "nftel", version)]
pub struct Cli {
    /// TOML client config.
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Aggregation service root; overrides the config file and NFTEL_BASE_URL.
    #[arg(long, value_name = "URL", global = true)]
    pub base_url: Option<String>,

    /// Query string of a shared link, e.g. `window_days=30&limit=10`.
    #[arg(long, value_name = "QS", default_value = "", global = true)]
    pub query: String,

    /// Lookback window in days, or `all`.
    #[arg(long = "window", value_name = "N|all", global = true)]
    pub window_days: Option<String>,

    /// Maximum rows per table, or `default`.
    #[arg(long, value_name = "N|default", global = true)]
    pub limit: Option<String>,

    /// Minimum completed rows for a process to be listed.
    #[arg(long, value_name = "N", global = true)]
    pub min_samples: Option<String>,

    /// Debug logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Errors only.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Headline cards, event mix and top offenders.
    Summary,

    /// Retry counts by attempt and by process.
    Retries,

    /// Resource usage per process and attempt.
    Resources,

    /// Failure statistics per process, with failure signatures.
    Failures,

    /// Failure counts per (process, exit code).
    Signatures,

    /// Every view, fetched together.
    Dashboard,

    /// Print the shareable query string for the current filters.
    Link,

    /// List the window and limit presets.
    Options,

    /// Print the JSON schema of an endpoint's response.
    Schema {
        /// Endpoint name (`summary`, `failure-signatures`, ...) or path.
        #[arg(value_name = "ENDPOINT")]
        endpoint: Endpoint,
    },
}

impl Cli {
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.verbose, self.quiet)
    }

    /// Navigation state from `--query` with the filter flags applied on top.
    pub fn filter_store(&self) -> FilterStore {
        let store = FilterStore::from_query(&self.query);
        let overrides = [
            (FilterKey::WindowDays, &self.window_days),
            (FilterKey::Limit, &self.limit),
            (FilterKey::MinSamples, &self.min_samples),
        ];
        for (key, value) in overrides {
            if let Some(value) = value {
                store.set_filter(key, value);
            }
        }
        store
    }

    /// Defaults, then the config file, then NFTEL_BASE_URL, then `--base-url`.
    pub fn client_config(&self) -> Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::load(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => ClientConfig::default(),
        };
        config.apply_env();
        if let Some(base_url) = &self.base_url {
            config.base_url.clone_from(base_url);
        }
        config.validate().context("invalid client config")?;
        Ok(config)
    }

    pub async fn run(self) -> Result<()> {
        let store = self.filter_store();
        match self.command {
            Command::Link => {
                println!("{}", store.query_string());
                Ok(())
            }
            Command::Options => views::print_options(),
            Command::Schema { endpoint } => views::print_schema(endpoint),
            Command::Summary => views::show(&self.client_config()?, Endpoint::Summary, &store).await,
            Command::Retries => views::show(&self.client_config()?, Endpoint::Retries, &store).await,
            Command::Resources => {
                views::show(&self.client_config()?, Endpoint::ResourcesByAttempt, &store).await
            }
            Command::Failures => views::failures(&self.client_config()?, &store).await,
            Command::Signatures => {
                views::show(&self.client_config()?, Endpoint::FailureSignatures, &store).await
            }
            Command::Dashboard => views::dashboard(&self.client_config()?, &store).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::num::NonZeroU32;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("nftel").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn flags_are_applied_over_the_shared_query() {
        let cli = parse(&[
            "--query",
            "?window_days=7&limit=10&view=failures",
            "--window",
            "30",
            "--limit",
            "default",
            "link",
        ]);
        let store = cli.filter_store();
        assert_eq!(store.query_string(), "window_days=30&view=failures");
        assert_eq!(store.filters().window_days, NonZeroU32::new(30));
        assert_eq!(store.filters().limit, None);
    }

    #[test]
    fn global_flags_may_follow_the_command() {
        let cli = parse(&["failures", "--min-samples", "5", "-v"]);
        assert!(matches!(cli.command, Command::Failures));
        assert_eq!(cli.verbosity(), Verbosity::Verbose);
        assert_eq!(cli.filter_store().query_string(), "min_samples=5");
    }

    #[test]
    fn schema_accepts_names_and_paths() {
        let cli = parse(&["schema", "failure-signatures"]);
        assert!(matches!(
            cli.command,
            Command::Schema {
                endpoint: Endpoint::FailureSignatures
            }
        ));
        let cli = parse(&["schema", "/metrics/processes/retries"]);
        assert!(matches!(
            cli.command,
            Command::Schema {
                endpoint: Endpoint::Retries
            }
        ));
        assert!(Cli::try_parse_from(["nftel", "schema", "latency"]).is_err());
    }

    #[test]
    fn base_url_flag_overrides_the_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nftel.toml");
        std::fs::write(&path, "base_url = \"http://metrics.internal:9000\"\nretry_attempts = 0\n")
            .unwrap();
        let path = path.to_string_lossy().into_owned();

        let cli = parse(&["--config", &path, "--base-url", "https://elsewhere.example", "summary"]);
        let config = cli.client_config().unwrap();
        assert_eq!(config.base_url, "https://elsewhere.example");
        assert_eq!(config.retry_attempts, 0);
    }

    #[test]
    fn invalid_base_url_is_reported() {
        let cli = parse(&["--base-url", "metrics", "summary"]);
        let err = cli.client_config().unwrap_err();
        assert_eq!(err.to_string(), "invalid client config");
    }
}
