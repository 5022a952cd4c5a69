//! Tracing subscriber for the `nftel` binary.
//!
//! Directives are taken from, in order: `NFTEL_LOG`, `RUST_LOG`, then the
//! `-v` / `-q` flags. Logs always go to stderr so stdout stays pure JSON.

use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

pub const LOG_ENV_VAR: &str = "NFTEL_LOG";

const CRATE_TARGETS: [&str; 3] = ["nftel_client", "nftel_protocol", "nftel_cli"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Errors only.
    Quiet,
    /// Warnings and above.
    Normal,
    /// Debug output from this workspace's crates.
    Verbose,
}

impl Verbosity {
    pub const fn from_flags(verbose: bool, quiet: bool) -> Self {
        if verbose {
            Self::Verbose
        } else if quiet {
            Self::Quiet
        } else {
            Self::Normal
        }
    }

    pub const fn default_level(self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::WARN,
            Self::Verbose => Level::DEBUG,
        }
    }
}

/// Install the global subscriber. Call once, before any other work.
pub fn init_subscriber(verbosity: Verbosity) {
    let use_ansi = std::io::IsTerminal::is_terminal(&std::io::stderr());
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(use_ansi)
        .with_target(true)
        .without_time()
        .compact();

    // A subscriber installed by an embedding process wins.
    let _ = tracing_subscriber::registry()
        .with(build_env_filter(verbosity))
        .with(fmt_layer)
        .try_init();
}

fn build_env_filter(verbosity: Verbosity) -> EnvFilter {
    if let Ok(directives) = std::env::var(LOG_ENV_VAR)
        && let Ok(filter) = EnvFilter::try_new(&directives)
    {
        return filter;
    }

    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    let level = verbosity.default_level();
    EnvFilter::try_new(default_directive(verbosity))
        .unwrap_or_else(|_| EnvFilter::new(level.as_str()))
}

fn default_directive(verbosity: Verbosity) -> String {
    let level = verbosity.default_level();
    if verbosity == Verbosity::Verbose {
        // Keep reqwest/hyper at warn; only our own crates go to debug.
        let crates = CRATE_TARGETS
            .iter()
            .map(|target| format!("{target}=debug"))
            .collect::<Vec<_>>()
            .join(",");
        format!("warn,{crates}")
    } else {
        level.to_string().to_lowercase()
    }
}
