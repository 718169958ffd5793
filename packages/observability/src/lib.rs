//! # Observability
//!
//! Centralized structured logging for the Wasel client workspace.
//!
//! Crates are **log producers** only: they use the standard `tracing` macros
//! and never configure subscribers themselves. The embedding application
//! calls [`init`] or [`init_with_config`] once at startup.
//!
//! Every event is written as one JSON object per line to
//! `~/.wasel/logs/dev.jsonl` (or [`LogConfig::log_path`]), which makes
//! `tail -f ~/.wasel/logs/dev.jsonl | jq` the quickest way to follow a
//! session. Fields whose name looks like a credential (`password`,
//! `access_token`, ...) are redacted before they reach the file.
//!
//! ```rust,ignore
//! observability::init_with_config(observability::LogConfig {
//!     service_name: "wasel-client".into(),
//!     default_level: "debug".into(),
//!     also_stderr: true,
//!     ..Default::default()
//! });
//! tracing::info!("client started");
//! ```

mod json_layer;
mod writer;

use std::io;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub use json_layer::{JsonLayer, LogEntry};
pub use writer::{LogFileWriter, WriterFactory};

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service, included in every log line.
    pub service_name: String,

    /// Default filter (e.g. "debug", "info,wasel_auth=trace").
    /// `RUST_LOG` takes precedence when set.
    pub default_level: String,

    /// Custom log file path. Defaults to `~/.wasel/logs/dev.jsonl`.
    pub log_path: Option<PathBuf>,

    /// Also emit compact human-readable lines on stderr.
    pub also_stderr: bool,

    /// Replace values of credential-like fields with `"[redacted]"`.
    pub redact_secrets: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: false,
            redact_secrets: true,
        }
    }
}

/// Default central log file location.
pub fn default_log_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".wasel").join("logs").join("dev.jsonl"))
}

/// Initialize logging with default settings for the given service.
pub fn init(service_name: &str) {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    });
}

/// Initialize logging with a custom configuration.
///
/// Never panics: if the log file cannot be opened, logging falls back to
/// stderr only. Calling this twice is harmless; the second call is ignored.
pub fn init_with_config(config: LogConfig) {
    let log_path = config.log_path.clone().or_else(default_log_path);

    let json_layer = log_path.as_ref().and_then(|path| match LogFileWriter::new(path) {
        Ok(writer) => Some(
            JsonLayer::new(
                config.service_name.clone(),
                WriterFactory::new(writer),
                config.redact_secrets,
            )
            .with_filter(env_filter(&config.default_level)),
        ),
        Err(e) => {
            eprintln!("observability: cannot open log file {}: {}", path.display(), e);
            None
        }
    });

    let stderr_layer = if config.also_stderr || json_layer.is_none() {
        Some(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .compact()
                .with_writer(io::stderr)
                .with_filter(env_filter(&config.default_level)),
        )
    } else {
        None
    };

    let installed = tracing_subscriber::registry()
        .with(json_layer)
        .with(stderr_layer)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!(
            service = %config.service_name,
            log_path = ?log_path,
            "observability initialized"
        );
    }
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

pub use tracing::{debug, error, info, instrument, trace, warn, Level};
