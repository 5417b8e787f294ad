//! CLI config for logging.

use tracing_subscriber::EnvFilter;

/// Filter used when neither `--log-filter` nor `-v` is given.
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// CLI config for the logging related subset of options.
#[derive(Debug, Clone, clap::Parser)]
pub struct LoggingConfig {
    /// Logs: filter directive
    ///
    /// Configures log severity level filter, by target.
    ///
    /// Simplest options: error, warn, info, debug, trace
    ///
    /// Levels for different modules can be specified. For example
    /// `debug,ddlcache_catalog=info` specifies debug logging for all modules
    /// except for the catalog, which will only display info level logging.
    ///
    /// Overridden by `-v`.
    #[clap(long = "log-filter", env = "LOG_FILTER", action)]
    pub log_filter: Option<String>,

    /// Logs: filter short-hand
    ///
    /// Convenient way to set log severity level filter.
    /// Overrides `--log-filter`.
    ///
    /// -v   'info'
    ///
    /// -vv  'debug'
    ///
    /// -vvv 'trace'
    #[clap(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub log_verbose_count: u8,
}

impl LoggingConfig {
    /// The filter directive these options select.
    pub fn filter_directive(&self) -> &str {
        match self.log_verbose_count {
            0 => self.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER),
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }

    /// Build the [`EnvFilter`] for [`filter_directive`](Self::filter_directive).
    pub fn env_filter(&self) -> Result<EnvFilter, tracing_subscriber::filter::ParseError> {
        EnvFilter::try_new(self.filter_directive())
    }
}
