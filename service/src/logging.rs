use crate::config::Config;
use log::LevelFilter;
use simplelog::{self, ConfigBuilder};
use std::error::Error as StdError;

/// Target prefixes of the server, session and token-exchange transport.
const FILTERED_MODULES: &[&str] = &[
    "tower",
    "tower_sessions",
    "hyper",
    "hyper_util",
    "axum",
    "reqwest",
    "rustls",
];

pub struct Logger {}

impl Logger {
    /// Installs a terminal logger at the configured level.
    ///
    /// Below Trace, the HTTP and session stack is silenced so exchange and
    /// flow logs from the gateway's own crates stay readable.
    pub fn init_logger(config: &Config) -> Result<(), Box<dyn StdError>> {
        let log_config = Self::build_log_config(Self::ignored_modules(config.log_level_filter));

        simplelog::TermLogger::init(
            config.log_level_filter,
            log_config,
            simplelog::TerminalMode::Mixed,
            simplelog::ColorChoice::Auto,
        )?;

        Ok(())
    }

    fn ignored_modules(level: LevelFilter) -> &'static [&'static str] {
        if level == LevelFilter::Trace {
            &[]
        } else {
            FILTERED_MODULES
        }
    }

    fn build_log_config(ignored: &[&'static str]) -> simplelog::Config {
        let mut builder = ConfigBuilder::new();
        builder.set_time_format_rfc3339();
        for module in ignored {
            builder.add_filter_ignore_str(module);
        }
        builder.build()
    }
}
