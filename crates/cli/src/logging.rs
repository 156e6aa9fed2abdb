use anyhow::Result;
use cinema_core::tracing::{InstrumentationConfig, init_tracing};
use std::path::Path;
use tracing::Level;

/// Initialize logging for the CLI
///
/// Logs go to stderr and, unless `no_file_log` is set, to `cli.log` in the
/// data directory.
pub fn init_logging(log_level: Level, data_dir: &Path, no_file_log: bool) -> Result<()> {
    let mut config = InstrumentationConfig::from_env().with_log_level(level_filter(log_level));
    if !no_file_log {
        config = config.with_log_file(data_dir.join("cli.log"));
    }
    init_tracing(&config)
}

fn level_filter(level: Level) -> String {
    let level = level.as_str().to_lowercase();
    format!("cinema={level},cinema_http={level},cinema_core={level}")
}
