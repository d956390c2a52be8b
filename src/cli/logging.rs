use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::error::Result;

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise `info` for this crate, `debug` when
/// verbose. With `log_file`, output is appended there without ANSI colours.
///
/// Returns `Ok(false)` when a global subscriber was already installed and
/// this call left it in place.
pub fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<bool> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,weather_anomaly={}", default_level)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose);

    let installed = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder
                .with_ansi(false)
                .with_writer(Arc::new(file))
                .try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };

    match installed {
        Ok(()) => Ok(true),
        Err(e) => {
            debug!(error = %e, "logging already initialised, keeping the existing subscriber");
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_second_init_keeps_the_first_subscriber() {
        let dir = TempDir::new().unwrap();
        let log_file = dir.path().join("logs/run.log");

        let _ = init_logging(false, Some(&log_file)).unwrap();
        assert!(log_file.exists());
        assert!(!init_logging(true, None).unwrap());
    }
}
