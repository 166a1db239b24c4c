use crate::error::{CliError, Result};
use std::fs::File;
use std::path::Path;
use tracing_subscriber::{
    filter::{LevelFilter, Targets},
    fmt::{self, time::Uptime},
    prelude::*,
};

/// Target prefix of every event emitted by the scoring library and this binary.
const RXNALIGN_TARGET: &str = "rxnalign";

/// Levels for the two log sinks, derived from the `-v`, `-q` and `--log-file` flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogLevels {
    pub console: LevelFilter,
    /// Never quieter than `INFO`: `-q` only silences the console.
    pub file: LevelFilter,
}

impl LogLevels {
    pub fn from_flags(verbosity: u8, quiet: bool) -> Self {
        let console = match (quiet, verbosity) {
            (true, _) => LevelFilter::ERROR,
            (false, 0) => LevelFilter::WARN,
            (false, 1) => LevelFilter::INFO,
            (false, 2) => LevelFilter::DEBUG,
            (false, _) => LevelFilter::TRACE,
        };
        Self {
            console,
            file: console.max(LevelFilter::INFO),
        }
    }
}

/// rxnalign events pass at `level`; dependencies are held to warnings and errors.
fn sink_filter(level: LevelFilter) -> Targets {
    Targets::new()
        .with_target(RXNALIGN_TARGET, level)
        .with_default(level.min(LevelFilter::WARN))
}

/// Installs the global subscriber. The console gets compact, untimed lines; the optional
/// log file gets full lines with targets and the time since start-up.
pub fn setup_logging(levels: LogLevels, log_file: Option<&Path>) -> Result<()> {
    let file_layer = match log_file {
        Some(path) => {
            let file = File::create(path).map_err(CliError::Io)?;
            let layer = fmt::layer()
                .with_writer(file)
                .with_ansi(false)
                .with_timer(Uptime::default())
                .with_filter(sink_filter(levels.file));
            Some(layer)
        }
        None => None,
    };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .compact()
        .with_filter(sink_filter(levels.console));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::path::PathBuf;
    use std::sync::Once;
    use tracing::{Level, debug, error, info, trace, warn};

    static INIT: Once = Once::new();

    fn ensure_global_logger_is_set() {
        INIT.call_once(|| {
            setup_logging(LogLevels::from_flags(3, false), None)
                .expect("Failed to set up global logger for tests");
        });
    }

    #[test]
    fn verbosity_flags_select_console_and_file_levels() {
        let quiet = LogLevels::from_flags(0, true);
        assert_eq!(quiet.console, LevelFilter::ERROR);
        assert_eq!(quiet.file, LevelFilter::INFO);

        assert_eq!(LogLevels::from_flags(0, false).console, LevelFilter::WARN);
        assert_eq!(LogLevels::from_flags(1, false).console, LevelFilter::INFO);

        let debug = LogLevels::from_flags(2, false);
        assert_eq!(debug.console, LevelFilter::DEBUG);
        assert_eq!(debug.file, LevelFilter::DEBUG);

        assert_eq!(LogLevels::from_flags(9, false).file, LevelFilter::TRACE);
    }

    #[test]
    fn dependencies_are_held_to_warnings() {
        let filter = sink_filter(LevelFilter::DEBUG);
        assert!(filter.would_enable("rxnalign::engine::optimizer", &Level::DEBUG));
        assert!(!filter.would_enable("rxnalign::engine::optimizer", &Level::TRACE));
        assert!(filter.would_enable("argmin::core", &Level::WARN));
        assert!(!filter.would_enable("argmin::core", &Level::INFO));

        let quiet = sink_filter(LevelFilter::ERROR);
        assert!(!quiet.would_enable("argmin::core", &Level::WARN));
    }

    #[test]
    #[serial]
    fn global_logger_accepts_every_level() {
        ensure_global_logger_is_set();

        error!("Scoring failed.");
        warn!("Degenerate rotation accepted.");
        info!("Scoring finished.");
        debug!("Outer iteration complete.");
        trace!("Line search step.");
    }

    #[test]
    #[serial]
    fn quiet_runs_still_record_progress_in_the_log_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_path = temp_dir.path().join("score.log");

        let levels = LogLevels::from_flags(0, true);
        let file = File::create(&log_path).unwrap();
        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_timer(Uptime::default())
            .with_filter(sink_filter(levels.file));
        let subscriber = tracing_subscriber::registry().with(file_layer);

        tracing::subscriber::with_default(subscriber, || {
            let span = tracing::info_span!(target: "rxnalign::workflows::score", "score_reaction");
            let _guard = span.enter();
            info!(target: "rxnalign::workflows::score", pairs = 12, "Scoring finished.");
            debug!(target: "rxnalign::engine::optimizer", "Outer iteration complete.");
            info!(target: "argmin::core", "Solver state dump.");
        });

        let content = std::fs::read_to_string(log_path).unwrap();
        assert!(content.contains("score_reaction"));
        assert!(content.contains("Scoring finished."));
        assert!(content.contains("pairs=12"));
        assert!(content.contains("rxnalign::workflows::score"));
        assert!(!content.contains("Outer iteration complete."));
        assert!(!content.contains("Solver state dump."));
    }

    #[test]
    #[serial]
    fn unwritable_log_file_is_reported_before_installing() {
        let invalid_path = PathBuf::from("/");

        if cfg!(unix) && invalid_path.is_dir() {
            let result = setup_logging(LogLevels::from_flags(0, false), Some(&invalid_path));
            assert!(matches!(result, Err(CliError::Io(_))));
        }
    }
}
