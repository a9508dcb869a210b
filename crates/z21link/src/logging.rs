use clap::ValueEnum;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Target prefix shared by every z21link crate (`z21link_station`, ...).
const CRATE_TARGET: &str = "z21link";

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// `level` for the z21link crates. Dependencies never log below warn.
fn targets(level: LogLevel) -> Targets {
    let level = level.as_filter();
    Targets::new()
        .with_target(CRATE_TARGET, level)
        .with_default(level.min(LevelFilter::WARN))
}

/// Log to stderr so stdout carries only command output.
///
/// The target is kept so station, transport and frame events can be told apart.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let filter = targets(level);
    let layer = fmt::layer().with_writer(std::io::stderr).with_ansi(false);

    // A subscriber installed by an embedding process wins.
    let _ = match format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(layer.with_filter(filter))
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(layer.json().with_filter(filter))
            .try_init(),
    };
}

#[cfg(test)]
mod tests {
    use tracing::Level;

    use super::*;

    #[test]
    fn crate_targets_follow_requested_level() {
        let filter = targets(LogLevel::Debug);
        assert!(filter.would_enable("z21link_station::station", &Level::DEBUG));
        assert!(filter.would_enable("z21link_transport::udp", &Level::DEBUG));
        assert!(!filter.would_enable("z21link_station::router", &Level::TRACE));
    }

    #[test]
    fn dependencies_stay_at_warn() {
        let filter = targets(LogLevel::Trace);
        assert!(!filter.would_enable("tokio::net", &Level::DEBUG));
        assert!(filter.would_enable("tokio::net", &Level::WARN));

        let quiet = targets(LogLevel::Error);
        assert!(!quiet.would_enable("tokio::net", &Level::WARN));
        assert!(quiet.would_enable("z21link", &Level::ERROR));
    }
}
