use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// trace | debug | info | warn | error
    #[serde(default = "default_level")]
    pub level: String,

    /// Log file name; empty or missing disables file output.
    #[serde(default)]
    pub file_name: Option<String>,

    /// Directory for the log file, defaults to `<data_dir>/accesscontrol/logs`.
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_name: None,
            directory: None,
        }
    }
}

impl LoggingSettings {
    /// Unknown level names fall back to `info`.
    pub fn level_filter(&self) -> LevelFilter {
        match self.level.to_lowercase().as_str() {
            "off" => LevelFilter::OFF,
            "trace" => LevelFilter::TRACE,
            "debug" => LevelFilter::DEBUG,
            "info" => LevelFilter::INFO,
            "warn" => LevelFilter::WARN,
            "error" => LevelFilter::ERROR,
            _ => LevelFilter::INFO,
        }
    }

    fn file_target(&self) -> Option<(PathBuf, String)> {
        let file_name = self.file_name.as_ref().filter(|name| !name.is_empty())?;
        let directory = self.directory.clone().or_else(|| {
            dirs::data_dir().map(|dir| dir.join("accesscontrol").join("logs"))
        })?;
        Some((directory, file_name.clone()))
    }
}

/// Install the global subscriber: stderr always, plus a plain-text file when configured.
///
/// The returned guard flushes the file writer on drop and must be held for
/// the life of the process. Returns `None` without a file target or when a
/// subscriber is already installed.
pub fn init_tracing(settings: &LoggingSettings, level: Option<LevelFilter>) -> Option<WorkerGuard> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::Layer;

    let level = level.unwrap_or_else(|| settings.level_filter());

    let (file_layer, guard) = match settings.file_target() {
        Some((directory, file_name)) => match std::fs::create_dir_all(&directory) {
            Ok(()) => {
                let file_appender = tracing_appender::rolling::never(&directory, file_name);
                let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
                let layer = fmt::layer()
                    .with_writer(non_blocking)
                    .with_ansi(false)
                    .with_filter(level);
                (Some(layer), Some(guard))
            }
            Err(e) => {
                eprintln!("Failed to create log directory {:?}: {}", directory, e);
                (None, None)
            }
        },
        None => (None, None),
    };

    let subscriber = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_filter(level))
        .with(file_layer);

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return None;
    }
    guard
}
