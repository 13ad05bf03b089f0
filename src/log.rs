// RustPixel
// copyright zipxing@hotmail.com 2022～2025


//! Log module sets up log4rs, reference
//! https://docs.rs/log4rs

use log::LevelFilter;
use log4rs::{
    append::{console::ConsoleAppender, file::FileAppender},
    config::{runtime::ConfigErrors, Appender, Config, Root},
    encode::pattern::PatternEncoder,
    filter::threshold::ThresholdFilter,
};
use thiserror::Error;

const LOG_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S)} {l} {t} {m}{n}";

#[derive(Debug, Error)]
pub enum LogError {
    #[error("log file: {0}")]
    Io(#[from] std::io::Error),
    #[error("log config: {0}")]
    Config(#[from] ConfigErrors),
    #[error("logger already installed: {0}")]
    Init(#[from] log::SetLoggerError),
}

/// Parses a level name from config, unknown names fall back to `Info`.
pub fn parse_level(name: &str) -> LevelFilter {
    name.parse().unwrap_or(LevelFilter::Info)
}

/// init logs system
///
/// Writes to `file_path` at `level`; with `console` set the same records also
/// go to stderr.
pub fn init_log(level: LevelFilter, file_path: &str, console: bool) -> Result<(), LogError> {
    let logfile = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build(file_path)?;
    let mut builder = Config::builder().appender(
        Appender::builder()
            .filter(Box::new(ThresholdFilter::new(level)))
            .build("logfile", Box::new(logfile)),
    );
    let mut root = Root::builder().appender("logfile");
    if console {
        let stderr = ConsoleAppender::builder()
            .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
            .target(log4rs::append::console::Target::Stderr)
            .build();
        builder = builder.appender(
            Appender::builder()
                .filter(Box::new(ThresholdFilter::new(level)))
                .build("console", Box::new(stderr)),
        );
        root = root.appender("console");
    }
    let config = builder.build(root.build(level))?;
    let _handle = log4rs::init_config(config)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_names() {
        assert_eq!(parse_level("debug"), LevelFilter::Debug);
        assert_eq!(parse_level("WARN"), LevelFilter::Warn);
        assert_eq!(parse_level("chatty"), LevelFilter::Info);
    }
}
