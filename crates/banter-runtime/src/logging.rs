//! Logging utilities for the Banter runtime.
//!
//! A `tracing-subscriber` registry with an [`EnvFilter`], a console layer on
//! stderr and an optional file layer written through `tracing-appender`.
//!
//! # Manual Initialization
//!
//! ```rust,ignore
//! use banter_runtime::logging::LoggingBuilder;
//!
//! LoggingBuilder::new()
//!     .with_level(tracing::Level::DEBUG)
//!     .directive("banter_framework=trace")
//!     .file_path(layout.log_file())
//!     .try_init()?;
//! ```
//!
//! # Rotation
//!
//! One generation is kept: [`rotate_log`] renames `chatbot.log` to
//! `chatbot.old.log` before the new file is opened.

use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};

use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::ProfileLayout;

/// Console output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    #[cfg(feature = "json-log")]
    Json,
}

/// Moves `current` to `old`, replacing it. A missing `current` is fine.
pub fn rotate_log(current: &Path, old: &Path) -> io::Result<()> {
    match std::fs::rename(current, old) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        result => result,
    }
}

/// A builder for configuring logging.
#[derive(Debug)]
pub struct LoggingBuilder {
    directives: Vec<String>,
    level: tracing::Level,
    format: LogFormat,
    console: bool,
    with_target: bool,
    file_path: Option<PathBuf>,
}

impl Default for LoggingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggingBuilder {
    /// Create a new logging builder.
    pub fn new() -> Self {
        Self {
            directives: Vec::new(),
            level: tracing::Level::INFO,
            format: LogFormat::Compact,
            console: true,
            with_target: true,
            file_path: None,
        }
    }

    /// Logging for a profile: console plus `chatbot.log`, rotated first.
    ///
    /// `verbose` forces the `debug` level; otherwise `level` is used, falling
    /// back to `info` if it does not parse.
    pub fn for_profile(layout: &ProfileLayout, level: &str, verbose: bool) -> io::Result<Self> {
        std::fs::create_dir_all(layout.profile_dir())?;
        rotate_log(&layout.log_file(), &layout.old_log_file())?;

        let level = if verbose {
            tracing::Level::DEBUG
        } else {
            level.parse().unwrap_or(tracing::Level::INFO)
        };
        Ok(Self::new().with_level(level).file_path(layout.log_file()))
    }

    /// Set the global log level.
    pub fn with_level(mut self, level: tracing::Level) -> Self {
        self.level = level;
        self
    }

    /// Add a filter directive.
    ///
    /// ```rust,ignore
    /// builder.directive("banter_runtime=debug")
    ///        .directive("banter_adapter_stub=trace")
    /// ```
    pub fn directive(mut self, directive: &str) -> Self {
        self.directives.push(directive.to_string());
        self
    }

    /// Set the console format.
    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Enable or disable the console layer.
    pub fn console(mut self, enabled: bool) -> Self {
        self.console = enabled;
        self
    }

    /// Include the target (module path) in log output.
    pub fn with_target(mut self, enabled: bool) -> Self {
        self.with_target = enabled;
        self
    }

    /// Also write logs to `path`.
    pub fn file_path(mut self, path: PathBuf) -> Self {
        self.file_path = Some(path);
        self
    }

    /// Build the filter from directives.
    fn build_filter(&self) -> EnvFilter {
        let base_filter = self.level.to_string().to_lowercase();

        // RUST_LOG wins over the configured level
        let mut filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&base_filter));

        for directive in &self.directives {
            if let Ok(d) = directive.parse() {
                filter = filter.add_directive(d);
            }
        }

        filter
    }

    /// Try to initialize the logging system, returning an error on failure.
    pub fn try_init(self) -> Result<(), TryInitError> {
        let filter = self.build_filter();

        let file_layer = self.file_path.as_ref().map(|path| {
            let appender = tracing_appender::rolling::never(
                path.parent().unwrap_or_else(|| Path::new(".")),
                path.file_name().unwrap_or_else(|| OsStr::new("chatbot.log")),
            );
            fmt::layer()
                .with_ansi(false)
                .with_target(self.with_target)
                .with_writer(appender)
        });

        let registry = tracing_subscriber::registry().with(filter).with(file_layer);

        if !self.console {
            return registry.try_init();
        }
        match self.format {
            LogFormat::Compact => registry
                .with(
                    fmt::layer()
                        .compact()
                        .with_target(self.with_target)
                        .with_writer(io::stderr),
                )
                .try_init(),
            LogFormat::Full => registry
                .with(
                    fmt::layer()
                        .with_target(self.with_target)
                        .with_writer(io::stderr),
                )
                .try_init(),
            LogFormat::Pretty => registry
                .with(
                    fmt::layer()
                        .pretty()
                        .with_target(self.with_target)
                        .with_writer(io::stderr),
                )
                .try_init(),
            #[cfg(feature = "json-log")]
            LogFormat::Json => registry
                .with(fmt::layer().json().with_writer(io::stderr))
                .try_init(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotate_keeps_one_generation() {
        let dir = tempfile::tempdir().unwrap();
        let current = dir.path().join("chatbot.log");
        let old = dir.path().join("chatbot.old.log");

        rotate_log(&current, &old).unwrap();
        assert!(!old.exists());

        std::fs::write(&old, "older").unwrap();
        std::fs::write(&current, "previous run").unwrap();
        rotate_log(&current, &old).unwrap();

        assert!(!current.exists());
        assert_eq!(std::fs::read_to_string(&old).unwrap(), "previous run");
    }

    #[test]
    fn test_for_profile_levels() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProfileLayout::new("test", dir.path().join("test"));

        let builder = LoggingBuilder::for_profile(&layout, "warn", false).unwrap();
        assert_eq!(builder.level, tracing::Level::WARN);
        assert_eq!(builder.file_path, Some(layout.log_file()));

        let builder = LoggingBuilder::for_profile(&layout, "warn", true).unwrap();
        assert_eq!(builder.level, tracing::Level::DEBUG);

        let builder = LoggingBuilder::for_profile(&layout, "nonsense", false).unwrap();
        assert_eq!(builder.level, tracing::Level::INFO);
    }
}
