//! Subscriber setup for applications assembling resources with this crate.
//!
//! The library itself only emits [`tracing`] events, this module is for binaries that want the
//! usual environment driven configuration.
use std::{path::PathBuf, str::FromStr};

use snafu::{ResultExt, Snafu};
use tracing::Level;
use tracing_appender::rolling::{InitError, RollingFileAppender};
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::{
        self,
        writer::{BoxMakeWriter, MakeWriterExt as _},
    },
    layer::SubscriberExt as _,
    util::{SubscriberInitExt as _, TryInitError},
};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to initialize rolling file appender in {directory:?}"))]
    InitRollingFileAppender {
        source: InitError,
        directory: PathBuf,
    },

    #[snafu(display("unsupported log format {format:?} set in {variable}"))]
    ParseLogFormat {
        source: strum::ParseError,
        format: String,
        variable: String,
    },

    #[snafu(display("failed to install the global tracing subscriber"))]
    InstallSubscriber { source: TryInitError },
}

/// The output format of log lines.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

/// Initializes `tracing` logging with options from the environment variable given in the `env`
/// parameter.
///
/// The variable holds an [`EnvFilter`] directive, e.g. `MY_APP_LOG=k8s_builder=trace`. If it is
/// not set, the maximum log level is INFO.
///
/// Two more variables derived from `env` are read:
///
/// - `{env}_FORMAT` selects the [`LogFormat`] (`plain` or `json`).
/// - `{env}_DIRECTORY` copies the log output into a rotated file named after `app_name` in that
///   directory.
///
/// Fails instead of panicking if a global subscriber is already installed.
pub fn initialize_logging(env: &str, app_name: &str) -> Result<()> {
    let filter = EnvFilter::try_from_env(env)
        .unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string()));

    let format_variable = format!("{env}_FORMAT");
    let format = match std::env::var(&format_variable) {
        Ok(format) => LogFormat::from_str(&format).context(ParseLogFormatSnafu {
            format,
            variable: &format_variable,
        })?,
        Err(_) => LogFormat::default(),
    };

    let file_appender_directory = std::env::var_os(format!("{env}_DIRECTORY")).map(PathBuf::from);
    let file_appender: Option<RollingFileAppender> = file_appender_directory
        .as_deref()
        .map(|directory| {
            RollingFileAppender::builder()
                .filename_suffix(format!("{app_name}.log"))
                .max_log_files(6)
                .build(directory)
                .context(InitRollingFileAppenderSnafu { directory })
        })
        .transpose()?;

    // Stdout always, the rolling file only if a directory is configured
    let writer = match file_appender {
        Some(file_appender) => BoxMakeWriter::new(std::io::stdout.and(file_appender)),
        None => BoxMakeWriter::new(std::io::stdout),
    };
    let (plain, json) = match format {
        LogFormat::Plain => (Some(fmt::layer().with_writer(writer)), None),
        LogFormat::Json => (None, Some(fmt::layer().json().with_writer(writer))),
    };

    Registry::default()
        .with(filter)
        .with(plain)
        .with(json)
        .try_init()
        .context(InstallSubscriberSnafu)?;

    // Logging only works after the subscriber is installed
    match file_appender_directory {
        Some(directory) => {
            tracing::info!(directory = %directory.display(), %format, "file logging enabled");
        }
        None => {
            tracing::debug!(%format, "file logging disabled, because no log directory set");
        }
    }

    Ok(())
}
