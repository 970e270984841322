use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Level used when `RUST_LOG` does not take over.
pub fn default_level(debug: bool) -> &'static str {
    if debug {
        "debug"
    } else {
        "info"
    }
}

/// Initialise logging. The level is `debug` when debug logging was requested
/// through the settings file or `--debug`, `info` otherwise. `RUST_LOG` can
/// override the level only while debug logging is enabled.
///
/// When `log_file` is given the output is written to that file instead of
/// stderr.
pub fn init(debug: bool, log_file: Option<PathBuf>) {
    let level = default_level(debug);

    // Without debug logging we pin `info` so a stray `RUST_LOG` in the user's
    // environment cannot turn the overlay chatty.
    let filter = if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    } else {
        EnvFilter::new(level)
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let file_writer = log_file.and_then(|path| {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let name = path.file_name()?.to_os_string();
        Some(tracing_appender::rolling::never(dir, name))
    });

    let _ = match file_writer {
        Some(writer) => builder.with_ansi(false).with_writer(writer).try_init(),
        None => builder.with_writer(std::io::stderr).try_init(),
    };
}
