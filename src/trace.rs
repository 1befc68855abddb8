use tracing_subscriber::EnvFilter;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

/// Install the global subscriber. `levels` is an `EnvFilter` directive,
/// e.g. `info` or `http_sd=debug,hyper=info`.
pub fn init(color: bool, json: bool, levels: &str) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_new(levels).unwrap_or_else(|err| {
        // the subscriber is not installed yet
        #[allow(clippy::print_stderr)]
        {
            eprintln!("invalid log level {levels:?}, {err}, fallback to \"info\"");
        }

        EnvFilter::new("info")
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(color)
        .with_target(false);

    if json {
        builder.json().finish().try_init()
    } else {
        builder.finish().try_init()
    }
}
