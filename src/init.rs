// Logging/tracing setup

use obs2arrow_config::{LogFormat, RuntimeSettings};

/// Initialize tracing/logging from the runtime settings
pub fn init_tracing(settings: &RuntimeSettings) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter =
        EnvFilter::try_new(&settings.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    // Logs go to stderr so stdout stays free for batch summaries.
    // Ignore the error if a subscriber is already set.
    let _ = match settings.log_format {
        LogFormat::Json => tracing::subscriber::set_global_default(
            registry.with(fmt::layer().json().with_writer(std::io::stderr)),
        ),
        LogFormat::Text => tracing::subscriber::set_global_default(
            registry.with(fmt::layer().with_writer(std::io::stderr)),
        ),
    };
}
