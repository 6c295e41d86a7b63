use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber.
///
/// An explicit filter (`RUST_LOG` or `--log-level`) wins; otherwise `info`,
/// or `debug` in debug mode.
pub fn init_logging(debug: bool, filter: Option<&str>) {
    let filter = filter
        .and_then(|filter| EnvFilter::try_new(filter).ok())
        .unwrap_or_else(|| EnvFilter::new(default_directive(debug)));

    let result = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_line_number(true)
                .with_file(false),
        )
        .try_init();
    if let Err(e) = result {
        eprintln!("Logging already initialised: {e}");
    }
}

fn default_directive(debug: bool) -> &'static str {
    if debug {
        "debug,actix_server=info"
    } else {
        "info"
    }
}
