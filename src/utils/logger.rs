use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Dependencies stay at info; `verbose` only raises this crate to debug.
fn default_directives(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "info" };
    format!("info,redshift_etl={}", level)
}

/// `RUST_LOG` wins over the defaults.
fn log_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)))
}

fn quiet_layer<S>() -> fmt::Layer<S> {
    fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
}

pub fn init_cli_logger(verbose: bool) {
    tracing_subscriber::registry()
        .with(log_filter(verbose))
        .with(quiet_layer().compact())
        .init();
}

/// JSON lines for log shippers (CloudWatch and friends).
pub fn init_json_logger(verbose: bool) {
    tracing_subscriber::registry()
        .with(log_filter(verbose))
        .with(quiet_layer().json())
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_raises_only_the_loader_level() {
        assert_eq!(default_directives(true), "info,redshift_etl=debug");
        assert_eq!(default_directives(false), "info,redshift_etl=info");
        assert!(EnvFilter::try_new(default_directives(true)).is_ok());
    }
}
