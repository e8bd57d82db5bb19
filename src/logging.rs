use std::io;

/// Map the `-v` count to a filter unless `RUST_LOG` is set
fn filter_directives(verbose_level: u8) -> &'static str {
    match verbose_level {
        0 => "warn,repair_advisor=warn",
        1 => "warn,repair_advisor=info",
        2 => "info,repair_advisor=debug",
        _ => "debug,repair_advisor=trace",
    }
}

/// Log to stderr so stdout carries only the conversation
pub fn setup_logging(verbose_level: u8) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::EnvFilter::from_default_env()
    } else {
        tracing_subscriber::EnvFilter::new(filter_directives(verbose_level))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_level(true)
        .with_writer(io::stderr)
        .init();
}
