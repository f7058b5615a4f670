use env_logger::Builder;
use log::LevelFilter;

/// Initialize the logger with a reasonable default configuration
pub fn init_logger() {
    init_logger_with_level(None);
}

/// Initialize the logger, optionally forcing a base level before `RUST_LOG`
/// is applied (used when the config file carries a `logging.level`).
pub fn init_logger_with_level(level: Option<&str>) {
    let mut builder = Builder::new();

    // Start with a default filter level
    builder.filter_level(LevelFilter::Info);

    if let Some(level) = level {
        builder.parse_filters(level);
    }

    // RUST_LOG always wins over the config file
    if let Ok(rust_log) = std::env::var("RUST_LOG") {
        builder.parse_filters(&rust_log);
    }

    // Reduce noise from networking and async runtime
    builder.filter_module("hyper", LevelFilter::Warn);
    builder.filter_module("reqwest", LevelFilter::Warn);
    builder.filter_module("tokio_util", LevelFilter::Warn);

    // try_init so tests can call this repeatedly without panicking
    let _ = builder.try_init();
}
