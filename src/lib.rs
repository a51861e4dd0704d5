pub mod api;
pub mod app;
pub mod forms;
pub mod messaging;
pub mod notify;
pub mod transport;
pub mod upload;

#[cfg(debug_assertions)]
fn log_level() -> log::LevelFilter {
    log::LevelFilter::Info
}

#[cfg(not(debug_assertions))]
fn log_level() -> log::LevelFilter {
    log::LevelFilter::Off
}

/// Installs the logger once; `RUST_LOG` overrides the build default.
pub fn init_logging() {
    let _ = env_logger::Builder::new()
        .filter_level(log_level())
        .parse_default_env()
        .try_init();
}

#[cfg(not(feature = "coverage"))]
pub fn run() {
    run_with(std::env::args_os().nth(1));
}

#[cfg(not(feature = "coverage"))]
fn run_with(config_path: Option<std::ffi::OsString>) {
    init_logging();
    let Some(path) = config_path else {
        eprintln!("usage: marketplace-client <config.json>");
        return;
    };
    if let Err(error) = app::run(std::path::Path::new(&path)) {
        log::error!("{error}");
        eprintln!("{error}");
    }
}

#[cfg(feature = "coverage")]
pub fn run() {
    init_logging();
}
