//! Binary entry point: resolve the settings directory, route logs to a file so
//! they do not corrupt the terminal, then hand control to the Ratatui loop.
use std::fs::{self, OpenOptions};
use std::sync::Mutex;

use people_registry::{run_app, App, Config, Store};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let config = Config::new()?;
    init_logging(&config);

    let mut app = App::new(Store::new(), config);
    app.start();
    run_app(&mut app)
}

/// Log to `people-registry.log` in the config directory. Logging is skipped
/// when that file cannot be opened.
fn init_logging(config: &Config) {
    let log_file = fs::create_dir_all(config.dir()).and_then(|_| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(config.log_path())
    });
    let Ok(log_file) = log_file else {
        return;
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(Mutex::new(log_file))
        .with_ansi(false)
        .init();
}
