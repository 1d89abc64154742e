// =============================================================================
// vt-greeter — Entry Point
//
// Parses the handful of command-line flags, initializes logging, loads
// configuration and locale, and hands off to the main loop. Exit codes
// follow the taxonomy in SPEC_FULL.md §6: 0 on a clean quit, 1 on a setup
// failure that kept the form from ever being shown.
// =============================================================================

mod auth;
mod config;
mod credential;
mod desktop;
mod error;
mod form;
mod locale;
mod mainloop;
mod save;
mod session;
mod tty;
mod ui;
mod utmp;

use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

use config::Config;
use locale::Locale;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut config_path: Option<PathBuf> = None;
    for arg in &args {
        match arg.as_str() {
            "-v" | "--version" => {
                println!("vt-greeter {VERSION}");
                return;
            }
            other => config_path = Some(PathBuf::from(other)),
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vt_greeter=info")))
        .init();

    tracing::info!(version = VERSION, "vt-greeter starting up");

    let config_path = config_path.unwrap_or_else(|| PathBuf::from(config::DEFAULT_CONFIG_PATH));
    let config = Config::load(&config_path);
    let locale = Locale::load(&config.datadir, &config.lang);

    let code = mainloop::run(&config, &locale);
    tracing::info!(code, "vt-greeter exiting");
    std::process::exit(code);
}
