use std::path::PathBuf;
use std::process::ExitCode;

use log::{debug, error, info, warn};
use storybook_rs::app;
use storybook_rs::config::{AppConfig, DEFAULT_CONFIG_PATH};

/// Config path: first argument, then `STORYBOOK_CONFIG`, then `config.json`.
fn config_path() -> PathBuf {
    std::env::args_os()
        .nth(1)
        .or_else(|| std::env::var_os("STORYBOOK_CONFIG"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn main() -> ExitCode {
    let dotenv = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match dotenv {
        Ok(path) => debug!(" Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => warn!(" Ignoring .env file: {}", e),
    }

    info!(" Starting storybook v{}", env!("CARGO_PKG_VERSION"));

    let result = AppConfig::load(&config_path()).and_then(|mut config| {
        config.apply_credentials(|name| std::env::var(name).ok());
        app::run(config)
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(" {}", e);
            ExitCode::FAILURE
        }
    }
}
