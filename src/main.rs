use std::process::ExitCode;

use pushkind_directory::db::{establish_connection_pool, run_migrations};
use pushkind_directory::geocoder::HttpGeocoder;
use pushkind_directory::models::config::DirectoryConfig;

/// Prepares the directory database: loads configuration, applies pending
/// migrations and reports the locales the deployment will serve.
fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config_path = std::env::args().nth(1);
    let config = match DirectoryConfig::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            log::error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let locales = match config.locale_registry() {
        Ok(locales) => locales,
        Err(e) => {
            log::error!("Invalid locale settings: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = HttpGeocoder::new(&config.geocoder) {
        log::error!("Failed to build geocoder client: {e}");
        return ExitCode::FAILURE;
    }

    let pool = match establish_connection_pool(&config.database_url) {
        Ok(pool) => pool,
        Err(e) => {
            log::error!("Failed to establish database connection: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run_migrations(&pool) {
        Ok(applied) => log::info!("Applied {applied} pending migrations"),
        Err(e) => {
            log::error!("Failed to run migrations: {e}");
            return ExitCode::FAILURE;
        }
    }

    let supported: Vec<&str> = locales
        .all_supported_locales()
        .map(|locale| locale.as_str())
        .collect();
    log::info!(
        "Directory database ready; serving locales [{}] (default {}, fallback {}), geocoder at {}",
        supported.join(", "),
        locales.default_locale(),
        locales.fallback_locale(),
        config.geocoder.url
    );

    ExitCode::SUCCESS
}
