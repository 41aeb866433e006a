use env_logger::Env;
use log::{error, info, warn};

use employee_addresses::config::ExportConfig;
use employee_addresses::env_loader;
use employee_addresses::pipeline;
use employee_addresses::tabular::SourceError;

#[tokio::main]
async fn main() {
    let env_file = env_loader::load_env();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    match env_file {
        Ok(Some(path)) => info!("Loaded environment variables from {}", path),
        Ok(None) => info!("No .env file found, using defaults and system environment variables"),
        Err(e) => warn!("Failed to load .env file: {:#}", e),
    }

    info!("Starting employee address export.");
    let config = ExportConfig::from_env();
    info!(
        "Address sheet: {:?}, HR export: {:?}, output: {:?}",
        config.address_sheet_path, config.hr_export_path, config.output_path
    );

    match pipeline::run(&config).await {
        Ok(summary) => {
            if let Some(geocoding) = summary.geocoding {
                info!(
                    "Geocoded {} of {} addresses ({} skipped)",
                    geocoding.geocoded, geocoding.attempted, geocoding.skipped
                );
            }
            info!("Export completed: {} addresses written to {:?}", summary.records, config.output_path);
        }
        Err(e) => {
            error!("Export failed: {:#}", e);
            if let Some(hint) = e.downcast_ref::<SourceError>().and_then(SourceError::hint) {
                error!("{}", hint);
            }
            std::process::exit(1);
        }
    }
}
