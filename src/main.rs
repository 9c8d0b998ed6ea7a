#[macro_use]
extern crate rocket;

mod api;
mod contracts;
mod coordinator;
mod database;
mod db;
mod env;
mod error;
mod forms;
mod models;
mod storage;
mod telemetry;
#[cfg(test)]
mod test;
mod validation;

use api::{
    api_catcher, api_create_applicant, api_create_contract, api_create_specialty,
    api_delete_applicant, api_delete_contract, api_delete_parent, api_get_applicant,
    api_get_applicant_parents, api_get_applicants, api_get_contract, api_get_contracts,
    api_get_dashboard, api_get_news, api_get_specialties, api_save_news, api_search,
    api_update_applicant, api_update_contract, api_upload_scan, health,
};
use env::{ConfigError, Settings, load_environment};
use error::AppError;
use rocket::{Build, Rocket};
use sqlx::SqlitePool;
use storage::{LocalScanStorage, ScanStorage};
use telemetry::{TelemetryError, TelemetryFairing, init_tracing};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("{0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("{0}")]
    Rocket(Box<rocket::Error>),
    #[error("Application error: {0}")]
    App(#[from] AppError),
}

impl From<rocket::Error> for Error {
    fn from(value: rocket::Error) -> Self {
        Error::Rocket(Box::new(value))
    }
}

#[rocket::main]
async fn main() -> Result<(), Error> {
    load_environment()?;
    let settings = Settings::from_env()?;
    let _telemetry_guard = init_tracing(&settings)?;

    info!(database_url = %settings.database_url, "Connecting to database");
    let pool = database::connect(&settings.database_url).await?;

    let storage: Box<dyn ScanStorage> = Box::new(LocalScanStorage::new(&settings.media_root));

    init_rocket(pool, storage, settings).launch().await?;

    Ok(())
}

pub fn init_rocket(
    pool: SqlitePool,
    storage: Box<dyn ScanStorage>,
    settings: Settings,
) -> Rocket<Build> {
    info!("Starting admissions registry");

    rocket::build()
        .manage(pool)
        .manage(storage)
        .manage(settings)
        .mount(
            "/api",
            routes![
                health,
                api_get_applicants,
                api_create_applicant,
                api_get_applicant,
                api_update_applicant,
                api_delete_applicant,
                api_get_applicant_parents,
                api_upload_scan,
                api_get_contracts,
                api_create_contract,
                api_get_contract,
                api_update_contract,
                api_delete_contract,
                api_delete_parent,
                api_get_specialties,
                api_create_specialty,
                api_get_news,
                api_save_news,
                api_get_dashboard,
                api_search,
            ],
        )
        .register("/api", catchers![api_catcher])
        .attach(TelemetryFairing)
}
