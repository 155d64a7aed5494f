//! Migrates the legacy SQLite movie catalog into the normalized `content` schema.
//!
//! Env:
//!   SQLITE_PATH                  legacy file (default db.sqlite)
//!   DATABASE_URL                 full DSN; otherwise DB_HOST/DB_PORT/DB_USERNAME/DB_PASSWORD/DB_DATABASE
//!   DB_SCHEMA                    target schema (default content)
//!   PAGE_SIZE                    rows per insert statement (default 500)
//!   DRY_RUN=1                    extract and normalize, write into memory only
//!   RUST_LOG                     tracing filter (default info)
//!
//! Logs go to stderr; the final report is printed to stdout as JSON.
use std::process::ExitCode;

use anyhow::Result;
use tracing::{error, info};

use movies_etl::config::MigrationConfig;
use movies_etl::error::EtlError;
use movies_etl::models::TargetTable;
use movies_etl::orchestrator::MigrationDriver;
use movies_etl::util::env::init_env;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    init_env();
    movies_etl::tracing::init_tracing("info")?;

    let config = match MigrationConfig::from_env() {
        Ok(config) => config,
        Err(err) => return Ok(aborted(&err)),
    };
    let mut driver = MigrationDriver::new(config);
    let outcome = driver.run().await;
    driver.emit_stage_summary();

    let report = match outcome {
        Ok(report) => report,
        Err(err) => return Ok(aborted(&err)),
    };
    info!(
        dry_run = report.dry_run,
        film_works = report.normalized(TargetTable::FilmWork),
        genres = report.normalized(TargetTable::Genre),
        persons = report.normalized(TargetTable::Person),
        genre_links = report.normalized(TargetTable::GenreFilmWork),
        person_links = report.normalized(TargetTable::PersonFilmWork),
        inserted = report.write.inserted(),
        skipped = report.write.skipped(),
        "migration complete"
    );
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(ExitCode::SUCCESS)
}

/// The one terminal diagnostic of a failed run; the error is not propagated further.
fn aborted(err: &EtlError) -> ExitCode {
    error!(stage = err.stage(), error = %err, "migration aborted");
    ExitCode::FAILURE
}
