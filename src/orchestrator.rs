//! Migration driver: extract → normalize → load, strictly in that order.
use std::cmp::Reverse;
use std::path::Path;
use std::time::{Duration, Instant};

use chrono::Utc;
use indexmap::IndexMap;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::config::MigrationConfig;
use crate::database_ops::{BatchWriter, Db, MemorySink, PageSink, PostgresSink, WriteReport};
use crate::error::{EtlError, EtlResult};
use crate::legacy::{LegacyReader, LegacySnapshot};
use crate::models::{EntityBatch, TargetTable, WRITE_ORDER};
use crate::normalization::normalize;

#[derive(Debug, Clone)]
struct StageTiming {
    name: &'static str,
    elapsed: Duration,
    success: bool,
}

impl StageTiming {
    fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }
}

/// What one completed run produced and wrote.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MigrationReport {
    pub dry_run: bool,
    /// Entities produced per table, in write order.
    pub normalized: IndexMap<TargetTable, usize>,
    pub write: WriteReport,
}

impl MigrationReport {
    fn new(batch: &EntityBatch, write: WriteReport, dry_run: bool) -> Self {
        Self {
            dry_run,
            normalized: WRITE_ORDER.iter().map(|&t| (t, batch.len(t))).collect(),
            write,
        }
    }

    pub fn normalized(&self, table: TargetTable) -> usize {
        self.normalized.get(&table).copied().unwrap_or(0)
    }
}

pub struct MigrationDriver {
    config: MigrationConfig,
    stage_timings: Vec<StageTiming>,
}

impl MigrationDriver {
    pub fn new(config: MigrationConfig) -> Self {
        Self {
            config,
            stage_timings: Vec::new(),
        }
    }

    /// Full run against the configured target (or an in-memory one when `dry_run` is set).
    /// A failure at any stage stops the run; nothing after it executes.
    #[instrument(skip(self), fields(sqlite = %self.config.sqlite_path.display(), dry_run = self.config.dry_run))]
    pub async fn run(&mut self) -> EtlResult<MigrationReport> {
        let batch = self.prepare()?;

        let started = Instant::now();
        let written = if self.config.dry_run {
            let mut sink = MemorySink::new();
            write_batch(&mut sink, &self.config, &batch).await
        } else {
            load_postgres(&self.config, &batch).await
        };
        self.record("load", started, written.is_ok());
        Ok(MigrationReport::new(&batch, written?, self.config.dry_run))
    }

    /// Same pipeline, writing into a caller-owned sink.
    pub async fn run_into<S: PageSink>(&mut self, sink: &mut S) -> EtlResult<MigrationReport> {
        let batch = self.prepare()?;
        let started = Instant::now();
        let written = write_batch(sink, &self.config, &batch).await;
        self.record("load", started, written.is_ok());
        Ok(MigrationReport::new(&batch, written?, self.config.dry_run))
    }

    fn prepare(&mut self) -> EtlResult<EntityBatch> {
        let path = self.config.sqlite_path.clone();
        let snapshot = self.timed("extract", || extract(&path))?;
        let now = Utc::now();
        self.timed("normalize", || normalize(&snapshot, now))
    }

    fn timed<T>(&mut self, name: &'static str, f: impl FnOnce() -> EtlResult<T>) -> EtlResult<T> {
        let started = Instant::now();
        let result = f();
        self.record(name, started, result.is_ok());
        result
    }

    fn record(&mut self, name: &'static str, started: Instant, success: bool) {
        let elapsed = started.elapsed();
        info!(
            target: "metrics",
            stage = name,
            took_ms = format!("{:.2}", elapsed.as_secs_f64() * 1000.0),
            success,
            "stage timing"
        );
        self.stage_timings.push(StageTiming {
            name,
            elapsed,
            success,
        });
    }

    pub fn emit_stage_summary(&self) {
        if self.stage_timings.is_empty() {
            return;
        }
        let mut timings = self.stage_timings.clone();
        timings.sort_by_key(|t| Reverse(t.elapsed));
        let total = timings
            .iter()
            .fold(Duration::ZERO, |acc, timing| acc + timing.elapsed);
        info!(
            target: "metrics",
            stages = timings.len(),
            total_ms = format!("{:.2}", total.as_secs_f64() * 1000.0),
            "migration stage timing summary"
        );
        for timing in timings {
            let pct = if total.as_nanos() == 0 {
                0.0
            } else {
                (timing.elapsed.as_secs_f64() / total.as_secs_f64()) * 100.0
            };
            info!(
                target: "metrics",
                stage = timing.name,
                took_ms = format!("{:.2}", timing.elapsed_ms()),
                pct = format!("{:.1}", pct),
                success = timing.success,
                "stage timing detail"
            );
        }
    }
}

/// Loads the whole legacy store and releases it before anything else happens.
fn extract(path: &Path) -> EtlResult<LegacySnapshot> {
    let reader = LegacyReader::open(path)?;
    let snapshot = reader.load_all();
    let closed = reader.close();
    let snapshot = snapshot?;
    closed?;
    Ok(snapshot)
}

async fn write_batch<S: PageSink>(
    sink: &mut S,
    config: &MigrationConfig,
    batch: &EntityBatch,
) -> EtlResult<WriteReport> {
    BatchWriter::new(sink, config.schema.as_str(), config.page_size)
        .save(batch, &WRITE_ORDER)
        .await
}

/// One transaction for the whole load; the pool is closed on every path.
async fn load_postgres(config: &MigrationConfig, batch: &EntityBatch) -> EtlResult<WriteReport> {
    let url = config.pg_url()?;
    let db = Db::connect(&url, &config.schema).await?;
    let result = load_in_transaction(&db, config, batch).await;
    db.close().await;
    result
}

async fn load_in_transaction(
    db: &Db,
    config: &MigrationConfig,
    batch: &EntityBatch,
) -> EtlResult<WriteReport> {
    let mut tx = db
        .pool
        .begin()
        .await
        .map_err(|source| EtlError::SinkUnavailable {
            action: "begin",
            source,
        })?;

    let written = {
        let mut sink = PostgresSink::new(&mut *tx);
        write_batch(&mut sink, config, batch).await
    };

    match written {
        Ok(report) => {
            tx.commit()
                .await
                .map_err(|source| EtlError::SinkUnavailable {
                    action: "commit",
                    source,
                })?;
            info!(inserted = report.inserted(), skipped = report.skipped(), "transaction committed");
            Ok(report)
        }
        Err(err) => {
            if let Err(rollback) = tx.rollback().await {
                warn!(error = %rollback, "rollback failed; connection is dropped with the pool");
            }
            Err(err)
        }
    }
}
