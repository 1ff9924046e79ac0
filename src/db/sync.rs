//! Mirror-to-primary reconciliation after a failover window.
//!
//! While the circuit is open the mirror accepts writes, so once the
//! primary recovers it is missing rows. The [`Reconciler`] copies every
//! row whose primary key exists on the mirror but not on the primary,
//! table by table in dependency order, then resets the serial sequences
//! so future primary inserts don't collide with copied ids.
//!
//! Runs are serialized by the `sync_in_progress` flag (600 s TTL so a
//! crashed run self-releases). The in-server path is a supervised task
//! fed by the router's recovery signal; the same logic backs the
//! operator's `sync` subcommand.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tokio::sync::mpsc;

use super::flags::{self, FlagStore};
use super::handle::DbHandle;

/// A table participating in reconciliation.
#[derive(Debug, Clone, Copy)]
pub struct TableSpec {
    /// Table name.
    pub name: &'static str,
    /// Serial primary-key column.
    pub pk: &'static str,
}

/// All synced tables, parents before children so copied rows always find
/// their foreign-key targets.
pub const SYNC_TABLES: &[TableSpec] = &[
    TableSpec {
        name: "customers",
        pk: "id",
    },
    TableSpec {
        name: "categories",
        pk: "id",
    },
    TableSpec {
        name: "promotions",
        pk: "id",
    },
    TableSpec {
        name: "services",
        pk: "id",
    },
    TableSpec {
        name: "bundles",
        pk: "id",
    },
    TableSpec {
        name: "bundle_services",
        pk: "id",
    },
    TableSpec {
        name: "time_slots",
        pk: "id",
    },
    TableSpec {
        name: "carts",
        pk: "id",
    },
    TableSpec {
        name: "cart_lines",
        pk: "id",
    },
    TableSpec {
        name: "reservations",
        pk: "id",
    },
    TableSpec {
        name: "reservation_lines",
        pk: "id",
    },
    TableSpec {
        name: "bank_accounts",
        pk: "id",
    },
];

/// How many missing ids a dry run reports per table.
const DRY_RUN_SAMPLE: usize = 10;

/// Options for one reconciliation run.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Report what would be copied without mutating the primary.
    pub dry_run: bool,
    /// Restrict the run to a single table.
    pub table: Option<String>,
}

/// Per-table result of a run.
#[derive(Debug, Clone, Serialize)]
pub struct TableOutcome {
    /// Table name.
    pub table: &'static str,
    /// Ids present on the mirror but absent on the primary.
    pub missing: u64,
    /// Rows actually copied (0 in a dry run).
    pub copied: u64,
    /// Rows that failed to copy and were skipped.
    pub failed: u64,
    /// First few missing ids, for the dry-run report.
    pub sample_ids: Vec<i64>,
}

/// Aggregate result of a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    /// One outcome per processed table, in processing order.
    pub outcomes: Vec<TableOutcome>,
    /// Whether this was a dry run.
    pub dry_run: bool,
}

impl SyncReport {
    /// Total rows copied across all tables.
    #[must_use]
    pub fn total_copied(&self) -> u64 {
        self.outcomes.iter().map(|o| o.copied).sum()
    }

    /// Total rows that failed to copy.
    #[must_use]
    pub fn total_failed(&self) -> u64 {
        self.outcomes.iter().map(|o| o.failed).sum()
    }

    /// Total missing rows detected.
    #[must_use]
    pub fn total_missing(&self) -> u64 {
        self.outcomes.iter().map(|o| o.missing).sum()
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dry_run {
            writeln!(f, "dry run — no rows were copied")?;
        }
        for outcome in &self.outcomes {
            if outcome.missing == 0 {
                writeln!(f, "{}: in sync", outcome.table)?;
            } else if self.dry_run {
                writeln!(
                    f,
                    "{}: {} missing, sample ids {:?}",
                    outcome.table, outcome.missing, outcome.sample_ids
                )?;
            } else {
                writeln!(
                    f,
                    "{}: {} missing, {} copied, {} failed",
                    outcome.table, outcome.missing, outcome.copied, outcome.failed
                )?;
            }
        }
        write!(
            f,
            "total: {} missing, {} copied, {} failed",
            self.total_missing(),
            self.total_copied(),
            self.total_failed()
        )
    }
}

/// Why a run could not start or complete.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Another run holds the `sync_in_progress` flag.
    #[error("reconciliation already in progress")]
    AlreadyRunning,
    /// `--table` named a table outside the sync list.
    #[error("unknown table: {0}")]
    UnknownTable(String),
    /// A replica failed its connectivity check before the run started.
    #[error("{handle} database unreachable: {detail}")]
    Connectivity {
        /// Which replica failed.
        handle: DbHandle,
        /// Driver error text.
        detail: String,
    },
}

/// Copies mirror-only rows onto the primary.
#[derive(Debug, Clone)]
pub struct Reconciler {
    primary: PgPool,
    mirror: PgPool,
    flags: FlagStore,
    lock_ttl: Duration,
}

impl Reconciler {
    /// Creates a reconciler over the two replica pools.
    #[must_use]
    pub fn new(primary: PgPool, mirror: PgPool, flags: FlagStore, lock_ttl: Duration) -> Self {
        Self {
            primary,
            mirror,
            flags,
            lock_ttl,
        }
    }

    /// Runs one reconciliation pass.
    ///
    /// Row-level copy failures are logged, counted in the report, and
    /// skipped; they do not abort the run.
    ///
    /// # Errors
    ///
    /// [`SyncError::AlreadyRunning`] when the lock flag is held,
    /// [`SyncError::UnknownTable`] for a bad `--table` filter, and
    /// [`SyncError::Connectivity`] when either replica fails the initial
    /// check.
    pub async fn run(&self, opts: &SyncOptions) -> Result<SyncReport, SyncError> {
        let tables = select_tables(opts.table.as_deref())?;

        if !self.flags.try_acquire(flags::SYNC_IN_PROGRESS, self.lock_ttl) {
            return Err(SyncError::AlreadyRunning);
        }
        // Released on every exit path; the TTL covers a crashed process.
        let _guard = LockGuard {
            flags: self.flags.clone(),
        };

        self.check_connectivity(DbHandle::Primary, &self.primary)
            .await?;
        self.check_connectivity(DbHandle::Mirror, &self.mirror)
            .await?;

        tracing::info!(
            dry_run = opts.dry_run,
            tables = tables.len(),
            "reconciliation started"
        );

        let mut report = SyncReport {
            dry_run: opts.dry_run,
            ..SyncReport::default()
        };
        for spec in &tables {
            report.outcomes.push(self.sync_table(spec, opts.dry_run).await);
        }

        if !opts.dry_run && report.total_copied() > 0 {
            self.refresh_sequences(&tables).await;
        }

        tracing::info!(
            copied = report.total_copied(),
            failed = report.total_failed(),
            "reconciliation finished"
        );
        Ok(report)
    }

    async fn check_connectivity(&self, handle: DbHandle, pool: &PgPool) -> Result<(), SyncError> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(pool)
            .await
            .map(|_| ())
            .map_err(|e| SyncError::Connectivity {
                handle,
                detail: e.to_string(),
            })
    }

    /// Reconciles one table; infallible by design, failures land in the
    /// outcome counters.
    async fn sync_table(&self, spec: &TableSpec, dry_run: bool) -> TableOutcome {
        let mut outcome = TableOutcome {
            table: spec.name,
            missing: 0,
            copied: 0,
            failed: 0,
            sample_ids: Vec::new(),
        };

        let (primary_ids, mirror_ids) = match (
            self.fetch_ids(&self.primary, spec).await,
            self.fetch_ids(&self.mirror, spec).await,
        ) {
            (Ok(p), Ok(m)) => (p, m),
            (Err(e), _) | (_, Err(e)) => {
                tracing::error!(table = spec.name, error = %e, "id scan failed, table skipped");
                outcome.failed = 1;
                return outcome;
            }
        };

        let mut missing: Vec<i64> = mirror_ids.difference(&primary_ids).copied().collect();
        missing.sort_unstable();
        outcome.missing = missing.len() as u64;

        if missing.is_empty() {
            tracing::debug!(table = spec.name, "table in sync");
            return outcome;
        }

        outcome.sample_ids = missing.iter().take(DRY_RUN_SAMPLE).copied().collect();
        if dry_run {
            tracing::info!(
                table = spec.name,
                missing = outcome.missing,
                sample = ?outcome.sample_ids,
                "dry run, rows not copied"
            );
            return outcome;
        }

        for id in &missing {
            match self.copy_row(spec, *id).await {
                Ok(()) => outcome.copied += 1,
                Err(e) => {
                    outcome.failed += 1;
                    tracing::warn!(table = spec.name, id, error = %e, "row copy failed, skipped");
                }
            }
        }

        tracing::info!(
            table = spec.name,
            copied = outcome.copied,
            failed = outcome.failed,
            "table reconciled"
        );
        outcome
    }

    /// Copies a single row verbatim, raw column values included, inside
    /// its own transaction on the primary.
    ///
    /// The row travels as `jsonb` so no per-table struct is needed:
    /// `to_jsonb` on the mirror side, `jsonb_populate_record` on the
    /// primary side.
    async fn copy_row(&self, spec: &TableSpec, id: i64) -> Result<(), sqlx::Error> {
        let select = format!("SELECT to_jsonb(t) FROM {} t WHERE {} = $1", spec.name, spec.pk);
        let row: serde_json::Value = sqlx::query_scalar(&select)
            .bind(id)
            .fetch_one(&self.mirror)
            .await?;

        let insert = format!(
            "INSERT INTO {} SELECT * FROM jsonb_populate_record(NULL::{}, $1)",
            spec.name, spec.name
        );
        let mut tx = self.primary.begin().await?;
        sqlx::query(&insert).bind(&row).execute(&mut *tx).await?;
        tx.commit().await
    }

    async fn fetch_ids(&self, pool: &PgPool, spec: &TableSpec) -> Result<HashSet<i64>, sqlx::Error> {
        let sql = format!("SELECT {} FROM {}", spec.pk, spec.name);
        let ids: Vec<i64> = sqlx::query_scalar(&sql).fetch_all(pool).await?;
        Ok(ids.into_iter().collect())
    }

    /// Advances each table's serial sequence to `max(pk)` so the next
    /// primary insert does not collide with a copied id. Per-table
    /// failures are logged and skipped.
    async fn refresh_sequences(&self, tables: &[TableSpec]) {
        for spec in tables {
            let max_sql = format!("SELECT max({}) FROM {}", spec.pk, spec.name);
            let max_id: Option<i64> = match sqlx::query_scalar(&max_sql).fetch_one(&self.primary).await
            {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(table = spec.name, error = %e, "sequence refresh skipped");
                    continue;
                }
            };
            let Some(max_id) = max_id else { continue };

            let result =
                sqlx::query_scalar::<_, i64>("SELECT setval(pg_get_serial_sequence($1, $2), $3, true)")
                    .bind(spec.name)
                    .bind(spec.pk)
                    .bind(max_id)
                    .fetch_one(&self.primary)
                    .await;
            match result {
                Ok(_) => {
                    tracing::info!(table = spec.name, value = max_id, "sequence refreshed");
                }
                Err(e) => {
                    tracing::warn!(table = spec.name, error = %e, "sequence refresh failed");
                }
            }
        }
    }
}

/// Clears the sync flag when the run ends, however it ends.
struct LockGuard {
    flags: FlagStore,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.flags.clear(flags::SYNC_IN_PROGRESS);
    }
}

/// Resolves the table list for a run, honoring the `--table` filter.
fn select_tables(filter: Option<&str>) -> Result<Vec<TableSpec>, SyncError> {
    match filter {
        None => Ok(SYNC_TABLES.to_vec()),
        Some(name) => SYNC_TABLES
            .iter()
            .find(|spec| spec.name == name)
            .map(|spec| vec![*spec])
            .ok_or_else(|| SyncError::UnknownTable(name.to_string())),
    }
}

/// Outcome of the most recent background reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncStatus {
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
    /// Rows copied.
    pub copied: u64,
    /// Rows skipped after copy failures.
    pub failed: u64,
    /// Error text when the run could not complete (or start).
    pub error: Option<String>,
}

/// Shared cell holding the last background sync outcome, surfaced by the
/// system endpoint so reconciliation is observable beyond the logs.
#[derive(Debug, Clone, Default)]
pub struct SyncStatusCell {
    inner: Arc<Mutex<Option<SyncStatus>>>,
}

impl SyncStatusCell {
    /// Records the outcome of a finished run.
    pub fn record(&self, status: SyncStatus) {
        let mut cell = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        *cell = Some(status);
    }

    /// Returns the last recorded outcome, if any.
    #[must_use]
    pub fn get(&self) -> Option<SyncStatus> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Spawns the supervisor that runs a reconciliation for every recovery
/// signal from the router and records the outcome.
pub fn spawn_supervisor(
    reconciler: Arc<Reconciler>,
    mut recovery_rx: mpsc::UnboundedReceiver<()>,
    status: SyncStatusCell,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while recovery_rx.recv().await.is_some() {
            match reconciler.run(&SyncOptions::default()).await {
                Ok(report) => {
                    status.record(SyncStatus {
                        finished_at: Utc::now(),
                        copied: report.total_copied(),
                        failed: report.total_failed(),
                        error: None,
                    });
                }
                Err(SyncError::AlreadyRunning) => {
                    // Another run is live; this trigger is a no-op.
                    tracing::info!("reconciliation trigger ignored, run already in progress");
                }
                Err(e) => {
                    tracing::error!(error = %e, "background reconciliation failed");
                    status.record(SyncStatus {
                        finished_at: Utc::now(),
                        copied: 0,
                        failed: 0,
                        error: Some(e.to_string()),
                    });
                }
            }
        }
        tracing::debug!("sync supervisor stopped, recovery channel closed");
    })
}
