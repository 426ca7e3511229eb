//! Persistent resource catalog.
//!
//! Mirrors the coordinator's resource tracker into SQLite so that processes
//! started by a run that crashed can be found and released by the next run.
//!
//! # Storage layout
//!
//! A single table `fleet_resources`:
//!
//! | column      | type    | description                                   |
//! |-------------|---------|-----------------------------------------------|
//! | id          | INTEGER | Launcher-issued resource id (primary key)     |
//! | package     | TEXT    | Launch package                                |
//! | executable  | TEXT    | Launch executable                             |
//! | args        | TEXT    | Launch arguments                              |
//! | namespace   | TEXT    | Namespace the process runs in                 |
//! | status      | TEXT    | One of `"pending"`, `"active"`, `"failed"`    |
//! | updated_at  | TEXT    | RFC-3339 last-update timestamp (UTC)          |
//!
//! # Example
//!
//! ```rust
//! use armada_catalog::ResourceCatalog;
//! use armada_types::{LaunchSpec, ResourceId, ResourceStatus};
//!
//! let catalog = ResourceCatalog::open_in_memory().unwrap();
//! let spec = LaunchSpec::new("arm_pkg", "arm_driver", "", "/lab/robot_manager/robots/arm1");
//!
//! catalog.record(ResourceId(1), &spec).unwrap();
//! catalog.update_status(ResourceId(1), ResourceStatus::Active).unwrap();
//! assert_eq!(catalog.get(ResourceId(1)).unwrap().status, ResourceStatus::Active);
//!
//! catalog.remove(ResourceId(1)).unwrap();
//! assert!(catalog.list().unwrap().is_empty());
//! ```

use std::path::Path;

use armada_types::{LaunchSpec, ResourceId, ResourceStatus};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Resource not in catalog: {0}")]
    NotFound(ResourceId),
    #[error("Corrupt catalog row {id}: {details}")]
    Corrupt { id: i64, details: String },
}

// ─────────────────────────────────────────────────────────────────────────────
// CatalogEntry
// ─────────────────────────────────────────────────────────────────────────────

/// One outstanding resource as last recorded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogEntry {
    pub resource_id: ResourceId,
    pub spec: LaunchSpec,
    pub status: ResourceStatus,
    pub updated_at: DateTime<Utc>,
}

// ─────────────────────────────────────────────────────────────────────────────
// ResourceCatalog
// ─────────────────────────────────────────────────────────────────────────────

pub struct ResourceCatalog {
    conn: Connection,
}

impl ResourceCatalog {
    /// Open (or create) a catalog file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let conn = Connection::open(path)?;
        let catalog = Self { conn };
        catalog.init_schema()?;
        Ok(catalog)
    }

    pub fn open_in_memory() -> Result<Self, CatalogError> {
        let conn = Connection::open_in_memory()?;
        let catalog = Self { conn };
        catalog.init_schema()?;
        Ok(catalog)
    }

    fn init_schema(&self) -> Result<(), CatalogError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS fleet_resources (
                id          INTEGER NOT NULL PRIMARY KEY,
                package     TEXT NOT NULL,
                executable  TEXT NOT NULL,
                args        TEXT NOT NULL,
                namespace   TEXT NOT NULL,
                status      TEXT NOT NULL DEFAULT 'pending',
                updated_at  TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    /// Record a freshly allocated resource as `pending`. Re-recording an id
    /// replaces the previous row.
    pub fn record(&self, id: ResourceId, spec: &LaunchSpec) -> Result<(), CatalogError> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT OR REPLACE INTO fleet_resources
                (id, package, executable, args, namespace, status, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                to_sql_id(id),
                spec.package,
                spec.executable,
                spec.args,
                spec.namespace,
                ResourceStatus::Pending.as_str(),
                now
            ],
        )?;
        debug!(resource = %id, spec = %spec, "catalog: recorded");
        Ok(())
    }

    /// Update the status of a recorded resource.
    ///
    /// Returns [`CatalogError::NotFound`] if `id` was never recorded.
    pub fn update_status(&self, id: ResourceId, status: ResourceStatus) -> Result<(), CatalogError> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE fleet_resources SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.as_str(), now, to_sql_id(id)],
        )?;
        if changed == 0 {
            return Err(CatalogError::NotFound(id));
        }
        Ok(())
    }

    /// Forget a released resource. Returns whether a row was removed.
    pub fn remove(&self, id: ResourceId) -> Result<bool, CatalogError> {
        let changed = self
            .conn
            .execute("DELETE FROM fleet_resources WHERE id = ?1", params![to_sql_id(id)])?;
        Ok(changed > 0)
    }

    pub fn get(&self, id: ResourceId) -> Result<CatalogEntry, CatalogError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, package, executable, args, namespace, status, updated_at
             FROM fleet_resources WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(params![to_sql_id(id)], read_row)?;
        let raw = rows.next().ok_or(CatalogError::NotFound(id))??;
        raw.into_entry()
    }

    /// Every recorded resource, oldest id first.
    pub fn list(&self) -> Result<Vec<CatalogEntry>, CatalogError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, package, executable, args, namespace, status, updated_at
             FROM fleet_resources ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([], read_row)?;
        let mut entries = Vec::new();
        for raw in rows {
            entries.push(raw?.into_entry()?);
        }
        Ok(entries)
    }

    /// Erase every row. Returns how many were removed.
    pub fn clear(&self) -> Result<usize, CatalogError> {
        Ok(self.conn.execute("DELETE FROM fleet_resources", [])?)
    }
}

fn to_sql_id(id: ResourceId) -> i64 {
    // Launcher ids are issued sequentially from 1 and never approach i64::MAX.
    id.0 as i64
}

struct RawRow {
    id: i64,
    package: String,
    executable: String,
    args: String,
    namespace: String,
    status: String,
    updated_at: String,
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok(RawRow {
        id: row.get(0)?,
        package: row.get(1)?,
        executable: row.get(2)?,
        args: row.get(3)?,
        namespace: row.get(4)?,
        status: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

impl RawRow {
    fn into_entry(self) -> Result<CatalogEntry, CatalogError> {
        let status = ResourceStatus::parse(&self.status).ok_or_else(|| CatalogError::Corrupt {
            id: self.id,
            details: format!("unknown status '{}'", self.status),
        })?;
        let updated_at = DateTime::parse_from_rfc3339(&self.updated_at)
            .map_err(|e| CatalogError::Corrupt {
                id: self.id,
                details: format!("bad timestamp '{}': {e}", self.updated_at),
            })?
            .with_timezone(&Utc);
        Ok(CatalogEntry {
            resource_id: ResourceId(self.id as u64),
            spec: LaunchSpec {
                package: self.package,
                executable: self.executable,
                args: self.args,
                namespace: self.namespace,
            },
            status,
            updated_at,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
