//! [`ResourceTracker`] – the coordinator's view of every process it has
//! asked the launcher for.
//!
//! Each entry holds the launch spec and a status published on a
//! [`watch`] channel, so a readiness wait can be interrupted the moment the
//! launcher reports the resource as failed.
//!
//! When a [`ResourceCatalog`] is attached, every allocate / status change /
//! release is mirrored to it.  Catalog failures are logged and never fail the
//! tracker operation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use armada_catalog::ResourceCatalog;
use armada_hal::Launcher;
use armada_types::{FleetError, FleetResultExt, LaunchSpec, ResourceId, ResourceStatus};
use tokio::sync::watch;
use tracing::{debug, info, warn};

struct TrackedResource {
    spec: LaunchSpec,
    status: watch::Sender<ResourceStatus>,
}

pub struct ResourceTracker {
    launcher: Arc<dyn Launcher>,
    entries: Mutex<HashMap<ResourceId, TrackedResource>>,
    catalog: Option<Mutex<ResourceCatalog>>,
}

impl ResourceTracker {
    pub fn new(launcher: Arc<dyn Launcher>) -> Self {
        Self {
            launcher,
            entries: Mutex::new(HashMap::new()),
            catalog: None,
        }
    }

    /// Mirror every change into `catalog`.
    pub fn with_catalog(mut self, catalog: ResourceCatalog) -> Self {
        self.catalog = Some(Mutex::new(catalog));
        self
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<ResourceId, TrackedResource>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mirror(&self, op: &str, f: impl FnOnce(&ResourceCatalog) -> Result<(), armada_catalog::CatalogError>) {
        if let Some(catalog) = &self.catalog {
            let catalog = catalog.lock().unwrap_or_else(PoisonError::into_inner);
            if let Err(e) = f(&catalog) {
                warn!(op, error = %e, "resource catalog update failed");
            }
        }
    }

    /// Request `spec` from the launcher.
    ///
    /// An existing entry with an equal spec that has not failed is returned
    /// as is, so re-requesting a running process is idempotent.
    pub async fn allocate(&self, spec: &LaunchSpec) -> Result<ResourceId, FleetError> {
        let existing = self
            .entries()
            .iter()
            .find(|(_, entry)| entry.spec == *spec && *entry.status.borrow() != ResourceStatus::Failed)
            .map(|(id, _)| *id);
        if let Some(id) = existing {
            debug!(resource = %id, spec = %spec, "reusing tracked resource");
            return Ok(id);
        }

        let id = self
            .launcher
            .launch(spec)
            .await
            .with_context(|| format!("launching {spec}"))?;
        let (status, _) = watch::channel(ResourceStatus::Pending);
        self.entries().insert(
            id,
            TrackedResource {
                spec: spec.clone(),
                status,
            },
        );
        self.mirror("record", |c| c.record(id, spec));
        info!(resource = %id, spec = %spec, "resource allocated");
        Ok(id)
    }

    /// Stop `id` and forget it.  The entry is removed even when the launcher
    /// reports an error.
    pub async fn release(&self, id: ResourceId) -> Result<(), FleetError> {
        let removed = self.entries().remove(&id);
        if removed.is_none() {
            return Err(FleetError::NotFound(format!("resource {id} is not tracked")));
        }
        self.mirror("remove", |c| c.remove(id).map(|_| ()));
        self.launcher
            .release(id)
            .await
            .with_context(|| format!("releasing resource {id}"))?;
        info!(resource = %id, "resource released");
        Ok(())
    }

    /// Apply a status notification. Returns whether `id` is tracked.
    pub fn on_status(&self, id: ResourceId, status: ResourceStatus) -> bool {
        let tracked = match self.entries().get(&id) {
            Some(entry) => {
                entry.status.send_replace(status);
                true
            }
            None => false,
        };
        if tracked {
            self.mirror("update_status", |c| c.update_status(id, status));
            debug!(resource = %id, status = status.as_str(), "resource status updated");
        }
        tracked
    }

    pub fn mark_active(&self, id: ResourceId) -> bool {
        self.on_status(id, ResourceStatus::Active)
    }

    pub fn status(&self, id: ResourceId) -> Option<ResourceStatus> {
        self.entries().get(&id).map(|entry| *entry.status.borrow())
    }

    pub fn has_failed(&self, id: ResourceId) -> bool {
        self.status(id) == Some(ResourceStatus::Failed)
    }

    /// Subscribe to status changes of `id`.
    pub fn watch(&self, id: ResourceId) -> Option<watch::Receiver<ResourceStatus>> {
        self.entries().get(&id).map(|entry| entry.status.subscribe())
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tracked resources, ordered by id.
    pub fn snapshot(&self) -> Vec<(ResourceId, LaunchSpec, ResourceStatus)> {
        let mut all: Vec<_> = self
            .entries()
            .iter()
            .map(|(id, entry)| (*id, entry.spec.clone(), *entry.status.borrow()))
            .collect();
        all.sort_by_key(|(id, _, _)| *id);
        all
    }

    /// Release every resource a previous run left in the catalog, then clear
    /// it. Returns how many orphans were found.
    pub async fn release_orphans(&self) -> usize {
        let orphans = match &self.catalog {
            Some(catalog) => {
                let catalog = catalog.lock().unwrap_or_else(PoisonError::into_inner);
                match catalog.list() {
                    Ok(entries) => entries,
                    Err(e) => {
                        warn!(error = %e, "cannot read resource catalog");
                        return 0;
                    }
                }
            }
            None => return 0,
        };

        let tracked: Vec<ResourceId> = self.entries().keys().copied().collect();
        let mut count = 0;
        for orphan in orphans.iter().filter(|o| !tracked.contains(&o.resource_id)) {
            count += 1;
            match self.launcher.release(orphan.resource_id).await {
                Ok(()) => info!(resource = %orphan.resource_id, spec = %orphan.spec, "released orphaned resource"),
                Err(e) => warn!(resource = %orphan.resource_id, error = %e, "orphaned resource could not be released"),
            }
            self.mirror("remove", |c| c.remove(orphan.resource_id).map(|_| ()));
        }
        count
    }

    /// Erase the catalog after a clean shutdown.
    pub fn erase_catalog(&self) {
        self.mirror("clear", |c| c.clear().map(|_| ()));
    }
}
