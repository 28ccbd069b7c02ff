//! Deduplicating, notifying store for everything a scan discovers.
//!
//! Producers call [`ItemRepository::add`] (or [`ItemRepository::ingest_disk`]
//! for a whole parsed disk) from any thread. Consumers subscribe to
//! [`RepositoryEvent`]s and re-read the sorted accessors when one arrives.

use serde::Serialize;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use utilities_core::{
    now_utc_rfc3339, Application, Disk, Installer, ModelCompatibility, Record, Volume,
    INVENTORY_SCHEMA_VERSION,
};

/// Fired once per accepted insert. Carries no data; re-query the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryEvent {
    NewDisk,
    NewVolume,
    NewInstaller,
    NewApplication,
}

#[derive(Debug, Clone)]
pub enum Item {
    Disk(Disk),
    Volume(Volume),
    Installer(Installer),
    Application(Application),
}

impl Item {
    pub fn id(&self) -> &str {
        match self {
            Item::Disk(disk) => &disk.id,
            Item::Volume(volume) => &volume.id,
            Item::Installer(installer) => &installer.id,
            Item::Application(application) => &application.id,
        }
    }

    fn event(&self) -> RepositoryEvent {
        match self {
            Item::Disk(_) => RepositoryEvent::NewDisk,
            Item::Volume(_) => RepositoryEvent::NewVolume,
            Item::Installer(_) => RepositoryEvent::NewInstaller,
            Item::Application(_) => RepositoryEvent::NewApplication,
        }
    }
}

#[derive(Debug, Default)]
struct Store {
    disks: Vec<Disk>,
    volumes: Vec<Volume>,
    installers: Vec<Installer>,
    applications: Vec<Application>,
}

impl Store {
    fn contains(&self, item: &Item) -> bool {
        let id = item.id();
        match item {
            Item::Disk(_) => self.disks.iter().any(|d| d.id == id),
            Item::Volume(_) => self.volumes.iter().any(|v| v.id == id),
            Item::Installer(_) => self.installers.iter().any(|i| i.id == id),
            Item::Application(_) => self.applications.iter().any(|a| a.id == id),
        }
    }

    fn push(&mut self, item: Item) {
        match item {
            Item::Disk(disk) => self.disks.push(disk),
            Item::Volume(volume) => self.volumes.push(volume),
            Item::Installer(installer) => self.installers.push(installer),
            Item::Application(application) => self.applications.push(application),
        }
    }

    fn len(&self) -> usize {
        self.disks.len() + self.volumes.len() + self.installers.len() + self.applications.len()
    }
}

/// Sorted copy of every item kind, ready for serialization.
#[derive(Debug, Clone, Serialize)]
pub struct InventorySnapshot {
    pub schema_version: String,
    pub taken_at_utc: String,
    pub disks: Vec<Disk>,
    pub volumes: Vec<Volume>,
    pub installers: Vec<Installer>,
    pub applications: Vec<Application>,
}

#[derive(Debug, Default)]
pub struct ItemRepository {
    store: RwLock<Store>,
    subscribers: Mutex<Vec<Sender<RepositoryEvent>>>,
}

impl ItemRepository {
    pub fn new() -> Self {
        tracing::info!("item repository initialized");
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Store> {
        self.store.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Store> {
        self.store.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe(&self) -> Receiver<RepositoryEvent> {
        let (tx, rx) = channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    // Called with the store write lock held so subscribers see commit order.
    fn notify(&self, event: RepositoryEvent) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.send(event).is_ok());
    }

    /// Stores the item unless one of the same kind already has its id.
    /// Returns whether it was accepted.
    pub fn add(&self, item: Item) -> bool {
        let mut store = self.write();
        if store.contains(&item) {
            tracing::debug!(id = item.id(), "duplicate {:?} ignored", item.event());
            return false;
        }
        let event = item.event();
        tracing::info!(id = item.id(), "adding {:?}", event);
        store.push(item);
        self.notify(event);
        true
    }

    pub fn add_disk(&self, disk: Disk) -> bool {
        self.add(Item::Disk(disk))
    }

    pub fn add_volume(&self, volume: Volume) -> bool {
        self.add(Item::Volume(volume))
    }

    pub fn add_installer(&self, installer: Installer) -> bool {
        self.add(Item::Installer(installer))
    }

    pub fn add_application(&self, application: Application) -> bool {
        if application.is_utility {
            tracing::debug!("utility candidate {}", application);
        }
        self.add(Item::Application(application))
    }

    /// Registers a parsed disk tree: each valid volume's installer, then the
    /// volume, then the disk itself. Invalid volumes are skipped.
    pub fn ingest_disk(&self, disk: &Disk) {
        for volume in &disk.volumes {
            if !volume.is_valid() && !volume.parent_disk.is_fake {
                tracing::debug!(volume = %volume.volume_name, "skipping invalid volume");
                continue;
            }
            if let Some(installer) = &volume.installer {
                self.add_installer(installer.clone());
            }
            self.add_volume(volume.clone());
        }
        self.add_disk(disk.clone());
    }

    /// Registers a standalone volume, such as a network share, when valid.
    pub fn ingest_volume(&self, volume: &Volume) -> bool {
        if !volume.is_valid() {
            return false;
        }
        if let Some(installer) = &volume.installer {
            self.add_installer(installer.clone());
        }
        self.add_volume(volume.clone())
    }

    /// Applies APFS metadata to a stored volume and to the copy its owning
    /// disk holds. A newly attached installer is registered too. Returns false
    /// when no volume has that id.
    pub fn refresh_volume<'a>(
        &self,
        volume_id: &str,
        records: impl IntoIterator<Item = &'a Record>,
        compat: &ModelCompatibility,
    ) -> bool {
        let attached = {
            let mut store = self.write();
            let Store { disks, volumes, .. } = &mut *store;
            let Some(volume) = volumes.iter_mut().find(|v| v.id == volume_id) else {
                return false;
            };
            let attached = volume.update_with_apfs_data(records, compat);
            let owned = disks
                .iter_mut()
                .filter(|d| d.id == volume.parent_disk.id)
                .flat_map(|d| d.volumes.iter_mut())
                .find(|v| v.id == volume_id);
            if let Some(owned) = owned {
                *owned = volume.clone();
            }
            if attached {
                volume.installer.clone()
            } else {
                None
            }
        };
        if let Some(installer) = attached {
            self.add_installer(installer);
        }
        true
    }

    pub fn get_disks(&self) -> Vec<Disk> {
        let mut disks = self.read().disks.clone();
        disks.sort_by(|a, b| a.device_identifier.cmp(&b.device_identifier));
        disks
    }

    pub fn get_volumes(&self) -> Vec<Volume> {
        let mut volumes = self.read().volumes.clone();
        volumes.sort_by(|a, b| a.volume_name.cmp(&b.volume_name));
        volumes
    }

    /// Sorted by version number as plain strings, so "10.9" follows "10.14".
    pub fn get_installers(&self) -> Vec<Installer> {
        let mut installers = self.read().installers.clone();
        installers.sort_by(|a, b| a.version_number.cmp(&b.version_number));
        installers
    }

    pub fn get_applications(&self) -> Vec<Application> {
        let mut applications = self.read().applications.clone();
        applications.sort_by(|a, b| a.name.cmp(&b.name));
        applications
    }

    pub fn find_volume_by_uuid(&self, volume_uuid: &str) -> Option<Volume> {
        self.read()
            .volumes
            .iter()
            .find(|v| !v.volume_uuid.is_empty() && v.volume_uuid == volume_uuid)
            .cloned()
    }

    pub fn find_volume_by_device(&self, device_identifier: &str) -> Option<Volume> {
        self.read()
            .volumes
            .iter()
            .find(|v| v.device_identifier == device_identifier)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> InventorySnapshot {
        InventorySnapshot {
            schema_version: INVENTORY_SCHEMA_VERSION.to_string(),
            taken_at_utc: now_utc_rfc3339(),
            disks: self.get_disks(),
            volumes: self.get_volumes(),
            installers: self.get_installers(),
            applications: self.get_applications(),
        }
    }
}
