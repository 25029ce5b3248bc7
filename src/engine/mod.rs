mod availability;
mod conflict;
mod error;
mod mutations;
mod pricing;
mod queries;
mod store;
#[cfg(test)]
mod tests;

pub use conflict::find_conflict;
pub use error::EngineError;
pub use pricing::quote;
pub use store::InMemoryStore;

use std::io;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, OwnedRwLockWriteGuard, RwLock, RwLockReadGuard};
use tracing::info;
use ulid::Ulid;

use crate::config::EngineConfig;
use crate::journal::{Journal, MemoryJournal, WalJournal};
use crate::model::*;

pub type SharedRoomState = Arc<RwLock<RoomState>>;

/// The booking availability & pricing engine.
///
/// Each room category sits behind its own `RwLock`; every booking mutation
/// holds that lock across check, price and write, so two requests for the same
/// room category are serialised while different categories proceed in
/// parallel.
pub struct Engine {
    pub(super) store: InMemoryStore,
    pub(super) journal: Arc<dyn Journal>,
    pub(super) config: EngineConfig,
    /// Shared by every mutation, taken exclusively by compaction so a snapshot
    /// never misses an in-flight write.
    pub(super) commit_gate: RwLock<()>,
    /// Serialises structural catalog changes (create/delete of properties and
    /// room categories).
    pub(super) catalog_lock: Mutex<()>,
}

impl Engine {
    /// Engine over an arbitrary journal, rebuilt from `history`.
    pub fn with_journal(journal: Arc<dyn Journal>, config: EngineConfig, history: &[Event]) -> Self {
        let engine = Self {
            store: InMemoryStore::new(),
            journal,
            config,
            commit_gate: RwLock::new(()),
            catalog_lock: Mutex::new(()),
        };
        engine.replay(history);
        engine
    }

    /// Ephemeral engine backed by a [`MemoryJournal`].
    pub fn in_memory(config: EngineConfig) -> Self {
        Self::with_journal(Arc::new(MemoryJournal::new()), config, &[])
    }

    /// Open the journal under `config.data_dir`, replay it, and start the
    /// group-commit writer. Must be called from within a tokio runtime.
    pub fn open(config: EngineConfig) -> io::Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        let (journal, history) = WalJournal::open(&config.wal_path())?;
        let engine = Self::with_journal(Arc::new(journal), config, &history);
        info!(
            "engine loaded {} events: {} properties, {} room categories, {} bookings",
            history.len(),
            engine.store.property_count(),
            engine.store.room_count(),
            engine.store.booking_count()
        );
        Ok(engine)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Rebuild state from history. We're the sole owner of every room Arc
    /// here, so `try_write` never contends.
    fn replay(&self, history: &[Event]) {
        for event in history {
            match store::event_room_id(event) {
                None => self.store.apply_catalog(event),
                Some(room_id) => {
                    let Some(room) = self.store.get_room(&room_id) else {
                        continue;
                    };
                    if let Ok(mut guard) = room.try_write() {
                        self.store.apply_to_room(&mut guard, event);
                    }
                }
            }
        }
        metrics::gauge!(crate::observability::ROOM_CATEGORIES_ACTIVE)
            .set(self.store.room_count() as f64);
    }

    pub(super) fn now() -> chrono::DateTime<Utc> {
        Utc::now()
    }

    /// Wait out any running compaction.
    pub(super) async fn gate(&self) -> RwLockReadGuard<'_, ()> {
        self.commit_gate.read().await
    }

    /// Journal a catalog-level event, then apply it.
    pub(super) async fn commit_catalog(&self, event: &Event) -> Result<(), EngineError> {
        self.journal.append(event).await?;
        self.store.apply_catalog(event);
        metrics::gauge!(crate::observability::ROOM_CATEGORIES_ACTIVE)
            .set(self.store.room_count() as f64);
        Ok(())
    }

    /// Journal a room-scoped event, then apply it under the held lock.
    pub(super) async fn commit_room(&self, rs: &mut RoomState, event: &Event) -> Result<(), EngineError> {
        self.journal.append(event).await?;
        self.store.apply_to_room(rs, event);
        Ok(())
    }

    pub(super) fn resolve_room(&self, id: &Ulid) -> Result<SharedRoomState, EngineError> {
        self.store
            .get_room(id)
            .ok_or_else(|| EngineError::room_category(*id))
    }

    /// Lookup booking → room category, acquire that room's write lock.
    pub(super) async fn resolve_booking_write(
        &self,
        booking_id: &Ulid,
    ) -> Result<OwnedRwLockWriteGuard<RoomState>, EngineError> {
        let room_id = self
            .store
            .room_for_booking(booking_id)
            .ok_or_else(|| EngineError::booking(*booking_id))?;
        let guard = self.resolve_room(&room_id)?.write_owned().await;
        if !self.store.contains_room(&room_id) {
            return Err(EngineError::booking(*booking_id));
        }
        Ok(guard)
    }

    /// Rewrite the journal with the minimal event set that recreates the
    /// current state.
    pub async fn compact_journal(&self) -> Result<(), EngineError> {
        let _exclusive = self.commit_gate.write().await;
        let mut events = Vec::new();
        for property in self.store.properties() {
            let property_id = property.id;
            events.push(Event::PropertyCreated(property));
            for room_id in self.store.rooms_of(&property_id) {
                let Some(room) = self.store.get_room(&room_id) else {
                    continue;
                };
                let guard = room.read().await;
                events.push(Event::RoomCategoryCreated(guard.category.clone()));
                events.extend(guard.bookings.iter().cloned().map(Event::BookingCreated));
            }
        }
        let count = events.len();
        let result = self.journal.compact(events).await;
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(crate::observability::JOURNAL_COMPACTIONS_TOTAL, "status" => status)
            .increment(1);
        result?;
        info!("journal compacted to {count} events");
        Ok(())
    }

    pub async fn journal_appends_since_compact(&self) -> u64 {
        self.journal.appends_since_compact().await
    }
}
