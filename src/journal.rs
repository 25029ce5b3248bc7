//! Durable event storage behind the engine.

use std::io;
use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::model::Event;
use crate::observability;
use crate::wal::Wal;

#[derive(Debug, thiserror::Error)]
#[error("journal: {0}")]
pub struct JournalError(pub String);

impl From<io::Error> for JournalError {
    fn from(e: io::Error) -> Self {
        JournalError(e.to_string())
    }
}

/// Where committed events go. The engine only mutates in-memory state after
/// `append` returns `Ok`.
#[async_trait]
pub trait Journal: Send + Sync {
    async fn append(&self, event: &Event) -> Result<(), JournalError>;

    /// Replace the journal contents with a minimal event set.
    async fn compact(&self, events: Vec<Event>) -> Result<(), JournalError>;

    async fn appends_since_compact(&self) -> u64;
}

// ── In-memory journal ───────────────────────────────────────────

/// Keeps events in a vector. Nothing survives the process.
#[derive(Default)]
pub struct MemoryJournal {
    inner: Mutex<MemoryLog>,
}

#[derive(Default)]
struct MemoryLog {
    events: Vec<Event>,
    since_compact: u64,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.lock().events.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryLog> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Journal for MemoryJournal {
    async fn append(&self, event: &Event) -> Result<(), JournalError> {
        let mut log = self.lock();
        log.events.push(event.clone());
        log.since_compact += 1;
        Ok(())
    }

    async fn compact(&self, events: Vec<Event>) -> Result<(), JournalError> {
        let mut log = self.lock();
        log.events = events;
        log.since_compact = 0;
        Ok(())
    }

    async fn appends_since_compact(&self) -> u64 {
        self.lock().since_compact
    }
}

// ── File journal with group commit ──────────────────────────────

enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

type PendingAppend = (Event, oneshot::Sender<io::Result<()>>);

/// [`Wal`]-backed journal. A background task owns the file and batches
/// concurrent appends into a single fsync.
pub struct WalJournal {
    tx: mpsc::Sender<WalCommand>,
}

impl WalJournal {
    /// Replay the file at `path`, then start the writer task.
    /// Must be called from within a tokio runtime.
    pub fn open(path: &Path) -> io::Result<(Self, Vec<Event>)> {
        let events = Wal::replay(path)?;
        let wal = Wal::open(path)?;
        let (tx, rx) = mpsc::channel(4096);
        tokio::spawn(writer_loop(wal, rx));
        Ok((Self { tx }, events))
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> WalCommand,
    ) -> Result<T, JournalError> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(build(tx))
            .await
            .map_err(|_| JournalError("writer shut down".into()))?;
        rx.await
            .map_err(|_| JournalError("writer dropped response".into()))
    }
}

#[async_trait]
impl Journal for WalJournal {
    async fn append(&self, event: &Event) -> Result<(), JournalError> {
        let event = event.clone();
        self.request(|response| WalCommand::Append { event, response })
            .await??;
        Ok(())
    }

    async fn compact(&self, events: Vec<Event>) -> Result<(), JournalError> {
        self.request(|response| WalCommand::Compact { events, response })
            .await??;
        Ok(())
    }

    async fn appends_since_compact(&self) -> u64 {
        self.request(|response| WalCommand::AppendsSinceCompact { response })
            .await
            .unwrap_or(0)
    }
}

/// Block for the first command; if it is an append, drain every append already
/// queued behind it and commit them with one flush.
async fn writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        let (event, response) = match cmd {
            WalCommand::Append { event, response } => (event, response),
            other => {
                handle_other(&mut wal, other);
                continue;
            }
        };
        let mut batch: Vec<PendingAppend> = vec![(event, response)];
        let mut deferred = None;
        while let Ok(next) = rx.try_recv() {
            match next {
                WalCommand::Append { event, response } => batch.push((event, response)),
                other => {
                    deferred = Some(other);
                    break;
                }
            }
        }
        commit_batch(&mut wal, batch);
        if let Some(cmd) = deferred {
            handle_other(&mut wal, cmd);
        }
    }
}

fn commit_batch(wal: &mut Wal, batch: Vec<PendingAppend>) {
    metrics::histogram!(observability::JOURNAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let started = Instant::now();

    let result = wal.commit(batch.iter().map(|(event, _)| event));

    metrics::histogram!(observability::JOURNAL_FLUSH_DURATION_SECONDS)
        .record(started.elapsed().as_secs_f64());
    if let Err(e) = &result {
        tracing::warn!("journal batch of {} failed: {e}", batch.len());
    }

    for (_, tx) in batch {
        let reply = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(reply);
    }
}

fn handle_other(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let _ = response.send(wal.rewrite(&events));
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { event, response } => commit_batch(wal, vec![(event, response)]),
    }
}
