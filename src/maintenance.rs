use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::engine::{Engine, EngineError};

/// Compact the journal if at least `threshold` events were appended since the
/// last compaction. Returns whether a compaction ran.
pub async fn compact_if_due(engine: &Engine, threshold: u64) -> Result<bool, EngineError> {
    let appends = engine.journal_appends_since_compact().await;
    if appends < threshold {
        debug!("compactor: {appends}/{threshold} appends, skipping");
        return Ok(false);
    }
    engine.compact_journal().await?;
    info!("compactor: compacted after {appends} appends");
    Ok(true)
}

/// Background task that keeps the journal short.
pub async fn run_compactor(engine: Arc<Engine>, period: Duration) {
    let threshold = engine.config().compact_threshold;
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        if let Err(e) = compact_if_due(&engine, threshold).await {
            warn!("compactor: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::journal::{Journal, MemoryJournal};
    use crate::model::*;
    use ulid::Ulid;

    fn engine_with(journal: Arc<MemoryJournal>) -> Engine {
        Engine::with_journal(journal, EngineConfig::default(), &[])
    }

    #[tokio::test]
    async fn below_threshold_is_noop() {
        let journal = Arc::new(MemoryJournal::new());
        let engine = engine_with(journal.clone());
        engine
            .create_property(Ulid::new(), NewProperty { name: "Dune Lodge".into(), is_active: true, ..Default::default() })
            .await
            .unwrap();
        assert!(!compact_if_due(&engine, 10).await.unwrap());
        assert_eq!(journal.appends_since_compact().await, 1);
    }

    #[tokio::test]
    async fn churn_is_collapsed() {
        let journal = Arc::new(MemoryJournal::new());
        let engine = engine_with(journal.clone());
        let id = Ulid::new();
        engine
            .create_property(id, NewProperty { name: "Tea Garden Cottage".into(), is_active: true, ..Default::default() })
            .await
            .unwrap();
        for active in [false, true, false, true] {
            engine
                .update_property(id, PropertyPatch { is_active: Some(active), ..Default::default() })
                .await
                .unwrap();
        }
        assert!(compact_if_due(&engine, 5).await.unwrap());
        assert_eq!(journal.appends_since_compact().await, 0);
        let events = journal.events();
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], Event::PropertyCreated(p) if p.id == id && p.is_active));
    }
}
