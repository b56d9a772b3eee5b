use log::{debug, error, info, trace, warn};
use parking_lot::Mutex;
use std::sync::{
    Arc, Weak,
    atomic::{AtomicU64, Ordering},
    mpsc::Receiver,
};

use crate::{
    config::BuildConfig,
    controller::Services,
    crawler::{FlushStats, LoadMode, flush},
    error::BuildError,
    session::BuildSession,
    traits::{ChangeEvent, Loader, UrlMapper},
};

type Callback = Box<dyn FnMut(&ChangeEvent) + Send>;

#[derive(Default)]
struct Slot {
    /// Id of the live registration
    current: Option<u64>,
    /// Taken out while the callback runs
    callback: Option<Callback>,
}

/// Holds at most one change callback. A new registration replaces the old
/// one.
///
/// The callback runs without the slot locked, so it may register a
/// replacement or detach itself.
#[derive(Default)]
pub struct ChangeHook {
    slot: Arc<Mutex<Slot>>,
    next_id: AtomicU64,
}

/// Handle for a registered callback.
#[must_use = "dropping the subscription keeps the callback registered; call detach to remove it"]
pub struct ChangeSubscription {
    id: u64,
    slot: Weak<Mutex<Slot>>,
}

impl ChangeHook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, callback: F) -> ChangeSubscription
    where
        F: FnMut(&ChangeEvent) + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut slot = self.slot.lock();
        slot.current = Some(id);
        slot.callback = Some(Box::new(callback));
        ChangeSubscription { id, slot: Arc::downgrade(&self.slot) }
    }

    pub fn is_registered(&self) -> bool {
        self.slot.lock().current.is_some()
    }

    /// Calls the current callback, if any.
    pub fn notify(&self, event: &ChangeEvent) {
        let (id, mut callback) = {
            let mut slot = self.slot.lock();
            match (slot.current, slot.callback.take()) {
                (Some(id), Some(callback)) => (id, callback),
                _ => return,
            }
        };
        callback(event);

        // Put it back unless it was replaced or detached meanwhile
        let mut slot = self.slot.lock();
        if slot.current == Some(id) && slot.callback.is_none() {
            slot.callback = Some(callback);
        }
    }
}

impl ChangeSubscription {
    /// Removes the callback unless a later registration has replaced it.
    pub fn detach(self) {
        let Some(slot) = self.slot.upgrade() else {
            return;
        };
        let mut slot = slot.lock();
        if slot.current == Some(self.id) {
            slot.current = None;
            slot.callback = None;
        }
    }
}

/// Rebuilds the URLs served from a changed file and whatever new local
/// imports they bring in, then notifies the hook once.
pub fn recrawl(
    session: &mut BuildSession,
    loader: &mut dyn Loader,
    mapper: &dyn UrlMapper,
    config: &BuildConfig,
    hook: &ChangeHook,
    event: &ChangeEvent,
) -> Result<FlushStats, BuildError> {
    let urls = mapper.file_to_urls(&event.file_path);
    if urls.is_empty() {
        warn!("Changed file {} is not in any mount", event.file_path.display());
    }
    for url in &urls {
        trace!("Requeueing {}", url);
        session.enqueue(url);
    }

    let mode = LoadMode { is_hmr: true, is_resolve: true, ..Default::default() };
    let stats = flush(session, loader, config, true, mode)?;
    debug!("Rebuilt {} files after change to {}", stats.written, event.file_path.display());
    hook.notify(event);
    Ok(stats)
}

/// Handles change events in arrival order until every sender is dropped,
/// then shuts the loader down. A failed rebuild is logged and the loop
/// moves on to the next event.
pub fn watch_loop(
    session: &mut BuildSession,
    services: &mut Services,
    config: &BuildConfig,
    hook: &ChangeHook,
    events: Receiver<ChangeEvent>,
) -> Result<(), BuildError> {
    info!("Watching for changes");
    for event in events {
        trace!("Change event for {}", event.file_path.display());
        let result = recrawl(
            session,
            services.loader.as_mut(),
            services.mapper.as_ref(),
            config,
            hook,
            &event,
        );
        if let Err(e) = result {
            let e = anyhow::Error::new(e);
            error!("Rebuild after change to {} failed: {:#}", event.file_path.display(), e);
        }
    }

    info!("Watch event channel closed, shutting down");
    services.loader.shutdown().map_err(|source| BuildError::Pipeline { step: "shutdown", source })
}
