//! Model selection state machine.
//!
//! [`ModelStore`] reconciles two independently-updated sources of truth,
//! the management API's installed listing and the inference server's
//! loaded listing, into one consistent view: the canonical option list,
//! which model is selected, and whether the backend actually has it
//! resident. It drives switch requests, tolerates server restarts and
//! partial failures, and survives the lazy-load deployments that only pull
//! a model in on the first request.
//!
//! Concurrency model: the store is the single owner of its state; callers
//! only ever get [`ModelsSnapshot`] clones. At most one `fetch` or
//! `select` is in flight at a time, guarded by busy flags; a call
//! arriving while busy is dropped, not queued. The one background task is
//! the bounded restart poll spawned after a lazy switch; it cancels
//! cooperatively by comparing a captured generation counter against the
//! current one before every side effect.

mod persist;
mod state;


use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;

use crate::api::ModelTransport;
use crate::constants::{RESTART_POLL_INTERVAL_MS, RESTART_POLL_MAX_ATTEMPTS};
use crate::telemetry::ProcessingMonitor;

pub use persist::SelectionStore;
pub use state::{ModelOption, ModelsSnapshot, PersistedSelection};

/// A failed store operation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested id is not in the current list. Raised before any
    /// network call.
    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    /// Both fetch branches failed; the previous list is left intact.
    #[error("{0}")]
    Fetch(String),
}

/// Cadence of the post-switch restart poll.
#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(RESTART_POLL_INTERVAL_MS),
            max_attempts: RESTART_POLL_MAX_ATTEMPTS,
        }
    }
}

#[derive(Default)]
struct StoreState {
    models: Vec<ModelOption>,
    loading: bool,
    updating: bool,
    loading_model_id: Option<String>,
    selected_id: Option<String>,
    selected_model: Option<String>,
    loaded: bool,
    error: Option<String>,
    /// Bumped on every selection change; detached polls capture it and
    /// discard themselves when it moves.
    epoch: u64,
}

impl StoreState {
    fn selection(&self) -> Option<(String, String)> {
        Some((self.selected_id.clone()?, self.selected_model.clone()?))
    }
}

/// The reconciliation engine behind model selection.
pub struct ModelStore {
    state: Mutex<StoreState>,
    transport: Arc<dyn ModelTransport>,
    persist: SelectionStore,
    monitor: Option<Arc<ProcessingMonitor>>,
    poll: PollConfig,
}

impl ModelStore {
    /// Creates a store, seeding the selection from persistence so the UI
    /// shows the prior choice before the first fetch completes.
    pub fn new(transport: Arc<dyn ModelTransport>, persist: SelectionStore) -> Self {
        let mut initial = StoreState::default();
        if let Some(selection) = persist.load_selection() {
            initial.selected_id = Some(selection.id);
            initial.selected_model = Some(selection.model);
        }
        Self {
            state: Mutex::new(initial),
            transport,
            persist,
            monitor: None,
            poll: PollConfig::default(),
        }
    }

    /// Attaches the telemetry monitor that receives post-switch context
    /// sizes.
    pub fn with_monitor(mut self, monitor: Arc<ProcessingMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Overrides the restart-poll cadence. Tests run at millisecond scale.
    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Read snapshot of the current state.
    pub fn snapshot(&self) -> ModelsSnapshot {
        let s = self.state.lock().unwrap();
        ModelsSnapshot {
            models: s.models.clone(),
            loading: s.loading,
            updating: s.updating,
            loading_model_id: s.loading_model_id.clone(),
            selected_id: s.selected_id.clone(),
            selected_model: s.selected_model.clone(),
            loaded: s.loaded,
            error: s.error.clone(),
        }
    }

    /// Fetches both listings and rebuilds the option list.
    ///
    /// No-op while a fetch is in flight, and cache-first unless `force`:
    /// an existing list is reused. A forced refetch preserves the current
    /// selection when it still matches; a fresh fetch applies the
    /// persisted-selection-wins priority. Partial failure of either branch
    /// proceeds with whatever succeeded.
    pub async fn fetch(&self, force: bool) -> Result<(), StoreError> {
        {
            let mut s = self.state.lock().unwrap();
            if s.loading {
                return Ok(());
            }
            if !s.models.is_empty() && !force {
                return Ok(());
            }
            s.loading = true;
            s.error = None;
        }

        let (installed, loaded) = tokio::join!(
            self.transport.list_installed(),
            self.transport.list_loaded()
        );

        let mut s = self.state.lock().unwrap();
        s.loading = false;

        if let (Err(installed_err), Err(_)) = (&installed, &loaded) {
            let message = installed_err.to_string();
            s.error = Some(message.clone());
            return Err(StoreError::Fetch(message));
        }

        let loaded = loaded.unwrap_or_default();
        let models = state::build_options(installed.unwrap_or_default(), &loaded);

        let next = if force {
            state::refetch_selection(&models, s.selection())
        } else {
            let prior = s
                .selection()
                .map(|(id, model)| PersistedSelection { id, model })
                .or_else(|| self.persist.load_selection());
            state::initial_selection(&models, prior.as_ref(), &loaded)
        };

        s.models = models;
        self.apply_selection(&mut s, next);
        s.loaded = match (&s.selected_id, &s.selected_model) {
            (Some(id), Some(model)) => state::selection_loaded(id, model, &loaded),
            _ => false,
        };
        Ok(())
    }

    /// Selects a model by id and asks the backend to switch to it.
    ///
    /// No-op when already selected or while another switch is in flight.
    /// On success the backend-confirmed identifier (alias over path) is
    /// adopted as the selection's `model` while the `id` stays stable, and
    /// the pair is persisted. A restart response triggers an immediate
    /// forced resync; a lazy response starts the bounded restart poll. A
    /// transport failure keeps the optimistic selection and surfaces the
    /// message through the snapshot's `error` field.
    pub async fn select(self: &Arc<Self>, model_id: &str) -> Result<(), StoreError> {
        let option = {
            let mut s = self.state.lock().unwrap();
            if s.updating {
                return Ok(());
            }
            if s.selected_id.as_deref() == Some(model_id) {
                return Ok(());
            }
            let Some(option) = s.models.iter().find(|m| m.id == model_id).cloned() else {
                return Err(StoreError::ModelNotAvailable(model_id.to_string()));
            };
            s.updating = true;
            s.loading_model_id = Some(model_id.to_string());
            s.error = None;
            option
        };

        let context_hint = self.persist.context_length_for(&option.model);
        let result = self.transport.switch_to(&option.model, context_hint).await;

        match result {
            Ok(outcome) => {
                let effective = outcome
                    .effective_model()
                    .unwrap_or(&option.model)
                    .to_string();
                let epoch = {
                    let mut s = self.state.lock().unwrap();
                    self.apply_selection(&mut s, Some((option.id.clone(), effective)));
                    // The new selection is unconfirmed until a loaded
                    // listing says otherwise; the resync or poll below
                    // re-establishes the flag.
                    s.loaded = false;
                    s.updating = false;
                    s.loading_model_id = None;
                    s.epoch
                };
                if outcome.loaded {
                    // The server restarted with the model resident: push
                    // the applied context size to the stats reader and
                    // resync against the now-authoritative loaded listing.
                    // Base-URL re-resolution is a no-op under the
                    // fixed-port policy.
                    if let (Some(monitor), Some(ctx)) = (&self.monitor, outcome.ctx_size) {
                        monitor.set_context_total(ctx);
                    }
                    let _ = self.fetch(true).await;
                } else {
                    // Lazy/router deployments load on demand; watch for
                    // the loaded listing to fill in.
                    self.spawn_restart_poll(option.id.clone(), epoch);
                }
                Ok(())
            }
            Err(err) => {
                // Keep the optimistic selection: some deployments only
                // load the model on the first chat request, so a failed
                // switch does not make the choice wrong.
                let mut s = self.state.lock().unwrap();
                self.apply_selection(&mut s, Some((option.id.clone(), option.model.clone())));
                s.error = Some(err.to_string());
                s.loaded = false;
                s.updating = false;
                s.loading_model_id = None;
                Ok(())
            }
        }
    }

    /// Clears the selection, its persistence, and the loaded flag.
    ///
    /// Local only: releasing the model on the backend is a separate,
    /// explicit transport call so a UI reset never unloads by accident.
    pub fn unload(&self) {
        let mut s = self.state.lock().unwrap();
        self.apply_selection(&mut s, None);
        s.loaded = false;
        s.error = None;
    }

    /// Applies a selection change, bumping the generation counter and
    /// persisting the result. Persistence is best effort; a failed write
    /// only loses the cross-session default.
    fn apply_selection(&self, s: &mut StoreState, next: Option<(String, String)>) {
        if s.selection() != next {
            s.epoch += 1;
        }
        match next {
            Some((id, model)) => {
                let _ = self.persist.save_selection(&PersistedSelection {
                    id: id.clone(),
                    model: model.clone(),
                });
                s.selected_id = Some(id);
                s.selected_model = Some(model);
            }
            None => {
                let _ = self.persist.clear_selection();
                s.selected_id = None;
                s.selected_model = None;
            }
        }
    }

    fn is_stale(&self, epoch: u64, model_id: &str) -> bool {
        let s = self.state.lock().unwrap();
        s.epoch != epoch || s.selected_id.as_deref() != Some(model_id)
    }

    /// Polls the loaded listing until it fills in, attempts run out, or
    /// the selection moves on. Runs detached; every side effect is gated
    /// on the staleness check so a superseded poll discards itself.
    fn spawn_restart_poll(self: &Arc<Self>, model_id: String, epoch: u64) {
        let store = Arc::clone(self);
        let PollConfig {
            interval,
            max_attempts,
        } = self.poll;
        tokio::spawn(async move {
            for _ in 0..max_attempts {
                tokio::time::sleep(interval).await;
                if store.is_stale(epoch, &model_id) {
                    return;
                }
                let listing = match store.transport.list_loaded().await {
                    Ok(listing) => listing,
                    Err(_) => continue,
                };
                if listing.is_empty() {
                    continue;
                }
                if store.is_stale(epoch, &model_id) {
                    return;
                }
                {
                    let mut s = store.state.lock().unwrap();
                    s.loaded = match (&s.selected_id, &s.selected_model) {
                        (Some(id), Some(model)) => state::selection_loaded(id, model, &listing),
                        _ => false,
                    };
                }
                let _ = store.fetch(true).await;
                return;
            }
        });
    }
}
