//! Generation-stats reader for the Delta inference server.
//!
//! [`ProcessingMonitor`] polls the server's `/slots` endpoint for in-flight
//! generation statistics and fans them out to subscribers. The stats strip
//! is cosmetic: when the endpoint is missing or misbehaves the state simply
//! stays `None` and the chat experience is unaffected.
//!
//! Display derivations (status message, ETA, detail lines) live in
//! [`format`] as pure functions.

pub mod format;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Deserialize;

use crate::constants::STATS_POLL_INTERVAL_MS;

/// Phase of the current generation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Initializing,
    Preparing,
    Generating,
    #[default]
    Idle,
}

/// Snapshot of one generation cycle's statistics.
///
/// Mirrors the server's `/slots` entries; every field is optional on the
/// wire and defaults to zero/absent.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProcessingState {
    #[serde(default)]
    pub status: ProcessingStatus,
    /// Prompt-processing completion in percent, when the server reports it.
    #[serde(default)]
    pub progress_percent: Option<f64>,
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub prompt_progress_time_ms: f64,
    #[serde(default)]
    pub prompt_tokens_per_second: f64,
    #[serde(default)]
    pub tokens_decoded: u32,
    #[serde(default)]
    pub tokens_per_second: f64,
    #[serde(default)]
    pub generation_time_ms: f64,
    #[serde(default)]
    pub context_used: u32,
    #[serde(default)]
    pub context_total: u32,
    #[serde(default)]
    pub output_tokens_used: u32,
    /// Non-positive means an unlimited output budget.
    #[serde(default)]
    pub output_tokens_max: i64,
    #[serde(default)]
    pub speculative: bool,
}

type Listener = Arc<dyn Fn(Option<&ProcessingState>) + Send + Sync>;

struct MonitorInner {
    listeners: Vec<(u64, Listener)>,
    next_listener_id: u64,
    state: Option<ProcessingState>,
    last_known: Option<ProcessingState>,
    streaming: bool,
    /// Effective context size pushed in after a model switch, used until
    /// the server starts reporting its own total.
    context_total: Option<u32>,
}

impl MonitorInner {
    /// Clones out the listener handles so they can run with the lock
    /// released.
    fn listener_handles(&self) -> Vec<Listener> {
        self.listeners.iter().map(|(_, l)| Arc::clone(l)).collect()
    }
}

/// Handle returned by [`ProcessingMonitor::subscribe`].
pub struct Subscription {
    id: u64,
    inner: Arc<Mutex<MonitorInner>>,
}

impl Subscription {
    /// Removes this listener from the monitor.
    pub fn unsubscribe(self) {
        let mut inner = self.inner.lock().unwrap();
        inner.listeners.retain(|(id, _)| *id != self.id);
    }
}

/// Polls generation statistics and fans them out to listeners.
///
/// Exclusive owner of the processing state: subscribers and
/// [`snapshot`](Self::snapshot) only ever see clones.
pub struct ProcessingMonitor {
    inner: Arc<Mutex<MonitorInner>>,
    client: reqwest::Client,
    origin: String,
    api_key: Option<String>,
    keep_stats_visible: bool,
    poll_interval: Duration,
}

impl ProcessingMonitor {
    pub fn new(origin: String, api_key: Option<String>, keep_stats_visible: bool) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MonitorInner {
                listeners: Vec::new(),
                next_listener_id: 0,
                state: None,
                last_known: None,
                streaming: false,
                context_total: None,
            })),
            client: reqwest::Client::new(),
            origin,
            api_key,
            keep_stats_visible,
            poll_interval: Duration::from_millis(STATS_POLL_INTERVAL_MS),
        }
    }

    /// Registers a listener for state updates. Listeners are invoked in
    /// registration order, outside the monitor's lock, so a listener may
    /// call back into the monitor.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Option<&ProcessingState>) + Send + Sync + 'static,
    {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_listener_id;
        inner.next_listener_id += 1;
        inner.listeners.push((id, Arc::new(callback)));
        Subscription {
            id,
            inner: Arc::clone(&self.inner),
        }
    }

    /// One-shot fetch of the current state, also stored for later
    /// snapshots. Returns `None` when idle or when the endpoint is
    /// unavailable.
    pub async fn current_state(&self) -> Option<ProcessingState> {
        let state =
            fetch_processing_state(&self.client, &self.origin, self.api_key.as_deref()).await;
        let mut inner = self.inner.lock().unwrap();
        let state = state.map(|s| apply_context_total(s, inner.context_total));
        if state.is_some() {
            inner.state = state.clone();
            inner.last_known = state.clone();
        }
        state
    }

    /// Latest known state without touching the network.
    pub fn snapshot(&self) -> Option<ProcessingState> {
        self.inner.lock().unwrap().state.clone()
    }

    pub fn is_streaming(&self) -> bool {
        self.inner.lock().unwrap().streaming
    }

    /// Records the context size the server applied after a model switch so
    /// context-usage lines reflect the new model before the next
    /// generation reports its own total.
    pub fn set_context_total(&self, total: u32) {
        let mut inner = self.inner.lock().unwrap();
        inner.context_total = Some(total);
        if let Some(state) = inner.state.take() {
            inner.state = Some(apply_context_total(state, Some(total)));
        }
    }

    /// Starts the polling loop. No-op when already streaming.
    pub fn start_streaming(&self) {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.streaming {
                return;
            }
            inner.streaming = true;
        }

        let inner = Arc::clone(&self.inner);
        let client = self.client.clone();
        let origin = self.origin.clone();
        let api_key = self.api_key.clone();
        let interval = self.poll_interval;
        tokio::spawn(async move {
            loop {
                if !inner.lock().unwrap().streaming {
                    break;
                }
                let state = fetch_processing_state(&client, &origin, api_key.as_deref()).await;
                let (state, listeners) = {
                    let mut inner = inner.lock().unwrap();
                    if !inner.streaming {
                        break;
                    }
                    let state = state.map(|s| apply_context_total(s, inner.context_total));
                    inner.state = state.clone();
                    // A null update means the cycle ended; the retained
                    // copy is only for keep-stats-visible display.
                    inner.last_known = state.clone();
                    (state, inner.listener_handles())
                };
                for listener in &listeners {
                    listener(state.as_ref());
                }
                tokio::time::sleep(interval).await;
            }
        });
    }

    /// Stops the polling loop. When `keep_stats_visible` is configured the
    /// last known state remains displayed; otherwise the state clears.
    pub fn stop_streaming(&self) {
        let (state, listeners) = {
            let mut inner = self.inner.lock().unwrap();
            if !inner.streaming {
                return;
            }
            inner.streaming = false;
            if self.keep_stats_visible {
                inner.state = inner.last_known.clone();
            } else {
                inner.state = None;
            }
            (inner.state.clone(), inner.listener_handles())
        };
        for listener in &listeners {
            listener(state.as_ref());
        }
    }
}

/// Fetches `/slots` and reduces it to the active slot's state.
///
/// Any failure (endpoint absent, auth rejected, unparseable body) degrades
/// to `None`; the stats strip is not worth failing the app for.
async fn fetch_processing_state(
    client: &reqwest::Client,
    origin: &str,
    api_key: Option<&str>,
) -> Option<ProcessingState> {
    let mut request = client.get(format!("{origin}/slots"));
    if let Some(key) = api_key {
        request = request.bearer_auth(key);
    }
    let response = request.send().await.ok()?;
    if !response.status().is_success() {
        return None;
    }
    let mut slots: Vec<ProcessingState> = response.json().await.ok()?;
    let active = slots
        .iter()
        .position(|s| s.status != ProcessingStatus::Idle)?;
    Some(slots.swap_remove(active))
}

fn apply_context_total(mut state: ProcessingState, total: Option<u32>) -> ProcessingState {
    if state.context_total == 0 {
        if let Some(total) = total {
            state.context_total = total;
        }
    }
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn monitor() -> ProcessingMonitor {
        ProcessingMonitor::new("http://localhost:8080".to_string(), None, false)
    }

    #[test]
    fn subscribe_and_unsubscribe() {
        let monitor = monitor();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = Arc::clone(&hits);
        let sub = monitor.subscribe(move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(monitor.inner.lock().unwrap().listeners.len(), 1);
        sub.unsubscribe();
        assert_eq!(monitor.inner.lock().unwrap().listeners.len(), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn context_total_applies_until_server_reports_one() {
        let monitor = monitor();
        monitor.set_context_total(8192);
        let patched = apply_context_total(
            ProcessingState::default(),
            monitor.inner.lock().unwrap().context_total,
        );
        assert_eq!(patched.context_total, 8192);

        let reported = apply_context_total(
            ProcessingState {
                context_total: 4096,
                ..ProcessingState::default()
            },
            Some(8192),
        );
        assert_eq!(reported.context_total, 4096);
    }

    #[test]
    fn listener_may_call_back_into_the_monitor() {
        let monitor = Arc::new(monitor());
        {
            let mut inner = monitor.inner.lock().unwrap();
            inner.streaming = true;
            inner.state = Some(ProcessingState::default());
            inner.last_known = inner.state.clone();
        }

        let observed = Arc::new(Mutex::new(None));
        let observed_in_listener = Arc::clone(&observed);
        let handle = Arc::clone(&monitor);
        let _sub = monitor.subscribe(move |_| {
            *observed_in_listener.lock().unwrap() = Some(handle.is_streaming());
        });

        monitor.stop_streaming();
        assert_eq!(*observed.lock().unwrap(), Some(false));
    }

    #[tokio::test]
    async fn stop_without_keep_stats_clears_state() {
        let monitor = monitor();
        {
            let mut inner = monitor.inner.lock().unwrap();
            inner.streaming = true;
            inner.state = Some(ProcessingState::default());
            inner.last_known = inner.state.clone();
        }
        monitor.stop_streaming();
        assert!(monitor.snapshot().is_none());
        assert!(!monitor.is_streaming());
    }

    #[tokio::test]
    async fn stop_with_keep_stats_retains_last_known() {
        let monitor = ProcessingMonitor::new("http://localhost:8080".to_string(), None, true);
        let state = ProcessingState {
            status: ProcessingStatus::Generating,
            tokens_decoded: 7,
            ..ProcessingState::default()
        };
        {
            let mut inner = monitor.inner.lock().unwrap();
            inner.streaming = true;
            inner.state = Some(state.clone());
            inner.last_known = Some(state.clone());
        }
        monitor.stop_streaming();
        assert_eq!(monitor.snapshot(), Some(state));
    }

    #[test]
    fn slot_parsing_defaults_missing_fields() {
        let state: ProcessingState =
            serde_json::from_str(r#"{"status":"generating","tokens_decoded":3}"#).unwrap();
        assert_eq!(state.status, ProcessingStatus::Generating);
        assert_eq!(state.tokens_decoded, 3);
        assert_eq!(state.context_total, 0);
        assert!(!state.speculative);
    }
}
