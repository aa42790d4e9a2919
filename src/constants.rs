//! Centralized constants for deltactl.
//!
//! All magic numbers, default strings, and configuration constants live here
//! so they can be changed in one place.

/// Application name used in CLI output and directory paths.
pub const APP_NAME: &str = "deltactl";

/// Configuration filename.
pub const CONFIG_FILENAME: &str = "config.toml";

/// Default origin of the Delta inference server (OpenAI-compatible surface).
pub const DEFAULT_SERVER_ORIGIN: &str = "http://localhost:8080";

/// Fixed port the model management API listens on.
///
/// The management API always runs on this secondary port, whether or not it
/// shares a host with the inference server. Resolving against a fixed port
/// avoids probing the primary port, which can transiently answer wrong
/// while the server restarts for a model load.
pub const MODEL_API_PORT: u16 = 8081;

/// Environment variable consulted for the inference server API key.
pub const API_KEY_ENV: &str = "DELTA_API_KEY";

/// Filename for the persisted model selection.
pub const SELECTION_FILENAME: &str = "selection.json";

/// Filename for persisted per-model context-length preferences.
pub const CONTEXT_PREFS_FILENAME: &str = "context_lengths.json";

// --- Restart polling ---

/// Interval between loaded-model polls after a lazy (non-restart) switch.
pub const RESTART_POLL_INTERVAL_MS: u64 = 2_000;

/// Maximum number of loaded-model polls before giving up.
pub const RESTART_POLL_MAX_ATTEMPTS: u32 = 30;

// --- Telemetry ---

/// Interval between generation-stats polls while streaming.
pub const STATS_POLL_INTERVAL_MS: u64 = 500;

// --- Downloads ---

/// Interval between download-progress polls.
pub const DOWNLOAD_POLL_INTERVAL_MS: u64 = 1_000;
