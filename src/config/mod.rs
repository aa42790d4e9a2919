//! Configuration types and path resolution for deltactl.
//!
//! Deltactl stores its settings as TOML at the platform's XDG config path
//! (e.g. `~/.config/deltactl/config.toml` on Linux) and persisted model
//! selection under the XDG data directory (`~/.local/share/deltactl/`).

mod loader;
mod paths;
mod types;

pub use types::Config;
pub use types::DisplayConfig;
