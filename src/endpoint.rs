//! Model management API location resolution.
//!
//! Delta runs in two topologies: the management API co-located with the
//! inference server on one port, or on its own fixed secondary port while
//! inference serves the primary port. In both cases the management API is
//! reachable on [`MODEL_API_PORT`](crate::constants::MODEL_API_PORT), so
//! resolution is a pure function of the server origin: keep the scheme and
//! host, swap the port. Earlier client generations probed the same-origin
//! endpoint first and fell back on failure; that was racy during model-load
//! restarts and is intentionally not implemented here.

use reqwest::Url;

use crate::constants::MODEL_API_PORT;

/// Resolves the base URL of the model management API from the inference
/// server origin.
///
/// Keeps the origin's scheme and host so the client works when pointed at
/// another machine (e.g. `http://192.168.1.5:8080`). Falls back to
/// `http://localhost:8081` when the origin cannot be parsed.
pub fn model_api_base_url(origin: &str) -> String {
    match Url::parse(origin) {
        Ok(url) => {
            let host = url.host_str().unwrap_or("localhost");
            format!("{}://{}:{}", url.scheme(), host, MODEL_API_PORT)
        }
        Err(_) => format!("http://localhost:{}", MODEL_API_PORT),
    }
}
