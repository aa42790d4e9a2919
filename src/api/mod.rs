//! Typed operations against the two Delta backend surfaces.
//!
//! The model management API (fixed secondary port) owns on-disk weights:
//! listing, download, removal, switching, unloading. The inference server
//! (primary port) exposes the OpenAI-compatible model listing that reveals
//! which model is actually resident. [`ModelTransport`] is the seam between
//! the selection state machine and the network; [`HttpApi`] is the real
//! implementation, and tests substitute counting mocks.

mod error;
mod http;
mod types;

pub use error::ApiError;
pub use http::HttpApi;
pub use types::{
    DownloadProgress, LoadedModel, LoadedModelDetails, ModelCatalogEntry, ModelMetadata,
    OperationResult, SwitchOutcome,
};

use async_trait::async_trait;

/// Every backend operation the selection state machine needs.
///
/// All operations are independently fallible and retryable by the caller;
/// none retry internally.
#[async_trait]
pub trait ModelTransport: Send + Sync {
    /// Models the inference server currently has resident. Empty means no
    /// model is loaded (lazy deployments stay empty until the first
    /// request). Falls back to the router listing when the primary
    /// OpenAI-compatible listing is empty.
    async fn list_loaded(&self) -> Result<Vec<LoadedModel>, ApiError>;

    /// Models whose weights are present on local storage.
    async fn list_installed(&self) -> Result<Vec<ModelCatalogEntry>, ApiError>;

    /// The downloadable catalog, with installed markers.
    async fn list_available(&self) -> Result<Vec<ModelCatalogEntry>, ApiError>;

    /// Asks the backend to load `model`, optionally with a saved
    /// context-length preference.
    async fn switch_to(
        &self,
        model: &str,
        context_length: Option<u32>,
    ) -> Result<SwitchOutcome, ApiError>;

    /// Releases the currently loaded model on the backend.
    async fn unload(&self) -> Result<OperationResult, ApiError>;

    /// Deletes a model's weights from local storage.
    async fn remove(&self, model: &str) -> Result<OperationResult, ApiError>;

    /// Starts (or completes) a weight download.
    async fn download(&self, model: &str) -> Result<OperationResult, ApiError>;

    /// Polls byte-level progress of an in-flight download.
    async fn download_progress(&self, model: &str) -> Result<DownloadProgress, ApiError>;
}
