//! Wire types for the two backend surfaces.
//!
//! The management API and the inference server each return listings in more
//! than one shape depending on version and deployment (bare arrays vs.
//! `{models: [...]}` wrappers, `data` vs. `models` keys in router mode).
//! The untagged enums here normalize every shape into one list type so the
//! rest of the client never sees the difference.

use serde::{Deserialize, Serialize};

/// One entry from the management API's installed/available listings.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelCatalogEntry {
    /// Stable identifier, possibly in `family:size` syntax (e.g. `qwen3:0.6b`).
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub size_str: String,
    #[serde(default)]
    pub quantization: String,
    #[serde(default)]
    pub size_bytes: u64,
    /// Only present in the available-catalog listing.
    #[serde(default)]
    pub installed: Option<bool>,
}

/// `{models: [...]}` wrapper or bare array; both appear in the wild.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum CatalogListBody {
    Wrapped { models: Vec<ModelCatalogEntry> },
    Bare(Vec<ModelCatalogEntry>),
}

impl CatalogListBody {
    pub(crate) fn into_models(self) -> Vec<ModelCatalogEntry> {
        match self {
            Self::Wrapped { models } => models,
            Self::Bare(models) => models,
        }
    }
}

/// Free-form metadata attached to a model option.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelMetadata {
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub quantization: Option<String>,
}

/// A model the inference server reports as loaded and able to serve.
#[derive(Debug, Clone)]
pub struct LoadedModel {
    /// Identifier from the OpenAI-compatible `data` array.
    pub id: String,
    /// Extended details, present only on servers that emit the parallel
    /// `models` array.
    pub details: Option<LoadedModelDetails>,
}

/// Extended per-model details from the inference server listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoadedModelDetails {
    #[serde(default)]
    pub name: String,
    /// Underlying identifier to send on chat/switch requests when it
    /// differs from the listing id.
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub details: ModelMetadata,
}

/// OpenAI-compatible `GET /v1/models` body.
#[derive(Debug, Deserialize)]
pub(crate) struct InferenceListBody {
    #[serde(default)]
    pub data: Vec<InferenceModelEntry>,
    /// Parallel detail array, index-aligned with `data`.
    #[serde(default)]
    pub models: Vec<LoadedModelDetails>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct InferenceModelEntry {
    pub id: String,
}

/// Router-mode `GET /models` fallback body; `data`, `models`, or bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum RouterListBody {
    Data { data: Vec<RouterEntry> },
    Models { models: Vec<RouterEntry> },
    Bare(Vec<RouterEntry>),
}

#[derive(Debug, Deserialize)]
pub(crate) struct RouterEntry {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
}

impl RouterListBody {
    pub(crate) fn into_ids(self) -> Vec<String> {
        let entries = match self {
            Self::Data { data } => data,
            Self::Models { models } => models,
            Self::Bare(entries) => entries,
        };
        entries
            .into_iter()
            .filter_map(|e| {
                if !e.id.is_empty() {
                    Some(e.id)
                } else if !e.name.is_empty() {
                    Some(e.name)
                } else {
                    None
                }
            })
            .collect()
    }
}

/// Response to `POST /api/models/use`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SwitchOutcome {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    /// Filesystem path the server resolved the model to.
    #[serde(default)]
    pub model_path: Option<String>,
    #[serde(default)]
    pub model_name: Option<String>,
    /// Router alias to use for subsequent requests, when it differs from
    /// the requested name.
    #[serde(default)]
    pub model_alias: Option<String>,
    /// True when the server restarted with the model already resident;
    /// false when the model will load lazily (router/on-demand mode).
    #[serde(default)]
    pub loaded: bool,
    /// Context size the server actually applied.
    #[serde(default)]
    pub ctx_size: Option<u32>,
}

impl SwitchOutcome {
    /// Identifier to use for subsequent requests. The alias takes
    /// precedence over the raw model path; `None` means keep the
    /// identifier that was requested.
    pub fn effective_model(&self) -> Option<&str> {
        self.model_alias
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.model_path.as_deref().filter(|s| !s.is_empty()))
    }
}

/// Generic operation result from the management API.
#[derive(Debug, Clone, Deserialize)]
pub struct OperationResult {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// Response to `GET /api/models/download/progress/{name}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DownloadProgress {
    /// Completion in percent, 0 to 100.
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub current_bytes: u64,
    #[serde(default)]
    pub total_bytes: u64,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub failed: bool,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_body_accepts_both_shapes() {
        let wrapped: CatalogListBody =
            serde_json::from_str(r#"{"models":[{"name":"qwen3:0.6b"}]}"#).unwrap();
        let bare: CatalogListBody = serde_json::from_str(r#"[{"name":"qwen3:0.6b"}]"#).unwrap();
        assert_eq!(wrapped.into_models().len(), 1);
        assert_eq!(bare.into_models()[0].name, "qwen3:0.6b");
    }

    #[test]
    fn router_body_accepts_all_shapes() {
        let data: RouterListBody = serde_json::from_str(r#"{"data":[{"id":"a"}]}"#).unwrap();
        let models: RouterListBody = serde_json::from_str(r#"{"models":[{"name":"b"}]}"#).unwrap();
        let bare: RouterListBody = serde_json::from_str(r#"[{"id":"c"},{}]"#).unwrap();
        assert_eq!(data.into_ids(), vec!["a"]);
        assert_eq!(models.into_ids(), vec!["b"]);
        // Entries with neither id nor name are dropped.
        assert_eq!(bare.into_ids(), vec!["c"]);
    }

    #[test]
    fn switch_outcome_alias_wins_over_path() {
        let outcome: SwitchOutcome = serde_json::from_str(
            r#"{"success":true,"model_path":"/models/q.gguf","model_alias":"qwen3-0.6b-instruct","loaded":true}"#,
        )
        .unwrap();
        assert_eq!(outcome.effective_model(), Some("qwen3-0.6b-instruct"));
    }

    #[test]
    fn switch_outcome_empty_alias_falls_back_to_path() {
        let outcome: SwitchOutcome = serde_json::from_str(
            r#"{"success":true,"model_path":"/models/q.gguf","model_alias":""}"#,
        )
        .unwrap();
        assert_eq!(outcome.effective_model(), Some("/models/q.gguf"));
    }
}
