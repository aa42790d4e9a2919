//! Pure data types and list/selection logic for the model store.
//!
//! Everything here is a function of its inputs; the async orchestration
//! (busy flags, switch requests, restart polling) lives in the parent
//! module.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::api::{LoadedModel, ModelCatalogEntry, ModelMetadata};

/// UI-facing projection of one selectable model.
///
/// `id` is the stable key used for selection and never changes once the
/// list is built. `model` is the identifier sent to the backend and may be
/// remapped in place to a router alias after a switch.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelOption {
    pub id: String,
    pub model: String,
    pub name: String,
    pub description: String,
    pub capabilities: Vec<String>,
    pub details: ModelMetadata,
}

/// The `{id, model}` pair persisted across sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSelection {
    pub id: String,
    pub model: String,
}

/// Read snapshot of the store, handed out to callers.
#[derive(Debug, Clone, Default)]
pub struct ModelsSnapshot {
    pub models: Vec<ModelOption>,
    /// A list fetch is in flight.
    pub loading: bool,
    /// A switch request is in flight.
    pub updating: bool,
    /// The id a pending switch is targeting, for UI feedback.
    pub loading_model_id: Option<String>,
    pub selected_id: Option<String>,
    /// Identifier to send on chat/switch requests for the selection.
    pub selected_model: Option<String>,
    /// True only when the inference server confirmed a model matching the
    /// selection is resident. Distinct from having a selection at all.
    pub loaded: bool,
    /// Last operation failure; prior good state stays intact alongside it.
    pub error: Option<String>,
}

impl ModelsSnapshot {
    pub fn selected_option(&self) -> Option<&ModelOption> {
        let id = self.selected_id.as_deref()?;
        self.models.iter().find(|m| m.id == id)
    }
}

/// Derives a display label from an identifier: the last path segment, or
/// the identifier itself when there is none.
pub(super) fn display_name_from_id(id: &str) -> String {
    let candidate = id.rsplit(['/', '\\']).next().unwrap_or(id).trim();
    if candidate.is_empty() {
        id.to_string()
    } else {
        candidate.to_string()
    }
}

/// Normalizes an identifier for fuzzy equivalence: lowercase with
/// separator characters stripped, so `qwen3:0.6b` and `qwen3-0.6b` match.
pub(super) fn normalize_model_id(id: &str) -> String {
    id.chars()
        .filter(|c| !matches!(c, ':' | '-' | '_' | '.' | '/' | '\\') && !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

fn ids_match(candidate: &str, loaded_id: &str) -> bool {
    candidate == loaded_id || normalize_model_id(candidate) == normalize_model_id(loaded_id)
}

/// Whether the loaded-model listing confirms the selection is resident.
pub(super) fn selection_loaded(
    selected_id: &str,
    selected_model: &str,
    loaded: &[LoadedModel],
) -> bool {
    loaded
        .iter()
        .any(|l| ids_match(selected_id, &l.id) || ids_match(selected_model, &l.id))
}

/// Builds the canonical option list from the management API's installed
/// listing and the inference server's loaded listing.
///
/// Entries from the inference server win on id collision when they carry
/// details; a bare id only fills a gap, never replacing a richer installed
/// entry. The result has unique ids and is sorted ascending by display
/// name.
pub(super) fn build_options(
    installed: Vec<ModelCatalogEntry>,
    loaded: &[LoadedModel],
) -> Vec<ModelOption> {
    let mut by_id: HashMap<String, ModelOption> = HashMap::new();

    for entry in installed {
        let name = if entry.display_name.trim().is_empty() {
            display_name_from_id(&entry.name)
        } else {
            entry.display_name.clone()
        };
        by_id.insert(
            entry.name.clone(),
            ModelOption {
                id: entry.name.clone(),
                model: entry.name,
                name,
                description: entry.description,
                capabilities: Vec::new(),
                details: ModelMetadata {
                    size: Some(entry.size_str).filter(|s| !s.is_empty()),
                    quantization: Some(entry.quantization).filter(|s| !s.is_empty()),
                },
            },
        );
    }

    for model in loaded {
        let Some(details) = model.details.clone() else {
            by_id.entry(model.id.clone()).or_insert_with(|| ModelOption {
                id: model.id.clone(),
                model: model.id.clone(),
                name: display_name_from_id(&model.id),
                description: String::new(),
                capabilities: Vec::new(),
                details: ModelMetadata::default(),
            });
            continue;
        };
        let name = if details.name.trim().is_empty() {
            display_name_from_id(&model.id)
        } else {
            details.name.clone()
        };
        let underlying = if details.model.is_empty() {
            model.id.clone()
        } else {
            details.model.clone()
        };
        by_id.insert(
            model.id.clone(),
            ModelOption {
                id: model.id.clone(),
                model: underlying,
                name,
                description: details.description,
                capabilities: details.capabilities,
                details: details.details,
            },
        );
    }

    let mut options: Vec<ModelOption> = by_id.into_values().collect();
    options.sort_by(|a, b| a.name.cmp(&b.name));
    options
}

/// Selection priority for a fresh (non-forced) fetch: a persisted prior
/// selection that still matches, else the model the server reports as
/// loaded, else none.
pub(super) fn initial_selection(
    models: &[ModelOption],
    persisted: Option<&PersistedSelection>,
    loaded: &[LoadedModel],
) -> Option<(String, String)> {
    if let Some(persisted) = persisted {
        if let Some(m) = models.iter().find(|m| m.id == persisted.id) {
            return Some((m.id.clone(), m.model.clone()));
        }
    }

    models
        .iter()
        .find(|m| {
            loaded
                .iter()
                .any(|l| ids_match(&m.id, &l.id) || ids_match(&m.model, &l.id))
        })
        .map(|m| (m.id.clone(), m.model.clone()))
}

/// Selection policy for a forced refetch (post-switch resync): preserve
/// the existing selection when it still matches an entry by id or by
/// normalized model string, otherwise clear it. The selection's `model`
/// value is kept as-is so an adopted alias survives the resync.
pub(super) fn refetch_selection(
    models: &[ModelOption],
    current: Option<(String, String)>,
) -> Option<(String, String)> {
    let (id, model) = current?;
    let matched = models.iter().any(|m| {
        m.id == id || normalize_model_id(&m.model) == normalize_model_id(&model)
    });
    matched.then_some((id, model))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, display: &str) -> ModelCatalogEntry {
        serde_json::from_value(serde_json::json!({
            "name": name,
            "display_name": display,
            "description": format!("{display} description"),
            "size_str": "397MB",
            "quantization": "Q8_0",
            "size_bytes": 416_000_000u64,
        }))
        .unwrap()
    }

    fn loaded(id: &str) -> LoadedModel {
        LoadedModel {
            id: id.to_string(),
            details: None,
        }
    }

    #[test]
    fn options_are_unique_and_sorted_by_name() {
        let installed = vec![
            entry("zeta:1b", "Zeta 1B"),
            entry("alpha:1b", "Alpha 1B"),
            entry("mid:1b", "Mid 1B"),
        ];
        let options = build_options(installed, &[loaded("alpha:1b")]);
        assert_eq!(options.len(), 3);
        let names: Vec<&str> = options.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha 1B", "Mid 1B", "Zeta 1B"]);
        let mut ids: Vec<&str> = options.iter().map(|m| m.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn loaded_entry_wins_id_collision() {
        let details: crate::api::LoadedModelDetails =
            serde_json::from_value(serde_json::json!({ "name": "Qwen3 0.6B (router)" })).unwrap();
        let loaded = vec![LoadedModel {
            id: "qwen3:0.6b".to_string(),
            details: Some(details),
        }];
        let options = build_options(vec![entry("qwen3:0.6b", "Qwen3 0.6B")], &loaded);
        assert_eq!(options.len(), 1);
        assert_eq!(options[0].name, "Qwen3 0.6B (router)");
    }

    #[test]
    fn bare_loaded_id_does_not_clobber_installed_entry() {
        let options = build_options(vec![entry("alpha:1b", "Alpha 1B")], &[loaded("alpha:1b")]);
        assert_eq!(options.len(), 1);
        assert_eq!(options[0].name, "Alpha 1B");
        assert_eq!(options[0].description, "Alpha 1B description");
        assert_eq!(options[0].details.size.as_deref(), Some("397MB"));
    }

    #[test]
    fn display_name_takes_last_path_segment() {
        assert_eq!(display_name_from_id("models/qwen3.gguf"), "qwen3.gguf");
        assert_eq!(display_name_from_id(r"C:\models\qwen3.gguf"), "qwen3.gguf");
        assert_eq!(display_name_from_id("qwen3:0.6b"), "qwen3:0.6b");
    }

    #[test]
    fn normalization_strips_separators() {
        assert_eq!(
            normalize_model_id("Qwen3:0.6b"),
            normalize_model_id("qwen3-0_6B")
        );
        assert_ne!(
            normalize_model_id("qwen3:0.6b"),
            normalize_model_id("qwen3:1.7b")
        );
    }

    #[test]
    fn initial_selection_prefers_persisted() {
        let options = build_options(
            vec![entry("a:1b", "A"), entry("b:1b", "B")],
            &[loaded("b:1b")],
        );
        let persisted = PersistedSelection {
            id: "a:1b".to_string(),
            model: "a:1b".to_string(),
        };
        let selection = initial_selection(&options, Some(&persisted), &[loaded("b:1b")]);
        assert_eq!(selection, Some(("a:1b".to_string(), "a:1b".to_string())));
    }

    #[test]
    fn initial_selection_falls_back_to_loaded_model_fuzzy() {
        let options = build_options(vec![entry("qwen3:0.6b", "Qwen3 0.6B")], &[]);
        let selection = initial_selection(&options, None, &[loaded("qwen3-0.6b")]);
        assert_eq!(
            selection,
            Some(("qwen3:0.6b".to_string(), "qwen3:0.6b".to_string()))
        );
    }

    #[test]
    fn initial_selection_none_when_nothing_matches() {
        let options = build_options(vec![entry("qwen3:0.6b", "Qwen3 0.6B")], &[]);
        assert_eq!(initial_selection(&options, None, &[]), None);
    }

    #[test]
    fn refetch_preserves_alias_on_id_match() {
        let options = build_options(vec![entry("qwen3:0.6b", "Qwen3 0.6B")], &[]);
        let current = Some((
            "qwen3:0.6b".to_string(),
            "qwen3-0.6b-instruct".to_string(),
        ));
        assert_eq!(
            refetch_selection(&options, current.clone()),
            current
        );
    }

    #[test]
    fn refetch_clears_vanished_selection() {
        let options = build_options(vec![entry("other:1b", "Other")], &[]);
        let current = Some(("qwen3:0.6b".to_string(), "qwen3:0.6b".to_string()));
        assert_eq!(refetch_selection(&options, current), None);
    }
}
