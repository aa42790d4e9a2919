//! reqwest implementation of [`ModelTransport`].

use async_trait::async_trait;
use serde_json::json;

use super::error::ApiError;
use super::types::{
    CatalogListBody, DownloadProgress, InferenceListBody, LoadedModel, ModelCatalogEntry,
    OperationResult, RouterListBody, SwitchOutcome,
};
use super::ModelTransport;
use crate::config::Config;
use crate::endpoint;

/// HTTP client for the management API and the inference server.
pub struct HttpApi {
    client: reqwest::Client,
    /// Inference server origin, e.g. `http://localhost:8080`.
    origin: String,
    /// Management API base, e.g. `http://localhost:8081`.
    model_api_base: String,
    /// Bearer token for the inference server. The management API is
    /// unauthenticated.
    api_key: Option<String>,
}

impl HttpApi {
    pub fn new(origin: String, model_api_base: String, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            origin,
            model_api_base,
            api_key,
        }
    }

    /// Builds a client from the loaded config, resolving the management
    /// API base from the server origin unless explicitly overridden.
    pub fn from_config(config: &Config) -> Self {
        let base = config
            .model_api_url
            .clone()
            .unwrap_or_else(|| endpoint::model_api_base_url(&config.server_origin));
        Self::new(config.server_origin.clone(), base, config.api_key())
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn model_api_base(&self) -> &str {
        &self.model_api_base
    }

    fn inference_get(&self, path: &str) -> reqwest::RequestBuilder {
        let req = self.client.get(format!("{}{}", self.origin, path));
        match &self.api_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }

    /// Surfaces non-2xx responses as [`ApiError::Status`] with the
    /// server's structured message when one is present.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::from_status(status.as_u16(), &body))
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        Self::check(response)
            .await?
            .json::<T>()
            .await
            .map_err(|e| ApiError::Body(e.to_string()))
    }
}

#[async_trait]
impl ModelTransport for HttpApi {
    async fn list_loaded(&self) -> Result<Vec<LoadedModel>, ApiError> {
        let response = self.inference_get("/v1/models").send().await?;
        let body: InferenceListBody = Self::decode(response).await?;

        if !body.data.is_empty() {
            let mut details = body.models.into_iter().map(Some).collect::<Vec<_>>();
            details.resize_with(body.data.len(), || None);
            return Ok(body
                .data
                .into_iter()
                .zip(details)
                .map(|(entry, details)| LoadedModel {
                    id: entry.id,
                    details,
                })
                .collect());
        }

        // Router deployments list loaded models on /models instead. The
        // endpoint is absent in single-model mode, so a failed fallback
        // still means "nothing loaded".
        let fallback = match self.inference_get("/models").send().await {
            Ok(response) if response.status().is_success() => response,
            _ => return Ok(Vec::new()),
        };
        let body: RouterListBody = match fallback.json().await {
            Ok(body) => body,
            Err(_) => return Ok(Vec::new()),
        };
        Ok(body
            .into_ids()
            .into_iter()
            .map(|id| LoadedModel { id, details: None })
            .collect())
    }

    async fn list_installed(&self) -> Result<Vec<ModelCatalogEntry>, ApiError> {
        let url = format!("{}/api/models/list", self.model_api_base);
        let response = self.client.get(url).send().await?;
        let body: CatalogListBody = Self::decode(response).await?;
        Ok(body.into_models())
    }

    async fn list_available(&self) -> Result<Vec<ModelCatalogEntry>, ApiError> {
        let url = format!("{}/api/models/available", self.model_api_base);
        let response = self.client.get(url).send().await?;
        let body: CatalogListBody = Self::decode(response).await?;
        Ok(body.into_models())
    }

    async fn switch_to(
        &self,
        model: &str,
        context_length: Option<u32>,
    ) -> Result<SwitchOutcome, ApiError> {
        let url = format!("{}/api/models/use", self.model_api_base);
        let mut body = json!({ "model": model });
        if let Some(ctx) = context_length {
            body["context_length"] = ctx.into();
        }
        let response = self.client.post(url).json(&body).send().await?;
        Self::decode(response).await
    }

    async fn unload(&self) -> Result<OperationResult, ApiError> {
        let url = format!("{}/api/models/unload", self.model_api_base);
        let response = self.client.post(url).send().await?;
        Self::decode(response).await
    }

    async fn remove(&self, model: &str) -> Result<OperationResult, ApiError> {
        let url = format!(
            "{}/api/models/{}",
            self.model_api_base,
            encode_path_segment(model)
        );
        let response = self.client.delete(url).send().await?;
        Self::decode(response).await
    }

    async fn download(&self, model: &str) -> Result<OperationResult, ApiError> {
        let url = format!("{}/api/models/download", self.model_api_base);
        let response = self
            .client
            .post(url)
            .json(&json!({ "model": model }))
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn download_progress(&self, model: &str) -> Result<DownloadProgress, ApiError> {
        let url = format!(
            "{}/api/models/download/progress/{}",
            self.model_api_base,
            encode_path_segment(model)
        );
        let response = self.client.get(url).send().await?;
        Self::decode(response).await
    }
}

/// Percent-encodes a model name for use as a single path segment.
/// Model names carry `:` and sometimes `/`, which would otherwise split
/// the route.
fn encode_path_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_colon_and_slash() {
        assert_eq!(encode_path_segment("qwen3:0.6b"), "qwen3%3A0.6b");
        assert_eq!(encode_path_segment("org/model"), "org%2Fmodel");
        assert_eq!(encode_path_segment("plain-name_1.0"), "plain-name_1.0");
    }

    #[test]
    fn from_config_resolves_fixed_port_base() {
        let config = Config {
            server_origin: "http://192.168.1.5:8080".to_string(),
            ..Config::default()
        };
        let api = HttpApi::from_config(&config);
        assert_eq!(api.model_api_base(), "http://192.168.1.5:8081");
        assert_eq!(api.origin(), "http://192.168.1.5:8080");
    }

    #[test]
    fn from_config_honors_explicit_override() {
        let config = Config {
            model_api_url: Some("http://127.0.0.1:9001".to_string()),
            ..Config::default()
        };
        let api = HttpApi::from_config(&config);
        assert_eq!(api.model_api_base(), "http://127.0.0.1:9001");
    }
}
