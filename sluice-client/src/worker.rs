//! Client for the local worker service

use reqwest::Client;
use sluice_core::dto::worker::{
    Health, StartStepRequest, StartStepResponse, WatcherStatus, WorkerStatus,
};

use crate::error::Result;
use crate::handle_response;

/// HTTP client for a sluice worker's local API
#[derive(Debug, Clone)]
pub struct WorkerClient {
    base_url: String,
    client: Client,
}

impl WorkerClient {
    /// Create a new worker client
    ///
    /// # Arguments
    /// * `base_url` - The worker's base URL (e.g., "http://localhost:7000")
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Ask the worker to submit a processing step
    pub async fn start_step(&self, req: &StartStepRequest) -> Result<StartStepResponse> {
        let url = format!("{}/api/worker/start", self.base_url);
        let response = self.client.post(&url).json(req).send().await?;

        handle_response(response).await
    }

    /// Get the worker's status and active jobs
    pub async fn status(&self) -> Result<WorkerStatus> {
        let url = format!("{}/api/worker/status", self.base_url);
        let response = self.client.get(&url).send().await?;

        handle_response(response).await
    }

    /// Get the arrival watcher's status
    pub async fn watcher_status(&self) -> Result<WatcherStatus> {
        let url = format!("{}/api/worker/file-watcher/status", self.base_url);
        let response = self.client.get(&url).send().await?;

        handle_response(response).await
    }

    pub async fn health(&self) -> Result<Health> {
        let url = format!("{}/api/worker/health", self.base_url);
        let response = self.client.get(&url).send().await?;

        handle_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_core::dto::worker::StartStatus;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_start_step_already_running() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/worker/start"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "message": "Step bit_conversion is already running",
                "pipeline_id": "pl-1",
                "status": "already_running",
                "job_id": "4242"
            })))
            .mount(&server)
            .await;

        let client = WorkerClient::new(server.uri());
        let response = client
            .start_step(&StartStepRequest {
                pipeline_id: "pl-1".to_string(),
                step_name: "bit_conversion".to_string(),
                h5_image_name: Some("sample.pyramid.h5".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(response.status, StartStatus::AlreadyRunning);
        assert_eq!(response.job_id, "4242");
    }

    #[tokio::test]
    async fn test_start_step_failure_surfaces_error_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/worker/start"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_json(serde_json::json!({"error": "unknown step name: x"})),
            )
            .mount(&server)
            .await;

        let client = WorkerClient::new(server.uri());
        let err = client
            .start_step(&StartStepRequest {
                pipeline_id: "pl-1".to_string(),
                step_name: "x".to_string(),
                h5_image_name: None,
            })
            .await
            .unwrap_err();

        assert!(err.is_server_error());
        assert!(err.to_string().contains("unknown step name"));
    }
}
