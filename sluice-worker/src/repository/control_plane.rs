//! Control-plane repository
//!
//! Handles communication with the control plane:
//! - Creating pipelines for newly arrived inputs
//! - Reporting step progress, completion and failure
//! - Sending heartbeats

use async_trait::async_trait;
use sluice_client::{ControlPlaneClient, Result};
use sluice_core::dto::pipeline::{CreatePipeline, Heartbeat, StepComplete, StepFail, StepUpdate};

/// Repository trait for control-plane operations
#[async_trait]
pub trait ControlPlaneRepository: Send + Sync {
    /// Creates a pipeline and returns its identifier
    async fn create_pipeline(&self, request: &CreatePipeline) -> Result<String>;

    async fn update_step(
        &self,
        pipeline_id: &str,
        step_name: &str,
        update: &StepUpdate,
    ) -> Result<()>;

    async fn complete_step(
        &self,
        pipeline_id: &str,
        step_name: &str,
        complete: &StepComplete,
    ) -> Result<()>;

    async fn fail_step(&self, pipeline_id: &str, step_name: &str, fail: &StepFail) -> Result<()>;

    async fn send_heartbeat(&self, heartbeat: &Heartbeat) -> Result<()>;

    /// Whether the underlying transport has been closed
    fn is_closed(&self) -> bool;
}

/// HTTP implementation of ControlPlaneRepository
pub struct HttpControlPlaneRepository {
    client: ControlPlaneClient,
}

impl HttpControlPlaneRepository {
    pub fn new(client: ControlPlaneClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ControlPlaneRepository for HttpControlPlaneRepository {
    async fn create_pipeline(&self, request: &CreatePipeline) -> Result<String> {
        let created = self.client.create_pipeline(request).await?;
        Ok(created.pipeline_id)
    }

    async fn update_step(
        &self,
        pipeline_id: &str,
        step_name: &str,
        update: &StepUpdate,
    ) -> Result<()> {
        self.client.update_step(pipeline_id, step_name, update).await
    }

    async fn complete_step(
        &self,
        pipeline_id: &str,
        step_name: &str,
        complete: &StepComplete,
    ) -> Result<()> {
        self.client
            .complete_step(pipeline_id, step_name, complete)
            .await
    }

    async fn fail_step(&self, pipeline_id: &str, step_name: &str, fail: &StepFail) -> Result<()> {
        self.client.fail_step(pipeline_id, step_name, fail).await
    }

    async fn send_heartbeat(&self, heartbeat: &Heartbeat) -> Result<()> {
        self.client.send_heartbeat(heartbeat).await
    }

    fn is_closed(&self) -> bool {
        self.client.is_closed()
    }
}
