//! Pipeline-related control-plane endpoints

use crate::error::Result;
use crate::{ControlPlaneClient, handle_response};
use sluice_core::dto::pipeline::{CreatePipeline, PipelineCreated};

impl ControlPlaneClient {
    /// Create a new pipeline for an input file
    ///
    /// # Returns
    /// The identifier assigned by the control plane
    pub async fn create_pipeline(&self, req: &CreatePipeline) -> Result<PipelineCreated> {
        self.ensure_open()?;

        let url = format!("{}/api/pipeline/create", self.base_url);
        let response = self.client.post(&url).json(req).send().await?;

        handle_response(response).await
    }
}
