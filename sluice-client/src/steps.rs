//! Step-related control-plane endpoints

use crate::error::Result;
use crate::{ControlPlaneClient, handle_empty_response};
use sluice_core::dto::pipeline::{StepComplete, StepFail, StepUpdate};

impl ControlPlaneClient {
    // =============================================================================
    // Step Lifecycle
    // =============================================================================

    /// Report status and progress of a step
    pub async fn update_step(
        &self,
        pipeline_id: &str,
        step_name: &str,
        update: &StepUpdate,
    ) -> Result<()> {
        self.ensure_open()?;

        let url = format!(
            "{}/api/pipeline/{}/step/{}",
            self.base_url, pipeline_id, step_name
        );
        let response = self.client.put(&url).json(update).send().await?;

        handle_empty_response(response).await
    }

    /// Report that a step finished successfully
    pub async fn complete_step(
        &self,
        pipeline_id: &str,
        step_name: &str,
        complete: &StepComplete,
    ) -> Result<()> {
        self.ensure_open()?;

        let url = format!(
            "{}/api/pipeline/{}/step/{}/complete",
            self.base_url, pipeline_id, step_name
        );
        let response = self.client.post(&url).json(complete).send().await?;

        handle_empty_response(response).await
    }

    /// Report that a step failed
    pub async fn fail_step(&self, pipeline_id: &str, step_name: &str, fail: &StepFail) -> Result<()> {
        self.ensure_open()?;

        let url = format!(
            "{}/api/pipeline/{}/step/{}/fail",
            self.base_url, pipeline_id, step_name
        );
        let response = self.client.post(&url).json(fail).send().await?;

        handle_empty_response(response).await
    }
}
