//! Worker-related control-plane endpoints

use crate::error::Result;
use crate::{ControlPlaneClient, handle_empty_response};
use sluice_core::dto::pipeline::Heartbeat;

impl ControlPlaneClient {
    /// Send a heartbeat to the control plane
    ///
    /// Keeps the worker marked as alive. Should be called periodically
    /// (e.g., every 30 seconds).
    pub async fn send_heartbeat(&self, heartbeat: &Heartbeat) -> Result<()> {
        self.ensure_open()?;

        let url = format!("{}/api/worker/heartbeat", self.base_url);
        let response = self.client.post(&url).json(heartbeat).send().await?;

        handle_empty_response(response).await
    }
}
