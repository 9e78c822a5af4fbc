use anyhow::Result;
use tokio_util::sync::CancellationToken;

use crate::app::controller;
use crate::app::services::ApplicationServices;
use crate::app::tasks::wait_for_shutdown_signal;
use crate::config::ControllerArgs;

/// Application core structure with explicit dependencies
pub struct Application {
    services: ApplicationServices,
    args: ControllerArgs,
}

impl Application {
    pub const fn new(services: ApplicationServices, args: ControllerArgs) -> Self {
        Self { services, args }
    }

    /// Run the controller until a shutdown signal arrives
    pub async fn run(&self) -> Result<()> {
        tracing::info!("Starting controller...");

        let cancellation_token = CancellationToken::new();
        let signal_task = {
            let token = cancellation_token.clone();
            tokio::spawn(async move {
                if let Err(e) = wait_for_shutdown_signal().await {
                    tracing::error!("Failed to listen for shutdown signals: {e}");
                }
                token.cancel();
            })
        };

        controller::run(
            self.services.client.clone(),
            self.services.reconciler.clone(),
            self.args.retry_interval(),
            cancellation_token,
        )
        .await;

        signal_task.abort();
        tracing::info!("Application run completed");
        Ok(())
    }
}
